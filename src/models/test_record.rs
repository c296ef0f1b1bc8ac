// src/models/test_record.rs

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{student::Student, upload::deserialize_opt_datetime};

/// Processing state of a test record.
///
/// `pending → processing → completed`, with `failed` reachable from any
/// non-terminal state. Nothing advances a record on its own; every change is
/// an explicit status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TestStatus {
    pub const ALL: [TestStatus; 4] = [
        TestStatus::Pending,
        TestStatus::Processing,
        TestStatus::Completed,
        TestStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Processing => "processing",
            TestStatus::Completed => "completed",
            TestStatus::Failed => "failed",
        }
    }

    /// Progress label reported to the testing client.
    pub fn client_progress(self) -> &'static str {
        match self {
            TestStatus::Completed => "completed",
            TestStatus::Pending | TestStatus::Processing => "in_progress",
            TestStatus::Failed => "not_started",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!("无效的状态 '{}'，可选值: pending, processing, completed, failed", s)
            })
    }
}

/// Represents the 'scores' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub id: i64,
    pub test_fk_id: i64,
    pub module_name: String,
    pub score: i64,
    pub max_score: Option<i64>,
    pub level: Option<String>,
    pub questionnaire_feedback: Option<String>,
}

/// Represents the 'physiological_data' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct PhysiologicalData {
    pub id: i64,
    pub test_fk_id: i64,
    pub data_key: String,
    pub data_value: f64,
}

/// A test record joined with its student and child rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecordDetail {
    pub id: i64,
    pub student_fk_id: i64,
    pub test_time: NaiveDateTime,
    pub ai_summary: Option<String>,
    pub report_file_path: Option<String>,
    pub is_abnormal: bool,
    pub status: String,
    pub student: Student,
    pub scores: Vec<Score>,
    pub physiological_data: Vec<PhysiologicalData>,
}

/// Row shape of `tests JOIN students`, flattened with prefixed columns.
#[derive(Debug, FromRow)]
pub struct TestWithStudentRow {
    pub id: i64,
    pub student_fk_id: i64,
    pub test_time: NaiveDateTime,
    pub ai_summary: Option<String>,
    pub report_file_path: Option<String>,
    pub is_abnormal: bool,
    pub status: String,
    pub s_student_id: String,
    pub s_name: String,
    pub s_class_name: String,
    pub s_gender: String,
    pub s_created_at: NaiveDateTime,
}

pub const TEST_WITH_STUDENT_SELECT: &str = r#"
    SELECT
        t.id, t.student_fk_id, t.test_time, t.ai_summary, t.report_file_path,
        t.is_abnormal, t.status,
        s.student_id AS s_student_id, s.name AS s_name, s.class_name AS s_class_name,
        s.gender AS s_gender, s.created_at AS s_created_at
    FROM tests t
    JOIN students s ON t.student_fk_id = s.id
"#;

impl TestWithStudentRow {
    pub fn into_detail(
        self,
        scores: Vec<Score>,
        physiological_data: Vec<PhysiologicalData>,
    ) -> TestRecordDetail {
        TestRecordDetail {
            id: self.id,
            student_fk_id: self.student_fk_id,
            test_time: self.test_time,
            ai_summary: self.ai_summary,
            report_file_path: self.report_file_path,
            is_abnormal: self.is_abnormal,
            status: self.status,
            student: Student {
                id: self.student_fk_id,
                student_id: self.s_student_id,
                name: self.s_name,
                class_name: self.s_class_name,
                gender: self.s_gender,
                created_at: self.s_created_at,
            },
            scores,
            physiological_data,
        }
    }
}

/// Query parameters for listing and exporting test records.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TestRecordFilter {
    /// Student natural key.
    pub user_id: Option<String>,
    /// Substring of the student's name.
    pub user_name: Option<String>,
    pub gender: Option<String>,
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_datetime")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_opt_datetime")]
    pub end_time: Option<NaiveDateTime>,
    pub is_abnormal: Option<bool>,
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Compact status view of one record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecordStatus {
    pub id: i64,
    pub test_time: NaiveDateTime,
    pub is_abnormal: bool,
    pub status: String,
    pub ai_summary: Option<String>,
}

/// Status view of a set of records with per-state counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub records: Vec<RecordStatus>,
    pub total_count: usize,
    pub abnormal_count: usize,
    pub pending_count: usize,
    pub processing_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
}

impl StatusSummary {
    pub fn from_records(records: Vec<RecordStatus>) -> Self {
        let count = |status: TestStatus| {
            records
                .iter()
                .filter(|r| r.status == status.as_str())
                .count()
        };

        Self {
            total_count: records.len(),
            abnormal_count: records.iter().filter(|r| r.is_abnormal).count(),
            pending_count: count(TestStatus::Pending),
            processing_count: count(TestStatus::Processing),
            completed_count: count(TestStatus::Completed),
            failed_count: count(TestStatus::Failed),
            records,
        }
    }
}

/// Status summary of a single student, tagged with its natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentStatusSummary {
    pub student_id: String,
    #[serde(flatten)]
    pub summary: StatusSummary,
}

/// DTO for `PUT /api/test-records/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    /// Replaces the stored summary when present and non-empty.
    pub ai_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordIdsRequest {
    pub record_ids: Vec<i64>,
}

/// Query for `GET /api/test-records/batch-status`.
#[derive(Debug, Default, Deserialize)]
pub struct BatchStatusParams {
    /// Comma separated student natural keys.
    pub student_ids: Option<String>,
}

impl BatchStatusParams {
    pub fn ids(&self) -> Vec<String> {
        self.student_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Answer to the testing client's status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTestStatus {
    pub student_id: String,
    /// not_started | in_progress | completed
    pub status: String,
    pub is_abnormal: Option<bool>,
    pub latest_test_time: Option<NaiveDateTime>,
    pub test_record_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, status: &str, is_abnormal: bool) -> RecordStatus {
        RecordStatus {
            id,
            test_time: chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            is_abnormal,
            status: status.to_string(),
            ai_summary: None,
        }
    }

    #[test]
    fn status_parses_only_known_values() {
        for status in TestStatus::ALL {
            assert_eq!(status.as_str().parse::<TestStatus>(), Ok(status));
        }
        assert!("done".parse::<TestStatus>().is_err());
        assert!("Pending".parse::<TestStatus>().is_err());
    }

    #[test]
    fn client_progress_mapping() {
        assert_eq!(TestStatus::Completed.client_progress(), "completed");
        assert_eq!(TestStatus::Pending.client_progress(), "in_progress");
        assert_eq!(TestStatus::Processing.client_progress(), "in_progress");
        assert_eq!(TestStatus::Failed.client_progress(), "not_started");
    }

    #[test]
    fn summary_counts() {
        let summary = StatusSummary::from_records(vec![
            record(1, "pending", true),
            record(2, "completed", false),
            record(3, "completed", true),
            record(4, "failed", false),
        ]);
        assert_eq!(summary.total_count, 4);
        assert_eq!(summary.abnormal_count, 2);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.processing_count, 0);
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn student_summary_serializes_flat() {
        let value = serde_json::to_value(StudentStatusSummary {
            student_id: "S1".to_string(),
            summary: StatusSummary::from_records(vec![record(1, "processing", true)]),
        })
        .unwrap();
        assert_eq!(value["student_id"], "S1");
        assert_eq!(value["total_count"], 1);
        assert_eq!(value["processing_count"], 1);
        assert_eq!(value["records"][0]["id"], 1);
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn batch_status_ids_split() {
        let params = BatchStatusParams {
            student_ids: Some("S1, S2,,S3 ".to_string()),
        };
        assert_eq!(params.ids(), vec!["S1", "S2", "S3"]);
        assert!(BatchStatusParams::default().ids().is_empty());
    }
}
