// src/models/upload.rs

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, de};
use validator::Validate;

use crate::services::classifier::Module;

/// Detailed result of one questionnaire module, as sent by the
/// four-module testing client.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScoreItem {
    pub score: i64,
    pub max_score: Option<i64>,
    /// 高分 / 正常 / 低分, or 重度 / 中度 / 轻度 on older clients.
    pub level: Option<String>,
    #[serde(alias = "questionnaire_feedback")]
    pub feedback: Option<String>,
}

/// Questionnaire block of an upload.
///
/// The first three modules are plain integers and take part in
/// classification; the detailed modules are stored but never classified.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuestionnaireScores {
    #[serde(rename = "焦虑", default)]
    pub anxiety: Option<i64>,
    #[serde(rename = "抑郁", default)]
    pub depression: Option<i64>,
    #[serde(rename = "压力", default)]
    pub stress: Option<i64>,

    #[serde(rename = "学习焦虑", default)]
    pub study_anxiety: Option<ScoreItem>,
    #[serde(rename = "对人焦虑", default)]
    pub social_anxiety: Option<ScoreItem>,
    #[serde(rename = "孤独倾向", default)]
    pub loneliness: Option<ScoreItem>,
    #[serde(rename = "自责倾向", default)]
    pub self_blame: Option<ScoreItem>,
}

impl QuestionnaireScores {
    pub fn score_of(&self, module: Module) -> Option<i64> {
        match module {
            Module::Anxiety => self.anxiety,
            Module::Depression => self.depression,
            Module::Stress => self.stress,
        }
    }

    /// Non-null classified scores in evaluation order.
    pub fn classified(&self) -> Vec<(Module, i64)> {
        Module::ALL
            .into_iter()
            .filter_map(|m| self.score_of(m).map(|score| (m, score)))
            .collect()
    }

    /// Present detailed modules, labelled.
    pub fn detailed(&self) -> Vec<(&'static str, &ScoreItem)> {
        [
            ("学习焦虑", self.study_anxiety.as_ref()),
            ("对人焦虑", self.social_anxiety.as_ref()),
            ("孤独倾向", self.loneliness.as_ref()),
            ("自责倾向", self.self_blame.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, item)| item.map(|item| (label, item)))
        .collect()
    }
}

/// Physiological readings block of an upload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PhysiologicalSummary {
    #[serde(rename = "心率", default)]
    pub heart_rate: Option<f64>,
    #[serde(rename = "脑电alpha", default)]
    pub eeg_alpha: Option<f64>,
}

impl PhysiologicalSummary {
    /// Non-null readings as (data_key, data_value).
    pub fn readings(&self) -> Vec<(&'static str, f64)> {
        [("心率", self.heart_rate), ("脑电alpha", self.eeg_alpha)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }
}

/// One assessment upload, shared by the admin and the client ingestion paths.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct TestDataUpload {
    #[validate(length(min = 1, max = 50, message = "学号不能为空且不超过50个字符"))]
    pub student_id: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 10))]
    pub gender: Option<String>,
    #[validate(length(max = 100))]
    pub class_name: Option<String>,
    /// Shown on the client's own PDF; not stored.
    pub age: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_datetime")]
    pub test_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub questionnaire_scores: QuestionnaireScores,
    #[serde(default)]
    pub physiological_data_summary: PhysiologicalSummary,
    pub ai_summary: Option<String>,
    #[validate(length(max = 255))]
    pub report_file_path: Option<String>,
}

/// Accepts RFC 3339 (converted to local wall-clock time) or a naive ISO
/// timestamp with `T` or space separator.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn deserialize_opt_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_datetime(s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid datetime '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_payload() {
        let upload: TestDataUpload = serde_json::from_value(json!({
            "student_id": "STU000042",
            "name": "李雷",
            "gender": "男",
            "age": 12,
            "class_name": "6年级3班",
            "test_time": "2025-11-10T15:29:19",
            "questionnaire_scores": {
                "焦虑": 18,
                "学习焦虑": {"score": 12, "max_score": 15, "level": "高分",
                            "questionnaire_feedback": "建议调整备考节奏"}
            },
            "physiological_data_summary": {"心率": 88, "脑电alpha": 9.5},
            "ai_summary": "存在一定紧张和焦虑",
            "report_file_path": "pdfs/STU000042.pdf",
            "AI_feedback": "ignored"
        }))
        .unwrap();

        assert_eq!(upload.questionnaire_scores.classified(), vec![(Module::Anxiety, 18)]);
        let detailed = upload.questionnaire_scores.detailed();
        assert_eq!(detailed.len(), 1);
        assert_eq!(detailed[0].0, "学习焦虑");
        assert_eq!(detailed[0].1.feedback.as_deref(), Some("建议调整备考节奏"));
        assert_eq!(
            upload.physiological_data_summary.readings(),
            vec![("心率", 88.0), ("脑电alpha", 9.5)]
        );
        assert_eq!(
            upload.test_time.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2025-11-10 15:29:19"
        );
    }

    #[test]
    fn blocks_are_optional() {
        let upload: TestDataUpload = serde_json::from_value(json!({"student_id": "S1"})).unwrap();
        assert!(upload.questionnaire_scores.classified().is_empty());
        assert!(upload.physiological_data_summary.readings().is_empty());
        assert!(upload.test_time.is_none());
    }

    #[test]
    fn rejects_unparseable_time() {
        let result: Result<TestDataUpload, _> =
            serde_json::from_value(json!({"student_id": "S1", "test_time": "yesterday"}));
        assert!(result.is_err());
    }

    #[test]
    fn datetime_formats() {
        assert!(parse_datetime("2025-01-02 03:04:05").is_some());
        assert!(parse_datetime("2025-01-02T03:04:05.123").is_some());
        assert!(parse_datetime("2025-01-02T03:04:05+08:00").is_some());
        assert!(parse_datetime("2025-01-02").is_some());
        assert!(parse_datetime("02/01/2025").is_none());
    }
}
