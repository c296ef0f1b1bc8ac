// src/services/ingest.rs

//! Atomic ingestion of one assessment upload.

use chrono::Local;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    config::{UNKNOWN_CLASS_NAME, UNKNOWN_GENDER},
    models::{
        student::{CreateStudentRequest, Student},
        test_record::TestStatus,
        upload::TestDataUpload,
    },
    services::{
        classifier::{self, Classification},
        students,
    },
    utils::html::{sanitize_opt, sanitize_text},
};

/// Where an upload came from. Decides the initial status of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    /// Admin console; the record still awaits review.
    Admin,
    /// Testing client; the assessment is already finished.
    Client,
}

impl UploadSource {
    pub fn initial_status(self) -> TestStatus {
        match self {
            UploadSource::Admin => TestStatus::Pending,
            UploadSource::Client => TestStatus::Completed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub test_id: i64,
    pub student: Student,
    pub student_created: bool,
    pub classification: Classification,
}

/// Stores the upload as one unit: student (if new), test, scores and
/// physiological readings. Nothing is visible until the commit.
pub async fn ingest_test_data(
    pool: &SqlitePool,
    upload: &TestDataUpload,
    source: UploadSource,
    report_file_path: Option<String>,
) -> Result<Ingested, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let ingested = ingest_in_tx(&mut tx, upload, source, report_file_path).await?;
    tx.commit().await?;

    tracing::info!(
        "Ingested test {} for student {} (new student: {}, abnormal: {})",
        ingested.test_id,
        ingested.student.student_id,
        ingested.student_created,
        ingested.classification.is_abnormal
    );
    Ok(ingested)
}

/// The body of [`ingest_test_data`], run against a caller-owned transaction.
/// Dropping the transaction without committing discards every row.
pub async fn ingest_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    upload: &TestDataUpload,
    source: UploadSource,
    report_file_path: Option<String>,
) -> Result<Ingested, sqlx::Error> {
    let (student, student_created) = match students::find_by_student_id(&mut **tx, &upload.student_id).await? {
        Some(student) => (student, false),
        None => {
            let new_student = new_student_from(upload);
            // A concurrent upload for the same id makes this fail on the
            // UNIQUE index; the caller sees the error and nothing is stored.
            (students::insert(&mut **tx, &new_student).await?, true)
        }
    };

    let scores = &upload.questionnaire_scores;
    let classification = classifier::classify(scores.anxiety, scores.depression, scores.stress);

    let summary = sanitize_opt(upload.ai_summary.as_deref());
    let ai_summary = classifier::annotate_summary(summary.as_deref(), &classification);

    let test_time = upload
        .test_time
        .unwrap_or_else(|| Local::now().naive_local());
    let report_file_path = report_file_path.or_else(|| upload.report_file_path.clone());

    let test_id = sqlx::query(
        "INSERT INTO tests (student_fk_id, test_time, ai_summary, report_file_path, is_abnormal, status)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(student.id)
    .bind(test_time)
    .bind(&ai_summary)
    .bind(&report_file_path)
    .bind(classification.is_abnormal)
    .bind(source.initial_status().as_str())
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    for (module, score) in scores.classified() {
        sqlx::query("INSERT INTO scores (test_fk_id, module_name, score) VALUES (?, ?, ?)")
            .bind(test_id)
            .bind(module.label())
            .bind(score)
            .execute(&mut **tx)
            .await?;
    }

    for (module_name, item) in scores.detailed() {
        sqlx::query(
            "INSERT INTO scores (test_fk_id, module_name, score, max_score, level, questionnaire_feedback)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(test_id)
        .bind(module_name)
        .bind(item.score)
        .bind(item.max_score)
        .bind(&item.level)
        .bind(item.feedback.as_deref().map(sanitize_text))
        .execute(&mut **tx)
        .await?;
    }

    for (data_key, data_value) in upload.physiological_data_summary.readings() {
        sqlx::query("INSERT INTO physiological_data (test_fk_id, data_key, data_value) VALUES (?, ?, ?)")
            .bind(test_id)
            .bind(data_key)
            .bind(data_value)
            .execute(&mut **tx)
            .await?;
    }

    Ok(Ingested {
        test_id,
        student,
        student_created,
        classification,
    })
}

/// Student row for an upload that names an unknown `student_id`.
fn new_student_from(upload: &TestDataUpload) -> CreateStudentRequest {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(sanitize_text)
    };

    CreateStudentRequest {
        name: non_empty(&upload.name).unwrap_or_else(|| upload.student_id.clone()),
        student_id: upload.student_id.clone(),
        class_name: non_empty(&upload.class_name).unwrap_or_else(|| UNKNOWN_CLASS_NAME.to_string()),
        gender: non_empty(&upload.gender).unwrap_or_else(|| UNKNOWN_GENDER.to_string()),
    }
}
