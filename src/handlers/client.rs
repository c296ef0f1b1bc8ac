// src/handlers/client.rs

//! Endpoints used by the testing client. None of them require a token.

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::students::cached_student,
    models::{
        student::{StudentIdRequest, StudentInfo, StudentValidateResponse},
        test_record::{ClientTestStatus, TestStatus},
        upload::TestDataUpload,
    },
    services::{
        ingest::{self, UploadSource},
        records, students,
    },
    state::AppState,
    utils::{
        files::{dated_dir, report_file_name, write_new_file},
        json::AppJson,
    },
};

pub async fn validate_student(
    State(state): State<AppState>,
    AppJson(payload): AppJson<StudentIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student = cached_student(&state.pool, &state.cache, payload.student_id.trim()).await?;

    Ok(Json(StudentValidateResponse {
        exists: student.is_some(),
        student_info: student.map(StudentInfo::from),
    }))
}

/// Multipart upload: `pdf_file` holds the client's own report, `test_data`
/// the JSON payload. The PDF is stored first and removed again when the
/// payload cannot be ingested.
pub async fn upload_test_data(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_bytes = state.config.max_upload_bytes();
    let mut pdf_bytes = None;
    let mut test_data = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("pdf_file") => {
                let bytes = field.bytes().await?;
                if bytes.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "文件大小超过限制 ({}MB)",
                        state.config.max_file_size_mb
                    )));
                }
                pdf_bytes = Some(bytes);
            }
            Some("test_data") => test_data = Some(field.text().await?),
            _ => {}
        }
    }

    let pdf_bytes = pdf_bytes.ok_or_else(|| AppError::BadRequest("缺少 pdf_file 文件".to_string()))?;
    let test_data = test_data.ok_or_else(|| AppError::BadRequest("缺少 test_data 字段".to_string()))?;

    let upload: TestDataUpload = serde_json::from_str(&test_data)
        .map_err(|e| AppError::BadRequest(format!("test_data 不是有效的JSON: {}", e)))?;
    if let Err(validation_errors) = upload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let pdf_dir = dated_dir(&state.config.report_dir);
    tokio::fs::create_dir_all(&pdf_dir).await?;
    let file_name = report_file_name(upload.name.as_deref(), &upload.student_id, "pdf");
    // Never overwrites an earlier upload of the same day.
    let pdf_path: PathBuf = write_new_file(&pdf_dir, &file_name, &pdf_bytes).await?;
    tracing::info!("Stored client PDF at {}", pdf_path.display());

    let stored_path = pdf_path.to_string_lossy().to_string();
    let ingested = match ingest::ingest_test_data(
        &state.pool,
        &upload,
        UploadSource::Client,
        Some(stored_path),
    )
    .await
    {
        Ok(ingested) => ingested,
        Err(e) => {
            tracing::error!("Client upload for {} failed: {:?}", upload.student_id, e);
            if let Err(remove_err) = tokio::fs::remove_file(&pdf_path).await {
                tracing::warn!("Could not remove {}: {}", pdf_path.display(), remove_err);
            }
            return Err(e.into());
        }
    };
    state.cache.invalidate_after_write();

    let detail = records::fetch_detail(&state.pool, ingested.test_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("ingested record vanished".to_string()))?;

    Ok(Json(detail))
}

/// Progress of a student as the client sees it, derived from the latest record.
pub async fn test_status(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student = students::find_by_student_id(&state.pool, &student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("学生不存在".to_string()))?;

    let (latest, count) = records::latest_for_student(&state.pool, student.id).await?;

    let status = match &latest {
        Some(record) => record
            .status
            .parse::<TestStatus>()
            .map(TestStatus::client_progress)
            .unwrap_or("not_started"),
        None => "not_started",
    };

    Ok(Json(ClientTestStatus {
        student_id: student.student_id,
        status: status.to_string(),
        is_abnormal: latest.as_ref().map(|r| r.is_abnormal),
        latest_test_time: latest.as_ref().map(|r| r.test_time),
        test_record_count: count,
    }))
}
