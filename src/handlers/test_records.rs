// src/handlers/test_records.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        test_record::{
            BatchStatusParams, RecordIdsRequest, StatusSummary, StatusUpdateRequest,
            StudentStatusSummary, TestRecordFilter, TestStatus,
        },
        upload::TestDataUpload,
    },
    handlers::reports::render_student_report,
    services::{
        ingest::{self, UploadSource},
        records,
        report::ReportFormat,
    },
    state::AppState,
    utils::{cache::TtlCache, html::sanitize_text, json::AppJson},
};

const RECORD_NOT_FOUND: &str = "检测记录未找到";

/// Admin upload of one assessment. Runs in the worker pool; the record
/// starts out `pending`.
pub async fn upload_test_data(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TestDataUpload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let pool = state.pool.clone();
    let detail = state
        .workers
        .run(async move {
            let ingested = ingest::ingest_test_data(&pool, &payload, UploadSource::Admin, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to ingest test data: {:?}", e);
                    AppError::from(e)
                })?;
            records::fetch_detail(&pool, ingested.test_id)
                .await?
                .ok_or_else(|| AppError::InternalServerError("ingested record vanished".to_string()))
        })
        .await?;

    state.cache.invalidate_after_write();
    Ok(Json(detail))
}

pub async fn list_records(
    State(pool): State<SqlitePool>,
    Query(filter): Query<TestRecordFilter>,
) -> Result<impl IntoResponse, AppError> {
    let records = records::list(&pool, &filter).await.map_err(|e| {
        tracing::error!("Failed to list test records: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(records))
}

pub async fn get_record(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let record = records::fetch_detail(&pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(RECORD_NOT_FOUND.to_string()))?;

    Ok(Json(record))
}

pub async fn delete_record(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !records::delete(&pool, id).await? {
        return Err(AppError::NotFound(RECORD_NOT_FOUND.to_string()));
    }
    cache.invalidate_after_write();

    Ok(Json(json!({ "ok": true })))
}

pub async fn batch_delete_records(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    AppJson(payload): AppJson<RecordIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.record_ids.is_empty() {
        return Err(AppError::BadRequest("请提供要删除的记录ID列表".to_string()));
    }

    let deleted = records::delete_many(&pool, &payload.record_ids).await?;
    cache.invalidate_after_write();

    Ok(Json(json!({
        "deleted_count": deleted,
        "detail": format!("成功删除 {} 条检测记录", deleted)
    })))
}

/// Status summary of one student's records.
pub async fn student_status(
    State(pool): State<SqlitePool>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let statuses = records::statuses_for_students(&pool, std::slice::from_ref(&student_id)).await?;
    if statuses.is_empty() {
        return Err(AppError::NotFound(format!("学号 {} 没有检测记录", student_id)));
    }

    Ok(Json(StudentStatusSummary {
        student_id,
        summary: StatusSummary::from_records(statuses),
    }))
}

/// Status summary across several students, or all when none are named.
pub async fn batch_status(
    State(pool): State<SqlitePool>,
    Query(params): Query<BatchStatusParams>,
) -> Result<impl IntoResponse, AppError> {
    let statuses = records::statuses_for_students(&pool, &params.ids()).await?;
    Ok(Json(StatusSummary::from_records(statuses)))
}

/// Explicit status transition. The status is any of the four states; a
/// non-empty summary replaces the stored one.
pub async fn update_status(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: TestStatus = payload.status.parse().map_err(AppError::BadRequest)?;
    let ai_summary = payload
        .ai_summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(sanitize_text);

    if !records::update_status(&pool, id, status, ai_summary.as_deref()).await? {
        return Err(AppError::NotFound(RECORD_NOT_FOUND.to_string()));
    }
    tracing::info!("Test record {} is now {}", id, status);

    let record = records::fetch_detail(&pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(RECORD_NOT_FOUND.to_string()))?;

    Ok(Json(json!({
        "message": "状态更新成功",
        "record": record,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchReportRequest {
    pub record_ids: Vec<i64>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "pdf".to_string()
}

/// Renders the owning student's report for every record. A failed render
/// is counted and skipped.
pub async fn batch_generate_reports(
    State(state): State<AppState>,
    AppJson(payload): AppJson<BatchReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.record_ids.is_empty() {
        return Err(AppError::BadRequest("请提供要生成报告的记录ID列表".to_string()));
    }
    let format = ReportFormat::parse(&payload.format)?;

    let details = records::fetch_details(&state.pool, &payload.record_ids).await?;
    if let Some(missing) = payload
        .record_ids
        .iter()
        .find(|id| !details.iter().any(|d| d.id == **id))
    {
        return Err(AppError::NotFound(format!("检测记录 {} 未找到", missing)));
    }

    let mut report_files = Vec::new();
    for record_id in &payload.record_ids {
        let Some(detail) = details.iter().find(|d| d.id == *record_id) else {
            continue;
        };
        let student_id = detail.student.student_id.clone();

        match render_student_report(&state, &student_id, format).await {
            Ok(path) => report_files.push(json!({
                "record_id": record_id,
                "student_id": student_id,
                "file_path": path.display().to_string(),
                "file_name": path.file_name().map(|n| n.to_string_lossy().to_string()),
            })),
            Err(e) => tracing::error!("Report for record {} failed: {:?}", record_id, e),
        }
    }

    let failed_count = payload.record_ids.len() - report_files.len();
    Ok(Json(json!({
        "message": format!("成功生成 {} 份报告", report_files.len()),
        "report_files": report_files,
        "failed_count": failed_count,
    })))
}
