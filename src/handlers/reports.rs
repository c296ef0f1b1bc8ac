// src/handlers/reports.rs

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    services::report::{self, ReportFormat},
    state::AppState,
    utils::files::attachment,
};

const STUDENT_NOT_FOUND: &str = "学生未找到";

/// Plain text report of every record of a student.
pub async fn get_report(
    State(pool): State<SqlitePool>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let report = report::load(&pool, &student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    let content = report.render_text(Local::now().naive_local());
    Ok(Json(json!({ "content": content })))
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub format: Option<String>,
}

/// Renders the report file and returns it as an attachment.
pub async fn download_report(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, AppError> {
    let format = ReportFormat::parse(params.format.as_deref().unwrap_or("pdf"))?;
    let path = render_student_report(&state, &student_id, format).await?;

    attachment(&path, format.content_type()).await
}

/// Loads a student's report and renders it on a blocking worker.
pub async fn render_student_report(
    state: &AppState,
    student_id: &str,
    format: ReportFormat,
) -> Result<PathBuf, AppError> {
    let report = report::load(&state.pool, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    let report_dir = state.config.report_dir.clone();
    let font_path = state.config.report_font_path.clone();
    state
        .workers
        .run_blocking(move || {
            report::render_to_file(&report, format, &report_dir, font_path.as_deref())
        })
        .await
}
