// src/handlers/export.rs

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::dashboard::cached_stats,
    models::{student::StudentListParams, test_record::TestRecordFilter},
    services::{
        dashboard, export,
        export::ExportKind,
        records, students,
    },
    state::AppState,
    utils::files::attachment,
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Upper bound of rows in a record export.
const EXPORT_ROW_LIMIT: i64 = 1_000_000;

pub async fn export_students(
    State(state): State<AppState>,
    Query(params): Query<StudentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let students = students::list(&state.pool, &params).await?;
    let path = ExportKind::Students.path_in(&state.config.export_dir);

    let target = path.clone();
    state
        .workers
        .run_blocking(move || {
            std::fs::create_dir_all(target.parent().unwrap_or(std::path::Path::new(".")))?;
            export::write_students(&students, &target)
        })
        .await?;
    tracing::info!("Exported students to {}", path.display());

    attachment(&path, XLSX_CONTENT_TYPE).await
}

/// Same filters as the record list; without a `limit` every match is exported.
pub async fn export_test_records(
    State(state): State<AppState>,
    Query(mut filter): Query<TestRecordFilter>,
) -> Result<impl IntoResponse, AppError> {
    filter.limit = Some(filter.limit.unwrap_or(EXPORT_ROW_LIMIT));
    let records = records::list(&state.pool, &filter).await?;
    let count = records.len();
    let path = ExportKind::TestRecords.path_in(&state.config.export_dir);

    let target = path.clone();
    state
        .workers
        .run_blocking(move || {
            std::fs::create_dir_all(target.parent().unwrap_or(std::path::Path::new(".")))?;
            export::write_test_records(&records, &target)
        })
        .await?;
    tracing::info!("Exported {} test records to {}", count, path.display());

    attachment(&path, XLSX_CONTENT_TYPE).await
}

pub async fn export_dashboard_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = cached_stats(&state.pool, &state.cache).await?;
    let classes = students::class_distribution(&state.pool).await?;
    let scores = dashboard::score_distribution(&state.pool, EXPORT_ROW_LIMIT).await?;
    let path = ExportKind::DashboardStats.path_in(&state.config.export_dir);

    let target = path.clone();
    state
        .workers
        .run_blocking(move || {
            std::fs::create_dir_all(target.parent().unwrap_or(std::path::Path::new(".")))?;
            export::write_dashboard(&stats, &classes, &scores, &target)
        })
        .await?;
    tracing::info!("Exported dashboard stats to {}", path.display());

    attachment(&path, XLSX_CONTENT_TYPE).await
}
