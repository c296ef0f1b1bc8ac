// src/handlers/students.rs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::STUDENT_CACHE_TTL_SECS,
    error::AppError,
    models::student::{
        CreateStudentRequest, Student, StudentIdRequest, StudentIdsRequest, StudentListParams,
        UpdateStudentRequest,
    },
    services::{import, students},
    utils::{
        cache::{TtlCache, student_key},
        json::AppJson,
    },
};

const STUDENT_NOT_FOUND: &str = "学生未找到";

/// Looks a student up through the TTL cache. Misses are not cached.
pub async fn cached_student(
    pool: &SqlitePool,
    cache: &TtlCache,
    student_id: &str,
) -> Result<Option<Student>, AppError> {
    let key = student_key(student_id);
    if let Some(student) = cache.get::<Student>(&key) {
        return Ok(Some(student));
    }

    let student = students::find_by_student_id(pool, student_id).await?;
    if let Some(student) = &student {
        cache.insert(key, student, Duration::from_secs(STUDENT_CACHE_TTL_SECS));
    }
    Ok(student)
}

pub async fn list_students(
    State(pool): State<SqlitePool>,
    Query(params): Query<StudentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let students = students::list(&pool, &params).await.map_err(|e| {
        tracing::error!("Failed to list students: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(students))
}

pub async fn create_student(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    AppJson(payload): AppJson<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student = students::create(&pool, &payload).await?;
    cache.invalidate_after_write();

    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_student(
    State(pool): State<SqlitePool>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student = students::find_by_student_id(&pool, &student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    Ok(Json(student))
}

/// Partial update. Only the fields present in the body change.
pub async fn update_student(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    Path(student_id): Path<String>,
    AppJson(payload): AppJson<UpdateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student = students::update(&pool, &student_id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))?;
    cache.invalidate_after_write();

    Ok(Json(student))
}

/// Deletes the student together with its records.
pub async fn delete_student(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !students::delete(&pool, &student_id).await? {
        return Err(AppError::NotFound(STUDENT_NOT_FOUND.to_string()));
    }
    cache.invalidate_after_write();
    tracing::info!("Deleted student {}", student_id);

    Ok(Json(json!({ "detail": "删除成功" })))
}

pub async fn batch_delete_students(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    AppJson(payload): AppJson<StudentIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.student_ids.is_empty() {
        return Err(AppError::BadRequest("请提供要删除的学号列表".to_string()));
    }

    let deleted = students::delete_many(&pool, &payload.student_ids).await?;
    cache.invalidate_after_write();
    tracing::info!("Batch deleted {} students", deleted);

    Ok(Json(json!({
        "deleted_count": deleted,
        "detail": format!("成功删除 {} 名学生", deleted)
    })))
}

pub async fn batch_query_students(
    State(pool): State<SqlitePool>,
    AppJson(payload): AppJson<StudentIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let students = students::find_many(&pool, &payload.student_ids).await?;

    Ok(Json(json!({
        "total_count": students.len(),
        "students": students,
    })))
}

/// Multipart upload with a single `file` field holding an `.xlsx` roster.
pub async fn batch_import_students(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            bytes = Some(field.bytes().await?.to_vec());
        }
    }
    let bytes = bytes.ok_or_else(|| AppError::BadRequest("缺少上传文件".to_string()))?;

    let summary = import::import_students(&pool, bytes).await?;
    if summary.success_count > 0 {
        cache.invalidate_after_write();
    }

    Ok(Json(summary))
}

/// Public lookup used by the testing client before a session starts.
/// Answers `null` for unknown ids.
pub async fn validate_student(
    State(pool): State<SqlitePool>,
    State(cache): State<Arc<TtlCache>>,
    AppJson(payload): AppJson<StudentIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student = cached_student(&pool, &cache, payload.student_id.trim()).await?;
    Ok(Json(student))
}
