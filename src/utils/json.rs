// src/utils/json.rs

use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` extractor whose rejections come back as `AppError::BadRequest`,
/// so malformed or wrongly typed bodies get the usual `{"error": ...}` 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
