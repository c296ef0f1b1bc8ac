// src/handlers/auth.rs

use std::net::SocketAddr;

use axum::{
    Extension, Form, Json,
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap},
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::admin_user::{AdminUser, LoginForm, LoginOutcome, TokenResponse},
    services::admins,
    utils::{hash::verify_password, jwt::sign_jwt},
};

const BAD_CREDENTIALS: &str = "用户名或密码不正确";

/// Client address for the audit log: first `X-Forwarded-For` hop, else the
/// peer address of the connection.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// OAuth2 password flow.
///
/// Every attempt, successful or not, lands in `login_logs`.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    headers: HeaderMap,
    extensions: Extensions,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let ip = client_ip(&headers, &extensions);

    let admin = if form.validate().is_ok() {
        admins::find_by_username(&pool, &form.username).await?
    } else {
        None
    };

    let admin = match admin {
        Some(admin) if verify_password(&form.password, &admin.hashed_password) => admin,
        _ => {
            admins::record_login(&pool, &form.username, &ip, LoginOutcome::Fail).await?;
            tracing::warn!("Failed login for '{}' from {}", form.username, ip);
            return Err(AppError::AuthError(BAD_CREDENTIALS.to_string()));
        }
    };

    admins::record_login(&pool, &admin.username, &ip, LoginOutcome::Success).await?;

    let access_token = sign_jwt(&admin.username, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Admin '{}' logged in from {}", admin.username, ip);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// Returns the admin resolved by the auth middleware.
pub async fn me(Extension(admin): Extension<AdminUser>) -> impl IntoResponse {
    Json(admin)
}
