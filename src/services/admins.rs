// src/services/admins.rs

use chrono::Local;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::admin_user::{AdminUser, LoginOutcome},
    utils::hash::hash_password,
};

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<AdminUser>, sqlx::Error> {
    sqlx::query_as::<_, AdminUser>(
        "SELECT id, username, hashed_password FROM admin_users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Creates the admin unless the username is already taken.
/// Returns true when a row was inserted.
pub async fn ensure_admin(pool: &SqlitePool, username: &str, password: &str) -> Result<bool, AppError> {
    if find_by_username(pool, username).await?.is_some() {
        return Ok(false);
    }

    let hashed_password = hash_password(password)?;
    sqlx::query("INSERT INTO admin_users (username, hashed_password) VALUES (?, ?)")
        .bind(username)
        .bind(hashed_password)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Appends one row to the login audit trail.
pub async fn record_login(
    pool: &SqlitePool,
    username: &str,
    ip: &str,
    outcome: LoginOutcome,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO login_logs (username, login_time, login_ip, status) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(Local::now().naive_local())
    .bind(ip)
    .bind(outcome.as_str())
    .execute(pool)
    .await?;

    Ok(())
}
