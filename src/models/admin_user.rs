// src/models/admin_user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'admin_users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,

    /// Unique login name, also the JWT subject.
    pub username: String,

    /// Argon2 PHC string.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub hashed_password: String,
}

/// OAuth2 password-flow form posted to `/token`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, max = 80))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Outcome recorded in 'login_logs'.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Fail,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Fail => "fail",
        }
    }
}
