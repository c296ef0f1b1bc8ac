// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use url::Url;

/// Score above which a classified questionnaire module is flagged.
pub const DEFAULT_SCORE_THRESHOLD: i64 = 15;

/// Class assigned to students created implicitly by an upload.
pub const UNKNOWN_CLASS_NAME: &str = "未知班级";

/// Gender assigned to students created implicitly by an upload.
pub const UNKNOWN_GENDER: &str = "未知";

/// Number of concurrent jobs the worker pool admits.
pub const WORKER_POOL_SIZE: usize = 4;

/// Hard limit for a single worker pool job, in seconds.
pub const WORKER_TIMEOUT_SECS: u64 = 30;

/// Cache lifetime for student lookups, in seconds.
pub const STUDENT_CACHE_TTL_SECS: u64 = 120;

/// Cache lifetime for dashboard aggregates, in seconds.
pub const STATS_CACHE_TTL_SECS: u64 = 60;

/// Upper bound for list endpoints.
pub const MAX_LIST_LIMIT: i64 = 10000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub allowed_origins: Vec<String>,
    pub report_dir: PathBuf,
    pub export_dir: PathBuf,
    pub max_file_size_mb: u64,
    /// TrueType font used for PDF output. Without it the builtin
    /// Helvetica is used, which cannot draw CJK glyphs.
    pub report_font_path: Option<PathBuf>,
    pub server_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1800);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let allowed_origins = parse_origins(
            &env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8080,http://127.0.0.1:8080".to_string()),
        );

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            allowed_origins,
            report_dir: env::var("REPORT_DIR")
                .unwrap_or_else(|_| "reports".to_string())
                .into(),
            export_dir: env::var("EXPORT_DIR")
                .unwrap_or_else(|_| "exports".to_string())
                .into(),
            max_file_size_mb,
            report_font_path: env::var("REPORT_FONT_PATH").ok().map(PathBuf::from),
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }

    /// Client upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }
}

/// Splits a comma separated origin list, dropping entries that are not URLs.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter(|origin| match Url::parse(origin) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                false
            }
        })
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_skips_garbage() {
        let origins = parse_origins("http://localhost:8080, not a url ,https://admin.example.com/");
        assert_eq!(
            origins,
            vec!["http://localhost:8080", "https://admin.example.com"]
        );
    }

    #[test]
    fn parse_origins_handles_empty_input() {
        assert!(parse_origins("").is_empty());
    }
}
