// src/utils/files.rs

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// Anything that is not a letter, digit, space, `-` or `_`.
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N} _\-]").expect("static regex"));

/// Strips characters that could escape a directory or upset a filesystem.
pub fn safe_file_stem(raw: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(raw, "").trim().to_string()
}

/// `{name}_{student_id}.{ext}`, or `{student_id}.{ext}` when the name has no
/// usable characters left.
pub fn report_file_name(name: Option<&str>, student_id: &str, ext: &str) -> String {
    let student_id = safe_file_stem(student_id);
    match name.map(safe_file_stem).filter(|n| !n.is_empty()) {
        Some(name) => format!("{}_{}.{}", name, student_id, ext),
        None => format!("{}.{}", student_id, ext),
    }
}

/// Upper bound on `_N` suffixes tried by [`write_new_file`].
const MAX_NAME_SUFFIX: u32 = 1000;

/// Writes `bytes` to `dir/file_name`, or to `{stem}_1.{ext}`, `{stem}_2.{ext}`
/// and so on when that name is taken. An existing file is never touched, so
/// the returned path belongs to the caller alone.
pub async fn write_new_file(dir: &Path, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    for n in 0..MAX_NAME_SUFFIX {
        let candidate = match (n, &ext) {
            (0, _) => dir.join(file_name),
            (n, Some(ext)) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            (n, None) => dir.join(format!("{}_{}", stem, n)),
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        file.write_all(bytes).await?;
        file.flush().await?;
        return Ok(candidate);
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {} in {}", file_name, dir.display()),
    ))
}

/// `{root}/{YYYY-MM-DD}` for today's local date.
pub fn dated_dir(root: &Path) -> PathBuf {
    root.join(chrono::Local::now().format("%Y-%m-%d").to_string())
}

/// `{prefix}_{YYYYmmdd_HHMMSS}.xlsx` used for exports.
pub fn timestamped_xlsx_name(prefix: &str) -> String {
    format!("{}_{}.xlsx", prefix, chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// `Content-Disposition` value with an ASCII fallback and the UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
        .collect();
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", ascii, encoded)
}

/// Reads a generated file and returns it as a download.
pub async fn attachment(path: &Path, content_type: &'static str) -> Result<Response, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    let disposition = HeaderValue::from_str(&content_disposition(&file_name))
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
