use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{Route, get, routes};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::clients::MediaUpload;
use crate::error::AppError;

pub mod auth;
pub mod catchers;
pub mod categories;
pub mod content;
pub mod courses;
pub mod profile;
pub mod progress;
pub mod ratings;
pub mod response;

use response::ApiResponse;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

#[derive(Serialize)]
pub struct HealthStatus {
    status: &'static str,
    version: &'static str,
}

#[get("/health")]
pub fn health() -> Json<ApiResponse<HealthStatus>> {
    ApiResponse::ok(
        "Service is running",
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

pub fn routes() -> Vec<Route> {
    let mut all = routes![health];
    all.extend(auth::routes());
    all.extend(profile::routes());
    all.extend(categories::routes());
    all.extend(courses::routes());
    all.extend(content::routes());
    all.extend(progress::routes());
    all.extend(ratings::routes());
    all
}

/// Reads an uploaded multipart file fully into memory. The stored name keeps
/// only an extension derived from the declared content type.
pub async fn read_upload(file: &TempFile<'_>, folder: &str) -> Result<MediaUpload, AppError> {
    let mut bytes = Vec::with_capacity(file.len() as usize);
    let reader = file.open().await?;
    tokio::pin!(reader);
    reader.read_to_end(&mut bytes).await?;

    let extension = file
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.as_str().to_ascii_lowercase());

    let file_name = match (file.name(), extension) {
        (Some(name), Some(ext)) => format!("{}.{}", name, ext),
        (None, Some(ext)) => format!("upload.{}", ext),
        (Some(name), None) => name.to_string(),
        (None, None) => "upload".to_string(),
    };

    Ok(MediaUpload {
        bytes,
        file_name,
        folder: folder.to_string(),
    })
}

pub fn content_type_of(file: &TempFile<'_>) -> Option<String> {
    file.content_type()
        .map(|ct| format!("{}/{}", ct.top(), ct.sub()).to_ascii_lowercase())
}

/// Parses a list field sent as a JSON array, falling back to comma-separated text.
pub fn parse_list(field: &str, raw: &str) -> Result<Vec<String>, AppError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(trimmed)
            .map_err(|_| AppError::Validation(format!("{}: must be a JSON array of strings", field)))?;
        return Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect());
    }

    Ok(trimmed
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

pub fn parse_number(field: &str, raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{}: must be a number", field)))
}
