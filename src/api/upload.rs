//! Image upload API endpoint
//!
//! - POST /api/v1/upload/image - Store an image for post content (authors)
//!
//! Images are written to `{media}/images/YYYY/MM/{uuid}.{ext}` and served
//! back from `/uploads/...`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart framing on top of the image itself
const MULTIPART_SLACK: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

pub fn router(max_image_size: u64) -> Router<AppState> {
    Router::new()
        .route("/image", post(upload_image))
        .layer(DefaultBodyLimit::max(max_image_size as usize + MULTIPART_SLACK))
}

/// POST /api/v1/upload/image
///
/// Accepts multipart/form-data with a single file field named "file".
async fn upload_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    if !user.0.is_author() {
        return Err(ApiError::forbidden("Only authors can upload images"));
    }
    let config = &state.config.upload;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !config.is_image_type_allowed(&content_type) {
            return Err(ApiError::validation_error(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                config.allowed_image_types.join(", ")
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
        if data.len() as u64 > config.max_image_size {
            return Err(ApiError::validation_error(format!(
                "File too large. Maximum size: {} MB",
                config.max_image_size / 1024 / 1024
            )));
        }

        let now = Utc::now();
        let relative = format!("images/{:04}/{:02}", now.year(), now.month());
        let filename = format!("{}.{}", Uuid::new_v4(), config.image_extension(&content_type));
        save(&config.path.join(&relative), &filename, &data).await?;

        tracing::info!("{} uploaded image {}/{}", user.0.username, relative, filename);
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("/uploads/{}/{}", relative, filename),
                filename,
                size: data.len() as u64,
                content_type,
            }),
        ));
    }

    Err(ApiError::validation_error("No file provided"))
}

async fn save(dir: &Path, filename: &str, data: &[u8]) -> Result<(), ApiError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))?;
    fs::write(dir.join(filename), data)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))
}
