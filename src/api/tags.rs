//! Tag API endpoints
//!
//! - GET /api/v1/tags - Tag cloud with post and file counts
//! - GET /api/v1/tags/{slug} - Posts and public files carrying the tag
//! - POST /api/v1/tags, PUT/DELETE /api/v1/tags/{id} - Staff tag management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, non_empty};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateTagInput, Tag, UpdateTagInput};
use crate::services::tag::{TagIndex, TagPage};
use crate::services::TagServiceError;

#[derive(Debug, Deserialize)]
pub struct TagPageQuery {
    /// Narrow the tag page by title or excerpt
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(what) => ApiError::not_found(format!("Tag not found: {}", what)),
            TagServiceError::DuplicateName(name) => ApiError::with_details(
                "CONFLICT",
                format!("Tag already exists: {}", name),
                serde_json::json!({"field": "name", "value": name}),
            ),
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tag_index))
        .route("/{slug}", get(tag_page))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_tag))
        .route("/{slug}", put(update_tag).delete(delete_tag))
}

/// GET /api/v1/tags
async fn tag_index(State(state): State<AppState>) -> Result<Json<TagIndex>, ApiError> {
    Ok(Json(state.services.tags.index().await?))
}

/// GET /api/v1/tags/{slug}?q=&page=
async fn tag_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<TagPageQuery>,
) -> Result<Json<TagPage>, ApiError> {
    let search = non_empty(query.q);
    let page = state
        .services
        .tags
        .tag_page(&slug, search.as_deref(), query.page)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagInput>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.services.tags.create(body).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// PUT /api/v1/tags/{id}
async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTagInput>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.services.tags.update(id, body).await?))
}

/// DELETE /api/v1/tags/{id}
async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.tags.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
