//! Comment API endpoints
//!
//! - GET /api/v1/posts/{slug}/comments - Approved comment threads of a post
//! - POST /api/v1/posts/{slug}/comments - Add a comment or reply
//! - PUT /api/v1/comments/{id}/approval - Approve or hide a comment (staff)
//! - DELETE /api/v1/comments/{id} - Delete a comment (author or staff)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CommentView, CreateCommentInput};
use crate::services::CommentServiceError;

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(what) => {
                ApiError::not_found(format!("Comment not found: {}", what))
            }
            CommentServiceError::PostNotFound(what) => {
                ApiError::not_found(format!("Post not found: {}", what))
            }
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

/// Routes nested under /posts
pub fn post_comments_router() -> Router<AppState> {
    Router::new().route("/{slug}/comments", get(list_comments).post(add_comment))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/approval", put(set_approval))
        .route("/{id}", delete(delete_comment))
}

/// GET /api/v1/posts/{slug}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(state.services.comments.list_for_post(&slug).await?))
}

/// POST /api/v1/posts/{slug}/comments
async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let comment = state.services.comments.add(&user.0, &slug, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/v1/comments/{id}/approval
async fn set_approval(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ApprovalRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .comments
        .set_approved(&user.0, id, body.approved)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.comments.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
