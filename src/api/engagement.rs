//! Like and follow API endpoints
//!
//! - POST /api/v1/likes - Toggle a like on a post or comment
//! - POST /api/v1/follows - Toggle following a user or category

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{FollowResult, FollowTarget, LikeResult, LikeTarget};
use crate::services::EngagementError;

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    /// `post` or `comment`
    pub content_type: String,
    pub object_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    /// `user` or `category`
    pub follow_type: String,
    pub object_id: i64,
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            EngagementError::ValidationError(msg) => ApiError::validation_error(msg),
            EngagementError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn likes_router() -> Router<AppState> {
    Router::new().route("/", post(toggle_like))
}

pub fn follows_router() -> Router<AppState> {
    Router::new().route("/", post(toggle_follow))
}

/// POST /api/v1/likes
async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<LikeRequest>,
) -> Result<Json<LikeResult>, ApiError> {
    let target = LikeTarget::parse(&body.content_type)
        .ok_or_else(|| ApiError::not_found(format!("Unknown content type: {}", body.content_type)))?;
    let result = state
        .services
        .engagement
        .toggle_like(&user.0, target, body.object_id)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/follows
async fn toggle_follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<FollowRequest>,
) -> Result<Json<FollowResult>, ApiError> {
    let target = FollowTarget::parse(&body.follow_type)
        .ok_or_else(|| ApiError::not_found(format!("Unknown follow type: {}", body.follow_type)))?;
    let result = state
        .services
        .engagement
        .toggle_follow(&user.0, target, body.object_id)
        .await?;
    Ok(Json(result))
}
