//! Author request API endpoints
//!
//! - POST /api/v1/author-requests - File (or resubmit) a request
//! - GET /api/v1/author-requests/mine - The signed-in user's request
//! - GET /api/v1/author-requests?status= - Review queue (staff)
//! - POST /api/v1/author-requests/{id}/review - Approve or reject (staff)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::non_empty;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    AuthorRequest, AuthorRequestStatus, AuthorRequestView, CreateAuthorRequestInput,
    ReviewDecision,
};
use crate::services::AuthorRequestError;

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub admin_comment: String,
}

impl From<AuthorRequestError> for ApiError {
    fn from(err: AuthorRequestError) -> Self {
        match err {
            AuthorRequestError::NotFound => ApiError::not_found("Author request not found"),
            AuthorRequestError::ValidationError(msg) => ApiError::validation_error(msg),
            AuthorRequestError::Conflict(msg) => ApiError::conflict(msg),
            AuthorRequestError::Forbidden => ApiError::forbidden("Staff access required"),
            AuthorRequestError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit))
        .route("/mine", get(own_request))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests))
        .route("/{id}/review", post(review))
}

/// POST /api/v1/author-requests
async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateAuthorRequestInput>,
) -> Result<(StatusCode, Json<AuthorRequest>), ApiError> {
    let request = state.services.author_requests.submit(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/author-requests/mine
async fn own_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<AuthorRequest>>, ApiError> {
    Ok(Json(state.services.author_requests.own_request(&user.0).await?))
}

/// GET /api/v1/author-requests
async fn list_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<AuthorRequestView>>, ApiError> {
    let status = match non_empty(query.status) {
        Some(s) => Some(
            AuthorRequestStatus::parse(&s)
                .ok_or_else(|| ApiError::validation_error(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };
    Ok(Json(
        state.services.author_requests.list(&user.0, status).await?,
    ))
}

/// POST /api/v1/author-requests/{id}/review
async fn review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<AuthorRequest>, ApiError> {
    let reviewed = state
        .services
        .author_requests
        .review(&user.0, id, body.decision, &body.admin_comment)
        .await?;
    Ok(Json(reviewed))
}
