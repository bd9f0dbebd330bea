//! Playlist API endpoints
//!
//! - GET /api/v1/playlists - Public playlists
//! - POST /api/v1/playlists - Create a playlist
//! - GET /api/v1/playlists/mine - The signed-in user's playlists
//! - GET/DELETE /api/v1/playlists/{id} - Playlist with files, delete
//! - POST/DELETE /api/v1/playlists/{id}/files/{file_id} - Add or remove a file

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PageQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{CreatePlaylistInput, PagedResult, PlaylistDetail, PlaylistView};
use crate::services::PlaylistError;

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    /// Whether the playlist changed
    pub changed: bool,
}

impl From<PlaylistError> for ApiError {
    fn from(err: PlaylistError) -> Self {
        match err {
            PlaylistError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            PlaylistError::ValidationError(msg) => ApiError::validation_error(msg),
            PlaylistError::Forbidden => {
                ApiError::forbidden("You can only change your own playlists")
            }
            PlaylistError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_playlists).post(create_playlist))
        .route("/mine", get(my_playlists))
        .route("/{id}", get(playlist_detail).delete(delete_playlist))
        .route(
            "/{id}/files/{file_id}",
            post(add_file).delete(remove_file),
        )
}

/// GET /api/v1/playlists
async fn list_playlists(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<PlaylistView>>, ApiError> {
    Ok(Json(state.services.playlists.list_public(query.page).await?))
}

/// POST /api/v1/playlists
async fn create_playlist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePlaylistInput>,
) -> Result<(StatusCode, Json<PlaylistView>), ApiError> {
    let playlist = state.services.playlists.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(playlist)))
}

/// GET /api/v1/playlists/mine
async fn my_playlists(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PlaylistView>>, ApiError> {
    Ok(Json(state.services.playlists.my_playlists(&user.0).await?))
}

/// GET /api/v1/playlists/{id}
async fn playlist_detail(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<PlaylistDetail>, ApiError> {
    Ok(Json(state.services.playlists.detail(id, user.user()).await?))
}

/// DELETE /api/v1/playlists/{id}
async fn delete_playlist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.playlists.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/playlists/{id}/files/{file_id}
async fn add_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, file_id)): Path<(i64, i64)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let changed = state.services.playlists.add_file(&user.0, id, file_id).await?;
    Ok(Json(MembershipResponse { changed }))
}

/// DELETE /api/v1/playlists/{id}/files/{file_id}
async fn remove_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, file_id)): Path<(i64, i64)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let changed = state
        .services
        .playlists
        .remove_file(&user.0, id, file_id)
        .await?;
    Ok(Json(MembershipResponse { changed }))
}
