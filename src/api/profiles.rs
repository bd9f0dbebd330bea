//! Profile API endpoints
//!
//! - GET /api/v1/profiles/{username} - Public profile with published posts
//! - GET /api/v1/profile - Own profile
//! - PUT /api/v1/profile - Edit own profile
//! - GET /api/v1/dashboard - Personal dashboard

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::PageQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{UpdateProfileInput, UserProfile};
use crate::services::profile::{Dashboard, ProfilePage};
use crate::services::ProfileServiceError;

impl From<ProfileServiceError> for ApiError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::NotFound(username) => {
                ApiError::not_found(format!("User not found: {}", username))
            }
            ProfileServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProfileServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

/// Routes nested under /profiles
pub fn public_router() -> Router<AppState> {
    Router::new().route("/{username}", get(profile_page))
}

/// /profile and /dashboard for the signed-in user
pub fn own_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(own_profile).put(update_profile))
        .route("/dashboard", get(dashboard))
}

/// GET /api/v1/profiles/{username}
async fn profile_page(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfilePage>, ApiError> {
    let page = state
        .services
        .profiles
        .profile_page(&username, query.page, user.user())
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/profile
async fn own_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.services.profiles.own_profile(&user.0).await?))
}

/// PUT /api/v1/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.services.profiles.update_own(&user.0, body).await?))
}

/// GET /api/v1/dashboard
async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.services.profiles.dashboard(&user.0).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, login_token, test_server};
    use axum::http::{header, StatusCode};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_edit_profile_shows_on_public_page() {
        let (server, app) = test_server().await;
        app.reader("reader").await;
        let token = login_token(&server, "reader").await;

        // Warm the profile cache before editing
        server.get("/api/v1/profiles/reader").await.assert_status(StatusCode::OK);

        server
            .put("/api/v1/profile")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({"bio": "Computational linguist", "website": "https://example.com"}))
            .await
            .assert_status(StatusCode::OK);

        let page: Value = server.get("/api/v1/profiles/reader").await.json();
        assert_eq!(page["profile"]["profile"]["bio"], "Computational linguist");
    }

    #[tokio::test]
    async fn test_invalid_profile_url_rejected() {
        let (server, app) = test_server().await;
        app.reader("reader").await;
        let token = login_token(&server, "reader").await;

        server
            .put("/api/v1/profile")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({"github_url": "javascript:alert(1)"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_requires_login() {
        let (server, _app) = test_server().await;
        server
            .get("/api/v1/dashboard")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/v1/profiles/ghost")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
