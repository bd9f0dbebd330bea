//! Site-wide API endpoints
//!
//! - GET /api/v1/home - Landing page data
//! - GET /api/v1/settings - Public site settings
//! - PUT /api/v1/settings - Edit site settings (staff)

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{SiteSettings, UpdateSiteSettingsInput};
use crate::services::home::HomePage;
use crate::services::SettingsServiceError;

impl From<SettingsServiceError> for ApiError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::InvalidValue(msg) => ApiError::validation_error(msg),
            SettingsServiceError::Forbidden => ApiError::forbidden("Staff privileges required"),
            SettingsServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/settings", get(get_settings))
}

pub fn staff_router() -> Router<AppState> {
    Router::new().route("/settings", put(update_settings))
}

/// GET /api/v1/home
async fn home(State(state): State<AppState>) -> Result<Json<HomePage>, ApiError> {
    Ok(Json(state.services.home.home().await?))
}

/// GET /api/v1/settings
async fn get_settings(State(state): State<AppState>) -> Result<Json<SiteSettings>, ApiError> {
    Ok(Json(state.services.settings.get().await?))
}

/// PUT /api/v1/settings
async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateSiteSettingsInput>,
) -> Result<Json<SiteSettings>, ApiError> {
    Ok(Json(state.services.settings.update(&user.0, body).await?))
}
