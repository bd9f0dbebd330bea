//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Auth, profiles and the dashboard
//! - Blog: posts, categories, tags, comments, likes and follows
//! - File archive: files, downloads, file categories and playlists
//! - Author requests, newsletter, home page and site settings
//! - Image uploads, served back from `/uploads`

pub mod archive;
pub mod auth;
pub mod author_requests;
pub mod categories;
pub mod comments;
pub mod common;
pub mod engagement;
pub mod middleware;
pub mod newsletter;
pub mod playlists;
pub mod posts;
pub mod profiles;
pub mod site;
pub mod tags;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(config: &Config) -> Router<AppState> {
    // Staff routes (editors and admins)
    let staff_routes = Router::new()
        .nest("/categories", categories::staff_router())
        .nest("/tags", tags::staff_router())
        .nest(
            "/archive",
            archive::staff_router().nest("/categories", categories::archive_staff_router()),
        )
        .nest("/author-requests", author_requests::staff_router())
        .merge(site::staff_router())
        .route_layer(axum_middleware::from_fn(middleware::require_staff));

    Router::new()
        .nest("/auth", auth::router())
        .route("/blog", get(posts::blog_home))
        .nest(
            "/posts",
            posts::router().merge(comments::post_comments_router()),
        )
        .nest("/comments", comments::router())
        .nest("/categories", categories::router())
        .nest("/tags", tags::router())
        .nest("/likes", engagement::likes_router())
        .nest("/follows", engagement::follows_router())
        .nest("/profiles", profiles::public_router())
        .merge(profiles::own_router())
        .nest("/author-requests", author_requests::router())
        .nest("/newsletter", newsletter::router())
        .nest(
            "/archive",
            archive::router(config.upload.max_file_size)
                .nest("/categories", categories::archive_router()),
        )
        .nest("/playlists", playlists::router())
        .nest("/upload", upload::router(config.upload.max_image_size))
        .merge(site::router())
        .merge(staff_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Cookie sessions need credentials and an explicit origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!(
            "Ignoring invalid CORS origin {:?}: {}",
            config.server.cors_origin,
            e
        ),
    }

    Router::new()
        .nest("/api/v1", build_api_router(&config))
        .nest_service("/uploads", ServeDir::new(&config.upload.path))
        // Runs after the session is resolved
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::maintenance_guard,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::services::test_support::{TestApp, TEST_PASSWORD};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// HTTP server over a fresh [`TestApp`]
    pub async fn test_server() -> (TestServer, TestApp) {
        let app = TestApp::new().await;
        let state = AppState {
            services: app.services.clone(),
            config: Arc::new(app.config.clone()),
        };
        let server = TestServer::new(build_router(state)).expect("Failed to start test server");
        (server, app)
    }

    pub fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid token header")
    }

    /// Sign in a user created with [`TEST_PASSWORD`] and return the session token
    pub async fn login_token(server: &TestServer, username: &str) -> String {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({"username_or_email": username, "password": TEST_PASSWORD}))
            .await;
        let body: Value = response.json();
        body["token"]
            .as_str()
            .expect("Login response without token")
            .to_string()
    }
}
