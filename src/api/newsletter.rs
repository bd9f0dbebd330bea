//! Newsletter API endpoint
//!
//! - POST /api/v1/newsletter - Subscribe an email address

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::Newsletter;
use crate::services::NewsletterError;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

impl From<NewsletterError> for ApiError {
    fn from(err: NewsletterError) -> Self {
        match err {
            NewsletterError::ValidationError(msg) => ApiError::validation_error(msg),
            NewsletterError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(subscribe))
}

/// POST /api/v1/newsletter
async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<Newsletter>), ApiError> {
    let subscription = state.services.newsletter.subscribe(&body.email).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::test_server;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_once() {
        let (server, app) = test_server().await;

        server
            .post("/api/v1/newsletter")
            .json(&json!({"email": "Reader@Example.com"}))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/v1/newsletter")
            .json(&json!({"email": "reader@example.com"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/v1/newsletter")
            .json(&json!({"email": "not-an-email"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(app.newsletter.active_subscribers().await.unwrap(), 1);
    }
}
