//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token from cookie or bearer header)
//! - Authorization (staff-only route groups)
//! - Maintenance mode

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::models::User;
use crate::services::Services;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services: Arc::new(services),
            config: Arc::new(config),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Signed-in user when there is one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::new("MAINTENANCE", message)
    }

    /// Logs the cause; the client only sees a generic message
    pub fn internal_error(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("Internal error: {}", message);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "MAINTENANCE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal_error(format!("{:#}", err))
    }
}

/// Extract session token from request headers
///
/// The bearer header wins over the cookie.
pub fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Resolve the session of every request; unknown tokens are ignored
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.services.users.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Staff authorization middleware
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_staff() {
        return Err(ApiError::forbidden("Staff privileges required"));
    }

    Ok(next.run(request).await)
}

/// API prefixes that stay reachable in maintenance mode
const MAINTENANCE_EXEMPT: [&str; 2] = ["/api/v1/auth", "/api/v1/settings"];

/// Answer 503 to non-staff content requests while maintenance mode is on
///
/// Must run inside [`optional_auth`] so the user is already resolved.
pub async fn maintenance_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    let guarded = path.starts_with("/api/v1/")
        && !MAINTENANCE_EXEMPT.iter().any(|prefix| path.starts_with(prefix));

    if guarded && state.services.settings.is_maintenance().await {
        let is_staff = request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.0.is_staff())
            .unwrap_or(false);
        if !is_staff {
            return Err(ApiError::maintenance(
                "The site is under maintenance, please come back later",
            ));
        }
    }

    Ok(next.run(request).await)
}

/// Client address as reported by the reverse proxy
pub fn client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|ip| ip.trim().to_string())
}

pub fn user_agent(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&map), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&map), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_ignores_similar_cookie() {
        let map = headers(&[(header::COOKIE, "sessionid=abc")]);
        assert!(extract_session_token(&map).is_none());
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&map), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_invalid_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&map).is_none());
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::maintenance("x").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::internal_error("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let error = ApiError::internal_error("database is locked");
        assert_eq!(error.error.message, "Internal server error");
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({"field": "username"});
        let error = ApiError::with_details("VALIDATION_ERROR", "Invalid", details.clone());
        assert_eq!(error.error.details, Some(details));
    }

    #[test]
    fn test_client_ip() {
        let map = headers(&[(
            header::HeaderName::from_static("x-forwarded-for"),
            "10.0.0.1, 10.0.0.2",
        )]);
        assert_eq!(client_ip(&map), Some("10.0.0.1".to_string()));

        let map = headers(&[(header::HeaderName::from_static("x-real-ip"), "192.168.1.5")]);
        assert_eq!(client_ip(&map), Some("192.168.1.5".to_string()));

        assert!(client_ip(&HeaderMap::new()).is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::UserRole;
    use proptest::prelude::*;

    fn role_strategy() -> impl Strategy<Value = UserRole> {
        prop_oneof![
            Just(UserRole::Admin),
            Just(UserRole::Editor),
            Just(UserRole::Author),
            Just(UserRole::Reader)
        ]
    }

    fn user(id: i64, role: UserRole) -> User {
        User::new(
            format!("user{}", id),
            format!("user{}@example.com", id),
            "hash".to_string(),
            role,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn staff_is_admin_or_editor(role in role_strategy()) {
            let expected = matches!(role, UserRole::Admin | UserRole::Editor);
            prop_assert_eq!(user(1, role).is_staff(), expected);
        }

        #[test]
        fn non_staff_edit_only_own_content(user_id in 1i64..100, owner_id in 1i64..100) {
            let mut author = user(user_id, UserRole::Author);
            author.id = user_id;
            prop_assert_eq!(author.can_edit(owner_id), user_id == owner_id);
        }

        #[test]
        fn staff_edit_any_content(owner_id in 1i64..100, is_admin in prop::bool::ANY) {
            let role = if is_admin { UserRole::Admin } else { UserRole::Editor };
            prop_assert!(user(1, role).can_edit(owner_id));
        }

        #[test]
        fn bearer_token_round_trips(token in "[A-Za-z0-9-]{8,40}") {
            let mut map = axum::http::HeaderMap::new();
            map.insert(
                header::AUTHORIZATION,
                format!("Bearer {}", token).parse().unwrap(),
            );
            prop_assert_eq!(extract_session_token(&map), Some(token));
        }
    }
}
