//! Category API endpoints
//!
//! Blog categories live under /api/v1/categories and archive file categories
//! under /api/v1/archive/categories. Listing and category pages are public;
//! create, update and delete need staff.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::api::common::PageQuery;
use crate::api::middleware::{ApiError, AppState, MaybeUser};
use crate::db::repositories::CategoryKind;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::archive::FileCategoryPage;
use crate::services::post::CategoryPage;
use crate::services::{CategoryService, CategoryServiceError};

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(name) => ApiError::with_details(
                "CONFLICT",
                format!("Category name already exists: {}", name),
                serde_json::json!({"field": "name", "value": name}),
            ),
            CategoryServiceError::DuplicateSlug(slug) => ApiError::with_details(
                "CONFLICT",
                format!("Category slug already exists: {}", slug),
                serde_json::json!({"field": "slug", "value": slug}),
            ),
            CategoryServiceError::NotFound(what) => {
                ApiError::not_found(format!("Category not found: {}", what))
            }
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CategoryServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

fn categories(state: &AppState, kind: CategoryKind) -> &Arc<CategoryService> {
    match kind {
        CategoryKind::Blog => &state.services.blog_categories,
        CategoryKind::Archive => &state.services.file_categories,
    }
}

/// Public blog category routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_blog_categories))
        .route("/{slug}", get(blog_category_page))
}

/// Staff blog category routes
pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_blog_category))
        .route("/{slug}", put(update_blog_category).delete(delete_blog_category))
}

/// Public archive category routes
pub fn archive_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_file_categories))
        .route("/{slug}", get(file_category_page))
}

/// Staff archive category routes
pub fn archive_staff_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_file_category))
        .route("/{slug}", put(update_file_category).delete(delete_file_category))
}

// ============================================================================
// Shared handlers
// ============================================================================

async fn list(state: &AppState, kind: CategoryKind) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(categories(state, kind).list(true).await?))
}

async fn create(
    state: &AppState,
    kind: CategoryKind,
    input: CreateCategoryInput,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = categories(state, kind).create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    state: &AppState,
    kind: CategoryKind,
    id: i64,
    input: UpdateCategoryInput,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(categories(state, kind).update(id, input).await?))
}

async fn delete(state: &AppState, kind: CategoryKind, id: i64) -> Result<StatusCode, ApiError> {
    categories(state, kind).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Blog categories
// ============================================================================

/// GET /api/v1/categories
async fn list_blog_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    list(&state, CategoryKind::Blog).await
}

/// GET /api/v1/categories/{slug} - Published posts of the category
async fn blog_category_page(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryPage>, ApiError> {
    let page = state
        .services
        .posts
        .category_page(&slug, query.page, user.user())
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/categories
async fn create_blog_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    create(&state, CategoryKind::Blog, body).await
}

/// PUT /api/v1/categories/{id}
async fn update_blog_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    update(&state, CategoryKind::Blog, id, body).await
}

/// DELETE /api/v1/categories/{id}
async fn delete_blog_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    delete(&state, CategoryKind::Blog, id).await
}

// ============================================================================
// Archive file categories
// ============================================================================

/// GET /api/v1/archive/categories
async fn list_file_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    list(&state, CategoryKind::Archive).await
}

/// GET /api/v1/archive/categories/{slug} - Public files of the category
async fn file_category_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FileCategoryPage>, ApiError> {
    Ok(Json(
        state.services.archive.category_page(&slug, query.page).await?,
    ))
}

/// POST /api/v1/archive/categories
async fn create_file_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    create(&state, CategoryKind::Archive, body).await
}

/// PUT /api/v1/archive/categories/{id}
async fn update_file_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    update(&state, CategoryKind::Archive, id, body).await
}

/// DELETE /api/v1/archive/categories/{id}
async fn delete_file_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    delete(&state, CategoryKind::Archive, id).await
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, login_token, test_server};
    use axum::http::{header, StatusCode};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_staff_creates_category_and_readers_cannot() {
        let (server, app) = test_server().await;
        app.reader("reader").await;
        let admin_token = login_token(&server, "admin").await;
        let reader_token = login_token(&server, "reader").await;

        let response = server
            .post("/api/v1/categories")
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .json(&json!({"name": "Machine Translation"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let category: Value = response.json();
        assert_eq!(category["slug"], "machine-translation");

        server
            .post("/api/v1/categories")
            .add_header(header::AUTHORIZATION, bearer(&reader_token))
            .json(&json!({"name": "Sneaky"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let list: Value = server.get("/api/v1/categories").await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_category_name_conflicts() {
        let (server, _app) = test_server().await;
        let token = login_token(&server, "admin").await;
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            server
                .post("/api/v1/archive/categories")
                .add_header(header::AUTHORIZATION, bearer(&token))
                .json(&json!({"name": "Datasets"}))
                .await
                .assert_status(expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_category_page_is_not_found() {
        let (server, _app) = test_server().await;
        server
            .get("/api/v1/categories/nothing-here")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
