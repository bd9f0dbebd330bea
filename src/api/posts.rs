//! Blog post API endpoints
//!
//! - GET /api/v1/posts - Published posts with search, category filter and sort
//! - GET /api/v1/posts/{slug} - Post detail (counts a view)
//! - POST /api/v1/posts - Create a post (authors)
//! - PUT /api/v1/posts/{id} - Update a post (owner or staff)
//! - DELETE /api/v1/posts/{id} - Delete a post (owner or staff)
//! - GET /api/v1/posts/{id}/edit - Post in any status for the editor
//! - GET /api/v1/posts/mine - Every post of the current user
//! - GET /api/v1/blog - Blog landing page

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, non_empty, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{CreatePostInput, PagedResult, Post, PostView, UpdatePostInput};
use crate::services::post::{BlogHome, PostDetail, PostListPage, PostListQuery};
use crate::services::PostServiceError;

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub search: Option<String>,
    /// Category slug
    pub category: Option<String>,
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(what) => ApiError::not_found(format!("Post not found: {}", what)),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            PostServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/mine", get(my_posts))
        .route(
            "/{slug}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/{slug}/edit", get(get_post_for_edit))
}

/// GET /api/v1/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListPage>, ApiError> {
    let page = state
        .services
        .posts
        .list(PostListQuery {
            search: non_empty(query.search),
            category: non_empty(query.category),
            sort: non_empty(query.sort),
            page: query.page,
        })
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/blog
pub async fn blog_home(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<BlogHome>, ApiError> {
    Ok(Json(state.services.posts.blog_home(query.page).await?))
}

/// GET /api/v1/posts/{slug}
///
/// Drafts and archived posts are not found here; authors read them through
/// the edit endpoint.
async fn get_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    Ok(Json(state.services.posts.detail(&slug, user.user()).await?))
}

/// GET /api/v1/posts/mine
async fn my_posts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<PostView>>, ApiError> {
    Ok(Json(state.services.posts.my_posts(&user.0, query.page).await?))
}

/// POST /api/v1/posts
async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = state.services.posts.create(&user.0, body).await?;
    tracing::info!("{} created post {}", user.0.username, post.slug);
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/posts/{id}/edit
async fn get_post_for_edit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostView>, ApiError> {
    Ok(Json(state.services.posts.get_for_edit(&user.0, id).await?))
}

/// PUT /api/v1/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.services.posts.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.posts.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
