//! File archive API endpoints
//!
//! - GET /api/v1/archive - Archive home (recent, featured, categories, totals)
//! - GET /api/v1/archive/files - Public files with search, filters and sort
//! - POST /api/v1/archive/files - Upload a file (multipart, authors)
//! - GET/PUT/DELETE /api/v1/archive/files/{id} - File page, edit, delete
//! - GET /api/v1/archive/files/{id}/download - Stream the stored file
//! - GET/POST /api/v1/archive/files/{id}/comments - File comments
//! - POST /api/v1/archive/files/{id}/like - Toggle a like
//! - GET /api/v1/archive/mine, /users/{username}, /types/{file_type}
//! - PUT /api/v1/archive/files/{id}/moderation - Publish or feature (staff)

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::common::{default_page, non_empty, PageQuery};
use crate::api::middleware::{
    client_ip, user_agent, ApiError, AppState, AuthenticatedUser, MaybeUser,
};
use crate::models::{
    FileCommentView, FileType, FileView, LikeResult, ModerateFileInput, PagedResult,
    UpdateFileInput, UploadFileInput,
};
use crate::services::archive::{
    ArchiveError, ArchiveHome, FileDetail, FileListPage, FileListQuery, FileTypePage, MyFiles,
    UploadedFile,
};

/// Multipart framing and metadata fields on top of the file itself
const MULTIPART_SLACK: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub search: Option<String>,
    /// Category slug
    pub category: Option<String>,
    pub file_type: Option<String>,
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

#[derive(Debug, Deserialize)]
pub struct FileCommentRequest {
    pub content: String,
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ArchiveError::ValidationError(msg) => ApiError::validation_error(msg),
            ArchiveError::Forbidden(msg) => ApiError::forbidden(msg),
            ArchiveError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

pub fn router(max_file_size: u64) -> Router<AppState> {
    Router::new()
        .route("/", get(archive_home))
        .route(
            "/files",
            get(list_files)
                .post(upload_file)
                .layer(DefaultBodyLimit::max(max_file_size as usize + MULTIPART_SLACK)),
        )
        .route(
            "/files/{id}",
            get(file_detail).put(update_file).delete(delete_file),
        )
        .route("/files/{id}/edit", get(edit_file))
        .route("/files/{id}/download", get(download_file))
        .route("/files/{id}/comments", get(list_comments).post(add_comment))
        .route("/files/{id}/like", post(toggle_like))
        .route("/mine", get(my_files))
        .route("/users/{username}", get(user_files))
        .route("/types/{file_type}", get(files_by_type))
}

pub fn staff_router() -> Router<AppState> {
    Router::new().route("/files/{id}/moderation", put(moderate_file))
}

fn parse_file_type(value: &str) -> Result<FileType, ApiError> {
    FileType::parse(value)
        .ok_or_else(|| ApiError::validation_error(format!("Unknown file type: {}", value)))
}

/// Checkbox style flag: present and not "false"/"0"/"off"
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "off" | "no"
    )
}

/// GET /api/v1/archive
async fn archive_home(State(state): State<AppState>) -> Result<Json<ArchiveHome>, ApiError> {
    Ok(Json(state.services.archive.home().await?))
}

/// GET /api/v1/archive/files
async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListPage>, ApiError> {
    let file_type = match non_empty(query.file_type) {
        Some(value) => Some(parse_file_type(&value)?),
        None => None,
    };
    let page = state
        .services
        .archive
        .list(FileListQuery {
            search: non_empty(query.search),
            category: non_empty(query.category),
            file_type,
            sort: non_empty(query.sort),
            page: query.page,
        })
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/archive/files
///
/// Multipart fields: `file` plus optional `title`, `description`,
/// `category_id`, `file_type`, `tags` and `allow_comments`.
async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileView>), ApiError> {
    let mut input = UploadFileInput {
        allow_comments: true,
        ..Default::default()
    };
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
            upload = Some(UploadedFile {
                original_name,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read {}: {}", name, e)))?;
        match name.as_str() {
            "title" => input.title = value,
            "description" => input.description = value,
            "tags" => input.tags = value,
            "allow_comments" => input.allow_comments = parse_flag(&value),
            "category_id" if !value.trim().is_empty() => {
                let id = value
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::validation_error("category_id must be a number"))?;
                input.category_id = Some(id);
            }
            "file_type" if !value.trim().is_empty() => {
                input.file_type = Some(parse_file_type(value.trim())?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::validation_error("No file provided"))?;
    if input.title.trim().is_empty() {
        input.title = upload.original_name.clone();
    }
    let view = state.services.archive.upload(&user.0, input, upload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/archive/files/{id}
async fn file_detail(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<FileDetail>, ApiError> {
    Ok(Json(state.services.archive.detail(id, user.user()).await?))
}

/// GET /api/v1/archive/files/{id}/edit
async fn edit_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FileView>, ApiError> {
    Ok(Json(state.services.archive.get_for_edit(&user.0, id).await?))
}

/// PUT /api/v1/archive/files/{id}
async fn update_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFileInput>,
) -> Result<Json<FileView>, ApiError> {
    Ok(Json(state.services.archive.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/archive/files/{id}
async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.archive.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/archive/files/{id}/download
///
/// Records the download, then streams the file as an attachment.
async fn download_file(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Response, ApiError> {
    let ip = client_ip(request.headers()).unwrap_or_default();
    let agent = user_agent(request.headers());
    let ticket = state
        .services
        .archive
        .download(id, user.user(), &ip, &agent)
        .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&ticket.file_name)
    ))
    .map_err(|e| ApiError::internal_error(format!("Bad download file name: {}", e)))?;

    let response = ServeFile::new(&ticket.path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    let mut response = response.map(Body::new);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// GET /api/v1/archive/files/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<FileCommentView>>, ApiError> {
    Ok(Json(state.services.archive.comments(id).await?))
}

/// POST /api/v1/archive/files/{id}/comments
async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<FileCommentRequest>,
) -> Result<(StatusCode, Json<FileCommentView>), ApiError> {
    let comment = state
        .services
        .archive
        .add_comment(&user.0, id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// POST /api/v1/archive/files/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeResult>, ApiError> {
    Ok(Json(state.services.archive.toggle_like(&user.0, id).await?))
}

/// GET /api/v1/archive/mine
async fn my_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<MyFiles>, ApiError> {
    Ok(Json(state.services.archive.my_files(&user.0, query.page).await?))
}

/// GET /api/v1/archive/users/{username}
async fn user_files(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<FileView>>, ApiError> {
    Ok(Json(
        state.services.archive.user_files(&username, query.page).await?,
    ))
}

/// GET /api/v1/archive/types/{file_type}
async fn files_by_type(
    State(state): State<AppState>,
    Path(file_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FileTypePage>, ApiError> {
    let file_type = FileType::parse(&file_type)
        .ok_or_else(|| ApiError::not_found(format!("Unknown file type: {}", file_type)))?;
    Ok(Json(
        state.services.archive.by_type(file_type, query.page).await?,
    ))
}

/// PUT /api/v1/archive/files/{id}/moderation
async fn moderate_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ModerateFileInput>,
) -> Result<Json<FileView>, ApiError> {
    Ok(Json(state.services.archive.moderate(&user.0, id, body).await?))
}

#[cfg(test)]
mod tests {
    use super::parse_flag;
    use crate::api::test_support::{bearer, login_token, test_server};
    use axum::http::{header, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{json, Value};

    fn corpus_form() -> MultipartForm {
        MultipartForm::new()
            .add_text("title", "Tiny treebank")
            .add_text("description", "Ten sentences, hand annotated")
            .add_text("tags", "treebank, syntax")
            .add_part(
                "file",
                Part::bytes(b"(S (NP I) (VP parse))".to_vec())
                    .file_name("tiny treebank.txt")
                    .mime_type("text/plain"),
            )
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("on"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[tokio::test]
    async fn test_author_upload_waits_for_moderation() {
        let (server, app) = test_server().await;
        app.author("writer").await;
        let author = login_token(&server, "writer").await;
        let admin = login_token(&server, "admin").await;

        let response = server
            .post("/api/v1/archive/files")
            .add_header(header::AUTHORIZATION, bearer(&author))
            .multipart(corpus_form())
            .await;
        response.assert_status(StatusCode::CREATED);
        let file: Value = response.json();
        assert_eq!(file["is_public"], false);
        assert_eq!(file["file_type"], "document");
        let id = file["id"].as_i64().unwrap();

        // Private until staff publish it
        server
            .get(&format!("/api/v1/archive/files/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/v1/archive/files/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&author))
            .await
            .assert_status(StatusCode::OK);

        server
            .put(&format!("/api/v1/archive/files/{}/moderation", id))
            .add_header(header::AUTHORIZATION, bearer(&author))
            .json(&json!({"is_public": true}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .put(&format!("/api/v1/archive/files/{}/moderation", id))
            .add_header(header::AUTHORIZATION, bearer(&admin))
            .json(&json!({"is_public": true}))
            .await
            .assert_status(StatusCode::OK);

        let list: Value = server.get("/api/v1/archive/files?search=treebank").await.json();
        assert_eq!(list["files"]["total"], 1);
    }

    #[tokio::test]
    async fn test_download_streams_attachment_and_counts() {
        let (server, app) = test_server().await;
        let admin = app.admin().await;
        let file = app.upload_file(&admin, "Stopwords list", "").await;

        let response = server
            .get(&format!("/api/v1/archive/files/{}/download", file.id))
            .add_header(
                header::HeaderName::from_static("x-forwarded-for"),
                header::HeaderValue::from_static("10.0.0.7"),
            )
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "contents of Stopwords list");
        let disposition = response.header(header::CONTENT_DISPOSITION);
        assert!(disposition.to_str().unwrap().starts_with("attachment;"));

        let detail = app.archive.detail(file.id, None).await.unwrap();
        assert_eq!(detail.file.file.downloads_count, 1);
    }

    #[tokio::test]
    async fn test_missing_file_on_disk_is_not_found() {
        let (server, app) = test_server().await;
        let admin = app.admin().await;
        let file = app.upload_file(&admin, "Vanishing corpus", "").await;
        std::fs::remove_file(app.archive.media_path(&file.file_path)).unwrap();

        server
            .get(&format!("/api/v1/archive/files/{}/download", file.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_file_comments_and_likes() {
        let (server, app) = test_server().await;
        let admin = app.admin().await;
        app.reader("reader").await;
        let file = app.upload_file(&admin, "Lemma dictionary", "").await;
        let token = login_token(&server, "reader").await;

        server
            .post(&format!("/api/v1/archive/files/{}/comments", file.id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({"content": "ok"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post(&format!("/api/v1/archive/files/{}/comments", file.id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({"content": "Very handy, thanks"}))
            .await
            .assert_status(StatusCode::CREATED);

        let like: Value = server
            .post(&format!("/api/v1/archive/files/{}/like", file.id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .json();
        assert_eq!(like, json!({"liked": true, "likes_count": 1}));

        let comments: Value = server
            .get(&format!("/api/v1/archive/files/{}/comments", file.id))
            .await
            .json();
        assert_eq!(comments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_type_pages() {
        let (server, app) = test_server().await;
        let admin = app.admin().await;
        app.upload_file(&admin, "Frequency list", "").await;

        let page: Value = server.get("/api/v1/archive/types/document").await.json();
        assert_eq!(page["files"]["total"], 1);
        server
            .get("/api/v1/archive/types/hologram")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
