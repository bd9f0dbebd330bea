//! File archive service
//!
//! Uploads land below `{media_root}/archive/files/YYYY/MM/` under a random
//! name; the row keeps the path relative to the media root. Authors upload
//! into moderation, staff uploads are published immediately.

use crate::db::repositories::{
    ArchiveFileRepository, CategoryRepository, FileEngagementRepository, TagLink, TagRepository,
};
use crate::models::{
    file_extension, parse_tag_list, ArchiveFile, FileCategory, FileCategoryWithCount,
    FileCommentView, FileFilter, FileSort, FileType, FileView, LikeResult, ListParams,
    ModerateFileInput, PagedResult, UpdateFileInput, UploadFileInput, User,
    FILE_COMMENT_MIN_CHARS, FILE_TITLE_MAX, MAX_TAGS_PER_FILE,
};
use crate::services::archive_cache::{ArchiveCache, DEFAULT_FILE_WIDGET_LIMIT, FILES_PER_PAGE};
use crate::services::blog_cache::BlogCache;
use crate::services::slug::generate_unique_slug;
use crate::services::tag::{TagService, TagServiceError};
use crate::services::views::ContentViews;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Directory below the media root that holds archive uploads
pub const ARCHIVE_FILES_DIR: &str = "archive/files";
pub const ARCHIVE_HOME_RECENT: usize = 6;
pub const RELATED_FILES_LIMIT: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for ArchiveError {
    fn from(e: TagServiceError) -> Self {
        match e {
            TagServiceError::ValidationError(msg) => ArchiveError::ValidationError(msg),
            TagServiceError::InternalError(e) => ArchiveError::InternalError(e),
            other => ArchiveError::ValidationError(other.to_string()),
        }
    }
}

/// Raw upload as received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct FileListQuery {
    pub search: Option<String>,
    /// File category slug
    pub category: Option<String>,
    pub file_type: Option<FileType>,
    pub sort: Option<String>,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileListPage {
    pub files: PagedResult<FileView>,
    pub categories: Vec<FileCategoryWithCount>,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDetail {
    pub file: FileView,
    pub comments: Vec<FileCommentView>,
    pub related_files: Vec<FileView>,
    pub user_liked: bool,
    pub can_edit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveHome {
    pub recent_files: Vec<FileView>,
    pub featured_files: Vec<FileView>,
    pub categories: Vec<FileCategoryWithCount>,
    pub total_files: i64,
    pub total_downloads: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileCategoryPage {
    pub category: FileCategory,
    pub files: PagedResult<FileView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTypePage {
    pub file_type: FileType,
    pub label: &'static str,
    pub files: PagedResult<FileView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyFiles {
    pub files: PagedResult<FileView>,
    pub total_files: i64,
    pub public_files: i64,
    pub pending_files: i64,
}

/// Everything the HTTP layer needs to stream a download
#[derive(Debug, Clone)]
pub struct DownloadTicket {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: i64,
}

pub struct ArchiveService {
    files: Arc<dyn ArchiveFileRepository>,
    engagement: Arc<dyn FileEngagementRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    tag_service: Arc<TagService>,
    views: Arc<ContentViews>,
    archive_cache: Arc<ArchiveCache>,
    blog_cache: Arc<BlogCache>,
    media_root: PathBuf,
    max_file_size: u64,
}

impl ArchiveService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        files: Arc<dyn ArchiveFileRepository>,
        engagement: Arc<dyn FileEngagementRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        tag_service: Arc<TagService>,
        views: Arc<ContentViews>,
        archive_cache: Arc<ArchiveCache>,
        blog_cache: Arc<BlogCache>,
        media_root: PathBuf,
        max_file_size: u64,
    ) -> Self {
        Self {
            files,
            engagement,
            categories,
            tags,
            tag_service,
            views,
            archive_cache,
            blog_cache,
            media_root,
            max_file_size,
        }
    }

    /// Absolute location of a stored `file_path`
    pub fn media_path(&self, file_path: &str) -> PathBuf {
        self.media_root.join(file_path)
    }

    pub async fn upload(
        &self,
        user: &User,
        input: UploadFileInput,
        upload: UploadedFile,
    ) -> Result<FileView, ArchiveError> {
        if !user.is_author() {
            return Err(ArchiveError::Forbidden(
                "Only authors can upload files".to_string(),
            ));
        }
        let title = validate_title(&input.title)?;
        if upload.data.is_empty() {
            return Err(ArchiveError::ValidationError("File is empty".to_string()));
        }
        if upload.data.len() as u64 > self.max_file_size {
            return Err(ArchiveError::ValidationError(format!(
                "File too large. Maximum size: {} MB",
                self.max_file_size / 1024 / 1024
            )));
        }
        let tag_names = validate_tags(&input.tags)?;
        if let Some(category_id) = input.category_id {
            self.active_category(category_id).await?;
        }

        let files = self.files.clone();
        let slug = generate_unique_slug("file", &title, |candidate| {
            let files = files.clone();
            async move { files.slug_exists(&candidate, None).await }
        })
        .await?;
        let file_path = self.store(&upload).await?;

        let mut file = ArchiveFile::new(title, slug, user.id);
        file.description = input.description.trim().to_string();
        file.file_size = upload.data.len() as i64;
        file.file_type = input
            .file_type
            .unwrap_or_else(|| FileType::from_filename(&upload.original_name));
        file.original_name = upload.original_name;
        file.file_path = file_path;
        file.category_id = input.category_id;
        file.tags = tag_names.join(", ");
        file.allow_comments = input.allow_comments;
        file.is_public = user.is_staff();

        let created = match self.files.create(&file).await {
            Ok(created) => created,
            Err(e) => {
                self.remove_stored(&file.file_path).await;
                return Err(ArchiveError::InternalError(e.context("Failed to save file")));
            }
        };
        self.sync_tags(created.id, &tag_names).await?;

        tracing::info!(
            "{} uploaded {} ({}, {})",
            user.username,
            created.slug,
            created.file_size_display(),
            if created.is_public { "public" } else { "pending moderation" }
        );
        self.invalidate(&created, &user.username, !tag_names.is_empty())
            .await;
        Ok(self.views.file_view(created).await?)
    }

    /// Public files with search, category, type filters and sort
    pub async fn list(&self, query: FileListQuery) -> Result<FileListPage, ArchiveError> {
        let category_id = match query.category.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => Some(self.category_by_slug(slug).await?.id),
            None => None,
        };
        let search = query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let sort = FileSort::from_query(query.sort.as_deref());

        let files = if search.is_none() && sort == FileSort::Newest {
            self.archive_cache
                .files_list(category_id, query.file_type, query.page)
                .await?
        } else {
            let filter = FileFilter {
                search: search.clone(),
                category_id,
                file_type: query.file_type,
                sort,
                ..FileFilter::public()
            };
            self.load_page(&filter, query.page).await?
        };

        Ok(FileListPage {
            files,
            categories: self.archive_cache.file_categories().await?,
            search_query: search,
        })
    }

    /// File page; counts a view
    ///
    /// Private files are visible to their uploader and to staff only.
    pub async fn detail(&self, id: i64, viewer: Option<&User>) -> Result<FileDetail, ArchiveError> {
        let mut view = match self.archive_cache.file_detail(id).await? {
            Some(view) => view,
            None => {
                let file = self.visible_file(id, viewer).await?;
                self.views.file_view(file).await?
            }
        };

        view.file.views_count = self.files.increment_views(id).await?;

        let comments = self.comments(id).await?;
        let related_files = self.related(&view.file).await?;
        let user_liked = match viewer {
            Some(user) => self.engagement.find_like(user.id, id).await?.is_some(),
            None => false,
        };
        let can_edit = viewer.is_some_and(|u| u.can_edit(view.file.uploaded_by));

        Ok(FileDetail {
            file: view,
            comments,
            related_files,
            user_liked,
            can_edit,
        })
    }

    /// Record a download and hand back the stored file
    pub async fn download(
        &self,
        id: i64,
        viewer: Option<&User>,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<DownloadTicket, ArchiveError> {
        let file = self.visible_file(id, viewer).await?;
        if file.file_path.is_empty() {
            return Err(ArchiveError::NotFound("Stored file".to_string()));
        }
        let path = self.media_path(&file.file_path);
        if !is_within(&self.media_root, &path) || !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!("Archive file {} is missing on disk: {}", file.id, path.display());
            return Err(ArchiveError::NotFound("Stored file".to_string()));
        }

        self.engagement
            .record_download(id, viewer.map(|u| u.id), ip_address, user_agent)
            .await?;
        self.files.increment_downloads(id).await?;
        self.archive_cache
            .invalidate_file_cache(Some(id), None, None)
            .await;

        let file_name = if file.original_name.is_empty() {
            format!("{}{}", file.slug, file.file_extension())
        } else {
            file.original_name.clone()
        };
        Ok(DownloadTicket {
            path,
            file_name,
            file_size: file.file_size,
        })
    }

    pub async fn comments(&self, file_id: i64) -> Result<Vec<FileCommentView>, ArchiveError> {
        let comments = self.engagement.list_comments(file_id).await?;
        Ok(self.views.file_comment_views(comments).await?)
    }

    pub async fn add_comment(
        &self,
        user: &User,
        file_id: i64,
        content: &str,
    ) -> Result<FileCommentView, ArchiveError> {
        let file = self.public_file(file_id).await?;
        if !file.allow_comments {
            return Err(ArchiveError::Forbidden(
                "Comments are disabled for this file".to_string(),
            ));
        }
        let content = content.trim();
        if content.chars().count() < FILE_COMMENT_MIN_CHARS {
            return Err(ArchiveError::ValidationError(format!(
                "Comment must be at least {} characters",
                FILE_COMMENT_MIN_CHARS
            )));
        }

        let comment = self
            .engagement
            .create_comment(file_id, user.id, content)
            .await
            .context("Failed to save file comment")?;
        let mut views = self.views.file_comment_views(vec![comment]).await?;
        views
            .pop()
            .ok_or_else(|| ArchiveError::InternalError(anyhow::anyhow!("Comment view missing")))
    }

    pub async fn toggle_like(&self, user: &User, file_id: i64) -> Result<LikeResult, ArchiveError> {
        self.public_file(file_id).await?;

        let liked = match self.engagement.find_like(user.id, file_id).await? {
            Some(like_id) => {
                self.engagement.remove_like(like_id).await?;
                false
            }
            None => {
                self.engagement.add_like(user.id, file_id).await?;
                true
            }
        };
        let likes_count = self.engagement.count_likes(file_id).await?;
        self.files.set_likes_count(file_id, likes_count).await?;
        self.archive_cache
            .invalidate_file_cache(Some(file_id), None, None)
            .await;

        Ok(LikeResult { liked, likes_count })
    }

    /// The signed-in user's uploads in any state
    pub async fn my_files(&self, user: &User, page: u32) -> Result<MyFiles, ArchiveError> {
        let filter = FileFilter {
            uploaded_by: Some(user.id),
            ..FileFilter::default()
        };
        let files = self.load_page(&filter, page).await?;
        let (public_files, pending_files) = self.files.count_by_uploader(user.id).await?;
        Ok(MyFiles {
            files,
            total_files: public_files + pending_files,
            public_files,
            pending_files,
        })
    }

    /// Public files of another user
    pub async fn user_files(
        &self,
        username: &str,
        page: u32,
    ) -> Result<PagedResult<FileView>, ArchiveError> {
        self.archive_cache
            .user_files(username, page)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(format!("User {}", username)))
    }

    pub async fn by_type(&self, file_type: FileType, page: u32) -> Result<FileTypePage, ArchiveError> {
        Ok(FileTypePage {
            file_type,
            label: file_type.label(),
            files: self
                .archive_cache
                .files_list(None, Some(file_type), page)
                .await?,
        })
    }

    pub async fn category_page(&self, slug: &str, page: u32) -> Result<FileCategoryPage, ArchiveError> {
        let category = self.category_by_slug(slug).await?;
        let files = self
            .archive_cache
            .files_list(Some(category.id), None, page)
            .await?;
        Ok(FileCategoryPage { category, files })
    }

    pub async fn home(&self) -> Result<ArchiveHome, ArchiveError> {
        let mut recent_files = self
            .archive_cache
            .recent_files(DEFAULT_FILE_WIDGET_LIMIT)
            .await?;
        recent_files.truncate(ARCHIVE_HOME_RECENT);
        let stats = self.archive_cache.file_statistics().await?;

        Ok(ArchiveHome {
            recent_files,
            featured_files: self
                .archive_cache
                .featured_files(DEFAULT_FILE_WIDGET_LIMIT)
                .await?,
            categories: self.archive_cache.file_categories().await?,
            total_files: stats.total_files,
            total_downloads: stats.total_downloads,
        })
    }

    pub async fn get_for_edit(&self, user: &User, id: i64) -> Result<FileView, ArchiveError> {
        let file = self.owned_file(user, id).await?;
        Ok(self.views.file_view(file).await?)
    }

    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdateFileInput,
    ) -> Result<FileView, ArchiveError> {
        let mut file = self.owned_file(user, id).await?;
        let old_category = file.category_id;

        if let Some(title) = input.title {
            file.title = validate_title(&title)?;
        }
        if let Some(description) = input.description {
            file.description = description.trim().to_string();
        }
        if let Some(category_id) = input.category_id {
            if let Some(id) = category_id {
                self.active_category(id).await?;
            }
            file.category_id = category_id;
        }
        if let Some(file_type) = input.file_type {
            file.file_type = file_type;
        }
        if let Some(allow) = input.allow_comments {
            file.allow_comments = allow;
        }
        let retagged = match input.tags {
            Some(raw) => {
                let names = validate_tags(&raw)?;
                file.tags = names.join(", ");
                Some(names)
            }
            None => None,
        };
        file.updated_at = Utc::now();

        let saved = self
            .files
            .update(&file)
            .await
            .context("Failed to update file")?;
        if let Some(names) = &retagged {
            self.sync_tags(saved.id, names).await?;
        }

        let uploader = self.views.user_brief(saved.uploaded_by).await?;
        if old_category != saved.category_id {
            self.archive_cache
                .invalidate_file_cache(None, old_category, None)
                .await;
        }
        self.invalidate(&saved, &uploader.username, retagged.is_some())
            .await;
        Ok(self.views.file_view(saved).await?)
    }

    /// Remove the row and the stored file
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), ArchiveError> {
        let file = self.owned_file(user, id).await?;
        let uploader = self.views.user_brief(file.uploaded_by).await?;

        self.files.delete(id).await.context("Failed to delete file")?;
        if !file.file_path.is_empty() {
            self.remove_stored(&file.file_path).await;
        }

        tracing::info!("{} deleted archive file {}", user.username, file.slug);
        self.invalidate(&file, &uploader.username, !file.tags.is_empty())
            .await;
        Ok(())
    }

    /// Staff publish / feature switch
    pub async fn moderate(
        &self,
        user: &User,
        id: i64,
        input: ModerateFileInput,
    ) -> Result<FileView, ArchiveError> {
        if !user.is_staff() {
            return Err(ArchiveError::Forbidden(
                "Only staff can moderate files".to_string(),
            ));
        }
        let mut file = self
            .files
            .get_by_id(id)
            .await?
            .ok_or_else(|| ArchiveError::NotFound("File".to_string()))?;
        if let Some(public) = input.is_public {
            file.is_public = public;
        }
        if let Some(featured) = input.is_featured {
            file.is_featured = featured;
        }
        file.updated_at = Utc::now();

        let saved = self
            .files
            .update(&file)
            .await
            .context("Failed to moderate file")?;
        let uploader = self.views.user_brief(saved.uploaded_by).await?;
        tracing::info!(
            "{} moderated {} (public={}, featured={})",
            user.username,
            saved.slug,
            saved.is_public,
            saved.is_featured
        );
        self.invalidate(&saved, &uploader.username, !saved.tags.is_empty())
            .await;
        Ok(self.views.file_view(saved).await?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn store(&self, upload: &UploadedFile) -> Result<String, ArchiveError> {
        let dir = format!("{}/{}", ARCHIVE_FILES_DIR, Utc::now().format("%Y/%m"));
        let name = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            file_extension(&upload.original_name)
        );
        let absolute_dir = self.media_root.join(&dir);
        tokio::fs::create_dir_all(&absolute_dir)
            .await
            .with_context(|| format!("Failed to create {}", absolute_dir.display()))?;
        tokio::fs::write(absolute_dir.join(&name), &upload.data)
            .await
            .context("Failed to write uploaded file")?;
        Ok(format!("{}/{}", dir, name))
    }

    async fn remove_stored(&self, file_path: &str) {
        let path = self.media_path(file_path);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }

    async fn sync_tags(&self, file_id: i64, names: &[String]) -> Result<(), ArchiveError> {
        let tags = self.tag_service.get_or_create_by_names(names).await?;
        let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        self.tags
            .set_links(TagLink::File, file_id, &ids)
            .await
            .context("Failed to link file tags")?;
        Ok(())
    }

    async fn public_file(&self, id: i64) -> Result<ArchiveFile, ArchiveError> {
        match self.files.get_by_id(id).await? {
            Some(file) if file.is_public => Ok(file),
            _ => Err(ArchiveError::NotFound("File".to_string())),
        }
    }

    async fn visible_file(&self, id: i64, viewer: Option<&User>) -> Result<ArchiveFile, ArchiveError> {
        match self.files.get_by_id(id).await? {
            Some(file) if file.is_public => Ok(file),
            Some(file) if viewer.is_some_and(|u| u.can_edit(file.uploaded_by)) => Ok(file),
            _ => Err(ArchiveError::NotFound("File".to_string())),
        }
    }

    async fn owned_file(&self, user: &User, id: i64) -> Result<ArchiveFile, ArchiveError> {
        let file = self
            .files
            .get_by_id(id)
            .await?
            .ok_or_else(|| ArchiveError::NotFound("File".to_string()))?;
        if !user.can_edit(file.uploaded_by) {
            return Err(ArchiveError::Forbidden(
                "You can only change your own files".to_string(),
            ));
        }
        Ok(file)
    }

    async fn active_category(&self, id: i64) -> Result<FileCategory, ArchiveError> {
        match self.categories.get_by_id(id).await? {
            Some(category) if category.is_active => Ok(category),
            _ => Err(ArchiveError::ValidationError(format!(
                "Unknown file category {}",
                id
            ))),
        }
    }

    async fn category_by_slug(&self, slug: &str) -> Result<FileCategory, ArchiveError> {
        match self.categories.get_by_slug(slug).await? {
            Some(category) if category.is_active => Ok(category),
            _ => Err(ArchiveError::NotFound(format!("Category {}", slug))),
        }
    }

    async fn related(&self, file: &ArchiveFile) -> Result<Vec<FileView>, ArchiveError> {
        let Some(category_id) = file.category_id else {
            return Ok(Vec::new());
        };
        let filter = FileFilter {
            category_id: Some(category_id),
            sort: FileSort::MostDownloaded,
            ..FileFilter::public()
        };
        let params = ListParams::new(1, (RELATED_FILES_LIMIT + 1) as u32);
        let files: Vec<ArchiveFile> = self
            .files
            .list(&filter, &params)
            .await?
            .into_iter()
            .filter(|f| f.id != file.id)
            .take(RELATED_FILES_LIMIT)
            .collect();
        Ok(self.views.file_views(files).await?)
    }

    async fn load_page(
        &self,
        filter: &FileFilter,
        page: u32,
    ) -> Result<PagedResult<FileView>, ArchiveError> {
        let total = self.files.count(filter).await?;
        let params = ListParams::new(page, FILES_PER_PAGE).clamped(total);
        let files = self.files.list(filter, &params).await?;
        let items = self.views.file_views(files).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn invalidate(&self, file: &ArchiveFile, uploader: &str, tags_changed: bool) {
        self.archive_cache
            .invalidate_file_cache(Some(file.id), file.category_id, Some(uploader))
            .await;
        // Tag counts include public files
        if tags_changed {
            self.blog_cache.invalidate_post_cache(None, None, None).await;
        }
    }
}

fn validate_title(title: &str) -> Result<String, ArchiveError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArchiveError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > FILE_TITLE_MAX {
        return Err(ArchiveError::ValidationError(format!(
            "Title must be at most {} characters",
            FILE_TITLE_MAX
        )));
    }
    Ok(title.to_string())
}

fn validate_tags(raw: &str) -> Result<Vec<String>, ArchiveError> {
    let names = parse_tag_list(raw);
    if names.len() > MAX_TAGS_PER_FILE {
        return Err(ArchiveError::ValidationError(format!(
            "At most {} tags per file",
            MAX_TAGS_PER_FILE
        )));
    }
    Ok(names)
}

/// `true` when `path` lies inside `root` after normalisation
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.components()
        .all(|c| !matches!(c, std::path::Component::ParentDir))
        && path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateCategoryInput;
    use crate::services::test_support::TestApp;

    fn input(title: &str) -> UploadFileInput {
        UploadFileInput {
            title: title.to_string(),
            allow_comments: true,
            ..Default::default()
        }
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            data: b"%PDF-1.4 test".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_author_upload_waits_for_moderation() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let admin = app.admin().await;

        let view = app
            .archive
            .upload(&author, input("Корпус текстов"), upload("corpus.PDF"))
            .await
            .unwrap();
        assert!(!view.file.is_public);
        assert_eq!(view.file.file_type, FileType::Document);
        assert_eq!(view.file.slug, "korpus-tekstov");
        assert_eq!(view.file_extension, ".pdf");
        assert!(view.file.file_path.starts_with("archive/files/"));
        assert!(app.archive.media_path(&view.file.file_path).exists());

        // Hidden from the public until moderated
        assert!(matches!(
            app.archive.detail(view.file.id, None).await,
            Err(ArchiveError::NotFound(_))
        ));
        assert!(app.archive.detail(view.file.id, Some(&author)).await.is_ok());

        app.archive
            .moderate(
                &admin,
                view.file.id,
                ModerateFileInput {
                    is_public: Some(true),
                    is_featured: Some(true),
                },
            )
            .await
            .unwrap();
        let detail = app.archive.detail(view.file.id, None).await.unwrap();
        // The uploader's own visit counted too
        assert_eq!(detail.file.file.views_count, 2);

        // Served from the cache now, the count still moves
        let seen: Vec<i64> = [
            app.archive.detail(view.file.id, None).await.unwrap(),
            app.archive.detail(view.file.id, None).await.unwrap(),
        ]
        .iter()
        .map(|d| d.file.file.views_count)
        .collect();
        assert_eq!(seen, vec![3, 4]);

        let home = app.archive.home().await.unwrap();
        assert_eq!(home.total_files, 1);
        assert_eq!(home.featured_files.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_permissions_and_limits() {
        let app = TestApp::new().await;
        let reader = app.reader("reader").await;
        let admin = app.admin().await;

        assert!(matches!(
            app.archive.upload(&reader, input("Nope"), upload("a.txt")).await,
            Err(ArchiveError::Forbidden(_))
        ));

        let many_tags = UploadFileInput {
            tags: (0..16).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(","),
            ..input("Tagged")
        };
        assert!(matches!(
            app.archive.upload(&admin, many_tags, upload("a.txt")).await,
            Err(ArchiveError::ValidationError(_))
        ));

        let empty = UploadedFile {
            original_name: "empty.txt".into(),
            data: Vec::new(),
        };
        assert!(matches!(
            app.archive.upload(&admin, input("Empty"), empty).await,
            Err(ArchiveError::ValidationError(_))
        ));

        let staff = app
            .archive
            .upload(&admin, input("Staff upload"), upload("photo.png"))
            .await
            .unwrap();
        assert!(staff.file.is_public);
        assert_eq!(staff.file.file_type, FileType::Image);
    }

    #[tokio::test]
    async fn test_download_records_and_counts() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let view = app
            .archive
            .upload(&admin, input("Dataset"), upload("data.zip"))
            .await
            .unwrap();

        let ticket = app
            .archive
            .download(view.file.id, None, "127.0.0.1", "curl/8")
            .await
            .unwrap();
        assert_eq!(ticket.file_name, "data.zip");
        assert!(ticket.path.exists());

        let home = app.archive.home().await.unwrap();
        assert_eq!(home.total_downloads, 1);
    }

    #[tokio::test]
    async fn test_comments_and_likes() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let reader = app.reader("reader").await;
        let view = app
            .archive
            .upload(&admin, input("Slides"), upload("talk.pptx"))
            .await
            .unwrap();
        let id = view.file.id;

        assert!(matches!(
            app.archive.add_comment(&reader, id, " hi ").await,
            Err(ArchiveError::ValidationError(_))
        ));
        let comment = app
            .archive
            .add_comment(&reader, id, "Great slides")
            .await
            .unwrap();
        assert_eq!(comment.author.username, "reader");

        let liked = app.archive.toggle_like(&reader, id).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.likes_count, 1);
        let unliked = app.archive.toggle_like(&reader, id).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.likes_count, 0);

        let detail = app.archive.detail(id, Some(&reader)).await.unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert!(!detail.user_liked);
        assert!(!detail.can_edit);
    }

    #[tokio::test]
    async fn test_list_filters_and_my_files() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let author = app.author("writer").await;
        let category = app
            .file_categories
            .create(CreateCategoryInput::new("Датасеты"))
            .await
            .unwrap();

        app.archive
            .upload(
                &admin,
                UploadFileInput {
                    category_id: Some(category.id),
                    ..input("Russian corpus")
                },
                upload("ru.zip"),
            )
            .await
            .unwrap();
        app.archive
            .upload(&admin, input("English corpus"), upload("en.zip"))
            .await
            .unwrap();
        app.archive
            .upload(&author, input("Pending corpus"), upload("p.zip"))
            .await
            .unwrap();

        let all = app.archive.list(FileListQuery::default()).await.unwrap();
        assert_eq!(all.files.total, 2);

        let in_category = app
            .archive
            .list(FileListQuery {
                category: Some(category.slug.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_category.files.total, 1);

        let searched = app
            .archive
            .list(FileListQuery {
                search: Some("english".into()),
                sort: Some("title".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.files.items[0].file.title, "English corpus");

        let archives = app.archive.by_type(FileType::Archive, 1).await.unwrap();
        assert_eq!(archives.files.total, 2);
        assert_eq!(archives.label, "Архивы");

        let mine = app.archive.my_files(&author, 1).await.unwrap();
        assert_eq!(mine.total_files, 1);
        assert_eq!(mine.pending_files, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_stored_file() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let other = app.author("other").await;
        let view = app
            .archive
            .upload(&author, input("Scratch"), upload("tmp.txt"))
            .await
            .unwrap();
        let path = app.archive.media_path(&view.file.file_path);

        assert!(matches!(
            app.archive.delete(&other, view.file.id).await,
            Err(ArchiveError::Forbidden(_))
        ));
        app.archive.delete(&author, view.file.id).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_is_within() {
        let root = Path::new("/srv/media");
        assert!(is_within(root, Path::new("/srv/media/archive/files/a.pdf")));
        assert!(!is_within(root, Path::new("/srv/media/../etc/passwd")));
        assert!(!is_within(root, Path::new("/tmp/a.pdf")));
    }
}
