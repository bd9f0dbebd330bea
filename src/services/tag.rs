//! Tag service
//!
//! Tags are shared by posts and archive files. This service owns:
//! - Tag CRUD (staff)
//! - Get-or-create from the comma separated `tags` field of posts and files
//! - The tag page, which merges posts and public files carrying a tag

use crate::db::repositories::{ArchiveFileRepository, PostRepository, TagRepository};
use crate::models::{
    is_valid_hex_color, CreateTagInput, FileFilter, FileView, ListParams, PagedResult, PostFilter,
    PostView, Tag, TagWithCount, UpdateTagInput, TAG_NAME_MAX,
};
use crate::services::blog_cache::BlogCache;
use crate::services::slug::generate_unique_slug;
use crate::services::views::ContentViews;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const TAG_PAGE_SIZE: u32 = 12;
/// Batch size used when collecting everything under a tag
const COLLECT_BATCH: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Tag already exists: {0}")]
    DuplicateName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// One entry of the tag page
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "object", rename_all = "lowercase")]
pub enum TaggedItem {
    Post(PostView),
    File(FileView),
}

impl TaggedItem {
    pub fn title(&self) -> &str {
        match self {
            TaggedItem::Post(p) => &p.post.title,
            TaggedItem::File(f) => &f.file.title,
        }
    }

    /// Post excerpt or file description
    pub fn excerpt(&self) -> &str {
        match self {
            TaggedItem::Post(p) => &p.post.excerpt,
            TaggedItem::File(f) => &f.file.description,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            TaggedItem::Post(p) => p.post.published_at.unwrap_or(p.post.created_at),
            TaggedItem::File(f) => f.file.uploaded_at,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.title().to_lowercase().contains(needle)
            || self.excerpt().to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagPage {
    pub tag: Tag,
    pub content: PagedResult<TaggedItem>,
    pub total_posts: i64,
    pub total_files: i64,
    pub total_content: i64,
    pub search_query: Option<String>,
}

/// Tag cloud with site totals
#[derive(Debug, Clone, Serialize)]
pub struct TagIndex {
    pub tags: Vec<TagWithCount>,
    pub total_posts: i64,
    pub total_tags: i64,
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    posts: Arc<dyn PostRepository>,
    files: Arc<dyn ArchiveFileRepository>,
    views: Arc<ContentViews>,
    blog_cache: Arc<BlogCache>,
}

impl TagService {
    pub fn new(
        repo: Arc<dyn TagRepository>,
        posts: Arc<dyn PostRepository>,
        files: Arc<dyn ArchiveFileRepository>,
        views: Arc<ContentViews>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            repo,
            posts,
            files,
            views,
            blog_cache,
        }
    }

    /// Active tags with counts, by name
    pub async fn index(&self) -> Result<TagIndex, TagServiceError> {
        let tags = self.blog_cache.tags_with_counts().await?;
        let total_posts = self.posts.count_published(&PostFilter::default()).await?;
        Ok(TagIndex {
            total_tags: tags.len() as i64,
            tags,
            total_posts,
        })
    }

    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list(false).await?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Tag, TagServiceError> {
        match self.repo.get_by_slug(slug).await? {
            Some(tag) if tag.is_active => Ok(tag),
            _ => Err(TagServiceError::NotFound(slug.to_string())),
        }
    }

    pub async fn create(&self, input: CreateTagInput) -> Result<Tag, TagServiceError> {
        let name = validate_name(&input.name)?;
        if self.repo.get_by_name(&name).await?.is_some() {
            return Err(TagServiceError::DuplicateName(name));
        }

        let mut tag = Tag::new(name.clone(), self.unique_slug(&name, None).await?);
        tag.description = input.description;
        tag.icon = input.icon;
        if let Some(color) = input.color {
            tag.color = validate_color(color)?;
        }

        let created = self.repo.create(&tag).await.context("Failed to create tag")?;
        self.blog_cache
            .invalidate_post_cache(None, None, Some(&created.slug))
            .await;
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdateTagInput) -> Result<Tag, TagServiceError> {
        let mut tag = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| TagServiceError::NotFound(id.to_string()))?;
        let old_slug = tag.slug.clone();

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if name != tag.name {
                if let Some(existing) = self.repo.get_by_name(&name).await? {
                    if existing.id != id {
                        return Err(TagServiceError::DuplicateName(name));
                    }
                }
                tag.slug = self.unique_slug(&name, Some(id)).await?;
                tag.name = name;
            }
        }
        if let Some(description) = input.description {
            tag.description = description;
        }
        if let Some(color) = input.color {
            tag.color = validate_color(color)?;
        }
        if let Some(icon) = input.icon {
            tag.icon = icon;
        }
        if let Some(is_active) = input.is_active {
            tag.is_active = is_active;
        }

        let updated = self.repo.update(&tag).await.context("Failed to update tag")?;
        if old_slug != updated.slug {
            self.blog_cache
                .invalidate_post_cache(None, None, Some(&old_slug))
                .await;
        }
        self.blog_cache
            .invalidate_post_cache(None, None, Some(&updated.slug))
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        let tag = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| TagServiceError::NotFound(id.to_string()))?;
        self.repo.delete(id).await.context("Failed to delete tag")?;
        self.blog_cache
            .invalidate_post_cache(None, None, Some(&tag.slug))
            .await;
        Ok(())
    }

    /// Tags for `names`, creating the missing ones
    ///
    /// Names are matched exactly; new tags get a unique transliterated slug.
    pub async fn get_or_create_by_names(&self, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let name = validate_name(name)?;
            let tag = match self.repo.get_by_name(&name).await? {
                Some(tag) => tag,
                None => {
                    let slug = self.unique_slug(&name, None).await?;
                    let created = self
                        .repo
                        .create(&Tag::new(name, slug))
                        .await
                        .context("Failed to create tag")?;
                    tracing::debug!("Created tag {}", created.slug);
                    created
                }
            };
            tags.push(tag);
        }
        Ok(tags)
    }

    /// Published posts and public files with the tag, newest first
    ///
    /// `search` keeps items whose title or excerpt contains it, ignoring case.
    pub async fn tag_page(
        &self,
        slug: &str,
        search: Option<&str>,
        page: u32,
    ) -> Result<TagPage, TagServiceError> {
        let tag = self.get_by_slug(slug).await?;

        let post_filter = PostFilter {
            tag_slug: Some(tag.slug.clone()),
            ..PostFilter::default()
        };
        let file_filter = FileFilter {
            tag_slug: Some(tag.slug.clone()),
            ..FileFilter::public()
        };

        let total_posts = self.posts.count_published(&post_filter).await?;
        let total_files = self.files.count(&file_filter).await?;

        let mut items = Vec::new();
        for batch in 1..=batches(total_posts) {
            let params = ListParams::new(batch, COLLECT_BATCH);
            let posts = self.posts.list_published(&post_filter, &params).await?;
            items.extend(
                self.views
                    .post_views(posts)
                    .await?
                    .into_iter()
                    .map(TaggedItem::Post),
            );
        }
        for batch in 1..=batches(total_files) {
            let params = ListParams::new(batch, COLLECT_BATCH);
            let files = self.files.list(&file_filter, &params).await?;
            items.extend(
                self.views
                    .file_views(files)
                    .await?
                    .into_iter()
                    .map(TaggedItem::File),
            );
        }
        items.sort_by_key(|item| std::cmp::Reverse(item.date()));

        let search_query = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(query) = &search_query {
            let needle = query.to_lowercase();
            items.retain(|item| item.matches(&needle));
        }

        Ok(TagPage {
            tag,
            content: paginate(items, page, TAG_PAGE_SIZE),
            total_posts,
            total_files,
            total_content: total_posts + total_files,
            search_query,
        })
    }

    async fn unique_slug(&self, name: &str, exclude_id: Option<i64>) -> Result<String, TagServiceError> {
        let repo = self.repo.clone();
        let slug = generate_unique_slug("tag", name, |candidate| {
            let repo = repo.clone();
            async move { repo.slug_exists(&candidate, exclude_id).await }
        })
        .await?;
        Ok(slug)
    }
}

fn validate_name(name: &str) -> Result<String, TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > TAG_NAME_MAX {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name must be at most {} characters",
            TAG_NAME_MAX
        )));
    }
    Ok(name.to_string())
}

fn validate_color(color: String) -> Result<String, TagServiceError> {
    if is_valid_hex_color(&color) {
        Ok(color)
    } else {
        Err(TagServiceError::ValidationError(format!(
            "Invalid color: {}",
            color
        )))
    }
}

fn batches(total: i64) -> u32 {
    ((total.max(0) as u64).div_ceil(COLLECT_BATCH as u64)) as u32
}

/// Page an in-memory list, clamping the page like the database listings do
pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> PagedResult<T> {
    let total = items.len() as i64;
    let params = ListParams::new(page, per_page).clamped(total);
    let items = items
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    PagedResult::new(items, total, &params)
}
