//! Landing page

use crate::models::{CategoryWithCount, FileType, FileView, PostView, SiteSettings};
use crate::services::archive_cache::ArchiveCache;
use crate::services::blog_cache::BlogCache;
use crate::services::settings::{SettingsService, SettingsServiceError};
use serde::Serialize;
use std::sync::Arc;

pub const HOME_LATEST_POSTS: usize = 8;
pub const HOME_LATEST_IMAGES: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct HomePage {
    pub settings: SiteSettings,
    pub categories: Vec<CategoryWithCount>,
    pub latest_posts: Vec<PostView>,
    pub latest_images: Vec<FileView>,
}

pub struct HomeService {
    blog_cache: Arc<BlogCache>,
    archive_cache: Arc<ArchiveCache>,
    settings: Arc<SettingsService>,
}

impl HomeService {
    pub fn new(
        blog_cache: Arc<BlogCache>,
        archive_cache: Arc<ArchiveCache>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            blog_cache,
            archive_cache,
            settings,
        }
    }

    pub async fn home(&self) -> Result<HomePage, SettingsServiceError> {
        let settings = self.settings.get().await?;

        // First list pages are the entries writes invalidate, so reuse them
        let mut latest_posts = self.blog_cache.posts_list(None, None, None, 1).await?.items;
        latest_posts.truncate(HOME_LATEST_POSTS);
        let mut latest_images = self
            .archive_cache
            .files_list(None, Some(FileType::Image), 1)
            .await?
            .items;
        latest_images.truncate(HOME_LATEST_IMAGES);

        Ok(HomePage {
            settings,
            categories: self.blog_cache.categories_with_counts().await?,
            latest_posts,
            latest_images,
        })
    }
}
