//! Cached archive queries and their invalidation

use crate::cache::keys::{self, cache_key, ns, or_all, ttl};
use crate::cache::{get_or_load, Cache, CacheLayer};
use crate::db::repositories::{ArchiveFileRepository, CategoryRepository, UserRepository};
use crate::models::{
    FileCategoryWithCount, FileFilter, FileSort, FileStatistics, FileType, FileView, ListParams,
    PagedResult,
};
use crate::services::views::ContentViews;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const FILES_PER_PAGE: u32 = 12;
pub const DEFAULT_FILE_WIDGET_LIMIT: i64 = 8;
pub const POPULAR_FILES_WINDOW_DAYS: i64 = 30;

pub struct ArchiveCache {
    cache: Arc<Cache>,
    files: Arc<dyn ArchiveFileRepository>,
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
    views: Arc<ContentViews>,
}

impl ArchiveCache {
    pub fn new(
        cache: Arc<Cache>,
        files: Arc<dyn ArchiveFileRepository>,
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
        views: Arc<ContentViews>,
    ) -> Self {
        Self {
            cache,
            files,
            categories,
            users,
            views,
        }
    }

    /// Public files, newest first, twelve per page
    pub async fn files_list(
        &self,
        category_id: Option<i64>,
        file_type: Option<FileType>,
        page: u32,
    ) -> Result<PagedResult<FileView>> {
        let page = page.max(1);
        let key = cache_key(
            ns::FILES_LIST,
            [
                or_all(category_id),
                or_all(file_type.map(|t| t.as_str())),
                page.to_string(),
            ],
        );

        get_or_load(&self.cache, &key, ttl::FILES_LIST, || async move {
            let filter = FileFilter {
                category_id,
                file_type,
                ..FileFilter::public()
            };
            self.load_page(&filter, page).await
        })
        .await
    }

    pub async fn featured_files(&self, limit: i64) -> Result<Vec<FileView>> {
        let key = cache_key(ns::FEATURED_FILES, [limit.to_string()]);
        get_or_load(&self.cache, &key, ttl::FEATURED_FILES, || async move {
            let filter = FileFilter {
                featured_only: true,
                ..FileFilter::public()
            };
            self.load_top(&filter, limit).await
        })
        .await
    }

    pub async fn recent_files(&self, limit: i64) -> Result<Vec<FileView>> {
        let key = cache_key(ns::RECENT_FILES, [limit.to_string()]);
        get_or_load(&self.cache, &key, ttl::RECENT_FILES, || async move {
            self.load_top(&FileFilter::public(), limit).await
        })
        .await
    }

    /// Most downloaded public files uploaded in the last 30 days
    pub async fn popular_files(&self, limit: i64) -> Result<Vec<FileView>> {
        let key = cache_key(ns::POPULAR_FILES, [limit.to_string()]);
        get_or_load(&self.cache, &key, ttl::POPULAR_FILES, || async move {
            let since = Utc::now() - Duration::days(POPULAR_FILES_WINDOW_DAYS);
            let files = self.files.popular_since(since, limit).await?;
            self.views.file_views(files).await
        })
        .await
    }

    /// Active file categories with public file counts, by name
    pub async fn file_categories(&self) -> Result<Vec<FileCategoryWithCount>> {
        let key = cache_key(ns::FILE_CATEGORIES, std::iter::empty::<&str>());
        get_or_load(&self.cache, &key, ttl::FILE_CATEGORIES, || async move {
            let rows = self.categories.list_with_counts().await?;
            Ok(rows
                .into_iter()
                .map(|(category, files_count)| FileCategoryWithCount {
                    category,
                    files_count,
                })
                .collect())
        })
        .await
    }

    /// A public file card; private files are never served from here
    pub async fn file_detail(&self, id: i64) -> Result<Option<FileView>> {
        let key = cache_key(ns::FILE_DETAIL, [id.to_string()]);
        if let Some(hit) = self.cache.get::<FileView>(&key).await.ok().flatten() {
            return Ok(Some(hit));
        }

        let file = match self.files.get_by_id(id).await? {
            Some(file) if file.is_public => file,
            _ => return Ok(None),
        };
        let view = self.views.file_view(file).await?;
        let _ = self.cache.set(&key, &view, ttl::FILE_DETAIL).await;
        Ok(Some(view))
    }

    /// Public files of `username`; `None` when the user does not exist
    pub async fn user_files(
        &self,
        username: &str,
        page: u32,
    ) -> Result<Option<PagedResult<FileView>>> {
        let page = page.max(1);
        let key = cache_key(ns::USER_FILES, [username.to_string(), page.to_string()]);
        if let Some(hit) = self.cache.get::<PagedResult<FileView>>(&key).await.ok().flatten() {
            return Ok(Some(hit));
        }

        let user = match self.users.get_by_username(username).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let filter = FileFilter {
            uploaded_by: Some(user.id),
            ..FileFilter::public()
        };
        let result = self.load_page(&filter, page).await?;
        let _ = self.cache.set(&key, &result, ttl::USER_FILES).await;
        Ok(Some(result))
    }

    pub async fn file_statistics(&self) -> Result<FileStatistics> {
        let key = cache_key(ns::FILE_STATISTICS, std::iter::empty::<&str>());
        get_or_load(&self.cache, &key, ttl::FILE_STATISTICS, || async move {
            let mut stats = self.files.statistics().await?;
            stats.total_categories = self.categories.count_active().await?;
            Ok(stats)
        })
        .await
    }

    /// Drop the entries an archive write can make stale
    ///
    /// The first unfiltered page, the three widgets, the category list and
    /// the statistics always go. A file id, category id or uploader name
    /// additionally removes that file's detail, the category's first pages
    /// and the uploader's first pages.
    pub async fn invalidate_file_cache(
        &self,
        file_id: Option<i64>,
        category_id: Option<i64>,
        username: Option<&str>,
    ) {
        let limit = DEFAULT_FILE_WIDGET_LIMIT.to_string();
        let mut doomed = vec![
            cache_key(ns::FILES_LIST, [keys::ALL, keys::ALL, "1"]),
            cache_key(ns::FEATURED_FILES, [limit.as_str()]),
            cache_key(ns::RECENT_FILES, [limit.as_str()]),
            cache_key(ns::POPULAR_FILES, [limit.as_str()]),
            cache_key(ns::FILE_CATEGORIES, std::iter::empty::<&str>()),
            cache_key(ns::FILE_STATISTICS, std::iter::empty::<&str>()),
        ];

        if let Some(id) = file_id {
            doomed.push(cache_key(ns::FILE_DETAIL, [id.to_string()]));
        }
        for page in 1..=keys::INVALIDATED_PAGES {
            let page = page.to_string();
            if let Some(category_id) = category_id {
                doomed.push(cache_key(
                    ns::FILES_LIST,
                    [category_id.to_string().as_str(), keys::ALL, page.as_str()],
                ));
            }
            if let Some(username) = username {
                doomed.push(cache_key(ns::USER_FILES, [username, page.as_str()]));
            }
        }

        for key in &doomed {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!("Failed to delete cache key {}: {}", key, e);
            }
        }
        tracing::debug!(
            "Invalidated {} archive cache entries (file={:?}, category={:?}, user={:?})",
            doomed.len(),
            file_id,
            category_id,
            username
        );
    }

    async fn load_page(&self, filter: &FileFilter, page: u32) -> Result<PagedResult<FileView>> {
        let total = self.files.count(filter).await?;
        let params = ListParams::new(page, FILES_PER_PAGE).clamped(total);
        let files = self.files.list(filter, &params).await?;
        let items = self.views.file_views(files).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn load_top(&self, filter: &FileFilter, limit: i64) -> Result<Vec<FileView>> {
        let filter = FileFilter {
            sort: FileSort::Newest,
            ..filter.clone()
        };
        let params = ListParams::new(1, limit.clamp(1, 100) as u32);
        let files = self.files.list(&filter, &params).await?;
        self.views.file_views(files).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        CategoryKind, SqlxArchiveFileRepository, SqlxCategoryRepository, SqlxProfileRepository,
        SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArchiveFile, Category, User, UserRole};

    struct Fixture {
        archive: ArchiveCache,
        files: Arc<dyn ArchiveFileRepository>,
        categories: Arc<dyn CategoryRepository>,
        owner_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = create_cache(&CacheConfig::default()).await.unwrap();

        let users = SqlxUserRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Archive);
        let files = SqlxArchiveFileRepository::boxed(pool.clone());
        let views = Arc::new(ContentViews::new(
            users.clone(),
            SqlxProfileRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Blog),
            categories.clone(),
            SqlxTagRepository::boxed(pool.clone()),
        ));
        let owner = users
            .create(&User::new("owner".into(), "o@x.ru".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();

        Fixture {
            archive: ArchiveCache::new(cache, files.clone(), categories.clone(), users, views),
            files,
            categories,
            owner_id: owner.id,
        }
    }

    async fn upload(fx: &Fixture, slug: &str, file_type: FileType, public: bool) -> ArchiveFile {
        let mut file = ArchiveFile::new(slug.to_uppercase(), slug.into(), fx.owner_id);
        file.file_type = file_type;
        file.is_public = public;
        file.file_size = 1536;
        file.file_path = format!("archive/files/{}.PDF", slug);
        fx.files.create(&file).await.unwrap()
    }

    #[tokio::test]
    async fn test_files_list_public_only_and_invalidation() {
        let fx = setup().await;
        upload(&fx, "one", FileType::Document, true).await;
        upload(&fx, "hidden", FileType::Document, false).await;

        let page = fx.archive.files_list(None, None, 1).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].file_size_display, "1.5 KB");
        assert_eq!(page.items[0].file_extension, ".pdf");

        upload(&fx, "two", FileType::Image, true).await;
        assert_eq!(fx.archive.files_list(None, None, 1).await.unwrap().total, 1);

        fx.archive.invalidate_file_cache(None, None, None).await;
        assert_eq!(fx.archive.files_list(None, None, 1).await.unwrap().total, 2);
        assert_eq!(
            fx.archive
                .files_list(None, Some(FileType::Image), 1)
                .await
                .unwrap()
                .total,
            1
        );
    }

    #[tokio::test]
    async fn test_file_detail_hides_private() {
        let fx = setup().await;
        let hidden = upload(&fx, "secret", FileType::Other, false).await;
        let shown = upload(&fx, "open", FileType::Other, true).await;

        assert!(fx.archive.file_detail(hidden.id).await.unwrap().is_none());
        let detail = fx.archive.file_detail(shown.id).await.unwrap().unwrap();
        assert_eq!(detail.uploader.username, "owner");
    }

    #[tokio::test]
    async fn test_user_files_unknown_user() {
        let fx = setup().await;
        upload(&fx, "mine", FileType::Audio, true).await;

        assert!(fx.archive.user_files("nobody", 1).await.unwrap().is_none());
        let files = fx.archive.user_files("owner", 1).await.unwrap().unwrap();
        assert_eq!(files.total, 1);
    }

    #[tokio::test]
    async fn test_statistics_and_categories() {
        let fx = setup().await;
        let datasets = fx
            .categories
            .create(&Category::new("Datasets".into(), "datasets".into()))
            .await
            .unwrap();
        let mut file = upload(&fx, "corpus", FileType::Archive, true).await;
        file.category_id = Some(datasets.id);
        fx.files.update(&file).await.unwrap();
        fx.files.increment_downloads(file.id).await.unwrap();
        upload(&fx, "pic", FileType::Image, true).await;

        let stats = fx.archive.file_statistics().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_downloads, 1);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.files_by_type[&FileType::Image], 1);

        let categories = fx.archive.file_categories().await.unwrap();
        assert_eq!(categories[0].files_count, 1);
    }

    #[tokio::test]
    async fn test_widgets() {
        let fx = setup().await;
        let mut featured = upload(&fx, "star", FileType::Video, true).await;
        featured.is_featured = true;
        fx.files.update(&featured).await.unwrap();
        upload(&fx, "plain", FileType::Video, true).await;

        let featured_list = fx.archive.featured_files(8).await.unwrap();
        assert_eq!(featured_list.len(), 1);
        assert_eq!(fx.archive.recent_files(8).await.unwrap().len(), 2);
        assert_eq!(fx.archive.popular_files(8).await.unwrap().len(), 2);
    }
}
