//! Management tasks
//!
//! Backs the `clear-cache`, `optimize-db`, `fix-slugs`,
//! `create-site-settings` and `check-archive-files` commands. Every task
//! returns a report struct; printing is left to the command line.

use crate::cache::keys::DEFAULT_CLEAR_PATTERNS;
use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{
    ArchiveFileRepository, CategoryRepository, PostRepository, TagRepository,
};
use crate::db::{migrations, DynDatabasePool};
use crate::models::SiteSettings;
use crate::services::settings::SettingsService;
use crate::services::slug::{generate_unique_slug, validate_slug};
use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::Row;
use std::path::PathBuf;
use std::sync::Arc;

/// What `clear-cache` removed
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum ClearReport {
    /// The whole cache was flushed
    All,
    /// Keys removed per pattern
    Patterns(Vec<(String, u64)>),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableStats {
    pub name: String,
    pub rows: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizeReport {
    pub migrations_applied: usize,
    pub vacuumed: bool,
    /// `ok` when the integrity check passes
    pub integrity: String,
    /// Filled only when the analysis report was requested
    pub tables: Vec<TableStats>,
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FixSlugsReport {
    pub posts: usize,
    pub categories: usize,
    pub tags: usize,
    pub file_categories: usize,
    pub files: usize,
}

impl FixSlugsReport {
    pub fn total(&self) -> usize {
        self.posts + self.categories + self.tags + self.file_categories + self.files
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingFile {
    pub id: i64,
    pub title: String,
    /// Empty when no file was ever stored
    pub file_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveCheckReport {
    pub total: usize,
    pub ok: usize,
    pub missing: Vec<MissingFile>,
    pub deleted: usize,
}

pub struct MaintenanceService {
    pool: DynDatabasePool,
    cache: Arc<Cache>,
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    file_categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    files: Arc<dyn ArchiveFileRepository>,
    settings: Arc<SettingsService>,
    media_root: PathBuf,
}

impl MaintenanceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        file_categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        files: Arc<dyn ArchiveFileRepository>,
        settings: Arc<SettingsService>,
        media_root: PathBuf,
    ) -> Self {
        Self {
            pool,
            cache,
            posts,
            categories,
            file_categories,
            tags,
            files,
            settings,
            media_root,
        }
    }

    /// Flush everything, one pattern, or the default list namespaces
    pub async fn clear_cache(&self, all: bool, pattern: Option<&str>) -> Result<ClearReport> {
        if all {
            self.cache.clear().await?;
            tracing::info!("Cleared the whole cache");
            return Ok(ClearReport::All);
        }

        let patterns: Vec<String> = match pattern {
            Some(p) => vec![p.to_string()],
            None => DEFAULT_CLEAR_PATTERNS.iter().map(|p| p.to_string()).collect(),
        };
        let mut removed = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let count = self
                .cache
                .delete_pattern(&pattern)
                .await
                .with_context(|| format!("Failed to clear {}", pattern))?;
            tracing::debug!("Removed {} keys matching {}", count, pattern);
            removed.push((pattern, count));
        }
        Ok(ClearReport::Patterns(removed))
    }

    pub async fn optimize_db(&self, vacuum: bool, analyze: bool) -> Result<OptimizeReport> {
        let mut report = OptimizeReport {
            migrations_applied: migrations::run_migrations(&self.pool).await?,
            ..OptimizeReport::default()
        };

        self.pool.execute("ANALYZE").await.context("ANALYZE failed")?;
        if vacuum {
            self.pool.execute("VACUUM").await.context("VACUUM failed")?;
            report.vacuumed = true;
        }

        let sqlite = self.pool.sqlite();
        let row = sqlx::query("PRAGMA integrity_check")
            .fetch_one(sqlite)
            .await
            .context("Integrity check failed")?;
        report.integrity = row.try_get::<String, _>(0)?;
        if report.integrity != "ok" {
            tracing::error!("Database integrity check reported: {}", report.integrity);
        }

        if analyze {
            let tables = sqlx::query(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .fetch_all(sqlite)
            .await?;
            for table in tables {
                let name: String = table.try_get("name")?;
                // Names come from sqlite_master, quoting guards odd characters
                let count = sqlx::query(&format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\"")))
                    .fetch_one(sqlite)
                    .await?;
                report.tables.push(TableStats {
                    name,
                    rows: count.try_get(0)?,
                });
            }

            let indexes = sqlx::query(
                "SELECT name FROM sqlite_master WHERE type = 'index' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .fetch_all(sqlite)
            .await?;
            for index in indexes {
                report.indexes.push(index.try_get("name")?);
            }
        }

        tracing::info!(
            "Database optimized ({} migrations applied, integrity {})",
            report.migrations_applied,
            report.integrity
        );
        Ok(report)
    }

    /// Regenerate empty or malformed slugs
    pub async fn fix_slugs(&self) -> Result<FixSlugsReport> {
        let mut report = FixSlugsReport::default();

        for mut post in self.posts.list_all().await? {
            if validate_slug(&post.slug) {
                continue;
            }
            let posts = self.posts.clone();
            let id = post.id;
            post.slug = generate_unique_slug("post", &post.title, |candidate| {
                let posts = posts.clone();
                async move { posts.slug_exists(&candidate, Some(id)).await }
            })
            .await?;
            self.posts.update(&post).await?;
            report.posts += 1;
        }

        report.categories = fix_category_slugs(&self.categories, "category").await?;
        report.file_categories = fix_category_slugs(&self.file_categories, "category").await?;

        for mut tag in self.tags.list(false).await? {
            if validate_slug(&tag.slug) {
                continue;
            }
            let tags = self.tags.clone();
            let id = tag.id;
            tag.slug = generate_unique_slug("tag", &tag.name, |candidate| {
                let tags = tags.clone();
                async move { tags.slug_exists(&candidate, Some(id)).await }
            })
            .await?;
            self.tags.update(&tag).await?;
            report.tags += 1;
        }

        for mut file in self.files.list_all().await? {
            if validate_slug(&file.slug) {
                continue;
            }
            let files = self.files.clone();
            let id = file.id;
            file.slug = generate_unique_slug("file", &file.title, |candidate| {
                let files = files.clone();
                async move { files.slug_exists(&candidate, Some(id)).await }
            })
            .await?;
            self.files.update(&file).await?;
            report.files += 1;
        }

        if report.total() > 0 {
            self.cache.clear().await?;
        }
        tracing::info!("Fixed {} slugs", report.total());
        Ok(report)
    }

    /// Make sure the settings row exists; the flag tells whether it was created
    pub async fn create_site_settings(&self) -> Result<(SiteSettings, bool)> {
        self.settings.ensure_exists().await
    }

    /// Find archive rows whose stored file is gone, optionally deleting them
    pub async fn check_archive_files(&self, delete: bool) -> Result<ArchiveCheckReport> {
        let mut report = ArchiveCheckReport::default();

        for file in self.files.list_all().await? {
            report.total += 1;
            let present = !file.file_path.is_empty()
                && tokio::fs::try_exists(self.media_root.join(&file.file_path))
                    .await
                    .unwrap_or(false);
            if present {
                report.ok += 1;
                continue;
            }

            tracing::warn!("Archive file #{} ({}) has no stored file", file.id, file.title);
            if delete {
                self.files.delete(file.id).await?;
                report.deleted += 1;
            }
            report.missing.push(MissingFile {
                id: file.id,
                title: file.title,
                file_path: file.file_path,
            });
        }

        if report.deleted > 0 {
            self.cache.clear().await?;
        }
        Ok(report)
    }
}

async fn fix_category_slugs(repo: &Arc<dyn CategoryRepository>, prefix: &str) -> Result<usize> {
    let mut fixed = 0;
    for mut category in repo.list(false).await? {
        if validate_slug(&category.slug) {
            continue;
        }
        let id = category.id;
        category.slug = generate_unique_slug(prefix, &category.name, |candidate| {
            let repo = repo.clone();
            async move { repo.slug_exists(&candidate, Some(id)).await }
        })
        .await?;
        repo.update(&category).await?;
        fixed += 1;
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{cache_key, ns};
    use crate::models::{CreatePostInput, PostStatus};
    use crate::services::archive::UploadedFile;
    use crate::services::test_support::TestApp;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clear_cache_default_patterns() {
        let app = TestApp::new().await;
        let list_key = cache_key(ns::POSTS_LIST, ["all", "all", "all", "1"]);
        let detail_key = cache_key(ns::POST_DETAIL, ["kept"]);
        app.cache.set(&list_key, &1, Duration::ZERO).await.unwrap();
        app.cache.set(&detail_key, &2, Duration::ZERO).await.unwrap();

        let report = app.maintenance.clear_cache(false, None).await.unwrap();
        let ClearReport::Patterns(removed) = report else {
            panic!("expected per-pattern report");
        };
        assert_eq!(removed.len(), DEFAULT_CLEAR_PATTERNS.len());
        assert_eq!(removed[0], ("posts_list:*".to_string(), 1));

        assert!(app.cache.get::<i32>(&list_key).await.unwrap().is_none());
        assert_eq!(app.cache.get::<i32>(&detail_key).await.unwrap(), Some(2));

        assert_eq!(
            app.maintenance.clear_cache(true, None).await.unwrap(),
            ClearReport::All
        );
        assert!(app.cache.get::<i32>(&detail_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_optimize_db_reports() {
        let app = TestApp::new().await;
        let report = app.maintenance.optimize_db(true, true).await.unwrap();
        assert_eq!(report.migrations_applied, 0);
        assert_eq!(report.integrity, "ok");
        assert!(report.vacuumed);
        assert!(report.tables.iter().any(|t| t.name == "posts"));
        assert!(report.indexes.iter().any(|i| i == "idx_posts_author"));
    }

    #[tokio::test]
    async fn test_fix_slugs_repairs_broken_rows() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let post = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Токенизация текста", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();
        sqlx::query("UPDATE posts SET slug = '' WHERE id = ?")
            .bind(post.id)
            .execute(app.pool.sqlite())
            .await
            .unwrap();

        let report = app.maintenance.fix_slugs().await.unwrap();
        assert_eq!(report.posts, 1);
        assert_eq!(report.total(), 1);

        let detail = app.posts.detail("tokenizatsiya-teksta", None).await.unwrap();
        assert_eq!(detail.post.post.id, post.id);

        assert_eq!(app.maintenance.fix_slugs().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_fix_slugs_settles_on_accented_titles() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let post = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Café des_modèles", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();
        assert_eq!(post.slug, "cafe-des-modeles");
        sqlx::query("UPDATE posts SET slug = 'café_des-modèles' WHERE id = ?")
            .bind(post.id)
            .execute(app.pool.sqlite())
            .await
            .unwrap();

        assert_eq!(app.maintenance.fix_slugs().await.unwrap().posts, 1);
        assert_eq!(app.maintenance.fix_slugs().await.unwrap().total(), 0);
        assert!(app.posts.detail("cafe-des-modeles", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_archive_files() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let kept = app
            .archive
            .upload(
                &admin,
                crate::models::UploadFileInput {
                    title: "Kept".into(),
                    ..Default::default()
                },
                UploadedFile {
                    original_name: "kept.txt".into(),
                    data: b"kept".to_vec(),
                },
            )
            .await
            .unwrap();
        let lost = app.upload_file(&admin, "Lost", "").await;
        std::fs::remove_file(app.archive.media_path(&lost.file_path)).unwrap();

        let dry = app.maintenance.check_archive_files(false).await.unwrap();
        assert_eq!(dry.total, 2);
        assert_eq!(dry.ok, 1);
        assert_eq!(dry.missing.len(), 1);
        assert_eq!(dry.missing[0].id, lost.id);
        assert_eq!(dry.deleted, 0);

        let wet = app.maintenance.check_archive_files(true).await.unwrap();
        assert_eq!(wet.deleted, 1);
        let after = app.maintenance.check_archive_files(false).await.unwrap();
        assert_eq!(after.total, 1);
        assert_eq!(after.missing.len(), 0);
        assert!(app.archive.media_path(&kept.file.file_path).exists());
    }

    #[tokio::test]
    async fn test_create_site_settings_once() {
        let app = TestApp::new().await;
        let (settings, created) = app.maintenance.create_site_settings().await.unwrap();
        assert!(created);
        assert_eq!(settings.site_name, "NLPers.ru");
        let (_, again) = app.maintenance.create_site_settings().await.unwrap();
        assert!(!again);
    }
}
