//! Archive file repository
//!
//! Database operations for uploaded archive files.
//!
//! This module provides:
//! - `ArchiveFileRepository` trait defining the interface for file data access
//! - `SqlxArchiveFileRepository` implementing the trait for SQLite

use crate::db::DynDatabasePool;
use crate::models::{ArchiveFile, FileFilter, FileStatistics, FileType, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

const FILE_COLUMNS: &str = "f.id, f.title, f.slug, f.description, f.file_path, f.original_name, \
     f.file_size, f.thumbnail, f.file_type, f.category_id, f.uploaded_by, f.tags, \
     f.downloads_count, f.views_count, f.likes_count, f.is_public, f.is_featured, \
     f.allow_comments, f.uploaded_at, f.updated_at";

#[async_trait]
pub trait ArchiveFileRepository: Send + Sync {
    async fn create(&self, file: &ArchiveFile) -> Result<ArchiveFile>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ArchiveFile>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArchiveFile>>;

    /// Write every editable column of an existing file
    async fn update(&self, file: &ArchiveFile) -> Result<ArchiveFile>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// One page of files matching `filter`
    async fn list(&self, filter: &FileFilter, params: &ListParams) -> Result<Vec<ArchiveFile>>;

    async fn count(&self, filter: &FileFilter) -> Result<i64>;

    /// Public files uploaded since `since`, most downloaded first
    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ArchiveFile>>;

    /// Count one view, returning the new total
    async fn increment_views(&self, id: i64) -> Result<i64>;

    async fn increment_downloads(&self, id: i64) -> Result<()>;

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()>;

    /// `(public, pending)` counts for an uploader
    async fn count_by_uploader(&self, user_id: i64) -> Result<(i64, i64)>;

    /// Public file aggregates; `total_categories` is left for the caller
    async fn statistics(&self) -> Result<FileStatistics>;

    /// Every file, for maintenance passes
    async fn list_all(&self) -> Result<Vec<ArchiveFile>>;
}

pub struct SqlxArchiveFileRepository {
    pool: DynDatabasePool,
}

impl SqlxArchiveFileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArchiveFileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArchiveFileRepository for SqlxArchiveFileRepository {
    async fn create(&self, file: &ArchiveFile) -> Result<ArchiveFile> {
        create_file_sqlite(self.pool.sqlite(), file).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ArchiveFile>> {
        let sql = format!("SELECT {} FROM archive_files f WHERE f.id = ?", FILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get file by ID")?;
        row.as_ref().map(row_to_file_sqlite).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArchiveFile>> {
        let sql = format!("SELECT {} FROM archive_files f WHERE f.slug = ?", FILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get file by slug")?;
        row.as_ref().map(row_to_file_sqlite).transpose()
    }

    async fn update(&self, file: &ArchiveFile) -> Result<ArchiveFile> {
        update_file_sqlite(self.pool.sqlite(), file).await?;
        self.get_by_id(file.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("File not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM archive_files WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete file")?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row =
            sqlx::query("SELECT COUNT(*) AS count FROM archive_files WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(self.pool.sqlite())
                .await
                .context("Failed to check file slug")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn list(&self, filter: &FileFilter, params: &ListParams) -> Result<Vec<ArchiveFile>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {}", FILE_COLUMNS));
        push_file_filters(&mut query, filter);
        query.push(" ORDER BY ");
        query.push(filter.sort.order_by());
        query.push(" LIMIT ");
        query.push_bind(params.limit());
        query.push(" OFFSET ");
        query.push_bind(params.offset());

        let rows = query
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list files")?;
        rows.iter().map(row_to_file_sqlite).collect()
    }

    async fn count(&self, filter: &FileFilter) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS count");
        push_file_filters(&mut query, filter);
        let row = query
            .build()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count files")?;
        Ok(row.get("count"))
    }

    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ArchiveFile>> {
        let sql = format!(
            r#"
            SELECT {} FROM archive_files f
            WHERE f.is_public = 1 AND f.uploaded_at >= ?
            ORDER BY f.downloads_count DESC, f.uploaded_at DESC
            LIMIT ?
            "#,
            FILE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(limit)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list popular files")?;
        rows.iter().map(row_to_file_sqlite).collect()
    }

    async fn increment_views(&self, id: i64) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE archive_files SET views_count = views_count + 1 WHERE id = ? RETURNING views_count",
        )
        .bind(id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to increment file views")?;
        Ok(row.get("views_count"))
    }

    async fn increment_downloads(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE archive_files SET downloads_count = downloads_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to increment file downloads")?;
        Ok(())
    }

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()> {
        sqlx::query("UPDATE archive_files SET likes_count = ? WHERE id = ?")
            .bind(count.max(0))
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update file likes")?;
        Ok(())
    }

    async fn count_by_uploader(&self, user_id: i64) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(CASE WHEN is_public = 1 THEN 1 ELSE 0 END), 0) AS public_count,
                   COALESCE(SUM(CASE WHEN is_public = 0 THEN 1 ELSE 0 END), 0) AS pending_count
            FROM archive_files
            WHERE uploaded_by = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count uploader files")?;
        Ok((row.get("public_count"), row.get("pending_count")))
    }

    async fn statistics(&self) -> Result<FileStatistics> {
        statistics_sqlite(self.pool.sqlite()).await
    }

    async fn list_all(&self) -> Result<Vec<ArchiveFile>> {
        let sql = format!("SELECT {} FROM archive_files f ORDER BY f.id ASC", FILE_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list files")?;
        rows.iter().map(row_to_file_sqlite).collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_file_sqlite(pool: &SqlitePool, file: &ArchiveFile) -> Result<ArchiveFile> {
    let result = sqlx::query(
        r#"
        INSERT INTO archive_files (title, slug, description, file_path, original_name, file_size,
                                   thumbnail, file_type, category_id, uploaded_by, tags,
                                   downloads_count, views_count, likes_count, is_public,
                                   is_featured, allow_comments, uploaded_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file.title)
    .bind(&file.slug)
    .bind(&file.description)
    .bind(&file.file_path)
    .bind(&file.original_name)
    .bind(file.file_size)
    .bind(&file.thumbnail)
    .bind(file.file_type.as_str())
    .bind(file.category_id)
    .bind(file.uploaded_by)
    .bind(&file.tags)
    .bind(file.downloads_count)
    .bind(file.views_count)
    .bind(file.likes_count)
    .bind(file.is_public)
    .bind(file.is_featured)
    .bind(file.allow_comments)
    .bind(file.uploaded_at)
    .bind(file.updated_at)
    .execute(pool)
    .await
    .context("Failed to create file")?;

    Ok(ArchiveFile {
        id: result.last_insert_rowid(),
        ..file.clone()
    })
}

async fn update_file_sqlite(pool: &SqlitePool, file: &ArchiveFile) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE archive_files
        SET title = ?, slug = ?, description = ?, file_path = ?, original_name = ?, file_size = ?,
            thumbnail = ?, file_type = ?, category_id = ?, tags = ?, is_public = ?,
            is_featured = ?, allow_comments = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&file.title)
    .bind(&file.slug)
    .bind(&file.description)
    .bind(&file.file_path)
    .bind(&file.original_name)
    .bind(file.file_size)
    .bind(&file.thumbnail)
    .bind(file.file_type.as_str())
    .bind(file.category_id)
    .bind(&file.tags)
    .bind(file.is_public)
    .bind(file.is_featured)
    .bind(file.allow_comments)
    .bind(Utc::now())
    .bind(file.id)
    .execute(pool)
    .await
    .context("Failed to update file")?;
    Ok(())
}

fn push_file_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &FileFilter) {
    query.push(" FROM archive_files f WHERE 1 = 1");

    if let Some(public) = filter.public {
        query.push(" AND f.is_public = ");
        query.push_bind(public);
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND f.category_id = ");
        query.push_bind(category_id);
    }
    if let Some(file_type) = filter.file_type {
        query.push(" AND f.file_type = ");
        query.push_bind(file_type.as_str());
    }
    if let Some(user_id) = filter.uploaded_by {
        query.push(" AND f.uploaded_by = ");
        query.push_bind(user_id);
    }
    if filter.featured_only {
        query.push(" AND f.is_featured = 1");
    }
    if let Some(slug) = &filter.tag_slug {
        query.push(
            " AND EXISTS (SELECT 1 FROM archive_file_tags ft INNER JOIN tags t ON t.id = ft.tag_id \
             WHERE ft.file_id = f.id AND t.slug = ",
        );
        query.push_bind(slug.clone());
        query.push(")");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query.push(" AND (f.title LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR f.description LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR f.tags LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

async fn statistics_sqlite(pool: &SqlitePool) -> Result<FileStatistics> {
    let totals = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_files, COALESCE(SUM(downloads_count), 0) AS total_downloads
        FROM archive_files
        WHERE is_public = 1
        "#,
    )
    .fetch_one(pool)
    .await
    .context("Failed to aggregate files")?;

    let by_type = sqlx::query(
        r#"
        SELECT file_type, COUNT(*) AS count
        FROM archive_files
        WHERE is_public = 1
        GROUP BY file_type
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count files by type")?;

    let mut stats = FileStatistics {
        total_files: totals.get("total_files"),
        total_downloads: totals.get("total_downloads"),
        ..FileStatistics::default()
    };
    for row in &by_type {
        let file_type: String = row.get("file_type");
        if let Some(file_type) = FileType::parse(&file_type) {
            stats.files_by_type.insert(file_type, row.get("count"));
        }
    }
    Ok(stats)
}

fn row_to_file_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ArchiveFile> {
    let file_type: String = row.get("file_type");
    Ok(ArchiveFile {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        file_path: row.get("file_path"),
        original_name: row.get("original_name"),
        file_size: row.get("file_size"),
        thumbnail: row.get("thumbnail"),
        file_type: FileType::parse(&file_type).unwrap_or_default(),
        category_id: row.get("category_id"),
        uploaded_by: row.get("uploaded_by"),
        tags: row.get("tags"),
        downloads_count: row.get("downloads_count"),
        views_count: row.get("views_count"),
        likes_count: row.get("likes_count"),
        is_public: row.get("is_public"),
        is_featured: row.get("is_featured"),
        allow_comments: row.get("allow_comments"),
        uploaded_at: row.get("uploaded_at"),
        updated_at: row.get("updated_at"),
    })
}
