//! Archive file engagement repository
//!
//! Comments, likes and download records attached to archive files.

use crate::db::DynDatabasePool;
use crate::models::{Download, FileComment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait FileEngagementRepository: Send + Sync {
    async fn create_comment(&self, file_id: i64, author_id: i64, content: &str)
        -> Result<FileComment>;

    /// Approved comments, newest first
    async fn list_comments(&self, file_id: i64) -> Result<Vec<FileComment>>;

    async fn count_comments(&self, file_id: i64) -> Result<i64>;

    /// Id of the like `user_id` left on `file_id`, if any
    async fn find_like(&self, user_id: i64, file_id: i64) -> Result<Option<i64>>;

    async fn add_like(&self, user_id: i64, file_id: i64) -> Result<()>;

    async fn remove_like(&self, id: i64) -> Result<()>;

    async fn count_likes(&self, file_id: i64) -> Result<i64>;

    async fn record_download(
        &self,
        file_id: i64,
        user_id: Option<i64>,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Download>;

    async fn count_downloads_since(&self, file_id: i64, since: DateTime<Utc>) -> Result<i64>;
}

pub struct SqlxFileEngagementRepository {
    pool: DynDatabasePool,
}

impl SqlxFileEngagementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FileEngagementRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FileEngagementRepository for SqlxFileEngagementRepository {
    async fn create_comment(
        &self,
        file_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<FileComment> {
        create_comment_sqlite(self.pool.sqlite(), file_id, author_id, content).await
    }

    async fn list_comments(&self, file_id: i64) -> Result<Vec<FileComment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_id, author_id, content, is_approved, created_at, updated_at
            FROM file_comments
            WHERE file_id = ? AND is_approved = 1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(file_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list file comments")?;
        rows.iter().map(row_to_comment_sqlite).collect()
    }

    async fn count_comments(&self, file_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM file_comments WHERE file_id = ? AND is_approved = 1",
        )
        .bind(file_id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count file comments")?;
        Ok(row.get("count"))
    }

    async fn find_like(&self, user_id: i64, file_id: i64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM file_likes WHERE user_id = ? AND file_id = ?")
            .bind(user_id)
            .bind(file_id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to find file like")?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn add_like(&self, user_id: i64, file_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO file_likes (user_id, file_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(file_id)
            .bind(Utc::now())
            .execute(self.pool.sqlite())
            .await
            .context("Failed to like file")?;
        Ok(())
    }

    async fn remove_like(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM file_likes WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to remove file like")?;
        Ok(())
    }

    async fn count_likes(&self, file_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM file_likes WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count file likes")?;
        Ok(row.get("count"))
    }

    async fn record_download(
        &self,
        file_id: i64,
        user_id: Option<i64>,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Download> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO downloads (file_id, user_id, ip_address, user_agent, downloaded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(file_id)
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to record download")?;

        Ok(Download {
            id: result.last_insert_rowid(),
            file_id,
            user_id,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            downloaded_at: now,
        })
    }

    async fn count_downloads_since(&self, file_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM downloads WHERE file_id = ? AND downloaded_at >= ?",
        )
        .bind(file_id)
        .bind(since)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count downloads")?;
        Ok(row.get("count"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(
    pool: &SqlitePool,
    file_id: i64,
    author_id: i64,
    content: &str,
) -> Result<FileComment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO file_comments (file_id, author_id, content, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(file_id)
    .bind(author_id)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create file comment")?;

    Ok(FileComment {
        id: result.last_insert_rowid(),
        file_id,
        author_id,
        content: content.to_string(),
        is_approved: true,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<FileComment> {
    Ok(FileComment {
        id: row.get("id"),
        file_id: row.get("file_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArchiveFileRepository, SqlxArchiveFileRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArchiveFile, User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxFileEngagementRepository, i64, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("u".into(), "u@x.ru".into(), "h".into(), UserRole::Reader))
            .await
            .unwrap();
        let file = SqlxArchiveFileRepository::new(pool.clone())
            .create(&ArchiveFile::new("F".into(), "f".into(), user.id))
            .await
            .unwrap();
        (SqlxFileEngagementRepository::new(pool), user.id, file.id)
    }

    #[tokio::test]
    async fn test_comments() {
        let (repo, user_id, file_id) = setup().await;
        repo.create_comment(file_id, user_id, "first comment").await.unwrap();
        let second = repo.create_comment(file_id, user_id, "second comment").await.unwrap();

        let listed = repo.list_comments(file_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(repo.count_comments(file_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_like_toggle_rows() {
        let (repo, user_id, file_id) = setup().await;
        assert!(repo.find_like(user_id, file_id).await.unwrap().is_none());

        repo.add_like(user_id, file_id).await.unwrap();
        assert!(repo.add_like(user_id, file_id).await.is_err());
        let like_id = repo.find_like(user_id, file_id).await.unwrap().unwrap();
        assert_eq!(repo.count_likes(file_id).await.unwrap(), 1);

        repo.remove_like(like_id).await.unwrap();
        assert_eq!(repo.count_likes(file_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_download() {
        let (repo, user_id, file_id) = setup().await;
        let download = repo
            .record_download(file_id, Some(user_id), "127.0.0.1", "curl/8.0")
            .await
            .unwrap();
        assert!(download.id > 0);
        repo.record_download(file_id, None, "", "").await.unwrap();

        let since = Utc::now() - Duration::minutes(1);
        assert_eq!(repo.count_downloads_since(file_id, since).await.unwrap(), 2);
    }
}
