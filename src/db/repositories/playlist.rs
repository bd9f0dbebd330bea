//! Playlist repository
//!
//! Named, ordered collections of archive files.

use crate::db::DynDatabasePool;
use crate::models::{ListParams, Playlist};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    async fn create(&self, playlist: &Playlist) -> Result<Playlist>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Playlist>>;

    /// Public playlists, newest first, with the total count
    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Playlist>, i64)>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Playlist>>;

    /// Add a file; adding it twice is a no-op. Returns whether a row was added.
    async fn add_file(&self, playlist_id: i64, file_id: i64) -> Result<bool>;

    async fn remove_file(&self, playlist_id: i64, file_id: i64) -> Result<bool>;

    /// File ids in the order they were added
    async fn file_ids(&self, playlist_id: i64) -> Result<Vec<i64>>;

    async fn count_files(&self, playlist_id: i64) -> Result<i64>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxPlaylistRepository {
    pool: DynDatabasePool,
}

impl SqlxPlaylistRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PlaylistRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PlaylistRepository for SqlxPlaylistRepository {
    async fn create(&self, playlist: &Playlist) -> Result<Playlist> {
        let result = sqlx::query(
            r#"
            INSERT INTO playlists (name, description, created_by, is_public, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.created_by)
        .bind(playlist.is_public)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create playlist")?;

        Ok(Playlist {
            id: result.last_insert_rowid(),
            ..playlist.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Playlist>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, created_by, is_public, created_at, updated_at
            FROM playlists WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get playlist")?;
        row.as_ref().map(row_to_playlist_sqlite).transpose()
    }

    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Playlist>, i64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM playlists WHERE is_public = 1")
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count playlists")?
            .get("count");

        let rows = sqlx::query(
            r#"
            SELECT id, name, description, created_by, is_public, created_at, updated_at
            FROM playlists
            WHERE is_public = 1
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list playlists")?;

        let playlists = rows
            .iter()
            .map(row_to_playlist_sqlite)
            .collect::<Result<Vec<_>>>()?;
        Ok((playlists, total))
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Playlist>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, created_by, is_public, created_at, updated_at
            FROM playlists
            WHERE created_by = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list user playlists")?;
        rows.iter().map(row_to_playlist_sqlite).collect()
    }

    async fn add_file(&self, playlist_id: i64, file_id: i64) -> Result<bool> {
        let mut tx = self.pool.sqlite().begin().await?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO playlist_files (playlist_id, file_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(file_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to add file to playlist")?;
        sqlx::query("UPDATE playlists SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(playlist_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_file(&self, playlist_id: i64, file_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlist_files WHERE playlist_id = ? AND file_id = ?")
            .bind(playlist_id)
            .bind(file_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to remove file from playlist")?;
        Ok(result.rows_affected() > 0)
    }

    async fn file_ids(&self, playlist_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT file_id FROM playlist_files WHERE playlist_id = ? ORDER BY added_at ASC, rowid ASC",
        )
        .bind(playlist_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list playlist files")?;
        Ok(rows.iter().map(|r| r.get("file_id")).collect())
    }

    async fn count_files(&self, playlist_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM playlist_files WHERE playlist_id = ?")
            .bind(playlist_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count playlist files")?;
        Ok(row.get("count"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete playlist")?;
        Ok(())
    }
}

fn row_to_playlist_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Playlist> {
    Ok(Playlist {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_by: row.get("created_by"),
        is_public: row.get("is_public"),
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

    fn playlist(name: &str, owner: i64, public: bool) -> Playlist {
        let now = Utc::now();
        Playlist {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            created_by: owner,
            is_public: public,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_playlist_files() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("p".into(), "p@x.ru".into(), "h".into(), UserRole::Reader))
            .await
            .unwrap();
        let files = SqlxArchiveFileRepository::new(pool.clone());
        let a = files.create(&ArchiveFile::new("A".into(), "a".into(), user.id)).await.unwrap();
        let b = files.create(&ArchiveFile::new("B".into(), "b".into(), user.id)).await.unwrap();

        let repo = SqlxPlaylistRepository::new(pool);
        let list = repo.create(&playlist("Corpora", user.id, true)).await.unwrap();

        assert!(repo.add_file(list.id, b.id).await.unwrap());
        assert!(repo.add_file(list.id, a.id).await.unwrap());
        assert!(!repo.add_file(list.id, a.id).await.unwrap());
        assert_eq!(repo.file_ids(list.id).await.unwrap(), vec![b.id, a.id]);
        assert_eq!(repo.count_files(list.id).await.unwrap(), 2);

        assert!(repo.remove_file(list.id, b.id).await.unwrap());
        assert!(!repo.remove_file(list.id, b.id).await.unwrap());
        assert_eq!(repo.count_files(list.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_public_only() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("p".into(), "p@x.ru".into(), "h".into(), UserRole::Reader))
            .await
            .unwrap();
        let repo = SqlxPlaylistRepository::new(pool);
        repo.create(&playlist("Open", user.id, true)).await.unwrap();
        let hidden = repo.create(&playlist("Mine", user.id, false)).await.unwrap();

        let (items, total) = repo.list_public(&ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "Open");
        assert_eq!(repo.list_by_user(user.id).await.unwrap().len(), 2);

        repo.delete(hidden.id).await.unwrap();
        assert!(repo.get_by_id(hidden.id).await.unwrap().is_none());
    }
}
