//! Engagement repository
//!
//! Likes on posts and comments, and follows of users and categories.

use crate::db::DynDatabasePool;
use crate::models::{Follow, FollowTarget, Like, LikeTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait EngagementRepository: Send + Sync {
    async fn find_like(
        &self,
        user_id: i64,
        target: LikeTarget,
        object_id: i64,
    ) -> Result<Option<Like>>;

    async fn add_like(&self, user_id: i64, target: LikeTarget, object_id: i64) -> Result<Like>;

    async fn remove_like(&self, id: i64) -> Result<()>;

    async fn count_likes(&self, target: LikeTarget, object_id: i64) -> Result<i64>;

    async fn find_follow(
        &self,
        follower_id: i64,
        target: FollowTarget,
        target_id: i64,
    ) -> Result<Option<Follow>>;

    async fn add_follow(
        &self,
        follower_id: i64,
        target: FollowTarget,
        target_id: i64,
    ) -> Result<Follow>;

    async fn remove_follow(&self, id: i64) -> Result<()>;

    /// Users following `user_id`
    async fn count_followers(&self, user_id: i64) -> Result<i64>;

    /// Users and categories `user_id` follows
    async fn count_following(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based engagement repository implementation
pub struct SqlxEngagementRepository {
    pool: DynDatabasePool,
}

impl SqlxEngagementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EngagementRepository> {
        Arc::new(Self::new(pool))
    }
}

fn follow_column(target: FollowTarget) -> &'static str {
    match target {
        FollowTarget::User => "followed_user_id",
        FollowTarget::Category => "followed_category_id",
    }
}

#[async_trait]
impl EngagementRepository for SqlxEngagementRepository {
    async fn find_like(
        &self,
        user_id: i64,
        target: LikeTarget,
        object_id: i64,
    ) -> Result<Option<Like>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, content_type, object_id, created_at
            FROM likes
            WHERE user_id = ? AND content_type = ? AND object_id = ?
            "#,
        )
        .bind(user_id)
        .bind(target.as_str())
        .bind(object_id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to find like")?;

        row.as_ref().map(row_to_like_sqlite).transpose()
    }

    async fn add_like(&self, user_id: i64, target: LikeTarget, object_id: i64) -> Result<Like> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO likes (user_id, content_type, object_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(target.as_str())
        .bind(object_id)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to add like")?;

        Ok(Like {
            id: result.last_insert_rowid(),
            user_id,
            content_type: target,
            object_id,
            created_at: now,
        })
    }

    async fn remove_like(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM likes WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to remove like")?;
        Ok(())
    }

    async fn count_likes(&self, target: LikeTarget, object_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM likes WHERE content_type = ? AND object_id = ?",
        )
        .bind(target.as_str())
        .bind(object_id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count likes")?;
        Ok(row.get("count"))
    }

    async fn find_follow(
        &self,
        follower_id: i64,
        target: FollowTarget,
        target_id: i64,
    ) -> Result<Option<Follow>> {
        find_follow_sqlite(self.pool.sqlite(), follower_id, target, target_id).await
    }

    async fn add_follow(
        &self,
        follower_id: i64,
        target: FollowTarget,
        target_id: i64,
    ) -> Result<Follow> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO follows (follower_id, follow_type, {}, created_at) VALUES (?, ?, ?, ?)",
            follow_column(target)
        );
        let result = sqlx::query(&sql)
            .bind(follower_id)
            .bind(target.as_str())
            .bind(target_id)
            .bind(now)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to add follow")?;

        let (followed_user_id, followed_category_id) = match target {
            FollowTarget::User => (Some(target_id), None),
            FollowTarget::Category => (None, Some(target_id)),
        };
        Ok(Follow {
            id: result.last_insert_rowid(),
            follower_id,
            follow_type: target,
            followed_user_id,
            followed_category_id,
            created_at: now,
        })
    }

    async fn remove_follow(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM follows WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to remove follow")?;
        Ok(())
    }

    async fn count_followers(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM follows WHERE followed_user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count followers")?;
        Ok(row.get("count"))
    }

    async fn count_following(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM follows WHERE follower_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count following")?;
        Ok(row.get("count"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_follow_sqlite(
    pool: &SqlitePool,
    follower_id: i64,
    target: FollowTarget,
    target_id: i64,
) -> Result<Option<Follow>> {
    let sql = format!(
        r#"
        SELECT id, follower_id, follow_type, followed_user_id, followed_category_id, created_at
        FROM follows
        WHERE follower_id = ? AND {} = ?
        "#,
        follow_column(target)
    );
    let row = sqlx::query(&sql)
        .bind(follower_id)
        .bind(target_id)
        .fetch_optional(pool)
        .await
        .context("Failed to find follow")?;

    row.map(|row| {
        let follow_type: String = row.get("follow_type");
        Ok(Follow {
            id: row.get("id"),
            follower_id: row.get("follower_id"),
            follow_type: FollowTarget::parse(&follow_type)
                .ok_or_else(|| anyhow::anyhow!("Invalid follow type: {}", follow_type))?,
            followed_user_id: row.get("followed_user_id"),
            followed_category_id: row.get("followed_category_id"),
            created_at: row.get("created_at"),
        })
    })
    .transpose()
}

fn row_to_like_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Like> {
    let content_type: String = row.get("content_type");
    Ok(Like {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content_type: LikeTarget::parse(&content_type)
            .ok_or_else(|| anyhow::anyhow!("Invalid like target: {}", content_type))?,
        object_id: row.get("object_id"),
        created_at: row.get("created_at"),
    })
}
