//! Comment repository
//!
//! Database operations for post comments.

use crate::db::DynDatabasePool;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post, oldest first
    async fn list_for_post(&self, post_id: i64, approved_only: bool) -> Result<Vec<Comment>>;

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()>;

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()>;

    /// Delete a comment and, through the foreign key, its replies
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        create_comment_sqlite(self.pool.sqlite(), comment).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, author_id, parent_id, content, likes_count, is_approved, created_at, updated_at
            FROM comments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get comment by ID")?;
        Ok(row.as_ref().map(row_to_comment_sqlite))
    }

    async fn list_for_post(&self, post_id: i64, approved_only: bool) -> Result<Vec<Comment>> {
        let sql = format!(
            r#"
            SELECT id, post_id, author_id, parent_id, content, likes_count, is_approved, created_at, updated_at
            FROM comments
            WHERE post_id = ? {}
            ORDER BY created_at ASC, id ASC
            "#,
            if approved_only { "AND is_approved = 1" } else { "" }
        );
        let rows = sqlx::query(&sql)
            .bind(post_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list comments")?;
        Ok(rows.iter().map(row_to_comment_sqlite).collect())
    }

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()> {
        sqlx::query("UPDATE comments SET is_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update comment approval")?;
        Ok(())
    }

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()> {
        sqlx::query("UPDATE comments SET likes_count = ? WHERE id = ?")
            .bind(count.max(0))
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update comment likes")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, likes_count, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.parent_id)
    .bind(&comment.content)
    .bind(comment.likes_count)
    .bind(comment.is_approved)
    .bind(comment.created_at)
    .bind(comment.updated_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        ..comment.clone()
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        likes_count: row.get("likes_count"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
