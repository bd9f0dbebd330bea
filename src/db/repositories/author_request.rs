//! Author request repository

use crate::db::DynDatabasePool;
use crate::models::{AuthorRequest, AuthorRequestStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const REQUEST_COLUMNS: &str = "id, user_id, motivation, experience, sample_topics, status, \
     admin_comment, reviewed_by, created_at, reviewed_at";

#[async_trait]
pub trait AuthorRequestRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<AuthorRequest>>;

    async fn get_by_user(&self, user_id: i64) -> Result<Option<AuthorRequest>>;

    async fn create(&self, request: &AuthorRequest) -> Result<AuthorRequest>;

    /// Replace the applicant's text and reset the request to pending
    async fn resubmit(&self, request: &AuthorRequest) -> Result<AuthorRequest>;

    /// Requests in `status` (all when `None`), newest first
    async fn list(&self, status: Option<AuthorRequestStatus>) -> Result<Vec<AuthorRequest>>;

    async fn review(
        &self,
        id: i64,
        status: AuthorRequestStatus,
        reviewer_id: i64,
        admin_comment: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AuthorRequest>;
}

pub struct SqlxAuthorRequestRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRequestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRequestRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRequestRepository for SqlxAuthorRequestRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<AuthorRequest>> {
        get_request_sqlite(self.pool.sqlite(), "id", id).await
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<AuthorRequest>> {
        get_request_sqlite(self.pool.sqlite(), "user_id", user_id).await
    }

    async fn create(&self, request: &AuthorRequest) -> Result<AuthorRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO author_requests (user_id, motivation, experience, sample_topics, status, admin_comment, created_at)
            VALUES (?, ?, ?, ?, ?, '', ?)
            "#,
        )
        .bind(request.user_id)
        .bind(&request.motivation)
        .bind(&request.experience)
        .bind(&request.sample_topics)
        .bind(AuthorRequestStatus::Pending.as_str())
        .bind(request.created_at)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create author request")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author request not found after insert"))
    }

    async fn resubmit(&self, request: &AuthorRequest) -> Result<AuthorRequest> {
        sqlx::query(
            r#"
            UPDATE author_requests
            SET motivation = ?, experience = ?, sample_topics = ?, status = ?,
                admin_comment = '', reviewed_by = NULL, reviewed_at = NULL, created_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&request.motivation)
        .bind(&request.experience)
        .bind(&request.sample_topics)
        .bind(AuthorRequestStatus::Pending.as_str())
        .bind(Utc::now())
        .bind(request.id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to resubmit author request")?;

        self.get_by_id(request.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author request not found after update"))
    }

    async fn list(&self, status: Option<AuthorRequestStatus>) -> Result<Vec<AuthorRequest>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM author_requests WHERE status = ? ORDER BY created_at DESC, id DESC",
                    REQUEST_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(self.pool.sqlite())
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM author_requests ORDER BY created_at DESC, id DESC",
                    REQUEST_COLUMNS
                );
                sqlx::query(&sql).fetch_all(self.pool.sqlite()).await
            }
        }
        .context("Failed to list author requests")?;

        rows.iter().map(row_to_request_sqlite).collect()
    }

    async fn review(
        &self,
        id: i64,
        status: AuthorRequestStatus,
        reviewer_id: i64,
        admin_comment: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AuthorRequest> {
        sqlx::query(
            r#"
            UPDATE author_requests
            SET status = ?, reviewed_by = ?, admin_comment = ?, reviewed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(reviewer_id)
        .bind(admin_comment)
        .bind(reviewed_at)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to review author request")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author request not found after review"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_request_sqlite(
    pool: &SqlitePool,
    column: &'static str,
    value: i64,
) -> Result<Option<AuthorRequest>> {
    let sql = format!(
        "SELECT {} FROM author_requests WHERE {} = ?",
        REQUEST_COLUMNS, column
    );
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get author request")?;
    row.as_ref().map(row_to_request_sqlite).transpose()
}

fn row_to_request_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorRequest> {
    let status: String = row.get("status");
    Ok(AuthorRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        motivation: row.get("motivation"),
        experience: row.get("experience"),
        sample_topics: row.get("sample_topics"),
        status: AuthorRequestStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("Invalid author request status: {}", status))?,
        admin_comment: row.get("admin_comment"),
        reviewed_by: row.get("reviewed_by"),
        created_at: row.get("created_at"),
        reviewed_at: row.get("reviewed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxAuthorRequestRepository, i64, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::new(pool.clone());
        let reader = users
            .create(&User::new("r".into(), "r@x.ru".into(), "h".into(), UserRole::Reader))
            .await
            .unwrap();
        let admin = users
            .create(&User::new("adm".into(), "adm@x.ru".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        (SqlxAuthorRequestRepository::new(pool), reader.id, admin.id)
    }

    fn request(user_id: i64) -> AuthorRequest {
        AuthorRequest {
            id: 0,
            user_id,
            motivation: "I want to write about transformers".into(),
            experience: "5 years".into(),
            sample_topics: "BERT".into(),
            status: AuthorRequestStatus::Pending,
            admin_comment: String::new(),
            reviewed_by: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_review() {
        let (repo, reader, admin) = setup().await;
        let created = repo.create(&request(reader)).await.unwrap();
        assert_eq!(created.status, AuthorRequestStatus::Pending);
        assert_eq!(repo.list(Some(AuthorRequestStatus::Pending)).await.unwrap().len(), 1);

        let reviewed = repo
            .review(created.id, AuthorRequestStatus::Approved, admin, "welcome", Utc::now())
            .await
            .unwrap();
        assert_eq!(reviewed.status, AuthorRequestStatus::Approved);
        assert_eq!(reviewed.reviewed_by, Some(admin));
        assert!(reviewed.reviewed_at.is_some());
        assert!(repo.list(Some(AuthorRequestStatus::Pending)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resubmit_resets_review() {
        let (repo, reader, admin) = setup().await;
        let created = repo.create(&request(reader)).await.unwrap();
        repo.review(created.id, AuthorRequestStatus::Rejected, admin, "too short", Utc::now())
            .await
            .unwrap();

        let mut again = repo.get_by_user(reader).await.unwrap().unwrap();
        again.motivation = "A much longer motivation".into();
        let resubmitted = repo.resubmit(&again).await.unwrap();

        assert_eq!(resubmitted.status, AuthorRequestStatus::Pending);
        assert!(resubmitted.reviewed_by.is_none());
        assert_eq!(resubmitted.admin_comment, "");
    }

    #[tokio::test]
    async fn test_one_request_per_user() {
        let (repo, reader, _) = setup().await;
        repo.create(&request(reader)).await.unwrap();
        assert!(repo.create(&request(reader)).await.is_err());
    }
}
