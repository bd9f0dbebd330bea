//! Newsletter subscription repository

use crate::db::DynDatabasePool;
use crate::models::Newsletter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<Newsletter>>;

    async fn create(&self, subscription: &Newsletter) -> Result<Newsletter>;

    async fn count_active(&self) -> Result<i64>;
}

pub struct SqlxNewsletterRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<Newsletter>> {
        let row = sqlx::query(
            "SELECT id, email, is_active, subscribed_at, confirmed_at FROM newsletters WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get subscription")?;

        Ok(row.map(|row| Newsletter {
            id: row.get("id"),
            email: row.get("email"),
            is_active: row.get("is_active"),
            subscribed_at: row.get("subscribed_at"),
            confirmed_at: row.get("confirmed_at"),
        }))
    }

    async fn create(&self, subscription: &Newsletter) -> Result<Newsletter> {
        let result = sqlx::query(
            "INSERT INTO newsletters (email, is_active, subscribed_at, confirmed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&subscription.email)
        .bind(subscription.is_active)
        .bind(subscription.subscribed_at)
        .bind(subscription.confirmed_at)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create subscription")?;

        Ok(Newsletter {
            id: result.last_insert_rowid(),
            ..subscription.clone()
        })
    }

    async fn count_active(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM newsletters WHERE is_active = 1")
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count subscriptions")?;
        Ok(row.get("count"))
    }
}
