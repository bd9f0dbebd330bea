//! Newsletter subscriptions

use crate::db::repositories::NewsletterRepository;
use crate::models::{is_valid_email, Newsletter};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NewsletterError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>) -> Self {
        Self { repo }
    }

    /// Subscribe `email`; addresses are compared lowercased
    pub async fn subscribe(&self, email: &str) -> Result<Newsletter, NewsletterError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(NewsletterError::ValidationError(
                "Enter a valid email address".to_string(),
            ));
        }
        if self.repo.get_by_email(&email).await?.is_some() {
            return Err(NewsletterError::ValidationError(
                "This email is already subscribed".to_string(),
            ));
        }

        let subscription = self
            .repo
            .create(&Newsletter::new(email))
            .await
            .context("Failed to save subscription")?;
        tracing::info!("New newsletter subscriber #{}", subscription.id);
        Ok(subscription)
    }

    pub async fn active_subscribers(&self) -> Result<i64, NewsletterError> {
        Ok(self.repo.count_active().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxNewsletterRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> NewsletterService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        NewsletterService::new(SqlxNewsletterRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_subscribe_once() {
        let service = setup().await;
        let sub = service.subscribe(" Reader@Example.com ").await.unwrap();
        assert_eq!(sub.email, "reader@example.com");
        assert!(sub.is_active);

        let dup = service.subscribe("reader@example.com").await;
        assert!(matches!(dup, Err(NewsletterError::ValidationError(_))));
        assert_eq!(service.active_subscribers().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let service = setup().await;
        for email in ["", "no-at-sign", "a@b", "two@@example.com", "sp ace@example.com"] {
            assert!(matches!(
                service.subscribe(email).await,
                Err(NewsletterError::ValidationError(_))
            ));
        }
    }
}
