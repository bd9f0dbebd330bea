//! Site settings service
//!
//! The settings row is a singleton with id 1. Reads are cached; the first
//! read on an empty database writes the defaults.

use crate::cache::keys::{cache_key, ns, ttl};
use crate::cache::{get_or_load, Cache, CacheLayer};
use crate::db::repositories::SiteSettingsRepository;
use crate::models::{
    is_valid_email, is_valid_hex_color, is_valid_opacity, SiteSettings, UpdateSiteSettingsInput,
    User,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

pub const SITE_NAME_MAX: usize = 200;

#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("Permission denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct SettingsService {
    repo: Arc<dyn SiteSettingsRepository>,
    cache: Arc<Cache>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SiteSettingsRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    fn key() -> String {
        cache_key(ns::SITE_SETTINGS, std::iter::empty::<&str>())
    }

    /// Current settings, creating the default row when it is missing
    pub async fn get(&self) -> Result<SiteSettings, SettingsServiceError> {
        let settings = get_or_load(&self.cache, &Self::key(), ttl::SITE_SETTINGS, || async {
            Ok(self.ensure_exists().await?.0)
        })
        .await?;
        Ok(settings)
    }

    /// Load row 1 or write the defaults; the flag tells whether it was created
    pub async fn ensure_exists(&self) -> anyhow::Result<(SiteSettings, bool)> {
        if let Some(settings) = self.repo.get().await? {
            return Ok((settings, false));
        }
        let created = self
            .repo
            .save(&SiteSettings::default())
            .await
            .context("Failed to create default site settings")?;
        tracing::info!("Created default site settings");
        Ok((created, true))
    }

    /// Staff edit of the settings row
    pub async fn update(
        &self,
        user: &User,
        input: UpdateSiteSettingsInput,
    ) -> Result<SiteSettings, SettingsServiceError> {
        if !user.is_staff() {
            return Err(SettingsServiceError::Forbidden);
        }
        validate(&input)?;

        let (mut settings, _) = self.ensure_exists().await?;
        input.apply(&mut settings);
        settings.site_name = settings.site_name.trim().to_string();
        settings.contact_email = settings.contact_email.trim().to_lowercase();
        settings.updated_at = Utc::now();

        let saved = self
            .repo
            .save(&settings)
            .await
            .context("Failed to save site settings")?;
        if let Err(e) = self.cache.delete(&Self::key()).await {
            tracing::warn!("Failed to drop cached site settings: {}", e);
        }
        tracing::info!(
            "{} updated site settings (maintenance={})",
            user.username,
            saved.maintenance_mode
        );
        Ok(saved)
    }

    /// Whether maintenance mode is on; read failures count as off
    pub async fn is_maintenance(&self) -> bool {
        match self.get().await {
            Ok(settings) => settings.maintenance_mode,
            Err(e) => {
                tracing::warn!("Failed to read maintenance flag: {}", e);
                false
            }
        }
    }
}

fn validate(input: &UpdateSiteSettingsInput) -> Result<(), SettingsServiceError> {
    if let Some(name) = &input.site_name {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > SITE_NAME_MAX {
            return Err(SettingsServiceError::InvalidValue(format!(
                "site_name must be 1 to {} characters",
                SITE_NAME_MAX
            )));
        }
    }
    if let Some(opacity) = input.background_overlay_opacity {
        if !is_valid_opacity(opacity) {
            return Err(SettingsServiceError::InvalidValue(
                "background_overlay_opacity must be between 0.0 and 1.0".to_string(),
            ));
        }
    }
    if let Some(color) = &input.header_background_color {
        if !is_valid_hex_color(color) {
            return Err(SettingsServiceError::InvalidValue(
                "header_background_color must look like #1a1a1a".to_string(),
            ));
        }
    }
    if let Some(email) = &input.contact_email {
        let email = email.trim();
        if !email.is_empty() && !is_valid_email(&email.to_lowercase()) {
            return Err(SettingsServiceError::InvalidValue(
                "contact_email is not a valid address".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestApp;

    #[tokio::test]
    async fn test_get_creates_defaults() {
        let app = TestApp::new().await;
        let settings = app.settings.get().await.unwrap();
        assert_eq!(settings.id, 1);
        assert_eq!(settings.site_name, "NLPers.ru");

        let (_, created) = app.settings.ensure_exists().await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_update_validates_and_refreshes_cache() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let reader = app.reader("reader").await;

        app.settings.get().await.unwrap();

        let bad = UpdateSiteSettingsInput {
            background_overlay_opacity: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            app.settings.update(&admin, bad).await,
            Err(SettingsServiceError::InvalidValue(_))
        ));
        assert!(matches!(
            app.settings
                .update(&reader, UpdateSiteSettingsInput::default())
                .await,
            Err(SettingsServiceError::Forbidden)
        ));

        let saved = app
            .settings
            .update(
                &admin,
                UpdateSiteSettingsInput {
                    site_name: Some("  NLPers  ".into()),
                    maintenance_mode: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.site_name, "NLPers");
        assert!(app.settings.is_maintenance().await);
        assert_eq!(app.settings.get().await.unwrap().site_name, "NLPers");
    }
}
