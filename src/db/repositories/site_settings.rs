//! Site settings repository
//!
//! The settings table holds at most one row (`id = 1`). Social links are
//! stored as a JSON object in a TEXT column.

use crate::db::DynDatabasePool;
use crate::models::{SiteSettings, SITE_SETTINGS_ID};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait SiteSettingsRepository: Send + Sync {
    /// The stored row, if it has been created
    async fn get(&self) -> Result<Option<SiteSettings>>;

    /// Insert or replace the singleton row
    async fn save(&self, settings: &SiteSettings) -> Result<SiteSettings>;
}

pub struct SqlxSiteSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSiteSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SiteSettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SiteSettingsRepository for SqlxSiteSettingsRepository {
    async fn get(&self) -> Result<Option<SiteSettings>> {
        get_sqlite(self.pool.sqlite()).await
    }

    async fn save(&self, settings: &SiteSettings) -> Result<SiteSettings> {
        save_sqlite(self.pool.sqlite(), settings).await?;
        get_sqlite(self.pool.sqlite())
            .await?
            .ok_or_else(|| anyhow::anyhow!("Site settings missing after save"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_sqlite(pool: &SqlitePool) -> Result<Option<SiteSettings>> {
    let row = sqlx::query(
        r#"
        SELECT id, site_name, site_description, background_image, background_overlay_opacity,
               header_background_color, logo, favicon, contact_email, social_links,
               analytics_code, maintenance_mode, created_at, updated_at
        FROM site_settings
        WHERE id = ?
        "#,
    )
    .bind(SITE_SETTINGS_ID)
    .fetch_optional(pool)
    .await
    .context("Failed to load site settings")?;

    row.as_ref().map(row_to_settings_sqlite).transpose()
}

async fn save_sqlite(pool: &SqlitePool, settings: &SiteSettings) -> Result<()> {
    let social_links =
        serde_json::to_string(&settings.social_links).context("Failed to encode social links")?;

    sqlx::query(
        r#"
        INSERT INTO site_settings (id, site_name, site_description, background_image,
                                   background_overlay_opacity, header_background_color, logo,
                                   favicon, contact_email, social_links, analytics_code,
                                   maintenance_mode, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            site_name = excluded.site_name,
            site_description = excluded.site_description,
            background_image = excluded.background_image,
            background_overlay_opacity = excluded.background_overlay_opacity,
            header_background_color = excluded.header_background_color,
            logo = excluded.logo,
            favicon = excluded.favicon,
            contact_email = excluded.contact_email,
            social_links = excluded.social_links,
            analytics_code = excluded.analytics_code,
            maintenance_mode = excluded.maintenance_mode,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(SITE_SETTINGS_ID)
    .bind(&settings.site_name)
    .bind(&settings.site_description)
    .bind(&settings.background_image)
    .bind(settings.background_overlay_opacity)
    .bind(&settings.header_background_color)
    .bind(&settings.logo)
    .bind(&settings.favicon)
    .bind(&settings.contact_email)
    .bind(social_links)
    .bind(&settings.analytics_code)
    .bind(settings.maintenance_mode)
    .bind(settings.created_at)
    .bind(settings.updated_at)
    .execute(pool)
    .await
    .context("Failed to save site settings")?;
    Ok(())
}

fn row_to_settings_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<SiteSettings> {
    let raw_links: String = row.get("social_links");
    // A damaged column falls back to an empty map rather than failing every page
    let social_links: BTreeMap<String, String> = serde_json::from_str(&raw_links)
        .unwrap_or_else(|e| {
            tracing::warn!("Invalid social_links JSON in site settings: {}", e);
            BTreeMap::new()
        });

    Ok(SiteSettings {
        id: row.get("id"),
        site_name: row.get("site_name"),
        site_description: row.get("site_description"),
        background_image: row.get("background_image"),
        background_overlay_opacity: row.get("background_overlay_opacity"),
        header_background_color: row.get("header_background_color"),
        logo: row.get("logo"),
        favicon: row.get("favicon"),
        contact_email: row.get("contact_email"),
        social_links,
        analytics_code: row.get("analytics_code"),
        maintenance_mode: row.get("maintenance_mode"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxSiteSettingsRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxSiteSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_empty_until_saved() {
        let repo = setup().await;
        assert!(repo.get().await.unwrap().is_none());

        let saved = repo.save(&SiteSettings::default()).await.unwrap();
        assert_eq!(saved.id, SITE_SETTINGS_ID);
        assert_eq!(saved.site_name, "NLPers.ru");
        assert_eq!(saved.social_links.len(), 5);
    }

    #[tokio::test]
    async fn test_save_overwrites_single_row() {
        let repo = setup().await;
        repo.save(&SiteSettings::default()).await.unwrap();

        let mut changed = SiteSettings::default();
        changed.site_name = "NLPers".to_string();
        changed.maintenance_mode = true;
        changed
            .social_links
            .insert("telegram".to_string(), "https://t.me/nlpers".to_string());
        repo.save(&changed).await.unwrap();

        let loaded = repo.get().await.unwrap().unwrap();
        assert_eq!(loaded.site_name, "NLPers");
        assert!(loaded.maintenance_mode);
        assert_eq!(loaded.social_links["telegram"], "https://t.me/nlpers");

        let row = sqlx::query("SELECT COUNT(*) AS count FROM site_settings")
            .fetch_one(repo.pool.sqlite())
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("count"), 1);
    }
}
