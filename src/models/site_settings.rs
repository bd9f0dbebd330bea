//! Site-wide settings singleton

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only row id the settings table accepts
pub const SITE_SETTINGS_ID: i64 = 1;

pub const DEFAULT_SITE_NAME: &str = "NLPers.ru";
pub const DEFAULT_SITE_DESCRIPTION: &str =
    "Платформа для изучения NLP и искусственного интеллекта";
pub const DEFAULT_OVERLAY_OPACITY: f64 = 0.7;
pub const DEFAULT_HEADER_COLOR: &str = "#1a1a1a";
pub const SOCIAL_NETWORKS: [&str; 5] = ["twitter", "facebook", "instagram", "youtube", "telegram"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub id: i64,
    pub site_name: String,
    pub site_description: String,
    pub background_image: String,
    /// Within `0.0..=1.0`
    pub background_overlay_opacity: f64,
    pub header_background_color: String,
    pub logo: String,
    pub favicon: String,
    pub contact_email: String,
    /// Network name to profile URL
    pub social_links: BTreeMap<String, String>,
    pub analytics_code: String,
    pub maintenance_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: SITE_SETTINGS_ID,
            site_name: DEFAULT_SITE_NAME.to_string(),
            site_description: DEFAULT_SITE_DESCRIPTION.to_string(),
            background_image: String::new(),
            background_overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            header_background_color: DEFAULT_HEADER_COLOR.to_string(),
            logo: String::new(),
            favicon: String::new(),
            contact_email: String::new(),
            social_links: default_social_links(),
            analytics_code: String::new(),
            maintenance_mode: false,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn default_social_links() -> BTreeMap<String, String> {
    SOCIAL_NETWORKS
        .iter()
        .map(|name| (name.to_string(), String::new()))
        .collect()
}

pub fn is_valid_opacity(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSiteSettingsInput {
    pub site_name: Option<String>,
    pub site_description: Option<String>,
    pub background_image: Option<String>,
    pub background_overlay_opacity: Option<f64>,
    pub header_background_color: Option<String>,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub contact_email: Option<String>,
    pub social_links: Option<BTreeMap<String, String>>,
    pub analytics_code: Option<String>,
    pub maintenance_mode: Option<bool>,
}

impl UpdateSiteSettingsInput {
    /// Apply the set fields onto `settings`
    pub fn apply(self, settings: &mut SiteSettings) {
        if let Some(v) = self.site_name {
            settings.site_name = v;
        }
        if let Some(v) = self.site_description {
            settings.site_description = v;
        }
        if let Some(v) = self.background_image {
            settings.background_image = v;
        }
        if let Some(v) = self.background_overlay_opacity {
            settings.background_overlay_opacity = v;
        }
        if let Some(v) = self.header_background_color {
            settings.header_background_color = v;
        }
        if let Some(v) = self.logo {
            settings.logo = v;
        }
        if let Some(v) = self.favicon {
            settings.favicon = v;
        }
        if let Some(v) = self.contact_email {
            settings.contact_email = v;
        }
        if let Some(v) = self.social_links {
            settings.social_links = v;
        }
        if let Some(v) = self.analytics_code {
            settings.analytics_code = v;
        }
        if let Some(v) = self.maintenance_mode {
            settings.maintenance_mode = v;
        }
    }
}
