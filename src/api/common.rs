//! Common API utilities and shared types

use serde::Deserialize;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// `?page=N` for paginated endpoints
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Treat blank query values as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
