//! Newsletter subscription

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: i64,
    /// Unique subscriber address
    pub email: String,
    pub is_active: bool,
    pub subscribed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Newsletter {
    pub fn new(email: String) -> Self {
        Self {
            id: 0,
            email,
            is_active: true,
            subscribed_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

/// Minimal address syntax check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}
