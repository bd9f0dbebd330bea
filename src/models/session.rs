//! Login session

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side session addressed by an opaque token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token (64 hex chars)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id` lasting `lifetime`
    pub fn new(id: String, user_id: i64, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Seconds until expiry, used for the cookie `Max-Age`
    pub fn max_age_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_not_expired() {
        let session = Session::new("abc".to_string(), 1, Duration::days(7));
        assert!(!session.is_expired());
        assert!(session.max_age_seconds() > 6 * 24 * 3600);
    }

    #[test]
    fn test_past_session_expired() {
        let session = Session::new("abc".to_string(), 1, Duration::seconds(-5));
        assert!(session.is_expired());
        assert_eq!(session.max_age_seconds(), 0);
    }
}
