//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

pub const BIO_MAX: usize = 500;

/// Public profile, created together with the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub avatar: String,
    pub location: String,
    pub website: String,
    pub github_url: String,
    pub linkedin_url: String,
    pub is_verified: bool,
    pub followers_count: i64,
    pub following_count: i64,
    /// Published posts by the user
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            bio: String::new(),
            avatar: String::new(),
            location: String::new(),
            website: String::new(),
            github_url: String::new(),
            linkedin_url: String::new(),
            is_verified: false,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cached public profile page data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub user: PublicUser,
    pub profile: UserProfile,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

/// User fields safe to show to anyone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: super::user::UserRole,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name(),
            role: user.role,
            date_joined: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Loose URL check for profile links: empty or http(s) with a host
pub fn is_valid_profile_url(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split('/').next().unwrap_or_default();
            host.contains('.') && !host.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_zero_counts() {
        let profile = UserProfile::new(7);
        assert_eq!(profile.user_id, 7);
        assert_eq!(profile.followers_count, 0);
        assert!(!profile.is_verified);
    }

    #[test]
    fn test_profile_url_validation() {
        assert!(is_valid_profile_url(""));
        assert!(is_valid_profile_url("https://github.com/nlpers"));
        assert!(is_valid_profile_url("http://example.ru"));
        assert!(!is_valid_profile_url("github.com/nlpers"));
        assert!(!is_valid_profile_url("https://localhost"));
        assert!(!is_valid_profile_url("javascript:alert(1)"));
    }
}
