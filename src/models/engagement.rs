//! Likes and follows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a like points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeTarget::Post => "post",
            LikeTarget::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(LikeTarget::Post),
            "comment" => Some(LikeTarget::Comment),
            _ => None,
        }
    }
}

impl fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's like; unique per (user, target, object)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub content_type: LikeTarget,
    pub object_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResult {
    /// Whether the user likes the object after the toggle
    pub liked: bool,
    pub likes_count: i64,
}

/// What a follow points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowTarget {
    User,
    Category,
}

impl FollowTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowTarget::User => "user",
            FollowTarget::Category => "category",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(FollowTarget::User),
            "category" => Some(FollowTarget::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub follower_id: i64,
    pub follow_type: FollowTarget,
    pub followed_user_id: Option<i64>,
    pub followed_category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResult {
    pub followed: bool,
}

/// Decrement that never goes below zero
pub fn decrement_count(count: i64) -> i64 {
    (count - 1).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_target_roundtrip_names() {
        for target in [LikeTarget::Post, LikeTarget::Comment] {
            assert_eq!(LikeTarget::parse(target.as_str()), Some(target));
        }
        assert_eq!(LikeTarget::parse("file"), None);
    }

    #[test]
    fn test_follow_target_parse() {
        assert_eq!(FollowTarget::parse("user"), Some(FollowTarget::User));
        assert_eq!(FollowTarget::parse("category"), Some(FollowTarget::Category));
        assert_eq!(FollowTarget::parse("tag"), None);
    }

    #[test]
    fn test_decrement_count_floor() {
        assert_eq!(decrement_count(3), 2);
        assert_eq!(decrement_count(0), 0);
        assert_eq!(decrement_count(-4), 0);
    }
}
