//! Author request workflow
//!
//! Readers ask to become authors; staff approve or reject. One request per
//! user: a rejected request may be edited and resubmitted, which puts it
//! back into `pending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserBrief;

pub const REQUEST_FIELD_MAX: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AuthorRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorRequestStatus::Pending => "pending",
            AuthorRequestStatus::Approved => "approved",
            AuthorRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AuthorRequestStatus::Pending),
            "approved" => Some(AuthorRequestStatus::Approved),
            "rejected" => Some(AuthorRequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRequest {
    pub id: i64,
    pub user_id: i64,
    pub motivation: String,
    pub experience: String,
    pub sample_topics: String,
    pub status: AuthorRequestStatus,
    pub admin_comment: String,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl AuthorRequest {
    /// A new request is blocked while this one is pending or approved
    pub fn blocks_new_request(&self) -> bool {
        matches!(
            self.status,
            AuthorRequestStatus::Pending | AuthorRequestStatus::Approved
        )
    }
}

/// Request with the applicant, for the staff queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRequestView {
    #[serde(flatten)]
    pub request: AuthorRequest,
    pub user: UserBrief,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAuthorRequestInput {
    pub motivation: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub sample_topics: String,
}

/// Staff decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: AuthorRequestStatus) -> AuthorRequest {
        AuthorRequest {
            id: 1,
            user_id: 1,
            motivation: "I write about NLP".into(),
            experience: String::new(),
            sample_topics: String::new(),
            status,
            admin_comment: String::new(),
            reviewed_by: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[test]
    fn test_blocks_new_request() {
        assert!(request(AuthorRequestStatus::Pending).blocks_new_request());
        assert!(request(AuthorRequestStatus::Approved).blocks_new_request());
        assert!(!request(AuthorRequestStatus::Rejected).blocks_new_request());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            AuthorRequestStatus::parse("approved"),
            Some(AuthorRequestStatus::Approved)
        );
        assert_eq!(AuthorRequestStatus::parse("done"), None);
    }
}
