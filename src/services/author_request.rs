//! Becoming an author
//!
//! A reader files one request; staff approve or reject it. Approval promotes
//! the applicant to [`UserRole::Author`]. A rejected request can be edited
//! and sent again, which puts it back in the queue.

use crate::db::repositories::AuthorRequestRepository;
use crate::models::{
    AuthorRequest, AuthorRequestStatus, AuthorRequestView, CreateAuthorRequestInput,
    ReviewDecision, User, UserRole, REQUEST_FIELD_MAX,
};
use crate::services::blog_cache::BlogCache;
use crate::services::user::{UserService, UserServiceError};
use crate::services::views::ContentViews;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthorRequestError {
    #[error("Author request not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The applicant is already an author or has an open request
    #[error("{0}")]
    Conflict(String),

    #[error("Permission denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for AuthorRequestError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(_) => AuthorRequestError::NotFound,
            UserServiceError::InternalError(e) => AuthorRequestError::InternalError(e),
            other => AuthorRequestError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub struct AuthorRequestService {
    repo: Arc<dyn AuthorRequestRepository>,
    users: Arc<UserService>,
    views: Arc<ContentViews>,
    blog_cache: Arc<BlogCache>,
}

impl AuthorRequestService {
    pub fn new(
        repo: Arc<dyn AuthorRequestRepository>,
        users: Arc<UserService>,
        views: Arc<ContentViews>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            repo,
            users,
            views,
            blog_cache,
        }
    }

    /// File a request, or resubmit a rejected one
    pub async fn submit(
        &self,
        user: &User,
        input: CreateAuthorRequestInput,
    ) -> Result<AuthorRequest, AuthorRequestError> {
        if user.is_author() {
            return Err(AuthorRequestError::Conflict(
                "You can already publish".to_string(),
            ));
        }
        let input = validate(input)?;

        match self.repo.get_by_user(user.id).await? {
            Some(existing) if existing.blocks_new_request() => {
                Err(AuthorRequestError::Conflict(match existing.status {
                    AuthorRequestStatus::Approved => "Your request was already approved",
                    _ => "Your request is awaiting review",
                }
                .to_string()))
            }
            Some(mut rejected) => {
                rejected.motivation = input.motivation;
                rejected.experience = input.experience;
                rejected.sample_topics = input.sample_topics;
                let request = self
                    .repo
                    .resubmit(&rejected)
                    .await
                    .context("Failed to resubmit author request")?;
                tracing::info!("User {} resubmitted an author request", user.username);
                Ok(request)
            }
            None => {
                let now = Utc::now();
                let request = AuthorRequest {
                    id: 0,
                    user_id: user.id,
                    motivation: input.motivation,
                    experience: input.experience,
                    sample_topics: input.sample_topics,
                    status: AuthorRequestStatus::Pending,
                    admin_comment: String::new(),
                    reviewed_by: None,
                    created_at: now,
                    reviewed_at: None,
                };
                let request = self
                    .repo
                    .create(&request)
                    .await
                    .context("Failed to save author request")?;
                tracing::info!("User {} asked to become an author", user.username);
                Ok(request)
            }
        }
    }

    pub async fn own_request(&self, user: &User) -> Result<Option<AuthorRequest>, AuthorRequestError> {
        Ok(self.repo.get_by_user(user.id).await?)
    }

    /// Review queue for staff, newest first
    pub async fn list(
        &self,
        reviewer: &User,
        status: Option<AuthorRequestStatus>,
    ) -> Result<Vec<AuthorRequestView>, AuthorRequestError> {
        if !reviewer.is_staff() {
            return Err(AuthorRequestError::Forbidden);
        }
        let requests = self.repo.list(status).await?;
        let ids: Vec<i64> = requests.iter().map(|r| r.user_id).collect();
        let briefs = self.views.user_briefs(&ids).await?;

        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let user = match briefs.get(&request.user_id) {
                Some(brief) => brief.clone(),
                None => self.views.user_brief(request.user_id).await?,
            };
            views.push(AuthorRequestView { request, user });
        }
        Ok(views)
    }

    /// Approve or reject a pending request
    pub async fn review(
        &self,
        reviewer: &User,
        id: i64,
        decision: ReviewDecision,
        admin_comment: &str,
    ) -> Result<AuthorRequest, AuthorRequestError> {
        if !reviewer.is_staff() {
            return Err(AuthorRequestError::Forbidden);
        }
        let request = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(AuthorRequestError::NotFound)?;
        if request.status != AuthorRequestStatus::Pending {
            return Err(AuthorRequestError::Conflict(format!(
                "Request is already {}",
                request.status.as_str()
            )));
        }

        let status = match decision {
            ReviewDecision::Approve => AuthorRequestStatus::Approved,
            ReviewDecision::Reject => AuthorRequestStatus::Rejected,
        };
        let reviewed = self
            .repo
            .review(id, status, reviewer.id, admin_comment.trim(), Utc::now())
            .await
            .context("Failed to record review")?;

        if status == AuthorRequestStatus::Approved {
            let applicant = self
                .users
                .get_by_id(request.user_id)
                .await?
                .ok_or(AuthorRequestError::NotFound)?;
            // Never demote staff who happened to have an old request
            if !applicant.is_author() {
                let promoted = self.users.set_role(applicant.id, UserRole::Author).await?;
                self.blog_cache.invalidate_user_cache(&promoted.username).await;
            }
        }

        tracing::info!(
            "Author request #{} {} by {}",
            id,
            status.as_str(),
            reviewer.username
        );
        Ok(reviewed)
    }
}

fn validate(input: CreateAuthorRequestInput) -> Result<CreateAuthorRequestInput, AuthorRequestError> {
    let input = CreateAuthorRequestInput {
        motivation: input.motivation.trim().to_string(),
        experience: input.experience.trim().to_string(),
        sample_topics: input.sample_topics.trim().to_string(),
    };
    if input.motivation.is_empty() {
        return Err(AuthorRequestError::ValidationError(
            "Motivation is required".to_string(),
        ));
    }
    for (field, value) in [
        ("motivation", &input.motivation),
        ("experience", &input.experience),
        ("sample_topics", &input.sample_topics),
    ] {
        if value.chars().count() > REQUEST_FIELD_MAX {
            return Err(AuthorRequestError::ValidationError(format!(
                "{} must be at most {} characters",
                field, REQUEST_FIELD_MAX
            )));
        }
    }
    Ok(input)
}
