//! Profiles and the personal dashboard

use crate::db::repositories::{
    ArchiveFileRepository, AuthorRequestRepository, EngagementRepository, PostRepository,
    ProfileRepository, UserRepository,
};
use crate::models::{
    is_valid_profile_url, AuthorRequest, FileFilter, FileView, FollowTarget, ListParams,
    PagedResult, PostView, ProfileView, UpdateProfileInput, User, UserProfile, BIO_MAX,
};
use crate::services::blog_cache::BlogCache;
use crate::services::views::ContentViews;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

pub const DASHBOARD_LIMIT: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Public profile page
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub profile: ProfileView,
    /// Published posts, ten per page
    pub posts: PagedResult<PostView>,
    /// Whether the viewer follows this user; `false` for anonymous viewers
    pub is_following: bool,
}

/// Personal dashboard of the signed-in user
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user_profile: UserProfile,
    /// Latest posts in any status
    pub user_posts: Vec<PostView>,
    /// Latest uploads, public or pending
    pub user_files: Vec<FileView>,
    pub posts_count: usize,
    pub files_count: usize,
    pub author_request: Option<AuthorRequest>,
    pub is_author: bool,
}

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    posts: Arc<dyn PostRepository>,
    files: Arc<dyn ArchiveFileRepository>,
    engagement: Arc<dyn EngagementRepository>,
    author_requests: Arc<dyn AuthorRequestRepository>,
    views: Arc<ContentViews>,
    blog_cache: Arc<BlogCache>,
}

impl ProfileService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        posts: Arc<dyn PostRepository>,
        files: Arc<dyn ArchiveFileRepository>,
        engagement: Arc<dyn EngagementRepository>,
        author_requests: Arc<dyn AuthorRequestRepository>,
        views: Arc<ContentViews>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            users,
            profiles,
            posts,
            files,
            engagement,
            author_requests,
            views,
            blog_cache,
        }
    }

    /// First page of a profile as seen by an anonymous visitor
    pub async fn public_profile(&self, username: &str) -> Result<ProfilePage, ProfileServiceError> {
        self.profile_page(username, 1, None).await
    }

    pub async fn profile_page(
        &self,
        username: &str,
        page: u32,
        viewer: Option<&User>,
    ) -> Result<ProfilePage, ProfileServiceError> {
        let profile = self
            .blog_cache
            .user_profile(username)
            .await?
            .ok_or_else(|| ProfileServiceError::NotFound(username.to_string()))?;
        let posts = self
            .blog_cache
            .posts_list(None, None, Some(username), page)
            .await?;

        let is_following = match viewer {
            Some(viewer) if viewer.id != profile.user.id => self
                .engagement
                .find_follow(viewer.id, FollowTarget::User, profile.user.id)
                .await?
                .is_some(),
            _ => false,
        };

        Ok(ProfilePage {
            profile,
            posts,
            is_following,
        })
    }

    /// The user's own profile row, created on first access
    pub async fn own_profile(&self, user: &User) -> Result<UserProfile, ProfileServiceError> {
        match self.profiles.get_by_user_id(user.id).await? {
            Some(profile) => Ok(profile),
            None => Ok(self
                .profiles
                .create(user.id)
                .await
                .context("Failed to create profile")?),
        }
    }

    /// Edit the signed-in user's profile and names
    pub async fn update_own(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<UserProfile, ProfileServiceError> {
        let mut profile = self.own_profile(user).await?;

        if let Some(bio) = input.bio {
            if bio.chars().count() > BIO_MAX {
                return Err(ProfileServiceError::ValidationError(format!(
                    "Bio must be at most {} characters",
                    BIO_MAX
                )));
            }
            profile.bio = bio;
        }
        if let Some(avatar) = input.avatar {
            profile.avatar = avatar;
        }
        if let Some(location) = input.location {
            profile.location = location.trim().to_string();
        }
        if let Some(website) = input.website {
            profile.website = checked_url("website", website)?;
        }
        if let Some(github) = input.github_url {
            profile.github_url = checked_url("github_url", github)?;
        }
        if let Some(linkedin) = input.linkedin_url {
            profile.linkedin_url = checked_url("linkedin_url", linkedin)?;
        }

        if input.first_name.is_some() || input.last_name.is_some() {
            let mut account = user.clone();
            if let Some(first) = input.first_name {
                account.first_name = first.trim().to_string();
            }
            if let Some(last) = input.last_name {
                account.last_name = last.trim().to_string();
            }
            self.users
                .update(&account)
                .await
                .context("Failed to update user names")?;
        }

        let saved = self
            .profiles
            .update(&profile)
            .await
            .context("Failed to update profile")?;
        self.blog_cache.invalidate_user_cache(&user.username).await;
        Ok(saved)
    }

    /// Everything the dashboard shows for `user`
    pub async fn dashboard(&self, user: &User) -> Result<Dashboard, ProfileServiceError> {
        let user_profile = self.own_profile(user).await?;

        let params = ListParams::new(1, DASHBOARD_LIMIT);
        let (posts, _) = self.posts.list_by_author(user.id, &params).await?;
        let user_posts = self.views.post_views(posts).await?;

        let own_files = FileFilter {
            uploaded_by: Some(user.id),
            ..FileFilter::default()
        };
        let files = self.files.list(&own_files, &params).await?;
        let user_files = self.views.file_views(files).await?;

        Ok(Dashboard {
            user_profile,
            posts_count: user_posts.len(),
            files_count: user_files.len(),
            user_posts,
            user_files,
            author_request: self.author_requests.get_by_user(user.id).await?,
            is_author: user.is_author(),
        })
    }
}

fn checked_url(field: &str, url: String) -> Result<String, ProfileServiceError> {
    let url = url.trim().to_string();
    if is_valid_profile_url(&url) {
        Ok(url)
    } else {
        Err(ProfileServiceError::ValidationError(format!(
            "{} must be an http(s) URL",
            field
        )))
    }
}
