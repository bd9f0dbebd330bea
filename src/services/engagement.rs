//! Likes and follows
//!
//! Both are toggles: the first call creates the row, the second removes it.
//! Like counters are recounted from the rows after each toggle, so they never
//! drift or go negative. Follows keep the profile counters of both sides up to
//! date.

use crate::db::repositories::{
    CategoryRepository, CommentRepository, EngagementRepository, PostRepository,
    ProfileRepository, UserRepository,
};
use crate::models::{FollowResult, FollowTarget, LikeResult, LikeTarget, User};
use crate::services::blog_cache::BlogCache;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct EngagementService {
    engagement: Arc<dyn EngagementRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
    profiles: Arc<dyn ProfileRepository>,
    blog_cache: Arc<BlogCache>,
}

impl EngagementService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engagement: Arc<dyn EngagementRepository>,
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserRepository>,
        categories: Arc<dyn CategoryRepository>,
        profiles: Arc<dyn ProfileRepository>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            engagement,
            posts,
            comments,
            users,
            categories,
            profiles,
            blog_cache,
        }
    }

    /// Like or unlike a post or comment
    pub async fn toggle_like(
        &self,
        user: &User,
        target: LikeTarget,
        object_id: i64,
    ) -> Result<LikeResult, EngagementError> {
        // Resolve the target first so unknown ids never get a like row
        let post_slug = match target {
            LikeTarget::Post => match self.posts.get_by_id(object_id).await? {
                Some(post) => Some(post.slug),
                None => return Err(EngagementError::NotFound("Post".to_string())),
            },
            LikeTarget::Comment => {
                if self.comments.get_by_id(object_id).await?.is_none() {
                    return Err(EngagementError::NotFound("Comment".to_string()));
                }
                None
            }
        };

        let liked = match self.engagement.find_like(user.id, target, object_id).await? {
            Some(like) => {
                self.engagement.remove_like(like.id).await?;
                false
            }
            None => {
                self.engagement.add_like(user.id, target, object_id).await?;
                true
            }
        };

        let likes_count = self.engagement.count_likes(target, object_id).await?.max(0);
        match target {
            LikeTarget::Post => self.posts.set_likes_count(object_id, likes_count).await?,
            LikeTarget::Comment => self.comments.set_likes_count(object_id, likes_count).await?,
        }
        if let Some(slug) = post_slug {
            self.blog_cache
                .invalidate_post_cache(Some(&slug), None, None)
                .await;
        }

        tracing::debug!(
            "{} {} {} {}",
            user.username,
            if liked { "liked" } else { "unliked" },
            target,
            object_id
        );
        Ok(LikeResult { liked, likes_count })
    }

    /// Follow or unfollow a user or category
    pub async fn toggle_follow(
        &self,
        user: &User,
        target: FollowTarget,
        object_id: i64,
    ) -> Result<FollowResult, EngagementError> {
        let followed_username = match target {
            FollowTarget::User => {
                if object_id == user.id {
                    return Err(EngagementError::ValidationError(
                        "You cannot follow yourself".to_string(),
                    ));
                }
                match self.users.get_by_id(object_id).await? {
                    Some(followed) => Some(followed.username),
                    None => return Err(EngagementError::NotFound("User".to_string())),
                }
            }
            FollowTarget::Category => {
                if self.categories.get_by_id(object_id).await?.is_none() {
                    return Err(EngagementError::NotFound("Category".to_string()));
                }
                None
            }
        };

        let followed = match self.engagement.find_follow(user.id, target, object_id).await? {
            Some(follow) => {
                self.engagement.remove_follow(follow.id).await?;
                false
            }
            None => {
                self.engagement.add_follow(user.id, target, object_id).await?;
                true
            }
        };

        // Category follows count towards the follower's `following_count`
        if let Some(username) = followed_username {
            self.refresh_follow_counts(object_id).await?;
            self.blog_cache.invalidate_user_cache(&username).await;
        }
        self.refresh_follow_counts(user.id).await?;
        self.blog_cache.invalidate_user_cache(&user.username).await;

        Ok(FollowResult { followed })
    }

    /// Whether `user` likes the object; used by detail pages
    pub async fn is_liked(
        &self,
        user: &User,
        target: LikeTarget,
        object_id: i64,
    ) -> Result<bool, EngagementError> {
        Ok(self
            .engagement
            .find_like(user.id, target, object_id)
            .await?
            .is_some())
    }

    pub async fn is_following(
        &self,
        user: &User,
        target: FollowTarget,
        object_id: i64,
    ) -> Result<bool, EngagementError> {
        Ok(self
            .engagement
            .find_follow(user.id, target, object_id)
            .await?
            .is_some())
    }

    async fn refresh_follow_counts(&self, user_id: i64) -> Result<(), EngagementError> {
        let followers = self.engagement.count_followers(user_id).await?;
        let following = self.engagement.count_following(user_id).await?;
        self.profiles
            .set_follow_counts(user_id, followers, following)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCategoryInput, CreateCommentInput, CreatePostInput, PostStatus};
    use crate::services::test_support::TestApp;

    #[tokio::test]
    async fn test_like_toggle_round_trip() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let reader = app.reader("reader").await;
        let post = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Likeable post", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();

        let liked = app
            .engagement
            .toggle_like(&reader, LikeTarget::Post, post.id)
            .await
            .unwrap();
        assert_eq!(liked, LikeResult { liked: true, likes_count: 1 });
        assert!(app.engagement.is_liked(&reader, LikeTarget::Post, post.id).await.unwrap());

        let unliked = app
            .engagement
            .toggle_like(&reader, LikeTarget::Post, post.id)
            .await
            .unwrap();
        assert_eq!(unliked, LikeResult { liked: false, likes_count: 0 });

        let detail = app.posts.detail(&post.slug, None).await.unwrap();
        assert_eq!(detail.post.post.likes_count, 0);
    }

    #[tokio::test]
    async fn test_comment_like_and_unknown_target() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let post = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Post with comment", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();
        let comment = app
            .comments
            .add(&author, &post.slug, CreateCommentInput::new("Author's own remark"))
            .await
            .unwrap();

        let result = app
            .engagement
            .toggle_like(&author, LikeTarget::Comment, comment.comment.id)
            .await
            .unwrap();
        assert!(result.liked);

        assert!(matches!(
            app.engagement.toggle_like(&author, LikeTarget::Post, 9999).await,
            Err(EngagementError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_user_updates_counters() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let reader = app.reader("reader").await;

        let result = app
            .engagement
            .toggle_follow(&reader, FollowTarget::User, author.id)
            .await
            .unwrap();
        assert!(result.followed);

        let profile = app.profiles.public_profile("writer").await.unwrap();
        assert_eq!(profile.profile.followers_count, 1);
        assert_eq!(profile.profile.profile.followers_count, 1);

        let result = app
            .engagement
            .toggle_follow(&reader, FollowTarget::User, author.id)
            .await
            .unwrap();
        assert!(!result.followed);
        let profile = app.profiles.public_profile("reader").await.unwrap();
        assert_eq!(profile.profile.profile.following_count, 0);
    }

    #[tokio::test]
    async fn test_category_follow_counts_as_following() {
        let app = TestApp::new().await;
        let reader = app.reader("reader").await;
        let category = app
            .blog_categories
            .create(CreateCategoryInput::new("Semantics"))
            .await
            .unwrap();

        // Warm the cached profile first
        let before = app.profiles.public_profile("reader").await.unwrap();
        assert_eq!(before.profile.following_count, 0);

        app.engagement
            .toggle_follow(&reader, FollowTarget::Category, category.id)
            .await
            .unwrap();
        let profile = app.profiles.public_profile("reader").await.unwrap();
        assert_eq!(profile.profile.following_count, 1);
        assert_eq!(profile.profile.profile.following_count, 1);

        app.engagement
            .toggle_follow(&reader, FollowTarget::Category, category.id)
            .await
            .unwrap();
        let profile = app.profiles.public_profile("reader").await.unwrap();
        assert_eq!(profile.profile.following_count, 0);
        assert_eq!(profile.profile.profile.following_count, 0);
    }

    #[tokio::test]
    async fn test_follow_rules() {
        let app = TestApp::new().await;
        let reader = app.reader("reader").await;
        let category = app
            .blog_categories
            .create(CreateCategoryInput::new("Speech"))
            .await
            .unwrap();

        assert!(matches!(
            app.engagement.toggle_follow(&reader, FollowTarget::User, reader.id).await,
            Err(EngagementError::ValidationError(_))
        ));
        assert!(matches!(
            app.engagement.toggle_follow(&reader, FollowTarget::User, 4242).await,
            Err(EngagementError::NotFound(_))
        ));

        let followed = app
            .engagement
            .toggle_follow(&reader, FollowTarget::Category, category.id)
            .await
            .unwrap();
        assert!(followed.followed);
        assert!(app
            .engagement
            .is_following(&reader, FollowTarget::Category, category.id)
            .await
            .unwrap());
    }
}
