//! Comment service
//!
//! Threaded post comments: adding (with optional reply parent), reading the
//! approved threads, staff moderation and deletion. Every change recounts the
//! post's `comments_count` from approved comments.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{
    build_threads, Comment, CommentView, CreateCommentInput, Post, User, COMMENT_MIN_CHARS,
};
use crate::services::blog_cache::BlogCache;
use crate::services::views::ContentViews;
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found: {0}")]
    NotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    views: Arc<ContentViews>,
    blog_cache: Arc<BlogCache>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        views: Arc<ContentViews>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            comments,
            posts,
            views,
            blog_cache,
        }
    }

    /// Add a comment to a published post
    ///
    /// # Errors
    ///
    /// - `PostNotFound` if the post is missing or unpublished
    /// - `Forbidden` if the post has comments turned off
    /// - `ValidationError` for short content or a parent from another post
    pub async fn add(
        &self,
        user: &User,
        post_slug: &str,
        input: CreateCommentInput,
    ) -> Result<CommentView, CommentServiceError> {
        let post = self.published_post(post_slug).await?;
        if !post.allow_comments {
            return Err(CommentServiceError::Forbidden(
                "Comments are disabled for this post".to_string(),
            ));
        }

        let content = input.content.trim().to_string();
        if content.chars().count() < COMMENT_MIN_CHARS {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be at least {} characters",
                COMMENT_MIN_CHARS
            )));
        }

        if let Some(parent_id) = input.parent_id {
            match self.comments.get_by_id(parent_id).await? {
                Some(parent) if parent.post_id == post.id => {}
                _ => {
                    return Err(CommentServiceError::ValidationError(
                        "Parent comment does not belong to this post".to_string(),
                    ))
                }
            }
        }

        let comment = Comment::new(post.id, user.id, input.parent_id, content);
        let created = self
            .comments
            .create(&comment)
            .await
            .context("Failed to create comment")?;
        self.refresh_count(&post).await?;

        tracing::debug!("Comment {} added to {} by {}", created.id, post.slug, user.username);
        let mut views = self.views.comment_views(vec![created]).await?;
        views
            .pop()
            .ok_or_else(|| CommentServiceError::InternalError(anyhow::anyhow!("Comment vanished")))
    }

    /// Approved comments of a published post as threads
    pub async fn list_for_post(&self, post_slug: &str) -> Result<Vec<CommentView>, CommentServiceError> {
        let post = self.published_post(post_slug).await?;
        let comments = self.comments.list_for_post(post.id, true).await?;
        Ok(build_threads(self.views.comment_views(comments).await?))
    }

    /// Staff moderation
    pub async fn set_approved(
        &self,
        user: &User,
        id: i64,
        approved: bool,
    ) -> Result<(), CommentServiceError> {
        if !user.is_staff() {
            return Err(CommentServiceError::Forbidden(
                "Only staff can moderate comments".to_string(),
            ));
        }
        let comment = self.get(id).await?;
        self.comments.set_approved(id, approved).await?;
        self.refresh_count_by_id(comment.post_id).await
    }

    /// Delete a comment and its replies; author or staff only
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), CommentServiceError> {
        let comment = self.get(id).await?;
        if !user.can_edit(comment.author_id) {
            return Err(CommentServiceError::Forbidden(
                "You can only delete your own comments".to_string(),
            ));
        }
        self.comments
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        self.refresh_count_by_id(comment.post_id).await
    }

    async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.comments
            .get_by_id(id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(id.to_string()))
    }

    async fn published_post(&self, slug: &str) -> Result<Post, CommentServiceError> {
        match self.posts.get_by_slug(slug).await? {
            Some(post) if post.is_published() => Ok(post),
            _ => Err(CommentServiceError::PostNotFound(slug.to_string())),
        }
    }

    async fn refresh_count_by_id(&self, post_id: i64) -> Result<(), CommentServiceError> {
        if let Some(post) = self.posts.get_by_id(post_id).await? {
            self.refresh_count(&post).await?;
        }
        Ok(())
    }

    async fn refresh_count(&self, post: &Post) -> Result<(), CommentServiceError> {
        self.posts.refresh_comments_count(post.id).await?;
        self.blog_cache
            .invalidate_post_cache(Some(&post.slug), None, None)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreatePostInput, PostStatus, UpdatePostInput};
    use crate::services::test_support::TestApp;

    async fn setup() -> (TestApp, User, User, Post) {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let reader = app.reader("reader").await;
        let post = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Commented post", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();
        (app, author, reader, post)
    }

    #[tokio::test]
    async fn test_add_comment_updates_count() {
        let (app, _author, reader, post) = setup().await;

        let view = app
            .comments
            .add(&reader, &post.slug, CreateCommentInput::new("Very helpful, thanks!"))
            .await
            .expect("Failed to add comment");
        assert_eq!(view.author.username, "reader");

        let detail = app.posts.detail(&post.slug, None).await.unwrap();
        assert_eq!(detail.post.post.comments_count, 1);
    }

    #[tokio::test]
    async fn test_short_comment_rejected() {
        let (app, _author, reader, post) = setup().await;
        let result = app
            .comments
            .add(&reader, &post.slug, CreateCommentInput::new("too short"))
            .await;
        assert!(matches!(result, Err(CommentServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_parent_must_share_post() {
        let (app, author, reader, post) = setup().await;
        let other = app
            .posts
            .create(
                &author,
                CreatePostInput::new("Another post", "body").with_status(PostStatus::Published),
            )
            .await
            .unwrap();
        let foreign = app
            .comments
            .add(&reader, &other.slug, CreateCommentInput::new("Comment elsewhere"))
            .await
            .unwrap();

        let result = app
            .comments
            .add(
                &reader,
                &post.slug,
                CreateCommentInput::new("Reply to the wrong thread").reply_to(foreign.comment.id),
            )
            .await;
        assert!(matches!(result, Err(CommentServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_disabled_comments_and_missing_post() {
        let (app, author, reader, post) = setup().await;
        app.posts
            .update(
                &author,
                post.id,
                UpdatePostInput {
                    allow_comments: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            app.comments
                .add(&reader, &post.slug, CreateCommentInput::new("Can I still comment?"))
                .await,
            Err(CommentServiceError::Forbidden(_))
        ));
        assert!(matches!(
            app.comments
                .add(&reader, "nope", CreateCommentInput::new("Nobody will read this"))
                .await,
            Err(CommentServiceError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_moderation_hides_comment() {
        let (app, _author, reader, post) = setup().await;
        let admin = app.admin().await;
        let view = app
            .comments
            .add(&reader, &post.slug, CreateCommentInput::new("Spam spam spam spam"))
            .await
            .unwrap();

        assert!(matches!(
            app.comments.set_approved(&reader, view.comment.id, false).await,
            Err(CommentServiceError::Forbidden(_))
        ));
        app.comments
            .set_approved(&admin, view.comment.id, false)
            .await
            .unwrap();

        assert!(app.comments.list_for_post(&post.slug).await.unwrap().is_empty());
        let detail = app.posts.detail(&post.slug, None).await.unwrap();
        assert_eq!(detail.post.post.comments_count, 0);

        app.comments.delete(&reader, view.comment.id).await.unwrap();
    }
}
