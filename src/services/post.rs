//! Post service
//!
//! Implements business logic for blog posts:
//! - Create, update, delete by authors (own posts) and staff (any post)
//! - Derived fields on save: publish date, excerpt, reading time
//! - Tag sync from the comma separated `tags` field
//! - Listing with search, category filter and sort whitelist
//! - Detail page with threaded comments, related posts and neighbours
//! - Blog home, category page and "my posts"
//!
//! Every write calls into [`BlogCache`] to drop the entries it made stale.

use crate::db::repositories::{
    CategoryRepository, CommentRepository, EngagementRepository, PostRepository,
    ProfileRepository, TagLink, TagRepository,
};
use crate::models::{
    build_threads, parse_tag_list, Category, CategoryWithCount, CommentView, CreatePostInput,
    FollowTarget, LikeTarget, ListParams, PagedResult, Post, PostFilter, PostLink, PostSort,
    PostView, UpdatePostInput, User, MAX_TAGS_PER_POST, TITLE_MAX, TITLE_MIN,
};
use crate::services::blog_cache::{BlogCache, DEFAULT_SIDEBAR_LIMIT, POSTS_PER_PAGE};
use crate::services::slug::generate_unique_slug;
use crate::services::tag::{TagService, TagServiceError};
use crate::services::views::ContentViews;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

pub const HOME_POSTS_PER_PAGE: u32 = 6;
pub const HOME_FEATURED_LIMIT: u32 = 3;
pub const RELATED_POSTS_LIMIT: i64 = 4;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for PostServiceError {
    fn from(e: TagServiceError) -> Self {
        match e {
            TagServiceError::ValidationError(msg) => PostServiceError::ValidationError(msg),
            other => PostServiceError::InternalError(anyhow::Error::new(other)),
        }
    }
}

/// Query string of the post list
#[derive(Debug, Clone, Default)]
pub struct PostListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostListPage {
    pub posts: PagedResult<PostView>,
    pub categories: Vec<CategoryWithCount>,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    /// Approved root comments with their approved replies
    pub comments: Vec<CommentView>,
    pub related_posts: Vec<PostView>,
    pub previous_post: Option<PostLink>,
    pub next_post: Option<PostLink>,
    pub user_liked: bool,
    pub user_following_author: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogHome {
    pub posts: PagedResult<PostView>,
    pub featured_posts: Vec<PostView>,
    pub categories: Vec<CategoryWithCount>,
    pub latest_posts: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryPage {
    pub category: Category,
    pub posts: PagedResult<PostView>,
    pub other_categories: Vec<CategoryWithCount>,
    /// Most viewed posts outside this category
    pub recent_posts: Vec<PostView>,
    pub user_following_category: bool,
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    comments: Arc<dyn CommentRepository>,
    engagement: Arc<dyn EngagementRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tag_service: Arc<TagService>,
    views: Arc<ContentViews>,
    blog_cache: Arc<BlogCache>,
}

impl PostService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        comments: Arc<dyn CommentRepository>,
        engagement: Arc<dyn EngagementRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tag_service: Arc<TagService>,
        views: Arc<ContentViews>,
        blog_cache: Arc<BlogCache>,
    ) -> Self {
        Self {
            posts,
            categories,
            tags,
            comments,
            engagement,
            profiles,
            tag_service,
            views,
            blog_cache,
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a post authored by `user`
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the user is an author or staff
    /// - `ValidationError` for a bad title, empty content, unknown category
    ///   or more than ten tags
    pub async fn create(&self, user: &User, input: CreatePostInput) -> Result<Post, PostServiceError> {
        if !user.is_author() {
            return Err(PostServiceError::Forbidden(
                "Only authors can write posts".to_string(),
            ));
        }

        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        self.ensure_category(input.category_id).await?;
        let tag_names = validate_tags(&input.tags)?;

        let posts = self.posts.clone();
        let slug = generate_unique_slug("post", &title, |candidate| {
            let posts = posts.clone();
            async move { posts.slug_exists(&candidate, None).await }
        })
        .await?;

        let mut post = Post::new(title, slug, input.content, user.id);
        post.excerpt = input.excerpt;
        post.category_id = input.category_id;
        post.featured_image = input.featured_image;
        post.tags = tag_names.join(", ");
        post.status = input.status.unwrap_or_default();
        post.allow_comments = input.allow_comments.unwrap_or(true);
        post.prepare_for_save();

        let created = self
            .posts
            .create(&post)
            .await
            .context("Failed to create post")?;
        let tag_slugs = self.sync_tags(created.id, &tag_names).await?;
        self.refresh_posts_count(created.author_id).await?;

        tracing::info!("Post {} created by {}", created.slug, user.username);
        self.invalidate(&created, &tag_slugs).await;
        Ok(created)
    }

    /// Update a post; only its author or staff may do so
    ///
    /// The slug stays stable across title changes.
    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let mut post = self.get_editable(user, id).await?;
        let old_category = post.category_id;
        let old_tags = self.linked_tag_slugs(post.id).await?;

        if let Some(title) = input.title {
            post.title = validate_title(&title)?;
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            post.content = content;
        }
        if let Some(excerpt) = input.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
            post.category_id = category_id;
        }
        if let Some(image) = input.featured_image {
            post.featured_image = image;
        }
        let new_tags = match input.tags {
            Some(raw) => {
                let names = validate_tags(&raw)?;
                post.tags = names.join(", ");
                Some(names)
            }
            None => None,
        };
        if let Some(status) = input.status {
            post.status = status;
        }
        if let Some(allow) = input.allow_comments {
            post.allow_comments = allow;
        }
        if let Some(featured) = input.is_featured {
            if !user.is_staff() {
                return Err(PostServiceError::Forbidden(
                    "Only staff can feature posts".to_string(),
                ));
            }
            post.is_featured = featured;
        }
        post.prepare_for_save();

        let updated = self
            .posts
            .update(&post)
            .await
            .context("Failed to update post")?;
        let mut tag_slugs = match new_tags {
            Some(names) => self.sync_tags(updated.id, &names).await?,
            None => old_tags.clone(),
        };
        self.refresh_posts_count(updated.author_id).await?;

        // Listings the post left also need to go
        tag_slugs.extend(old_tags);
        tag_slugs.sort();
        tag_slugs.dedup();
        if old_category != updated.category_id {
            if let Some(old) = self.category_slug(old_category).await? {
                self.blog_cache
                    .invalidate_post_cache(None, Some(&old), None)
                    .await;
            }
        }
        self.invalidate(&updated, &tag_slugs).await;
        Ok(updated)
    }

    pub async fn delete(&self, user: &User, id: i64) -> Result<(), PostServiceError> {
        let post = self.get_editable(user, id).await?;
        let tag_slugs = self.linked_tag_slugs(post.id).await?;

        self.posts
            .delete(post.id)
            .await
            .context("Failed to delete post")?;
        self.refresh_posts_count(post.author_id).await?;

        tracing::info!("Post {} deleted by {}", post.slug, user.username);
        self.invalidate(&post, &tag_slugs).await;
        Ok(())
    }

    /// The post with its relations, for the edit form
    pub async fn get_for_edit(&self, user: &User, id: i64) -> Result<PostView, PostServiceError> {
        let post = self.get_editable(user, id).await?;
        Ok(self.views.post_view(post).await?)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Published posts with search, category filter and sort
    ///
    /// The plain newest-first listing is served from the cache; searches and
    /// other sort orders go to the database.
    pub async fn list(&self, query: PostListQuery) -> Result<PostListPage, PostServiceError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let category = query.category.filter(|s| !s.is_empty());
        let sort = PostSort::from_query(query.sort.as_deref());

        let posts = if search.is_none() && sort == PostSort::default() {
            self.blog_cache
                .posts_list(category.as_deref(), None, None, query.page)
                .await?
        } else {
            let filter = PostFilter {
                search: search.clone(),
                category_slug: category,
                sort,
                ..PostFilter::default()
            };
            self.load_page(&filter, query.page, POSTS_PER_PAGE).await?
        };

        Ok(PostListPage {
            posts,
            categories: self.blog_cache.categories_with_counts().await?,
            search_query: search,
        })
    }

    /// Detail page of a published post; counts one view
    pub async fn detail(&self, slug: &str, viewer: Option<&User>) -> Result<PostDetail, PostServiceError> {
        let mut view = self
            .blog_cache
            .post_detail(slug)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        view.post.views_count = self.posts.increment_views(view.post.id).await?;

        let post = &view.post;
        let comments = self.comments.list_for_post(post.id, true).await?;
        let comments = build_threads(self.views.comment_views(comments).await?);

        let related_posts = match post.category_id {
            Some(category_id) => {
                let related = self
                    .posts
                    .related(category_id, post.id, RELATED_POSTS_LIMIT)
                    .await?;
                self.views.post_views(related).await?
            }
            None => Vec::new(),
        };

        let previous_post = self.posts.neighbour(post, true).await?.map(link);
        let next_post = self.posts.neighbour(post, false).await?.map(link);

        let (user_liked, user_following_author) = match viewer {
            Some(viewer) => {
                let liked = self
                    .engagement
                    .find_like(viewer.id, LikeTarget::Post, post.id)
                    .await?
                    .is_some();
                let following = viewer.id != post.author_id
                    && self
                        .engagement
                        .find_follow(viewer.id, FollowTarget::User, post.author_id)
                        .await?
                        .is_some();
                (liked, following)
            }
            None => (false, false),
        };

        Ok(PostDetail {
            post: view,
            comments,
            related_posts,
            previous_post,
            next_post,
            user_liked,
            user_following_author,
        })
    }

    /// Blog landing page: six posts per page plus the sidebars
    pub async fn blog_home(&self, page: u32) -> Result<BlogHome, PostServiceError> {
        let posts = self
            .load_page(&PostFilter::default(), page, HOME_POSTS_PER_PAGE)
            .await?;

        let featured_filter = PostFilter {
            featured_only: true,
            ..PostFilter::default()
        };
        let featured = self
            .posts
            .list_published(&featured_filter, &ListParams::new(1, HOME_FEATURED_LIMIT))
            .await?;

        Ok(BlogHome {
            posts,
            featured_posts: self.views.post_views(featured).await?,
            categories: self.blog_cache.categories_with_counts().await?,
            latest_posts: self.blog_cache.recent_posts(DEFAULT_SIDEBAR_LIMIT).await?,
        })
    }

    /// Posts of one category, ten per page
    pub async fn category_page(
        &self,
        slug: &str,
        page: u32,
        viewer: Option<&User>,
    ) -> Result<CategoryPage, PostServiceError> {
        let category = self
            .categories
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        let posts = self
            .blog_cache
            .posts_list(Some(&category.slug), None, None, page)
            .await?;

        let elsewhere = PostFilter {
            exclude_category_id: Some(category.id),
            sort: PostSort::MostViewed,
            ..PostFilter::default()
        };
        let recent = self
            .posts
            .list_published(&elsewhere, &ListParams::new(1, DEFAULT_SIDEBAR_LIMIT as u32))
            .await?;

        let user_following_category = match viewer {
            Some(viewer) => self
                .engagement
                .find_follow(viewer.id, FollowTarget::Category, category.id)
                .await?
                .is_some(),
            None => false,
        };

        Ok(CategoryPage {
            category,
            posts,
            other_categories: self.blog_cache.categories_with_counts().await?,
            recent_posts: self.views.post_views(recent).await?,
            user_following_category,
        })
    }

    /// Every post of `user`, drafts included
    pub async fn my_posts(&self, user: &User, page: u32) -> Result<PagedResult<PostView>, PostServiceError> {
        let params = ListParams::new(page, POSTS_PER_PAGE);
        let (posts, total) = self.posts.list_by_author(user.id, &params).await?;
        let items = self.views.post_views(posts).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn load_page(
        &self,
        filter: &PostFilter,
        page: u32,
        per_page: u32,
    ) -> Result<PagedResult<PostView>, PostServiceError> {
        let total = self.posts.count_published(filter).await?;
        let params = ListParams::new(page, per_page).clamped(total);
        let posts = self.posts.list_published(filter, &params).await?;
        let items = self.views.post_views(posts).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn get_editable(&self, user: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self
            .posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))?;
        if !user.can_edit(post.author_id) {
            return Err(PostServiceError::Forbidden(
                "You can only edit your own posts".to_string(),
            ));
        }
        Ok(post)
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), PostServiceError> {
        if let Some(id) = category_id {
            if self.categories.get_by_id(id).await?.is_none() {
                return Err(PostServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Link the post to the named tags, returning their slugs
    async fn sync_tags(&self, post_id: i64, names: &[String]) -> Result<Vec<String>, PostServiceError> {
        let tags = self.tag_service.get_or_create_by_names(names).await?;
        let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        self.tags
            .set_links(TagLink::Post, post_id, &ids)
            .await
            .context("Failed to link post tags")?;
        Ok(tags.into_iter().map(|t| t.slug).collect())
    }

    async fn linked_tag_slugs(&self, post_id: i64) -> Result<Vec<String>, PostServiceError> {
        let tags = self.tags.get_linked(TagLink::Post, post_id, false).await?;
        Ok(tags.into_iter().map(|t| t.slug).collect())
    }

    async fn refresh_posts_count(&self, author_id: i64) -> Result<(), PostServiceError> {
        let count = self.posts.count_published_by_author(author_id).await?;
        self.profiles.set_posts_count(author_id, count).await?;
        let author = self.views.user_brief(author_id).await?;
        self.blog_cache.invalidate_user_cache(&author.username).await;
        Ok(())
    }

    async fn category_slug(&self, category_id: Option<i64>) -> Result<Option<String>, PostServiceError> {
        match category_id {
            Some(id) => Ok(self.categories.get_by_id(id).await?.map(|c| c.slug)),
            None => Ok(None),
        }
    }

    async fn invalidate(&self, post: &Post, tag_slugs: &[String]) {
        let category = match self.category_slug(post.category_id).await {
            Ok(slug) => slug,
            Err(e) => {
                tracing::warn!("Failed to resolve category for cache invalidation: {}", e);
                None
            }
        };
        self.blog_cache
            .invalidate_post_cache(Some(&post.slug), category.as_deref(), None)
            .await;
        for tag in tag_slugs {
            self.blog_cache
                .invalidate_post_cache(None, None, Some(tag))
                .await;
        }
    }
}

fn link(post: Post) -> PostLink {
    PostLink {
        title: post.title,
        slug: post.slug,
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    let len = title.chars().count();
    if len < TITLE_MIN {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at least {} characters",
            TITLE_MIN
        )));
    }
    if len > TITLE_MAX {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            TITLE_MAX
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<(), PostServiceError> {
    if content.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_tags(raw: &str) -> Result<Vec<String>, PostServiceError> {
    let names = parse_tag_list(raw);
    if names.len() > MAX_TAGS_PER_POST {
        return Err(PostServiceError::ValidationError(format!(
            "At most {} tags are allowed",
            MAX_TAGS_PER_POST
        )));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCategoryInput, CreateCommentInput, PostStatus};
    use crate::services::test_support::TestApp;

    fn published(title: &str) -> CreatePostInput {
        CreatePostInput::new(title, "<p>Some words about language models</p>")
            .with_status(PostStatus::Published)
    }

    #[tokio::test]
    async fn test_create_sets_derived_fields() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;

        let post = app
            .posts
            .create(&author, published("Введение в NLP").with_tags("nlp, BERT, nlp"))
            .await
            .expect("Failed to create post");

        assert_eq!(post.slug, "vvedenie-v-nlp");
        assert_eq!(post.tags, "nlp, BERT");
        assert!(post.published_at.is_some());
        assert_eq!(post.excerpt, "Some words about language models");
        assert_eq!(post.reading_time, 1);

        let view = app.posts.get_for_edit(&author, post.id).await.unwrap();
        assert_eq!(view.tag_list.len(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_author_role_and_valid_input() {
        let app = TestApp::new().await;
        let reader = app.reader("reader").await;
        let author = app.author("writer").await;

        assert!(matches!(
            app.posts.create(&reader, published("Reader post")).await,
            Err(PostServiceError::Forbidden(_))
        ));
        assert!(matches!(
            app.posts.create(&author, published("Shrt")).await,
            Err(PostServiceError::ValidationError(_))
        ));
        let many_tags = (0..11).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(",");
        assert!(matches!(
            app.posts.create(&author, published("Too many tags").with_tags(many_tags)).await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            app.posts.create(&author, published("No such category").with_category(404)).await,
            Err(PostServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_slugs() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let first = app.posts.create(&author, published("Same title")).await.unwrap();
        let second = app.posts.create(&author, published("Same title")).await.unwrap();
        assert_eq!(first.slug, "same-title");
        assert_eq!(second.slug, "same-title-1");
    }

    #[tokio::test]
    async fn test_only_owner_or_staff_edits() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let author = app.author("writer").await;
        let other = app.author("other").await;
        let post = app.posts.create(&author, published("Owned post")).await.unwrap();

        assert!(matches!(
            app.posts
                .update(&other, post.id, UpdatePostInput::default().with_title("Hijacked"))
                .await,
            Err(PostServiceError::Forbidden(_))
        ));

        let featured = app
            .posts
            .update(
                &admin,
                post.id,
                UpdatePostInput {
                    is_featured: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(featured.is_featured);

        assert!(matches!(
            app.posts.delete(&other, post.id).await,
            Err(PostServiceError::Forbidden(_))
        ));
        app.posts.delete(&author, post.id).await.unwrap();
        assert!(matches!(
            app.posts.detail("owned-post", None).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publishing_updates_profile_count_and_cache() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let draft = app
            .posts
            .create(&author, CreatePostInput::new("Draft first", "body"))
            .await
            .unwrap();

        assert!(app.posts.detail(&draft.slug, None).await.is_err());
        assert_eq!(app.posts.list(PostListQuery::default()).await.unwrap().posts.total, 0);

        app.posts
            .update(
                &author,
                draft.id,
                UpdatePostInput::default().with_status(PostStatus::Published),
            )
            .await
            .unwrap();

        assert_eq!(app.posts.list(PostListQuery::default()).await.unwrap().posts.total, 1);
        let profile = app.profiles.public_profile("writer").await.unwrap();
        assert_eq!(profile.profile.profile.posts_count, 1);
    }

    #[tokio::test]
    async fn test_detail_counts_views_and_threads_comments() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let reader = app.reader("reader").await;
        let category = app
            .blog_categories
            .create(CreateCategoryInput::new("Models"))
            .await
            .unwrap();

        let first = app
            .posts
            .create(&author, published("First model post").with_category(category.id))
            .await
            .unwrap();
        let second = app
            .posts
            .create(&author, published("Second model post").with_category(category.id))
            .await
            .unwrap();

        let root = app
            .comments
            .add(&reader, &second.slug, CreateCommentInput::new("A long enough root comment"))
            .await
            .unwrap();
        app.comments
            .add(
                &author,
                &second.slug,
                CreateCommentInput::new("And a long enough reply").reply_to(root.comment.id),
            )
            .await
            .unwrap();

        let detail = app.posts.detail(&second.slug, Some(&reader)).await.unwrap();
        assert_eq!(detail.post.post.views_count, 1);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].replies.len(), 1);
        assert_eq!(detail.related_posts.len(), 1);
        assert_eq!(detail.related_posts[0].post.id, first.id);
        assert!(!detail.user_liked);

        let again = app.posts.detail(&second.slug, None).await.unwrap();
        assert_eq!(again.post.post.views_count, 2);
    }

    #[tokio::test]
    async fn test_repeat_visits_count_past_the_cache() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let post = app
            .posts
            .create(&author, published("Cached attention heads"))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let detail = app.posts.detail(&post.slug, None).await.unwrap();
            seen.push(detail.post.post.views_count);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_search_and_sort() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        app.posts.create(&author, published("Alpha tokenizers")).await.unwrap();
        app.posts.create(&author, published("Beta embeddings")).await.unwrap();

        let found = app
            .posts
            .list(PostListQuery {
                search: Some("token".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.posts.total, 1);

        let by_title = app
            .posts
            .list(PostListQuery {
                sort: Some("title".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_title.posts.items[0].post.title, "Alpha tokenizers");
    }

    #[tokio::test]
    async fn test_blog_home_and_category_page() {
        let app = TestApp::new().await;
        let author = app.author("writer").await;
        let category = app
            .blog_categories
            .create(CreateCategoryInput::new("Corpora"))
            .await
            .unwrap();
        for i in 0..7 {
            app.posts
                .create(&author, published(&format!("Home post {}", i)).with_category(category.id))
                .await
                .unwrap();
        }

        let home = app.posts.blog_home(2).await.unwrap();
        assert_eq!(home.posts.items.len(), 1);
        assert_eq!(home.posts.num_pages, 2);
        assert_eq!(home.latest_posts.len(), 5);

        let page = app.posts.category_page("corpora", 1, Some(&author)).await.unwrap();
        assert_eq!(page.posts.total, 7);
        assert!(page.recent_posts.is_empty());
        assert!(!page.user_following_category);

        let mine = app.posts.my_posts(&author, 1).await.unwrap();
        assert_eq!(mine.total, 7);
    }
}
