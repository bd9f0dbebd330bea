//! Cached blog queries and their invalidation
//!
//! Every public blog listing goes through here. Keys come from
//! [`crate::cache::keys::cache_key`], so the same arguments always hit the
//! same entry and a write can drop exactly the entries it affects.

use crate::cache::keys::{self, cache_key, ns, or_all, ttl};
use crate::cache::{get_or_load, Cache, CacheLayer};
use crate::db::repositories::{
    CategoryRepository, EngagementRepository, PostRepository, ProfileRepository, TagRepository,
    UserRepository,
};
use crate::models::{
    CategoryWithCount, ListParams, PagedResult, PostFilter, PostView, ProfileView, PublicUser,
    TagWithCount, UserProfile,
};
use crate::services::views::ContentViews;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const POSTS_PER_PAGE: u32 = 10;
pub const DEFAULT_SIDEBAR_LIMIT: i64 = 5;
/// Window used by [`BlogCache::popular_posts`]
pub const POPULAR_WINDOW_DAYS: i64 = 30;

pub struct BlogCache {
    cache: Arc<Cache>,
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    engagement: Arc<dyn EngagementRepository>,
    views: Arc<ContentViews>,
}

impl BlogCache {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<Cache>,
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        engagement: Arc<dyn EngagementRepository>,
        views: Arc<ContentViews>,
    ) -> Self {
        Self {
            cache,
            posts,
            categories,
            tags,
            users,
            profiles,
            engagement,
            views,
        }
    }

    /// Published posts, newest first, ten per page
    pub async fn posts_list(
        &self,
        category_slug: Option<&str>,
        tag_slug: Option<&str>,
        author: Option<&str>,
        page: u32,
    ) -> Result<PagedResult<PostView>> {
        let page = page.max(1);
        let key = cache_key(
            ns::POSTS_LIST,
            [
                or_all(category_slug),
                or_all(tag_slug),
                or_all(author),
                page.to_string(),
            ],
        );

        get_or_load(&self.cache, &key, ttl::POSTS_LIST, || async move {
            let filter = PostFilter {
                category_slug: category_slug.map(str::to_string),
                tag_slug: tag_slug.map(str::to_string),
                author_username: author.map(str::to_string),
                ..PostFilter::default()
            };
            let total = self.posts.count_published(&filter).await?;
            let params = ListParams::new(page, POSTS_PER_PAGE).clamped(total);
            let posts = self.posts.list_published(&filter, &params).await?;
            let items = self.views.post_views(posts).await?;
            Ok(PagedResult::new(items, total, &params))
        })
        .await
    }

    /// Most viewed posts published in the last 30 days
    pub async fn popular_posts(&self, limit: i64) -> Result<Vec<PostView>> {
        let key = cache_key(ns::POPULAR_POSTS, [limit.to_string()]);
        get_or_load(&self.cache, &key, ttl::POPULAR_POSTS, || async move {
            let since = Utc::now() - Duration::days(POPULAR_WINDOW_DAYS);
            let posts = self.posts.popular_since(since, limit).await?;
            self.views.post_views(posts).await
        })
        .await
    }

    pub async fn recent_posts(&self, limit: i64) -> Result<Vec<PostView>> {
        let key = cache_key(ns::RECENT_POSTS, [limit.to_string()]);
        get_or_load(&self.cache, &key, ttl::RECENT_POSTS, || async move {
            let params = ListParams::new(1, limit.clamp(1, 100) as u32);
            let posts = self
                .posts
                .list_published(&PostFilter::default(), &params)
                .await?;
            self.views.post_views(posts).await
        })
        .await
    }

    /// Active categories with their published post counts, by name
    pub async fn categories_with_counts(&self) -> Result<Vec<CategoryWithCount>> {
        let key = cache_key(ns::CATEGORIES_WITH_COUNTS, std::iter::empty::<&str>());
        get_or_load(&self.cache, &key, ttl::CATEGORIES_WITH_COUNTS, || async move {
            let rows = self.categories.list_with_counts().await?;
            Ok(rows
                .into_iter()
                .map(|(category, posts_count)| CategoryWithCount {
                    category,
                    posts_count,
                })
                .collect())
        })
        .await
    }

    pub async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let key = cache_key(ns::TAGS_WITH_COUNTS, std::iter::empty::<&str>());
        get_or_load(&self.cache, &key, ttl::TAGS_WITH_COUNTS, || async move {
            self.tags.list_with_counts().await
        })
        .await
    }

    /// A published post with its author, category and active tags
    ///
    /// Drafts are never cached; `None` is not cached either.
    pub async fn post_detail(&self, slug: &str) -> Result<Option<PostView>> {
        let key = cache_key(ns::POST_DETAIL, [slug]);
        if let Some(hit) = self.cache.get::<PostView>(&key).await.ok().flatten() {
            return Ok(Some(hit));
        }

        let post = match self.posts.get_by_slug(slug).await? {
            Some(post) if post.is_published() => post,
            _ => return Ok(None),
        };
        let view = self.views.post_view(post).await?;
        let _ = self.cache.set(&key, &view, ttl::POST_DETAIL).await;
        Ok(Some(view))
    }

    /// Public profile page data for `username`
    pub async fn user_profile(&self, username: &str) -> Result<Option<ProfileView>> {
        let key = cache_key(ns::USER_PROFILE, [username]);
        if let Some(hit) = self.cache.get::<ProfileView>(&key).await.ok().flatten() {
            return Ok(Some(hit));
        }

        let user = match self.users.get_by_username(username).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let profile = match self.profiles.get_by_user_id(user.id).await? {
            Some(profile) => profile,
            None => UserProfile::new(user.id),
        };
        let view = ProfileView {
            user: PublicUser::from(&user),
            profile,
            followers_count: self.engagement.count_followers(user.id).await?,
            following_count: self.engagement.count_following(user.id).await?,
            posts_count: self.posts.count_published_by_author(user.id).await?,
        };
        let _ = self.cache.set(&key, &view, ttl::USER_PROFILE).await;
        Ok(Some(view))
    }

    /// Drop the entries a post, category or tag write can make stale
    ///
    /// Always removes the first unfiltered list page, the popular and recent
    /// sidebars and both count lists. A slug removes that post's detail entry;
    /// a category or tag slug removes the first filtered list pages.
    pub async fn invalidate_post_cache(
        &self,
        post_slug: Option<&str>,
        category_slug: Option<&str>,
        tag_slug: Option<&str>,
    ) {
        let mut doomed = vec![
            cache_key(ns::POSTS_LIST, [keys::ALL, keys::ALL, keys::ALL, "1"]),
            cache_key(ns::POPULAR_POSTS, [DEFAULT_SIDEBAR_LIMIT.to_string()]),
            cache_key(ns::RECENT_POSTS, [DEFAULT_SIDEBAR_LIMIT.to_string()]),
            cache_key(ns::CATEGORIES_WITH_COUNTS, std::iter::empty::<&str>()),
            cache_key(ns::TAGS_WITH_COUNTS, std::iter::empty::<&str>()),
        ];

        if let Some(slug) = post_slug {
            doomed.push(cache_key(ns::POST_DETAIL, [slug]));
        }
        for page in 1..=keys::INVALIDATED_PAGES {
            let page = page.to_string();
            if let Some(category) = category_slug {
                doomed.push(cache_key(
                    ns::POSTS_LIST,
                    [category, keys::ALL, keys::ALL, page.as_str()],
                ));
            }
            if let Some(tag) = tag_slug {
                doomed.push(cache_key(
                    ns::POSTS_LIST,
                    [keys::ALL, tag, keys::ALL, page.as_str()],
                ));
            }
        }

        self.delete_keys(&doomed).await;
        tracing::debug!(
            "Invalidated {} blog cache entries (post={:?}, category={:?}, tag={:?})",
            doomed.len(),
            post_slug,
            category_slug,
            tag_slug
        );
    }

    pub async fn invalidate_user_cache(&self, username: &str) {
        let key = cache_key(ns::USER_PROFILE, [username]);
        self.delete_keys(&[key]).await;
    }

    async fn delete_keys(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!("Failed to delete cache key {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{create_cache, CacheLayer};
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        CategoryKind, SqlxCategoryRepository, SqlxEngagementRepository, SqlxPostRepository,
        SqlxProfileRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Category, Post, PostStatus, User, UserRole};

    struct Fixture {
        blog: BlogCache,
        cache: Arc<Cache>,
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        author_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = create_cache(&CacheConfig::default()).await.unwrap();

        let users = SqlxUserRepository::boxed(pool.clone());
        let profiles = SqlxProfileRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Blog);
        let tags = SqlxTagRepository::boxed(pool.clone());
        let posts = SqlxPostRepository::boxed(pool.clone());
        let views = Arc::new(ContentViews::new(
            users.clone(),
            profiles.clone(),
            categories.clone(),
            SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Archive),
            tags.clone(),
        ));

        let author = users
            .create(&User::new("writer".into(), "w@x.ru".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();
        profiles.create(author.id).await.unwrap();

        let blog = BlogCache::new(
            cache.clone(),
            posts.clone(),
            categories.clone(),
            tags,
            users,
            profiles,
            SqlxEngagementRepository::boxed(pool.clone()),
            views,
        );
        Fixture {
            blog,
            cache,
            posts,
            categories,
            author_id: author.id,
        }
    }

    async fn publish(fx: &Fixture, slug: &str, category_id: Option<i64>) -> Post {
        let mut post = Post::new(format!("Post {}", slug), slug.into(), "text".into(), fx.author_id);
        post.status = PostStatus::Published;
        post.category_id = category_id;
        post.prepare_for_save();
        fx.posts.create(&post).await.unwrap()
    }

    #[tokio::test]
    async fn test_posts_list_is_cached_until_invalidated() {
        let fx = setup().await;
        publish(&fx, "first", None).await;

        let page = fx.blog.posts_list(None, None, None, 1).await.unwrap();
        assert_eq!(page.total, 1);

        // A write without invalidation is not visible yet
        publish(&fx, "second", None).await;
        let stale = fx.blog.posts_list(None, None, None, 1).await.unwrap();
        assert_eq!(stale.total, 1);

        fx.blog.invalidate_post_cache(Some("second"), None, None).await;
        let fresh = fx.blog.posts_list(None, None, None, 1).await.unwrap();
        assert_eq!(fresh.total, 2);
        assert_eq!(fresh.items[0].post.slug, "second");
    }

    #[tokio::test]
    async fn test_category_pages_invalidated_by_slug() {
        let fx = setup().await;
        let category = fx
            .categories
            .create(&Category::new("NLP".into(), "nlp".into()))
            .await
            .unwrap();
        publish(&fx, "a", Some(category.id)).await;
        assert_eq!(fx.blog.posts_list(Some("nlp"), None, None, 1).await.unwrap().total, 1);

        publish(&fx, "b", Some(category.id)).await;
        fx.blog.invalidate_post_cache(None, Some("nlp"), None).await;
        assert_eq!(fx.blog.posts_list(Some("nlp"), None, None, 1).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_post_detail_skips_drafts() {
        let fx = setup().await;
        let draft = Post::new("Draft post".into(), "draft".into(), "x".into(), fx.author_id);
        fx.posts.create(&draft).await.unwrap();
        assert!(fx.blog.post_detail("draft").await.unwrap().is_none());

        publish(&fx, "live", None).await;
        let detail = fx.blog.post_detail("live").await.unwrap().unwrap();
        assert_eq!(detail.author.username, "writer");

        let key = cache_key(ns::POST_DETAIL, ["live"]);
        assert!(fx.cache.get::<PostView>(&key).await.unwrap().is_some());
        fx.blog.invalidate_post_cache(Some("live"), None, None).await;
        assert!(fx.cache.get::<PostView>(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_with_counts() {
        let fx = setup().await;
        let nlp = fx
            .categories
            .create(&Category::new("NLP".into(), "nlp".into()))
            .await
            .unwrap();
        fx.categories
            .create(&Category::new("Audio".into(), "audio".into()))
            .await
            .unwrap();
        publish(&fx, "x", Some(nlp.id)).await;

        let counts = fx.blog.categories_with_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].category.slug, "audio");
        assert_eq!(counts[0].posts_count, 0);
        assert_eq!(counts[1].posts_count, 1);
    }

    #[tokio::test]
    async fn test_user_profile() {
        let fx = setup().await;
        publish(&fx, "mine", None).await;

        let profile = fx.blog.user_profile("writer").await.unwrap().unwrap();
        assert_eq!(profile.posts_count, 1);
        assert_eq!(profile.followers_count, 0);
        assert!(fx.blog.user_profile("ghost").await.unwrap().is_none());

        fx.blog.invalidate_user_cache("writer").await;
        let key = cache_key(ns::USER_PROFILE, ["writer"]);
        assert!(fx.cache.get::<ProfileView>(&key).await.unwrap().is_none());
    }
}
