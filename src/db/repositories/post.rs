//! Post repository
//!
//! Database operations for blog posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite
//!
//! Listing queries are assembled with `QueryBuilder` from a [`PostFilter`];
//! the count and page queries share the same WHERE clause.

use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.author_id, p.category_id, p.content, p.excerpt, \
     p.featured_image, p.tags, p.status, p.is_featured, p.allow_comments, p.views_count, \
     p.likes_count, p.comments_count, p.reading_time, p.created_at, p.updated_at, p.published_at";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Write every column of an existing post
    async fn update(&self, post: &Post) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Published posts matching `filter`, one page
    async fn list_published(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>>;

    async fn count_published(&self, filter: &PostFilter) -> Result<i64>;

    /// Every post by an author regardless of status, newest first
    async fn list_by_author(&self, author_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Published since `since`, most viewed first
    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Post>>;

    /// Published posts from the same category, newest first
    async fn related(&self, category_id: i64, exclude_id: i64, limit: i64) -> Result<Vec<Post>>;

    /// The published post right before (`older = true`) or after `post`
    async fn neighbour(&self, post: &Post, older: bool) -> Result<Option<Post>>;

    /// Count one view, returning the new total
    async fn increment_views(&self, id: i64) -> Result<i64>;

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()>;

    /// Recount approved comments into `comments_count`, returning the new value
    async fn refresh_comments_count(&self, id: i64) -> Result<i64>;

    async fn count_published_by_author(&self, author_id: i64) -> Result<i64>;

    /// Every post, for maintenance passes
    async fn list_all(&self) -> Result<Vec<Post>>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        create_post_sqlite(self.pool.sqlite(), post).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by ID")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.slug = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by slug")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        update_post_sqlite(self.pool.sqlite(), post).await?;
        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete post")?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE slug = ? AND id != ?")
            .bind(slug)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to check post slug")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn list_published(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>> {
        list_published_sqlite(self.pool.sqlite(), filter, params).await
    }

    async fn count_published(&self, filter: &PostFilter) -> Result<i64> {
        count_published_sqlite(self.pool.sqlite(), filter).await
    }

    async fn list_by_author(&self, author_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        list_by_author_sqlite(self.pool.sqlite(), author_id, params).await
    }

    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {} FROM posts p
            WHERE p.status = 'published' AND p.published_at >= ?
            ORDER BY p.views_count DESC, p.published_at DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(limit)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list popular posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }

    async fn related(&self, category_id: i64, exclude_id: i64, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {} FROM posts p
            WHERE p.status = 'published' AND p.category_id = ? AND p.id != ?
            ORDER BY p.published_at DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(category_id)
            .bind(exclude_id)
            .bind(limit)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list related posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }

    async fn neighbour(&self, post: &Post, older: bool) -> Result<Option<Post>> {
        let Some(published_at) = post.published_at else {
            return Ok(None);
        };
        let (cmp, order) = if older { ("<", "DESC") } else { (">", "ASC") };
        let sql = format!(
            r#"
            SELECT {} FROM posts p
            WHERE p.status = 'published' AND p.published_at {} ?
            ORDER BY p.published_at {}
            LIMIT 1
            "#,
            POST_COLUMNS, cmp, order
        );
        let row = sqlx::query(&sql)
            .bind(published_at)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get neighbouring post")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn increment_views(&self, id: i64) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE posts SET views_count = views_count + 1 WHERE id = ? RETURNING views_count",
        )
        .bind(id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to increment post views")?;
        Ok(row.get("views_count"))
    }

    async fn set_likes_count(&self, id: i64, count: i64) -> Result<()> {
        sqlx::query("UPDATE posts SET likes_count = ? WHERE id = ?")
            .bind(count.max(0))
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update post likes")?;
        Ok(())
    }

    async fn refresh_comments_count(&self, id: i64) -> Result<i64> {
        sqlx::query(
            r#"
            UPDATE posts
            SET comments_count = (SELECT COUNT(*) FROM comments WHERE post_id = ? AND is_approved = 1)
            WHERE id = ?
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to refresh comment count")?;

        let row = sqlx::query("SELECT comments_count FROM posts WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to read comment count")?;
        Ok(row.get("comments_count"))
    }

    async fn count_published_by_author(&self, author_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM posts WHERE author_id = ? AND status = 'published'",
        )
        .bind(author_id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count author posts")?;
        Ok(row.get("count"))
    }

    async fn list_all(&self) -> Result<Vec<Post>> {
        let sql = format!("SELECT {} FROM posts p ORDER BY p.id ASC", POST_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, author_id, category_id, content, excerpt, featured_image,
                           tags, status, is_featured, allow_comments, views_count, likes_count,
                           comments_count, reading_time, created_at, updated_at, published_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(&post.featured_image)
    .bind(&post.tags)
    .bind(post.status.as_str())
    .bind(post.is_featured)
    .bind(post.allow_comments)
    .bind(post.views_count)
    .bind(post.likes_count)
    .bind(post.comments_count)
    .bind(post.reading_time)
    .bind(post.created_at)
    .bind(post.updated_at)
    .bind(post.published_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, category_id = ?, content = ?, excerpt = ?, featured_image = ?,
            tags = ?, status = ?, is_featured = ?, allow_comments = ?, reading_time = ?,
            updated_at = ?, published_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(post.category_id)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(&post.featured_image)
    .bind(&post.tags)
    .bind(post.status.as_str())
    .bind(post.is_featured)
    .bind(post.allow_comments)
    .bind(post.reading_time)
    .bind(post.updated_at)
    .bind(post.published_at)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;
    Ok(())
}

/// Appends the FROM/WHERE part shared by the list and count queries
fn push_published_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    query.push(" FROM posts p");
    if filter.category_slug.is_some() {
        query.push(" INNER JOIN categories c ON c.id = p.category_id");
    }
    if filter.author_username.is_some() {
        query.push(" INNER JOIN users u ON u.id = p.author_id");
    }
    query.push(" WHERE p.status = ");
    query.push_bind(PostStatus::Published.as_str());

    if let Some(slug) = &filter.category_slug {
        query.push(" AND c.slug = ");
        query.push_bind(slug.clone());
    }
    if let Some(username) = &filter.author_username {
        query.push(" AND u.username = ");
        query.push_bind(username.clone());
    }
    if let Some(slug) = &filter.tag_slug {
        query.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = p.id AND t.slug = ",
        );
        query.push_bind(slug.clone());
        query.push(")");
    }
    if filter.featured_only {
        query.push(" AND p.is_featured = 1");
    }
    if let Some(category_id) = filter.exclude_category_id {
        query.push(" AND (p.category_id IS NULL OR p.category_id != ");
        query.push_bind(category_id);
        query.push(")");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query.push(" AND (p.title LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.content LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.tags LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

async fn list_published_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<Vec<Post>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {}", POST_COLUMNS));
    push_published_filters(&mut query, filter);
    query.push(" ORDER BY ");
    query.push(filter.sort.order_by());
    query.push(" LIMIT ");
    query.push_bind(params.limit());
    query.push(" OFFSET ");
    query.push_bind(params.offset());

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list published posts")?;
    rows.iter().map(row_to_post_sqlite).collect()
}

async fn count_published_sqlite(pool: &SqlitePool, filter: &PostFilter) -> Result<i64> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS count");
    push_published_filters(&mut query, filter);

    let row = query
        .build()
        .fetch_one(pool)
        .await
        .context("Failed to count published posts")?;
    Ok(row.get("count"))
}

async fn list_by_author_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let sql = format!(
        "SELECT {} FROM posts p WHERE p.author_id = ? ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(author_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list author posts")?;
    let posts = rows
        .iter()
        .map(row_to_post_sqlite)
        .collect::<Result<Vec<_>>>()?;

    let row = sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE author_id = ?")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .context("Failed to count author posts")?;

    Ok((posts, row.get("count")))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status_str: String = row.get("status");
    let status = PostStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid post status in database: {}", status_str))?;

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        featured_image: row.get("featured_image"),
        tags: row.get("tags"),
        status,
        is_featured: row.get("is_featured"),
        allow_comments: row.get("allow_comments"),
        views_count: row.get("views_count"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        reading_time: row.get("reading_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        published_at: row.get("published_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CategoryKind, CategoryRepository, SqlxCategoryRepository, SqlxTagRepository,
        SqlxUserRepository, TagLink, TagRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Category, PostSort, Tag, User, UserRole};
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxPostRepository,
        author_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "writer".into(),
                "writer@nlpers.ru".into(),
                "hash".into(),
                UserRole::Author,
            ))
            .await
            .unwrap();
        Fixture {
            repo: SqlxPostRepository::new(pool.clone()),
            pool,
            author_id: author.id,
        }
    }

    fn published(slug: &str, author_id: i64, minutes_ago: i64) -> Post {
        let mut post = Post::new(
            format!("Post {}", slug),
            slug.to_string(),
            format!("<p>Content of {}</p>", slug),
            author_id,
        );
        post.status = PostStatus::Published;
        post.published_at = Some(Utc::now() - Duration::minutes(minutes_ago));
        post
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let fx = setup().await;
        let created = fx.repo.create(&published("first", fx.author_id, 0)).await.unwrap();

        assert!(created.id > 0);
        let found = fx.repo.get_by_slug("first").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, PostStatus::Published);
        assert!(fx.repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_published_excludes_drafts_newest_first() {
        let fx = setup().await;
        fx.repo.create(&published("old", fx.author_id, 60)).await.unwrap();
        fx.repo.create(&published("new", fx.author_id, 1)).await.unwrap();
        let draft = Post::new("Draft".into(), "draft".into(), "x".into(), fx.author_id);
        fx.repo.create(&draft).await.unwrap();

        let filter = PostFilter::default();
        let posts = fx
            .repo
            .list_published(&filter, &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].slug, "new");
        assert_eq!(fx.repo.count_published(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filters_by_category_tag_author_and_search() {
        let fx = setup().await;
        let category = SqlxCategoryRepository::new(fx.pool.clone(), CategoryKind::Blog)
            .create(&Category::new("NLP".into(), "nlp".into()))
            .await
            .unwrap();
        let tags = SqlxTagRepository::new(fx.pool.clone());
        let tag = tags.create(&Tag::new("BERT".into(), "bert".into())).await.unwrap();

        let mut in_category = published("in-category", fx.author_id, 5);
        in_category.category_id = Some(category.id);
        in_category.tags = "BERT".into();
        let in_category = fx.repo.create(&in_category).await.unwrap();
        tags.set_links(TagLink::Post, in_category.id, &[tag.id]).await.unwrap();
        fx.repo.create(&published("elsewhere", fx.author_id, 3)).await.unwrap();

        let by_category = PostFilter {
            category_slug: Some("nlp".into()),
            ..Default::default()
        };
        assert_eq!(fx.repo.count_published(&by_category).await.unwrap(), 1);

        let by_tag = PostFilter {
            tag_slug: Some("bert".into()),
            ..Default::default()
        };
        assert_eq!(fx.repo.count_published(&by_tag).await.unwrap(), 1);

        let by_author = PostFilter {
            author_username: Some("writer".into()),
            ..Default::default()
        };
        assert_eq!(fx.repo.count_published(&by_author).await.unwrap(), 2);

        let by_search = PostFilter {
            search: Some("BERT".into()),
            ..Default::default()
        };
        assert_eq!(fx.repo.count_published(&by_search).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sort_by_views() {
        let fx = setup().await;
        let quiet = fx.repo.create(&published("quiet", fx.author_id, 1)).await.unwrap();
        let loud = fx.repo.create(&published("loud", fx.author_id, 2)).await.unwrap();
        for _ in 0..3 {
            fx.repo.increment_views(loud.id).await.unwrap();
        }
        fx.repo.increment_views(quiet.id).await.unwrap();

        let filter = PostFilter {
            sort: PostSort::MostViewed,
            ..Default::default()
        };
        let posts = fx.repo.list_published(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(posts[0].slug, "loud");
        assert_eq!(posts[0].views_count, 3);
    }

    #[tokio::test]
    async fn test_popular_since_window() {
        let fx = setup().await;
        fx.repo.create(&published("recent", fx.author_id, 60)).await.unwrap();
        fx.repo
            .create(&published("ancient", fx.author_id, 60 * 24 * 40))
            .await
            .unwrap();

        let popular = fx
            .repo
            .popular_since(Utc::now() - Duration::days(30), 5)
            .await
            .unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].slug, "recent");
    }

    #[tokio::test]
    async fn test_neighbours() {
        let fx = setup().await;
        fx.repo.create(&published("a", fx.author_id, 30)).await.unwrap();
        let middle = fx.repo.create(&published("b", fx.author_id, 20)).await.unwrap();
        fx.repo.create(&published("c", fx.author_id, 10)).await.unwrap();

        let previous = fx.repo.neighbour(&middle, true).await.unwrap().unwrap();
        let next = fx.repo.neighbour(&middle, false).await.unwrap().unwrap();
        assert_eq!(previous.slug, "a");
        assert_eq!(next.slug, "c");
    }

    #[tokio::test]
    async fn test_update_and_slug_exists() {
        let fx = setup().await;
        let mut post = fx.repo.create(&published("before", fx.author_id, 0)).await.unwrap();
        post.slug = "after".into();
        post.title = "Changed title".into();

        let updated = fx.repo.update(&post).await.unwrap();
        assert_eq!(updated.slug, "after");
        assert!(fx.repo.slug_exists("after", None).await.unwrap());
        assert!(!fx.repo.slug_exists("after", Some(post.id)).await.unwrap());
        assert!(!fx.repo.slug_exists("before", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_counts_by_author_and_likes_floor() {
        let fx = setup().await;
        let post = fx.repo.create(&published("p", fx.author_id, 0)).await.unwrap();
        fx.repo
            .create(&Post::new("Draft".into(), "d".into(), "x".into(), fx.author_id))
            .await
            .unwrap();

        assert_eq!(fx.repo.count_published_by_author(fx.author_id).await.unwrap(), 1);
        let (all, total) = fx
            .repo
            .list_by_author(fx.author_id, &ListParams::default())
            .await
            .unwrap();
        assert_eq!((all.len(), total), (2, 2));

        fx.repo.set_likes_count(post.id, -3).await.unwrap();
        assert_eq!(fx.repo.get_by_id(post.id).await.unwrap().unwrap().likes_count, 0);
    }
}
