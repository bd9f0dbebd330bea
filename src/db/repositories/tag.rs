//! Tag repository
//!
//! Tags are shared between posts (`post_tags`) and archive files
//! (`archive_file_tags`); [`TagLink`] selects the join table.

use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Content a tag can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLink {
    Post,
    File,
}

impl TagLink {
    fn table(&self) -> &'static str {
        match self {
            TagLink::Post => "post_tags",
            TagLink::File => "archive_file_tags",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            TagLink::Post => "post_id",
            TagLink::File => "file_id",
        }
    }
}

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags ordered by name
    async fn list(&self, active_only: bool) -> Result<Vec<Tag>>;

    /// Active tags with published post and public file counts
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    async fn update(&self, tag: &Tag) -> Result<Tag>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Replace the tags attached to a post or file
    async fn set_links(&self, link: TagLink, owner_id: i64, tag_ids: &[i64]) -> Result<()>;

    /// Tags attached to one post or file, by name
    async fn get_linked(&self, link: TagLink, owner_id: i64, active_only: bool) -> Result<Vec<Tag>>;

    /// Active tags for many owners at once, keyed by owner id
    async fn get_linked_many(
        &self,
        link: TagLink,
        owner_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Tag>>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        create_tag_sqlite(self.pool.sqlite(), tag).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let row = sqlx::query(
            "SELECT id, name, slug, description, color, icon, is_active, created_at FROM tags WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get tag by ID")?;
        Ok(row.as_ref().map(row_to_tag_sqlite))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(
            "SELECT id, name, slug, description, color, icon, is_active, created_at FROM tags WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get tag by slug")?;
        Ok(row.as_ref().map(row_to_tag_sqlite))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(
            "SELECT id, name, slug, description, color, icon, is_active, created_at FROM tags WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get tag by name")?;
        Ok(row.as_ref().map(row_to_tag_sqlite))
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Tag>> {
        list_tags_sqlite(self.pool.sqlite(), active_only).await
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        list_tags_with_counts_sqlite(self.pool.sqlite()).await
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        sqlx::query(
            r#"
            UPDATE tags
            SET name = ?, slug = ?, description = ?, color = ?, icon = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(&tag.description)
        .bind(&tag.color)
        .bind(&tag.icon)
        .bind(tag.is_active)
        .bind(tag.id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update tag")?;

        self.get_by_id(tag.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tag not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete tag")?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tags WHERE slug = ? AND id != ?")
            .bind(slug)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to check tag slug")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn set_links(&self, link: TagLink, owner_id: i64, tag_ids: &[i64]) -> Result<()> {
        set_links_sqlite(self.pool.sqlite(), link, owner_id, tag_ids).await
    }

    async fn get_linked(&self, link: TagLink, owner_id: i64, active_only: bool) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.color, t.icon, t.is_active, t.created_at
            FROM tags t
            INNER JOIN {table} l ON l.tag_id = t.id
            WHERE l.{owner} = ? {active}
            ORDER BY t.name ASC
            "#,
            table = link.table(),
            owner = link.owner_column(),
            active = if active_only { "AND t.is_active = 1" } else { "" },
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to get linked tags")?;
        Ok(rows.iter().map(row_to_tag_sqlite).collect())
    }

    async fn get_linked_many(
        &self,
        link: TagLink,
        owner_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Tag>>> {
        get_linked_many_sqlite(self.pool.sqlite(), link, owner_ids).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tags (name, slug, description, color, icon, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tag.name)
    .bind(&tag.slug)
    .bind(&tag.description)
    .bind(&tag.color)
    .bind(&tag.icon)
    .bind(tag.is_active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        created_at: now,
        ..tag.clone()
    })
}

async fn list_tags_sqlite(pool: &SqlitePool, active_only: bool) -> Result<Vec<Tag>> {
    let sql = format!(
        "SELECT id, name, slug, description, color, icon, is_active, created_at FROM tags {} ORDER BY name ASC",
        if active_only { "WHERE is_active = 1" } else { "" }
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;
    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn list_tags_with_counts_sqlite(pool: &SqlitePool) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.slug, t.description, t.color, t.icon, t.is_active, t.created_at,
               (SELECT COUNT(*) FROM post_tags pt
                    INNER JOIN posts p ON p.id = pt.post_id
                    WHERE pt.tag_id = t.id AND p.status = 'published') AS posts_count,
               (SELECT COUNT(*) FROM archive_file_tags ft
                    INNER JOIN archive_files f ON f.id = ft.file_id
                    WHERE ft.tag_id = t.id AND f.is_public = 1) AS files_count
        FROM tags t
        WHERE t.is_active = 1
        ORDER BY t.name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list tags with counts")?;

    Ok(rows
        .iter()
        .map(|row| TagWithCount {
            tag: row_to_tag_sqlite(row),
            posts_count: row.get("posts_count"),
            files_count: row.get("files_count"),
        })
        .collect())
}

async fn set_links_sqlite(
    pool: &SqlitePool,
    link: TagLink,
    owner_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let delete = format!("DELETE FROM {} WHERE {} = ?", link.table(), link.owner_column());
    sqlx::query(&delete)
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear tag links")?;

    let insert = format!(
        "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES (?, ?)",
        link.table(),
        link.owner_column()
    );
    for tag_id in tag_ids {
        sqlx::query(&insert)
            .bind(owner_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link tag")?;
    }

    tx.commit().await.context("Failed to commit tag links")?;
    Ok(())
}

async fn get_linked_many_sqlite(
    pool: &SqlitePool,
    link: TagLink,
    owner_ids: &[i64],
) -> Result<HashMap<i64, Vec<Tag>>> {
    let mut by_owner: HashMap<i64, Vec<Tag>> = HashMap::new();
    if owner_ids.is_empty() {
        return Ok(by_owner);
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        r#"
        SELECT l.{owner} AS owner_id, t.id, t.name, t.slug, t.description, t.color, t.icon,
               t.is_active, t.created_at
        FROM tags t
        INNER JOIN {table} l ON l.tag_id = t.id
        WHERE t.is_active = 1 AND l.{owner} IN (
        "#,
        owner = link.owner_column(),
        table = link.table(),
    ));
    let mut separated = query.separated(", ");
    for id in owner_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY t.name ASC");

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to get tags for owners")?;

    for row in &rows {
        by_owner
            .entry(row.get("owner_id"))
            .or_default()
            .push(row_to_tag_sqlite(row));
    }
    Ok(by_owner)
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        color: row.get("color"),
        icon: row.get("icon"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    fn create_test_tag(slug: &str, name: &str) -> Tag {
        Tag::new(name.to_string(), slug.to_string())
    }

    async fn create_test_user(pool: &SqlitePool) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) VALUES ('tagger', 't@x.ru', 'h', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn create_test_post(pool: &SqlitePool, author_id: i64, slug: &str, status: &str) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO posts (title, slug, author_id, content, status, created_at, updated_at) VALUES ('Title', ?, ?, 'c', ?, ?, ?)",
        )
        .bind(slug)
        .bind(author_id)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_create_and_lookup_tag() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&create_test_tag("bert", "BERT")).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(repo.get_by_slug("bert").await.unwrap().unwrap().name, "BERT");
        assert_eq!(repo.get_by_name("BERT").await.unwrap().unwrap().id, created.id);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tags_ordered_by_name() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_tag("zebra", "Zebra")).await.unwrap();
        repo.create(&create_test_tag("apple", "Apple")).await.unwrap();
        let mut inactive = create_test_tag("old", "Old");
        inactive.is_active = false;
        repo.create(&inactive).await.unwrap();

        let tags = repo.list(true).await.unwrap();
        assert_eq!(
            tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["Apple", "Zebra"]
        );
        assert_eq!(repo.list(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_set_links_replaces_previous() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(pool.sqlite()).await;
        let post_id = create_test_post(pool.sqlite(), user_id, "post", "published").await;
        let a = repo.create(&create_test_tag("a", "A")).await.unwrap();
        let b = repo.create(&create_test_tag("b", "B")).await.unwrap();

        repo.set_links(TagLink::Post, post_id, &[a.id, b.id, a.id]).await.unwrap();
        assert_eq!(repo.get_linked(TagLink::Post, post_id, true).await.unwrap().len(), 2);

        repo.set_links(TagLink::Post, post_id, &[b.id]).await.unwrap();
        let linked = repo.get_linked(TagLink::Post, post_id, true).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].slug, "b");
    }

    #[tokio::test]
    async fn test_counts_only_published_posts() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(pool.sqlite()).await;
        let published = create_test_post(pool.sqlite(), user_id, "pub", "published").await;
        let draft = create_test_post(pool.sqlite(), user_id, "draft", "draft").await;
        let tag = repo.create(&create_test_tag("nlp", "NLP")).await.unwrap();

        repo.set_links(TagLink::Post, published, &[tag.id]).await.unwrap();
        repo.set_links(TagLink::Post, draft, &[tag.id]).await.unwrap();

        let counts = repo.list_with_counts().await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].posts_count, 1);
        assert_eq!(counts[0].files_count, 0);
    }

    #[tokio::test]
    async fn test_get_linked_many_groups_by_owner() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(pool.sqlite()).await;
        let p1 = create_test_post(pool.sqlite(), user_id, "p1", "published").await;
        let p2 = create_test_post(pool.sqlite(), user_id, "p2", "published").await;
        let tag = repo.create(&create_test_tag("nlp", "NLP")).await.unwrap();
        let other = repo.create(&create_test_tag("ml", "ML")).await.unwrap();

        repo.set_links(TagLink::Post, p1, &[tag.id, other.id]).await.unwrap();
        repo.set_links(TagLink::Post, p2, &[tag.id]).await.unwrap();

        let map = repo.get_linked_many(TagLink::Post, &[p1, p2]).await.unwrap();
        assert_eq!(map[&p1].len(), 2);
        assert_eq!(map[&p2].len(), 1);
        assert!(repo.get_linked_many(TagLink::Post, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slug_exists() {
        let (_pool, repo) = setup_test_repo().await;
        let tag = repo.create(&create_test_tag("rust", "Rust")).await.unwrap();
        assert!(repo.slug_exists("rust", None).await.unwrap());
        assert!(!repo.slug_exists("rust", Some(tag.id)).await.unwrap());
    }
}
