//! Category repository
//!
//! Blog categories and archive file categories share one row layout, so a
//! single implementation serves both tables. [`CategoryKind`] picks the table
//! and what the per-category counts mean.

use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, color, icon, image, is_active, created_at";

/// Which category table a repository works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    /// `categories`, counted by published posts
    Blog,
    /// `file_categories`, counted by public archive files
    Archive,
}

impl CategoryKind {
    fn table(&self) -> &'static str {
        match self {
            CategoryKind::Blog => "categories",
            CategoryKind::Archive => "file_categories",
        }
    }

    fn count_join(&self) -> &'static str {
        match self {
            CategoryKind::Blog => {
                "LEFT JOIN posts x ON x.category_id = c.id AND x.status = 'published'"
            }
            CategoryKind::Archive => {
                "LEFT JOIN archive_files x ON x.category_id = c.id AND x.is_public = 1"
            }
        }
    }
}

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>>;

    /// All categories ordered by name
    async fn list(&self, active_only: bool) -> Result<Vec<Category>>;

    /// Active categories by name with their published post (or public file) count
    async fn list_with_counts(&self) -> Result<Vec<(Category, i64)>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Whether another row already uses `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn count_active(&self) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
    kind: CategoryKind,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool, kind: CategoryKind) -> Self {
        Self { pool, kind }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool, kind: CategoryKind) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool, kind))
    }

    fn sqlite(&self) -> &SqlitePool {
        self.pool.sqlite()
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        create_category_sqlite(self.sqlite(), self.kind, category).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            CATEGORY_COLUMNS,
            self.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.sqlite())
            .await
            .context("Failed to get category by ID")?;
        Ok(row.as_ref().map(row_to_category_sqlite))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE slug = ?",
            CATEGORY_COLUMNS,
            self.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.sqlite())
            .await
            .context("Failed to get category by slug")?;
        Ok(row.as_ref().map(row_to_category_sqlite))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE name = ?",
            CATEGORY_COLUMNS,
            self.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(self.sqlite())
            .await
            .context("Failed to get category by name")?;
        Ok(row.as_ref().map(row_to_category_sqlite))
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE id IN (",
            CATEGORY_COLUMNS,
            self.kind.table()
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = query
            .build()
            .fetch_all(self.sqlite())
            .await
            .context("Failed to get categories by ids")?;
        Ok(rows.iter().map(row_to_category_sqlite).collect())
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Category>> {
        let filter = if active_only { "WHERE is_active = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY name ASC",
            CATEGORY_COLUMNS,
            self.kind.table(),
            filter
        );
        let rows = sqlx::query(&sql)
            .fetch_all(self.sqlite())
            .await
            .context("Failed to list categories")?;
        Ok(rows.iter().map(row_to_category_sqlite).collect())
    }

    async fn list_with_counts(&self) -> Result<Vec<(Category, i64)>> {
        let sql = format!(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.color, c.icon, c.image,
                   c.is_active, c.created_at, COUNT(x.id) AS content_count
            FROM {} c
            {}
            WHERE c.is_active = 1
            GROUP BY c.id
            ORDER BY c.name ASC
            "#,
            self.kind.table(),
            self.kind.count_join()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(self.sqlite())
            .await
            .context("Failed to list categories with counts")?;

        Ok(rows
            .iter()
            .map(|row| (row_to_category_sqlite(row), row.get("content_count")))
            .collect())
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        let sql = format!(
            r#"
            UPDATE {}
            SET name = ?, slug = ?, description = ?, color = ?, icon = ?, image = ?, is_active = ?
            WHERE id = ?
            "#,
            self.kind.table()
        );
        sqlx::query(&sql)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.color)
            .bind(&category.icon)
            .bind(&category.image)
            .bind(category.is_active)
            .bind(category.id)
            .execute(self.sqlite())
            .await
            .context("Failed to update category")?;

        self.get_by_id(category.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.kind.table());
        sqlx::query(&sql)
            .bind(id)
            .execute(self.sqlite())
            .await
            .context("Failed to delete category")?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE slug = ? AND id != ?",
            self.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(slug)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(self.sqlite())
            .await
            .context("Failed to check category slug")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn count_active(&self) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE is_active = 1",
            self.kind.table()
        );
        let row = sqlx::query(&sql)
            .fetch_one(self.sqlite())
            .await
            .context("Failed to count categories")?;
        Ok(row.get("count"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(
    pool: &SqlitePool,
    kind: CategoryKind,
    category: &Category,
) -> Result<Category> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO {} (name, slug, description, color, icon, image, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        kind.table()
    );

    let result = sqlx::query(&sql)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(&category.image)
        .bind(category.is_active)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        created_at: now,
        ..category.clone()
    })
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        color: row.get("color"),
        icon: row.get("icon"),
        image: row.get("image"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}
