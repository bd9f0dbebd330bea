//! Category service
//!
//! Implements business logic for blog and archive categories:
//! - Create, update, delete (staff only, checked by the handlers)
//! - Name uniqueness validation
//! - Slug generation from the (possibly Cyrillic) name
//! - Cache invalidation of the listings a category appears in

use crate::db::repositories::{CategoryKind, CategoryRepository};
use crate::models::{is_valid_hex_color, Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::archive_cache::ArchiveCache;
use crate::services::blog_cache::BlogCache;
use crate::services::slug::{generate_unique_slug, validate_slug};
use anyhow::Context;
use std::sync::Arc;

pub const CATEGORY_NAME_MAX: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Which cached listings a category write touches
enum Invalidation {
    Blog(Arc<BlogCache>),
    Archive(Arc<ArchiveCache>),
}

/// Category service for one category table
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    invalidation: Invalidation,
}

impl CategoryService {
    /// Service over blog categories
    pub fn blog(repo: Arc<dyn CategoryRepository>, cache: Arc<BlogCache>) -> Self {
        Self {
            repo,
            invalidation: Invalidation::Blog(cache),
        }
    }

    /// Service over archive file categories
    pub fn archive(repo: Arc<dyn CategoryRepository>, cache: Arc<ArchiveCache>) -> Self {
        Self {
            repo,
            invalidation: Invalidation::Archive(cache),
        }
    }

    pub fn kind(&self) -> CategoryKind {
        match self.invalidation {
            Invalidation::Blog(_) => CategoryKind::Blog,
            Invalidation::Archive(_) => CategoryKind::Archive,
        }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list(active_only).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))
    }

    /// Active category by slug; inactive ones are treated as missing
    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        match self.repo.get_by_slug(slug).await? {
            Some(category) if category.is_active => Ok(category),
            _ => Err(CategoryServiceError::NotFound(slug.to_string())),
        }
    }

    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let name = input.name.trim().to_string();
        self.validate_name(&name, None).await?;

        let slug = self.resolve_slug(input.slug.as_deref(), &name, None).await?;
        let mut category = Category::new(name, slug);
        category.description = input.description;
        if let Some(color) = input.color {
            validate_color(&color)?;
            category.color = color;
        }
        category.icon = input.icon;
        category.image = input.image;
        category.is_active = input.is_active.unwrap_or(true);

        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;
        tracing::info!("Created {:?} category {}", self.kind(), created.slug);
        self.invalidate(&created).await;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;
        let old_slug = category.slug.clone();

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name != category.name {
                self.validate_name(&name, Some(id)).await?;
                category.name = name;
            }
        }
        if let Some(slug) = input.slug {
            if slug != category.slug {
                category.slug = self.resolve_slug(Some(&slug), &category.name, Some(id)).await?;
            }
        }
        if let Some(description) = input.description {
            category.description = description;
        }
        if let Some(color) = input.color {
            validate_color(&color)?;
            category.color = color;
        }
        if let Some(icon) = input.icon {
            category.icon = icon;
        }
        if let Some(image) = input.image {
            category.image = image;
        }
        if let Some(is_active) = input.is_active {
            category.is_active = is_active;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;
        if old_slug != updated.slug {
            if let Invalidation::Blog(cache) = &self.invalidation {
                cache.invalidate_post_cache(None, Some(&old_slug), None).await;
            }
        }
        self.invalidate(&updated).await;
        Ok(updated)
    }

    /// Delete a category; its posts or files keep existing without one
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let category = self.get_by_id(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete category")?;
        self.invalidate(&category).await;
        Ok(())
    }

    async fn validate_name(
        &self,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), CategoryServiceError> {
        if name.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > CATEGORY_NAME_MAX {
            return Err(CategoryServiceError::ValidationError(format!(
                "Category name must be at most {} characters",
                CATEGORY_NAME_MAX
            )));
        }
        if let Some(existing) = self.repo.get_by_name(name).await? {
            if Some(existing.id) != exclude_id {
                return Err(CategoryServiceError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    /// An explicit slug must be valid and free; otherwise one is generated
    async fn resolve_slug(
        &self,
        explicit: Option<&str>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, CategoryServiceError> {
        if let Some(slug) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
            if !validate_slug(slug) {
                return Err(CategoryServiceError::ValidationError(format!(
                    "Invalid slug: {}",
                    slug
                )));
            }
            if self.repo.slug_exists(slug, exclude_id).await? {
                return Err(CategoryServiceError::DuplicateSlug(slug.to_string()));
            }
            return Ok(slug.to_string());
        }

        let repo = self.repo.clone();
        let slug = generate_unique_slug("category", name, |candidate| {
            let repo = repo.clone();
            async move { repo.slug_exists(&candidate, exclude_id).await }
        })
        .await?;
        Ok(slug)
    }

    async fn invalidate(&self, category: &Category) {
        match &self.invalidation {
            Invalidation::Blog(cache) => {
                cache
                    .invalidate_post_cache(None, Some(&category.slug), None)
                    .await
            }
            Invalidation::Archive(cache) => {
                cache
                    .invalidate_file_cache(None, Some(category.id), None)
                    .await
            }
        }
    }
}

fn validate_color(color: &str) -> Result<(), CategoryServiceError> {
    if is_valid_hex_color(color) {
        Ok(())
    } else {
        Err(CategoryServiceError::ValidationError(format!(
            "Invalid color: {}",
            color
        )))
    }
}
