//! Blog category model
//!
//! The input types are shared with archive file categories, which carry the
//! same set of presentation fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_COLOR: &str = "#007bff";

/// Blog category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// Unique name, at most 100 characters
    pub name: String,
    /// URL-friendly slug
    pub slug: String,
    pub description: String,
    /// Hex color used by the front end, `#007bff` by default
    pub color: String,
    /// Icon class name
    pub icon: String,
    /// Path of the category image below the media root
    pub image: String,
    /// Inactive categories are hidden from listings and counts
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            slug,
            description: String::new(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            icon: String::new(),
            image: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Category with the number of published posts in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub posts_count: i64,
}

/// Category summary embedded in post cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBrief {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl From<&Category> for CategoryBrief {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            slug: c.slug.clone(),
            color: c.color.clone(),
        }
    }
}

/// Input for creating a category (blog or archive)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    /// Optional explicit slug; generated from the name when empty
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl CreateCategoryInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = Some(false);
        self
    }
}

/// Input for updating a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

/// `#rrggbb` check used for category, tag and header colors
pub fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_new_defaults() {
        let category = Category::new("NLP".to_string(), "nlp".to_string());
        assert_eq!(category.id, 0);
        assert_eq!(category.color, "#007bff");
        assert!(category.is_active);
    }

    #[test]
    fn test_create_input_builder() {
        let input = CreateCategoryInput::new("Машинное обучение")
            .with_description("ML")
            .with_color("#ff0000")
            .inactive();
        assert_eq!(input.name, "Машинное обучение");
        assert_eq!(input.color.as_deref(), Some("#ff0000"));
        assert_eq!(input.is_active, Some(false));
    }

    #[test]
    fn test_hex_color() {
        assert!(is_valid_hex_color("#007bff"));
        assert!(is_valid_hex_color("#ABCDEF"));
        assert!(!is_valid_hex_color("007bff"));
        assert!(!is_valid_hex_color("#07bf"));
        assert!(!is_valid_hex_color("#zzzzzz"));
    }

    #[test]
    fn test_with_count_flattens() {
        let with_count = CategoryWithCount {
            category: Category::new("NLP".to_string(), "nlp".to_string()),
            posts_count: 4,
        };
        let json = serde_json::to_value(&with_count).unwrap();
        assert_eq!(json["slug"], "nlp");
        assert_eq!(json["posts_count"], 4);
    }
}
