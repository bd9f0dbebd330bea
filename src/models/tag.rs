//! Tag model
//!
//! Tags are shared between blog posts and archive files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_COLOR: &str = "#6c757d";

/// Maximum tag name length
pub const TAG_NAME_MAX: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    /// Unique name
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            slug,
            description: String::new(),
            color: DEFAULT_TAG_COLOR.to_string(),
            icon: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Tag with usage numbers for the tag cloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    /// Published posts carrying the tag
    pub posts_count: i64,
    /// Public archive files carrying the tag
    pub files_count: i64,
}

impl TagWithCount {
    pub fn total_content_count(&self) -> i64 {
        self.posts_count + self.files_count
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTagInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

/// Split a comma separated tag field into trimmed, non-empty, unique names
///
/// Order of first appearance is kept; duplicates compare case-insensitively.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut names = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let folded = name.to_lowercase();
        if !seen.contains(&folded) {
            seen.push(folded);
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = Tag::new("Rust".to_string(), "rust".to_string());
        assert_eq!(tag.id, 0);
        assert_eq!(tag.color, "#6c757d");
        assert!(tag.is_active);
    }

    #[test]
    fn test_total_content_count() {
        let with_count = TagWithCount {
            tag: Tag::new("NLP".to_string(), "nlp".to_string()),
            posts_count: 3,
            files_count: 2,
        };
        assert_eq!(with_count.total_content_count(), 5);
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            parse_tag_list(" nlp, BERT ,, nlp ,Трансформеры"),
            vec!["nlp", "BERT", "Трансформеры"]
        );
        assert!(parse_tag_list("  , ,").is_empty());
        assert_eq!(parse_tag_list("NLP, nlp"), vec!["NLP"]);
    }
}
