//! Post model
//!
//! This module provides:
//! - `Post` entity and `PostStatus`
//! - `PostView`, the post card with author, category and tags
//! - input types and the sort whitelist for list queries
//! - the derivations applied on every save (excerpt, publish date, reading time)

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::category::CategoryBrief;
use super::tag::Tag;
use super::user::UserBrief;

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 200;
pub const EXCERPT_MAX: usize = 300;
pub const MAX_TAGS_PER_POST: usize = 10;
const WORDS_PER_MINUTE: usize = 200;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("valid regex"));

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// Unique URL slug
    pub slug: String,
    pub author_id: i64,
    /// Cleared when the category is deleted
    pub category_id: Option<i64>,
    /// HTML body
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    /// Comma separated tag names as typed by the author
    pub tags: String,
    pub status: PostStatus,
    pub is_featured: bool,
    pub allow_comments: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    /// Minutes, never below 1
    pub reading_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(title: String, slug: String, content: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            title,
            slug,
            author_id,
            category_id: None,
            content,
            excerpt: String::new(),
            featured_image: String::new(),
            tags: String::new(),
            status: PostStatus::Draft,
            is_featured: false,
            allow_comments: true,
            views_count: 0,
            likes_count: 0,
            comments_count: 0,
            reading_time: 1,
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Derived fields refreshed before every write
    ///
    /// - `published_at` is stamped the first time the post is published
    /// - an empty excerpt is generated from the tag-stripped content
    /// - reading time follows the word count
    pub fn prepare_for_save(&mut self) {
        let now = Utc::now();
        if self.status == PostStatus::Published && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        if self.excerpt.trim().is_empty() {
            self.excerpt = make_excerpt(&self.content);
        }
        self.reading_time = reading_time(&self.content);
        self.updated_at = now;
    }
}

/// Strip HTML tags and cut to 300 characters, adding `...` when cut
pub fn make_excerpt(content: &str) -> String {
    let plain = strip_tags(content);
    if plain.chars().count() > EXCERPT_MAX {
        let cut: String = plain.chars().take(EXCERPT_MAX).collect();
        format!("{}...", cut)
    } else {
        plain
    }
}

pub fn strip_tags(html: &str) -> String {
    HTML_TAG.replace_all(html, "").into_owned()
}

/// Minutes to read at 200 words per minute, at least 1
pub fn reading_time(content: &str) -> i64 {
    let words = strip_tags(content).split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Visible only to the author and staff
    #[default]
    Draft,
    Published,
    /// Hidden but kept
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post card: the post plus what every listing shows next to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserBrief,
    pub category: Option<CategoryBrief>,
    pub tag_list: Vec<Tag>,
}

/// Title and slug of a neighbouring post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostLink {
    pub title: String,
    pub slug: String,
}

/// Accepted `sort` values for post listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    #[default]
    NewestFirst,
    OldestFirst,
    MostViewed,
    MostLiked,
    MostCommented,
    TitleAsc,
    TitleDesc,
}

impl PostSort {
    /// Parse a query value; anything outside the whitelist yields the default
    pub fn from_query(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "published_at" => PostSort::OldestFirst,
            "-views_count" => PostSort::MostViewed,
            "-likes_count" => PostSort::MostLiked,
            "-comments_count" => PostSort::MostCommented,
            "title" => PostSort::TitleAsc,
            "-title" => PostSort::TitleDesc,
            _ => PostSort::NewestFirst,
        }
    }

    /// ORDER BY clause over the `p` alias
    pub fn order_by(&self) -> &'static str {
        match self {
            PostSort::NewestFirst => "p.published_at DESC, p.id DESC",
            PostSort::OldestFirst => "p.published_at ASC, p.id ASC",
            PostSort::MostViewed => "p.views_count DESC, p.published_at DESC",
            PostSort::MostLiked => "p.likes_count DESC, p.published_at DESC",
            PostSort::MostCommented => "p.comments_count DESC, p.published_at DESC",
            PostSort::TitleAsc => "p.title ASC",
            PostSort::TitleDesc => "p.title DESC",
        }
    }
}

/// Filters for published post listings
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive match on title, content and tags
    pub search: Option<String>,
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub author_username: Option<String>,
    pub featured_only: bool,
    /// Leave out posts of this category
    pub exclude_category_id: Option<i64>,
    pub sort: PostSort,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub featured_image: String,
    /// Comma separated tag names
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub allow_comments: Option<bool>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Input for updating a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    /// `Some(None)` clears the category
    #[serde(default, with = "double_option")]
    pub category_id: Option<Option<i64>>,
    pub featured_image: Option<String>,
    pub tags: Option<String>,
    pub status: Option<PostStatus>,
    pub allow_comments: Option<bool>,
    /// Staff only
    pub is_featured: Option<bool>,
}

impl UpdatePostInput {
    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }
}

/// Distinguishes an absent field from an explicit `null`
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_strips_tags_and_truncates() {
        let content = format!("<p>{}</p>", "а".repeat(400));
        let excerpt = make_excerpt(&content);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX + 3);
        assert!(!excerpt.contains('<'));

        assert_eq!(make_excerpt("<b>short</b> text"), "short text");
    }

    #[test]
    fn test_prepare_for_save_sets_published_at_once() {
        let mut post = Post::new("Title".into(), "title".into(), "<p>body</p>".into(), 1);
        post.prepare_for_save();
        assert!(post.published_at.is_none());

        post.status = PostStatus::Published;
        post.prepare_for_save();
        let first = post.published_at;
        assert!(first.is_some());

        post.prepare_for_save();
        assert_eq!(post.published_at, first);
        assert_eq!(post.excerpt, "body");
    }

    #[test]
    fn test_explicit_excerpt_kept() {
        let mut post = Post::new("Title".into(), "title".into(), "content".into(), 1);
        post.excerpt = "hand written".into();
        post.prepare_for_save();
        assert_eq!(post.excerpt, "hand written");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
        assert_eq!(reading_time(&"<p>word</p> ".repeat(1000)), 5);
    }

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(PostSort::from_query(None), PostSort::NewestFirst);
        assert_eq!(PostSort::from_query(Some("-views_count")), PostSort::MostViewed);
        assert_eq!(PostSort::from_query(Some("title")), PostSort::TitleAsc);
        // Arbitrary column names are never passed through
        assert_eq!(
            PostSort::from_query(Some("password_hash; DROP TABLE posts")),
            PostSort::NewestFirst
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(PostStatus::parse("Published"), Some(PostStatus::Published));
        assert_eq!(PostStatus::parse("deleted"), None);
        assert_eq!(PostStatus::default(), PostStatus::Draft);
    }

    #[test]
    fn test_update_input_category_null() {
        let clear: UpdatePostInput = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(clear.category_id, Some(None));

        let absent: UpdatePostInput = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.category_id, None);

        let set: UpdatePostInput = serde_json::from_str(r#"{"category_id": 3}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(3)));
    }
}
