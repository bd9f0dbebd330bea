//! Cache key derivation
//!
//! A key is `"{namespace}:{md5}"` where the digest covers the namespace and
//! every argument joined with `_`. Equal arguments always produce the same
//! key, and `"{namespace}:*"` removes a whole query family at once.

use std::time::Duration;

/// Cache namespaces and the TTLs their entries are stored with
pub mod ns {
    pub const POSTS_LIST: &str = "posts_list";
    pub const POPULAR_POSTS: &str = "popular_posts";
    pub const RECENT_POSTS: &str = "recent_posts";
    pub const CATEGORIES_WITH_COUNTS: &str = "categories_with_counts";
    pub const TAGS_WITH_COUNTS: &str = "tags_with_counts";
    pub const POST_DETAIL: &str = "post_detail";
    pub const USER_PROFILE: &str = "user_profile";

    pub const FILES_LIST: &str = "files_list";
    pub const FEATURED_FILES: &str = "featured_files";
    pub const RECENT_FILES: &str = "recent_files";
    pub const POPULAR_FILES: &str = "popular_files";
    pub const FILE_CATEGORIES: &str = "file_categories";
    pub const FILE_DETAIL: &str = "file_detail";
    pub const USER_FILES: &str = "user_files";
    pub const FILE_STATISTICS: &str = "file_statistics";

    pub const SITE_SETTINGS: &str = "site_settings";
}

pub mod ttl {
    use super::Duration;

    pub const POSTS_LIST: Duration = Duration::from_secs(600);
    pub const POPULAR_POSTS: Duration = Duration::from_secs(3600);
    pub const RECENT_POSTS: Duration = Duration::from_secs(1800);
    pub const CATEGORIES_WITH_COUNTS: Duration = Duration::from_secs(7200);
    pub const TAGS_WITH_COUNTS: Duration = Duration::from_secs(7200);
    pub const POST_DETAIL: Duration = Duration::from_secs(3600);
    pub const USER_PROFILE: Duration = Duration::from_secs(1800);

    pub const FILES_LIST: Duration = Duration::from_secs(900);
    pub const FEATURED_FILES: Duration = Duration::from_secs(3600);
    pub const RECENT_FILES: Duration = Duration::from_secs(1800);
    pub const POPULAR_FILES: Duration = Duration::from_secs(3600);
    pub const FILE_CATEGORIES: Duration = Duration::from_secs(7200);
    pub const FILE_DETAIL: Duration = Duration::from_secs(3600);
    pub const USER_FILES: Duration = Duration::from_secs(1800);
    pub const FILE_STATISTICS: Duration = Duration::from_secs(3600);

    pub const SITE_SETTINGS: Duration = Duration::from_secs(3600);
}

/// Filter value used when a list query is not narrowed by that dimension
pub const ALL: &str = "all";

/// Number of list pages dropped per filter on invalidation
pub const INVALIDATED_PAGES: u32 = 9;

/// Patterns removed by `clear-cache` when no pattern is given
pub const DEFAULT_CLEAR_PATTERNS: &[&str] = &[
    "posts_list:*",
    "popular_posts:*",
    "recent_posts:*",
    "categories_with_counts:*",
    "tags_with_counts:*",
    "files_list:*",
    "featured_files:*",
    "recent_files:*",
    "popular_files:*",
    "file_categories:*",
    "file_statistics:*",
];

/// Build the cache key for `namespace` and its arguments
pub fn cache_key<I, S>(namespace: &str, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::from(namespace);
    for arg in args {
        joined.push('_');
        joined.push_str(arg.as_ref());
    }
    format!("{}:{:x}", namespace, md5::compute(joined.as_bytes()))
}

/// Pattern matching every key of a namespace
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{}:*", namespace)
}

/// Optional filter rendered the way list keys expect it
pub fn or_all<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| ALL.to_string())
}
