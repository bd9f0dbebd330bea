//! Archive models
//!
//! This module provides:
//! - `FileCategory` and `ArchiveFile` with its `FileType`
//! - file comments, likes, download records and playlists
//! - `FileSort` and `FileFilter` for listings
//! - the aggregate `FileStatistics`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::category::Category;
use super::tag::Tag;
use super::user::UserBrief;

pub const FILE_TITLE_MAX: usize = 200;
pub const MAX_TAGS_PER_FILE: usize = 15;
pub const FILE_COMMENT_MIN_CHARS: usize = 5;
pub const PLAYLIST_NAME_MIN: usize = 3;

/// Archive categories carry exactly the blog category fields
pub type FileCategory = Category;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCategoryWithCount {
    #[serde(flatten)]
    pub category: FileCategory,
    /// Public files in the category
    pub files_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    #[default]
    Other,
}

impl FileType {
    pub const ALL: [FileType; 6] = [
        FileType::Image,
        FileType::Video,
        FileType::Audio,
        FileType::Document,
        FileType::Archive,
        FileType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Document => "document",
            FileType::Archive => "archive",
            FileType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
    }

    /// Russian label used by the per-type pages
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Image => "Изображения",
            FileType::Video => "Видео",
            FileType::Audio => "Аудио",
            FileType::Document => "Документы",
            FileType::Archive => "Архивы",
            FileType::Other => "Другое",
        }
    }

    /// Guess from a file name extension
    pub fn from_filename(name: &str) -> Self {
        let ext = file_extension(name);
        match ext.trim_start_matches('.') {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" => FileType::Image,
            "mp4" | "avi" | "mov" | "mkv" | "webm" | "wmv" => FileType::Video,
            "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" => FileType::Audio,
            "pdf" | "doc" | "docx" | "txt" | "rtf" | "odt" | "xls" | "xlsx" | "ppt" | "pptx"
            | "csv" | "md" => FileType::Document,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => FileType::Archive,
            _ => FileType::Other,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uploaded archive file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFile {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    /// Stored path relative to the media root; empty when the upload is missing
    pub file_path: String,
    /// Name the file had on the uploader's machine
    pub original_name: String,
    /// Size in bytes
    pub file_size: i64,
    pub thumbnail: String,
    pub file_type: FileType,
    pub category_id: Option<i64>,
    pub uploaded_by: i64,
    /// Comma separated tag names
    pub tags: String,
    pub downloads_count: i64,
    pub views_count: i64,
    pub likes_count: i64,
    /// Private files await moderation
    pub is_public: bool,
    pub is_featured: bool,
    pub allow_comments: bool,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchiveFile {
    pub fn new(title: String, slug: String, uploaded_by: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            slug,
            description: String::new(),
            file_path: String::new(),
            original_name: String::new(),
            file_size: 0,
            thumbnail: String::new(),
            file_type: FileType::Other,
            category_id: None,
            uploaded_by,
            tags: String::new(),
            downloads_count: 0,
            views_count: 0,
            likes_count: 0,
            is_public: true,
            is_featured: false,
            allow_comments: true,
            uploaded_at: now,
            updated_at: now,
        }
    }

    pub fn file_size_display(&self) -> String {
        format_file_size(self.file_size)
    }

    /// Lowercased extension of the stored file, with the dot
    pub fn file_extension(&self) -> String {
        file_extension(&self.file_path)
    }
}

/// `B`, `KB`, `MB` and `GB` with one decimal, `TB` beyond that
pub fn format_file_size(bytes: i64) -> String {
    if bytes <= 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// `.pdf` for `report.PDF`; empty without an extension
pub fn file_extension(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// File card with uploader, category and tags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileView {
    #[serde(flatten)]
    pub file: ArchiveFile,
    pub file_size_display: String,
    pub file_extension: String,
    pub uploader: UserBrief,
    pub category: Option<FileCategory>,
    pub tag_list: Vec<Tag>,
}

/// Accepted `sort` values for file listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSort {
    #[default]
    Newest,
    Oldest,
    MostDownloaded,
    MostViewed,
    MostLiked,
    TitleAsc,
}

impl FileSort {
    pub fn from_query(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "uploaded_at" => FileSort::Oldest,
            "-downloads_count" => FileSort::MostDownloaded,
            "-views_count" => FileSort::MostViewed,
            "-likes_count" => FileSort::MostLiked,
            "title" => FileSort::TitleAsc,
            _ => FileSort::Newest,
        }
    }

    /// ORDER BY clause over the `f` alias
    pub fn order_by(&self) -> &'static str {
        match self {
            FileSort::Newest => "f.uploaded_at DESC, f.id DESC",
            FileSort::Oldest => "f.uploaded_at ASC, f.id ASC",
            FileSort::MostDownloaded => "f.downloads_count DESC, f.uploaded_at DESC",
            FileSort::MostViewed => "f.views_count DESC, f.uploaded_at DESC",
            FileSort::MostLiked => "f.likes_count DESC, f.uploaded_at DESC",
            FileSort::TitleAsc => "f.title ASC",
        }
    }
}

/// Filters for file listings
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Case-insensitive match on title, description and tags
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub file_type: Option<FileType>,
    pub uploaded_by: Option<i64>,
    pub tag_slug: Option<String>,
    /// `Some(true)` keeps only public files; `None` keeps everything
    pub public: Option<bool>,
    pub featured_only: bool,
    pub sort: FileSort,
}

impl FileFilter {
    pub fn public() -> Self {
        Self {
            public: Some(true),
            ..Self::default()
        }
    }
}

/// Metadata accompanying an upload
#[derive(Debug, Clone, Default)]
pub struct UploadFileInput {
    pub title: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub file_type: Option<FileType>,
    pub tags: String,
    pub allow_comments: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFileInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "super::post::double_option")]
    pub category_id: Option<Option<i64>>,
    pub file_type: Option<FileType>,
    pub tags: Option<String>,
    pub allow_comments: Option<bool>,
}

/// Staff moderation flags
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ModerateFileInput {
    pub is_public: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileComment {
    pub id: i64,
    pub file_id: i64,
    pub author_id: i64,
    pub content: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCommentView {
    #[serde(flatten)]
    pub comment: FileComment,
    pub author: UserBrief,
}

/// One recorded download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: i64,
    pub file_id: i64,
    /// Anonymous downloads have no user
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: String,
    pub downloaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: i64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistView {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub owner: UserBrief,
    pub files_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: PlaylistView,
    /// Files in the order they were added
    pub files: Vec<FileView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaylistInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

/// Aggregate numbers for the archive landing page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStatistics {
    pub total_files: i64,
    pub total_downloads: i64,
    /// Public file count per type; types without files are absent
    pub files_by_type: BTreeMap<FileType, i64>,
    pub total_categories: i64,
}
