//! Data models
//!
//! This module contains all data structures used throughout the NLPers platform.
//! Models represent:
//! - Database entities (users, blog content, archive files, site settings)
//! - API request/response types
//! - Internal data transfer objects

mod archive;
mod author_request;
mod category;
mod comment;
mod engagement;
mod newsletter;
mod pagination;
mod post;
mod profile;
mod session;
mod site_settings;
mod tag;
mod user;

pub use archive::{
    file_extension, format_file_size, ArchiveFile, CreatePlaylistInput, Download, FileCategory,
    FileCategoryWithCount, FileComment, FileCommentView, FileFilter, FileSort, FileStatistics,
    FileType, FileView, ModerateFileInput, Playlist, PlaylistDetail, PlaylistView,
    UpdateFileInput, UploadFileInput, FILE_COMMENT_MIN_CHARS, FILE_TITLE_MAX, MAX_TAGS_PER_FILE,
    PLAYLIST_NAME_MIN,
};
pub use author_request::{
    AuthorRequest, AuthorRequestStatus, AuthorRequestView, CreateAuthorRequestInput,
    ReviewDecision, REQUEST_FIELD_MAX,
};
pub use category::{
    is_valid_hex_color, Category, CategoryBrief, CategoryWithCount, CreateCategoryInput,
    UpdateCategoryInput,
};
pub use comment::{build_threads, Comment, CommentView, CreateCommentInput, COMMENT_MIN_CHARS};
pub use engagement::{
    decrement_count, Follow, FollowResult, FollowTarget, Like, LikeResult, LikeTarget,
};
pub use newsletter::{is_valid_email, Newsletter};
pub use pagination::{ListParams, PagedResult};
pub use post::{
    make_excerpt, reading_time, strip_tags, CreatePostInput, Post, PostFilter, PostLink,
    PostSort, PostStatus, PostView, UpdatePostInput, MAX_TAGS_PER_POST, TITLE_MAX, TITLE_MIN,
};
pub use profile::{
    is_valid_profile_url, ProfileView, PublicUser, UpdateProfileInput, UserProfile, BIO_MAX,
};
pub use session::Session;
pub use site_settings::{is_valid_opacity, SiteSettings, UpdateSiteSettingsInput, SITE_SETTINGS_ID};
pub use tag::{parse_tag_list, CreateTagInput, Tag, TagWithCount, UpdateTagInput, TAG_NAME_MAX};
pub use user::{CreateUserInput, UpdateUserInput, User, UserBrief, UserRole, UserStatus};
