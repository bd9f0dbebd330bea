//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod archive_file;
pub mod author_request;
pub mod category;
pub mod comment;
pub mod engagement;
pub mod file_engagement;
pub mod newsletter;
pub mod playlist;
pub mod post;
pub mod profile;
pub mod session;
pub mod site_settings;
pub mod tag;
pub mod user;

pub use archive_file::{ArchiveFileRepository, SqlxArchiveFileRepository};
pub use author_request::{AuthorRequestRepository, SqlxAuthorRequestRepository};
pub use category::{CategoryKind, CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use engagement::{EngagementRepository, SqlxEngagementRepository};
pub use file_engagement::{FileEngagementRepository, SqlxFileEngagementRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use playlist::{PlaylistRepository, SqlxPlaylistRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use site_settings::{SiteSettingsRepository, SqlxSiteSettingsRepository};
pub use tag::{TagLink, TagRepository, SqlxTagRepository};
pub use user::{SqlxUserRepository, UserRepository};
