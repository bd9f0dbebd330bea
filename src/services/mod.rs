//! Services layer - Business logic
//!
//! This module contains all business logic services for the NLPers platform.
//! Services are responsible for:
//! - Implementing business rules and permission checks
//! - Coordinating between repositories and the cache
//! - Handling validation and error cases
//!
//! [`Services`] wires every service over one pool and one cache.

pub mod archive;
pub mod archive_cache;
pub mod author_request;
pub mod blog_cache;
pub mod category;
pub mod comment;
pub mod engagement;
pub mod home;
pub mod maintenance;
pub mod newsletter;
pub mod password;
pub mod playlist;
pub mod post;
pub mod profile;
pub mod settings;
pub mod slug;
pub mod tag;
pub mod user;
pub mod views;

pub use archive::{ArchiveError, ArchiveService};
pub use archive_cache::ArchiveCache;
pub use author_request::{AuthorRequestError, AuthorRequestService};
pub use blog_cache::BlogCache;
pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use engagement::{EngagementError, EngagementService};
pub use home::HomeService;
pub use maintenance::MaintenanceService;
pub use newsletter::{NewsletterError, NewsletterService};
pub use password::{hash_password, verify_password};
pub use playlist::{PlaylistError, PlaylistService};
pub use post::{PostService, PostServiceError};
pub use profile::{ProfileService, ProfileServiceError};
pub use settings::{SettingsService, SettingsServiceError};
pub use tag::{TagService, TagServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use views::ContentViews;

use crate::cache::Cache;
use crate::config::Config;
use crate::db::repositories::{
    CategoryKind, SqlxArchiveFileRepository, SqlxAuthorRequestRepository, SqlxCategoryRepository,
    SqlxCommentRepository, SqlxEngagementRepository, SqlxFileEngagementRepository,
    SqlxNewsletterRepository, SqlxPlaylistRepository, SqlxPostRepository, SqlxProfileRepository,
    SqlxSessionRepository, SqlxSiteSettingsRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use std::sync::Arc;

/// All services, sharing one pool and one cache
pub struct Services {
    pub pool: DynDatabasePool,
    pub cache: Arc<Cache>,
    pub views: Arc<ContentViews>,
    pub blog_cache: Arc<BlogCache>,
    pub archive_cache: Arc<ArchiveCache>,
    pub users: Arc<UserService>,
    pub blog_categories: Arc<CategoryService>,
    pub file_categories: Arc<CategoryService>,
    pub tags: Arc<TagService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub engagement: Arc<EngagementService>,
    pub profiles: Arc<ProfileService>,
    pub newsletter: Arc<NewsletterService>,
    pub author_requests: Arc<AuthorRequestService>,
    pub archive: Arc<ArchiveService>,
    pub playlists: Arc<PlaylistService>,
    pub settings: Arc<SettingsService>,
    pub home: Arc<HomeService>,
    pub maintenance: Arc<MaintenanceService>,
}

impl Services {
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Blog);
        let file_category_repo = SqlxCategoryRepository::boxed(pool.clone(), CategoryKind::Archive);
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let engagement_repo = SqlxEngagementRepository::boxed(pool.clone());
        let file_repo = SqlxArchiveFileRepository::boxed(pool.clone());
        let file_engagement_repo = SqlxFileEngagementRepository::boxed(pool.clone());
        let playlist_repo = SqlxPlaylistRepository::boxed(pool.clone());

        let views = Arc::new(ContentViews::new(
            user_repo.clone(),
            profile_repo.clone(),
            category_repo.clone(),
            file_category_repo.clone(),
            tag_repo.clone(),
        ));
        let blog_cache = Arc::new(BlogCache::new(
            cache.clone(),
            post_repo.clone(),
            category_repo.clone(),
            tag_repo.clone(),
            user_repo.clone(),
            profile_repo.clone(),
            engagement_repo.clone(),
            views.clone(),
        ));
        let archive_cache = Arc::new(ArchiveCache::new(
            cache.clone(),
            file_repo.clone(),
            file_category_repo.clone(),
            user_repo.clone(),
            views.clone(),
        ));

        let users = Arc::new(UserService::with_session_expiration(
            user_repo.clone(),
            session_repo,
            profile_repo.clone(),
            config.site.session_days,
        ));
        let tags = Arc::new(TagService::new(
            tag_repo.clone(),
            post_repo.clone(),
            file_repo.clone(),
            views.clone(),
            blog_cache.clone(),
        ));
        let posts = Arc::new(PostService::new(
            post_repo.clone(),
            category_repo.clone(),
            tag_repo.clone(),
            comment_repo.clone(),
            engagement_repo.clone(),
            profile_repo.clone(),
            tags.clone(),
            views.clone(),
            blog_cache.clone(),
        ));
        let comments = Arc::new(CommentService::new(
            comment_repo.clone(),
            post_repo.clone(),
            views.clone(),
            blog_cache.clone(),
        ));
        let engagement = Arc::new(EngagementService::new(
            engagement_repo.clone(),
            post_repo.clone(),
            comment_repo,
            user_repo.clone(),
            category_repo.clone(),
            profile_repo.clone(),
            blog_cache.clone(),
        ));
        let author_request_repo = SqlxAuthorRequestRepository::boxed(pool.clone());
        let profiles = Arc::new(ProfileService::new(
            user_repo,
            profile_repo,
            post_repo.clone(),
            file_repo.clone(),
            engagement_repo,
            author_request_repo.clone(),
            views.clone(),
            blog_cache.clone(),
        ));
        let author_requests = Arc::new(AuthorRequestService::new(
            author_request_repo,
            users.clone(),
            views.clone(),
            blog_cache.clone(),
        ));
        let archive = Arc::new(ArchiveService::new(
            file_repo.clone(),
            file_engagement_repo,
            file_category_repo.clone(),
            tag_repo.clone(),
            tags.clone(),
            views.clone(),
            archive_cache.clone(),
            blog_cache.clone(),
            config.upload.path.clone(),
            config.upload.max_file_size,
        ));
        let playlists = Arc::new(PlaylistService::new(
            playlist_repo,
            file_repo.clone(),
            views.clone(),
        ));
        let settings = Arc::new(SettingsService::new(
            SqlxSiteSettingsRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let home = Arc::new(HomeService::new(
            blog_cache.clone(),
            archive_cache.clone(),
            settings.clone(),
        ));
        let maintenance = Arc::new(MaintenanceService::new(
            pool.clone(),
            cache.clone(),
            post_repo,
            category_repo.clone(),
            file_category_repo.clone(),
            tag_repo,
            file_repo,
            settings.clone(),
            config.upload.path.clone(),
        ));

        let blog_categories = Arc::new(CategoryService::blog(category_repo, blog_cache.clone()));
        let file_categories = Arc::new(CategoryService::archive(
            file_category_repo,
            archive_cache.clone(),
        ));
        let newsletter = Arc::new(NewsletterService::new(SqlxNewsletterRepository::boxed(
            pool.clone(),
        )));

        Self {
            pool,
            cache,
            views,
            blog_cache,
            archive_cache,
            users,
            blog_categories,
            file_categories,
            tags,
            posts,
            comments,
            engagement,
            profiles,
            newsletter,
            author_requests,
            archive,
            playlists,
            settings,
            home,
            maintenance,
        }
    }
}

/// Shared fixture for service tests: an in-memory database, a memory cache,
/// a temporary media root and an `admin` account registered first.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArchiveFile, ModerateFileInput, UploadFileInput, User, UserRole};
    use crate::services::archive::UploadedFile;
    use std::ops::Deref;
    use tempfile::TempDir;

    pub const TEST_PASSWORD: &str = "password123";

    pub struct TestApp {
        pub services: Arc<Services>,
        pub config: Config,
        pub media: TempDir,
    }

    impl Deref for TestApp {
        type Target = Services;

        fn deref(&self) -> &Services {
            &self.services
        }
    }

    impl TestApp {
        pub async fn new() -> Self {
            let pool = create_test_pool().await.expect("Failed to create test pool");
            migrations::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
            let cache = create_cache(&CacheConfig::default())
                .await
                .expect("Failed to create cache");
            let media = TempDir::new().expect("Failed to create media dir");

            let mut config = Config::default();
            config.upload.path = media.path().to_path_buf();
            let services = Arc::new(Services::new(pool, cache, &config));

            let admin = services
                .users
                .register(RegisterInput::new("admin", "admin@nlpers.ru", TEST_PASSWORD))
                .await
                .expect("Failed to register admin");
            assert_eq!(admin.role, UserRole::Admin);

            Self {
                services,
                config,
                media,
            }
        }

        pub async fn admin(&self) -> User {
            self.user("admin").await
        }

        pub async fn reader(&self, username: &str) -> User {
            self.services
                .users
                .register(RegisterInput::new(
                    username,
                    format!("{}@example.com", username),
                    TEST_PASSWORD,
                ))
                .await
                .expect("Failed to register reader")
        }

        pub async fn author(&self, username: &str) -> User {
            let reader = self.reader(username).await;
            self.services
                .users
                .set_role(reader.id, UserRole::Author)
                .await
                .expect("Failed to promote author")
        }

        /// Upload a small text file as `user` and publish it
        pub async fn upload_file(&self, user: &User, title: &str, tags: &str) -> ArchiveFile {
            let input = UploadFileInput {
                title: title.to_string(),
                tags: tags.to_string(),
                allow_comments: true,
                ..Default::default()
            };
            let upload = UploadedFile {
                original_name: "notes.txt".to_string(),
                data: format!("contents of {}", title).into_bytes(),
            };
            let view = self
                .services
                .archive
                .upload(user, input, upload)
                .await
                .expect("Failed to upload file");
            if view.file.is_public {
                return view.file;
            }

            let admin = self.admin().await;
            let published = self
                .services
                .archive
                .moderate(
                    &admin,
                    view.file.id,
                    ModerateFileInput {
                        is_public: Some(true),
                        is_featured: None,
                    },
                )
                .await
                .expect("Failed to publish file");
            published.file
        }

        async fn user(&self, username: &str) -> User {
            self.services
                .users
                .get_by_username(username)
                .await
                .expect("Failed to load user")
                .expect("User missing")
        }
    }
}
