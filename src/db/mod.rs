//! Database layer
//!
//! SQLite storage for the blog, archive and site settings, accessed through
//! the [`DatabasePool`] handle and the repository traits in [`repositories`].
//!
//! ```ignore
//! use nlpers::config::DatabaseConfig;
//! use nlpers::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
