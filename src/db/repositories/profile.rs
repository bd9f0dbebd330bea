//! User profile repository

use crate::db::DynDatabasePool;
use crate::models::UserProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;

const PROFILE_COLUMNS: &str = "id, user_id, bio, avatar, location, website, github_url, linkedin_url, \
     is_verified, followers_count, following_count, posts_count, created_at, updated_at";

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create an empty profile for a user
    async fn create(&self, user_id: i64) -> Result<UserProfile>;

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Avatars for many users, keyed by user id; users without one are absent
    async fn avatars(&self, user_ids: &[i64]) -> Result<HashMap<i64, String>>;

    async fn update(&self, profile: &UserProfile) -> Result<UserProfile>;

    async fn set_follow_counts(&self, user_id: i64, followers: i64, following: i64) -> Result<()>;

    async fn set_posts_count(&self, user_id: i64, posts: i64) -> Result<()>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn create(&self, user_id: i64) -> Result<UserProfile> {
        let profile = UserProfile::new(user_id);
        let result = sqlx::query(
            "INSERT INTO user_profiles (user_id, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create profile")?;

        Ok(UserProfile {
            id: result.last_insert_rowid(),
            ..profile
        })
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM user_profiles WHERE user_id = ?", PROFILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get profile")?;
        Ok(row.as_ref().map(row_to_profile_sqlite))
    }

    async fn avatars(&self, user_ids: &[i64]) -> Result<HashMap<i64, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT user_id, avatar FROM user_profiles WHERE avatar != '' AND user_id IN (",
        );
        let mut separated = query.separated(", ");
        for id in user_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = query
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to load avatars")?;
        Ok(rows
            .iter()
            .map(|row| (row.get("user_id"), row.get("avatar")))
            .collect())
    }

    async fn update(&self, profile: &UserProfile) -> Result<UserProfile> {
        sqlx::query(
            r#"
            UPDATE user_profiles
            SET bio = ?, avatar = ?, location = ?, website = ?, github_url = ?, linkedin_url = ?,
                is_verified = ?, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&profile.bio)
        .bind(&profile.avatar)
        .bind(&profile.location)
        .bind(&profile.website)
        .bind(&profile.github_url)
        .bind(&profile.linkedin_url)
        .bind(profile.is_verified)
        .bind(Utc::now())
        .bind(profile.user_id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update profile")?;

        self.get_by_user_id(profile.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Profile not found after update"))
    }

    async fn set_follow_counts(&self, user_id: i64, followers: i64, following: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_profiles SET followers_count = ?, following_count = ? WHERE user_id = ?",
        )
        .bind(followers.max(0))
        .bind(following.max(0))
        .bind(user_id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update follow counts")?;
        Ok(())
    }

    async fn set_posts_count(&self, user_id: i64, posts: i64) -> Result<()> {
        sqlx::query("UPDATE user_profiles SET posts_count = ? WHERE user_id = ?")
            .bind(posts.max(0))
            .bind(user_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update posts count")?;
        Ok(())
    }
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bio: row.get("bio"),
        avatar: row.get("avatar"),
        location: row.get("location"),
        website: row.get("website"),
        github_url: row.get("github_url"),
        linkedin_url: row.get("linkedin_url"),
        is_verified: row.get("is_verified"),
        followers_count: row.get("followers_count"),
        following_count: row.get("following_count"),
        posts_count: row.get("posts_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxProfileRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("p".into(), "p@x.ru".into(), "h".into(), UserRole::Reader))
            .await
            .unwrap();
        (SqlxProfileRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_create_and_update_profile() {
        let (repo, user_id) = setup().await;
        let mut profile = repo.create(user_id).await.unwrap();
        assert_eq!(profile.posts_count, 0);

        profile.bio = "NLP researcher".into();
        profile.avatar = "avatars/p.png".into();
        let updated = repo.update(&profile).await.unwrap();
        assert_eq!(updated.bio, "NLP researcher");

        let avatars = repo.avatars(&[user_id, 999]).await.unwrap();
        assert_eq!(avatars.get(&user_id).map(String::as_str), Some("avatars/p.png"));
        assert_eq!(avatars.len(), 1);
    }

    #[tokio::test]
    async fn test_counters_never_negative() {
        let (repo, user_id) = setup().await;
        repo.create(user_id).await.unwrap();
        repo.set_follow_counts(user_id, -1, 3).await.unwrap();
        repo.set_posts_count(user_id, 4).await.unwrap();

        let profile = repo.get_by_user_id(user_id).await.unwrap().unwrap();
        assert_eq!(profile.followers_count, 0);
        assert_eq!(profile.following_count, 3);
        assert_eq!(profile.posts_count, 4);
    }

    #[tokio::test]
    async fn test_one_profile_per_user() {
        let (repo, user_id) = setup().await;
        repo.create(user_id).await.unwrap();
        assert!(repo.create(user_id).await.is_err());
    }
}
