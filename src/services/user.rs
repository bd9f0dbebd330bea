//! User service
//!
//! Accounts and authentication:
//! - registration (the first account becomes admin, everyone else a reader)
//! - login/logout with server-side sessions
//! - session validation for the auth middleware
//! - role changes used by the author-request workflow

use crate::db::repositories::{ProfileRepository, SessionRepository, UserRepository};
use crate::models::{is_valid_email, Session, User, UserRole};
use crate::services::password::{check_password_policy, hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
pub const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;
pub const USERNAME_MAX: usize = 150;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self::with_session_expiration(
            user_repo,
            session_repo,
            profile_repo,
            DEFAULT_SESSION_EXPIRATION_DAYS,
        )
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            profile_repo,
            session_expiration_days: session_expiration_days.max(1),
        }
    }

    /// Register a new user
    ///
    /// The first account in an empty database is made admin; later accounts
    /// start as readers and ask for the author role through an author
    /// request. The user's profile row is created alongside.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed username, email or password
    /// - `UserExists` if username or email is already taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let input = input.normalized();
        self.validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Reader
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let mut user = User::new(input.username, input.email, password_hash, role);
        user.first_name = input.first_name;
        user.last_name = input.last_name;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;
        self.profile_repo
            .create(created.id)
            .await
            .context("Failed to create user profile")?;

        tracing::info!("Registered user {} as {}", created.username, created.role);
        Ok(created)
    }

    /// Check credentials and open a session
    ///
    /// Unknown users and wrong passwords produce the same message.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .find_user_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError("Invalid username or password".to_string())
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!("Rejected password for {}", user.username);
            return Err(UserServiceError::AuthenticationError(
                "Invalid username or password".to_string(),
            ));
        }

        if user.is_banned() {
            return Err(UserServiceError::AuthenticationError(
                "Your account has been banned. Please contact the administrator.".to_string(),
            ));
        }

        self.create_session(user.id).await
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind `token`, if the session exists and has not expired
    ///
    /// Expired sessions are deleted on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| !u.is_banned()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// Change a user's role
    pub async fn set_role(&self, user_id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(user_id.to_string()))?;
        if user.role == role {
            return Ok(user);
        }
        user.role = role;
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user role")?;
        tracing::info!("User {} is now {}", updated.username, updated.role);
        Ok(updated)
    }

    /// Update first and last name
    pub async fn update_names(
        &self,
        user_id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(user_id.to_string()))?;
        if let Some(first) = first_name {
            user.first_name = first.trim().to_string();
        }
        if let Some(last) = last_name {
            user.last_name = last.trim().to_string();
        }
        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?)
    }

    /// `true` if no users exist yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many went
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        if input.username.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if input.username.chars().count() > USERNAME_MAX {
            return Err(UserServiceError::ValidationError(format!(
                "Username must be at most {} characters",
                USERNAME_MAX
            )));
        }
        if !input
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            return Err(UserServiceError::ValidationError(
                "Username may contain only letters, digits and @/./+/-/_".to_string(),
            ));
        }
        if input.email.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Email cannot be empty".to_string(),
            ));
        }
        if !is_valid_email(&input.email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        check_password_policy(&input.password, &input.username)
            .map_err(UserServiceError::ValidationError)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        Ok(self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let session = Session::new(token, user_id, Duration::days(self.session_expiration_days));

        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

/// Input for user registration
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            ..self
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxProfileRepository, SqlxSessionRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserStatus;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_first_user_becomes_admin() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("admin", "admin@example.com", "password123"))
            .await
            .expect("Failed to register");

        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(user.username, "admin");
    }

    #[tokio::test]
    async fn test_register_second_user_becomes_reader() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("admin", "admin@example.com", "password123"))
            .await
            .unwrap();

        let user = service
            .register(RegisterInput::new("reader", "reader@example.com", "password456"))
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::Reader);
    }

    #[tokio::test]
    async fn test_register_creates_profile() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("anna", "anna@example.com", "password123"))
            .await
            .unwrap();

        let profile = SqlxProfileRepository::new(pool)
            .get_by_user_id(user.id)
            .await
            .unwrap();
        assert!(profile.is_some());
    }

    #[tokio::test]
    async fn test_register_duplicates_fail() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("testuser", "user1@example.com", "password123"))
            .await
            .unwrap();

        let same_name = service
            .register(RegisterInput::new("testuser", "user2@example.com", "password123"))
            .await;
        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));

        let same_email = service
            .register(RegisterInput::new("other", "USER1@example.com", "password123"))
            .await;
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup_test_service().await;

        for input in [
            RegisterInput::new("", "a@example.com", "password123"),
            RegisterInput::new("bad name", "a@example.com", "password123"),
            RegisterInput::new("user", "not-an-email", "password123"),
            RegisterInput::new("user", "a@example.com", "short"),
        ] {
            let result = service.register(input).await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
        }
    }

    // ========================================================================
    // Login / session tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_with_username_or_email() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("testuser", "test@example.com", "password123"))
            .await
            .unwrap();

        let by_name = service
            .login(LoginInput::new("testuser", "password123"))
            .await
            .unwrap();
        let by_email = service
            .login(LoginInput::new("test@example.com", "password123"))
            .await
            .unwrap();

        assert_eq!(by_name.user_id, user.id);
        assert_eq!(by_email.user_id, user.id);
        assert_eq!(by_name.id.len(), 64);
        assert_ne!(by_name.id, by_email.id);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("testuser", "test@example.com", "password123"))
            .await
            .unwrap();

        let wrong = service.login(LoginInput::new("testuser", "wrongpass")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let missing = service.login(LoginInput::new("nobody", "password123")).await;
        assert!(matches!(missing, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login() {
        let (pool, service) = setup_test_service().await;
        let mut user = service
            .register(RegisterInput::new("troll", "troll@example.com", "password123"))
            .await
            .unwrap();
        user.status = UserStatus::Banned;
        SqlxUserRepository::new(pool).update(&user).await.unwrap();

        let result = service.login(LoginInput::new("troll", "password123")).await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_validate_and_logout() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("testuser", "test@example.com", "password123"))
            .await
            .unwrap();
        let session = service
            .login(LoginInput::new("testuser", "password123"))
            .await
            .unwrap();

        let validated = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.validate_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("testuser", "test@example.com", "password123"))
            .await
            .unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let expired = Session::new("expired-token".into(), user.id, Duration::days(-1));
        sessions.create(&expired).await.unwrap();

        assert!(service.validate_session("expired-token").await.unwrap().is_none());
        assert!(sessions.get_by_id("expired-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_role() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("admin", "admin@example.com", "password123"))
            .await
            .unwrap();
        let reader = service
            .register(RegisterInput::new("reader", "reader@example.com", "password123"))
            .await
            .unwrap();

        let promoted = service.set_role(reader.id, UserRole::Author).await.unwrap();
        assert_eq!(promoted.role, UserRole::Author);
        assert!(matches!(
            service.set_role(999, UserRole::Author).await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Any registered credentials log in to a session that resolves to the same user
            #[test]
            fn auth_roundtrip(
                username in "[a-z]{3,10}",
                password in "[0-9!@#$%^&*]{7,19}X"
            ) {
                let result: Result<(), TestCaseError> = tokio_test::block_on(async {
                    let (_pool, service) = setup_test_service().await;
                    let registered = service
                        .register(RegisterInput::new(
                            username.clone(),
                            format!("{}@example.com", username),
                            password.clone(),
                        ))
                        .await
                        .expect("Registration should succeed");

                    let session = service
                        .login(LoginInput::new(username.clone(), password.clone()))
                        .await
                        .expect("Login should succeed with valid credentials");
                    let validated = service
                        .validate_session(&session.id)
                        .await
                        .expect("Session validation should not error")
                        .expect("Session should be valid");

                    prop_assert_eq!(validated.id, registered.id);
                    Ok(())
                });
                result?;
            }
        }
    }
}
