//! User model
//!
//! Accounts, roles and the compact author card embedded in posts, comments
//! and archive files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub first_name: String,
    pub last_name: String,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            first_name: String::new(),
            last_name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and editors moderate content and review author requests
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    /// Authors and staff may write posts and upload archive files
    pub fn is_author(&self) -> bool {
        self.is_staff() || self.role == UserRole::Author
    }

    /// Staff can edit any content, everyone else only their own
    pub fn can_edit(&self, owner_id: i64) -> bool {
        self.is_staff() || self.id == owner_id
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// "First Last", falling back to the username
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// User role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access, including site settings
    Admin,
    /// Moderates all content
    Editor,
    /// Writes posts and uploads files
    Author,
    /// Reads, comments, likes and follows
    #[default]
    Reader,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Author => "author",
            UserRole::Reader => "reader",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "author" => Ok(UserRole::Author),
            "reader" => Ok(UserRole::Reader),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account state; banned users cannot log in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Author card embedded in posts, comments and files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

impl From<&User> for UserBrief {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name(),
            avatar: String::new(),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Role override; `None` means reader (or admin for the first account)
    pub role: Option<UserRole>,
}

/// Input for updating a user
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, id: i64) -> User {
        let mut u = User::new(
            format!("user{}", id),
            format!("user{}@nlpers.ru", id),
            "hash".to_string(),
            role,
        );
        u.id = id;
        u
    }

    #[test]
    fn test_user_new() {
        let user = User::new(
            "testuser".to_string(),
            "test@example.com".to_string(),
            "hashed_password".to_string(),
            UserRole::Reader,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "testuser");
        assert_eq!(user.role, UserRole::Reader);
        assert!(user.is_active());
    }

    #[test]
    fn test_role_capabilities() {
        let admin = user(UserRole::Admin, 1);
        let editor = user(UserRole::Editor, 2);
        let author = user(UserRole::Author, 3);
        let reader = user(UserRole::Reader, 4);

        assert!(admin.is_staff() && admin.is_author() && admin.is_admin());
        assert!(editor.is_staff() && editor.is_author() && !editor.is_admin());
        assert!(!author.is_staff() && author.is_author());
        assert!(!reader.is_staff() && !reader.is_author());
    }

    #[test]
    fn test_user_can_edit() {
        let editor = user(UserRole::Editor, 1);
        let author = user(UserRole::Author, 2);

        assert!(editor.can_edit(2));
        assert!(editor.can_edit(999));
        assert!(author.can_edit(2));
        assert!(!author.can_edit(1));
    }

    #[test]
    fn test_full_name_fallback() {
        let mut u = user(UserRole::Reader, 5);
        assert_eq!(u.full_name(), "user5");

        u.first_name = "Анна".to_string();
        assert_eq!(u.full_name(), "Анна");

        u.last_name = "Иванова".to_string();
        assert_eq!(u.full_name(), "Анна Иванова");
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("EDITOR").unwrap(), UserRole::Editor);
        assert_eq!(UserRole::from_str("Reader").unwrap(), UserRole::Reader);
        assert!(UserRole::from_str("invalid").is_err());
    }

    #[test]
    fn test_user_role_default() {
        assert_eq!(UserRole::default(), UserRole::Reader);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_string(&user(UserRole::Author, 1)).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(json.contains("\"role\":\"author\""));
    }
}
