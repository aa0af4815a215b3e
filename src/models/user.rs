//! User model
//!
//! This module defines the User entity and related types.
//!
//! A user is a username/password identity with an optional email address and
//! an optional age.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User entity representing a registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, empty when not given
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Age in years
    pub age: Option<i32>,
    /// Time of the most recent successful login
    pub last_login: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// Note: The password should already be hashed before calling this function.
    /// Use `services::password::hash_password()` to hash the password.
    pub fn new(username: String, email: String, password_hash: String, age: Option<i32>) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            age,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    /// Username
    pub username: String,
    /// Email address (may be empty)
    pub email: String,
    /// Age, if given
    pub age: Option<i32>,
    /// Plaintext password (will be hashed)
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "testuser".to_string(),
            "test@email.com".to_string(),
            "hashed_password".to_string(),
            Some(28),
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "testuser");
        assert_eq!(user.email, "test@email.com");
        assert_eq!(user.age, Some(28));
        assert_eq!(user.last_login, None);
    }

    #[test]
    fn test_user_display_is_username() {
        let user = User::new("testuser".to_string(), String::new(), "hash".to_string(), None);
        assert_eq!(user.to_string(), "testuser");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(
            "testuser".to_string(),
            String::new(),
            "secret-hash".to_string(),
            None,
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }
}
