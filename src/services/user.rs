//! User service
//!
//! Implements business logic for accounts:
//! - Sign-up with field validation
//! - Login/logout
//! - Session validation and expiry

use crate::config::MAX_SESSION_EXPIRATION_DAYS;
use crate::db::repositories::{is_unique_violation, SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, password_policy_errors, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 14;

/// Longest username accepted
pub const USERNAME_MAX_LEN: usize = 150;

/// Message shown for any failed login
pub const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password.";

/// Message shown when the username is already registered
pub const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// One message per invalid field
    #[error("Validation error: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    /// Messages suitable for showing next to a form
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationError(errors) => errors.clone(),
            Self::AuthenticationError(msg) | Self::UserExists(msg) => vec![msg.clone()],
            Self::InternalError(_) => vec!["Something went wrong. Please try again.".to_string()],
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    ///
    /// The lifetime is clamped to `1..=MAX_SESSION_EXPIRATION_DAYS` days.
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days: session_expiration_days.clamp(1, MAX_SESSION_EXPIRATION_DAYS),
        }
    }

    /// Register a new user from the raw sign-up form.
    ///
    /// Every field is checked and all problems are reported together; nothing
    /// is stored unless the whole form is valid.
    ///
    /// # Errors
    ///
    /// - `ValidationError` listing each invalid field
    /// - `UserExists` if the username is taken
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let cleaned = validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&cleaned.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(USERNAME_TAKEN_MESSAGE.to_string()));
        }

        let password_hash = hash_password(&cleaned.password).context("Failed to hash password")?;
        let user = User::new(cleaned.username, cleaned.email, password_hash, cleaned.age);

        // A concurrent sign-up can take the name between the check and the insert.
        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(USERNAME_TAKEN_MESSAGE.to_string()));
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Login with credentials
    ///
    /// On success records `last_login` and returns a fresh session.
    ///
    /// # Errors
    ///
    /// - `AuthenticationError` with the same message for unknown user and
    ///   wrong password
    /// - `InternalError` for database errors
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(|| UserServiceError::AuthenticationError(INVALID_LOGIN_MESSAGE.to_string()))?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(UserServiceError::AuthenticationError(
                INVALID_LOGIN_MESSAGE.to_string(),
            ));
        }

        self.user_repo
            .touch_last_login(user.id, Utc::now())
            .await
            .context("Failed to record last login")?;

        let session = self
            .session_repo
            .create(&Session::new(user.id, Duration::days(self.session_expiration_days)))
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(session)
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Validate session token and return the associated user
    ///
    /// Unknown tokens give `None`. Expired sessions are deleted and also give
    /// `None`.
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
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }
}

/// Check the raw sign-up form and turn it into a `CreateUserInput`
fn validate_register_input(input: &RegisterInput) -> Result<CreateUserInput, UserServiceError> {
    let mut errors = Vec::new();

    let username = input.username.trim();
    if username.is_empty() {
        errors.push("Username is required.".to_string());
    } else if username.chars().count() > USERNAME_MAX_LEN {
        errors.push(format!(
            "Ensure the username has at most {} characters.",
            USERNAME_MAX_LEN
        ));
    } else if !USERNAME_RE.is_match(username) {
        errors.push(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }

    let email = input.email.trim();
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.push("Enter a valid email address.".to_string());
    }

    let age = match input.age.trim() {
        "" => None,
        raw => match raw.parse::<i32>() {
            Ok(age) if age >= 0 => Some(age),
            Ok(_) => {
                errors.push("Ensure the age is greater than or equal to 0.".to_string());
                None
            }
            Err(_) => {
                errors.push("Enter a whole number for the age.".to_string());
                None
            }
        },
    };

    if input.password1.is_empty() {
        errors.push("Password is required.".to_string());
    } else if input.password1 != input.password2 {
        errors.push("The two password fields didn't match.".to_string());
    } else {
        errors.extend(password_policy_errors(&input.password1, username));
    }

    if !errors.is_empty() {
        return Err(UserServiceError::ValidationError(errors));
    }

    Ok(CreateUserInput {
        username: username.to_string(),
        email: email.to_string(),
        age,
        password: input.password1.clone(),
    })
}

/// Raw sign-up form fields
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    /// Age as typed; empty when not given
    pub age: String,
    pub password1: String,
    pub password2: String,
}

impl RegisterInput {
    /// Sign-up input with matching passwords and no email or age
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            password1: password.clone(),
            password2: password,
            ..Self::default()
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(user_repo, session_repo);

        (pool, service)
    }

    fn full_input() -> RegisterInput {
        RegisterInput {
            username: "testuser".into(),
            email: "test@email.com".into(),
            age: "28".into(),
            password1: "secret-pass-42".into(),
            password2: "secret-pass-42".into(),
        }
    }

    fn validation_messages(err: UserServiceError) -> Vec<String> {
        match err {
            UserServiceError::ValidationError(errors) => errors,
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_success() {
        let (_pool, service) = setup_test_service().await;

        let user = service.register(full_input()).await.expect("Failed to register");
        assert_eq!(user.username, "testuser");
        assert_eq!(user.email, "test@email.com");
        assert_eq!(user.age, Some(28));
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_without_optional_fields() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("plain", "secret-pass-42"))
            .await
            .unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.age, None);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let (_pool, service) = setup_test_service().await;
        service.register(full_input()).await.unwrap();

        let result = service.register(full_input()).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    /// Never finds a username, like a sign-up that lost a race to another
    struct BlindLookupRepository(Arc<dyn UserRepository>);

    #[async_trait::async_trait]
    impl UserRepository for BlindLookupRepository {
        async fn create(&self, user: &User) -> anyhow::Result<User> {
            self.0.create(user).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.get_by_id(id).await
        }

        async fn get_by_username(&self, _username: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }

        async fn touch_last_login(
            &self,
            id: i64,
            at: chrono::DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.0.touch_last_login(id, at).await
        }
    }

    #[tokio::test]
    async fn test_register_unique_conflict_is_user_exists() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::new(
            Arc::new(BlindLookupRepository(SqlxUserRepository::boxed(pool.clone()))),
            SqlxSessionRepository::boxed(pool),
        );

        service.register(full_input()).await.unwrap();
        match service.register(full_input()).await {
            Err(UserServiceError::UserExists(msg)) => assert_eq!(msg, USERNAME_TAKEN_MESSAGE),
            other => panic!("expected UserExists, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_collects_every_error() {
        let (pool, service) = setup_test_service().await;

        let input = RegisterInput {
            username: "bad name!".into(),
            email: "not-an-email".into(),
            age: "-3".into(),
            password1: "123".into(),
            password2: "123".into(),
        };
        let errors = validation_messages(service.register(input).await.unwrap_err());

        assert!(errors.iter().any(|e| e.contains("valid username")));
        assert!(errors.iter().any(|e| e.contains("valid email")));
        assert!(errors.iter().any(|e| e.contains("greater than or equal to 0")));
        assert!(errors.iter().any(|e| e.contains("too short")));
        assert!(errors.iter().any(|e| e.contains("entirely numeric")));

        let stored = SqlxUserRepository::new(pool)
            .get_by_username("bad name!")
            .await
            .unwrap();
        assert!(stored.is_none(), "Nothing is stored for an invalid form");
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let (_pool, service) = setup_test_service().await;
        let mut input = full_input();
        input.password2 = "different-pass".into();

        let errors = validation_messages(service.register(input).await.unwrap_err());
        assert_eq!(errors, vec!["The two password fields didn't match."]);
    }

    #[tokio::test]
    async fn test_register_non_numeric_age() {
        let (_pool, service) = setup_test_service().await;
        let mut input = full_input();
        input.age = "old".into();

        let errors = validation_messages(service.register(input).await.unwrap_err());
        assert!(errors[0].contains("whole number"));
    }

    #[tokio::test]
    async fn test_register_username_too_long() {
        let (_pool, service) = setup_test_service().await;
        let mut input = full_input();
        input.username = "u".repeat(USERNAME_MAX_LEN + 1);

        let errors = validation_messages(service.register(input).await.unwrap_err());
        assert!(errors[0].contains("at most 150"));
    }

    // ========================================================================
    // Login / session tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(full_input()).await.unwrap();
        assert!(user.last_login.is_none());

        let session = service
            .login(LoginInput::new("testuser", "secret-pass-42"))
            .await
            .expect("Login should succeed");
        assert_eq!(session.user_id, user.id);

        let stored = SqlxUserRepository::new(pool).get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_login_failures_share_message() {
        let (_pool, service) = setup_test_service().await;
        service.register(full_input()).await.unwrap();

        for input in [
            LoginInput::new("testuser", "wrong-password"),
            LoginInput::new("nobody", "secret-pass-42"),
        ] {
            match service.login(input).await {
                Err(UserServiceError::AuthenticationError(msg)) => {
                    assert_eq!(msg, INVALID_LOGIN_MESSAGE)
                }
                other => panic!("Expected AuthenticationError, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_validate_session_roundtrip_and_logout() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(full_input()).await.unwrap();
        let session = service
            .login(LoginInput::new("testuser", "secret-pass-42"))
            .await
            .unwrap();

        let current = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_unknown_session_returns_none() {
        let (_pool, service) = setup_test_service().await;
        assert!(service.validate_session("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(full_input()).await.unwrap();

        let session_repo = SqlxSessionRepository::new(pool);
        let mut stale = Session::new(user.id, Duration::days(1));
        stale.expires_at = Utc::now() - Duration::hours(1);
        session_repo.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(session_repo.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(full_input()).await.unwrap();
        let live = service
            .login(LoginInput::new("testuser", "secret-pass-42"))
            .await
            .unwrap();

        let session_repo = SqlxSessionRepository::new(pool);
        let mut stale = Session::new(user.id, Duration::days(1));
        stale.expires_at = Utc::now() - Duration::minutes(5);
        session_repo.create(&stale).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(service.validate_session(&live.id).await.unwrap().is_some());
    }

    #[test]
    fn test_username_inner_space_rejected_outer_trimmed() {
        let input = RegisterInput::new("a b", "secret-pass-42");
        assert!(validate_register_input(&input).is_err());

        let input = RegisterInput::new(" a ", "secret-pass-42");
        let cleaned = validate_register_input(&input).unwrap();
        assert_eq!(cleaned.username, "a");
    }

    #[tokio::test]
    async fn test_oversized_session_lifetime_is_clamped() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            100_000_000,
        );

        service.register(full_input()).await.unwrap();
        let session = service
            .login(LoginInput::new("testuser", "secret-pass-42"))
            .await
            .unwrap();

        let lifetime = session.expires_at - session.created_at;
        assert!(lifetime <= Duration::days(MAX_SESSION_EXPIRATION_DAYS));
        assert!(lifetime > Duration::days(MAX_SESSION_EXPIRATION_DAYS - 1));
    }
}
