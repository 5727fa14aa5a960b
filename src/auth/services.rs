use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::{password::PasswordHasher, repo_types::User, session::SessionUser};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Recoverable failures of the credential workflow. All of them surface as a
/// message on the originating form; none are fatal to the process.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("all fields are required")]
    MissingFields,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid username/email or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Owns the signup/login state transitions over the `user` table. Holds its
/// storage handle and hasher explicitly; handlers receive it through the
/// application state.
#[derive(Clone)]
pub struct AuthService {
    db: SqlitePool,
    hasher: Arc<dyn PasswordHasher>,
}

impl AuthService {
    pub fn new(db: SqlitePool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { db, hasher }
    }

    /// Create a user and return the identity to bind into the session.
    ///
    /// Inputs are trimmed and the email lower-cased before any check. The
    /// duplicate pre-checks give the friendlier of the two error messages;
    /// the unique indexes on `user` remain the backstop for racing signups,
    /// so an insert-time constraint violation maps to the same error kinds.
    #[instrument(skip(self, password))]
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        let password = password.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            warn!("signup with missing fields");
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "signup with invalid email");
            return Err(AuthError::InvalidEmail);
        }

        if User::find_by_username(&self.db, username).await?.is_some() {
            warn!(username = %username, "signup with taken username");
            return Err(AuthError::DuplicateUsername);
        }
        if User::find_by_email(&self.db, &email).await?.is_some() {
            warn!(email = %email, "signup with registered email");
            return Err(AuthError::DuplicateEmail);
        }

        let hash = self
            .hasher
            .hash(password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user = User::create(&self.db, username, &email, &hash)
            .await
            .map_err(map_unique_violation)?;

        info!(user_id = user.id, username = %user.username, "user signed up");
        Ok(SessionUser {
            user_id: user.id,
            username: user.username,
        })
    }

    /// Authenticate by username or email. An unknown identifier and a wrong
    /// password return the same error kind, so callers cannot probe which
    /// accounts exist.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let identifier = identifier.trim();
        let password = password.trim();

        if identifier.is_empty() || password.is_empty() {
            warn!("login with missing fields");
            return Err(AuthError::MissingFields);
        }

        let user = match User::find_by_identifier(&self.db, identifier).await? {
            Some(user) => user,
            None => {
                warn!("login with unknown identifier");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let ok = self
            .hasher
            .verify(password, &user.password_hash)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !ok {
            warn!(user_id = user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, username = %user.username, "user logged in");
        Ok(SessionUser {
            user_id: user.id,
            username: user.username,
        })
    }
}

/// Translate a `UNIQUE constraint failed` insert error into the duplicate
/// error for the offending column.
fn map_unique_violation(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if db_err.message().contains("user.email") {
                return AuthError::DuplicateEmail;
            }
            return AuthError::DuplicateUsername;
        }
    }
    AuthError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2Hasher;
    use crate::db;

    async fn service() -> AuthService {
        AuthService::new(db::test_pool().await, Arc::new(Argon2Hasher))
    }

    #[tokio::test]
    async fn signup_then_login_succeeds() {
        let auth = service().await;
        let signed_up = auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let logged_in = auth.login("alice", "pw1").await.unwrap();
        assert_eq!(signed_up, logged_in);
        assert_eq!(logged_in.username, "alice");
    }

    #[tokio::test]
    async fn login_works_with_email_identifier() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let session = auth.login("alice@x.com", "pw1").await.unwrap();
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_username_fails_regardless_of_other_fields() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let err = auth.signup("alice", "bob@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn duplicate_email_fails() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let err = auth.signup("bob", "alice@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_identifier_are_indistinguishable() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let wrong_password = auth.login("alice", "wrongpw").await.unwrap_err();
        let unknown = auth.login("nobody", "whatever").await.unwrap_err();
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn username_match_is_case_sensitive() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let err = auth.login("Alice", "pw1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let auth = service().await;
        assert!(matches!(
            auth.signup("  ", "alice@x.com", "pw1").await.unwrap_err(),
            AuthError::MissingFields
        ));
        assert!(matches!(
            auth.signup("alice", "", "pw1").await.unwrap_err(),
            AuthError::MissingFields
        ));
        assert!(matches!(
            auth.signup("alice", "alice@x.com", "   ").await.unwrap_err(),
            AuthError::MissingFields
        ));
        assert!(matches!(
            auth.login("", "pw1").await.unwrap_err(),
            AuthError::MissingFields
        ));
        assert!(matches!(
            auth.login("alice", "").await.unwrap_err(),
            AuthError::MissingFields
        ));
    }

    #[tokio::test]
    async fn signup_rejects_malformed_email() {
        let auth = service().await;
        let err = auth.signup("alice", "not-an-email", "pw1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail));
    }

    #[tokio::test]
    async fn inputs_are_trimmed_and_email_lower_cased() {
        let auth = service().await;
        auth.signup("  alice  ", " ALICE@X.COM ", " pw1 ")
            .await
            .unwrap();

        let stored = User::find_by_username(&auth.db, "alice")
            .await
            .unwrap()
            .expect("stored under the trimmed username");
        assert_eq!(stored.email, "alice@x.com");

        // Login with the normalized values succeeds.
        auth.login("alice", "pw1").await.unwrap();
        auth.login("alice@x.com", "pw1").await.unwrap();
    }

    #[tokio::test]
    async fn unique_constraint_is_the_backstop_for_racing_signups() {
        let auth = service().await;
        User::create(&auth.db, "alice", "alice@x.com", "hash-a")
            .await
            .unwrap();

        let username_race = User::create(&auth.db, "alice", "other@x.com", "hash-b")
            .await
            .unwrap_err();
        assert!(matches!(
            map_unique_violation(username_race),
            AuthError::DuplicateUsername
        ));

        let email_race = User::create(&auth.db, "bob", "alice@x.com", "hash-c")
            .await
            .unwrap_err();
        assert!(matches!(
            map_unique_violation(email_race),
            AuthError::DuplicateEmail
        ));
    }

    #[tokio::test]
    async fn plaintext_is_never_stored() {
        let auth = service().await;
        auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        let stored = User::find_by_username(&auth.db, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "pw1");
    }

    // The end-to-end scenario from the requirements.
    #[tokio::test]
    async fn signup_login_scenario() {
        let auth = service().await;

        let session = auth.signup("alice", "alice@x.com", "pw1").await.unwrap();
        assert_eq!(session.username, "alice");

        let err = auth.signup("alice", "bob@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));

        let err = auth.login("alice", "wrongpw").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        auth.login("alice", "pw1").await.unwrap();
    }
}
