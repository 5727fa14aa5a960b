use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

/// Key for the authenticated user's id in the session.
pub const USER_ID_KEY: &str = "user_id";
/// Key for the authenticated user's username in the session.
pub const USERNAME_KEY: &str = "username";
/// Key for pending one-shot flash messages.
pub const FLASH_KEY: &str = "_flashes";

/// The identity a successful signup or login binds into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
}

/// Bind a user to the session, cycling the session id first.
pub async fn establish(
    session: &Session,
    user: &SessionUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.user_id).await?;
    session.insert(USERNAME_KEY, &user.username).await?;
    Ok(())
}

/// The user bound to the session, if any.
pub async fn current_user(session: &Session) -> Option<SessionUser> {
    let user_id: i64 = session.get(USER_ID_KEY).await.ok()??;
    let username: String = session.get(USERNAME_KEY).await.ok()??;
    Some(SessionUser { user_id, username })
}

/// Drop all session state. Idempotent: clearing an empty session is a no-op.
pub async fn clear(session: &Session) {
    session.clear().await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Queue a flash message. Session store failures are logged, not surfaced:
/// a lost flash must never take down the page it decorates.
pub async fn flash(session: &Session, level: FlashLevel, message: impl Into<String>) {
    let mut flashes: Vec<Flash> = session
        .get(FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    flashes.push(Flash {
        level,
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_KEY, flashes).await {
        warn!(error = %e, "failed to queue flash message");
    }
}

/// Take and clear the pending flash messages.
pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Extractor for handlers that require an authenticated user. An absent or
/// incomplete session redirects to the login form instead of erroring.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| {
                warn!(%msg, "session extraction failed");
                Redirect::to("/login").into_response()
            })?;

        match current_user(&session).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                flash(&session, FlashLevel::Error, "Please log in first.").await;
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn establish_then_read_back() {
        let session = session();
        let user = SessionUser {
            user_id: 7,
            username: "alice".into(),
        };
        establish(&session, &user).await.unwrap();
        assert_eq!(current_user(&session).await, Some(user));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let session = session();
        let user = SessionUser {
            user_id: 7,
            username: "alice".into(),
        };
        establish(&session, &user).await.unwrap();

        clear(&session).await;
        assert_eq!(current_user(&session).await, None);

        // Clearing an already-empty session is a no-op.
        clear(&session).await;
        assert_eq!(current_user(&session).await, None);
    }

    #[tokio::test]
    async fn flashes_are_one_shot() {
        let session = session();
        flash(&session, FlashLevel::Success, "Login successful!").await;
        flash(&session, FlashLevel::Error, "Oops.").await;

        let taken = take_flashes(&session).await;
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].message, "Login successful!");
        assert_eq!(taken[0].level, FlashLevel::Success);

        assert!(take_flashes(&session).await.is_empty());
    }
}
