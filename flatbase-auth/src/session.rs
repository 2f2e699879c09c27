use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};
use crate::token::TokenPair;

/// A single user's live session: the token pair last issued to them
/// (login or the most recent refresh) and, once `connect` has been
/// called, the database they are exclusively bound to. Cursors never
/// hold a reference to this struct directly (see `flatbase-server`'s
/// request handlers) — they look the session up by user name on every
/// request, which avoids the original implementation's cycle between a
/// session and its cursors.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub bound_database: Option<String>,
}

/// The process-wide map from user name to session. Readers (request
/// authentication) and writers (connect/disconnect/refresh) share one
/// lock; the `RwLock` discipline lets many concurrent `authenticate`
/// calls proceed together while serializing the rarer mutations.
#[derive(Debug, Default)]
pub struct SessionMap {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionMap {
    pub fn new() -> Self {
        SessionMap::default()
    }

    /// Replace or create the session for `user_name` with a fresh token
    /// pair, preserving any existing database binding. Used by sign-in,
    /// which does not itself bind a database.
    pub async fn upsert_tokens(&self, user_name: &str, pair: &TokenPair) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_name.to_string())
            .and_modify(|s| {
                s.access_token = pair.access_token.clone();
                s.refresh_token = pair.refresh_token.clone();
            })
            .or_insert_with(|| Session {
                access_token: pair.access_token.clone(),
                refresh_token: pair.refresh_token.clone(),
                bound_database: None,
            });
    }

    /// Atomically bind `user_name` to `db_name` with a fresh token pair.
    /// Fails if the user already holds a binding to any database.
    pub async fn bind(&self, user_name: &str, db_name: &str, pair: &TokenPair) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(user_name) {
            if existing.bound_database.is_some() {
                return Err(AuthError::database(format!(
                    "user '{user_name}' is already bound to a database; disconnect first"
                )));
            }
        }
        sessions.insert(
            user_name.to_string(),
            Session {
                access_token: pair.access_token.clone(),
                refresh_token: pair.refresh_token.clone(),
                bound_database: Some(db_name.to_string()),
            },
        );
        Ok(())
    }

    /// Drop `user_name`'s database binding. Errors if there is no
    /// existing session, or the session holds no binding: disconnect is
    /// mandatory-paired with connect, not a no-op (see DESIGN.md).
    pub async fn unbind(&self, user_name: &str) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(user_name) {
            Some(session) if session.bound_database.is_some() => {
                session.bound_database = None;
                Ok(())
            }
            _ => Err(AuthError::database(format!(
                "user '{user_name}' has no active database binding to disconnect"
            ))),
        }
    }

    /// Exact-match check used by refresh: both the presented access and
    /// refresh token must equal the session's currently stored values,
    /// so a refresh token superseded by an earlier rotation is rejected
    /// even though its JWT signature and expiry are still individually
    /// valid.
    pub async fn tokens_are_current(
        &self,
        user_name: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(user_name)
            .map(|s| s.access_token == access_token && s.refresh_token == refresh_token)
            .unwrap_or(false)
    }

    /// Replace the stored token pair for an already-existing session,
    /// rotating both values (the old refresh token stops matching
    /// [`Self::tokens_are_current`] from this point on).
    pub async fn rotate_tokens(&self, user_name: &str, pair: &TokenPair) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(user_name)
            .ok_or_else(|| AuthError::unauthorized("no active session for this user"))?;
        session.access_token = pair.access_token.clone();
        session.refresh_token = pair.refresh_token.clone();
        Ok(())
    }

    pub async fn bound_database(&self, user_name: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions.get(user_name).and_then(|s| s.bound_database.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(tag: &str) -> TokenPair {
        TokenPair {
            access_token: format!("access-{tag}"),
            refresh_token: format!("refresh-{tag}"),
        }
    }

    #[tokio::test]
    async fn bind_then_second_bind_conflicts() {
        let sessions = SessionMap::new();
        sessions.bind("alice", "d1", &pair("1")).await.unwrap();
        let err = sessions.bind("alice", "d2", &pair("2")).await.unwrap_err();
        assert_eq!(err.kind, crate::error::AuthErrorKind::Database);
    }

    #[tokio::test]
    async fn disconnect_then_bind_succeeds() {
        let sessions = SessionMap::new();
        sessions.bind("alice", "d1", &pair("1")).await.unwrap();
        sessions.unbind("alice").await.unwrap();
        sessions.bind("alice", "d2", &pair("2")).await.unwrap();
        assert_eq!(sessions.bound_database("alice").await.as_deref(), Some("d2"));
    }

    #[tokio::test]
    async fn disconnect_without_binding_errors() {
        let sessions = SessionMap::new();
        let err = sessions.unbind("alice").await.unwrap_err();
        assert_eq!(err.kind, crate::error::AuthErrorKind::Database);
    }

    #[tokio::test]
    async fn rotation_invalidates_old_pair() {
        let sessions = SessionMap::new();
        sessions.upsert_tokens("alice", &pair("1")).await;
        assert!(
            sessions
                .tokens_are_current("alice", "access-1", "refresh-1")
                .await
        );
        sessions.rotate_tokens("alice", &pair("2")).await.unwrap();
        assert!(
            !sessions
                .tokens_are_current("alice", "access-1", "refresh-1")
                .await
        );
        assert!(
            sessions
                .tokens_are_current("alice", "access-2", "refresh-2")
                .await
        );
    }
}
