use std::path::Path;

use flatbase_engine::Catalog;

use crate::error::{AuthError, AuthResult};
use crate::session::SessionMap;
use crate::token::{TokenIssuer, TokenPair};
use crate::user_store::UserStore;

/// Tunable lifetimes for the token pair; mirrors the teacher's
/// `ServerOptions` pattern of a small config struct threaded explicitly
/// rather than read from a global.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_minutes: i64,
    pub refresh_days: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        TokenLifetimes {
            access_minutes: 15,
            refresh_days: 7,
        }
    }
}

/// Ties together the user store, token issuer and session map into the
/// single entry point the wire surface calls. Constructed once at
/// process start and shared behind an `Arc` (see `flatbase-server`'s
/// `AppState`), exactly as the catalog is.
pub struct AuthManager {
    users: UserStore,
    tokens: TokenIssuer,
    sessions: SessionMap,
}

impl AuthManager {
    pub async fn new(
        user_store_path: impl AsRef<Path>,
        secret: impl Into<Vec<u8>>,
        lifetimes: TokenLifetimes,
    ) -> AuthResult<Self> {
        Ok(AuthManager {
            users: UserStore::load(user_store_path).await?,
            tokens: TokenIssuer::new(secret, lifetimes.access_minutes, lifetimes.refresh_days),
            sessions: SessionMap::new(),
        })
    }

    pub async fn sign_up(&self, user_name: &str, password: &str) -> AuthResult<()> {
        self.users.create_user(user_name, password).await
    }

    pub async fn sign_in(&self, user_name: &str, password: &str) -> AuthResult<TokenPair> {
        self.users.verify(user_name, password).await?;
        let pair = self.tokens.issue(user_name)?;
        self.sessions.upsert_tokens(user_name, &pair).await;
        Ok(pair)
    }

    /// Verify credentials, mint tokens, and atomically bind `user_name`
    /// to `db_name`. `db_name` must name a database loaded in `catalog`.
    pub async fn connect(
        &self,
        user_name: &str,
        password: &str,
        db_name: &str,
        catalog: &Catalog,
    ) -> AuthResult<TokenPair> {
        self.users.verify(user_name, password).await?;
        if catalog.database(db_name).is_none() {
            return Err(AuthError::database(format!(
                "unknown database '{db_name}'"
            )));
        }
        let pair = self.tokens.issue(user_name)?;
        self.sessions.bind(user_name, db_name, &pair).await?;
        Ok(pair)
    }

    /// Rotate a session's token pair. The presented access token must
    /// currently be expired (a still-valid one is a programming-error —
    /// refreshing early is a client bug, not a recoverable condition);
    /// the presented refresh token must verify and match the session's
    /// current one exactly.
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> AuthResult<TokenPair> {
        if self.tokens.access_token_is_live(access_token) {
            return Err(AuthError::programming(
                "access token is still valid and cannot be refreshed",
            ));
        }
        let user_name = self.tokens.verify_refresh(refresh_token)?;
        if !self
            .sessions
            .tokens_are_current(&user_name, access_token, refresh_token)
            .await
        {
            return Err(AuthError::unauthorized(
                "refresh token has already been rotated",
            ));
        }
        let pair = self.tokens.issue(&user_name)?;
        self.sessions.rotate_tokens(&user_name, &pair).await?;
        Ok(pair)
    }

    pub async fn disconnect(&self, user_name: &str) -> AuthResult<()> {
        self.sessions.unbind(user_name).await
    }

    /// Verify `access_token` and return the authenticated user name.
    pub fn authenticate(&self, access_token: &str) -> AuthResult<String> {
        self.tokens.verify_access(access_token)
    }

    pub async fn bound_database(&self, user_name: &str) -> Option<String> {
        self.sessions.bound_database(user_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatbase_engine::Catalog;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn empty_catalog() -> Catalog {
        Catalog {
            databases: HashMap::new(),
        }
    }

    async fn manager() -> (AuthManager, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let manager = AuthManager::new(file.path(), b"secret".to_vec(), TokenLifetimes::default())
            .await
            .unwrap();
        (manager, file)
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let (manager, _file) = manager().await;
        manager.sign_up("alice", "password123").await.unwrap();
        let pair = manager.sign_in("alice", "password123").await.unwrap();
        assert_eq!(manager.authenticate(&pair.access_token).unwrap(), "alice");
    }

    #[tokio::test]
    async fn connect_to_unknown_database_errors() {
        let (manager, _file) = manager().await;
        manager.sign_up("alice", "password123").await.unwrap();
        let catalog = empty_catalog();
        let err = manager
            .connect("alice", "password123", "nope", &catalog)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::AuthErrorKind::Database);
    }

    #[tokio::test]
    async fn live_access_token_rejects_refresh() {
        let (manager, _file) = manager().await;
        manager.sign_up("alice", "password123").await.unwrap();
        let pair = manager.sign_in("alice", "password123").await.unwrap();
        let err = manager
            .refresh(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::AuthErrorKind::Programming);
    }

    #[tokio::test]
    async fn rotated_refresh_token_cannot_be_reused() {
        let file = NamedTempFile::new().unwrap();
        // Negative access lifetime so the freshly issued access token
        // already reads as expired, letting us exercise refresh directly.
        let manager = AuthManager::new(
            file.path(),
            b"secret".to_vec(),
            TokenLifetimes {
                access_minutes: -1,
                refresh_days: 7,
            },
        )
        .await
        .unwrap();
        manager.sign_up("alice", "password123").await.unwrap();
        let first = manager.sign_in("alice", "password123").await.unwrap();
        let second = manager
            .refresh(&first.access_token, &first.refresh_token)
            .await
            .unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let err = manager
            .refresh(&first.access_token, &first.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::AuthErrorKind::Unauthorized);
    }
}
