use thiserror::Error;

/// The auth-manager's slice of the wire-facing error taxonomy (see
/// `flatbase-engine::error::ErrorKind` for the query-side half). Kept as
/// a separate, narrower enum because the auth manager reaches kinds
/// (`Database`, `Unauthorized`) that a query never produces, and never
/// reaches `NotSupported`, which is purely a query-gate concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Data,
    Integrity,
    Database,
    Programming,
    Operational,
    Internal,
    Unauthorized,
}

impl AuthErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorKind::Data => "DataError",
            AuthErrorKind::Integrity => "IntegrityError",
            AuthErrorKind::Database => "DatabaseError",
            AuthErrorKind::Programming => "ProgrammingError",
            AuthErrorKind::Operational => "OperationalError",
            AuthErrorKind::Internal => "InternalError",
            AuthErrorKind::Unauthorized => "Unauthorized",
        }
    }
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        AuthError {
            kind,
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Data, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Integrity, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Database, message)
    }

    pub fn programming(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Programming, message)
    }

    pub fn operational(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Operational, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Internal, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthError::new(AuthErrorKind::Unauthorized, message)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
