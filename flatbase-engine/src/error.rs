use thiserror::Error;

use flatbase_ast::AstError;

/// Stable, wire-facing error taxonomy. The name of each kind is sent to
/// clients verbatim so they can branch on it without string-matching
/// messages, and the HTTP boundary (see `flatbase-server`) maps each kind
/// to a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Interface,
    Programming,
    NotSupported,
    Data,
    Integrity,
    Operational,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Interface => "InterfaceError",
            ErrorKind::Programming => "ProgrammingError",
            ErrorKind::NotSupported => "NotSupportedError",
            ErrorKind::Data => "DataError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        EngineError {
            kind,
            message: message.into(),
        }
    }

    pub fn programming(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Programming, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::NotSupported, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Data, message)
    }

    pub fn operational(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Operational, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::new(ErrorKind::Internal, message)
    }
}

impl From<AstError> for EngineError {
    fn from(e: AstError) -> Self {
        EngineError::programming(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
