use thiserror::Error;

/// Mirrors the server's wire-facing error taxonomy (see
/// `flatbase_engine::ErrorKind` and `flatbase_auth::AuthErrorKind`) on
/// the client side, the way the original implementation's
/// `dbapi2/exceptions.py` mirrors its server-side `exceptions` module.
/// `DatabaseError` is kept as its own variant (rather than folded into
/// `Internal`) because the wire taxonomy names it distinctly from
/// `InternalError`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("interface error: {0}")]
    Interface(String),
    #[error("data error: {0}")]
    Data(String),
    #[error("operational error: {0}")]
    Operational(String),
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("programming error: {0}")]
    Programming(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("malformed response: {0}")]
    Protocol(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Build the exception matching a `{type, msg}` error body's `type`
    /// field, the way `dbapi2/exceptions.py`'s `exception_handler` does.
    pub fn from_wire(type_name: &str, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match type_name {
            "InterfaceError" => ClientError::Interface(msg),
            "DataError" => ClientError::Data(msg),
            "OperationalError" => ClientError::Operational(msg),
            "IntegrityError" => ClientError::Integrity(msg),
            "InternalError" => ClientError::Internal(msg),
            "ProgrammingError" => ClientError::Programming(msg),
            "NotSupportedError" => ClientError::NotSupported(msg),
            "DatabaseError" => ClientError::Database(msg),
            "Unauthorized" => ClientError::Unauthorized(msg),
            other => ClientError::Protocol(format!("unrecognised error type '{other}': {msg}")),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
