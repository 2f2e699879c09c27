use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flatbase_auth::{AuthError, AuthErrorKind};
use flatbase_engine::{EngineError, ErrorKind};
use serde::Serialize;

/// The HTTP boundary's single error type: every handler returns
/// `Result<_, ApiError>`, and this converts both of the lower layers'
/// narrower error enums into a wire-facing `{type, msg}` body plus the
/// status code from the mapping table (see DESIGN.md). `Unauthorized`
/// has no counterpart in the query-side taxonomy; it exists purely for
/// the 401s the auth layer raises.
pub enum ApiError {
    Engine(EngineError),
    Auth(AuthError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e.kind {
                ErrorKind::Interface => StatusCode::BAD_REQUEST,
                ErrorKind::Programming => StatusCode::BAD_REQUEST,
                ErrorKind::Data => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Integrity => StatusCode::CONFLICT,
                ErrorKind::NotSupported => StatusCode::NOT_IMPLEMENTED,
                ErrorKind::Operational => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => match e.kind {
                AuthErrorKind::Data => StatusCode::UNPROCESSABLE_ENTITY,
                AuthErrorKind::Integrity => StatusCode::CONFLICT,
                AuthErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
                AuthErrorKind::Programming => StatusCode::BAD_REQUEST,
                AuthErrorKind::Operational => StatusCode::SERVICE_UNAVAILABLE,
                AuthErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                AuthErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            },
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => e.kind.as_str(),
            ApiError::Auth(e) => e.kind.as_str(),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Engine(e) => e.message.clone(),
            ApiError::Auth(e) => e.message.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    type_name: &'a str,
    msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            type_name: self.type_name(),
            msg: self.message(),
        };
        log::warn!("{} {}: {}", status, body.type_name, body.msg);
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}
