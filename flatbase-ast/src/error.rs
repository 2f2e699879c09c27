use thiserror::Error;

/// Failures raised while tokenising or parsing a WHERE expression.
///
/// These are always the caller's fault (malformed query text), never an
/// environmental condition, so downstream crates map every variant to the
/// `programming` error kind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AstError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedCharacter(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("mismatched parentheses in expression")]
    MismatchedParentheses,

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("empty expression")]
    EmptyExpression,
}

pub type AstResult<T> = Result<T, AstError>;
