//! Error types for credential and token operations

/// Errors from credential and token operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("authentication rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("refresh token rejected: {0}")]
    InvalidRefreshToken(String),

    #[error("unexpected token endpoint response: {0}")]
    TokenEndpoint(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
