//! Error types for the request pipeline
//!
//! Recoverable authorization failures never appear here: the pipeline
//! absorbs them, and the caller observes either the replayed response or
//! `SessionExpired`. String payloads keep the type `Clone`, which the
//! renewal queue relies on to deliver one failure to every waiter.

/// Errors surfaced by the request pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Network failure before a response was received. Propagated untouched.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success response passed through from the server, including
    /// terminal authorization failures (exempt endpoint or already retried).
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Credential renewal failed; the session is over. Terminal for every
    /// request sharing the renewal.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Response body could not be decoded as the expected type.
    #[error("response decode error: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<yushan_auth::Error> for Error {
    fn from(err: yushan_auth::Error) -> Self {
        match err {
            yushan_auth::Error::Http(msg) => Error::Transport(msg),
            yushan_auth::Error::Rejected { status, body } => Error::Status { status, body },
            yushan_auth::Error::InvalidRefreshToken(msg) => Error::SessionExpired(msg),
            yushan_auth::Error::TokenEndpoint(msg) => Error::Decode(msg),
            yushan_auth::Error::CredentialParse(msg) => Error::Io(msg),
            yushan_auth::Error::Io(msg) => Error::Io(msg),
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = Error::Status {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.to_string(), "request failed with status 404: not found");

        let err = Error::SessionExpired("refresh token rejected".into());
        assert!(err.to_string().starts_with("session expired:"));
    }

    #[test]
    fn errors_are_cloneable_for_queue_fanout() {
        let err = Error::SessionExpired("renewal failed".into());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn auth_rejection_converts_to_status() {
        let err: Error = yushan_auth::Error::Rejected {
            status: 401,
            body: "bad credentials".into(),
        }
        .into();
        match err {
            Error::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn invalid_refresh_token_converts_to_session_expired() {
        let err: Error = yushan_auth::Error::InvalidRefreshToken("revoked".into()).into();
        assert!(matches!(err, Error::SessionExpired(_)));
    }
}
