//! Session seams and startup bootstrap
//!
//! The pipeline reports session expiry through two host-provided seams:
//! a user-facing notification sink and a navigation handler. Both are
//! fire-and-forget from the pipeline's perspective — the host decides how
//! a message is displayed and how navigation happens.
//!
//! `initialize` replays the application's startup behavior: validate the
//! stored credential and quietly refresh it when it has already expired.
//! Unlike the request-path renewal failure, a failed startup refresh
//! clears the stored tokens without notifying or redirecting; the host
//! simply starts signed out.

use std::sync::Arc;

use tracing::{info, warn};
use yushan_auth::{Credential, CredentialStore, now_millis, token};

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    /// Fire-and-forget user-visible error message.
    fn notify_error(&self, message: &str);
}

/// Navigation handler for forced redirects.
pub trait Redirector: Send + Sync {
    /// Navigate the host application to `location`.
    fn redirect(&self, location: &str);
}

/// Message shown when renewal fails and the session cannot continue.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Build the unauthenticated entry point path, carrying the expiry
/// indicator, under the configured deployment prefix.
pub fn login_redirect_path(base_path: &str) -> String {
    format!("{}/login?expired=true", base_path.trim_end_matches('/'))
}

/// Authentication state as seen by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

/// Validate the stored credential on startup.
///
/// - No stored credential → `Unauthenticated`.
/// - Credential still valid → `Authenticated`, no network traffic.
/// - Credential expired → one direct renewal attempt; the renewed pair is
///   stored on success, the stale pair cleared on failure.
pub async fn initialize(
    http: &reqwest::Client,
    base_url: &str,
    store: &Arc<CredentialStore>,
) -> AuthState {
    let Some(credential) = store.get().await else {
        return AuthState::Unauthenticated;
    };

    if !credential.is_expired_at(now_millis()) {
        info!("stored credential still valid");
        return AuthState::Authenticated;
    }

    info!("stored credential expired on startup, attempting refresh");
    match token::refresh(http, base_url, &credential.refresh).await {
        Ok(response) => {
            let renewed = Credential::from_token_response(&response, now_millis());
            if let Err(e) = store.set(renewed).await {
                warn!(error = %e, "failed to persist refreshed credential");
            }
            info!("startup refresh succeeded");
            AuthState::Authenticated
        }
        Err(e) => {
            warn!(error = %e, "startup refresh failed, clearing stored credential");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "failed to clear stale credential");
            }
            AuthState::Unauthenticated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Expiration far in the future (year 2100).
    fn future_expiry() -> u64 {
        4_102_444_800_000
    }

    /// Expiration in the past.
    fn past_expiry() -> u64 {
        1_000_000_000
    }

    async fn test_store(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
        let path = dir.path().join("credential.json");
        Arc::new(CredentialStore::load(path).await.unwrap())
    }

    /// Mock auth service whose refresh endpoint counts calls and either
    /// renews or rejects.
    async fn start_mock_auth(accept: bool) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let app = axum::Router::new().route(
            "/api/auth/refresh",
            post(move |Json(_): Json<serde_json::Value>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if accept {
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "accessToken": "at_renewed",
                                "refreshToken": "rt_renewed",
                                "expiresIn": 3600,
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(serde_json::json!({"message": "revoked"})),
                        )
                    }
                }
            }),
        );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), calls)
    }

    #[test]
    fn login_redirect_path_with_prefix() {
        assert_eq!(
            login_redirect_path("/yushan"),
            "/yushan/login?expired=true"
        );
    }

    #[test]
    fn login_redirect_path_without_prefix() {
        assert_eq!(login_redirect_path(""), "/login?expired=true");
    }

    #[test]
    fn login_redirect_path_trims_trailing_slash() {
        assert_eq!(
            login_redirect_path("/yushan/"),
            "/yushan/login?expired=true"
        );
    }

    #[tokio::test]
    async fn initialize_without_credential_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let (base, calls) = start_mock_auth(true).await;

        let state = initialize(&reqwest::Client::new(), &base, &store).await;
        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no refresh without tokens");
    }

    #[tokio::test]
    async fn initialize_with_valid_credential_skips_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .set(Credential {
                access: "at_1".into(),
                refresh: "rt_1".into(),
                expires: future_expiry(),
            })
            .await
            .unwrap();
        let (base, calls) = start_mock_auth(true).await;

        let state = initialize(&reqwest::Client::new(), &base, &store).await;
        assert_eq!(state, AuthState::Authenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "valid token needs no refresh");
        assert_eq!(store.access_token().await.unwrap(), "at_1");
    }

    #[tokio::test]
    async fn initialize_refreshes_expired_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .set(Credential {
                access: "at_stale".into(),
                refresh: "rt_1".into(),
                expires: past_expiry(),
            })
            .await
            .unwrap();
        let (base, calls) = start_mock_auth(true).await;

        let state = initialize(&reqwest::Client::new(), &base, &store).await;
        assert_eq!(state, AuthState::Authenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.access_token().await.unwrap(), "at_renewed");
    }

    #[tokio::test]
    async fn initialize_clears_credential_on_failed_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .set(Credential {
                access: "at_stale".into(),
                refresh: "rt_revoked".into(),
                expires: past_expiry(),
            })
            .await
            .unwrap();
        let (base, _calls) = start_mock_auth(false).await;

        let state = initialize(&reqwest::Client::new(), &base, &store).await;
        assert_eq!(state, AuthState::Unauthenticated);
        assert!(
            store.get().await.is_none(),
            "stale credential must be cleared after a failed startup refresh"
        );
    }
}
