//! Token endpoint operations
//!
//! Handles the three auth service interactions:
//! 1. Password login (initial credential flow)
//! 2. Account registration (also returns an initial credential)
//! 3. Token renewal (request-time refresh of an expired access token)
//!
//! All three POST JSON to paths under the configured API base URL and
//! return the same token payload. The renewal endpoint distinguishes a
//! rejected refresh token (401/403, terminal for the session) from other
//! failures.

use serde::{Deserialize, Serialize};

use crate::constants::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::error::{Error, Result};

/// Response from the auth service for login, register, and renewal.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts this to an absolute unix millisecond timestamp when storing
/// the credential.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Sign in with email and password.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(base_url, LOGIN_PATH))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid login response: {e}")))
}

/// Create an account. The auth service signs the new user in directly,
/// so the response carries an initial credential.
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    username: &str,
    password: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(base_url, REGISTER_PATH))
        .json(&serde_json::json!({
            "email": email,
            "username": username,
            "password": password,
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("register request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid register response: {e}")))
}

/// Renew an access token using a refresh token.
///
/// Called by the request pipeline when a call fails authorization, and by
/// the session bootstrap when the stored token has expired on startup.
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(base_url, REFRESH_PATH))
        .json(&serde_json::json!({
            "refreshToken": refresh_token,
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token renewal request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or invalid
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidRefreshToken(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenEndpoint(format!(
            "token renewal returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenEndpoint(format!("invalid renewal response: {e}")))
}

/// Join the base URL and an endpoint path.
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
