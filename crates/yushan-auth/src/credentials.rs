//! Credential storage for the signed-in session
//!
//! Holds the session's token pair in a JSON file — the native analog of
//! the browser storage the web client keeps its tokens in. Writes use
//! atomic temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes concurrent access from the renewal path and the login flow.
//!
//! The credential file is the single source of truth for token data. Only
//! the renewal transition and the login/register flows write it; every
//! other path reads or clears.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// The signed-in session's OAuth-style token pair.
///
/// `expires` is a unix timestamp in milliseconds (absolute, not a delta).
/// Computed at storage time from `TokenResponse.expires_in` (seconds delta)
/// plus the current time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Current access token (Bearer value for API calls)
    pub access: String,
    /// Refresh token for obtaining new access tokens
    pub refresh: String,
    /// Expiration as unix timestamp in milliseconds
    pub expires: u64,
}

impl Credential {
    /// Build a credential from a token endpoint response, converting the
    /// `expires_in` seconds delta to an absolute expiry.
    pub fn from_token_response(response: &TokenResponse, now_millis: u64) -> Self {
        Self {
            access: response.access_token.clone(),
            refresh: response.refresh_token.clone(),
            expires: now_millis + response.expires_in * 1000,
        }
    }

    /// Whether the access token has expired as of `now_millis`.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires <= now_millis
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Thread-safe credential file manager.
///
/// The Mutex serializes all access. Reads acquire the lock briefly to clone
/// the in-memory state, so request-time reads don't block on renewal writes.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Option<Credential>>,
}

impl CredentialStore {
    /// Load the credential from the given file path.
    ///
    /// If the file doesn't exist, creates it as `null` (signed-out state).
    /// The client reports `Unauthenticated` until a login stores tokens.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credential: Option<Credential> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                signed_in = credential.is_some(),
                "loaded credential file"
            );
            credential
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            // Create the file so future loads don't need the cold-start path
            write_atomic(&path, &None).await?;
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the stored credential, if signed in.
    pub async fn get(&self) -> Option<Credential> {
        let state = self.state.lock().await;
        state.clone()
    }

    /// Current access token, if signed in.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.as_ref().map(|c| c.access.clone())
    }

    /// Replace the stored credential and persist to disk.
    pub async fn set(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = Some(credential);
        debug!("stored credential");
        write_atomic(&self.path, &state).await
    }

    /// Drop the stored credential and persist the signed-out state.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            debug!("cleared credential");
        }
        write_atomic(&self.path, &state).await
    }

    /// Whether the stored access token has expired.
    ///
    /// An absent credential counts as expired: there is no token to present.
    pub async fn is_expired(&self) -> bool {
        let state = self.state.lock().await;
        match state.as_ref() {
            Some(credential) => credential.is_expired_at(now_millis()),
            None => true,
        }
    }
}

/// Write the credential state to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains session tokens.
async fn write_atomic(path: &Path, state: &Option<Credential>) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
