//! Request pipeline
//!
//! Wraps every outbound API call and every inbound response. Outbound, the
//! pipeline attaches the stored bearer credential; inbound, it inspects
//! the status and on a recoverable authorization failure coordinates a
//! single credential renewal before replaying the call.
//!
//! Per response, exactly one of four things happens:
//! 1. Success → passed through unchanged.
//! 2. Non-401 failure, 401 on a renewal-exempt endpoint, or 401 on a call
//!    already replayed once → propagated unchanged.
//! 3. 401 with no renewal outstanding → this call leads the renewal and
//!    replays itself with the new token.
//! 4. 401 while a renewal is outstanding → the call queues and replays
//!    (or fails) with that renewal's outcome.
//!
//! A renewal failure is terminal: queued calls reject with it, the stored
//! credential is cleared, the user is notified once, and a redirect to
//! the login entry point is scheduled once.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use yushan_auth::{Credential, CredentialStore, RENEWAL_EXEMPT_PATHS, now_millis, token};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics;
use crate::refresh::{RefreshCoordinator, RenewalOutcome, Role};
use crate::session::{self, AuthState, Notifier, Redirector, SESSION_EXPIRED_MESSAGE};

/// Delay between the session-expired notification and the redirect, so the
/// message is visible before the view changes.
const REDIRECT_DELAY: Duration = Duration::from_millis(500);

/// Authenticated HTTP client for the Yushan API.
///
/// Cheap to share behind an `Arc`; all interior state is synchronized.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    base_path: String,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
    redirector: Arc<dyn Redirector>,
}

impl ApiClient {
    /// Build a client from validated configuration and a loaded store.
    ///
    /// The notifier and redirector are the host application's seams for
    /// session-expiry handling; they are only invoked when a renewal fails.
    pub fn new(
        config: &Config,
        store: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
        redirector: Arc<dyn Redirector>,
    ) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(config.api.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_owned(),
            base_path: config.app.base_path.clone(),
            store,
            coordinator: RefreshCoordinator::new(),
            notifier,
            redirector,
        })
    }

    /// The credential store backing this client.
    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Validate the stored credential on startup (quiet refresh if expired).
    pub async fn initialize(&self) -> AuthState {
        session::initialize(&self.http, &self.base_url, &self.store).await
    }

    /// Sign in with email and password, storing the returned credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let response = token::login(&self.http, &self.base_url, email, password).await?;
        let credential = Credential::from_token_response(&response, now_millis());
        self.store.set(credential).await?;
        info!("signed in");
        Ok(())
    }

    /// Create an account and store the returned credential.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<()> {
        let response = token::register(&self.http, &self.base_url, email, username, password).await?;
        let credential = Credential::from_token_response(&response, now_millis());
        self.store.set(credential).await?;
        info!("registered and signed in");
        Ok(())
    }

    /// Drop the stored credential.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        info!("signed out");
        Ok(())
    }

    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            path: path.to_owned(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Execute one call through the pipeline.
    async fn execute(
        &self,
        method: Method,
        path: String,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        self.run(request_id, method, path, query, body).await
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %method, path = %path))]
    async fn run(
        &self,
        request_id: String,
        method: Method,
        path: String,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        let mut retried = false;
        let mut token_override: Option<String> = None;

        loop {
            let response = self
                .dispatch(
                    &method,
                    &path,
                    &query,
                    body.as_ref(),
                    token_override.as_deref(),
                )
                .await?;
            let status = response.status();

            if status.is_success() {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
                metrics::record_request(status.as_u16(), method.as_str());
                debug!(status = status.as_u16(), "request completed");
                return Ok(ApiResponse {
                    status: status.as_u16(),
                    body: bytes,
                });
            }

            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            let failure = Error::Status {
                status: status.as_u16(),
                body: body_text,
            };

            // Terminal failures: not an authorization failure, already
            // replayed once, or an endpoint that must never trigger renewal.
            if status != StatusCode::UNAUTHORIZED || retried || is_renewal_exempt(&path) {
                metrics::record_request(status.as_u16(), method.as_str());
                debug!(status = status.as_u16(), "propagating failure");
                return Err(failure);
            }

            retried = true;
            let access = self.recover().await?;
            debug!("replaying request with renewed credential");
            token_override = Some(access);
        }
    }

    /// Send one HTTP request, attaching the bearer credential when present.
    ///
    /// Absence of a credential is not an error; the request simply goes
    /// out unauthenticated.
    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
        token_override: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let token = match token_override {
            Some(t) => Some(t.to_owned()),
            None => self.store.access_token().await,
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {path} failed: {e}")))
    }

    /// Obtain a usable access token after an authorization failure: lead
    /// the renewal if none is outstanding, otherwise queue for the one in
    /// flight.
    async fn recover(&self) -> Result<String> {
        match self.coordinator.begin().await {
            Role::Leader => {
                debug!("access token rejected, starting renewal");
                let outcome = self.renew().await;
                self.coordinator.settle(&outcome).await;
                match &outcome {
                    Ok(_) => metrics::record_renewal("success"),
                    Err(error) => {
                        metrics::record_renewal("failure");
                        warn!(error = %error, "credential renewal failed, ending session");
                        self.expire_session().await;
                    }
                }
                outcome
            }
            Role::Follower(receiver) => receiver.await.unwrap_or_else(|_| {
                Err(Error::SessionExpired(
                    "renewal abandoned before settling".into(),
                ))
            }),
        }
    }

    /// Perform the renewal network call and record the new credential.
    ///
    /// The store reflects the renewed token before the queue is released,
    /// so every replay observes it.
    async fn renew(&self) -> RenewalOutcome {
        let Some(credential) = self.store.get().await else {
            return Err(Error::SessionExpired("no refresh token available".into()));
        };

        match token::refresh(&self.http, &self.base_url, &credential.refresh).await {
            Ok(response) => {
                let access = response.access_token.clone();
                let renewed = Credential::from_token_response(&response, now_millis());
                if let Err(e) = self.store.set(renewed).await {
                    warn!(error = %e, "failed to persist renewed credential");
                }
                info!("credential renewal succeeded");
                Ok(access)
            }
            Err(e) => Err(Error::SessionExpired(e.to_string())),
        }
    }

    /// Terminal renewal failure: clear the credential, notify the user
    /// once, and schedule one redirect to the login entry point.
    async fn expire_session(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear credentials after renewal failure");
        }
        self.notifier.notify_error(SESSION_EXPIRED_MESSAGE);
        self.schedule_redirect();
    }

    fn schedule_redirect(&self) {
        let redirector = self.redirector.clone();
        let location = session::login_redirect_path(&self.base_path);
        tokio::spawn(async move {
            tokio::time::sleep(REDIRECT_DELAY).await;
            redirector.redirect(&location);
        });
    }
}

/// Whether an authorization failure on `path` may trigger a renewal.
///
/// The renewal, login, and register endpoints are matched by substring so
/// a query string doesn't defeat the check. A renewal cycle started from
/// one of these would recurse forever.
fn is_renewal_exempt(path: &str) -> bool {
    RENEWAL_EXEMPT_PATHS.iter().any(|p| path.contains(p))
}

/// One outbound API call under construction.
pub struct RequestBuilder<'a> {
    client: &'a ApiClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl RequestBuilder<'_> {
    /// Append a query pair.
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::Decode(format!("serializing request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Send the call through the pipeline.
    pub async fn send(self) -> Result<ApiResponse> {
        self.client
            .execute(self.method, self.path, self.query, self.body)
            .await
    }
}

/// A successful (2xx) response.
#[derive(Debug)]
pub struct ApiResponse {
    status: u16,
    body: Bytes,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Decode(format!("decoding response body: {e}")))
    }
}
