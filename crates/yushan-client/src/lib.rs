//! Yushan API client
//!
//! Authenticated HTTP pipeline for the Yushan reading/writing platform.
//! Every outbound call carries the stored bearer credential; when a call
//! fails authorization, the pipeline transparently renews the credential,
//! serializing concurrent renewals into a single in-flight operation, and
//! replays the affected calls once it settles.
//!
//! The host application plugs in at three seams:
//! - [`CredentialStore`](yushan_auth::CredentialStore) persists the
//!   session's token pair (re-exported from `yushan-auth`)
//! - [`Notifier`] shows the user a message when the session expires
//! - [`Redirector`] navigates to the login entry point afterwards
//!
//! ```no_run
//! use std::sync::Arc;
//! use yushan_client::{ApiClient, Config, Notifier, Redirector};
//!
//! struct Console;
//! impl Notifier for Console {
//!     fn notify_error(&self, message: &str) {
//!         eprintln!("{message}");
//!     }
//! }
//! impl Redirector for Console {
//!     fn redirect(&self, location: &str) {
//!         eprintln!("navigate to {location}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(&Config::resolve_path(None))?;
//!     let store = Arc::new(
//!         yushan_auth::CredentialStore::load(config.app.credentials_file.clone()).await?,
//!     );
//!     let seam = Arc::new(Console);
//!     let client = ApiClient::new(&config, store, seam.clone(), seam)?;
//!
//!     client.initialize().await;
//!     let novels = client.get("/api/novels").query("page", 1).send().await?;
//!     println!("{}", novels.text());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
mod metrics;
mod refresh;
pub mod session;

pub use client::{ApiClient, ApiResponse, RequestBuilder};
pub use config::{ApiConfig, AppConfig, Config};
pub use error::{Error, Result};
pub use session::{AuthState, Notifier, Redirector, SESSION_EXPIRED_MESSAGE, login_redirect_path};

pub use yushan_auth::{Credential, CredentialStore};
