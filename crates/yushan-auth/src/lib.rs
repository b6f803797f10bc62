//! Yushan authentication library
//!
//! Provides the credential store and token endpoint operations for the
//! Yushan API client. This crate is a standalone library with no dependency
//! on the request pipeline — it can be tested and used independently.
//!
//! Credential flow:
//! 1. User signs in via `token::login()` (or `token::register()`)
//! 2. Credential stored via `credentials::CredentialStore::set()`
//! 3. Request pipeline reads the access token at dispatch time
//! 4. On expiry, `token::refresh()` obtains a new token pair
//! 5. Renewed tokens saved via `credentials::CredentialStore::set()`
//! 6. On renewal failure, `credentials::CredentialStore::clear()` signs out

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialStore, now_millis};
pub use error::{Error, Result};
pub use token::{TokenResponse, login, refresh, register};
