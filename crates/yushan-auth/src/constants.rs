//! Yushan auth service endpoint paths
//!
//! Paths are relative to the configured API base URL. They are shared by
//! the token operations in this crate and by the request pipeline, which
//! must recognize them when deciding whether an authorization failure may
//! trigger a renewal cycle.

/// Token renewal endpoint (refresh grant)
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Password login endpoint (initial credential flow)
pub const LOGIN_PATH: &str = "/api/auth/login";

/// Account registration endpoint
pub const REGISTER_PATH: &str = "/api/auth/register";

/// Endpoints that never trigger a renewal cycle on authorization failure.
/// A renewal started from its own endpoint would recurse forever.
pub const RENEWAL_EXEMPT_PATHS: &[&str] = &[REFRESH_PATH, LOGIN_PATH, REGISTER_PATH];
