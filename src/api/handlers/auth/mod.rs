//! Auth handlers and supporting modules.
//!
//! This module coordinates the three login methods (password, one-time code,
//! federated identity), session issuance, and the cookie contract shared by
//! all of them.
//!
//! ## Session tokens
//!
//! Every successful login concludes in [`session::issue_session`]: the user
//! record is signed into a `v4.public` token and mirrored into the `auth-token`
//! cookie. Logout revokes the token's `jti` until its natural expiry.
//!
//! ## Operational bypasses
//!
//! Two config-gated short-circuits exist for demo and support access: an
//! administrator identifier/secret pair that skips the user store, and a
//! master one-time code accepted for any registered identifier. Both are
//! disabled unless explicitly configured and both log a warning at startup.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub(crate) mod federated;
pub(crate) mod login;
pub(crate) mod otp;
mod password;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState, DEFAULT_SESSION_TTL_SECONDS};

/// JSON `{error}` body paired with the endpoint's status code.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(types::ErrorBody::new(message))).into_response()
}
