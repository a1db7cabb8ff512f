//! # Vetrina (Storefront Authentication & Session Service)
//!
//! `vetrina` is the authentication authority for the storefront. It owns the
//! user table (a flat JSON file rewritten wholesale through a single writer),
//! issues signed session tokens, and exposes the three login paths the shop
//! frontend uses: password, one-time code, and Google sign-in.
//!
//! ## Identifiers
//!
//! A user can be located by username, email, or phone. All identifier lookups
//! are case-insensitive: input is trimmed and lowercased before comparison,
//! and the same normalization is applied at registration time so uniqueness
//! checks and logins agree.
//!
//! ## Sessions
//!
//! Session tokens are PASETO `v4.public` tokens signed with an Ed25519 key.
//! The raw token is handed to the browser as the `auth-token` cookie and can
//! be inspected offline; logout revokes the token's `jti` until its natural
//! expiry.
//!
//! ## One-time codes
//!
//! Codes are 6-digit, single-use, and expire after five minutes. They are
//! kept in an in-memory cache with lazy eviction on verify plus a periodic
//! background sweep. Codes are never returned over the wire; delivery goes
//! through a [`otp::CodeSender`], which in local dev just logs.

pub mod api;
pub mod cli;
pub mod client;
pub mod google;
pub mod otp;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
