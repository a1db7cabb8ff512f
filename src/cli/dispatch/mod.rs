//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the appropriate action, such as starting
//! the API server with its full configuration state.

use crate::api::handlers::auth::DEFAULT_SESSION_TTL_SECONDS;
use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let users_path = matches
        .get_one::<String>("users-path")
        .cloned()
        .context("missing required argument: --users-path")?;
    let public_base_url = matches
        .get_one::<String>("public-base-url")
        .cloned()
        .context("missing required argument: --public-base-url")?;
    let session_ttl_seconds = matches
        .get_one::<u64>("session-ttl-seconds")
        .copied()
        .unwrap_or(DEFAULT_SESSION_TTL_SECONDS);
    let session_key = matches
        .get_one::<String>("session-key")
        .map(|key| SecretString::from(key.clone()));

    let admin_identifier = matches.get_one::<String>("admin-identifier").cloned();
    let admin_secret = matches
        .get_one::<String>("admin-secret")
        .map(|secret| SecretString::from(secret.clone()));
    let otp_master_code = matches
        .get_one::<String>("otp-master-code")
        .map(|code| SecretString::from(code.clone()));

    let google_client_id = matches.get_one::<String>("google-client-id").cloned();
    let google_client_secret = matches
        .get_one::<String>("google-client-secret")
        .map(|secret| SecretString::from(secret.clone()));
    let google_redirect_url = matches
        .get_one::<String>("google-redirect-url")
        .cloned()
        .context("missing required argument: --google-redirect-url")?;

    Ok(Action::Server(Args {
        port,
        users_path,
        public_base_url,
        session_ttl_seconds,
        session_key,
        admin_identifier,
        admin_secret,
        otp_master_code,
        google_client_id,
        google_client_secret,
        google_redirect_url,
    }))
}
