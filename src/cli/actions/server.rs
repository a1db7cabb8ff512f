use crate::{
    api::{self, handlers::auth},
    cli::telemetry,
    google::GoogleAuth,
    otp::{self, LogCodeSender, OtpCache},
    store::UserStore,
    token::SessionSigner,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub users_path: String,
    pub public_base_url: String,
    pub session_ttl_seconds: u64,
    pub session_key: Option<SecretString>,
    pub admin_identifier: Option<String>,
    pub admin_secret: Option<SecretString>,
    pub otp_master_code: Option<SecretString>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<SecretString>,
    pub google_redirect_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session key is invalid, the Google OAuth client
/// cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let ttl = Duration::from_secs(args.session_ttl_seconds);
    let signer = match &args.session_key {
        Some(key) => SessionSigner::from_paserk(key.expose_secret(), ttl)
            .context("Invalid session signing key")?,
        None => {
            warn!("No session signing key configured, sessions will not survive a restart");
            SessionSigner::generate(ttl).context("Could not generate a session signing key")?
        }
    };

    let mut config = auth::AuthConfig::new(args.public_base_url.clone())
        .with_session_ttl_seconds(args.session_ttl_seconds);

    if let (Some(identifier), Some(secret)) = (args.admin_identifier, args.admin_secret) {
        warn!("Administrator bypass login is enabled");
        config = config.with_admin_bypass(identifier, secret);
    }

    if let Some(code) = args.otp_master_code {
        warn!("One-time code master bypass is enabled");
        config = config.with_otp_master_code(code);
    }

    let google = match (args.google_client_id, args.google_client_secret) {
        (Some(client_id), Some(client_secret)) => {
            info!("Federated Google login is enabled");
            Some(
                GoogleAuth::new(client_id, client_secret, args.google_redirect_url.clone())
                    .context("Could not build the Google OAuth client")?,
            )
        }
        _ => None,
    };

    let store = UserStore::new(&args.users_path);
    let cache = Arc::new(OtpCache::new(Duration::from_secs(
        otp::DEFAULT_OTP_TTL_SECONDS,
    )));
    otp::spawn_sweeper(
        cache.clone(),
        Duration::from_secs(otp::DEFAULT_SWEEP_INTERVAL_SECONDS),
    );

    let state = auth::AuthState::new(config, store, cache, signer, Arc::new(LogCodeSender), google);

    let result = api::new(args.port, Arc::new(state)).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("users_path", args.users_path.clone()),
        ("public_base_url", args.public_base_url.clone()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("session_key_set", args.session_key.is_some().to_string()),
        (
            "admin_bypass",
            (args.admin_identifier.is_some() && args.admin_secret.is_some()).to_string(),
        ),
        (
            "otp_master_code_set",
            args.otp_master_code.is_some().to_string(),
        ),
        (
            "google_login",
            (args.google_client_id.is_some() && args.google_client_secret.is_some()).to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
