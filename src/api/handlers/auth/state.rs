//! Auth state and configuration.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::google::GoogleAuth;
use crate::otp::{CodeSender, OtpCache};
use crate::store::UserStore;
use crate::token::{Denylist, SessionSigner};

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    public_base_url: String,
    session_ttl_seconds: u64,
    admin_identifier: Option<String>,
    admin_secret: Option<SecretString>,
    otp_master_code: Option<SecretString>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(public_base_url: String) -> Self {
        Self {
            public_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            admin_identifier: None,
            admin_secret: None,
            otp_master_code: None,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    /// Enable the administrator login short-circuit. Matching credentials skip
    /// the user store entirely, so leave this unset outside demo deployments.
    #[must_use]
    pub fn with_admin_bypass(mut self, identifier: String, secret: SecretString) -> Self {
        self.admin_identifier = Some(identifier);
        self.admin_secret = Some(secret);
        self
    }

    /// Enable a universal one-time code accepted for any registered identifier.
    #[must_use]
    pub fn with_otp_master_code(mut self, code: SecretString) -> Self {
        self.otp_master_code = Some(code);
        self
    }

    pub(crate) fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.public_base_url.starts_with("https://")
    }

    #[must_use]
    pub fn admin_bypass_enabled(&self) -> bool {
        self.admin_identifier.is_some() && self.admin_secret.is_some()
    }

    #[must_use]
    pub fn otp_master_code_enabled(&self) -> bool {
        self.otp_master_code.is_some()
    }

    /// Exact match against the configured administrator pair. Always false when
    /// the bypass is not configured.
    pub(super) fn admin_matches(&self, identifier: &str, password: &str) -> bool {
        match (&self.admin_identifier, &self.admin_secret) {
            (Some(admin), Some(secret)) => {
                admin == identifier && secret.expose_secret() == password
            }
            _ => false,
        }
    }

    pub(super) fn master_code_matches(&self, code: &str) -> bool {
        self.otp_master_code
            .as_ref()
            .is_some_and(|master| master.expose_secret() == code)
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: UserStore,
    otp: Arc<OtpCache>,
    signer: SessionSigner,
    denylist: Denylist,
    code_sender: Arc<dyn CodeSender>,
    google: Option<GoogleAuth>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        store: UserStore,
        otp: Arc<OtpCache>,
        signer: SessionSigner,
        code_sender: Arc<dyn CodeSender>,
        google: Option<GoogleAuth>,
    ) -> Self {
        Self {
            config,
            store,
            otp,
            signer,
            denylist: Denylist::new(),
            code_sender,
            google,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &UserStore {
        &self.store
    }

    pub(super) fn otp(&self) -> &OtpCache {
        &self.otp
    }

    pub(super) fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    pub(super) fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    pub(super) fn code_sender(&self) -> &dyn CodeSender {
        self.code_sender.as_ref()
    }

    pub(super) fn google(&self) -> Option<&GoogleAuth> {
        self.google.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::otp::{LogCodeSender, OtpCache};
    use crate::store::UserStore;
    use crate::token::SessionSigner;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("http://localhost:3005".to_string());

        assert_eq!(config.public_base_url(), "http://localhost:3005");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert!(!config.admin_bypass_enabled());
        assert!(!config.otp_master_code_enabled());
        assert!(!config.session_cookie_secure());

        let config = config
            .with_session_ttl_seconds(3600)
            .with_admin_bypass("admin".to_string(), "sesame".to_string().into())
            .with_otp_master_code("424242".to_string().into());

        assert_eq!(config.session_ttl_seconds(), 3600);
        assert!(config.admin_bypass_enabled());
        assert!(config.otp_master_code_enabled());
    }

    #[test]
    fn session_cookie_secure_tracks_scheme() {
        let insecure = AuthConfig::new("http://localhost:3005".to_string());
        assert!(!insecure.session_cookie_secure());

        let secure = AuthConfig::new("https://shop.example.com".to_string());
        assert!(secure.session_cookie_secure());
    }

    #[test]
    fn admin_matches_requires_exact_pair() {
        let config = AuthConfig::new("http://localhost:3005".to_string())
            .with_admin_bypass("admin".to_string(), "sesame".to_string().into());

        assert!(config.admin_matches("admin", "sesame"));
        assert!(!config.admin_matches("Admin", "sesame"));
        assert!(!config.admin_matches("admin", "sesame "));
        assert!(!config.admin_matches("", ""));
    }

    #[test]
    fn admin_matches_is_false_when_unconfigured() {
        let config = AuthConfig::new("http://localhost:3005".to_string());
        assert!(!config.admin_matches("admin", "sesame"));
    }

    #[test]
    fn master_code_matches_only_when_configured() {
        let config = AuthConfig::new("http://localhost:3005".to_string());
        assert!(!config.master_code_matches("424242"));

        let config = config.with_otp_master_code("424242".to_string().into());
        assert!(config.master_code_matches("424242"));
        assert!(!config.master_code_matches("123456"));
    }

    #[test]
    fn auth_state_exposes_components() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AuthConfig::new("http://localhost:3005".to_string());
        let signer = SessionSigner::generate(Duration::from_secs(60)).expect("signer");
        let state = AuthState::new(
            config,
            UserStore::new(dir.path().join("users.json")),
            Arc::new(OtpCache::new(Duration::from_secs(300))),
            signer,
            Arc::new(LogCodeSender),
            None,
        );

        assert_eq!(state.config().public_base_url(), "http://localhost:3005");
        assert!(state.google().is_none());
        assert_eq!(state.otp().ttl(), Duration::from_secs(300));
    }
}
