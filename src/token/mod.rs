//! PASETO v4.public session tokens.
//!
//! Sessions are asymmetrically signed so the token handed to the browser is
//! tamper-evident and carries its own identity claims. Claims use RFC3339
//! timestamps. Logout revokes a token's `jti` in an in-memory [`Denylist`]
//! until its natural expiry, so a stolen cookie stops working the moment the
//! owner signs out.

use crate::store::UserRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use pasetors::errors::Error as PasetorsError;
use pasetors::keys::{AsymmetricKeyPair, AsymmetricPublicKey, AsymmetricSecretKey, Generate};
use pasetors::paserk::{FormatAsPaserk, Id};
use pasetors::token::UntrustedToken;
use pasetors::version4::{PublicToken, V4};
use pasetors::Public;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const SESSION_ISSUER: &str = "vetrina";
pub const SESSION_AUDIENCE: &str = "vetrina-web";

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    #[error("malformed token")]
    TokenFormat,
    #[error("invalid base64")]
    Base64,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid iat claim")]
    InvalidIat,
    #[error("invalid exp claim")]
    InvalidExp,
    #[error("time formatting failed")]
    TimeFormat,
    #[error("time parsing failed")]
    TimeParse,
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    /// User id.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub iat: String,
    pub exp: String,
    pub jti: String,
}

/// Signs and verifies session tokens with a single Ed25519 key.
pub struct SessionSigner {
    secret: AsymmetricSecretKey<V4>,
    public: AsymmetricPublicKey<V4>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl SessionSigner {
    /// Build a signer from a PASERK `k4.secret.` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the PASERK is malformed or not a v4 secret key.
    pub fn from_paserk(paserk: &str, ttl: Duration) -> Result<Self, Error> {
        let secret =
            AsymmetricSecretKey::<V4>::try_from(paserk).map_err(|err| map_paseto_error(&err))?;
        // An Ed25519 secret carries its public half in the upper 32 bytes.
        let public = AsymmetricPublicKey::<V4>::from(&secret.as_bytes()[32..])
            .map_err(|_| Error::InvalidKey)?;
        Ok(Self {
            secret,
            public,
            issuer: SESSION_ISSUER.to_string(),
            audience: SESSION_AUDIENCE.to_string(),
            ttl,
        })
    }

    /// Build a signer with a freshly generated key. Tokens signed with it do
    /// not survive a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate(ttl: Duration) -> Result<Self, Error> {
        let pair = AsymmetricKeyPair::<V4>::generate().map_err(|_| Error::InvalidKey)?;
        Ok(Self {
            secret: pair.secret,
            public: pair.public,
            issuer: SESSION_ISSUER.to_string(),
            audience: SESSION_AUDIENCE.to_string(),
            ttl,
        })
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// PASERK ID of the public half, safe to log.
    ///
    /// # Errors
    ///
    /// Returns an error if PASERK ID formatting fails.
    pub fn key_id(&self) -> Result<String, Error> {
        let id = Id::from(&self.public);
        let mut kid = String::new();
        id.fmt(&mut kid).map_err(|_| Error::InvalidKey)?;
        Ok(kid)
    }

    /// Sign a fresh session token for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if claim encoding or signing fails.
    pub fn issue(&self, user: &UserRecord) -> Result<String, Error> {
        let iat_unix = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            provider: user.provider.as_str().to_string(),
            iat: rfc3339_from_unix(iat_unix)?,
            exp: rfc3339_from_unix(iat_unix.saturating_add(ttl))?,
            jti: Uuid::new_v4().to_string(),
        };
        let payload = serde_json::to_vec(&claims)?;
        PublicToken::sign(&self.secret, &payload, None, None).map_err(|err| map_paseto_error(&err))
    }

    /// Verify a session token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is malformed or contains invalid base64/json,
    /// - the signature is invalid,
    /// - the claims fail validation (`iss`, `aud`, `iat`, `exp`).
    pub fn verify(&self, token: &str) -> Result<SessionClaims, Error> {
        let untrusted =
            UntrustedToken::<Public, V4>::try_from(token).map_err(|err| map_paseto_error(&err))?;
        let trusted = PublicToken::verify(&self.public, &untrusted, None, None)
            .map_err(|err| map_paseto_error(&err))?;
        let claims: SessionClaims = serde_json::from_str(trusted.payload())?;
        self.validate_claims(&claims)?;
        Ok(claims)
    }

    fn validate_claims(&self, claims: &SessionClaims) -> Result<(), Error> {
        if claims.iss != self.issuer {
            return Err(Error::InvalidIssuer);
        }
        if claims.aud != self.audience {
            return Err(Error::InvalidAudience);
        }

        let now = Utc::now().timestamp();
        let iat = unix_from_rfc3339(&claims.iat).map_err(|_| Error::InvalidIat)?;
        let exp = unix_from_rfc3339(&claims.exp).map_err(|_| Error::InvalidExp)?;

        if iat > now {
            return Err(Error::InvalidIat);
        }
        if exp <= now {
            return Err(Error::Expired);
        }
        Ok(())
    }
}

/// Convert a unix timestamp to RFC3339.
///
/// # Errors
///
/// Returns an error if the timestamp is out of range.
pub fn rfc3339_from_unix(unix_seconds: i64) -> Result<String, Error> {
    let dt = DateTime::<Utc>::from_timestamp(unix_seconds, 0).ok_or(Error::TimeFormat)?;
    Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Parse an RFC3339 timestamp into unix seconds.
///
/// # Errors
///
/// Returns an error if parsing fails.
pub fn unix_from_rfc3339(value: &str) -> Result<i64, Error> {
    let dt = DateTime::parse_from_rfc3339(value).map_err(|_| Error::TimeParse)?;
    Ok(dt.timestamp())
}

fn map_paseto_error(err: &PasetorsError) -> Error {
    match err {
        PasetorsError::Base64 => Error::Base64,
        PasetorsError::TokenValidation => Error::InvalidSignature,
        PasetorsError::Key => Error::InvalidKey,
        _ => Error::TokenFormat,
    }
}

/// Revoked session ids, each held until its token would have expired anyway.
#[derive(Default)]
pub struct Denylist {
    entries: Mutex<HashMap<String, i64>>,
}

impl Denylist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a `jti` as revoked until `exp_unix`. Entries whose tokens have
    /// already expired are dropped on the way in.
    pub async fn revoke(&self, jti: &str, exp_unix: i64) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, exp| *exp > now);
        if exp_unix > now {
            entries.insert(jti.to_string(), exp_unix);
        }
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock().await;
        match entries.get(jti) {
            Some(exp) if *exp > now => true,
            Some(_) => {
                entries.remove(jti);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{unix_from_rfc3339, Denylist, Error, SessionSigner, SESSION_ISSUER};
    use crate::store::{Provider, UserRecord};
    use chrono::Utc;
    use pasetors::paserk::FormatAsPaserk;
    use std::time::Duration;
    use uuid::Uuid;

    const TTL: Duration = Duration::from_secs(60 * 60);

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: None,
            password_hash: "hash".to_string(),
            name: "Alice".to_string(),
            street: None,
            city: None,
            state: None,
            zipcode: None,
            google_id: None,
            avatar_url: None,
            provider: Provider::Local,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let user = user();
        let token = signer.issue(&user)?;
        assert!(token.starts_with("v4.public."));

        let claims = signer.verify(&token)?;
        assert_eq!(claims.iss, SESSION_ISSUER);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.provider, "local");
        assert!(unix_from_rfc3339(&claims.exp)? > Utc::now().timestamp());
        Ok(())
    }

    #[test]
    fn issued_tokens_carry_unique_jti() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let user = user();
        let first = signer.verify(&signer.issue(&user)?)?;
        let second = signer.verify(&signer.issue(&user)?)?;
        assert_ne!(first.jti, second.jti);
        Ok(())
    }

    #[test]
    fn verify_rejects_tampered_token() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let token = signer.issue(&user())?;

        let mut chars: Vec<char> = token.chars().collect();
        let idx = chars.len() - 5;
        chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert!(signer.verify(&tampered).is_err());
        Ok(())
    }

    #[test]
    fn verify_rejects_token_from_other_key() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let other = SessionSigner::generate(TTL)?;
        let token = other.issue(&user())?;
        assert_eq!(signer.verify(&token), Err(Error::InvalidSignature));
        Ok(())
    }

    #[test]
    fn verify_rejects_expired_token() -> Result<(), Error> {
        let signer = SessionSigner::generate(Duration::ZERO)?;
        let token = signer.issue(&user())?;
        assert_eq!(signer.verify(&token), Err(Error::Expired));
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_audience() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let mut paserk = String::new();
        signer
            .secret
            .fmt(&mut paserk)
            .map_err(|_| Error::InvalidKey)?;
        let token = signer.issue(&user())?;

        let strict =
            SessionSigner::from_paserk(&paserk, TTL)?.with_audience("admin-console".to_string());
        assert_eq!(strict.verify(&token), Err(Error::InvalidAudience));
        Ok(())
    }

    #[test]
    fn from_paserk_round_trips_generated_key() -> Result<(), Error> {
        let signer = SessionSigner::generate(TTL)?;
        let mut paserk = String::new();
        signer
            .secret
            .fmt(&mut paserk)
            .map_err(|_| Error::InvalidKey)?;
        assert!(paserk.starts_with("k4.secret."));

        let restored = SessionSigner::from_paserk(&paserk, TTL)?;
        assert_eq!(restored.key_id()?, signer.key_id()?);

        let token = signer.issue(&user())?;
        let claims = restored.verify(&token)?;
        assert_eq!(claims.email, "alice@example.com");
        Ok(())
    }

    #[test]
    fn from_paserk_rejects_garbage() {
        assert!(SessionSigner::from_paserk("k4.secret.not-base64!", TTL).is_err());
        assert!(SessionSigner::from_paserk("v4.public.token", TTL).is_err());
    }

    #[tokio::test]
    async fn denylist_revokes_until_expiry() {
        let denylist = Denylist::new();
        let exp = Utc::now().timestamp() + 60;
        denylist.revoke("jti-1", exp).await;
        assert!(denylist.is_revoked("jti-1").await);
        assert!(!denylist.is_revoked("jti-2").await);
    }

    #[tokio::test]
    async fn denylist_drops_expired_revocations() {
        let denylist = Denylist::new();
        denylist.revoke("jti-old", Utc::now().timestamp() - 1).await;
        assert!(!denylist.is_revoked("jti-old").await);
    }
}
