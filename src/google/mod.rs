//! Federated login against Google OAuth 2.0.
//!
//! The browser is redirected to Google's consent screen, comes back to the
//! callback with an authorization code, and the code is exchanged server-side
//! for tokens. The identity handed back to the rest of the service is taken
//! from the `id_token` only after its RS256 signature has been checked against
//! Google's published keys; an exchange response without a usable assertion
//! falls back to the TLS-authenticated userinfo endpoint. Unverifiable
//! assertions abort the flow.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use rsa::errors::Error as RsaError;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

mod jwks;

pub use jwks::{Jwk, Jwks, KeyCache};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const OAUTH_SCOPE: &str = "openid email profile";

// Google signs with either issuer form depending on the client.
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("google identity missing email")]
    MissingEmail,
    #[error("google account email is not verified")]
    UnverifiedEmail,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct IdTokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
    kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Tokens returned by the authorization-code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Verified identity of the Google account holder.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// OAuth client for Google federated login, with cached signing keys.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    auth_endpoint: Url,
    client: reqwest::Client,
    certs: KeyCache,
}

impl GoogleAuth {
    /// Build the OAuth client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_url: String,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
            auth_endpoint: Url::parse(AUTH_ENDPOINT)?,
            certs: KeyCache::new(client.clone()),
            client,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// URL of Google's consent screen for this client.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        let mut url = self.auth_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", OAUTH_SCOPE)
            .append_pair("prompt", "select_account")
            .append_pair("access_type", "offline");
        url.to_string()
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token endpoint rejects
    /// the code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchange, Error> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.client.post(TOKEN_ENDPOINT).form(&params).send().await?;
        if !response.status().is_success() {
            return Err(Error::Exchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Resolve the verified identity behind an exchange response.
    ///
    /// # Errors
    ///
    /// Returns an error if the `id_token` fails verification, the userinfo
    /// fallback fails, or the account has no verified email.
    pub async fn identity(&self, exchange: &TokenExchange) -> Result<GoogleIdentity, Error> {
        if let Some(id_token) = &exchange.id_token {
            let claims = self.verify(id_token).await?;
            return build_identity(
                claims.sub,
                claims.email,
                claims.email_verified,
                claims.name,
                claims.picture,
            );
        }

        let info: UserInfo = self
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&exchange.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        build_identity(
            info.sub,
            info.email,
            info.email_verified,
            info.name,
            info.picture,
        )
    }

    async fn verify(&self, id_token: &str) -> Result<IdTokenClaims, Error> {
        let now = Utc::now().timestamp();
        let jwks = self.certs.jwks().await?;
        match verify_id_token(id_token, &jwks, &self.client_id, now) {
            Err(Error::UnknownKid(_)) => {
                // Key rotation: refetch the certs once and retry.
                let jwks = self.certs.refresh().await?;
                verify_id_token(id_token, &jwks, &self.client_id, now)
            }
            other => other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

fn build_identity(
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
) -> Result<GoogleIdentity, Error> {
    let email = email.ok_or(Error::MissingEmail)?;
    if email_verified == Some(false) {
        return Err(Error::UnverifiedEmail);
    }
    Ok(GoogleIdentity {
        sub,
        email,
        name,
        picture,
    })
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Verify an RS256 Google `id_token` and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the `kid` is unknown for the provided JWKS,
/// - the signature is invalid,
/// - the claims fail validation (`iss`, `aud`, `exp`).
pub fn verify_id_token(
    token: &str,
    jwks: &Jwks,
    expected_audience: &str,
    now_unix_seconds: i64,
) -> Result<IdTokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: IdTokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let jwk = jwks
        .find_by_kid(&header.kid)
        .ok_or_else(|| Error::UnknownKid(header.kid.clone()))?;

    let public_key = jwk.to_rsa_public_key()?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: IdTokenClaims = b64d_json(claims_b64)?;
    if !ISSUERS.contains(&claims.iss.as_str()) {
        return Err(Error::InvalidIssuer);
    }
    if claims.aud != expected_audience {
        return Err(Error::InvalidAudience);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}
