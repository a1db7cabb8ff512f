use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::Error;

const CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const CERTS_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Find a key by `kid` (Key ID).
    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// Build a JWK from an `RsaPublicKey`.
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        let n = Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be());
        let e = Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be());
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n,
            e,
        }
    }

    /// Convert this JWK to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base64url values cannot be decoded or the RSA
    /// key is invalid.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, Error> {
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| Error::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| Error::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        RsaPublicKey::new(n, e).map_err(Error::Rsa)
    }
}

/// Cache of Google's signing keys with periodic refresh and stale fallback.
///
/// Keys rotate on Google's schedule, so verification retries a refresh when a
/// token names an unknown `kid`. When the certs endpoint is unreachable the
/// last good set is used rather than failing every login.
#[derive(Debug, Clone)]
pub struct KeyCache {
    client: reqwest::Client,
    certs_url: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    jwks: Jwks,
    fetched_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < Duration::from_secs(CERTS_CACHE_TTL_SECONDS)
    }
}

impl KeyCache {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            certs_url: CERTS_URL.to_string(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Return the cached key set, refreshing if stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails and no cached keys exist.
    pub async fn jwks(&self) -> Result<Jwks, Error> {
        let cached = { self.cache.read().await.clone() };
        if let Some(cache) = &cached {
            if cache.is_fresh() {
                return Ok(cache.jwks.clone());
            }
        }

        match self.refresh().await {
            Ok(jwks) => Ok(jwks),
            Err(err) => {
                if let Some(cache) = cached {
                    warn!(error = %err, "using stale google certs cache");
                    Ok(cache.jwks)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Fetch the key set from the certs endpoint and update the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or decode fails.
    pub async fn refresh(&self) -> Result<Jwks, Error> {
        let jwks: Jwks = self
            .client
            .get(&self.certs_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(keys = jwks.keys.len(), "google certs cache refreshed");

        let mut state = self.cache.write().await;
        *state = Some(CachedKeys {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }
}
