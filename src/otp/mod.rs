//! One-time passcode issuance, verification, and delivery abstractions.
//!
//! The `/auth/otp/request` flow generates a six-digit code, caches it in
//! memory keyed by the normalized identifier, and hands it to a `CodeSender`.
//! The sender decides how to deliver (email, SMS, etc.) and returns
//! `Ok`/`Err`. `/auth/otp/verify` then consumes the cached entry.
//!
//! Codes are strictly single-use: a successful match removes the entry, and
//! issuing a new code for the same identifier replaces any earlier one.
//! Expired entries are dropped lazily on access, on every insert, and by a
//! background sweeper so the cache cannot grow with abandoned requests.
//!
//! The default sender for local dev is `LogCodeSender`, which logs the code
//! and returns `Ok(())`.

use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

pub const DEFAULT_OTP_TTL_SECONDS: u64 = 5 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

struct OtpEntry {
    code: String,
    expires_at: Instant,
}

/// Outcome of checking a submitted code against the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No code on file for this identifier.
    NotRequested,
    /// A code was on file but its TTL had elapsed; the entry is gone.
    Expired,
    /// A live code was on file but did not match; the entry is retained.
    Mismatch,
    /// The code matched and the entry was consumed.
    Verified,
}

/// In-memory cache of pending passcodes, one per identifier.
pub struct OtpCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, OtpEntry>>,
}

impl OtpCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate and cache a fresh code for the identifier, replacing any
    /// earlier one. Expired entries for other identifiers are dropped on the
    /// way in.
    pub async fn issue(&self, identifier: &str) -> String {
        let code = generate_code();
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            identifier.to_string(),
            OtpEntry {
                code: code.clone(),
                expires_at: now + self.ttl,
            },
        );
        code
    }

    /// Check a submitted code. A match consumes the entry; an expired entry
    /// is removed even on failure so it cannot be retried, while a mismatch
    /// keeps the live entry in place.
    pub async fn verify(&self, identifier: &str, code: &str) -> VerifyOutcome {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(identifier) else {
            return VerifyOutcome::NotRequested;
        };

        if Instant::now() >= entry.expires_at {
            entries.remove(identifier);
            return VerifyOutcome::Expired;
        }
        if entry.code != code {
            return VerifyOutcome::Mismatch;
        }

        entries.remove(identifier);
        VerifyOutcome::Verified
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    #[cfg(test)]
    async fn insert_with_expiry(&self, identifier: &str, code: &str, expires_at: Instant) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            identifier.to_string(),
            OtpEntry {
                code: code.to_string(),
                expires_at,
            },
        );
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Passcode ready for delivery to the account's contact address.
#[derive(Clone, Debug)]
pub struct CodeDelivery {
    pub email: String,
    pub code: String,
    pub expires_in: Duration,
}

/// Passcode delivery abstraction used by the request flow.
pub trait CodeSender: Send + Sync {
    /// Deliver a code or return an error to fail the request.
    fn send(&self, delivery: &CodeDelivery) -> Result<()>;
}

/// Local dev sender that logs the code instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogCodeSender;

impl CodeSender for LogCodeSender {
    fn send(&self, delivery: &CodeDelivery) -> Result<()> {
        info!(
            email = %delivery.email,
            code = %delivery.code,
            expires_in_seconds = delivery.expires_in.as_secs(),
            "otp delivery stub"
        );
        Ok(())
    }
}

/// Spawn a background task that periodically drops expired codes.
pub fn spawn_sweeper(cache: Arc<OtpCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    let interval = if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    };

    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let swept = cache.sweep().await;
            if swept > 0 {
                debug!(swept, "dropped expired otp codes");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{OtpCache, VerifyOutcome, DEFAULT_OTP_TTL_SECONDS};
    use std::time::{Duration, Instant};

    fn cache() -> OtpCache {
        OtpCache::new(Duration::from_secs(DEFAULT_OTP_TTL_SECONDS))
    }

    #[tokio::test]
    async fn issue_returns_six_digit_code() {
        let cache = cache();
        let code = cache.issue("alice@example.com").await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            cache.verify("alice@example.com", &code).await,
            VerifyOutcome::Verified
        );
    }

    #[tokio::test]
    async fn verify_unknown_identifier_is_not_requested() {
        let cache = cache();
        assert_eq!(
            cache.verify("nobody@example.com", "123456").await,
            VerifyOutcome::NotRequested
        );
    }

    #[tokio::test]
    async fn verified_code_is_single_use() {
        let cache = cache();
        let code = cache.issue("alice@example.com").await;
        assert_eq!(
            cache.verify("alice@example.com", &code).await,
            VerifyOutcome::Verified
        );
        assert_eq!(
            cache.verify("alice@example.com", &code).await,
            VerifyOutcome::NotRequested
        );
    }

    #[tokio::test]
    async fn mismatch_keeps_entry_alive() {
        let cache = cache();
        let code = cache.issue("alice@example.com").await;
        let wrong = if code == "123456" { "654321" } else { "123456" };

        assert_eq!(
            cache.verify("alice@example.com", wrong).await,
            VerifyOutcome::Mismatch
        );
        assert_eq!(
            cache.verify("alice@example.com", &code).await,
            VerifyOutcome::Verified
        );
    }

    #[tokio::test]
    async fn reissue_replaces_previous_code() {
        let cache = cache();
        let first = cache.issue("alice@example.com").await;
        let second = loop {
            // Codes are random; retry until the replacement differs.
            let code = cache.issue("alice@example.com").await;
            if code != first {
                break code;
            }
        };

        assert_eq!(
            cache.verify("alice@example.com", &first).await,
            VerifyOutcome::Mismatch
        );
        assert_eq!(
            cache.verify("alice@example.com", &second).await,
            VerifyOutcome::Verified
        );
    }

    #[tokio::test]
    async fn expired_entry_is_removed_on_verify() {
        let cache = cache();
        cache
            .insert_with_expiry("alice@example.com", "123456", Instant::now())
            .await;

        assert_eq!(
            cache.verify("alice@example.com", "123456").await,
            VerifyOutcome::Expired
        );
        assert_eq!(
            cache.verify("alice@example.com", "123456").await,
            VerifyOutcome::NotRequested
        );
    }

    #[tokio::test]
    async fn sweep_drops_only_expired_entries() {
        let cache = cache();
        cache
            .insert_with_expiry("stale@example.com", "123456", Instant::now())
            .await;
        let live = cache.issue("alice@example.com").await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(
            cache.verify("alice@example.com", &live).await,
            VerifyOutcome::Verified
        );
    }
}
