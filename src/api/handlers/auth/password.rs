//! Password hashing for local accounts.
//!
//! Passwords are stored as Argon2id PHC strings with a per-password random
//! salt. Verification parses the stored string, so parameter upgrades only
//! affect newly hashed passwords.

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;

fn argon2() -> Argon2<'static> {
    Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::default(),
    )
}

/// Hash a password for storage. Returns a PHC-formatted string.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash password"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// Unparseable stored hashes never match; records imported without a password
/// (federated accounts) carry an empty hash and fail here.
pub(super) fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    argon2()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("correct horse battery stable", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("hunter22").expect("hash");
        let second = hash_password("hunter22").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn empty_stored_hash_never_matches() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn garbage_stored_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
