//! Small helpers for identifier and email normalization.

use regex::Regex;

/// Normalize a login identifier (username, email, or phone) for lookups and
/// one-time code cache keys.
pub(super) fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}
