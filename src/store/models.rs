//! User records persisted in the JSON user table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity provider that owns the credential for a record.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Local,
    Google,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
        }
    }
}

/// A single row of the user table.
///
/// Records written by older tooling may lack most of these fields; serde
/// defaults keep such files loadable. The `password` alias accepts the legacy
/// key for the stored hash. `password_hash` is empty for federated-only
/// accounts that have never set a password.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, alias = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// Matches the serde defaults applied when loading sparse legacy rows: a
/// fresh id, creation stamped now, everything else empty.
impl Default for UserRecord {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            username: String::new(),
            email: String::new(),
            phone: None,
            password_hash: String::new(),
            name: String::new(),
            street: None,
            city: None,
            state: None,
            zipcode: None,
            google_id: None,
            avatar_url: None,
            provider: Provider::default(),
            created_at: Utc::now(),
            last_login: None,
        }
    }
}

impl UserRecord {
    /// True when `identifier` (already trimmed and lowercased) locates this
    /// record by username, email, or phone.
    #[must_use]
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        if identifier.is_empty() {
            return false;
        }
        self.username.to_lowercase() == identifier
            || self.email.to_lowercase() == identifier
            || self
                .phone
                .as_deref()
                .is_some_and(|phone| phone.trim().to_lowercase() == identifier)
    }

    /// True when `email` (already normalized) matches this record's email.
    #[must_use]
    pub fn matches_email(&self, email: &str) -> bool {
        !email.is_empty() && self.email.to_lowercase() == email
    }
}

#[cfg(test)]
mod tests {
    use super::{Provider, UserRecord};
    use anyhow::Result;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(username: &str, email: &str, phone: Option<&str>) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            password_hash: String::new(),
            name: String::new(),
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
    fn matches_identifier_by_username_email_or_phone() {
        let user = record("Alice", "Alice@Example.com", Some("555-0100"));
        assert!(user.matches_identifier("alice"));
        assert!(user.matches_identifier("alice@example.com"));
        assert!(user.matches_identifier("555-0100"));
        assert!(!user.matches_identifier("bob"));
        assert!(!user.matches_identifier(""));
    }

    #[test]
    fn provider_serializes_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_value(Provider::Local)?, "local");
        assert_eq!(serde_json::to_value(Provider::Google)?, "google");
        let decoded: Provider = serde_json::from_str("\"google\"")?;
        assert_eq!(decoded, Provider::Google);
        Ok(())
    }

    #[test]
    fn legacy_record_deserializes_with_defaults() -> Result<()> {
        // Shape written by the earliest registration tooling.
        let raw = r#"{"username": "bob", "password": "$2a$10$legacy"}"#;
        let user: UserRecord = serde_json::from_str(raw)?;
        assert_eq!(user.username, "bob");
        assert_eq!(user.password_hash, "$2a$10$legacy");
        assert_eq!(user.provider, Provider::Local);
        assert!(user.email.is_empty());
        assert!(user.last_login.is_none());
        Ok(())
    }

    #[test]
    fn record_round_trips_camel_case() -> Result<()> {
        let mut user = record("carol", "carol@example.com", None);
        user.password_hash = "hash".to_string();
        user.google_id = Some("sub-123".to_string());
        let value = serde_json::to_value(&user)?;
        assert!(value.get("passwordHash").is_some());
        assert!(value.get("googleId").is_some());
        assert!(value.get("createdAt").is_some());
        // Optional fields stay out of the file until set.
        assert!(value.get("phone").is_none());
        let decoded: UserRecord = serde_json::from_value(value)?;
        assert_eq!(decoded, user);
        Ok(())
    }
}
