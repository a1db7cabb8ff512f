//! Federated login endpoints (Google OAuth).
//!
//! The callback is a browser navigation, so failures redirect to the
//! storefront's login page with an `error` query instead of returning JSON.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::error_response;
use super::session::issue_session;
use super::state::AuthState;
use super::utils::normalize_email;
use crate::google::GoogleIdentity;
use crate::store::{Provider, UserRecord};

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/federated",
    responses(
        (status = 307, description = "Redirect to the provider authorization endpoint, or to the login page when federated login is not configured")
    ),
    tag = "auth"
)]
pub async fn federated(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Browser navigation: an unconfigured provider sends the user back to the
    // login page rather than answering with JSON.
    let Some(google) = auth_state.google() else {
        return error_redirect(&auth_state, "not_configured");
    };
    Redirect::temporary(&google.authorization_url()).into_response()
}

#[utoipa::path(
    get,
    path = "/auth/federated/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code from the provider")
    ),
    responses(
        (status = 200, description = "HTML page that notifies the opener and sets the session cookie"),
        (status = 307, description = "Redirect to the login page with an error query"),
        (status = 404, description = "Federated login is not configured")
    ),
    tag = "auth"
)]
pub async fn callback(
    auth_state: Extension<Arc<AuthState>>,
    query: Query<CallbackQuery>,
) -> impl IntoResponse {
    let Some(google) = auth_state.google() else {
        return error_response(StatusCode::NOT_FOUND, "Federated login is not configured");
    };
    let Some(code) = query.0.code.filter(|code| !code.trim().is_empty()) else {
        return error_redirect(&auth_state, "missing_code");
    };

    let exchange = match google.exchange_code(&code).await {
        Ok(exchange) => exchange,
        Err(err) => {
            error!("Failed to exchange authorization code: {err}");
            return error_redirect(&auth_state, "token_exchange_failed");
        }
    };
    let identity = match google.identity(&exchange).await {
        Ok(identity) => identity,
        Err(err) => {
            error!("Failed to resolve federated identity: {err}");
            return error_redirect(&auth_state, "token_exchange_failed");
        }
    };

    let email_normalized = normalize_email(&identity.email);
    let outcome = auth_state
        .store()
        .mutate(move |records| upsert_google_user(records, &identity, &email_normalized))
        .await;
    let user = match outcome {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to update user store: {err}");
            return error_redirect(&auth_state, "callback_failed");
        }
    };

    info!(user = %user.id, "Federated login");
    match issue_session(&auth_state, &user) {
        Ok((headers, _token)) => {
            let page = success_page(auth_state.config().public_base_url());
            (StatusCode::OK, headers, Html(page)).into_response()
        }
        Err((_status, _message)) => error_redirect(&auth_state, "callback_failed"),
    }
}

/// Link or create the record for a verified Google identity.
///
/// An existing record keeps its provider tag and password; only linkage fields
/// and the login timestamp change. New accounts are created with an empty
/// password hash, so password login stays unavailable until one is set.
fn upsert_google_user(
    records: &mut Vec<UserRecord>,
    identity: &GoogleIdentity,
    email_normalized: &str,
) -> UserRecord {
    let now = Utc::now();
    if let Some(record) = records
        .iter_mut()
        .find(|record| record.matches_email(email_normalized))
    {
        record.google_id = Some(identity.sub.clone());
        if identity.picture.is_some() {
            record.avatar_url = identity.picture.clone();
        }
        record.last_login = Some(now);
        return record.clone();
    }

    let record = UserRecord {
        id: Uuid::new_v4(),
        username: email_normalized.to_string(),
        email: email_normalized.to_string(),
        phone: None,
        password_hash: String::new(),
        name: identity
            .name
            .clone()
            .unwrap_or_else(|| email_normalized.to_string()),
        street: None,
        city: None,
        state: None,
        zipcode: None,
        google_id: Some(identity.sub.clone()),
        avatar_url: identity.picture.clone(),
        provider: Provider::Google,
        created_at: now,
        last_login: Some(now),
    };
    records.push(record.clone());
    record
}

fn error_redirect(auth_state: &AuthState, reason: &str) -> Response {
    let base = auth_state.config().public_base_url().trim_end_matches('/');
    Redirect::temporary(&format!("{base}/login?error={reason}")).into_response()
}

/// Page served to the popup/tab that completed the provider flow. Popup flows
/// notify the opener and close; top-level flows go back to the storefront.
fn success_page(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Signing in</title></head>
  <body>
    <p>Login successful! You can close this window.</p>
    <script>
      if (window.opener) {{
        window.opener.postMessage("google-auth-success", window.origin);
        window.close();
      }} else {{
        window.location.href = "{base}/";
      }}
    </script>
  </body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::google::GoogleAuth;
    use crate::otp::{LogCodeSender, OtpCache};
    use crate::store::UserStore;
    use crate::token::SessionSigner;
    use axum::http::header::LOCATION;
    use std::time::Duration;

    fn test_state(dir: &tempfile::TempDir, google: Option<GoogleAuth>) -> Arc<AuthState> {
        let config = AuthConfig::new("http://localhost:3005".to_string());
        let signer = SessionSigner::generate(Duration::from_secs(3600)).expect("signer");
        Arc::new(AuthState::new(
            config,
            UserStore::new(dir.path().join("users.json")),
            Arc::new(OtpCache::new(Duration::from_secs(300))),
            signer,
            Arc::new(LogCodeSender),
            google,
        ))
    }

    fn google_auth() -> GoogleAuth {
        GoogleAuth::new(
            "client-id-123".to_string(),
            "client-secret".to_string().into(),
            "http://localhost:8080/auth/federated/callback".to_string(),
        )
        .expect("google auth")
    }

    fn identity(sub: &str, email: &str) -> GoogleIdentity {
        GoogleIdentity {
            sub: sub.to_string(),
            email: email.to_string(),
            name: Some("Alice".to_string()),
            picture: Some("https://lh3.example.com/alice.png".to_string()),
        }
    }

    #[tokio::test]
    async fn federated_without_config_redirects_to_login_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir, None);
        let response = federated(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location");
        assert_eq!(location, "http://localhost:3005/login?error=not_configured");
    }

    #[tokio::test]
    async fn federated_redirects_to_provider() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir, Some(google_auth()));
        let response = federated(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location");
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(location.contains("client_id=client-id-123"));
    }

    #[tokio::test]
    async fn callback_without_code_redirects_to_login_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir, Some(google_auth()));
        let response = callback(Extension(state), Query(CallbackQuery { code: None }))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location");
        assert_eq!(location, "http://localhost:3005/login?error=missing_code");
    }

    #[test]
    fn upsert_creates_google_account_for_new_email() {
        let mut records = Vec::new();
        let user = upsert_google_user(&mut records, &identity("sub-1", "alice@example.com"), "alice@example.com");
        assert_eq!(records.len(), 1);
        assert_eq!(user.provider, Provider::Google);
        assert!(user.password_hash.is_empty());
        assert_eq!(user.google_id.as_deref(), Some("sub-1"));
        assert!(user.last_login.is_some());
    }

    #[test]
    fn upsert_links_existing_local_account() {
        let mut records = vec![UserRecord {
            username: "alice".to_string(),
            email: "Alice@Example.com".to_string(),
            name: "Alice".to_string(),
            password_hash: "$argon2id$existing".to_string(),
            ..UserRecord::default()
        }];
        let user = upsert_google_user(&mut records, &identity("sub-1", "alice@example.com"), "alice@example.com");
        assert_eq!(records.len(), 1);
        // Linkage only: provider and password stay untouched.
        assert_eq!(user.provider, Provider::Local);
        assert_eq!(user.password_hash, "$argon2id$existing");
        assert_eq!(user.google_id.as_deref(), Some("sub-1"));
        assert_eq!(
            user.avatar_url.as_deref(),
            Some("https://lh3.example.com/alice.png")
        );
    }

    #[test]
    fn success_page_notifies_opener() {
        let page = success_page("http://localhost:3005/");
        assert!(page.contains("postMessage(\"google-auth-success\""));
        assert!(page.contains("window.location.href = \"http://localhost:3005/\""));
    }
}
