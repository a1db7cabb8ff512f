//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    state::AuthState,
    types::{LogoutResponse, SessionResponse, SessionUser},
};
use crate::store::UserRecord;
use crate::token::{SessionClaims, unix_from_rfc3339};

const SESSION_COOKIE_NAME: &str = "auth-token";

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Missing or invalid tokens are treated as "no session" to avoid leaking
    // why a given credential was rejected.
    let Some(claims) = authenticate_session(&headers, &auth_state).await else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let response = SessionResponse {
        user: SessionUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            provider: claims.provider,
        },
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Resolve the request's session token into verified claims, if present.
///
/// Returns `None` when the token is missing, unverifiable, or revoked.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Option<SessionClaims> {
    let token = extract_session_token(headers)?;
    let claims = match auth_state.signer().verify(&token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("Rejected session token: {err}");
            return None;
        }
    };
    if auth_state.denylist().is_revoked(&claims.jti).await {
        debug!("Rejected revoked session token");
        return None;
    }
    Some(claims)
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = LogoutResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Revoke the presented token so it cannot be replayed until expiry.
    if let Some(token) = extract_session_token(&headers) {
        if let Ok(claims) = auth_state.signer().verify(&token) {
            if let Ok(exp_unix) = unix_from_rfc3339(&claims.exp) {
                auth_state.denylist().revoke(&claims.jti, exp_unix).await;
            }
        }
    }

    // Always clear the cookie, even when no valid token was presented.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    let response = LogoutResponse {
        message: "Logged out successfully".to_string(),
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}

/// Sign a token for `user` and build the matching `Set-Cookie` header.
///
/// Shared by every handler that concludes with an authenticated session.
pub(super) fn issue_session(
    auth_state: &AuthState,
    user: &UserRecord,
) -> Result<(HeaderMap, String), (StatusCode, String)> {
    let token = match auth_state.signer().issue(user) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to sign session token: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to establish session. Please try again.".to_string(),
            ));
        }
    };
    let mut headers = HeaderMap::new();
    match session_cookie(auth_state, &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to establish session. Please try again.".to_string(),
            ));
        }
    }
    Ok((headers, token))
}

/// Build the session cookie for a freshly issued token.
///
/// The cookie is intentionally not `HttpOnly`: the browser client mirrors it
/// into memory on load to decide whether a session exists.
pub(super) fn session_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    // Only mark cookies secure when the storefront is served over HTTPS.
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; SameSite=Strict; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(
    auth_config: &super::state::AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; SameSite=Strict; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        // Pairs without `=` are skipped rather than ending the scan.
        let (name, token) = pair.trim().split_once('=')?;
        if name.trim() != SESSION_COOKIE_NAME {
            return None;
        }
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
