//! Password login endpoint.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error_response;
use super::password::verify_password;
use super::session::issue_session;
use super::state::AuthState;
use super::types::{ErrorBody, LoginRequest, TokenResponse};
use super::utils::normalize_identifier;
use crate::store::{UserRecord, find_by_identifier};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Incorrect password", body = ErrorBody),
        (status = 404, description = "Unknown identifier", body = ErrorBody),
        (status = 500, description = "Storage or signing failure", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let (identifier, password) = match (request.identifier, request.password) {
        (Some(identifier), Some(password))
            if !identifier.trim().is_empty() && !password.is_empty() =>
        {
            (identifier, password)
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Identifier and password are required",
            );
        }
    };

    // Operational short-circuit: the configured administrator pair never
    // touches the user store.
    if auth_state.config().admin_matches(&identifier, &password) {
        warn!("Administrator bypass login");
        return match issue_session(&auth_state, &admin_record(&identifier)) {
            Ok((headers, token)) => {
                (StatusCode::OK, headers, Json(TokenResponse { token })).into_response()
            }
            Err((status, message)) => error_response(status, &message),
        };
    }

    let users = match auth_state.store().read_all().await {
        Ok(users) => users,
        Err(err) => {
            error!("Failed to read user store: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "User storage is unavailable. Please try again later.",
            );
        }
    };

    let normalized = normalize_identifier(&identifier);
    let Some(user) = find_by_identifier(&users, &normalized) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "User not found. Please check your identifier or register.",
        );
    };

    if !verify_password(&password, &user.password_hash) {
        debug!(user = %user.id, "Password mismatch");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Incorrect password. Please try again.",
        );
    }

    info!(user = %user.id, "Password login");
    if let Err(err) = auth_state.store().touch_last_login(user.id).await {
        warn!("Failed to record login time: {err}");
    }
    match issue_session(&auth_state, user) {
        Ok((headers, token)) => {
            (StatusCode::OK, headers, Json(TokenResponse { token })).into_response()
        }
        Err((status, message)) => error_response(status, &message),
    }
}

/// Synthetic record backing the administrator bypass. The nil id marks tokens
/// issued outside the user store.
fn admin_record(identifier: &str) -> UserRecord {
    UserRecord {
        id: Uuid::nil(),
        username: identifier.to_string(),
        email: identifier.to_string(),
        name: identifier.to_string(),
        ..UserRecord::default()
    }
}
