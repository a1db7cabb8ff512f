//! One-time code endpoints.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error_response;
use super::session::issue_session;
use super::state::AuthState;
use super::types::{ErrorBody, OtpRequest, OtpRequestResponse, OtpVerifyRequest, TokenResponse};
use super::utils::normalize_identifier;
use crate::otp::{CodeDelivery, VerifyOutcome};
use crate::store::{UserRecord, find_by_identifier};

const MIN_IDENTIFIER_CHARS: usize = 3;

#[utoipa::path(
    post,
    path = "/auth/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code generated and queued for delivery", body = OtpRequestResponse),
        (status = 400, description = "Identifier too short", body = ErrorBody),
        (status = 404, description = "Unknown identifier", body = ErrorBody),
        (status = 500, description = "Storage or delivery failure", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn request_code(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpRequest>>,
) -> impl IntoResponse {
    let request: OtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let identifier = request.identifier.unwrap_or_default();
    if identifier.trim().chars().count() < MIN_IDENTIFIER_CHARS {
        return error_response(StatusCode::BAD_REQUEST, "Invalid identifier");
    }
    let normalized = normalize_identifier(&identifier);

    let user = match lookup_user(&auth_state, &normalized).await {
        Ok(user) => user,
        Err((status, message)) => return error_response(status, &message),
    };

    let code = auth_state.otp().issue(&normalized).await;
    let delivery = CodeDelivery {
        email: user.email.clone(),
        code,
        expires_in: auth_state.otp().ttl(),
    };
    if let Err(err) = auth_state.code_sender().send(&delivery) {
        error!("Failed to deliver one-time code: {err}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send code. Please try again.",
        );
    }

    info!(user = %user.id, "One-time code requested");
    let response = OtpRequestResponse {
        success: true,
        expires_in_sec: auth_state.otp().ttl().as_secs(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Code accepted", body = TokenResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Expired or invalid code", body = ErrorBody),
        (status = 404, description = "Unknown identifier or no code requested", body = ErrorBody),
        (status = 500, description = "Storage or signing failure", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_code(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> impl IntoResponse {
    let request: OtpVerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let (identifier, code) = match (request.identifier, request.code) {
        (Some(identifier), Some(code))
            if !identifier.trim().is_empty() && !code.trim().is_empty() =>
        {
            (identifier, code.trim().to_string())
        }
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Identifier and code are required");
        }
    };
    let normalized = normalize_identifier(&identifier);

    // Even the master code only works for identifiers that resolve to a user.
    let user = match lookup_user(&auth_state, &normalized).await {
        Ok(user) => user,
        Err((status, message)) => return error_response(status, &message),
    };

    if auth_state.config().master_code_matches(&code) {
        info!(user = %user.id, "Master code login");
        return conclude(&auth_state, &user).await;
    }

    match auth_state.otp().verify(&normalized, &code).await {
        VerifyOutcome::NotRequested => {
            error_response(StatusCode::NOT_FOUND, "No code requested for this identifier")
        }
        VerifyOutcome::Expired => error_response(
            StatusCode::UNAUTHORIZED,
            "OTP code expired. Please request a new one.",
        ),
        VerifyOutcome::Mismatch => {
            debug!(user = %user.id, "One-time code mismatch");
            error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid OTP code. Please try again.",
            )
        }
        VerifyOutcome::Verified => {
            info!(user = %user.id, "One-time code login");
            conclude(&auth_state, &user).await
        }
    }
}

async fn lookup_user(
    auth_state: &AuthState,
    normalized: &str,
) -> Result<UserRecord, (StatusCode, String)> {
    let users = match auth_state.store().read_all().await {
        Ok(users) => users,
        Err(err) => {
            error!("Failed to read user store: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "User storage is unavailable. Please try again later.".to_string(),
            ));
        }
    };
    find_by_identifier(&users, normalized).cloned().ok_or((
        StatusCode::NOT_FOUND,
        "User not found. Please register first.".to_string(),
    ))
}

async fn conclude(auth_state: &AuthState, user: &UserRecord) -> axum::response::Response {
    if let Err(err) = auth_state.store().touch_last_login(user.id).await {
        warn!("Failed to record login time: {err}");
    }
    match issue_session(auth_state, user) {
        Ok((headers, token)) => {
            (StatusCode::OK, headers, Json(TokenResponse { token })).into_response()
        }
        Err((status, message)) => error_response(status, &message),
    }
}
