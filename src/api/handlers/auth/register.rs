//! Registration endpoint.
//!
//! Uniqueness is checked inside the store's single-writer critical section, so
//! two concurrent registrations for the same email cannot both pass the check
//! and produce duplicate rows.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::error_response;
use super::password::hash_password;
use super::session::issue_session;
use super::state::AuthState;
use super::types::{ErrorBody, RegisterRequest, RegisterResponse, RegisteredUser};
use super::utils::{normalize_email, valid_email};
use crate::store::{Provider, UserRecord};

const MIN_PASSWORD_CHARS: usize = 6;

enum RegisterOutcome {
    Created(UserRecord),
    DuplicateEmail,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered and logged in", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Storage or signing failure", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let (name, email, password) = match (request.name, request.email, request.password) {
        (Some(name), Some(email), Some(password))
            if !name.trim().is_empty() && !email.trim().is_empty() && !password.is_empty() =>
        {
            (name.trim().to_string(), email, password)
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Name, email, and password are required",
            );
        }
    };

    let email_normalized = normalize_email(&email);
    if !valid_email(&email_normalized) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email");
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters",
        );
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed. Please try again.",
            );
        }
    };

    let record = UserRecord {
        id: Uuid::new_v4(),
        username: email_normalized.clone(),
        email: email_normalized.clone(),
        phone: clean(request.phone),
        password_hash,
        name,
        street: clean(request.street),
        city: clean(request.city),
        state: clean(request.state),
        zipcode: clean(request.zipcode),
        google_id: None,
        avatar_url: None,
        provider: Provider::Local,
        created_at: Utc::now(),
        last_login: None,
    };

    let outcome = auth_state
        .store()
        .mutate(move |records| {
            if records
                .iter()
                .any(|existing| existing.matches_email(&email_normalized))
            {
                RegisterOutcome::DuplicateEmail
            } else {
                records.push(record.clone());
                RegisterOutcome::Created(record)
            }
        })
        .await;

    let user = match outcome {
        Ok(RegisterOutcome::Created(user)) => user,
        Ok(RegisterOutcome::DuplicateEmail) => {
            return error_response(StatusCode::CONFLICT, "Email already registered");
        }
        Err(err) => {
            error!("Failed to update user store: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "User storage is unavailable. Please try again later.",
            );
        }
    };

    info!(user = %user.id, "Registered user");
    match issue_session(&auth_state, &user) {
        Ok((headers, token)) => {
            let response = RegisterResponse {
                success: true,
                token,
                user: RegisteredUser {
                    name: user.name,
                    email: user.email,
                },
            };
            (StatusCode::OK, headers, Json(response)).into_response()
        }
        Err((status, message)) => error_response(status, &message),
    }
}

fn clean(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
