//! Registration and account-confirmation endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::session::require_auth;
use super::state::AuthState;
use super::types::{ConfirmRequest, RegisterRequest, RegisterResponse};
use super::{error_response, valid_email, valid_password, valid_username};
use crate::identity::ConfirmOutcome;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; confirmation email queued", body = RegisterResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email or username already taken", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    let username = request.username.trim();
    if !valid_username(username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }
    if !valid_password(&request.password) {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    match state
        .workflow()
        .register(&email, username, &request.password)
        .await
    {
        Ok(user) => {
            let response = RegisterResponse {
                user_id: user.id.to_string(),
                message: "A confirmation email has been sent to you by email".to_string(),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/confirm",
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Account confirmed (idempotent)"),
        (status = 400, description = "Invalid or expired confirmation link", body = String),
        (status = 401, description = "Sign in required", body = String)
    ),
    tag = "auth"
)]
pub async fn confirm(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ConfirmRequest>>,
) -> impl IntoResponse {
    let user = match require_auth(&headers, &state).await {
        Ok(user) => user,
        Err((status, message)) => return (status, message).into_response(),
    };

    let request: ConfirmRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    match state.workflow().confirm(user.user_id, token).await {
        Ok(ConfirmOutcome::Confirmed) => (
            StatusCode::OK,
            Json(json!({ "message": "You have confirmed your account" })),
        )
            .into_response(),
        Ok(ConfirmOutcome::AlreadyConfirmed) => (
            StatusCode::OK,
            Json(json!({ "message": "Account already confirmed" })),
        )
            .into_response(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/confirm/resend",
    responses(
        (status = 204, description = "Confirmation email queued (or account already confirmed)"),
        (status = 401, description = "Sign in required", body = String)
    ),
    tag = "auth"
)]
pub async fn resend_confirmation(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user = match require_auth(&headers, &state).await {
        Ok(user) => user,
        Err((status, message)) => return (status, message).into_response(),
    };

    match state.workflow().resend_confirmation(user.user_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}
