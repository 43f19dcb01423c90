//! Password change and reset endpoints.

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
use super::types::{ChangePasswordRequest, ResetApplyRequest, ResetRequest};
use super::{error_response, valid_email, valid_password};
use crate::identity::{confirmation_gate, ActionClass, GateDecision, Principal};

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Sign in required or wrong old password", body = String),
        (status = 403, description = "Account not confirmed", body = String)
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let user = match require_auth(&headers, &state).await {
        Ok(user) => user,
        Err((status, message)) => return (status, message).into_response(),
    };
    let principal = Principal::Authenticated(user.clone());
    if confirmation_gate(&principal, ActionClass::Other) == GateDecision::RequireConfirmation {
        return (
            StatusCode::FORBIDDEN,
            "Please confirm your account".to_string(),
        )
            .into_response();
    }

    let request: ChangePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if !valid_password(&request.new_password) {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    match state
        .workflow()
        .change_password(user.user_id, &request.old_password, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Generic acknowledgement; sent whether or not the address is registered")
    ),
    tag = "auth"
)]
pub async fn password_reset_request(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetRequest>>,
) -> impl IntoResponse {
    let generic = || {
        (
            StatusCode::OK,
            Json(json!({
                "message": "An email with instructions to reset your password has been sent to you"
            })),
        )
            .into_response()
    };

    let request: ResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        // Unparseable addresses get the same acknowledgement as unknown ones.
        return generic();
    }

    match state.workflow().password_reset_request(&email).await {
        Ok(()) => generic(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset/confirm",
    request_body = ResetApplyRequest,
    responses(
        (status = 204, description = "Password reset; all sessions invalidated"),
        (status = 400, description = "Invalid or expired reset link", body = String)
    ),
    tag = "auth"
)]
pub async fn password_reset_apply(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetApplyRequest>>,
) -> impl IntoResponse {
    let request: ResetApplyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }
    if !valid_password(&request.new_password) {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    match state
        .workflow()
        .password_reset_apply(token, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}
