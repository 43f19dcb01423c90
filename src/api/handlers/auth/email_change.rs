//! Email-change endpoints: request a change, then confirm it from the new
//! mailbox.

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
use super::types::{ChangeEmailApplyRequest, ChangeEmailRequest};
use super::{error_response, valid_email};
use crate::identity::{confirmation_gate, ActionClass, GateDecision, Principal};

#[utoipa::path(
    post,
    path = "/v1/auth/email",
    request_body = ChangeEmailRequest,
    responses(
        (status = 200, description = "Confirmation email sent to the new address"),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Sign in required or wrong password", body = String),
        (status = 403, description = "Account not confirmed", body = String),
        (status = 409, description = "Address already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn change_email_request(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangeEmailRequest>>,
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

    let request: ChangeEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let new_email = request.new_email.trim().to_lowercase();
    if !valid_email(&new_email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match state
        .workflow()
        .change_email_request(user.user_id, &request.password, &new_email)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message":
                    "An email with instructions to confirm your new email address has been sent to you"
            })),
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
    path = "/v1/auth/email/confirm",
    request_body = ChangeEmailApplyRequest,
    responses(
        (status = 200, description = "Email address updated"),
        (status = 400, description = "Invalid request", body = String),
        (status = 401, description = "Sign in required", body = String)
    ),
    tag = "auth"
)]
pub async fn change_email_apply(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangeEmailApplyRequest>>,
) -> impl IntoResponse {
    let user = match require_auth(&headers, &state).await {
        Ok(user) => user,
        Err((status, message)) => return (status, message).into_response(),
    };

    let request: ChangeEmailApplyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    match state
        .workflow()
        .change_email_apply(user.user_id, token)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Your email address has been updated" })),
        )
            .into_response(),
        Err(err) => {
            let (status, message) = error_response(&err);
            (status, message).into_response()
        }
    }
}
