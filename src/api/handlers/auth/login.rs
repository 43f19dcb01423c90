//! Login endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::session::session_cookie;
use super::state::AuthState;
use super::types::LoginRequest;
use super::{error_response, valid_email};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set"),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid email or password", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = request.email.trim();
    if !valid_email(&email.to_lowercase()) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let success = match state
        .workflow()
        .login(email, &request.password, request.remember)
        .await
    {
        Ok(success) => success,
        Err(err) => {
            let (status, message) = error_response(&err);
            return (status, message).into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(state.config(), &success.session_token, success.remember) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    }

    let body = Json(json!({ "user_id": success.user_id.to_string() }));
    (StatusCode::OK, headers, body).into_response()
}
