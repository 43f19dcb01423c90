//! Session cookie plumbing and the session/logout endpoints.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::state::AuthState;
use super::types::SessionResponse;
use super::{error_response, state::AuthConfig};
use crate::identity::{AuthenticatedUser, Principal};

const SESSION_COOKIE_NAME: &str = "limen_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    match authenticated_user(&headers, &state).await {
        Ok(Some(user)) => {
            let response = SessionResponse {
                user_id: user.user_id.to_string(),
                confirmed: user.confirmed,
                is_administrator: Principal::Authenticated(user.clone()).is_administrator(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        // Missing cookies read as "no session" to avoid leaking auth state.
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        state.workflow().logout(&token);
    }

    // Always clear the cookie, even when no session record existed.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Resolve the request's session into an authenticated user, if any.
pub(super) async fn authenticated_user(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<AuthenticatedUser>, (StatusCode, String)> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    match state.workflow().principal_for(&token).await {
        Ok(Principal::Authenticated(user)) => Ok(Some(user)),
        Ok(Principal::Anonymous) => Ok(None),
        Err(err) => Err(error_response(&err)),
    }
}

/// Like [`authenticated_user`] but a missing session is a 401.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<AuthenticatedUser, (StatusCode, String)> {
    authenticated_user(headers, state)
        .await?
        .ok_or((StatusCode::UNAUTHORIZED, "Sign in required".to_string()))
}

/// Build the `HttpOnly` session cookie. Remembered sessions get a persistent
/// Max-Age; plain ones live only as long as the browser session.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
    remember: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    if remember {
        cookie.push_str(&format!("; Max-Age={}", config.remember_ttl_seconds()));
    }
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
