//! Administrative user listing.
//!
//! Flow Overview:
//! 1) Authenticate the request via session cookie.
//! 2) Apply the confirmation gate, then the admin capability check.
//! 3) Read the user list from the identity store.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::session::require_auth;
use super::auth::AuthState;
use crate::identity::{confirmation_gate, ActionClass, GateDecision, IdentityStore, Principal};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub confirmed: bool,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "List users (administrators only)", body = [UserSummary]),
        (status = 401, description = "Sign in required", body = String),
        (status = 403, description = "Forbidden", body = String)
    ),
    tag = "users"
)]
pub async fn list_users(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let user = match require_auth(&headers, &state).await {
        Ok(user) => user,
        Err((status, message)) => return (status, message).into_response(),
    };
    let principal = Principal::Authenticated(user);
    if confirmation_gate(&principal, ActionClass::Other) == GateDecision::RequireConfirmation {
        return (
            StatusCode::FORBIDDEN,
            "Please confirm your account".to_string(),
        )
            .into_response();
    }
    if !principal.is_administrator() {
        return (StatusCode::FORBIDDEN, "Forbidden".to_string()).into_response();
    }

    match state.workflow().store().list_users().await {
        Ok(users) => {
            let list: Vec<UserSummary> = users
                .into_iter()
                .map(|user| UserSummary {
                    id: user.id.to_string(),
                    username: user.username,
                    email: user.email,
                    role: user.role.name,
                    confirmed: user.confirmed,
                })
                .collect();
            (StatusCode::OK, Json(list)).into_response()
        }
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
