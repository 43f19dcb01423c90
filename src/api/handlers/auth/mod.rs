//! Auth endpoints: registration, login, confirmation, password and email
//! management. Handlers parse and shape requests; every identity decision is
//! delegated to [`crate::identity`].

use axum::http::StatusCode;
use regex::Regex;
use tracing::error;

use crate::identity::AuthError;

pub mod email_change;
pub mod login;
pub mod password;
pub mod register;
pub mod session;
pub mod state;
pub mod types;

pub use state::{AuthConfig, AuthState};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Basic email format check before the workflow is invoked.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Usernames start with a letter and stay in the letters/digits/dot/underscore
/// alphabet.
pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").is_ok_and(|regex| regex.is_match(username))
}

pub(crate) fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
}

/// Collapse workflow errors into user-safe responses. Internal detail is
/// logged here and never echoed to the caller.
pub(crate) fn error_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        }
        AuthError::DuplicateEmail => {
            (StatusCode::CONFLICT, "Email already registered".to_string())
        }
        AuthError::DuplicateUsername => {
            (StatusCode::CONFLICT, "Username already taken".to_string())
        }
        AuthError::InvalidOrExpiredToken => (
            StatusCode::BAD_REQUEST,
            "The link is invalid or has expired".to_string(),
        ),
        AuthError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request".to_string()),
        AuthError::Store(inner) => {
            error!("identity store failure: {inner}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service unavailable".to_string(),
            )
        }
        AuthError::Internal(inner) => {
            error!("auth workflow failure: {inner}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service unavailable".to_string(),
            )
        }
    }
}
