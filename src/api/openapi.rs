//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use super::handlers::auth::types::{
    ChangeEmailApplyRequest, ChangeEmailRequest, ChangePasswordRequest, ConfirmRequest,
    LoginRequest, RegisterRequest, RegisterResponse, ResetApplyRequest, ResetRequest,
    SessionResponse,
};
use super::handlers::health::Health;
use super::handlers::users::UserSummary;
use super::handlers::{auth, health, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "limen",
        description = "User accounts, roles and sign-in",
        license(name = "BSD-3-Clause")
    ),
    paths(
        health::health,
        auth::register::register,
        auth::register::confirm,
        auth::register::resend_confirmation,
        auth::login::login,
        auth::session::session,
        auth::session::logout,
        auth::password::change_password,
        auth::password::password_reset_request,
        auth::password::password_reset_apply,
        auth::email_change::change_email_request,
        auth::email_change::change_email_apply,
        users::list_users,
    ),
    components(schemas(
        Health,
        RegisterRequest,
        RegisterResponse,
        LoginRequest,
        SessionResponse,
        ConfirmRequest,
        ChangePasswordRequest,
        ResetRequest,
        ResetApplyRequest,
        ChangeEmailRequest,
        ChangeEmailApplyRequest,
        UserSummary,
    )),
    tags(
        (name = "auth", description = "Registration, login and account management"),
        (name = "users", description = "Administrative user listing"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|path| *path == "/health"));
        assert!(paths.iter().any(|path| *path == "/v1/auth/register"));
        assert!(paths.iter().any(|path| *path == "/v1/auth/login"));
        assert!(paths.iter().any(|path| *path == "/v1/auth/reset/confirm"));
        assert!(paths.iter().any(|path| *path == "/v1/users"));
    }
}
