//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub confirmed: bool,
    pub is_administrator: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetApplyRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangeEmailRequest {
    pub password: String,
    pub new_email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangeEmailApplyRequest {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn login_request_remember_defaults_to_false() -> Result<()> {
        let decoded: LoginRequest =
            serde_json::from_str(r#"{"email":"a@example.com","password":"secret"}"#)?;
        assert!(!decoded.remember);
        Ok(())
    }

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password: "cat in the hat".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.username, "alice");
        Ok(())
    }
}
