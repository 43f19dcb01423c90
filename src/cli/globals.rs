use secrecy::SecretString;

/// Process-wide configuration shared across actions: the token signing
/// secret, token TTL, bootstrap admin address, and frontend base URL.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub secret_key: SecretString,
    pub token_ttl_seconds: i64,
    pub admin_email: Option<String>,
    pub frontend_url: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            secret_key,
            token_ttl_seconds: crate::identity::DEFAULT_TOKEN_TTL_SECONDS,
            admin_email: None,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_admin_email(mut self, email: Option<String>) -> Self {
        self.admin_email = email;
        self
    }

    #[must_use]
    pub fn with_frontend_url(mut self, url: String) -> Self {
        self.frontend_url = url;
        self
    }
}
