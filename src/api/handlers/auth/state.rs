//! Shared state and configuration for the auth endpoints.

use crate::identity::{AuthWorkflow, PgIdentityStore, DEFAULT_TOKEN_TTL_SECONDS};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_REMEMBER_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    remember_ttl_seconds: i64,
    bootstrap_admin_email: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            remember_ttl_seconds: DEFAULT_REMEMBER_TTL_SECONDS,
            bootstrap_admin_email: None,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bootstrap_admin_email(mut self, email: Option<String>) -> Self {
        self.bootstrap_admin_email = email;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn remember_ttl_seconds(&self) -> i64 {
        self.remember_ttl_seconds
    }

    #[must_use]
    pub fn bootstrap_admin_email(&self) -> Option<&str> {
        self.bootstrap_admin_email.as_deref()
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Everything the auth handlers share per process.
pub struct AuthState {
    config: AuthConfig,
    workflow: AuthWorkflow<PgIdentityStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, workflow: AuthWorkflow<PgIdentityStore>) -> Self {
        Self { config, workflow }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn workflow(&self) -> &AuthWorkflow<PgIdentityStore> {
        &self.workflow
    }
}
