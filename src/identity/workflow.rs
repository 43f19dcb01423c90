//! Auth workflow: the request-scoped orchestration behind every account
//! operation.
//!
//! Each method is one short-lived use case: look up state, check credentials
//! or tokens, mutate the store, hand mail to the sender. User-facing errors
//! are deliberately coarse; in particular, login never distinguishes "no such
//! user" from "wrong password", and token failures collapse to one message.

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use super::mail::{EmailMessage, EmailSender};
use super::password::{hash_password, verify_password};
use super::principal::{AuthenticatedUser, Principal};
use super::session::SessionLayer;
use super::store::{normalize_email, IdentityStore, NewUser, StoreError, User};
use super::token::{TokenCodec, TokenPurpose};

const ADMINISTRATOR_ROLE: &str = "Administrator";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("the link is invalid or has expired")]
    InvalidOrExpiredToken,
    #[error("invalid request")]
    InvalidRequest,
    #[error(transparent)]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            StoreError::DuplicateUsername => Self::DuplicateUsername,
            other => Self::Store(other),
        }
    }
}

/// Established session handed back to the transport layer.
#[derive(Clone, Debug)]
pub struct LoginSuccess {
    pub user_id: Uuid,
    pub session_token: String,
    pub remember: bool,
}

/// Confirmation is idempotent; both variants are success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
}

/// What kind of endpoint an authenticated request is aimed at, for the
/// confirmation gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionClass {
    Confirmation,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RequireConfirmation,
}

/// Cross-cutting policy: an authenticated-but-unconfirmed user may only reach
/// confirmation-related endpoints. Anonymous principals pass through; the
/// authentication requirement itself is checked elsewhere.
#[must_use]
pub fn confirmation_gate(principal: &Principal, action: ActionClass) -> GateDecision {
    match principal {
        Principal::Authenticated(user) if !user.confirmed && action == ActionClass::Other => {
            GateDecision::RequireConfirmation
        }
        _ => GateDecision::Allow,
    }
}

pub struct AuthWorkflow<S> {
    store: S,
    tokens: TokenCodec,
    sessions: Arc<dyn SessionLayer>,
    mailer: Arc<dyn EmailSender>,
    bootstrap_admin_email: Option<String>,
}

impl<S: IdentityStore> AuthWorkflow<S> {
    pub fn new(
        store: S,
        tokens: TokenCodec,
        sessions: Arc<dyn SessionLayer>,
        mailer: Arc<dyn EmailSender>,
        bootstrap_admin_email: Option<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            sessions,
            mailer,
            bootstrap_admin_email: bootstrap_admin_email
                .map(|email| normalize_email(&email)),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check credentials and establish a session.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown email or a wrong password, with no
    /// distinction between the two.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginSuccess, AuthError> {
        let user = self.store.find_by_email(email).await?;
        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let session_token = self.sessions.establish(user.id, remember)?;
        Ok(LoginSuccess {
            user_id: user.id,
            session_token,
            remember,
        })
    }

    /// Drop the presented session. Unknown tokens are a no-op.
    pub fn logout(&self, session_token: &str) {
        self.sessions.clear(session_token);
    }

    /// Create an account, mail a confirmation link, and notify the bootstrap
    /// admin when one is configured. The account is usable-but-gated until
    /// confirmed.
    ///
    /// # Errors
    ///
    /// `DuplicateEmail` / `DuplicateUsername` when the unique check fails;
    /// exactly one of two concurrent registrations with the same address wins.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let folded = normalize_email(email);
        let password_hash = hash_password(password).map_err(anyhow::Error::from)?;
        let role = self.role_for_new_user(&folded).await?;

        let user = self
            .store
            .create(NewUser {
                username: username.to_string(),
                email: folded,
                password_hash,
                role_name: role.name,
            })
            .await?;

        self.send_confirmation_email(&user)?;
        if let Some(admin_email) = &self.bootstrap_admin_email {
            self.dispatch(EmailMessage {
                to_email: admin_email.clone(),
                subject: "New User".to_string(),
                template: "mail/new_user".to_string(),
                payload_json: json!({ "username": user.username, "email": user.email })
                    .to_string(),
            });
        }

        Ok(user)
    }

    /// Flip the confirmed flag via a CONFIRM token bound to the caller.
    ///
    /// Already-confirmed users short-circuit to success without the token
    /// being looked at again.
    ///
    /// # Errors
    ///
    /// `InvalidOrExpiredToken` covers every token failure and a subject
    /// mismatch alike; callers cannot tell which it was.
    pub async fn confirm(&self, user_id: Uuid, token: &str) -> Result<ConfirmOutcome, AuthError> {
        let user = self.require_user(user_id).await?;
        if user.confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        let claims = self
            .tokens
            .verify(token, TokenPurpose::Confirm)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;
        if claims.sub != user.id {
            // Someone else's confirmation link.
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let mut user = user;
        user.confirmed = true;
        self.store.save(&user).await?;
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Mail a fresh confirmation link to a signed-in, unconfirmed user.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when the account no longer exists.
    pub async fn resend_confirmation(&self, user_id: Uuid) -> Result<ConfirmOutcome, AuthError> {
        let user = self.require_user(user_id).await?;
        if user.confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        self.send_confirmation_email(&user)?;
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Replace the password after verifying the old one.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on an old-password mismatch; nothing is mutated
    /// in that case.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.require_user(user_id).await?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        user.password_hash = hash_password(new_password).map_err(anyhow::Error::from)?;
        self.store.save(&user).await?;
        Ok(())
    }

    /// Mail a RESET token to a registered address. Unknown addresses get the
    /// same success and no token at all, so callers cannot probe for
    /// accounts.
    ///
    /// # Errors
    ///
    /// Only storage-layer failures propagate.
    pub async fn password_reset_request(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            return Ok(());
        };

        let token = self
            .tokens
            .issue(TokenPurpose::Reset, user.id, BTreeMap::new(), None)
            .map_err(|err| AuthError::Internal(err.into()))?;
        self.dispatch(EmailMessage {
            to_email: user.email.clone(),
            subject: "Reset Your Password".to_string(),
            template: "auth/reset_password".to_string(),
            payload_json: json!({ "username": user.username, "token": token }).to_string(),
        });
        Ok(())
    }

    /// Redeem a RESET token, set the new password, and force re-login by
    /// dropping every session the subject user holds.
    ///
    /// # Errors
    ///
    /// `InvalidOrExpiredToken` for any token failure or a vanished subject.
    pub async fn password_reset_apply(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let claims = self
            .tokens
            .verify(token, TokenPurpose::Reset)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;
        let Some(mut user) = self.store.find_by_id(claims.sub).await? else {
            return Err(AuthError::InvalidOrExpiredToken);
        };

        user.password_hash = hash_password(new_password).map_err(anyhow::Error::from)?;
        self.store.save(&user).await?;
        self.sessions.invalidate_all(user.id);
        Ok(())
    }

    /// Start an email change: check the caller's password, then mail a
    /// CHANGE_EMAIL token to the proposed address. Mailing the new mailbox is
    /// what proves its ownership.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on a password mismatch, `DuplicateEmail` when the
    /// address is already taken at request time.
    pub async fn change_email_request(
        &self,
        user_id: Uuid,
        password: &str,
        new_email: &str,
    ) -> Result<(), AuthError> {
        let user = self.require_user(user_id).await?;
        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let folded = normalize_email(new_email);
        if self.store.find_by_email(&folded).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let mut extra = BTreeMap::new();
        extra.insert("new_email".to_string(), folded.clone());
        let token = self
            .tokens
            .issue(TokenPurpose::ChangeEmail, user.id, extra, None)
            .map_err(|err| AuthError::Internal(err.into()))?;
        self.dispatch(EmailMessage {
            to_email: folded,
            subject: "Confirm Your Email Address".to_string(),
            template: "auth/change_email".to_string(),
            payload_json: json!({ "username": user.username, "token": token }).to_string(),
        });
        Ok(())
    }

    /// Redeem a CHANGE_EMAIL token. Uniqueness of the new address is
    /// re-checked inside the store write, closing the window where it was
    /// claimed between issuance and redemption.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for any token failure, subject mismatch, or a lost
    /// uniqueness race.
    pub async fn change_email_apply(&self, user_id: Uuid, token: &str) -> Result<(), AuthError> {
        let claims = self
            .tokens
            .verify(token, TokenPurpose::ChangeEmail)
            .map_err(|_| AuthError::InvalidRequest)?;
        if claims.sub != user_id {
            return Err(AuthError::InvalidRequest);
        }
        let Some(new_email) = claims.extra.get("new_email") else {
            return Err(AuthError::InvalidRequest);
        };

        match self.store.update_email(user_id, new_email).await {
            Ok(()) => Ok(()),
            Err(StoreError::DuplicateEmail) => Err(AuthError::InvalidRequest),
            Err(other) => Err(other.into()),
        }
    }

    /// Resolve a session token into a request principal.
    ///
    /// # Errors
    ///
    /// Only storage-layer failures propagate; a missing or stale session is
    /// simply anonymous.
    pub async fn principal_for(&self, session_token: &str) -> Result<Principal, AuthError> {
        let Some(session) = self.sessions.resolve(session_token) else {
            return Ok(Principal::Anonymous);
        };
        let Some(user) = self.store.find_by_id(session.user_id).await? else {
            return Ok(Principal::Anonymous);
        };
        Ok(Principal::Authenticated(AuthenticatedUser {
            user_id: user.id,
            permissions: user.role.permissions,
            confirmed: user.confirmed,
        }))
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRequest)
    }

    async fn role_for_new_user(
        &self,
        folded_email: &str,
    ) -> Result<crate::identity::permission::Role, AuthError> {
        if self.bootstrap_admin_email.as_deref() == Some(folded_email) {
            if let Some(role) = self.store.role_by_name(ADMINISTRATOR_ROLE).await? {
                return Ok(role);
            }
            return Err(AuthError::Store(StoreError::MissingRole(
                ADMINISTRATOR_ROLE.to_string(),
            )));
        }
        Ok(self.store.default_role().await?)
    }

    fn send_confirmation_email(&self, user: &User) -> Result<(), AuthError> {
        let token = self
            .tokens
            .issue(TokenPurpose::Confirm, user.id, BTreeMap::new(), None)
            .map_err(|err| AuthError::Internal(err.into()))?;
        self.dispatch(EmailMessage {
            to_email: user.email.clone(),
            subject: "Confirm Your Account".to_string(),
            template: "auth/confirm".to_string(),
            payload_json: json!({ "username": user.username, "token": token }).to_string(),
        });
        Ok(())
    }

    /// Hand a message to the sender without observing the outcome; delivery
    /// never blocks or fails an auth operation.
    fn dispatch(&self, message: EmailMessage) {
        if let Err(err) = self.mailer.send(&message) {
            error!("email hand-off failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_unconfirmed_users_from_other_actions() {
        let principal = Principal::Authenticated(AuthenticatedUser {
            user_id: Uuid::new_v4(),
            permissions: 0x07,
            confirmed: false,
        });
        assert_eq!(
            confirmation_gate(&principal, ActionClass::Other),
            GateDecision::RequireConfirmation
        );
        assert_eq!(
            confirmation_gate(&principal, ActionClass::Confirmation),
            GateDecision::Allow
        );
    }

    #[test]
    fn gate_allows_confirmed_and_anonymous_principals() {
        let confirmed = Principal::Authenticated(AuthenticatedUser {
            user_id: Uuid::new_v4(),
            permissions: 0x07,
            confirmed: true,
        });
        assert_eq!(
            confirmation_gate(&confirmed, ActionClass::Other),
            GateDecision::Allow
        );
        assert_eq!(
            confirmation_gate(&Principal::Anonymous, ActionClass::Other),
            GateDecision::Allow
        );
    }

    #[test]
    fn duplicate_store_errors_become_duplicate_auth_errors() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(
            AuthError::from(StoreError::DuplicateUsername),
            AuthError::DuplicateUsername
        ));
        assert!(matches!(
            AuthError::from(StoreError::MissingRole("User".to_string())),
            AuthError::Store(StoreError::MissingRole(_))
        ));
    }
}
