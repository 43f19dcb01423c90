//! End-to-end auth workflow scenarios over the in-memory store.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};

use limen::identity::{
    confirmation_gate, reconcile_roles, ActionClass, AuthError, AuthWorkflow, ConfirmOutcome,
    EmailMessage, EmailSender, GateDecision, InMemorySessions, MemoryIdentityStore, Permission,
    Principal, TokenCodec,
};

/// Captures every hand-off so tests can assert on (non-)delivery.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn last_token_for(&self, to_email: &str) -> Option<String> {
        self.messages()
            .iter()
            .rev()
            .find(|message| message.to_email == to_email)
            .and_then(|message| {
                serde_json::from_str::<serde_json::Value>(&message.payload_json).ok()
            })
            .and_then(|payload| payload.get("token").and_then(|t| t.as_str()).map(String::from))
    }
}

impl EmailSender for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}

async fn workflow(
    admin_email: Option<&str>,
) -> Result<(Arc<AuthWorkflow<MemoryIdentityStore>>, Arc<RecordingMailer>)> {
    let store = MemoryIdentityStore::new();
    reconcile_roles(&store).await?;
    let mailer = Arc::new(RecordingMailer::default());
    let workflow = AuthWorkflow::new(
        store,
        TokenCodec::new(&SecretString::from("hard to guess string"), 3600),
        Arc::new(InMemorySessions::new()),
        mailer.clone(),
        admin_email.map(str::to_string),
    );
    Ok((Arc::new(workflow), mailer))
}

#[tokio::test]
async fn register_confirm_and_gate_lifecycle() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;

    let user = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;
    assert!(!user.confirmed);

    // Sign in; the unconfirmed principal is gated away from everything but
    // confirmation.
    let login = workflow
        .login("alice@example.com", "cat in the hat", false)
        .await?;
    let principal = workflow.principal_for(&login.session_token).await?;
    assert!(principal.is_authenticated());
    assert_eq!(
        confirmation_gate(&principal, ActionClass::Other),
        GateDecision::RequireConfirmation
    );
    assert_eq!(
        confirmation_gate(&principal, ActionClass::Confirmation),
        GateDecision::Allow
    );

    let token = mailer
        .last_token_for("alice@example.com")
        .context("confirmation email with token")?;
    assert_eq!(
        workflow.confirm(user.id, &token).await?,
        ConfirmOutcome::Confirmed
    );

    let principal = workflow.principal_for(&login.session_token).await?;
    assert_eq!(
        confirmation_gate(&principal, ActionClass::Other),
        GateDecision::Allow
    );

    // Redeeming the same link again is still success, short-circuited.
    assert_eq!(
        workflow.confirm(user.id, &token).await?,
        ConfirmOutcome::AlreadyConfirmed
    );
    Ok(())
}

#[tokio::test]
async fn confirm_rejects_another_users_token() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;

    let alice = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;
    workflow
        .register("bob@example.com", "bob", "dog in the fog")
        .await?;

    let bobs_token = mailer
        .last_token_for("bob@example.com")
        .context("bob's confirmation token")?;
    let result = workflow.confirm(alice.id, &bobs_token).await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredToken)));
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_with_same_email_pick_one_winner() -> Result<()> {
    let (workflow, _mailer) = workflow(None).await?;

    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move {
            workflow
                .register("bob@example.com", "bob", "dog in the fog")
                .await
        })
    };
    let second = {
        let workflow = workflow.clone();
        tokio::spawn(async move {
            workflow
                .register("bob@example.com", "robert", "dog in the fog")
                .await
        })
    };

    let outcomes = [first.await?, second.await?];
    let winners = outcomes.iter().filter(|result| result.is_ok()).count();
    let duplicates = outcomes
        .iter()
        .filter(|result| matches!(result, Err(AuthError::DuplicateEmail)))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(duplicates, 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_rejected() -> Result<()> {
    let (workflow, _mailer) = workflow(None).await?;
    workflow
        .register("bob@example.com", "bob", "dog in the fog")
        .await?;
    let result = workflow
        .register("other@example.com", "bob", "dog in the fog")
        .await;
    assert!(matches!(result, Err(AuthError::DuplicateUsername)));
    Ok(())
}

#[tokio::test]
async fn login_does_not_distinguish_unknown_user_from_wrong_password() -> Result<()> {
    let (workflow, _mailer) = workflow(None).await?;
    workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    let unknown = workflow
        .login("nobody@example.com", "whatever at all", false)
        .await;
    let wrong = workflow
        .login("alice@example.com", "wrong password", false)
        .await;
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[tokio::test]
async fn reset_request_for_unknown_email_sends_nothing() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;

    workflow
        .password_reset_request("nobody@example.com")
        .await?;
    assert!(mailer.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn reset_apply_sets_password_and_invalidates_sessions() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;
    workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;
    let login = workflow
        .login("alice@example.com", "cat in the hat", true)
        .await?;

    workflow.password_reset_request("alice@example.com").await?;
    let token = mailer
        .last_token_for("alice@example.com")
        .context("reset email with token")?;
    workflow
        .password_reset_apply(&token, "brand new password")
        .await?;

    // Forced re-login: the old session is gone.
    let principal = workflow.principal_for(&login.session_token).await?;
    assert_eq!(principal, Principal::Anonymous);

    let old = workflow
        .login("alice@example.com", "cat in the hat", false)
        .await;
    assert!(matches!(old, Err(AuthError::InvalidCredentials)));
    workflow
        .login("alice@example.com", "brand new password", false)
        .await?;
    Ok(())
}

#[tokio::test]
async fn confirmation_token_cannot_reset_a_password() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;
    workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    let confirm_token = mailer
        .last_token_for("alice@example.com")
        .context("confirmation token")?;
    let result = workflow
        .password_reset_apply(&confirm_token, "sneaky password")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredToken)));

    // The original password still works.
    workflow
        .login("alice@example.com", "cat in the hat", false)
        .await?;
    Ok(())
}

#[tokio::test]
async fn change_password_requires_the_old_one() -> Result<()> {
    let (workflow, _mailer) = workflow(None).await?;
    let user = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    let result = workflow
        .change_password(user.id, "wrong password", "new password here")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    workflow
        .login("alice@example.com", "cat in the hat", false)
        .await?;

    workflow
        .change_password(user.id, "cat in the hat", "new password here")
        .await?;
    workflow
        .login("alice@example.com", "new password here", false)
        .await?;
    Ok(())
}

#[tokio::test]
async fn change_email_round_trip_mails_the_new_address() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;
    let user = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    let wrong = workflow
        .change_email_request(user.id, "wrong password", "alice@new.example.com")
        .await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    workflow
        .change_email_request(user.id, "cat in the hat", "Alice@New.example.com")
        .await?;
    // Ownership of the new mailbox is what gets confirmed.
    let token = mailer
        .last_token_for("alice@new.example.com")
        .context("change-email token sent to the new address")?;

    workflow.change_email_apply(user.id, &token).await?;
    let reloaded = workflow
        .login("alice@new.example.com", "cat in the hat", false)
        .await?;
    assert_eq!(reloaded.user_id, user.id);
    Ok(())
}

#[tokio::test]
async fn change_email_loses_the_race_when_address_is_claimed() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;
    let alice = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    workflow
        .change_email_request(alice.id, "cat in the hat", "shared@example.com")
        .await?;
    let token = mailer
        .last_token_for("shared@example.com")
        .context("change-email token")?;

    // Someone registers the address between issuance and redemption.
    workflow
        .register("shared@example.com", "squatter", "dog in the fog")
        .await?;

    let result = workflow.change_email_apply(alice.id, &token).await;
    assert!(matches!(result, Err(AuthError::InvalidRequest)));
    Ok(())
}

#[tokio::test]
async fn resend_confirmation_issues_a_fresh_working_token() -> Result<()> {
    let (workflow, mailer) = workflow(None).await?;
    let user = workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    workflow.resend_confirmation(user.id).await?;
    assert_eq!(
        mailer
            .messages()
            .iter()
            .filter(|message| message.to_email == "alice@example.com")
            .count(),
        2
    );

    let token = mailer
        .last_token_for("alice@example.com")
        .context("resent confirmation token")?;
    assert_eq!(
        workflow.confirm(user.id, &token).await?,
        ConfirmOutcome::Confirmed
    );

    // Once confirmed, resending short-circuits without another email.
    let before = mailer.messages().len();
    assert_eq!(
        workflow.resend_confirmation(user.id).await?,
        ConfirmOutcome::AlreadyConfirmed
    );
    assert_eq!(mailer.messages().len(), before);
    Ok(())
}

#[tokio::test]
async fn bootstrap_admin_email_gets_the_administrator_role() -> Result<()> {
    let (workflow, mailer) = workflow(Some("Root@Example.com")).await?;

    let admin = workflow
        .register("root@example.com", "root", "cat in the hat")
        .await?;
    assert_eq!(admin.role.name, "Administrator");

    let login = workflow
        .login("root@example.com", "cat in the hat", false)
        .await?;
    let principal = workflow.principal_for(&login.session_token).await?;
    assert!(principal.is_administrator());
    assert!(principal.can(Permission::Moderate));

    // The bootstrap admin is also notified about new users.
    let regular = workflow
        .register("alice@example.com", "alice", "dog in the fog")
        .await?;
    assert_eq!(regular.role.name, "User");
    assert!(mailer
        .messages()
        .iter()
        .any(|message| message.to_email == "root@example.com"
            && message.template == "mail/new_user"));
    Ok(())
}

#[tokio::test]
async fn logout_drops_only_the_presented_session() -> Result<()> {
    let (workflow, _mailer) = workflow(None).await?;
    workflow
        .register("alice@example.com", "alice", "cat in the hat")
        .await?;

    let first = workflow
        .login("alice@example.com", "cat in the hat", false)
        .await?;
    let second = workflow
        .login("alice@example.com", "cat in the hat", true)
        .await?;

    workflow.logout(&first.session_token);
    assert_eq!(
        workflow.principal_for(&first.session_token).await?,
        Principal::Anonymous
    );
    assert!(workflow
        .principal_for(&second.session_token)
        .await?
        .is_authenticated());
    Ok(())
}
