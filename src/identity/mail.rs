//! Outbound email hand-off.
//!
//! The auth workflow hands a message to an [`EmailSender`] and moves on; it
//! never waits on delivery or inspects the outcome beyond logging. Senders
//! decide how to deliver (SMTP, API, queue). The default for local dev logs
//! the payload and returns `Ok`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the auth workflow.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error; callers do not retry here.
    ///
    /// # Errors
    ///
    /// Implementations surface delivery hand-off failures.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_any_message() {
        let sender = LogEmailSender;
        let message = EmailMessage {
            to_email: "alice@example.com".to_string(),
            subject: "Confirm Your Account".to_string(),
            template: "auth/confirm".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(sender.send(&message).is_ok());
    }
}
