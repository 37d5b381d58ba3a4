use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// EmailService
///
/// Outbound mail. Only password reset links are sent today.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), MailError>;
}

pub type MailerState = Arc<dyn EmailService>;

/// LogEmailService
///
/// Development delivery: the message is written to the log instead of an SMTP relay.
#[derive(Debug, Clone)]
pub struct LogEmailService {
    from: String,
}

impl LogEmailService {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl EmailService for LogEmailService {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), MailError> {
        tracing::info!(
            from = %self.from,
            to = %to,
            link = %reset_link,
            "password reset mail"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub reset_link: String,
}

/// MockEmailService
///
/// Records every message for assertions. With `should_fail` nothing is recorded
/// and every send errors.
#[derive(Debug, Default)]
pub struct MockEmailService {
    pub should_fail: bool,
    sent: Mutex<Vec<SentMail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError("mock mailer is down".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                to: to.to_string(),
                reset_link: reset_link.to_string(),
            });
        }
        Ok(())
    }
}
