// Outbound notification seam: fire-and-forget email.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("failed to send email to {to}: {message}")]
pub struct NotifyError {
    pub to: String,
    pub message: String,
}

/// External notification channel. Implementations deliver best-effort;
/// callers treat sends as fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no mail transport is configured and
/// in tests.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        info!("email to {to}: {subject}");
        Ok(())
    }
}

/// Send to every recipient, logging failures without retrying or
/// propagating them.
pub async fn notify_all(notifier: &dyn Notifier, recipients: &[String], subject: &str, body: &str) {
    for to in recipients {
        if let Err(e) = notifier.send_email(to, subject, body).await {
            warn!("notification failure (not retried): {e}");
        }
    }
}
