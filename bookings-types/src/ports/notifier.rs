//! Notification port trait.

use std::sync::Arc;

/// Errors from the notification adapter.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification: {0}")]
    Send(String),
}

/// Outbound port for customer notifications.
///
/// Strictly best-effort: callers log failures and move on. Nothing in the
/// booking or payment flow may depend on a notification landing.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Sends a notification to the given address.
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait::async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        (**self).notify(email, subject, body).await
    }
}
