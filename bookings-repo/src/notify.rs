//! Notification adapters.
//!
//! Production deployments put a real email provider behind the
//! [`Notifier`] port; this crate ships a tracing-backed sink so every
//! environment has a working notifier without SMTP credentials.

use async_trait::async_trait;

use bookings_types::{Notifier, NotifyError};

/// Notifier that writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(email, subject, body, "notification sent");
        Ok(())
    }
}
