use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Failure reported by a notification backend.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification collaborator. Delivery (email, chat, push) is out
/// of scope for the engine; rule actions only hand the message over.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, user_email: &str, message: &str) -> Result<(), NotifyError>;
}

/// Default sender that records the notification in the service log.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSender for TracingNotifier {
    async fn send(&self, user_email: &str, message: &str) -> Result<(), NotifyError> {
        info!(user = %user_email, message, "notification dispatched");
        Ok(())
    }
}
