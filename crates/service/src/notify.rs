use async_trait::async_trait;
use model::Notification;
use tracing::info;

/// Notification Dispatcher.
///
/// Implementations may fail; callers route every call through
/// [`BestEffort`](crate::BestEffort) so a failure never reaches the actor.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Dispatcher that only writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            recipient_id = %notification.recipient_id,
            event_type = notification.event_type.as_str(),
            payload = %notification.payload,
            "Notification"
        );
        Ok(())
    }
}
