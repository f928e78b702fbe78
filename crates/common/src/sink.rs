use async_trait::async_trait;

use crate::DeliveryError;

/// Abstraction over the messaging endpoint.
///
/// `TelegramSink` implements this for real delivery.
/// `ConsoleSink` implements this for dry runs.
///
/// Only the notifier in `crates/telegram` should call `send`. Runs share one
/// sink and use it sequentially.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one already-formatted text message.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}
