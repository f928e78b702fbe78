use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use common::{CandidateRecord, DeliveryError, MessageSink};

use crate::format::{self, TELEGRAM_MAX_LEN};

/// Smallest message budget accepted; below this a header no longer fits.
const MIN_MESSAGE_LEN: usize = 256;

/// Delivery stopped partway through a batch.
#[derive(Debug, Error)]
#[error("{error} (after {delivered} of {total} messages)")]
pub struct PartialDelivery {
    pub delivered: usize,
    pub total: usize,
    pub error: DeliveryError,
}

/// Formats candidate batches and hands them to a [`MessageSink`] in order.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    max_len: usize,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, max_len: usize) -> Self {
        Self {
            sink,
            max_len: max_len.clamp(MIN_MESSAGE_LEN, TELEGRAM_MAX_LEN),
        }
    }

    pub fn telegram_limits(sink: Arc<dyn MessageSink>) -> Self {
        Self::new(sink, TELEGRAM_MAX_LEN)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn render(&self, strategy: &str, candidates: &[CandidateRecord]) -> Vec<String> {
        format::render_batch(strategy, candidates, self.max_len)
    }

    /// Send the batch; returns the number of messages delivered.
    /// Stops at the first failed message.
    pub async fn deliver(
        &self,
        strategy: &str,
        candidates: &[CandidateRecord],
    ) -> Result<usize, PartialDelivery> {
        let messages = self.render(strategy, candidates);
        let total = messages.len();
        self.send_all(strategy, messages).await.map_err(|(delivered, error)| {
            PartialDelivery {
                delivered,
                total,
                error,
            }
        })?;
        info!(strategy, messages = total, candidates = candidates.len(), "Batch delivered");
        Ok(total)
    }

    /// Best-effort "💥 <strategy> failed: <reason>" message.
    pub async fn notify_failure(&self, strategy: &str, reason: &str) -> Result<(), DeliveryError> {
        let messages = format::split_at_chars(&format::failure(strategy, reason), self.max_len);
        self.send_all(strategy, messages).await.map_err(|(_, e)| e)
    }

    async fn send_all(
        &self,
        strategy: &str,
        messages: Vec<String>,
    ) -> Result<(), (usize, DeliveryError)> {
        for (i, text) in messages.iter().enumerate() {
            if let Err(e) = self.sink.send(text).await {
                warn!(strategy, part = i + 1, of = messages.len(), error = %e, "Delivery failed");
                return Err((i, e));
            }
        }
        Ok(())
    }
}
