//! Fan-out of one message to every subscriber.

use crate::chat::ChatId;
use crate::registry::SubscriberRegistry;
use crate::telegram::TelegramError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chat-style push transport.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver `text` (HTML) to one chat.
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError>;
}

/// Aggregate delivery counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl BroadcastReport {
    /// Overall success iff at least one recipient got the message.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.success > 0
    }
}

/// Sends to every registered subscriber.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    transport: Arc<dyn MessageTransport>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>, transport: Arc<dyn MessageTransport>) -> Self {
        Self { registry, transport }
    }

    /// Deliver `text` to a snapshot of the current subscriber set.
    ///
    /// Failed recipients stay registered.
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let recipients = self.registry.list();
        let mut report = BroadcastReport {
            total: recipients.len(),
            ..Default::default()
        };

        for chat_id in recipients {
            match self.transport.send(chat_id, text).await {
                Ok(()) => report.success += 1,
                Err(e) => {
                    warn!(chat_id = chat_id, error = %e, "Broadcast delivery failed");
                    report.failed += 1;
                }
            }
        }

        if report.total == 0 {
            debug!("Broadcast skipped, no subscribers");
        } else {
            info!(
                success = report.success,
                failed = report.failed,
                total = report.total,
                "Broadcast complete"
            );
        }
        report
    }
}
