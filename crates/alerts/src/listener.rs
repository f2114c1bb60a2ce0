//! Inbound command listener.
//!
//! The update offset lives in an explicit [`UpdateCursor`] threaded through
//! every poll, so a restarted listener resumes from a known position.

use crate::chat::InboundEvent;
use crate::commands::CommandDispatcher;
use crate::telegram::TelegramError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Position in the inbound update stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCursor(i64);

impl UpdateCursor {
    pub fn new(offset: i64) -> Self {
        Self(offset)
    }

    /// Next update id to request.
    #[inline]
    pub fn offset(self) -> i64 {
        self.0
    }

    /// Cursor positioned after `update_id`. Never moves backwards.
    #[must_use]
    pub fn advance_past(self, update_id: i64) -> Self {
        Self(self.0.max(update_id + 1))
    }
}

/// Restartable source of inbound command events.
#[async_trait]
pub trait InboundSource: Send + Sync {
    /// Events at or after `cursor`, plus the cursor for the next call.
    async fn poll(&self, cursor: UpdateCursor) -> Result<(Vec<InboundEvent>, UpdateCursor), TelegramError>;
}

/// Polls an [`InboundSource`] and feeds every event to the dispatcher.
pub struct CommandListener {
    source: Arc<dyn InboundSource>,
    dispatcher: Arc<CommandDispatcher>,
    idle_delay: Duration,
    error_delay: Duration,
}

impl CommandListener {
    pub fn new(source: Arc<dyn InboundSource>, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            source,
            dispatcher,
            idle_delay: Duration::from_secs(1),
            error_delay: Duration::from_secs(5),
        }
    }

    /// One poll-and-dispatch round. Returns the advanced cursor, or the same
    /// cursor if the poll failed.
    pub async fn step(&self, cursor: UpdateCursor) -> Result<UpdateCursor, TelegramError> {
        let (events, next) = self.source.poll(cursor).await?;
        for event in &events {
            self.dispatcher.handle(event).await;
        }
        Ok(next)
    }

    /// Run until `running` is cleared.
    pub async fn run(self, running: Arc<AtomicBool>) {
        info!("Telegram command listener started");
        let mut cursor = UpdateCursor::default();

        while running.load(Ordering::Relaxed) {
            match self.step(cursor).await {
                Ok(next) => {
                    cursor = next;
                    tokio::time::sleep(self.idle_delay).await;
                }
                Err(e) => {
                    warn!(error = %e, offset = cursor.offset(), "Polling for updates failed");
                    tokio::time::sleep(self.error_delay).await;
                }
            }
        }
        info!("Telegram command listener stopped");
    }
}
