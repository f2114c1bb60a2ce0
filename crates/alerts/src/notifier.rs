//! Notification channels and the composite notifier.

use crate::broadcast::{Broadcaster, MessageTransport};
use crate::chat::ChatId;
use crate::format::plain_text;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Discord rejects embed descriptions above this length.
const DISCORD_DESCRIPTION_LIMIT: usize = 4096;

/// One place alerts can be delivered to.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver an HTML `message`. Returns whether delivery succeeded.
    async fn notify(&self, title: &str, message: &str) -> bool;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChannel;

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn notify(&self, title: &str, message: &str) -> bool {
        info!("🔔 {}", title);
        for line in plain_text(message).lines().filter(|l| !l.trim().is_empty()) {
            info!("  {}", line);
        }
        true
    }
}

/// Broadcasts to every registered subscriber.
pub struct TelegramBroadcastChannel {
    broadcaster: Broadcaster,
}

impl TelegramBroadcastChannel {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl NotificationChannel for TelegramBroadcastChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, _title: &str, message: &str) -> bool {
        self.broadcaster.broadcast(message).await.is_success()
    }
}

/// Sends to one fixed chat.
pub struct TelegramDirectChannel {
    transport: Arc<dyn MessageTransport>,
    chat_id: ChatId,
}

impl TelegramDirectChannel {
    pub fn new(transport: Arc<dyn MessageTransport>, chat_id: ChatId) -> Self {
        Self { transport, chat_id }
    }
}

#[async_trait]
impl NotificationChannel for TelegramDirectChannel {
    fn name(&self) -> &'static str {
        "telegram_direct"
    }

    async fn notify(&self, _title: &str, message: &str) -> bool {
        match self.transport.send(self.chat_id, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id = self.chat_id, error = %e, "Direct Telegram notification failed");
                false
            }
        }
    }
}

/// Posts an embed to a Discord webhook.
pub struct DiscordWebhookChannel {
    http: Client,
    webhook_url: String,
}

impl DiscordWebhookChannel {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            webhook_url: webhook_url.into(),
        })
    }
}

/// Embed payload for a webhook post.
pub fn discord_payload(title: &str, message: &str) -> serde_json::Value {
    let description: String = plain_text(message)
        .trim()
        .chars()
        .take(DISCORD_DESCRIPTION_LIMIT)
        .collect();
    json!({
        "embeds": [{
            "title": title,
            "description": description,
            "color": 0x3498db,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }]
    })
}

#[async_trait]
impl NotificationChannel for DiscordWebhookChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, title: &str, message: &str) -> bool {
        let payload = discord_payload(title, message);
        match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::NO_CONTENT => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "Discord webhook rejected notification");
                false
            }
            Err(e) => {
                warn!(error = %e, "Discord webhook request failed");
                false
            }
        }
    }
}

/// Fans one alert out to every enabled channel.
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Returns true only if every channel delivered.
    pub async fn notify(&self, title: &str, message: &str) -> bool {
        let mut all_ok = true;
        for channel in &self.channels {
            if channel.notify(title, message).await {
                debug!(channel = channel.name(), title = title, "Notification delivered");
            } else {
                error!(channel = channel.name(), title = title, "Notification failed");
                all_ok = false;
            }
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::tests::RecordingTransport;
    use crate::registry::tests::temp_path;
    use crate::registry::{SubscriberRegistry, SubscriberStore};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedChannel {
        ok: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for FixedChannel {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn notify(&self, _title: &str, _message: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ok
        }
    }

    fn fixed(ok: bool) -> Arc<FixedChannel> {
        Arc::new(FixedChannel {
            ok,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_notifier_requires_every_channel() {
        let good = fixed(true);
        let bad = fixed(false);
        let notifier = Notifier::new()
            .with_channel(Arc::new(ConsoleChannel))
            .with_channel(bad.clone())
            .with_channel(good.clone());

        assert!(!notifier.notify("Title", "<b>body</b>").await);
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.channel_names(), vec!["console", "fixed", "fixed"]);
    }

    #[tokio::test]
    async fn test_telegram_channels() {
        let registry = Arc::new(SubscriberRegistry::open(SubscriberStore::new(temp_path(
            "subscribers.json",
        ))));
        let transport = Arc::new(RecordingTransport {
            failing: [2].into_iter().collect(),
            ..Default::default()
        });

        let broadcast = TelegramBroadcastChannel::new(Broadcaster::new(registry.clone(), transport.clone()));
        assert!(!broadcast.notify("t", "m").await);
        registry.add(1).await;
        registry.add(2).await;
        assert!(broadcast.notify("t", "m").await);

        let direct = TelegramDirectChannel::new(transport.clone(), 99);
        assert!(direct.notify("t", "hello").await);
        assert_eq!(transport.messages_to(99), vec!["hello".to_string()]);
        assert!(!TelegramDirectChannel::new(transport, 2).notify("t", "x").await);
    }

    #[test]
    fn test_discord_payload() {
        let payload = discord_payload("Balance Change", "<b>Change:</b> +1.0 ETH");
        assert_eq!(payload["embeds"][0]["title"], "Balance Change");
        assert_eq!(payload["embeds"][0]["description"], "Change: +1.0 ETH");
        assert!(payload["embeds"][0]["timestamp"].is_string());
    }
}
