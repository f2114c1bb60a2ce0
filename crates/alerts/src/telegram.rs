//! Telegram bot client.

use crate::broadcast::MessageTransport;
use crate::chat::{ChatId, ChatType, InboundEvent, UserId};
use crate::listener::{InboundSource, UpdateCursor};
use crate::permission::PrivilegeLookup;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::payloads::{GetUpdatesSetters, SendMessageSetters};
use teloxide::requests::Requester;
use teloxide::types::{AllowedUpdate, ParseMode, Update, UpdateKind};
use teloxide::{Bot, RequestError};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Keeps outbound calls under the 30 messages/second bot limit.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(34);

/// Longest server-advertised backoff honoured before the single retry.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Server-side long-poll duration for `getUpdates`.
pub const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] RequestError),
}

/// Enforces a minimum spacing between consecutive outbound calls.
#[derive(Debug)]
pub struct SendGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl SendGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the spacing since the previous call has elapsed, then
    /// claim the slot.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Bot wrapper implementing the transport, privilege and inbound seams.
pub struct TelegramClient {
    bot: Bot,
    /// Separate HTTP client whose timeout outlasts the long poll.
    poll_bot: Bot,
    gate: SendGate,
}

impl TelegramClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, TelegramError> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .map_err(RequestError::Network)?;
        let poll_client = teloxide::net::default_reqwest_settings()
            .timeout(LONG_POLL_TIMEOUT + timeout)
            .build()
            .map_err(RequestError::Network)?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            poll_bot: Bot::with_client(token, poll_client),
            gate: SendGate::new(DEFAULT_MIN_INTERVAL),
        })
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.gate = SendGate::new(min_interval);
        self
    }

    /// Point both bots at another Bot API server.
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.bot = self.bot.set_api_url(url.clone());
        self.poll_bot = self.poll_bot.set_api_url(url);
        self
    }

    async fn send_once(&self, chat_id: ChatId, text: &str) -> Result<(), RequestError> {
        self.gate.wait().await;
        self.bot
            .send_message(teloxide::types::ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    /// Send an HTML message, retrying once after a rate-limit response.
    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError> {
        match self.send_once(chat_id, text).await {
            Err(RequestError::RetryAfter(after)) => {
                let delay = after.duration().min(MAX_RETRY_AFTER);
                warn!(chat_id = chat_id, delay_secs = delay.as_secs(), "Telegram rate limit hit, retrying once");
                tokio::time::sleep(delay).await;
                self.send_once(chat_id, text).await?;
            }
            result => result?,
        }
        debug!(chat_id = chat_id, "Message sent");
        Ok(())
    }

    /// Long-poll for message updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let updates = self
            .poll_bot
            .get_updates()
            .offset(i32::try_from(offset).unwrap_or(i32::MAX))
            .timeout(LONG_POLL_TIMEOUT.as_secs() as u32)
            .allowed_updates([AllowedUpdate::Message])
            .await?;
        Ok(updates)
    }

    pub async fn is_chat_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool, TelegramError> {
        let Ok(user_id) = u64::try_from(user_id) else {
            return Ok(false);
        };
        let member = self
            .bot
            .get_chat_member(teloxide::types::ChatId(chat_id), teloxide::types::UserId(user_id))
            .await?;
        Ok(member.is_privileged())
    }

    /// The bot's own username, used to recognise `/cmd@botname`.
    pub async fn bot_username(&self) -> Result<Option<String>, TelegramError> {
        let me = self.bot.get_me().await?;
        Ok(me.user.username)
    }
}

/// Text messages become inbound events; everything else is dropped.
fn inbound_event(update: Update) -> Option<InboundEvent> {
    let UpdateKind::Message(message) = update.kind else {
        return None;
    };
    let text = message.text().filter(|t| !t.is_empty())?.to_string();

    let mut event = InboundEvent::new(
        message.chat.id.0,
        message.from.as_ref().map(|u| u.id.0 as UserId),
        ChatType::from(&message.chat),
        text,
    );
    event.username = message.from.as_ref().and_then(|u| u.username.clone());
    event.chat_title = message.chat.title().map(str::to_string);
    Some(event)
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError> {
        self.send_message(chat_id, text).await
    }
}

#[async_trait]
impl PrivilegeLookup for TelegramClient {
    async fn is_privileged(&self, chat_id: ChatId, user_id: UserId) -> bool {
        match self.is_chat_admin(chat_id, user_id).await {
            Ok(privileged) => privileged,
            Err(e) => {
                warn!(chat_id = chat_id, user_id = user_id, error = %e, "Admin check failed");
                false
            }
        }
    }
}

#[async_trait]
impl InboundSource for TelegramClient {
    async fn poll(&self, cursor: UpdateCursor) -> Result<(Vec<InboundEvent>, UpdateCursor), TelegramError> {
        let updates = self.get_updates(cursor.offset()).await?;

        let mut next = cursor;
        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            next = next.advance_past(i64::from(update.id.0));
            if let Some(event) = inbound_event(update) {
                events.push(event);
            }
        }
        Ok((events, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RATE_LIMITED: &str =
        r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 1","parameters":{"retry_after":1}}"#;
    const SENT: &str =
        r#"{"ok":true,"result":{"message_id":1,"date":1700000000,"chat":{"id":9,"type":"private"},"text":"hi"}}"#;

    /// Bot API stand-in answering each request with the next scripted
    /// `(status, body)`, repeating the last one. Returns the URL and a hit counter.
    async fn bot_api(script: Vec<(u16, &'static str)>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)];
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (url, hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn client(url: Url) -> TelegramClient {
        TelegramClient::new("123:TEST", Duration::from_secs(5))
            .unwrap()
            .with_min_interval(Duration::ZERO)
            .with_base_url(url)
    }

    #[tokio::test]
    async fn test_send_retries_once_after_rate_limit() {
        let (url, hits) = bot_api(vec![(429, RATE_LIMITED), (200, SENT)]).await;
        let result = client(url).send_message(9, "<b>hi</b>").await;
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_send_gives_up_after_second_rate_limit() {
        let (url, hits) = bot_api(vec![(429, RATE_LIMITED)]).await;
        let result = client(url).send_message(9, "hi").await;
        assert!(matches!(result, Err(TelegramError::Api(RequestError::RetryAfter(_)))));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_send_does_not_retry_api_errors() {
        let (url, hits) = bot_api(vec![(
            403,
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        )])
        .await;
        let result = client(url).send_message(9, "hi").await;
        assert!(matches!(result, Err(TelegramError::Api(RequestError::Api(_)))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_into_event() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 900,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": {"id": -100123, "type": "supergroup", "title": "Whales"},
                "from": {"id": 55, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "text": "/status"
            }
        }))
        .unwrap();

        let event = inbound_event(update).unwrap();
        assert_eq!(event.chat_id, -100123);
        assert_eq!(event.user_id, Some(55));
        assert_eq!(event.chat_type, ChatType::Supergroup);
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.chat_title.as_deref(), Some("Whales"));
        assert_eq!(event.text, "/status");
    }

    #[test]
    fn test_non_text_updates_are_dropped() {
        let edited: Update = serde_json::from_value(json!({
            "update_id": 2,
            "edited_message": {
                "message_id": 1,
                "date": 1700000000,
                "edit_date": 1700000001,
                "chat": {"id": 1, "type": "private"},
                "text": "/start"
            }
        }))
        .unwrap();
        assert!(inbound_event(edited).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_gate_spacing() {
        let gate = SendGate::new(DEFAULT_MIN_INTERVAL);
        let start = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        assert!(start.elapsed() >= DEFAULT_MIN_INTERVAL * 2);
    }
}
