//! Chat identities and inbound command events.

use serde::{Deserialize, Serialize};

/// Telegram chat identifier. Negative for groups and channels.
pub type ChatId = i64;

/// Telegram user identifier.
pub type UserId = i64;

/// Kind of chat a command arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl From<&teloxide::types::Chat> for ChatType {
    fn from(chat: &teloxide::types::Chat) -> Self {
        if chat.is_private() {
            ChatType::Private
        } else if chat.is_supergroup() {
            ChatType::Supergroup
        } else if chat.is_channel() {
            ChatType::Channel
        } else {
            ChatType::Group
        }
    }
}

impl ChatType {
    #[inline]
    pub fn is_private(self) -> bool {
        self == ChatType::Private
    }
}

/// One inbound text message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    /// Sender; absent for anonymous channel posts.
    pub user_id: Option<UserId>,
    pub chat_type: ChatType,
    pub text: String,
    pub username: Option<String>,
    pub chat_title: Option<String>,
}

impl InboundEvent {
    pub fn new(chat_id: ChatId, user_id: Option<UserId>, chat_type: ChatType, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            chat_type,
            text: text.into(),
            username: None,
            chat_title: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_chat_title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    /// `@username`, falling back to the numeric sender id.
    pub fn sender_mention(&self) -> String {
        match (&self.username, self.user_id) {
            (Some(name), _) => format!("@{}", name),
            (None, Some(id)) => format!("User {}", id),
            (None, None) => "Unknown user".to_string(),
        }
    }

    /// Human name for the chat: group title or sender mention.
    pub fn chat_name(&self) -> String {
        if self.chat_type.is_private() {
            self.sender_mention()
        } else {
            self.chat_title
                .clone()
                .unwrap_or_else(|| format!("Chat {}", self.chat_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chat_type_from_telegram_chat() {
        let chat = |value: serde_json::Value| -> teloxide::types::Chat { serde_json::from_value(value).unwrap() };
        let kind = |value| ChatType::from(&chat(value));

        assert_eq!(kind(serde_json::json!({"id": 7, "type": "private", "first_name": "Al"})), ChatType::Private);
        assert_eq!(kind(serde_json::json!({"id": -1, "type": "group", "title": "G"})), ChatType::Group);
        assert_eq!(kind(serde_json::json!({"id": -100, "type": "supergroup", "title": "S"})), ChatType::Supergroup);
        assert_eq!(kind(serde_json::json!({"id": -200, "type": "channel", "title": "C"})), ChatType::Channel);
    }

    #[test]
    fn test_names() {
        let event = InboundEvent::new(-100, Some(7), ChatType::Group, "/status").with_chat_title("Whales");
        assert_eq!(event.chat_name(), "Whales");
        assert_eq!(event.sender_mention(), "User 7");

        let event = InboundEvent::new(7, Some(7), ChatType::Private, "/status").with_username("alice");
        assert_eq!(event.chat_name(), "@alice");
    }
}
