//! Subscriber management and alert delivery for the wallet tracker.
//!
//! This crate provides:
//! - JSON-persisted subscriber registry
//! - Telegram command dispatch with a group permission policy
//! - Broadcast fan-out and notification channels
//! - HTML message templates

pub mod broadcast;
pub mod chat;
pub mod commands;
pub mod format;
pub mod listener;
pub mod notifier;
pub mod permission;
pub mod registry;
pub mod telegram;

pub use broadcast::{BroadcastReport, Broadcaster, MessageTransport};
pub use chat::{ChatId, ChatType, InboundEvent, UserId};
pub use commands::{BotCommand, CommandDispatcher, DispatchOutcome, DispatcherEvent, TrackerInfo};
pub use listener::{CommandListener, InboundSource, UpdateCursor};
pub use notifier::{
    ConsoleChannel, DiscordWebhookChannel, NotificationChannel, Notifier, TelegramBroadcastChannel,
    TelegramDirectChannel,
};
pub use permission::{Permission, PermissionPolicy, PrivilegeLookup};
pub use registry::{StoreError, SubscriberRegistry, SubscriberStore};
pub use telegram::{TelegramClient, TelegramError};
