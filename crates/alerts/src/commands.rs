//! Bot command parsing and dispatch.

use crate::broadcast::MessageTransport;
use crate::chat::{ChatId, InboundEvent};
use crate::format;
use crate::permission::{Permission, PermissionPolicy};
use crate::registry::SubscriberRegistry;
use std::sync::Arc;
use std::time::Duration;
use teloxide::utils::command::BotCommands;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use whale_core::TrackedWallet;

/// Bot commands.
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available Commands:")]
pub enum BotCommand {
    #[command(description = "Subscribe to notifications")]
    Start,
    #[command(description = "Unsubscribe from notifications")]
    Stop,
    #[command(description = "Check your subscription status")]
    Status,
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "View tracker system information")]
    Info,
    #[command(description = "View monitored wallet addresses")]
    Wallets,
    #[command(description = "Get latest wallet analysis")]
    Analysis,
}

impl BotCommand {
    /// Subscription management is reserved for group admins.
    #[inline]
    pub fn is_admin_only(self) -> bool {
        matches!(self, BotCommand::Start | BotCommand::Stop)
    }
}

/// Static facts about the running tracker, used by informational replies.
#[derive(Debug, Clone)]
pub struct TrackerInfo {
    pub wallets: Vec<TrackedWallet>,
    pub check_interval: Duration,
    pub balance_threshold: f64,
    pub position_change_threshold: f64,
    pub native_symbol: String,
}

/// Side effects the dispatcher hands off to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherEvent {
    /// A chat just subscribed; send it an initial analysis.
    NewSubscriber(ChatId),
    /// A subscribed chat asked for a fresh analysis.
    AnalysisRequested(ChatId),
}

/// What `handle` did with an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command for this bot.
    Ignored,
    Denied(BotCommand),
    Handled(BotCommand),
}

/// Interprets inbound commands against the subscriber registry.
pub struct CommandDispatcher {
    registry: Arc<SubscriberRegistry>,
    transport: Arc<dyn MessageTransport>,
    policy: PermissionPolicy,
    info: TrackerInfo,
    events: Option<UnboundedSender<DispatcherEvent>>,
    bot_username: String,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        transport: Arc<dyn MessageTransport>,
        policy: PermissionPolicy,
        info: TrackerInfo,
    ) -> Self {
        Self {
            registry,
            transport,
            policy,
            info,
            events: None,
            bot_username: String::new(),
        }
    }

    /// Channel receiving [`DispatcherEvent`]s.
    pub fn with_events(mut self, events: UnboundedSender<DispatcherEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Username used to reject `/cmd@otherbot`.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = username.into();
        self
    }

    /// Parse the first token of `text` as a command.
    pub fn parse_command(&self, text: &str) -> Option<BotCommand> {
        let token = text.split_whitespace().next()?;
        if !token.starts_with('/') {
            return None;
        }
        BotCommand::parse(token, &self.bot_username).ok()
    }

    /// Run one inbound event through the permission policy and the command
    /// handlers. Unrecognized text gets no reply.
    pub async fn handle(&self, event: &InboundEvent) -> DispatchOutcome {
        let Some(command) = self.parse_command(&event.text) else {
            return DispatchOutcome::Ignored;
        };
        let chat_id = event.chat_id;
        debug!(chat_id = chat_id, command = ?command, "Handling command");

        if let Permission::Denied(reply) = self.policy.check(event, command).await {
            self.reply(chat_id, &reply).await;
            return DispatchOutcome::Denied(command);
        }

        match command {
            BotCommand::Start => {
                if self.registry.add(chat_id).await {
                    self.reply(chat_id, &format::welcome()).await;
                    info!(chat_id = chat_id, chat = %event.chat_name(), "New subscription");
                    self.emit(DispatcherEvent::NewSubscriber(chat_id));
                } else {
                    self.reply(chat_id, &format::already_subscribed()).await;
                }
            }
            BotCommand::Stop => {
                let reply = if self.registry.remove(chat_id).await {
                    format::unsubscribed()
                } else {
                    format::not_subscribed()
                };
                self.reply(chat_id, &reply).await;
            }
            BotCommand::Status => {
                let total = self.registry.count();
                let reply = if self.registry.contains(chat_id) {
                    format::status(&event.chat_name(), chat_id, event.chat_type.is_private(), total)
                } else {
                    format::status_not_subscribed(total)
                };
                self.reply(chat_id, &reply).await;
            }
            BotCommand::Help => {
                let commands = BotCommand::descriptions().to_string();
                self.reply(chat_id, &format::help(event.chat_type.is_private(), &commands))
                    .await;
            }
            BotCommand::Info => {
                self.reply(chat_id, &format::info(&self.info, self.registry.count()))
                    .await;
            }
            BotCommand::Wallets => {
                self.reply(chat_id, &format::wallets(&self.info.wallets)).await;
            }
            BotCommand::Analysis => {
                if !self.registry.contains(chat_id) {
                    self.reply(chat_id, &format::subscribe_first()).await;
                } else {
                    self.reply(chat_id, &format::analysis_generating()).await;
                    if !self.emit(DispatcherEvent::AnalysisRequested(chat_id)) {
                        self.reply(chat_id, &format::analysis_unavailable()).await;
                    }
                }
            }
        }

        DispatchOutcome::Handled(command)
    }

    fn emit(&self, event: DispatcherEvent) -> bool {
        match &self.events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.transport.send(chat_id, text).await {
            warn!(chat_id = chat_id, error = %e, "Failed to send reply");
        }
    }
}
