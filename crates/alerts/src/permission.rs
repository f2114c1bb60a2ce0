//! Per-command permission policy for group chats.

use crate::chat::{ChatId, InboundEvent, UserId};
use crate::commands::BotCommand;
use crate::format;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Resolves whether a user holds admin rights in a group.
#[async_trait]
pub trait PrivilegeLookup: Send + Sync {
    /// Lookup failures resolve to `false`.
    async fn is_privileged(&self, chat_id: ChatId, user_id: UserId) -> bool;
}

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Allowed,
    /// Carries the reply to send instead of running the command.
    Denied(String),
}

impl Permission {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Permission::Allowed)
    }
}

/// Private chats may run everything; in groups the admin-only commands need
/// a privileged sender.
#[derive(Clone)]
pub struct PermissionPolicy {
    lookup: Arc<dyn PrivilegeLookup>,
}

impl PermissionPolicy {
    pub fn new(lookup: Arc<dyn PrivilegeLookup>) -> Self {
        Self { lookup }
    }

    pub async fn check(&self, event: &InboundEvent, command: BotCommand) -> Permission {
        if event.chat_type.is_private() || !command.is_admin_only() {
            return Permission::Allowed;
        }

        let privileged = match event.user_id {
            Some(user_id) => self.lookup.is_privileged(event.chat_id, user_id).await,
            None => false,
        };
        if privileged {
            return Permission::Allowed;
        }

        warn!(
            chat_id = event.chat_id,
            user_id = ?event.user_id,
            chat = %event.chat_name(),
            command = ?command,
            "Unauthorized admin command attempt"
        );
        Permission::Denied(format::permission_denied(&event.sender_mention()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chat::ChatType;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    /// Admin set keyed by (chat, user).
    #[derive(Default)]
    pub(crate) struct StaticAdmins(pub HashSet<(ChatId, UserId)>);

    #[async_trait]
    impl PrivilegeLookup for StaticAdmins {
        async fn is_privileged(&self, chat_id: ChatId, user_id: UserId) -> bool {
            self.0.contains(&(chat_id, user_id))
        }
    }

    fn policy() -> PermissionPolicy {
        let admins = StaticAdmins([(-100, 1)].into_iter().collect());
        PermissionPolicy::new(Arc::new(admins))
    }

    #[tokio::test]
    async fn test_private_chat_always_allowed() {
        let event = InboundEvent::new(5, Some(5), ChatType::Private, "/start");
        assert_eq!(policy().check(&event, BotCommand::Start).await, Permission::Allowed);
    }

    #[tokio::test]
    async fn test_group_admin_commands_need_privilege() {
        let policy = policy();

        let admin = InboundEvent::new(-100, Some(1), ChatType::Group, "/start");
        assert!(policy.check(&admin, BotCommand::Start).await.is_allowed());

        let member = InboundEvent::new(-100, Some(2), ChatType::Supergroup, "/stop");
        match policy.check(&member, BotCommand::Stop).await {
            Permission::Denied(msg) => assert!(msg.contains("/start, /stop")),
            Permission::Allowed => panic!("member must not unsubscribe the group"),
        }

        let anonymous = InboundEvent::new(-100, None, ChatType::Channel, "/start");
        assert!(!policy.check(&anonymous, BotCommand::Start).await.is_allowed());
    }

    #[tokio::test]
    async fn test_group_public_commands_allowed() {
        let member = InboundEvent::new(-100, Some(2), ChatType::Group, "/status");
        for command in [BotCommand::Status, BotCommand::Help, BotCommand::Analysis, BotCommand::Wallets] {
            assert!(policy().check(&member, command).await.is_allowed());
        }
    }
}
