//! Business handlers for the managed bots.
//!
//! Each configured bot gets a [`BotKind`] picked by its role. The registry
//! sees them only as [`Handler`]s, wrapped in the shared interceptor
//! pipeline.

pub mod admin;
pub mod ingress;
pub mod media;

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    botdeck_audit::AuditStore,
    botdeck_channels::{Handler, InboundEvent, SessionHandle},
    botdeck_config::BotRole,
    botdeck_queue::Publisher,
};

pub use {
    admin::{AdminBot, RegistryLink},
    ingress::IngressBot,
    media::MediaBot,
};

/// Shared dependencies for building bot handlers.
#[derive(Clone)]
pub struct BotDeps {
    pub store: Arc<dyn AuditStore>,
    pub registry: Arc<RegistryLink>,
    pub operator_chat_id: Option<i64>,
    pub updates: Publisher,
}

pub enum BotKind {
    Admin(AdminBot),
    Media(MediaBot),
    Gateway(IngressBot),
}

impl BotKind {
    pub fn for_role(role: BotRole, deps: &BotDeps) -> Self {
        match role {
            BotRole::Admin => Self::Admin(AdminBot::new(
                deps.operator_chat_id,
                Arc::clone(&deps.store),
                Arc::clone(&deps.registry),
            )),
            BotRole::Media => Self::Media(MediaBot),
            BotRole::Gateway => Self::Gateway(IngressBot::new(deps.updates.clone())),
        }
    }

    pub fn role(&self) -> BotRole {
        match self {
            Self::Admin(_) => BotRole::Admin,
            Self::Media(_) => BotRole::Media,
            Self::Gateway(_) => BotRole::Gateway,
        }
    }
}

#[async_trait]
impl Handler for BotKind {
    async fn handle(&self, handle: &SessionHandle, event: &InboundEvent) -> Result<()> {
        match self {
            Self::Admin(bot) => bot.handle(handle, event).await,
            Self::Media(bot) => bot.handle(handle, event).await,
            Self::Gateway(bot) => bot.handle(handle, event).await,
        }
    }
}
