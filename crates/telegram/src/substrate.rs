use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        prelude::*,
        types::{AllowedUpdate, Update, UpdateKind},
    },
    tracing::{debug, info, warn},
};

use botdeck_channels::{InboundEvent, Outbound, PollingSubstrate, SessionHandle, UpdateStream};

use crate::{error::Error, outbound::TelegramOutbound};

/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Client timeout; longer than the long-poll timeout so the HTTP client
/// doesn't abort the request before Telegram responds.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(45);

/// Builds one [`Bot`] per credential, all sharing a single HTTP client.
pub struct TelegramSubstrate {
    /// Carries the shared client; its own token is never used.
    base: Bot,
}

impl TelegramSubstrate {
    pub fn new() -> crate::error::Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|e| Error::client(e.to_string()))?;
        Ok(Self {
            base: Bot::with_client("", client),
        })
    }

    fn bot(&self, token: &Secret<String>) -> Bot {
        Bot::with_client(token.expose_secret(), self.base.client().clone())
    }
}

#[async_trait]
impl PollingSubstrate for TelegramSubstrate {
    fn outbound(&self, name: &str, token: &Secret<String>) -> Arc<dyn Outbound> {
        Arc::new(TelegramOutbound::new(self.bot(token), name))
    }

    async fn connect(
        &self,
        handle: &SessionHandle,
        resume_from: Option<i64>,
    ) -> botdeck_channels::Result<Box<dyn UpdateStream>> {
        let bot = self.bot(handle.token());
        let account_id = handle.name().to_string();

        // Verify credentials before anything else.
        let me = bot.get_me().await.map_err(Error::from)?;

        // Delete any existing webhook so long polling works.
        bot.delete_webhook().await.map_err(Error::from)?;

        info!(
            account_id = %account_id,
            username = ?me.username,
            resume_from = ?resume_from,
            "telegram bot connected (webhook cleared)"
        );

        Ok(Box::new(TelegramStream {
            bot,
            account_id,
            offset: resume_from.and_then(|o| i32::try_from(o).ok()),
        }))
    }
}

struct TelegramStream {
    bot: Bot,
    account_id: String,
    offset: Option<i32>,
}

#[async_trait]
impl UpdateStream for TelegramStream {
    async fn next_batch(&mut self) -> botdeck_channels::Result<Vec<InboundEvent>> {
        let mut req = self.bot.get_updates().timeout(POLL_TIMEOUT_SECS).allowed_updates(vec![
            AllowedUpdate::Message,
            AllowedUpdate::EditedMessage,
            AllowedUpdate::CallbackQuery,
        ]);
        if let Some(offset) = self.offset {
            req = req.offset(offset);
        }

        let updates = req.await.map_err(Error::from)?;
        if let Some(last) = updates.last() {
            self.offset = Some(last.id.as_offset());
        }
        debug!(
            account_id = %self.account_id,
            count = updates.len(),
            "got telegram updates"
        );

        Ok(updates
            .iter()
            .filter_map(|u| event_from_update(&self.account_id, u))
            .collect())
    }

    fn cursor(&self) -> Option<i64> {
        self.offset.map(i64::from)
    }
}

fn event_from_update(account_id: &str, update: &Update) -> Option<InboundEvent> {
    let raw = match serde_json::to_value(update) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(account_id, error = %e, "failed to serialise telegram update, skipping");
            return None;
        },
    };

    let text = match &update.kind {
        UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => msg.text().map(String::from),
        UpdateKind::CallbackQuery(query) => query.data.clone(),
        _ => None,
    };

    Some(InboundEvent {
        update_id: i64::from(update.id.0),
        chat_id: update.chat().map(|c| c.id.0),
        text,
        raw,
    })
}
