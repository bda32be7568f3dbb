use {
    anyhow::Result,
    botdeck_channels::{InboundEvent, SessionHandle, TextFormat},
    tracing::debug,
};

/// The media bot only publishes notifications; from users it answers
/// `/start` and ignores everything else.
pub struct MediaBot;

impl MediaBot {
    pub async fn handle(&self, handle: &SessionHandle, event: &InboundEvent) -> Result<()> {
        let (Some(chat_id), Some(text)) = (event.chat_id, event.command_text()) else {
            return Ok(());
        };
        if !text.eq_ignore_ascii_case("/start") {
            debug!(account_id = handle.name(), chat_id, "ignoring message to media bot");
            return Ok(());
        }

        let greeting = format!(
            "🎬 {} is active. This bot publishes media content notifications.",
            handle.name()
        );
        handle
            .outbound()
            .send_text(chat_id, &greeting, TextFormat::Plain)
            .await
    }
}
