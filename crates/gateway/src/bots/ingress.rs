use {
    anyhow::{Context as _, Result},
    botdeck_channels::{InboundEvent, SessionHandle},
    botdeck_queue::{InboundEnvelope, Publisher},
    secrecy::ExposeSecret,
    tracing::debug,
};

/// Forwards every update, untouched, to the ingress queue. No business
/// logic runs here; workers behind the queue answer on the replies queue.
pub struct IngressBot {
    updates: Publisher,
}

impl IngressBot {
    pub fn new(updates: Publisher) -> Self {
        Self { updates }
    }

    pub async fn handle(&self, handle: &SessionHandle, event: &InboundEvent) -> Result<()> {
        let envelope = InboundEnvelope::new(handle.token().expose_secret(), event.raw.clone());
        self.updates
            .publish_json(&envelope)
            .await
            .with_context(|| {
                format!(
                    "failed to publish update {} to {}",
                    event.update_id,
                    self.updates.queue()
                )
            })?;
        debug!(
            account_id = handle.name(),
            update_id = event.update_id,
            queue = self.updates.queue(),
            "update forwarded"
        );
        Ok(())
    }
}
