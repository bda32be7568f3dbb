//! Reply delivery from the egress queue.

use {
    async_trait::async_trait,
    botdeck_channels::{SessionHandle, TextFormat},
    botdeck_queue::{Delivery, DeliveryHandler, DeliveryOutcome, ReplyEnvelope},
    secrecy::ExposeSecret,
    tracing::{debug, error, warn},
};

/// Sends each reply with the bot named by its token, or with the shared
/// reply bot when the envelope carries no known token.
///
/// Replies are sent as plain text: their content comes from workers that
/// know nothing about the platform's markup rules.
pub struct ReplyDispatcher {
    handles: Vec<SessionHandle>,
    fallback: Option<SessionHandle>,
}

impl ReplyDispatcher {
    pub fn new(handles: Vec<SessionHandle>, fallback: Option<SessionHandle>) -> Self {
        Self { handles, fallback }
    }

    fn sender_for(&self, reply: &ReplyEnvelope) -> Option<&SessionHandle> {
        reply
            .bot_token
            .as_deref()
            .and_then(|token| {
                self.handles
                    .iter()
                    .find(|h| h.token().expose_secret() == token)
            })
            .or(self.fallback.as_ref())
    }
}

#[async_trait]
impl DeliveryHandler for ReplyDispatcher {
    async fn handle(&self, delivery: &Delivery) -> DeliveryOutcome {
        let reply = match ReplyEnvelope::decode(&delivery.body) {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    queue = %delivery.queue,
                    delivery = delivery.id,
                    error = %e,
                    "undecodable reply, dead-lettering"
                );
                return DeliveryOutcome::Reject;
            },
        };

        let Some(sender) = self.sender_for(&reply) else {
            error!(
                chat_id = reply.chat_id,
                "no bot can send this reply, dead-lettering"
            );
            return DeliveryOutcome::Reject;
        };

        match sender
            .outbound()
            .send_text(reply.chat_id, &reply.text, TextFormat::Plain)
            .await
        {
            Ok(()) => {
                debug!(account_id = sender.name(), chat_id = reply.chat_id, "reply delivered");
                DeliveryOutcome::Ack
            },
            Err(e) => {
                warn!(
                    account_id = sender.name(),
                    chat_id = reply.chat_id,
                    attempt = delivery.attempt,
                    error = %e,
                    "reply delivery failed"
                );
                DeliveryOutcome::Retry
            },
        }
    }
}
