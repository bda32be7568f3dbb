//! Wire shapes carried over the ingress and egress queues.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One inbound platform update, tagged with the credential of the bot that
/// received it. Published to the ingress queue.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub bot_token: String,
    /// The update exactly as the platform delivered it.
    pub update: serde_json::Value,
}

impl InboundEnvelope {
    pub fn new(bot_token: impl Into<String>, update: serde_json::Value) -> Self {
        Self {
            bot_token: bot_token.into(),
            update,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl std::fmt::Debug for InboundEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundEnvelope")
            .field("bot_token", &"[REDACTED]")
            .field("update", &self.update)
            .finish()
    }
}

/// A reply to deliver to a chat. Consumed from the egress queue.
///
/// `chatId` is also accepted as `targetId`. When `botToken` is absent the
/// configured reply bot sends the message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(alias = "targetId")]
    pub chat_id: i64,
    pub text: String,
}

impl ReplyEnvelope {
    /// Decode and check a delivery body. Any error here marks the message as
    /// poison: redelivering it cannot succeed.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let reply: Self = serde_json::from_slice(body)?;
        if reply.text.trim().is_empty() {
            return Err(Error::invalid_envelope("reply text is empty"));
        }
        Ok(reply)
    }
}

impl std::fmt::Debug for ReplyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyEnvelope")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("chat_id", &self.chat_id)
            .field("text", &self.text)
            .finish()
    }
}
