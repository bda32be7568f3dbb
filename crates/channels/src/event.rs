/// One inbound platform update, reduced to what the pipeline needs.
///
/// `raw` keeps the full update so the ingress bot can forward it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub text: Option<String>,
    pub raw: serde_json::Value,
}

impl InboundEvent {
    /// A plain text message, mostly useful for tests.
    pub fn text(update_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            update_id,
            chat_id: Some(chat_id),
            raw: serde_json::json!({
                "update_id": update_id,
                "message": { "chat": { "id": chat_id }, "text": text },
            }),
            text: Some(text),
        }
    }

    /// Trimmed text, if any.
    pub fn command_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
