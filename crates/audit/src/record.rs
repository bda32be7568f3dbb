use botdeck_common::time::now_ms;

/// One inbound event seen by a managed bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// Assigned by the store; `0` until persisted.
    pub id: i64,
    pub bot_name: String,
    pub chat_id: i64,
    pub message_text: Option<String>,
    pub created_at: i64,
}

impl ActionRecord {
    #[must_use]
    pub fn new(bot_name: impl Into<String>, chat_id: i64, message_text: Option<String>) -> Self {
        Self {
            id: 0,
            bot_name: bot_name.into(),
            chat_id,
            message_text,
            created_at: now_ms(),
        }
    }
}

/// A failure captured while a bot was handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub id: i64,
    pub bot_name: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub created_at: i64,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(
        bot_name: impl Into<String>,
        error_message: impl Into<String>,
        stack_trace: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            bot_name: bot_name.into(),
            error_message: error_message.into(),
            stack_trace,
            created_at: now_ms(),
        }
    }
}

/// Outcome of processing one webhook payload.
///
/// Starts out as a failure; [`WebhookRecord::succeeded`] flips it once the
/// notification path has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRecord {
    pub id: i64,
    /// `radarr`, `sonarr` or `truenas`.
    pub source: String,
    pub event_type: Option<String>,
    /// Raw JSON as received.
    pub payload: String,
    pub processed_successfully: bool,
    pub error_message: Option<String>,
    pub routed_to_bot: Option<String>,
    pub target_channel_id: Option<i64>,
    pub created_at: i64,
}

impl WebhookRecord {
    #[must_use]
    pub fn new(source: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: 0,
            source: source.into(),
            event_type: None,
            payload: payload.into(),
            processed_successfully: false,
            error_message: None,
            routed_to_bot: None,
            target_channel_id: None,
            created_at: now_ms(),
        }
    }

    pub fn succeeded(&mut self) {
        self.processed_successfully = true;
        self.error_message = None;
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.processed_successfully = false;
        self.error_message = Some(error.into());
    }
}
