//! Fakes shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use {
    anyhow::Result,
    async_trait::async_trait,
    botdeck_channels::{Outbound, SessionHandle, TextFormat},
    secrecy::Secret,
};

/// One message captured by [`RecordingOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub photo: Option<String>,
    pub format: TextFormat,
}

#[derive(Default)]
pub(crate) struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
    fail_text: bool,
    fail_photo: bool,
}

impl RecordingOutbound {
    pub(crate) fn failing() -> Self {
        Self {
            fail_text: true,
            fail_photo: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_photos() -> Self {
        Self {
            fail_photo: true,
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(sent);
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_text(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()> {
        if self.fail_text {
            anyhow::bail!("chat not found");
        }
        self.record(Sent {
            chat_id,
            text: text.to_string(),
            photo: None,
            format,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        format: TextFormat,
    ) -> Result<()> {
        if self.fail_photo {
            anyhow::bail!("wrong file identifier/HTTP URL specified");
        }
        self.record(Sent {
            chat_id,
            text: caption.to_string(),
            photo: Some(photo_url.to_string()),
            format,
        });
        Ok(())
    }
}

pub(crate) fn handle_with(name: &str, outbound: Arc<RecordingOutbound>) -> SessionHandle {
    SessionHandle::new(name, Secret::new(format!("{name}:token")), outbound)
}
