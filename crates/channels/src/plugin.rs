use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

use crate::{event::InboundEvent, handle::SessionHandle};

/// How outbound text should be interpreted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    /// Platform HTML subset (`<b>`, `<i>`, `<code>`, `<a>`).
    Html,
}

/// Send messages on behalf of one bot credential.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()>;

    /// Send a photo by URL with a caption.
    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        format: TextFormat,
    ) -> Result<()>;
}

/// The platform's long-polling machinery.
///
/// Constructing a substrate is the only fallible step before the registry
/// exists; individual [`PollingSubstrate::connect`] failures are per-session.
#[async_trait]
pub trait PollingSubstrate: Send + Sync {
    /// Outbound capability for a credential. `name` labels its log output.
    fn outbound(&self, name: &str, token: &secrecy::Secret<String>) -> Arc<dyn Outbound>;

    /// Register `handle` with the platform and open its update stream.
    ///
    /// `resume_from` is the first update id the previous session for the
    /// same handle did not dispatch. Updates before it must not be delivered
    /// again; updates from it onward must be.
    async fn connect(
        &self,
        handle: &SessionHandle,
        resume_from: Option<i64>,
    ) -> crate::Result<Box<dyn UpdateStream>>;
}

/// An open long-polling connection.
#[async_trait]
pub trait UpdateStream: Send {
    /// Wait for the next batch of updates.
    ///
    /// Must be cancel-safe: dropping the future before it resolves loses no
    /// update, because the cursor only advances when a batch is returned.
    async fn next_batch(&mut self) -> crate::Result<Vec<InboundEvent>>;

    /// Position after the last returned batch.
    fn cursor(&self) -> Option<i64>;
}
