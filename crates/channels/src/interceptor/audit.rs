use {anyhow::Result, async_trait::async_trait, botdeck_audit::{ActionRecord, AuditWriter}};

use crate::{
    event::InboundEvent,
    handle::SessionHandle,
    interceptor::{Interceptor, Next},
};

/// Queues an action record for every event that carries a chat id, then
/// continues. Never waits on the store and never fails the dispatch.
pub struct AuditInterceptor {
    writer: AuditWriter,
}

impl AuditInterceptor {
    pub fn new(writer: AuditWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl Interceptor for AuditInterceptor {
    async fn intercept(
        &self,
        handle: &SessionHandle,
        event: &InboundEvent,
        next: Next<'_>,
    ) -> Result<()> {
        if let Some(chat_id) = event.chat_id {
            self.writer.submit(ActionRecord::new(
                handle.name(),
                chat_id,
                event.text.clone(),
            ));
        }
        next.run(handle, event).await
    }
}
