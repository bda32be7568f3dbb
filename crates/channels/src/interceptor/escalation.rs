use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    botdeck_audit::{AuditStore, ErrorRecord},
    botdeck_common::text::{escape_html, truncate_chars},
    futures::FutureExt,
    tracing::{error, warn},
};

use crate::{
    event::InboundEvent,
    handle::SessionHandle,
    interceptor::{Interceptor, Next},
    plugin::{Outbound, TextFormat},
};

const ALERT_MESSAGE_MAX_CHARS: usize = 1000;

/// Where failure alerts go: the operator chat, sent by the alert bot.
#[derive(Clone)]
pub struct AlertTarget {
    pub chat_id: i64,
    pub outbound: Arc<dyn Outbound>,
}

/// Captures handler errors and panics.
///
/// Each failure is persisted as one error record, then an alert is sent to
/// the operator. The dispatch is reported as handled so the session keeps
/// polling.
pub struct EscalationInterceptor {
    store: Arc<dyn AuditStore>,
    alert: Option<AlertTarget>,
}

struct Failure {
    message: String,
    trace: String,
}

impl EscalationInterceptor {
    pub fn new(store: Arc<dyn AuditStore>, alert: Option<AlertTarget>) -> Self {
        Self { store, alert }
    }

    async fn escalate(&self, bot: &str, failure: Failure) {
        error!(account_id = bot, error = %failure.message, "handler failed");

        let record = ErrorRecord::new(bot, failure.message.clone(), Some(failure.trace));
        if let Err(e) = self.store.save_error(&record).await {
            warn!(account_id = bot, error = %e, "failed to persist error record");
        }

        let Some(alert) = &self.alert else {
            return;
        };
        let text = format!(
            "🚨 <b>Platform error</b>\n\n🤖 <b>Bot:</b> <code>{}</code>\n❌ <b>Error:</b> {}\n\nDetails are stored in <code>error_log</code>.",
            escape_html(bot),
            escape_html(&truncate_chars(&failure.message, ALERT_MESSAGE_MAX_CHARS)),
        );
        if let Err(e) = alert
            .outbound
            .send_text(alert.chat_id, &text, TextFormat::Html)
            .await
        {
            warn!(account_id = bot, error = %e, "failed to deliver failure alert");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[async_trait]
impl Interceptor for EscalationInterceptor {
    async fn intercept(
        &self,
        handle: &SessionHandle,
        event: &InboundEvent,
        next: Next<'_>,
    ) -> Result<()> {
        let outcome = AssertUnwindSafe(next.run(handle, event))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => Failure {
                message: format!("{e:#}"),
                trace: format!("{e:?}"),
            },
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                Failure {
                    trace: format!("panic while handling update {}: {message}", event.update_id),
                    message,
                }
            },
        };

        self.escalate(handle.name(), failure).await;
        Ok(())
    }
}
