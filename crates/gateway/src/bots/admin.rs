//! Operator command surface.
//!
//! Only the configured operator chat is answered. Commands may be sent with
//! or without the leading `/` and with a `@BotName` suffix.

use std::{
    fmt::Write as _,
    sync::{Arc, OnceLock, Weak},
};

use {
    anyhow::{Context as _, Result},
    botdeck_audit::AuditStore,
    botdeck_channels::{InboundEvent, SessionHandle, SessionRegistry, TextFormat},
    botdeck_common::{
        text::{escape_html, truncate_chars},
        time::{format_clock, now_ms, start_of_utc_day_ms},
    },
    tracing::{info, warn},
};

use crate::webhook::WebhookSource;

const RECENT_ERRORS: u32 = 5;
const RECENT_WEBHOOKS: u32 = 10;
const LISTED_FAILURES: usize = 5;
const ERROR_PREVIEW_CHARS: usize = 300;

/// Late-bound reference to the registry. The admin handler is built before
/// the registry that owns it, so the link is filled in afterwards.
#[derive(Default)]
pub struct RegistryLink(OnceLock<Weak<SessionRegistry>>);

impl RegistryLink {
    pub fn attach(&self, registry: &Arc<SessionRegistry>) {
        if self.0.set(Arc::downgrade(registry)).is_err() {
            warn!("session registry was already attached");
        }
    }

    pub fn get(&self) -> Option<Arc<SessionRegistry>> {
        self.0.get().and_then(Weak::upgrade)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Status,
    Restart(Option<&'a str>),
    Stats,
    Errors,
    Webhooks(Option<&'a str>),
    Help,
}

impl<'a> Command<'a> {
    fn parse(text: &'a str) -> Self {
        let mut words = text.split_whitespace();
        let Some(first) = words.next() else {
            return Self::Help;
        };
        let name = first.trim_start_matches('/');
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name.to_ascii_lowercase().as_str() {
            "status" => Self::Status,
            "restart" => Self::Restart(words.next()),
            "stats" => Self::Stats,
            "errors" => Self::Errors,
            "webhooks" => Self::Webhooks(words.next()),
            _ => Self::Help,
        }
    }
}

pub struct AdminBot {
    operator_chat_id: Option<i64>,
    store: Arc<dyn AuditStore>,
    registry: Arc<RegistryLink>,
}

impl AdminBot {
    pub fn new(
        operator_chat_id: Option<i64>,
        store: Arc<dyn AuditStore>,
        registry: Arc<RegistryLink>,
    ) -> Self {
        Self {
            operator_chat_id,
            store,
            registry,
        }
    }

    pub async fn handle(&self, handle: &SessionHandle, event: &InboundEvent) -> Result<()> {
        let (Some(chat_id), Some(text)) = (event.chat_id, event.command_text()) else {
            return Ok(());
        };
        if self.operator_chat_id != Some(chat_id) {
            warn!(account_id = handle.name(), chat_id, "ignoring command from non-operator chat");
            return Ok(());
        }

        let command = Command::parse(text);
        info!(account_id = handle.name(), ?command, "admin command");
        let reply = self.execute(command).await?;
        handle
            .outbound()
            .send_text(chat_id, &reply, TextFormat::Html)
            .await
    }

    async fn execute(&self, command: Command<'_>) -> Result<String> {
        match command {
            Command::Status => self.status(),
            Command::Restart(None) => Ok("⚠️ Usage: <code>/restart &lt;bot_name&gt;</code>".into()),
            Command::Restart(Some(name)) => self.restart(name).await,
            Command::Stats => self.stats().await,
            Command::Errors => self.errors().await,
            Command::Webhooks(None) => self.webhooks_today().await,
            Command::Webhooks(Some(source)) => self.recent_webhooks(source).await,
            Command::Help => Ok(help()),
        }
    }

    fn registry(&self) -> Result<Arc<SessionRegistry>> {
        self.registry.get().context("session registry is not available")
    }

    fn status(&self) -> Result<String> {
        let registry = self.registry()?;
        let mut out = String::from("📊 <b>Bot sessions</b>\n\n");
        for (name, state) in registry.statuses() {
            let _ = writeln!(out, "• <code>{}</code>: {state}", escape_html(&name));
        }
        Ok(out)
    }

    async fn restart(&self, name: &str) -> Result<String> {
        let registry = self.registry()?;
        let Some(canonical) = registry.canonical_name(name).map(str::to_string) else {
            return Ok(format!(
                "❌ Bot <code>{}</code> is not configured.",
                escape_html(name)
            ));
        };

        if registry.restart(&canonical).await {
            Ok(format!(
                "✅ Session <code>{}</code> restarted.",
                escape_html(&canonical)
            ))
        } else {
            Ok(format!(
                "❌ Session <code>{}</code> could not be re-registered: {}.",
                escape_html(&canonical),
                registry.status_of(&canonical)
            ))
        }
    }

    async fn stats(&self) -> Result<String> {
        let since = start_of_utc_day_ms(now_ms());
        let users = self.store.count_unique_chats_since(since).await?;
        Ok(format!(
            "📈 <b>Today (UTC)</b>\n\nUnique users: <b>{users}</b>"
        ))
    }

    async fn errors(&self) -> Result<String> {
        let errors = self.store.recent_errors(RECENT_ERRORS).await?;
        if errors.is_empty() {
            return Ok("✅ No incidents recorded.".into());
        }

        let mut out = format!("⚠️ <b>Latest {} incidents</b>\n\n", errors.len());
        for e in errors {
            let _ = write!(
                out,
                "🕒 {}\n🤖 Bot: <code>{}</code>\n❌ {}\n\n",
                format_clock(e.created_at),
                escape_html(&e.bot_name),
                escape_html(&truncate_chars(&e.error_message, ERROR_PREVIEW_CHARS))
            );
        }
        Ok(out)
    }

    async fn webhooks_today(&self) -> Result<String> {
        let since = start_of_utc_day_ms(now_ms());
        let mut out = String::from("🔔 <b>Webhooks today (UTC)</b>\n\n");
        for source in WebhookSource::ALL {
            let count = self.store.count_webhooks_since(source.as_str(), since).await?;
            let _ = writeln!(out, "• {}: <b>{count}</b>", source.label());
        }

        let failures = self.store.failed_webhooks_since(since).await?;
        if failures.is_empty() {
            out.push_str("\n✅ No failures.");
            return Ok(out);
        }
        let _ = writeln!(out, "\n❌ <b>Failures:</b> {}", failures.len());
        for f in failures.iter().take(LISTED_FAILURES) {
            let _ = writeln!(
                out,
                "🕒 {} <code>{}</code> {}",
                format_clock(f.created_at),
                escape_html(&f.source),
                escape_html(&truncate_chars(
                    f.error_message.as_deref().unwrap_or("-"),
                    ERROR_PREVIEW_CHARS
                ))
            );
        }
        Ok(out)
    }

    async fn recent_webhooks(&self, source: &str) -> Result<String> {
        let Some(source) = WebhookSource::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(source))
        else {
            return Ok(format!(
                "⚠️ Unknown source <code>{}</code>. Use radarr, sonarr or truenas.",
                escape_html(source)
            ));
        };

        let rows = self
            .store
            .recent_webhooks(source.as_str(), RECENT_WEBHOOKS)
            .await?;
        if rows.is_empty() {
            return Ok(format!("No {} webhooks recorded.", source.label()));
        }

        let mut out = format!("🔔 <b>Latest {} webhooks</b>\n\n", source.label());
        for row in rows {
            let _ = writeln!(
                out,
                "{} {} <code>{}</code>",
                if row.processed_successfully { "✅" } else { "❌" },
                format_clock(row.created_at),
                escape_html(row.event_type.as_deref().unwrap_or("-"))
            );
        }
        Ok(out)
    }
}

fn help() -> String {
    [
        "🛠 <b>Platform control</b>",
        "<code>/status</code> session health",
        "<code>/restart &lt;name&gt;</code> recreate a polling session",
        "<code>/stats</code> unique users today",
        "<code>/errors</code> latest incidents",
        "<code>/webhooks [source]</code> webhook activity",
    ]
    .join("\n")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            bots::{BotKind, MediaBot},
            testing::{RecordingOutbound, handle_with},
        },
        async_trait::async_trait,
        botdeck_audit::{ActionRecord, ErrorRecord, WebhookRecord, store_memory::MemoryAuditStore},
        botdeck_channels::{Outbound, PollingSubstrate, SessionSpec, UpdateStream},
        rstest::rstest,
        secrecy::Secret,
    };

    const OPERATOR: i64 = 1000;

    /// Connects every handle except `BrokenBot`; streams never yield.
    struct IdleSubstrate;

    struct IdleStream;

    #[async_trait]
    impl UpdateStream for IdleStream {
        async fn next_batch(&mut self) -> botdeck_channels::Result<Vec<InboundEvent>> {
            std::future::pending().await
        }

        fn cursor(&self) -> Option<i64> {
            None
        }
    }

    #[async_trait]
    impl PollingSubstrate for IdleSubstrate {
        fn outbound(&self, _name: &str, _token: &Secret<String>) -> Arc<dyn Outbound> {
            Arc::new(RecordingOutbound::default())
        }

        async fn connect(
            &self,
            handle: &SessionHandle,
            _resume_from: Option<i64>,
        ) -> botdeck_channels::Result<Box<dyn UpdateStream>> {
            if handle.name() == "BrokenBot" {
                return Err(botdeck_channels::Error::unavailable("invalid token"));
            }
            Ok(Box::new(IdleStream))
        }
    }

    fn registry(names: &[&str]) -> Arc<SessionRegistry> {
        let specs = names
            .iter()
            .map(|name| SessionSpec {
                handle: handle_with(name, Arc::new(RecordingOutbound::default())),
                handler: Arc::new(BotKind::Media(MediaBot)),
            })
            .collect();
        Arc::new(SessionRegistry::new(
            Arc::new(IdleSubstrate),
            botdeck_channels::Pipeline::new(),
            specs,
        ))
    }

    struct Fixture {
        bot: AdminBot,
        store: Arc<MemoryAuditStore>,
        outbound: Arc<RecordingOutbound>,
        handle: SessionHandle,
        registry: Arc<SessionRegistry>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryAuditStore::new());
        let link = Arc::new(RegistryLink::default());
        let registry = registry(&["AdminSystemBot", "MediaInfoBot", "BrokenBot"]);
        link.attach(&registry);
        let outbound = Arc::new(RecordingOutbound::default());
        Fixture {
            bot: AdminBot::new(Some(OPERATOR), store.clone(), link),
            store,
            handle: handle_with("AdminSystemBot", outbound.clone()),
            outbound,
            registry,
        }
    }

    async fn ask(f: &Fixture, text: &str) -> String {
        let before = f.outbound.sent().len();
        f.bot
            .handle(&f.handle, &InboundEvent::text(1, OPERATOR, text))
            .await
            .unwrap();
        let sent = f.outbound.sent();
        assert_eq!(sent.len(), before + 1, "expected one reply to {text:?}");
        let last = sent.last().unwrap();
        assert_eq!(last.chat_id, OPERATOR);
        assert_eq!(last.format, TextFormat::Html);
        last.text.clone()
    }

    #[rstest]
    #[case("/status", Command::Status)]
    #[case("STATUS", Command::Status)]
    #[case("/status@AdminSystemBot", Command::Status)]
    #[case("/restart MediaInfoBot", Command::Restart(Some("MediaInfoBot")))]
    #[case("restart", Command::Restart(None))]
    #[case("/stats", Command::Stats)]
    #[case("errors", Command::Errors)]
    #[case("/webhooks radarr", Command::Webhooks(Some("radarr")))]
    #[case("/webhooks", Command::Webhooks(None))]
    #[case("hello there", Command::Help)]
    fn parses_commands(#[case] text: &str, #[case] expected: Command<'_>) {
        assert_eq!(Command::parse(text), expected);
    }

    #[tokio::test]
    async fn ignores_other_chats() {
        let f = fixture();
        f.bot
            .handle(&f.handle, &InboundEvent::text(1, 55, "/status"))
            .await
            .unwrap();
        assert!(f.outbound.sent().is_empty());
    }

    #[tokio::test]
    async fn ignores_everyone_without_operator() {
        let f = fixture();
        let bot = AdminBot::new(None, f.store.clone(), Arc::new(RegistryLink::default()));
        bot.handle(&f.handle, &InboundEvent::text(1, OPERATOR, "/status"))
            .await
            .unwrap();
        assert!(f.outbound.sent().is_empty());
    }

    #[tokio::test]
    async fn status_lists_every_session() {
        let f = fixture();
        f.registry.start_all().await;

        let reply = ask(&f, "/status").await;
        assert!(reply.contains("<code>AdminSystemBot</code>: Up"));
        assert!(reply.contains("<code>MediaInfoBot</code>: Up"));
        assert!(reply.contains("<code>BrokenBot</code>: Down (unregistered)"));
        f.registry.shutdown().await;
    }

    #[tokio::test]
    async fn restart_outcomes() {
        let f = fixture();

        let reply = ask(&f, "restart mediainfobot").await;
        assert!(reply.contains("✅ Session <code>MediaInfoBot</code> restarted"));
        assert!(f.registry.status_of("MediaInfoBot").is_up());

        let reply = ask(&f, "/restart Ghost").await;
        assert!(reply.contains("is not configured"));

        let reply = ask(&f, "/restart BrokenBot").await;
        assert!(reply.contains("could not be re-registered: Down (unregistered)"));

        let reply = ask(&f, "/restart").await;
        assert!(reply.starts_with("⚠️ Usage"));
        f.registry.shutdown().await;
    }

    #[tokio::test]
    async fn stats_counts_unique_chats_today() {
        let f = fixture();
        for chat in [1, 2, 2, 3] {
            f.store
                .save_action(&ActionRecord::new("GatewayBot", chat, None))
                .await
                .unwrap();
        }
        let mut old = ActionRecord::new("GatewayBot", 99, None);
        old.created_at = 0;
        f.store.save_action(&old).await.unwrap();

        let reply = ask(&f, "/stats").await;
        assert!(reply.contains("Unique users: <b>3</b>"), "{reply}");
    }

    #[tokio::test]
    async fn errors_report() {
        let f = fixture();
        assert_eq!(ask(&f, "/errors").await, "✅ No incidents recorded.");

        for i in 0..7 {
            f.store
                .save_error(&ErrorRecord::new("GatewayBot", format!("boom <{i}>"), None))
                .await
                .unwrap();
        }
        let reply = ask(&f, "/errors").await;
        assert!(reply.starts_with("⚠️ <b>Latest 5 incidents</b>"));
        assert_eq!(reply.matches("🤖 Bot: <code>GatewayBot</code>").count(), 5);
        assert!(reply.contains("boom &lt;6&gt;"));
        assert!(!reply.contains("boom &lt;0&gt;"));
    }

    #[tokio::test]
    async fn webhook_reports() {
        let f = fixture();
        let mut ok = WebhookRecord::new("radarr", "{}");
        ok.event_type = Some("Grab".into());
        ok.succeeded();
        f.store.save_webhook(&ok).await.unwrap();
        let mut bad = WebhookRecord::new("sonarr", "{}");
        bad.failed("failed to parse sonarr payload");
        f.store.save_webhook(&bad).await.unwrap();

        let reply = ask(&f, "/webhooks").await;
        assert!(reply.contains("• Radarr: <b>1</b>"));
        assert!(reply.contains("• Sonarr: <b>1</b>"));
        assert!(reply.contains("• TrueNAS: <b>0</b>"));
        assert!(reply.contains("<code>sonarr</code> failed to parse sonarr payload"));

        let reply = ask(&f, "/webhooks RADARR").await;
        assert!(reply.contains("✅"));
        assert!(reply.contains("<code>Grab</code>"));

        let reply = ask(&f, "/webhooks plex").await;
        assert!(reply.contains("Unknown source"));
    }

    #[tokio::test]
    async fn anything_else_gets_help() {
        let f = fixture();
        let reply = ask(&f, "what can you do?").await;
        assert!(reply.starts_with("🛠 <b>Platform control</b>"));
        assert!(reply.contains("/restart &lt;name&gt;"));
    }
}
