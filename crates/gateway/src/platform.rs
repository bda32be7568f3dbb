//! Startup wiring and graceful shutdown.

use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    botdeck_audit::{AuditStore, AuditWriter, AuditWriterHandle, store_sqlite::SqliteAuditStore},
    botdeck_channels::{
        AlertTarget, AuditInterceptor, EscalationInterceptor, Pipeline, PollingSubstrate,
        SessionHandle, SessionRegistry, SessionSpec,
    },
    botdeck_config::{BotRole, BotdeckConfig},
    botdeck_queue::{
        AmqpTransport, ConsumerPool, MemoryTransport, Publisher, QueueTransport, Topology,
    },
    botdeck_telegram::TelegramSubstrate,
    secrecy::ExposeSecret,
    tokio::{net::TcpListener, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    Result,
    bots::{BotDeps, BotKind, RegistryLink},
    egress::ReplyDispatcher,
    notify::{ChatTarget, Notifier},
    routing::WebhookRouter,
    server::{self, AppState},
};

/// A running platform. Dropping it leaves background tasks running; call
/// [`Platform::shutdown`].
pub struct Platform {
    registry: Arc<SessionRegistry>,
    consumers: ConsumerPool,
    transport: Arc<dyn QueueTransport>,
    audit: AuditWriterHandle,
    server_cancel: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

impl Platform {
    /// Start with the production backends: SQLite audit store, Telegram
    /// long polling and RabbitMQ when `queue.url` is set.
    pub async fn start(config: &BotdeckConfig) -> Result<Self> {
        let store =
            SqliteAuditStore::new(&config.database.url, config.database.max_connections).await?;
        let substrate = TelegramSubstrate::new()?;
        let transport: Arc<dyn QueueTransport> = match &config.queue.url {
            Some(url) => {
                Arc::new(AmqpTransport::connect(url.expose_secret(), config.queue.prefetch).await?)
            },
            None => {
                warn!("queue.url is not set; using the in-process queue");
                Arc::new(MemoryTransport::new())
            },
        };
        Self::start_with(config, Arc::new(store), Arc::new(substrate), transport).await
    }

    pub async fn start_with(
        config: &BotdeckConfig,
        store: Arc<dyn AuditStore>,
        substrate: Arc<dyn PollingSubstrate>,
        transport: Arc<dyn QueueTransport>,
    ) -> Result<Self> {
        if config.bots.is_empty() {
            warn!("no bots configured; only the webhook server will run");
        }

        // Bind first so a taken port fails startup before any session connects.
        let listener =
            TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
        let local_addr = listener.local_addr()?;

        let (writer, audit) = AuditWriter::spawn(Arc::clone(&store), config.audit.buffer);

        let topology = Topology::from_config(&config.queue);
        topology.declare(transport.as_ref()).await?;

        let handles: Vec<SessionHandle> = config
            .bots
            .iter()
            .map(|bot| {
                SessionHandle::new(
                    &bot.name,
                    bot.token.clone(),
                    substrate.outbound(&bot.name, &bot.token),
                )
            })
            .collect();

        let alert = alert_target(config, &handles);
        let pipeline = Pipeline::new()
            .with(AuditInterceptor::new(writer))
            .with(EscalationInterceptor::new(Arc::clone(&store), alert));

        let link = Arc::new(RegistryLink::default());
        let deps = BotDeps {
            store: Arc::clone(&store),
            registry: Arc::clone(&link),
            operator_chat_id: config.admin.chat_id,
            updates: Publisher::new(Arc::clone(&transport), &topology.updates.name),
        };
        let specs = config
            .bots
            .iter()
            .zip(&handles)
            .map(|(bot, handle)| SessionSpec {
                handle: handle.clone(),
                handler: Arc::new(BotKind::for_role(bot.role, &deps)),
            })
            .collect();

        let registry = Arc::new(SessionRegistry::new(substrate, pipeline, specs));
        link.attach(&registry);
        registry.start_all().await;

        let consumers = ConsumerPool::spawn(
            Arc::clone(&transport),
            topology.replies.name.clone(),
            config.queue.consumers,
            Arc::new(ReplyDispatcher::new(
                handles.clone(),
                reply_handle(config, &handles),
            )),
            CancellationToken::new(),
        );

        let notifier = Notifier::new(
            media_target(config, &handles),
            admin_target(config, &handles),
            config.media.poster_base_url.clone(),
        );
        let app = server::build_app(AppState {
            router: Arc::new(WebhookRouter::new(store, Arc::new(notifier))),
        });
        let server_cancel = CancellationToken::new();
        let server = tokio::spawn(server::serve(listener, app, server_cancel.clone()));

        info!(%local_addr, bots = handles.len(), "platform started");
        Ok(Self {
            registry,
            consumers,
            transport,
            audit,
            server_cancel,
            server,
            local_addr,
        })
    }

    /// Start, run until `signal` resolves, then shut down.
    pub async fn run(config: &BotdeckConfig, signal: impl Future<Output = ()>) -> Result<()> {
        let platform = Self::start(config).await?;
        signal.await;
        info!("shutdown requested");
        platform.shutdown().await;
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop intake first, then drain: webhook server, polling sessions,
    /// reply consumers, queue transport, audit writer.
    pub async fn shutdown(self) {
        self.server_cancel.cancel();
        match self.server.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(error = %e, "webhook server failed"),
            Err(e) => warn!(error = %e, "webhook server task failed"),
        }

        self.registry.shutdown().await;
        self.consumers.shutdown().await;
        self.transport.close();

        let written = self.audit.shutdown().await;
        info!(audit_records = written, "platform stopped");
    }
}

fn find<'a>(handles: &'a [SessionHandle], name: &str) -> Option<&'a SessionHandle> {
    handles.iter().find(|h| h.name().eq_ignore_ascii_case(name))
}

fn alert_target(config: &BotdeckConfig, handles: &[SessionHandle]) -> Option<AlertTarget> {
    let Some(chat_id) = config.admin.chat_id else {
        warn!("admin.chat_id is not set; handler failures will not be alerted");
        return None;
    };
    let Some(handle) = find(handles, &config.admin.alert_bot) else {
        warn!(
            alert_bot = %config.admin.alert_bot,
            "alert bot is not configured; handler failures will not be alerted"
        );
        return None;
    };
    Some(AlertTarget {
        chat_id,
        outbound: Arc::clone(handle.outbound()),
    })
}

/// The configured reply bot, else the first gateway bot.
fn reply_handle(config: &BotdeckConfig, handles: &[SessionHandle]) -> Option<SessionHandle> {
    let name = match &config.queue.reply_bot {
        Some(name) => Some(name.as_str()),
        None => config
            .bot_with_role(BotRole::Gateway)
            .map(|b| b.name.as_str()),
    };
    let handle = name.and_then(|name| find(handles, name)).cloned();
    if handle.is_none() {
        warn!("no reply bot available; replies without a known token will be dead-lettered");
    }
    handle
}

fn media_target(config: &BotdeckConfig, handles: &[SessionHandle]) -> Option<ChatTarget> {
    let bot = config.bot_with_role(BotRole::Media)?;
    let Some(chat_id) = bot.channel_id else {
        warn!(account_id = %bot.name, "media bot has no channel_id; media webhooks will fail");
        return None;
    };
    target(handles, &bot.name, chat_id)
}

fn admin_target(config: &BotdeckConfig, handles: &[SessionHandle]) -> Option<ChatTarget> {
    let chat_id = config.admin.chat_id?;
    let bot = config.bot_with_role(BotRole::Admin)?;
    target(handles, &bot.name, chat_id)
}

fn target(handles: &[SessionHandle], name: &str, chat_id: i64) -> Option<ChatTarget> {
    find(handles, name).map(|handle| ChatTarget {
        bot_name: handle.name().to_string(),
        chat_id,
        outbound: Arc::clone(handle.outbound()),
    })
}
