//! End-to-end tests: the whole platform on an ephemeral port with an
//! in-memory audit store, an in-process queue and a fake chat platform.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    botdeck_audit::store_memory::MemoryAuditStore,
    botdeck_channels::{
        InboundEvent, Outbound, PollingSubstrate, SessionHandle, TextFormat, UpdateStream,
    },
    botdeck_config::{BotConfig, BotRole, BotdeckConfig},
    botdeck_gateway::Platform,
    botdeck_queue::{InboundEnvelope, MemoryTransport, QueueTransport},
    secrecy::Secret,
    serde_json::{Value, json},
    tokio::sync::mpsc,
};

const OPERATOR: i64 = 4242;
const MEDIA_CHANNEL: i64 = -100_777;

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    chat_id: i64,
    text: String,
    photo: Option<String>,
}

#[derive(Default)]
struct FakeOutbound {
    sent: Mutex<Vec<Sent>>,
}

impl FakeOutbound {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Outbound for FakeOutbound {
    async fn send_text(&self, chat_id: i64, text: &str, _format: TextFormat) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            photo: None,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        _format: TextFormat,
    ) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: caption.to_string(),
            photo: Some(photo_url.to_string()),
        });
        Ok(())
    }
}

/// Fake platform: one outbound recorder and one event feed per bot.
#[derive(Default)]
struct FakePlatform {
    outbound: Mutex<HashMap<String, Arc<FakeOutbound>>>,
    feeds: Mutex<HashMap<String, mpsc::UnboundedSender<InboundEvent>>>,
}

impl FakePlatform {
    fn outbound_of(&self, name: &str) -> Arc<FakeOutbound> {
        Arc::clone(self.outbound.lock().unwrap().get(name).unwrap())
    }

    fn push(&self, name: &str, event: InboundEvent) {
        self.feeds.lock().unwrap()[name].send(event).unwrap();
    }
}

struct FeedStream(mpsc::UnboundedReceiver<InboundEvent>);

#[async_trait]
impl UpdateStream for FeedStream {
    async fn next_batch(&mut self) -> botdeck_channels::Result<Vec<InboundEvent>> {
        match self.0.recv().await {
            Some(event) => Ok(vec![event]),
            None => std::future::pending().await,
        }
    }

    fn cursor(&self) -> Option<i64> {
        None
    }
}

#[async_trait]
impl PollingSubstrate for FakePlatform {
    fn outbound(&self, name: &str, _token: &Secret<String>) -> Arc<dyn Outbound> {
        let outbound = Arc::new(FakeOutbound::default());
        self.outbound
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::clone(&outbound));
        outbound
    }

    async fn connect(
        &self,
        handle: &SessionHandle,
        _resume_from: Option<i64>,
    ) -> botdeck_channels::Result<Box<dyn UpdateStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds
            .lock()
            .unwrap()
            .insert(handle.name().to_string(), tx);
        Ok(Box::new(FeedStream(rx)))
    }
}

fn bot(name: &str, role: BotRole, channel_id: Option<i64>) -> BotConfig {
    BotConfig {
        name: name.into(),
        role,
        token: Secret::new(format!("{name}-token")),
        channel_id,
    }
}

fn config() -> BotdeckConfig {
    let mut config = BotdeckConfig::default();
    config.server.bind = "127.0.0.1".into();
    config.server.port = 0;
    config.admin.chat_id = Some(OPERATOR);
    config.queue.consumers = 2;
    config.bots = vec![
        bot("AdminSystemBot", BotRole::Admin, None),
        bot("MediaInfoBot", BotRole::Media, Some(MEDIA_CHANNEL)),
        bot("GatewayBot", BotRole::Gateway, None),
    ];
    config
}

struct Harness {
    platform: Platform,
    fake: Arc<FakePlatform>,
    store: Arc<MemoryAuditStore>,
    transport: Arc<MemoryTransport>,
    base: String,
    http: reqwest::Client,
}

async fn start() -> Harness {
    let fake = Arc::new(FakePlatform::default());
    let store = Arc::new(MemoryAuditStore::new());
    let transport = Arc::new(MemoryTransport::new());
    let platform = Platform::start_with(&config(), store.clone(), fake.clone(), transport.clone())
        .await
        .unwrap();
    let base = format!("http://{}", platform.local_addr());
    Harness {
        platform,
        fake,
        store,
        transport,
        base,
        http: reqwest::Client::new(),
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

impl Harness {
    async fn post(&self, path: &str, body: impl Into<reqwest::Body>) -> (u16, Value) {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn every_session_starts() {
    let h = start().await;
    let statuses = h.platform.registry().statuses();
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|(_, state)| state.is_up()));
    h.platform.shutdown().await;
}

#[tokio::test]
async fn health_endpoints() {
    let h = start().await;

    let resp = h
        .http
        .get(format!("{}/health", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let body: Value = h
        .http
        .get(format!("{}/api/webhooks/health", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");

    let (status, body) = h
        .post("/api/webhooks/test", json!({ "a": 1, "b": 2 }).to_string())
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "test_success");
    assert_eq!(body["received_fields"], "2");

    h.platform.shutdown().await;
}

#[tokio::test]
async fn radarr_grab_is_audited_and_published_once() {
    let h = start().await;

    let (status, body) = h
        .post(
            "/api/webhooks/radarr",
            json!({
                "eventType": "Grab",
                "movie": { "title": "Arrival", "year": 2016, "tmdbId": 329865, "imdbId": "tt2543164" },
                "release": { "quality": "Bluray-1080p", "releaseGroup": "SPARKS" }
            })
            .to_string(),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "accepted");

    let rows = h.store.webhooks();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source, "radarr");
    assert_eq!(rows[0].event_type.as_deref(), Some("Grab"));
    assert!(rows[0].processed_successfully);
    assert_eq!(rows[0].target_channel_id, Some(MEDIA_CHANNEL));

    let sent = h.fake.outbound_of("MediaInfoBot").sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, MEDIA_CHANNEL);
    assert_eq!(
        sent[0].photo.as_deref(),
        Some("https://image.tmdb.org/t/p/w500/329865.jpg")
    );
    assert!(sent[0].text.contains("Arrival (2016)"));

    h.platform.shutdown().await;
}

#[tokio::test]
async fn unparseable_payload_is_still_accepted() {
    let h = start().await;

    let (status, body) = h
        .post("/api/webhooks/sonarr", json!({ "episodes": 3 }).to_string())
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "accepted");

    let (status, body) = h.post("/api/webhooks/truenas", "<xml/>").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "accepted");

    let rows = h.store.webhooks();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.processed_successfully));
    assert!(rows.iter().all(|r| r.error_message.is_some()));
    assert!(h.fake.outbound_of("MediaInfoBot").sent().is_empty());

    h.platform.shutdown().await;
}

#[tokio::test]
async fn audit_failure_is_reported_as_error() {
    let h = start().await;
    h.store.fail_writes(true);

    let (status, body) = h
        .post("/api/webhooks/radarr", json!({ "eventType": "Test" }).to_string())
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "error");

    h.platform.shutdown().await;
}

#[tokio::test]
async fn gateway_updates_reach_the_ingress_queue_and_action_log() {
    let h = start().await;

    h.fake
        .push("GatewayBot", InboundEvent::text(501, 77, "find me a movie"));

    let delivery = tokio::time::timeout(
        Duration::from_secs(3),
        h.transport.next_delivery("telegram.updates"),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    let envelope: InboundEnvelope = serde_json::from_slice(&delivery.body).unwrap();
    assert_eq!(envelope.bot_token, "GatewayBot-token");
    assert_eq!(envelope.update["update_id"], 501);

    let store = h.store.clone();
    eventually(|| !store.actions().is_empty()).await;
    let actions = h.store.actions();
    assert_eq!(actions[0].bot_name, "GatewayBot");
    assert_eq!(actions[0].chat_id, 77);
    assert_eq!(actions[0].message_text.as_deref(), Some("find me a movie"));

    h.platform.shutdown().await;
}

#[tokio::test]
async fn replies_are_delivered_by_the_gateway_bot() {
    let h = start().await;

    h.transport
        .publish(
            "telegram.replies",
            json!({ "targetId": 42, "text": "hi" }).to_string().into_bytes(),
        )
        .await
        .unwrap();

    let gateway = h.fake.outbound_of("GatewayBot");
    eventually(|| !gateway.sent().is_empty()).await;
    assert_eq!(gateway.sent()[0], Sent {
        chat_id: 42,
        text: "hi".into(),
        photo: None,
    });

    h.platform.shutdown().await;
}

#[tokio::test]
async fn operator_commands_are_answered() {
    let h = start().await;

    h.fake
        .push("AdminSystemBot", InboundEvent::text(1, OPERATOR, "/status"));
    let admin = h.fake.outbound_of("AdminSystemBot");
    eventually(|| !admin.sent().is_empty()).await;

    let reply = &admin.sent()[0];
    assert_eq!(reply.chat_id, OPERATOR);
    assert!(reply.text.contains("<code>GatewayBot</code>: Up"));

    h.fake
        .push("AdminSystemBot", InboundEvent::text(2, OPERATOR, "/restart GatewayBot"));
    eventually(|| admin.sent().len() == 2).await;
    assert!(admin.sent()[1].text.contains("restarted"));
    assert!(h.platform.registry().status_of("gatewaybot").is_up());

    h.platform.shutdown().await;
}
