//! Webhook routing with an audit row per payload.
//!
//! The raw body is stored first, then mapped onto the typed shape for its
//! source and handed to the matching notification path. Whatever happens in
//! between, exactly one `webhook_event` row is written.

use std::sync::Arc;

use {
    anyhow::{Context as _, Result},
    botdeck_audit::{AuditStore, WebhookRecord},
    serde::de::DeserializeOwned,
    serde_json::Value,
    tracing::{error, info},
};

use crate::{
    notify::{Delivery, Notifier},
    webhook::{RadarrWebhook, SonarrWebhook, TrueNasAlert, WebhookSource},
};

pub struct WebhookRouter {
    store: Arc<dyn AuditStore>,
    notifier: Arc<Notifier>,
}

impl WebhookRouter {
    pub fn new(store: Arc<dyn AuditStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Process one webhook body and persist its audit row.
    ///
    /// Processing failures end up in the returned record; only a failure to
    /// persist the record itself is returned as an error.
    pub async fn route(
        &self,
        source: WebhookSource,
        body: &[u8],
    ) -> botdeck_audit::Result<WebhookRecord> {
        let parsed = serde_json::from_slice::<Value>(body);
        let payload = match &parsed {
            Ok(value) => value.to_string(),
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        };
        let mut record = WebhookRecord::new(source.as_str(), payload);

        let outcome = match parsed {
            Ok(value) => self.process(source, value, &mut record).await,
            Err(e) => Err(anyhow::Error::new(e).context("request body is not valid JSON")),
        };

        match outcome {
            Ok(delivery) => {
                record.succeeded();
                info!(
                    source = %source,
                    event_type = record.event_type.as_deref().unwrap_or("-"),
                    ?delivery,
                    "webhook processed"
                );
            },
            Err(e) => {
                let message = format!("{e:#}");
                error!(source = %source, error = %message, "webhook processing failed");
                record.failed(message);
            },
        }

        record.id = self.store.save_webhook(&record).await?;
        Ok(record)
    }

    async fn process(
        &self,
        source: WebhookSource,
        value: Value,
        record: &mut WebhookRecord,
    ) -> Result<Delivery> {
        match source {
            WebhookSource::Radarr => {
                let hook: RadarrWebhook = parse(source, value)?;
                record.event_type = hook.event_type.clone();
                self.route_to_media(record);
                self.notifier.radarr(&hook).await
            },
            WebhookSource::Sonarr => {
                let hook: SonarrWebhook = parse(source, value)?;
                record.event_type = hook.event_type.clone();
                self.route_to_media(record);
                self.notifier.sonarr(&hook).await
            },
            WebhookSource::TrueNas => {
                let alert: TrueNasAlert = parse(source, value)?;
                record.event_type = alert.level.clone();
                record.routed_to_bot = self.notifier.admin_target().map(|t| t.bot_name.clone());
                self.notifier.truenas(&alert).await
            },
        }
    }

    fn route_to_media(&self, record: &mut WebhookRecord) {
        if let Some(target) = self.notifier.media_target() {
            record.routed_to_bot = Some(target.bot_name.clone());
            record.target_channel_id = Some(target.chat_id);
        }
    }
}

fn parse<T: DeserializeOwned>(source: WebhookSource, value: Value) -> Result<T> {
    serde_json::from_value(value).with_context(|| format!("failed to parse {source} payload"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{notify::ChatTarget, testing::RecordingOutbound},
        botdeck_audit::store_memory::MemoryAuditStore,
        serde_json::json,
    };

    struct Fixture {
        store: Arc<MemoryAuditStore>,
        media: Arc<RecordingOutbound>,
        admin: Arc<RecordingOutbound>,
        router: WebhookRouter,
    }

    fn fixture_with(media: RecordingOutbound) -> Fixture {
        let store = Arc::new(MemoryAuditStore::new());
        let media = Arc::new(media);
        let admin = Arc::new(RecordingOutbound::default());
        let notifier = Notifier::new(
            Some(ChatTarget {
                bot_name: "MediaInfoBot".into(),
                chat_id: -1001,
                outbound: media.clone(),
            }),
            Some(ChatTarget {
                bot_name: "AdminSystemBot".into(),
                chat_id: 7,
                outbound: admin.clone(),
            }),
            "https://image.tmdb.org/t/p/w500",
        );
        let router = WebhookRouter::new(store.clone(), Arc::new(notifier));
        Fixture {
            store,
            media,
            admin,
            router,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingOutbound::default())
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn radarr_grab_writes_one_successful_row_and_one_notification() {
        let f = fixture();
        let record = f
            .router
            .route(
                WebhookSource::Radarr,
                &body(json!({
                    "eventType": "Grab",
                    "movie": { "title": "Dune", "year": 2021, "tmdbId": 438631 },
                    "release": { "quality": "Bluray-1080p" }
                })),
            )
            .await
            .unwrap();

        assert!(record.id > 0);
        let rows = f.store.webhooks();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "radarr");
        assert_eq!(rows[0].event_type.as_deref(), Some("Grab"));
        assert!(rows[0].processed_successfully);
        assert_eq!(rows[0].routed_to_bot.as_deref(), Some("MediaInfoBot"));
        assert_eq!(rows[0].target_channel_id, Some(-1001));
        assert!(rows[0].payload.contains("\"eventType\":\"Grab\""));

        let sent = f.media.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].photo.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/438631.jpg")
        );
    }

    #[tokio::test]
    async fn parse_failure_is_recorded_and_not_propagated() {
        let f = fixture();
        let record = f
            .router
            .route(
                WebhookSource::Sonarr,
                &body(json!({ "eventType": "Download", "episodes": "three" })),
            )
            .await
            .unwrap();

        assert!(!record.processed_successfully);
        let error = record.error_message.unwrap();
        assert!(error.contains("failed to parse sonarr payload"), "{error}");
        assert!(f.media.sent().is_empty());
        assert_eq!(f.store.webhooks().len(), 1);
    }

    #[tokio::test]
    async fn invalid_json_keeps_raw_body() {
        let f = fixture();
        let record = f
            .router
            .route(WebhookSource::Radarr, b"not json at all")
            .await
            .unwrap();

        assert!(!record.processed_successfully);
        assert_eq!(record.payload, "not json at all");
        assert!(record.event_type.is_none());
        assert!(
            record
                .error_message
                .unwrap()
                .contains("request body is not valid JSON")
        );
    }

    #[tokio::test]
    async fn send_failure_marks_row_failed() {
        let f = fixture_with(RecordingOutbound::failing());
        let record = f
            .router
            .route(
                WebhookSource::Sonarr,
                &body(json!({ "eventType": "Grab", "series": { "title": "Andor" } })),
            )
            .await
            .unwrap();

        assert!(!record.processed_successfully);
        assert_eq!(record.event_type.as_deref(), Some("Grab"));
        assert_eq!(record.routed_to_bot.as_deref(), Some("MediaInfoBot"));
        assert!(record.error_message.unwrap().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_event_succeeds_without_notification() {
        let f = fixture();
        let record = f
            .router
            .route(WebhookSource::Radarr, &body(json!({ "eventType": "Test" })))
            .await
            .unwrap();
        assert!(record.processed_successfully);
        assert!(f.media.sent().is_empty());
    }

    #[tokio::test]
    async fn truenas_alert_goes_to_admin() {
        let f = fixture();
        let record = f
            .router
            .route(
                WebhookSource::TrueNas,
                &body(json!({ "level": "WARNING", "message": "Scrub finished" })),
            )
            .await
            .unwrap();

        assert!(record.processed_successfully);
        assert_eq!(record.event_type.as_deref(), Some("WARNING"));
        assert_eq!(record.routed_to_bot.as_deref(), Some("AdminSystemBot"));
        assert!(record.target_channel_id.is_none());
        assert_eq!(f.admin.sent().len(), 1);
        assert!(f.media.sent().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_is_returned() {
        let f = fixture();
        f.store.fail_writes(true);
        let err = f
            .router
            .route(WebhookSource::Radarr, &body(json!({ "eventType": "Grab" })))
            .await;
        assert!(err.is_err());
    }
}
