use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::Bytes,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    serde_json::{Value, json},
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer},
    tracing::{error, info},
};

use crate::{routing::WebhookRouter, webhook::WebhookSource};

const SERVICE_NAME: &str = "botdeck webhook ingest";

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<WebhookRouter>,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the HTTP app (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/webhooks/health", get(webhooks_health_handler))
        .route("/api/webhooks/test", post(test_handler))
        .route("/api/webhooks/radarr", post(radarr_handler))
        .route("/api/webhooks/sonarr", post(sonarr_handler))
        .route("/api/webhooks/truenas", post(truenas_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// Serve `app` until `shutdown` is cancelled, then finish in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "webhook server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    info!(%addr, "webhook server stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn webhooks_health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Echo endpoint for checking connectivity without a real sender.
async fn test_handler(body: Bytes) -> impl IntoResponse {
    let fields = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map.len(),
        _ => 0,
    };
    info!(fields, "test webhook received");
    Json(json!({
        "status": "test_success",
        "received_fields": fields.to_string(),
        "message": "Test webhook successfully received",
    }))
}

async fn radarr_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    receive(&state, WebhookSource::Radarr, &body).await
}

async fn sonarr_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    receive(&state, WebhookSource::Sonarr, &body).await
}

async fn truenas_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    receive(&state, WebhookSource::TrueNas, &body).await
}

/// Always answers 200. `error` is reported only when the audit row itself
/// could not be written; processing failures are visible in the row.
async fn receive(state: &AppState, source: WebhookSource, body: &[u8]) -> Json<Value> {
    info!(source = %source, bytes = body.len(), "webhook received");
    match state.router.route(source, body).await {
        Ok(record) => Json(json!({
            "status": "accepted",
            "message": format!("{} webhook accepted for processing", source.label()),
            "id": record.id,
        })),
        Err(e) => {
            error!(source = %source, error = %e, "failed to persist webhook audit row");
            Json(json!({
                "status": "error",
                "message": format!("Failed to process {} webhook: {e}", source.label()),
            }))
        },
    }
}
