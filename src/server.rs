use std::sync::{Arc, OnceLock};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use teloxide::types::Update;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Write-once handle to the dispatcher's update queue. The HTTP server
/// starts before webhook registration finishes, so the cell stays empty
/// until the dispatcher is actually consuming.
pub type UpdateQueue = Arc<OnceLock<mpsc::UnboundedSender<Update>>>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Ping {
    status: &'static str,
    timestamp: i64,
}

#[derive(Serialize)]
struct WebhookAck {
    ok: bool,
}

/// Build the liveness router; the webhook route is mounted only for
/// webhook deployments.
pub fn router(queue: UpdateQueue, webhook: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/ping", get(ping));
    if webhook {
        router = router.route("/webhook", post(receive_update));
    }
    router.with_state(queue)
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn ping() -> Json<Ping> {
    Json(Ping {
        status: "pong",
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Telegram POSTs one update per request. Acknowledge fast and hand the
/// update to the dispatch queue; a 503 makes the provider redeliver once
/// the dispatcher is up.
async fn receive_update(State(queue): State<UpdateQueue>, body: String) -> Response {
    let Some(sender) = queue.get() else {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(WebhookAck { ok: false }))
            .into_response();
    };

    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("dropping malformed webhook payload: {e}");
            return (StatusCode::BAD_REQUEST, Json(WebhookAck { ok: false })).into_response();
        }
    };

    debug!(update_id = ?update.id, "webhook update queued");
    if sender.send(update).is_err() {
        // Receiver is gone; the dispatcher is shutting down.
        return (StatusCode::SERVICE_UNAVAILABLE, Json(WebhookAck { ok: false }))
            .into_response();
    }
    Json(WebhookAck { ok: true }).into_response()
}
