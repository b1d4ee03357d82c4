//! Webhook ingress.
//!
//! Every delivery walks the same path: signature check, event filter, then a
//! targeted sync of the sender's repositories back into the directory. A
//! failed sync enqueues the sender for retry — Gitea's own redelivery plus
//! the retry queue give at-least-once semantics, which is safe because the
//! targeted sync is idempotent.
//!
//! An unconfigured secret rejects every delivery (500). Absence of a secret
//! is never an implicit allow.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::metrics::{SyncStatus, SyncType};
use crate::AppContext;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "X-Gitea-Event";
pub const SIGNATURE_HEADER: &str = "X-Gitea-Signature";

/// The only event type that triggers a sync.
const REPOSITORY_EVENT: &str = "repository";

/// Constant-time verification of the hex HMAC-SHA256 over the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
struct EventRepository {
    full_name: String,
    owner: Login,
}

#[derive(Debug, Deserialize)]
struct RepositoryEvent {
    #[serde(default)]
    action: String,
    sender: Login,
    repository: EventRepository,
}

pub async fn gitea_webhook(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    ctx.metrics.inc(SyncType::Webhook, SyncStatus::Received);

    let secret = &ctx.config.webhook.secret;
    if secret.is_empty() {
        warn!("webhook delivery rejected — no secret configured");
        ctx.metrics.inc(SyncType::Webhook, SyncStatus::Error);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "webhook secret not configured" })),
        )
            .into_response();
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(secret, &body, signature) {
        warn!("webhook delivery rejected — bad or missing signature");
        ctx.metrics.inc(SyncType::Webhook, SyncStatus::Error);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid signature" })),
        )
            .into_response();
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if event != REPOSITORY_EVENT {
        debug!(event, "ignoring webhook event");
        return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
    }

    let payload: RepositoryEvent = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(err = %e, "malformed webhook payload");
            ctx.metrics.inc(SyncType::Webhook, SyncStatus::Error);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed payload" })),
            )
                .into_response();
        }
    };

    // The owner is whose repository list just changed; the sender merely
    // performed the action.
    let uid = payload.repository.owner.login;
    info!(
        uid = %uid,
        sender = %payload.sender.login,
        action = %payload.action,
        repository = %payload.repository.full_name,
        "repository event — mirroring owner repositories"
    );

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        ctx.config.webhook.sync_timeout(),
        ctx.user_sync.mirror_user_repos(&uid),
    )
    .await;
    ctx.metrics
        .observe_duration(SyncType::Webhook, started.elapsed());

    let err = match outcome {
        Ok(Ok(count)) => {
            ctx.metrics.inc(SyncType::Webhook, SyncStatus::Success);
            return (
                StatusCode::OK,
                Json(json!({ "status": "ok", "uid": uid, "reposCount": count })),
            )
                .into_response();
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => "targeted sync timed out".to_string(),
    };

    warn!(uid = %uid, err = %err, "targeted sync failed — enqueueing for retry");
    ctx.metrics.inc(SyncType::Webhook, SyncStatus::Error);
    ctx.retry_queue.enqueue(&uid).await;
    if let Err(e) = ctx.persist_state().await {
        warn!(err = %e, "persisting state after enqueue failed");
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err })),
    )
        .into_response()
}
