// rest/routes/metrics.rs — GET /metrics, Prometheus text exposition.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::AppContext;

pub async fn metrics(State(ctx): State<Arc<AppContext>>) -> Response {
    let depth = ctx.retry_queue.len().await as u64;
    let body = ctx.metrics.render_prometheus(depth);
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}
