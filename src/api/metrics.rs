//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::notification::Channel;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_queue_gauges(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh queue depth gauges from the live queues.
async fn update_queue_gauges(state: &AppState) {
    for channel in Channel::ALL {
        match state.queues.counts(channel).await {
            Ok(counts) => {
                metrics::QUEUE_WAITING
                    .with_label_values(&[channel.as_str()])
                    .set(counts.waiting as i64);
                metrics::QUEUE_ACTIVE
                    .with_label_values(&[channel.as_str()])
                    .set(counts.active as i64);
            }
            Err(e) => {
                tracing::debug!(channel = channel.as_str(), error = %e, "Skipping queue gauge update");
            }
        }
    }
}
