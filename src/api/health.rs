//! Health check endpoint with queue statistics.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::Channel;
use crate::queue::{AggregateCounts, QueueCounts};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub channels: HashMap<String, QueueCounts>,
    pub totals: AggregateCounts,
}

/// GET /health - Service liveness plus per-channel queue depths
#[tracing::instrument(name = "http.health", skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut channels = HashMap::new();
    for channel in Channel::ALL {
        match state.queues.counts(channel).await {
            Ok(counts) => {
                channels.insert(channel.as_str().to_string(), counts);
            }
            Err(e) => {
                tracing::warn!(channel = channel.as_str(), error = %e, "Failed to read queue counts");
            }
        }
    }
    let totals = match state.queues.aggregate().await {
        Ok(totals) => totals,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to aggregate queue counts");
            AggregateCounts::default()
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        queue: QueueHealthResponse {
            backend: state.settings.queue.backend.clone(),
            channels,
            totals,
        },
    })
}
