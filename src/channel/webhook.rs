//! Webhook adapter posting JSON payloads to subscriber URLs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::config::WebhookConfig;
use crate::notification::{Channel, NotificationJob};

use super::{ChannelAdapter, SendError};

/// JSON body posted to the recipient URL.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    message: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    data: &'a HashMap<String, serde_json::Value>,
}

/// HTTP webhook adapter.
///
/// Performs exactly one POST per invocation; transient failures surface
/// as retryable transport errors and the worker pool decides whether to
/// re-enqueue the job with a backoff delay.
pub struct WebhookAdapter {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookAdapter {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl ChannelAdapter for WebhookAdapter {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let payload = WebhookPayload {
            id: job.id.to_string(),
            kind: "webhook",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            subject: job.subject.as_deref(),
            message: &job.message,
            data: &job.data,
        };

        let response = self
            .client
            .post(&job.recipient)
            .header("User-Agent", &self.config.user_agent)
            .header("X-Webhook-Attempt", job.attempt)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Transport(format!(
                "webhook endpoint returned status {}",
                status
            )));
        }

        tracing::info!(
            job_id = %job.id,
            url = %job.recipient,
            attempt = job.attempt,
            "webhook delivered"
        );
        Ok(())
    }
}
