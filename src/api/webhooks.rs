//! Webhook smoke-test endpoint.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::notification::{Channel, NotificationRecord, Priority, SubmitRequest};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TestWebhookRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
}

/// POST /api/webhooks/test - Enqueue a canned delivery to the given URL
///
/// Goes through the normal pipeline, so integrators exercise the exact
/// payload, headers, and retry behavior their production hooks will see.
#[tracing::instrument(name = "http.test_webhook", skip(state, request))]
pub async fn test_webhook(
    State(state): State<AppState>,
    Json(request): Json<TestWebhookRequest>,
) -> Result<(StatusCode, Json<NotificationRecord>)> {
    let url = request
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("Missing required fields: url".to_string()))?;

    let submit = SubmitRequest {
        channel: Some(Channel::Webhook),
        recipient: Some(url),
        subject: Some("Test webhook".to_string()),
        message: Some(
            request
                .message
                .unwrap_or_else(|| "Test webhook delivery".to_string()),
        ),
        template: None,
        data: request.data,
        priority: Some(Priority::High),
        tenant_id: None,
        user_id: None,
    };

    let record = state.dispatcher.submit(submit).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
