//! Notification submission and query endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::{
    BulkSubmitRequest, BulkSubmitResponse, Channel, NotificationRecord, NotificationStatus,
    SubmitRequest,
};
use crate::repository::RecordFilter;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(rename = "type", default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub status: Option<NotificationStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub notifications: Vec<NotificationRecord>,
    pub total: usize,
}

/// POST /api/notifications - Queue a single notification
#[tracing::instrument(name = "http.submit_notification", skip(state, request))]
pub async fn submit_notification(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<NotificationRecord>)> {
    let record = state.dispatcher.submit(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/notifications/bulk - Queue a batch of notifications
#[tracing::instrument(
    name = "http.submit_bulk",
    skip(state, request),
    fields(batch_size = request.notifications.len())
)]
pub async fn submit_bulk_notifications(
    State(state): State<AppState>,
    Json(request): Json<BulkSubmitRequest>,
) -> Result<(StatusCode, Json<BulkSubmitResponse>)> {
    let response = state.dispatcher.submit_bulk(request.notifications).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/notifications - List stored notification records
#[tracing::instrument(name = "http.list_notifications", skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let filter = RecordFilter {
        tenant_id: query.tenant_id,
        user_id: query.user_id,
        channel: query.channel,
        status: query.status,
        limit: query.limit,
    };
    let notifications = state.records.find(&filter).await?;
    let total = notifications.len();
    Ok(Json(ListResponse {
        notifications,
        total,
    }))
}

/// GET /api/notifications/:id - Fetch one record
#[tracing::instrument(name = "http.get_notification", skip(state))]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRecord>> {
    let record = state
        .records
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {id}")))?;
    Ok(Json(record))
}

/// PUT /api/notifications/:id/read - Mark a sent in-app notification read
#[tracing::instrument(name = "http.mark_read", skip(state))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRecord>> {
    let record = state.records.mark_read(id).await?;
    tracing::info!(notification_id = %id, "Notification marked read");
    Ok(Json(record))
}
