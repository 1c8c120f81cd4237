//! Template CRUD endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::Channel;
use crate::repository::TemplateFilter;
use crate::server::AppState;
use crate::template::{CreateTemplateRequest, NotificationTemplate, TemplateUpdate};

#[derive(Debug, Deserialize)]
pub struct TemplateListQuery {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(rename = "type", default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<NotificationTemplate>,
    pub total: usize,
}

/// POST /api/templates - Create a new template
#[tracing::instrument(name = "http.create_template", skip(state, request))]
pub async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<NotificationTemplate>)> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let template = request.into_template();
    template
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let created = state.templates.create(template).await?;
    tracing::info!(
        template_id = %created.id,
        tenant_id = %created.tenant_id,
        name = %created.name,
        "Template created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/templates - List templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<TemplateListResponse>> {
    let filter = TemplateFilter {
        tenant_id: query.tenant_id,
        channel: query.channel,
    };
    let templates = state.templates.find(&filter).await?;
    let total = templates.len();
    Ok(Json(TemplateListResponse { templates, total }))
}

/// GET /api/templates/:id - Fetch one template
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationTemplate>> {
    let template = state
        .templates
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {id}")))?;
    Ok(Json(template))
}

/// PUT /api/templates/:id - Partially update a template
#[tracing::instrument(name = "http.update_template", skip(state, updates))]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(updates): Json<TemplateUpdate>,
) -> Result<Json<NotificationTemplate>> {
    let updated = state.templates.update(id, updates).await?;
    tracing::info!(template_id = %id, "Template updated");
    Ok(Json(updated))
}

/// DELETE /api/templates/:id - Remove a template
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.templates.delete(id).await?;
    tracing::info!(template_id = %id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}
