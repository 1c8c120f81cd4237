//! Template types and validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::Channel;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid template: {0}")]
    Invalid(String),
}

/// A tenant-owned, named, reusable piece of notification content.
///
/// Referenced by jobs via `template` instead of an inline message;
/// consumed read-only by the channel adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Content with `{{variable}}` placeholders.
    pub content: String,
    /// Declared placeholder names, informational.
    #[serde(default)]
    pub variables: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationTemplate {
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.name.is_empty() || self.name.len() > 256 {
            return Err(TemplateError::Invalid("Name must be 1-256 characters".to_string()));
        }
        if self.tenant_id.is_empty() {
            return Err(TemplateError::Invalid("Tenant ID must not be empty".to_string()));
        }
        if self.content.is_empty() {
            return Err(TemplateError::Invalid("Content must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Request to create a new template
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub tenant_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
}

impl CreateTemplateRequest {
    /// Names of required fields that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant_id.as_deref().map_or(true, str::is_empty) {
            missing.push("tenant_id");
        }
        if self.name.as_deref().map_or(true, str::is_empty) {
            missing.push("name");
        }
        if self.channel.is_none() {
            missing.push("type");
        }
        if self.content.as_deref().map_or(true, str::is_empty) {
            missing.push("content");
        }
        missing
    }

    /// Build the template once validation passed.
    pub fn into_template(self) -> NotificationTemplate {
        let now = Utc::now();
        NotificationTemplate {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            channel: self.channel.unwrap_or(Channel::Email),
            subject: self.subject,
            content: self.content.unwrap_or_default(),
            variables: self.variables,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an existing template. `subject` uses a double
/// `Option` so `null` clears the field while absence leaves it untouched.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub subject: Option<Option<String>>,
    pub content: Option<String>,
    pub variables: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateTemplateRequest {
        CreateTemplateRequest {
            tenant_id: Some("tenant-1".to_string()),
            name: Some("welcome".to_string()),
            channel: Some(Channel::Email),
            subject: Some("Welcome!".to_string()),
            content: Some("Hello {{name}}".to_string()),
            variables: vec!["name".to_string()],
        }
    }

    #[test]
    fn test_create_request_valid() {
        assert!(create_request().missing_fields().is_empty());
    }

    #[test]
    fn test_create_request_missing_fields() {
        let mut req = create_request();
        req.tenant_id = None;
        req.content = Some(String::new());
        assert_eq!(req.missing_fields(), vec!["tenant_id", "content"]);
    }

    #[test]
    fn test_into_template_stamps_timestamps() {
        let template = create_request().into_template();
        assert_eq!(template.tenant_id, "tenant-1");
        assert_eq!(template.created_at, template.updated_at);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_content() {
        let mut template = create_request().into_template();
        template.content = String::new();
        assert!(template.validate().is_err());
    }
}
