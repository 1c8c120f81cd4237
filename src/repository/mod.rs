//! Persistence capabilities for notification records and templates.
//!
//! The dispatcher and worker pools hold explicit repository handles
//! injected at construction; there is no process-wide client. Production
//! deployments plug a database-backed implementation in behind these
//! traits; the in-memory implementation backs tests and development.

pub mod memory;

pub use memory::{MemoryNotificationRepository, MemoryTemplateRepository};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{Channel, NotificationRecord, NotificationStatus};
use crate::template::{NotificationTemplate, TemplateUpdate};

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// A status change that would regress a record, e.g. marking a failed
    /// notification as read.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Query filter for listing notification records. All fields are
/// conjunctive; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub channel: Option<Channel>,
    pub status: Option<NotificationStatus>,
    pub limit: Option<usize>,
}

/// Store of persisted notification records.
///
/// Implementations must serialize writes per record id; status mutations
/// go through the dedicated `mark_*` operations so the monotonic
/// transition invariant is enforced in one place.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, record: NotificationRecord) -> Result<NotificationRecord, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepositoryError>;

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<NotificationRecord>, RepositoryError>;

    /// Transition to `processing`. A no-op if the record already reached a
    /// later state (a retried job passes through here more than once).
    async fn mark_processing(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Terminal success; stamps `sent_at`.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Terminal failure; records the final error.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError>;

    /// The only path to `read`: allowed from `sent`, idempotent when
    /// already `read`, rejected otherwise.
    async fn mark_read(&self, id: Uuid) -> Result<NotificationRecord, RepositoryError>;
}

/// Query filter for templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub tenant_id: Option<String>,
    pub channel: Option<Channel>,
}

/// Tenant-scoped store of reusable notification templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, template: NotificationTemplate) -> Result<NotificationTemplate, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationTemplate>, RepositoryError>;

    /// Resolve a template by name within one tenant. Used by adapters when
    /// a job references a template instead of carrying inline content;
    /// tenants may reuse the same name without seeing each other's content.
    async fn find_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<NotificationTemplate>, RepositoryError>;

    async fn find(&self, filter: &TemplateFilter) -> Result<Vec<NotificationTemplate>, RepositoryError>;

    async fn update(&self, id: Uuid, updates: TemplateUpdate) -> Result<NotificationTemplate, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}
