//! In-memory repository implementations backed by DashMap.
//!
//! DashMap entry locks serialize writes per id, which is what the record
//! status invariant requires. State does not survive a restart; these
//! implementations back tests and single-node development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{NotificationRecord, NotificationStatus};
use crate::template::{NotificationTemplate, TemplateUpdate};

use super::{
    NotificationRepository, RecordFilter, RepositoryError, TemplateFilter, TemplateRepository,
};

/// In-memory notification record store.
#[derive(Default)]
pub struct MemoryNotificationRepository {
    records: DashMap<Uuid, NotificationRecord>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn create(&self, record: NotificationRecord) -> Result<NotificationRecord, RepositoryError> {
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepositoryError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<NotificationRecord>, RepositoryError> {
        let mut records: Vec<NotificationRecord> = self
            .records
            .iter()
            .filter(|r| {
                filter.tenant_id.as_ref().map_or(true, |t| &r.tenant_id == t)
                    && filter.user_id.as_ref().map_or(true, |u| r.user_id.as_ref() == Some(u))
                    && filter.channel.map_or(true, |c| r.channel == c)
                    && filter.status.map_or(true, |s| r.status == s)
            })
            .map(|r| r.clone())
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut record = self.records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        // A retried job re-enters processing; terminal states never regress.
        if record.status == NotificationStatus::Queued {
            record.status = NotificationStatus::Processing;
        }
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut record = self.records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(RepositoryError::InvalidTransition {
                from: record.status,
                to: NotificationStatus::Sent,
            });
        }
        record.status = NotificationStatus::Sent;
        record.sent_at = Some(sent_at);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        let mut record = self.records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(RepositoryError::InvalidTransition {
                from: record.status,
                to: NotificationStatus::Failed,
            });
        }
        record.status = NotificationStatus::Failed;
        record.last_error = Some(error.to_string());
        Ok(())
    }

    async fn mark_read(&self, id: Uuid) -> Result<NotificationRecord, RepositoryError> {
        let mut record = self.records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        match record.status {
            // Idempotent: marking a read notification read again succeeds.
            NotificationStatus::Read => Ok(record.clone()),
            NotificationStatus::Sent => {
                record.status = NotificationStatus::Read;
                record.read_at = Some(Utc::now());
                Ok(record.clone())
            }
            from => Err(RepositoryError::InvalidTransition {
                from,
                to: NotificationStatus::Read,
            }),
        }
    }
}

/// In-memory template store.
#[derive(Default)]
pub struct MemoryTemplateRepository {
    templates: DashMap<Uuid, NotificationTemplate>,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn create(&self, template: NotificationTemplate) -> Result<NotificationTemplate, RepositoryError> {
        self.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationTemplate>, RepositoryError> {
        Ok(self.templates.get(&id).map(|t| t.clone()))
    }

    async fn find_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<NotificationTemplate>, RepositoryError> {
        Ok(self
            .templates
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.name == name)
            .map(|t| t.clone()))
    }

    async fn find(&self, filter: &TemplateFilter) -> Result<Vec<NotificationTemplate>, RepositoryError> {
        let mut templates: Vec<NotificationTemplate> = self
            .templates
            .iter()
            .filter(|t| {
                filter.tenant_id.as_ref().map_or(true, |tenant| &t.tenant_id == tenant)
                    && filter.channel.map_or(true, |c| t.channel == c)
            })
            .map(|t| t.clone())
            .collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(templates)
    }

    async fn update(&self, id: Uuid, updates: TemplateUpdate) -> Result<NotificationTemplate, RepositoryError> {
        let mut template = self.templates.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;

        if let Some(name) = updates.name {
            template.name = name;
        }
        if let Some(subject) = updates.subject {
            template.subject = subject;
        }
        if let Some(content) = updates.content {
            template.content = content;
        }
        if let Some(variables) = updates.variables {
            template.variables = variables;
        }
        template.updated_at = Utc::now();

        template
            .validate()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(template.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.templates
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Channel, Priority};

    fn record(status: NotificationStatus) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            tenant_id: "tenant-1".to_string(),
            user_id: Some("user-1".to_string()),
            channel: Channel::Email,
            recipient: "user@example.com".to_string(),
            subject: None,
            message: "hi".to_string(),
            status,
            priority: Priority::Normal,
            created_at: Utc::now(),
            sent_at: None,
            read_at: None,
            last_error: None,
        }
    }

    fn template(tenant: &str, name: &str) -> NotificationTemplate {
        NotificationTemplate {
            id: Uuid::new_v4(),
            tenant_id: tenant.to_string(),
            name: name.to_string(),
            channel: Channel::Email,
            subject: Some("s".to_string()),
            content: "Hello {{name}}".to_string(),
            variables: vec!["name".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let repo = MemoryNotificationRepository::new();
        let created = repo.create(record(NotificationStatus::Queued)).await.unwrap();

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, NotificationStatus::Queued);
    }

    #[tokio::test]
    async fn test_find_with_filters() {
        let repo = MemoryNotificationRepository::new();
        repo.create(record(NotificationStatus::Queued)).await.unwrap();
        let mut other = record(NotificationStatus::Sent);
        other.tenant_id = "tenant-2".to_string();
        repo.create(other).await.unwrap();

        let filter = RecordFilter {
            tenant_id: Some("tenant-2".to_string()),
            ..Default::default()
        };
        let results = repo.find(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tenant_id, "tenant-2");
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let repo = MemoryNotificationRepository::new();
        let created = repo.create(record(NotificationStatus::Queued)).await.unwrap();

        repo.mark_processing(created.id).await.unwrap();
        repo.mark_sent(created.id, Utc::now()).await.unwrap();

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, NotificationStatus::Sent);
        assert!(found.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_never_regresses() {
        let repo = MemoryNotificationRepository::new();
        let created = repo.create(record(NotificationStatus::Queued)).await.unwrap();

        repo.mark_processing(created.id).await.unwrap();
        repo.mark_failed(created.id, "boom").await.unwrap();

        assert!(matches!(
            repo.mark_sent(created.id, Utc::now()).await,
            Err(RepositoryError::InvalidTransition { .. })
        ));
        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, NotificationStatus::Failed);
        assert_eq!(found.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_mark_read_only_from_sent() {
        let repo = MemoryNotificationRepository::new();
        let queued = repo.create(record(NotificationStatus::Queued)).await.unwrap();
        assert!(matches!(
            repo.mark_read(queued.id).await,
            Err(RepositoryError::InvalidTransition { .. })
        ));

        let sent = repo.create(record(NotificationStatus::Sent)).await.unwrap();
        let read = repo.mark_read(sent.id).await.unwrap();
        assert_eq!(read.status, NotificationStatus::Read);
        assert!(read.read_at.is_some());

        // Idempotent second call keeps the original read_at.
        let again = repo.mark_read(sent.id).await.unwrap();
        assert_eq!(again.read_at, read.read_at);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id() {
        let repo = MemoryNotificationRepository::new();
        assert!(matches!(
            repo.mark_read(Uuid::new_v4()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_template_crud() {
        let repo = MemoryTemplateRepository::new();
        let created = repo.create(template("tenant-1", "welcome")).await.unwrap();

        let by_name = repo
            .find_by_name("tenant-1", "welcome")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, created.id);

        let updated = repo
            .update(
                created.id,
                TemplateUpdate {
                    content: Some("Hi {{name}}".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "Hi {{name}}");

        repo.delete(created.id).await.unwrap();
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_is_tenant_scoped() {
        let repo = MemoryTemplateRepository::new();
        let a = repo.create(template("tenant-a", "welcome")).await.unwrap();
        let b = repo.create(template("tenant-b", "welcome")).await.unwrap();

        let for_a = repo
            .find_by_name("tenant-a", "welcome")
            .await
            .unwrap()
            .unwrap();
        let for_b = repo
            .find_by_name("tenant-b", "welcome")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(for_a.id, a.id);
        assert_eq!(for_b.id, b.id);

        assert!(repo
            .find_by_name("tenant-c", "welcome")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_template_tenant_filter() {
        let repo = MemoryTemplateRepository::new();
        repo.create(template("tenant-1", "a")).await.unwrap();
        repo.create(template("tenant-1", "b")).await.unwrap();
        repo.create(template("tenant-2", "c")).await.unwrap();

        let filter = TemplateFilter {
            tenant_id: Some("tenant-1".to_string()),
            channel: None,
        };
        assert_eq!(repo.find(&filter).await.unwrap().len(), 2);
    }
}
