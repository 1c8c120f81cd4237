//! Dispatcher: validates submissions and routes them onto channel queues.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::{JOBS_ENQUEUED_TOTAL, SUBMISSIONS_REJECTED_TOTAL};
use crate::queue::{ChannelQueues, QueueError};
use crate::repository::{NotificationRepository, RepositoryError};

use super::{
    BulkSubmitResponse, Channel, NotificationJob, NotificationRecord, NotificationStatus,
    Priority, SubmitRequest,
};

/// Tenant applied when a submission carries none.
pub const DEFAULT_TENANT: &str = "system";

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The submission is malformed; nothing was enqueued or persisted.
    #[error("Missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Front door for notification submissions.
///
/// Validation happens before any side effect: a rejected request leaves
/// queue depths and stored records untouched. Accepted submissions are
/// recorded first and enqueued second, so the record always exists by
/// the time a worker can lease the job and settle its status. A crash
/// between the two strands a `queued` record whose job never runs,
/// which polling clients already have to tolerate.
#[derive(Clone)]
pub struct Dispatcher {
    queues: ChannelQueues,
    records: Arc<dyn NotificationRepository>,
}

impl Dispatcher {
    pub fn new(queues: ChannelQueues, records: Arc<dyn NotificationRepository>) -> Self {
        Self { queues, records }
    }

    /// Validate and enqueue one notification.
    pub async fn submit(
        &self,
        request: SubmitRequest,
    ) -> Result<NotificationRecord, DispatchError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            SUBMISSIONS_REJECTED_TOTAL.inc();
            return Err(DispatchError::Validation(missing));
        }

        let (job, record) = materialize(&request);
        let channel = job.channel;

        // Record first: a worker may lease the job immediately after the
        // enqueue and must find a record to settle.
        let record = self.records.create(record).await?;
        self.queues.get(channel).enqueue(job).await?;
        JOBS_ENQUEUED_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();

        tracing::info!(
            notification_id = %record.id,
            channel = channel.as_str(),
            tenant_id = %record.tenant_id,
            priority = ?record.priority,
            "Notification queued"
        );
        Ok(record)
    }

    /// Validate and enqueue a batch.
    ///
    /// Invalid items are skipped individually; valid items from the same
    /// request still go through. Items are grouped per channel so each
    /// queue sees a single bulk insert, preserving submission order
    /// within the batch.
    pub async fn submit_bulk(
        &self,
        requests: Vec<SubmitRequest>,
    ) -> Result<BulkSubmitResponse, DispatchError> {
        let mut per_channel: Vec<(Channel, Vec<NotificationJob>)> = Channel::ALL
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect();
        let mut records = Vec::new();

        for request in &requests {
            if !request.missing_fields().is_empty() {
                SUBMISSIONS_REJECTED_TOTAL.inc();
                continue;
            }
            let (job, record) = materialize(request);
            let slot = per_channel
                .iter_mut()
                .find(|(c, _)| *c == job.channel)
                .map(|(_, jobs)| jobs);
            if let Some(jobs) = slot {
                jobs.push(job);
            }
            records.push(record);
        }

        // All records land before any job becomes leasable.
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.records.create(record).await?);
        }

        for (channel, jobs) in per_channel {
            if jobs.is_empty() {
                continue;
            }
            JOBS_ENQUEUED_TOTAL
                .with_label_values(&[channel.as_str()])
                .inc_by(jobs.len() as u64);
            self.queues.get(channel).enqueue_bulk(jobs).await?;
        }

        tracing::info!(
            submitted = requests.len(),
            accepted = created.len(),
            "Bulk notifications queued"
        );
        Ok(BulkSubmitResponse {
            count: created.len(),
            notifications: created,
        })
    }
}

/// Build the queue job and the stored record for an already-validated
/// request. Both carry the same freshly minted id.
fn materialize(request: &SubmitRequest) -> (NotificationJob, NotificationRecord) {
    let id = Uuid::new_v4();
    let channel = request.channel.unwrap_or(Channel::InApp);
    let priority = request.priority.unwrap_or(Priority::Normal);
    let recipient = request.recipient.clone().unwrap_or_default();
    let message = request.message.clone().unwrap_or_default();
    let tenant_id = request
        .tenant_id
        .clone()
        .unwrap_or_else(|| DEFAULT_TENANT.to_string());

    let job = NotificationJob {
        id,
        tenant_id: tenant_id.clone(),
        channel,
        recipient: recipient.clone(),
        subject: request.subject.clone(),
        message: message.clone(),
        template: request.template.clone(),
        data: request.data.clone().unwrap_or_default(),
        priority,
        attempt: 0,
    };
    let record = NotificationRecord {
        id,
        tenant_id,
        user_id: request.user_id.clone(),
        channel,
        recipient,
        subject: request.subject.clone(),
        message,
        status: NotificationStatus::Queued,
        priority,
        created_at: Utc::now(),
        sent_at: None,
        read_at: None,
        last_error: None,
    };
    (job, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryJobQueue;
    use crate::repository::MemoryNotificationRepository;
    use std::collections::HashMap;
    use std::time::Duration;

    fn dispatcher() -> (Dispatcher, ChannelQueues, Arc<MemoryNotificationRepository>) {
        let queues: HashMap<Channel, Arc<dyn crate::queue::JobQueue>> = Channel::ALL
            .into_iter()
            .map(|c| {
                (
                    c,
                    Arc::new(MemoryJobQueue::new(Duration::from_secs(30)))
                        as Arc<dyn crate::queue::JobQueue>,
                )
            })
            .collect();
        let queues = ChannelQueues::new(queues);
        let records = Arc::new(MemoryNotificationRepository::new());
        (
            Dispatcher::new(queues.clone(), records.clone()),
            queues,
            records,
        )
    }

    fn request(channel: Channel, recipient: &str) -> SubmitRequest {
        SubmitRequest {
            channel: Some(channel),
            recipient: Some(recipient.to_string()),
            subject: None,
            message: Some("hello".to_string()),
            template: None,
            data: None,
            priority: None,
            tenant_id: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_submit_enqueues_and_records() {
        let (dispatcher, queues, records) = dispatcher();

        let record = dispatcher
            .submit(request(Channel::Email, "a@example.com"))
            .await
            .unwrap();

        assert_eq!(record.status, NotificationStatus::Queued);
        assert_eq!(record.tenant_id, "system");
        let counts = queues.counts(Channel::Email).await.unwrap();
        assert_eq!(counts.waiting, 1);
        assert!(records.find_by_id(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_submit_has_no_side_effects() {
        let (dispatcher, queues, records) = dispatcher();

        let mut bad = request(Channel::Email, "a@example.com");
        bad.message = None;
        bad.recipient = None;
        let err = dispatcher.submit(bad).await.unwrap_err();

        match err {
            DispatchError::Validation(fields) => {
                assert_eq!(fields, vec!["recipient", "message"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        for channel in Channel::ALL {
            assert_eq!(queues.counts(channel).await.unwrap().waiting, 0);
        }
        assert!(records.find(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_partitions_by_channel_and_skips_invalid() {
        let (dispatcher, queues, _records) = dispatcher();

        let mut invalid = request(Channel::Sms, "+15550001111");
        invalid.message = None;
        let batch = vec![
            request(Channel::Email, "a@example.com"),
            request(Channel::Webhook, "https://example.com/hook"),
            invalid,
            request(Channel::Email, "b@example.com"),
        ];

        let response = dispatcher.submit_bulk(batch).await.unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(queues.counts(Channel::Email).await.unwrap().waiting, 2);
        assert_eq!(queues.counts(Channel::Webhook).await.unwrap().waiting, 1);
        assert_eq!(queues.counts(Channel::Sms).await.unwrap().waiting, 0);
    }

    #[tokio::test]
    async fn test_explicit_tenant_and_priority_are_kept() {
        let (dispatcher, _queues, _records) = dispatcher();

        let mut req = request(Channel::InApp, "user-1");
        req.tenant_id = Some("acme".to_string());
        req.priority = Some(Priority::High);
        let record = dispatcher.submit(req).await.unwrap();

        assert_eq!(record.tenant_id, "acme");
        assert_eq!(record.priority, Priority::High);
    }
}
