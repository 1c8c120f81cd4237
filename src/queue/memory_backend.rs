//! In-memory job queue backend.
//!
//! This backend keeps the backlog in process memory. Jobs do not survive a
//! restart, so it is intended for tests and single-node development; the
//! Redis backend provides durability in production. Ordering and lease
//! semantics are identical across backends.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::notification::NotificationJob;

use super::backend::{JobQueue, LeasedJob, QueueCounts, QueueError};

/// A job waiting in the ready heap.
///
/// Ordered so the heap pops the highest priority weight first, ties broken
/// by enqueue sequence ascending (FIFO within a priority tier).
struct ReadyEntry {
    weight: u8,
    seq: u64,
    job: NotificationJob,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.seq == other.seq
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher weight wins, then lower sequence wins.
        self.weight
            .cmp(&other.weight)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A job nacked with a delay, not yet eligible for lease.
struct DelayedEntry {
    eligible_at: Instant,
    job: NotificationJob,
}

/// A job exclusively held by one worker.
struct LeaseEntry {
    job: NotificationJob,
    deadline: Instant,
}

struct Inner {
    seq: u64,
    ready: BinaryHeap<ReadyEntry>,
    delayed: Vec<DelayedEntry>,
    leased: HashMap<Uuid, LeaseEntry>,
    completed: u64,
    failed: u64,
}

impl Inner {
    /// Move delayed jobs whose eligibility time has passed into the ready
    /// heap, and reclaim jobs whose lease expired without an ack. Both
    /// re-enter the priority/FIFO ordering with a fresh sequence number.
    fn promote(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].eligible_at <= now {
                let entry = self.delayed.swap_remove(i);
                self.push_ready(entry.job);
            } else {
                i += 1;
            }
        }

        let expired: Vec<Uuid> = self
            .leased
            .iter()
            .filter(|(_, l)| l.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for lease_id in expired {
            if let Some(lease) = self.leased.remove(&lease_id) {
                tracing::warn!(
                    job_id = %lease.job.id,
                    lease_id = %lease_id,
                    "Lease expired without ack, job eligible again"
                );
                self.push_ready(lease.job);
            }
        }
    }

    fn push_ready(&mut self, job: NotificationJob) {
        let seq = self.seq;
        self.seq += 1;
        self.ready.push(ReadyEntry {
            weight: job.priority.as_weight(),
            seq,
            job,
        });
    }
}

/// In-memory job queue for one channel.
pub struct MemoryJobQueue {
    inner: Mutex<Inner>,
    lease_timeout: Duration,
}

impl MemoryJobQueue {
    /// Create a queue with the given lease timeout.
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                seq: 0,
                ready: BinaryHeap::new(),
                delayed: Vec::new(),
                leased: HashMap::new(),
                completed: 0,
                failed: 0,
            }),
            lease_timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic while holding it; the queue state
        // is still structurally valid, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), QueueError> {
        let mut inner = self.lock();
        tracing::debug!(job_id = %job.id, channel = %job.channel, "Job enqueued");
        inner.push_ready(job);
        Ok(())
    }

    async fn enqueue_bulk(&self, jobs: Vec<NotificationJob>) -> Result<(), QueueError> {
        // Single lock acquisition makes the bulk insert atomic with
        // respect to concurrent leases.
        let mut inner = self.lock();
        let count = jobs.len();
        for job in jobs {
            inner.push_ready(job);
        }
        tracing::debug!(count = count, "Bulk jobs enqueued");
        Ok(())
    }

    async fn lease(&self) -> Result<Option<LeasedJob>, QueueError> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.promote(now);

        let Some(entry) = inner.ready.pop() else {
            return Ok(None);
        };

        let mut job = entry.job;
        job.attempt += 1;

        let lease_id = Uuid::new_v4();
        inner.leased.insert(
            lease_id,
            LeaseEntry {
                job: job.clone(),
                deadline: now + self.lease_timeout,
            },
        );

        Ok(Some(LeasedJob { lease_id, job }))
    }

    async fn ack(&self, lease_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.lock();
        if inner.leased.remove(&lease_id).is_none() {
            return Err(QueueError::UnknownLease(lease_id));
        }
        inner.completed += 1;
        Ok(())
    }

    async fn fail(&self, lease_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.lock();
        if inner.leased.remove(&lease_id).is_none() {
            return Err(QueueError::UnknownLease(lease_id));
        }
        inner.failed += 1;
        Ok(())
    }

    async fn nack_with_delay(&self, lease_id: Uuid, delay: Duration) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let lease = inner
            .leased
            .remove(&lease_id)
            .ok_or(QueueError::UnknownLease(lease_id))?;

        tracing::debug!(
            job_id = %lease.job.id,
            delay_ms = delay.as_millis() as u64,
            attempt = lease.job.attempt,
            "Job rescheduled with delay"
        );
        inner.delayed.push(DelayedEntry {
            eligible_at: Instant::now() + delay,
            job: lease.job,
        });
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let mut inner = self.lock();
        inner.promote(Instant::now());
        Ok(QueueCounts {
            waiting: (inner.ready.len() + inner.delayed.len()) as u64,
            active: inner.leased.len() as u64,
            completed: inner.completed,
            failed: inner.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Channel, Priority};
    use std::collections::HashMap as StdHashMap;

    fn job_with_priority(message: &str, priority: Priority) -> NotificationJob {
        NotificationJob {
            id: Uuid::new_v4(),
            tenant_id: "system".to_string(),
            channel: Channel::Email,
            recipient: "user@example.com".to_string(),
            subject: None,
            message: message.to_string(),
            template: None,
            data: StdHashMap::new(),
            priority,
            attempt: 0,
        }
    }

    fn queue() -> MemoryJobQueue {
        MemoryJobQueue::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_lease_empty_queue() {
        let q = queue();
        assert!(q.lease().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_priority_then_fifo_order() {
        let q = queue();
        q.enqueue(job_with_priority("A", Priority::Low)).await.unwrap();
        q.enqueue(job_with_priority("B", Priority::High)).await.unwrap();
        q.enqueue(job_with_priority("C", Priority::Normal)).await.unwrap();

        let first = q.lease().await.unwrap().unwrap();
        let second = q.lease().await.unwrap().unwrap();
        let third = q.lease().await.unwrap().unwrap();

        assert_eq!(first.job.message, "B");
        assert_eq!(second.job.message, "C");
        assert_eq!(third.job.message, "A");
    }

    #[tokio::test]
    async fn test_fifo_within_same_priority() {
        let q = queue();
        for i in 0..5 {
            q.enqueue(job_with_priority(&format!("job-{}", i), Priority::Normal))
                .await
                .unwrap();
        }
        for i in 0..5 {
            let leased = q.lease().await.unwrap().unwrap();
            assert_eq!(leased.job.message, format!("job-{}", i));
        }
    }

    #[tokio::test]
    async fn test_lease_is_exclusive() {
        let q = queue();
        q.enqueue(job_with_priority("only", Priority::Normal)).await.unwrap();

        let first = q.lease().await.unwrap();
        assert!(first.is_some());
        // The same job must not be visible to a second lease.
        assert!(q.lease().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lease_increments_attempt() {
        let q = queue();
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        assert_eq!(leased.job.attempt, 1);

        q.nack_with_delay(leased.lease_id, Duration::ZERO).await.unwrap();
        let again = q.lease().await.unwrap().unwrap();
        assert_eq!(again.job.attempt, 2);
    }

    #[tokio::test]
    async fn test_ack_removes_job() {
        let q = queue();
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        q.ack(leased.lease_id).await.unwrap();

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.waiting, 0);
        assert_eq!(counts.active, 0);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 0);
    }

    #[tokio::test]
    async fn test_fail_is_terminal() {
        let q = queue();
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        q.fail(leased.lease_id).await.unwrap();

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert!(q.lease().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_double_ack_rejected() {
        let q = queue();
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        q.ack(leased.lease_id).await.unwrap();
        assert!(matches!(
            q.ack(leased.lease_id).await,
            Err(QueueError::UnknownLease(_))
        ));
    }

    #[tokio::test]
    async fn test_nack_delays_eligibility() {
        let q = queue();
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        q.nack_with_delay(leased.lease_id, Duration::from_millis(50))
            .await
            .unwrap();

        // Not yet eligible.
        assert!(q.lease().await.unwrap().is_none());
        // Still counted as waiting.
        assert_eq!(q.counts().await.unwrap().waiting, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let again = q.lease().await.unwrap().unwrap();
        assert_eq!(again.job.message, "x");
    }

    #[tokio::test]
    async fn test_expired_lease_reclaimed() {
        let q = MemoryJobQueue::new(Duration::from_millis(20));
        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();

        let leased = q.lease().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Lease expired; the job is eligible again for another worker.
        let reclaimed = q.lease().await.unwrap().unwrap();
        assert_eq!(reclaimed.job.id, leased.job.id);
        assert_ne!(reclaimed.lease_id, leased.lease_id);

        // The stale lease can no longer ack.
        assert!(matches!(
            q.ack(leased.lease_id).await,
            Err(QueueError::UnknownLease(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_bulk_counts() {
        let q = queue();
        let jobs: Vec<_> = (0..4)
            .map(|i| job_with_priority(&format!("j{}", i), Priority::Normal))
            .collect();
        q.enqueue_bulk(jobs).await.unwrap();

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.waiting, 4);
        assert_eq!(counts.active, 0);
    }

    #[tokio::test]
    async fn test_counts_track_single_operations() {
        let q = queue();
        let before = q.counts().await.unwrap();
        assert_eq!(before.waiting, 0);

        q.enqueue(job_with_priority("x", Priority::Normal)).await.unwrap();
        assert_eq!(q.counts().await.unwrap().waiting, 1);

        let leased = q.lease().await.unwrap().unwrap();
        let during = q.counts().await.unwrap();
        assert_eq!(during.waiting, 0);
        assert_eq!(during.active, 1);

        q.ack(leased.lease_id).await.unwrap();
        let after = q.counts().await.unwrap();
        assert_eq!(after.active, 0);
        assert_eq!(after.completed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_workers_never_share_a_job() {
        let q = std::sync::Arc::new(queue());
        for i in 0..50 {
            q.enqueue(job_with_priority(&format!("j{}", i), Priority::Normal))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let q = q.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(leased) = q.lease().await.unwrap() {
                    seen.push(leased.job.id);
                    q.ack(leased.lease_id).await.unwrap();
                }
                seen
            }));
        }

        let mut all: Vec<Uuid> = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50);
    }
}
