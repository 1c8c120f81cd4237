//! Backend trait for per-channel job queue storage.
//!
//! This module defines the abstraction layer for queue backends, allowing
//! different storage implementations (memory, Redis) to be used
//! interchangeably. A backend owns the backlog for exactly one channel.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::NotificationJob;

/// Errors that can occur during queue backend operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The lease being acknowledged is unknown (already acked or expired).
    #[error("Unknown lease: {0}")]
    UnknownLease(Uuid),

    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// A job leased to exactly one worker.
///
/// The lease is exclusive: until the worker acks, fails, or nacks it (or
/// the lease timeout elapses), no other worker can observe the job.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    /// Lease identifier, distinct from the job id so a late ack from an
    /// expired lease cannot touch a re-leased job.
    pub lease_id: Uuid,

    /// The leased job. `attempt` has already been incremented for this
    /// delivery attempt (1-based).
    pub job: NotificationJob,
}

/// Point-in-time counters for one channel queue.
///
/// The four reads are independent; under concurrent mutation they may
/// observe different instants. Callers must treat them as approximations.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueCounts {
    /// Jobs waiting to be leased, including delayed jobs not yet eligible.
    pub waiting: u64,
    /// Jobs currently leased by a worker.
    pub active: u64,
    /// Jobs acked as successfully delivered.
    pub completed: u64,
    /// Jobs terminally failed.
    pub failed: u64,
}

/// Backend trait for per-channel job queue storage.
///
/// # Ordering
///
/// `lease` must return the eligible job with the highest priority weight,
/// ties broken by enqueue order (FIFO within a priority tier). Jobs nacked
/// with a delay become eligible at their eligibility time and re-enter the
/// same ordering.
///
/// # Mutual exclusion
///
/// The lease is the system's only synchronization point: all mutations
/// (enqueue, lease, ack, nack) must be atomic, and a job may be held by at
/// most one worker at a time. Leases carry a timeout; an unacked job whose
/// lease expired becomes eligible again, which yields at-least-once
/// delivery (duplicates are possible after a crash between transport
/// success and ack).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a single job.
    async fn enqueue(&self, job: NotificationJob) -> Result<(), QueueError>;

    /// Enqueue a batch of jobs as one atomic insert.
    async fn enqueue_bulk(&self, jobs: Vec<NotificationJob>) -> Result<(), QueueError>;

    /// Lease the next eligible job, or `None` if nothing is eligible.
    ///
    /// The returned job's `attempt` counter has been incremented.
    async fn lease(&self) -> Result<Option<LeasedJob>, QueueError>;

    /// Acknowledge successful delivery; removes the job permanently.
    async fn ack(&self, lease_id: Uuid) -> Result<(), QueueError>;

    /// Record terminal failure; removes the job permanently.
    async fn fail(&self, lease_id: Uuid) -> Result<(), QueueError>;

    /// Return a leased job to the queue, eligible again after `delay`.
    ///
    /// This is how retry backoff is implemented: the worker is freed
    /// immediately instead of sleeping through the delay.
    async fn nack_with_delay(&self, lease_id: Uuid, delay: Duration) -> Result<(), QueueError>;

    /// Current counters for this queue.
    async fn counts(&self) -> Result<QueueCounts, QueueError>;
}
