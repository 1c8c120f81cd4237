//! Per-channel worker pools draining the job queues.
//!
//! Each channel gets its own pool of tokio tasks. A worker leases one
//! job at a time, delivers it through the channel's adapter, then
//! settles the lease: ack on success, deferred re-enqueue when the
//! retry policy allows, terminal failure otherwise.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::channel::ChannelAdapter;
use crate::config::WorkerSettings;
use crate::metrics::{
    JOBS_FAILED_TOTAL, JOBS_SENT_TOTAL, JOB_RETRIES_TOTAL, SEND_DURATION_SECONDS,
};
use crate::notification::Channel;
use crate::queue::{JobQueue, LeasedJob};
use crate::repository::NotificationRepository;
use crate::retry::{RetryDecision, RetryPolicy};

/// Worker pool for one delivery channel.
pub struct WorkerPool {
    channel: Channel,
    queue: Arc<dyn JobQueue>,
    adapter: Arc<dyn ChannelAdapter>,
    records: Arc<dyn NotificationRepository>,
    policy: RetryPolicy,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        channel: Channel,
        queue: Arc<dyn JobQueue>,
        adapter: Arc<dyn ChannelAdapter>,
        records: Arc<dyn NotificationRepository>,
        policy: RetryPolicy,
        settings: &WorkerSettings,
    ) -> Self {
        Self {
            channel,
            queue,
            adapter,
            records,
            policy,
            concurrency: settings.concurrency_for(channel),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        }
    }

    /// Spawn the pool's workers. Each worker runs until the shutdown
    /// channel fires, then finishes its in-flight job and exits.
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        tracing::info!(
            channel = self.channel.as_str(),
            concurrency = self.concurrency,
            "Starting worker pool"
        );

        let pool = Arc::new(self);
        (0..pool.concurrency)
            .map(|worker_id| {
                let pool = pool.clone();
                let mut shutdown = shutdown.subscribe();
                tokio::spawn(async move {
                    loop {
                        if !matches!(
                            shutdown.try_recv(),
                            Err(broadcast::error::TryRecvError::Empty)
                        ) {
                            tracing::debug!(
                                channel = pool.channel.as_str(),
                                worker_id,
                                "Worker received shutdown signal"
                            );
                            break;
                        }

                        // The lease is awaited to completion, never raced
                        // against shutdown: cancelling it mid-flight would
                        // leave a backend-side lease held until its timeout.
                        match pool.queue.lease().await {
                            Ok(Some(leased)) => pool.process(leased).await,
                            Ok(None) => {
                                tokio::select! {
                                    _ = shutdown.recv() => break,
                                    _ = tokio::time::sleep(pool.idle_delay()) => {}
                                }
                            }
                            Err(e) => {
                                tracing::error!(
                                    channel = pool.channel.as_str(),
                                    error = %e,
                                    "Failed to lease job"
                                );
                                tokio::select! {
                                    _ = shutdown.recv() => break,
                                    _ = tokio::time::sleep(pool.idle_delay()) => {}
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Idle backoff with jitter so a pool's workers don't poll in lockstep.
    fn idle_delay(&self) -> Duration {
        let base = self.poll_interval.as_millis() as u64;
        let jitter = rand::rng().random_range(0..=base / 4);
        Duration::from_millis(base + jitter)
    }

    async fn process(&self, leased: LeasedJob) {
        let job = &leased.job;
        let channel = self.channel.as_str();

        if let Err(e) = self.records.mark_processing(job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to mark record processing");
        }

        let timer = SEND_DURATION_SECONDS
            .with_label_values(&[channel])
            .start_timer();
        let result = self.adapter.send(job).await;
        timer.observe_duration();

        match result {
            Ok(()) => {
                JOBS_SENT_TOTAL.with_label_values(&[channel]).inc();
                if let Err(e) = self.queue.ack(leased.lease_id).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to ack lease");
                }
                if let Err(e) = self.records.mark_sent(job.id, chrono::Utc::now()).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to mark record sent");
                }
                tracing::info!(
                    job_id = %job.id,
                    channel,
                    attempt = job.attempt,
                    "Notification delivered"
                );
            }
            Err(send_err) => {
                match self.policy.decide(self.channel, job.attempt, &send_err) {
                    RetryDecision::Retry(delay) => {
                        JOB_RETRIES_TOTAL.inc();
                        tracing::warn!(
                            job_id = %job.id,
                            channel,
                            attempt = job.attempt,
                            delay_secs = delay.as_secs(),
                            error = %send_err,
                            "Delivery failed, scheduling retry"
                        );
                        if let Err(e) = self.queue.nack_with_delay(leased.lease_id, delay).await {
                            tracing::error!(job_id = %job.id, error = %e, "Failed to nack lease");
                        }
                    }
                    RetryDecision::Fail => {
                        JOBS_FAILED_TOTAL.with_label_values(&[channel]).inc();
                        tracing::error!(
                            job_id = %job.id,
                            channel,
                            attempt = job.attempt,
                            error = %send_err,
                            "Delivery failed permanently"
                        );
                        if let Err(e) = self.queue.fail(leased.lease_id).await {
                            tracing::warn!(job_id = %job.id, error = %e, "Failed to settle lease");
                        }
                        if let Err(e) = self
                            .records
                            .mark_failed(job.id, &send_err.to_string())
                            .await
                        {
                            tracing::warn!(job_id = %job.id, error = %e, "Failed to mark record failed");
                        }
                    }
                }
            }
        }
    }
}
