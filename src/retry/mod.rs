//! Retry policy: decides whether a failed delivery goes back to the
//! queue with a delay or settles as a permanent failure.

use std::time::Duration;

use crate::channel::SendError;
use crate::config::RetrySettings;
use crate::notification::Channel;

/// Outcome of consulting the policy after a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue the job, visible again after the given delay.
    Retry(Duration),
    /// Settle the job as permanently failed.
    Fail,
}

/// Exponential-backoff retry policy.
///
/// Only webhook deliveries are retried: email and SMS providers queue
/// internally, and in-app sends cannot fail in transport. The delay for
/// a failure on attempt `n` is `base * 2^n`, so with the default 1s base
/// the first retry waits 2s and the second 4s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    webhook_max_attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            webhook_max_attempts: settings.webhook_max_attempts,
            backoff_base: Duration::from_secs(settings.backoff_base_seconds),
        }
    }

    /// Decide the fate of a job whose delivery attempt `attempt`
    /// (1-based) just failed with `error`.
    pub fn decide(&self, channel: Channel, attempt: u32, error: &SendError) -> RetryDecision {
        if channel != Channel::Webhook || !error.is_retryable() {
            return RetryDecision::Fail;
        }
        if attempt >= self.webhook_max_attempts {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry(self.backoff_base * 2u32.pow(attempt))
    }
}
