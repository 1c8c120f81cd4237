//! Channel adapters: one uniform "send one job" capability per transport.
//!
//! Adapters perform exactly one transport attempt per invocation; retry
//! scheduling lives in the worker pool so a waiting retry never blocks a
//! worker.

mod email;
mod in_app;
mod sms;
mod webhook;

pub use email::EmailAdapter;
pub use in_app::InAppAdapter;
pub use sms::SmsAdapter;
pub use webhook::WebhookAdapter;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::{Channel, NotificationJob};

/// Errors an adapter can report for a single delivery attempt.
#[derive(Debug, Error)]
pub enum SendError {
    /// Required credentials are absent. Deterministic until corrected;
    /// never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient failure from the underlying provider (SMTP, HTTP,
    /// gateway). Retried only where the channel's policy allows.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl SendError {
    /// Whether the retry policy may consider re-attempting this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transport(_))
    }
}

/// Uniform send capability wrapping one specific transport.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Deliver one job. Exactly one transport attempt.
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError>;
}
