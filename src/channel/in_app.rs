//! In-app adapter: delivery is the persisted record itself.

use async_trait::async_trait;

use crate::notification::{Channel, NotificationJob};

use super::{ChannelAdapter, SendError};

/// In-app notifications have no external transport. The stored record,
/// marked sent by the worker, is what clients poll through the read API,
/// so the send step only has to succeed.
pub struct InAppAdapter;

impl InAppAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InAppAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for InAppAdapter {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        tracing::debug!(
            job_id = %job.id,
            user_id = %job.recipient,
            "in-app notification stored"
        );
        Ok(())
    }
}
