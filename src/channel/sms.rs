//! SMS adapter delivering through an HTTP telephony gateway.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::SmsConfig;
use crate::notification::{Channel, NotificationJob};
use crate::template::substitute;

use super::{ChannelAdapter, SendError};

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Telephony-gateway SMS adapter.
///
/// Sends the raw message (after placeholder substitution) to the
/// recipient phone number. Without configured gateway credentials every
/// send fails immediately with a configuration error, so unsendable jobs
/// settle through normal failure handling instead of piling up.
pub struct SmsAdapter {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsAdapter {
    pub fn new(config: SmsConfig) -> Self {
        if !config.is_configured() {
            tracing::warn!("SMS gateway credentials not configured, SMS sends will fail");
        }
        let client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let (Some(account_sid), Some(auth_token), Some(from_number)) = (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
            self.config.from_number.as_deref(),
        ) else {
            return Err(SendError::Configuration(
                "SMS gateway credentials not configured".to_string(),
            ));
        };

        let body = substitute(&job.message, &job.data);

        let response = self
            .client
            .post(format!("{}/messages", self.config.gateway_url))
            .basic_auth(account_sid, Some(auth_token))
            .form(&[
                ("From", from_number),
                ("To", job.recipient.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("SMS gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SendError::Transport(format!(
                "SMS gateway returned status {}",
                response.status()
            )));
        }

        tracing::info!(
            job_id = %job.id,
            recipient = %job.recipient,
            "SMS sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn sms_job() -> NotificationJob {
        NotificationJob {
            id: Uuid::new_v4(),
            tenant_id: "system".to_string(),
            channel: Channel::Sms,
            recipient: "+393331112222".to_string(),
            subject: None,
            message: "Your code is {{code}}".to_string(),
            template: None,
            data: HashMap::new(),
            priority: Priority::Normal,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_with_configuration_error() {
        let adapter = SmsAdapter::new(SmsConfig::default());

        let err = adapter.send(&sms_job()).await.unwrap_err();
        assert!(matches!(err, SendError::Configuration(_)));
        assert!(!err.is_retryable());
    }
}
