use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub workers: WorkerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_smtp_from")]
    pub from: String,
    #[serde(default)]
    pub use_tls: bool,
}

/// HTTP telephony gateway credentials. All three credential fields must be
/// present for the SMS adapter to be considered configured.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_sms_gateway_url")]
    pub gateway_url: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

impl SmsConfig {
    /// Whether gateway credentials are fully configured.
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
    /// Fixed User-Agent sent with every outbound webhook.
    #[serde(default = "default_webhook_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// `"memory"` or `"redis"`.
    #[serde(default = "default_queue_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
    /// How long a worker may hold a lease before the job becomes eligible
    /// again.
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_seconds: u64,
}

/// Worker concurrency, independent per channel.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_email_workers")]
    pub email: usize,
    #[serde(default = "default_sms_workers")]
    pub sms: usize,
    #[serde(default = "default_webhook_workers")]
    pub webhook: usize,
    #[serde(default = "default_in_app_workers")]
    pub in_app: usize,
    /// Idle poll interval in milliseconds when a channel queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl WorkerSettings {
    /// Worker count for the given channel's pool.
    pub fn concurrency_for(&self, channel: crate::notification::Channel) -> usize {
        use crate::notification::Channel;
        match channel {
            Channel::Email => self.email,
            Channel::Sms => self.sms,
            Channel::Webhook => self.webhook,
            Channel::InApp => self.in_app,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Maximum total delivery attempts for the webhook channel.
    #[serde(default = "default_webhook_max_attempts")]
    pub webhook_max_attempts: u32,
    /// Base for the exponential backoff: the delay before retry n+1 is
    /// `backoff_base_seconds * 2^n` seconds.
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3006
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "noreply@localhost".to_string()
}

fn default_sms_gateway_url() -> String {
    "https://api.sms-gateway.local".to_string()
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_webhook_user_agent() -> String {
    "Courier-Notification-Service/1.0".to_string()
}

fn default_queue_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_prefix() -> String {
    "courier:queue".to_string()
}

fn default_lease_timeout() -> u64 {
    30
}

fn default_email_workers() -> usize {
    4
}

fn default_sms_workers() -> usize {
    2
}

fn default_webhook_workers() -> usize {
    4
}

fn default_in_app_workers() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_webhook_max_attempts() -> u32 {
    3
}

fn default_backoff_base_seconds() -> u64 {
    1
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SMTP_HOST, QUEUE_BACKEND, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            smtp: SmtpConfig::default(),
            sms: SmsConfig::default(),
            webhook: WebhookConfig::default(),
            queue: QueueSettings::default(),
            workers: WorkerSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: default_smtp_from(),
            use_tls: false,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_sms_gateway_url(),
            account_sid: None,
            auth_token: None,
            from_number: None,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_webhook_timeout(),
            user_agent: default_webhook_user_agent(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            redis_url: default_redis_url(),
            redis_prefix: default_redis_prefix(),
            lease_timeout_seconds: default_lease_timeout(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            email: default_email_workers(),
            sms: default_sms_workers(),
            webhook: default_webhook_workers(),
            in_app: default_in_app_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            webhook_max_attempts: default_webhook_max_attempts(),
            backoff_base_seconds: default_backoff_base_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3006);
        assert_eq!(settings.webhook.timeout_seconds, 10);
        assert_eq!(settings.retry.webhook_max_attempts, 3);
        assert_eq!(settings.queue.backend, "memory");
    }

    #[test]
    fn test_sms_configured_requires_all_credentials() {
        let mut sms = SmsConfig::default();
        assert!(!sms.is_configured());

        sms.account_sid = Some("sid".to_string());
        sms.auth_token = Some("token".to_string());
        assert!(!sms.is_configured());

        sms.from_number = Some("+15550001111".to_string());
        assert!(sms.is_configured());
    }
}
