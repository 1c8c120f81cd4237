mod settings;

pub use settings::{
    QueueSettings, RetrySettings, ServerConfig, Settings, SmsConfig, SmtpConfig, WebhookConfig,
    WorkerSettings,
};
