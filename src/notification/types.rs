use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Webhook,
    InApp,
}

impl Channel {
    /// All channels, in a fixed order. Used to build one queue per channel
    /// and to aggregate statistics.
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Sms, Channel::Webhook, Channel::InApp];

    /// Stable string name, matching the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Webhook => "webhook",
            Channel::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority, can be delayed
    Low,
    /// Normal priority (default)
    #[default]
    Normal,
    /// High priority, should be delivered promptly
    High,
}

impl Priority {
    /// Numeric weight used for queue ordering. Higher weight dequeues first.
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 5,
            Priority::High => 10,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

/// Lifecycle status of a persisted notification record.
///
/// Transitions are monotonic along `Queued -> Processing -> {Sent, Failed}`.
/// `Read` is reachable only from `Sent` via an explicit mark-read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Processing,
    Sent,
    Failed,
    Read,
}

impl NotificationStatus {
    /// Whether this status is terminal for delivery purposes.
    /// `Read` is included: it is only reachable after `Sent`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Read
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationStatus::Queued => "queued",
            NotificationStatus::Processing => "processing",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Read => "read",
        };
        f.write_str(s)
    }
}

/// A single queued unit of delivery work for one channel.
///
/// Jobs are serializable so durable queue backends can persist them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    /// Unique job identifier, assigned at creation, immutable.
    pub id: Uuid,

    /// Owning tenant; scopes template resolution.
    pub tenant_id: String,

    /// Delivery channel.
    pub channel: Channel,

    /// Channel-dependent address: email address, phone number, URL,
    /// or internal user id.
    pub recipient: String,

    /// Optional subject, used by the email channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Body or template source text.
    pub message: String,

    /// Optional named template reference, resolved by adapters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Placeholder name -> value mapping for `{{key}}` substitution.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Queue priority.
    #[serde(default)]
    pub priority: Priority,

    /// Delivery attempts made so far. Starts at 0, incremented each time
    /// a worker leases the job. 1-based when reported externally.
    #[serde(default)]
    pub attempt: u32,
}

/// The persisted, externally queryable status of a submitted notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Shared with the job id.
    pub id: Uuid,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub channel: Channel,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub status: NotificationStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Inbound submit request, consumed from the API layer.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(rename = "type")]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl SubmitRequest {
    /// Returns the names of required fields that are missing or empty.
    /// An empty vector means the request is valid.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.channel.is_none() {
            missing.push("type");
        }
        if self.recipient.as_deref().map_or(true, str::is_empty) {
            missing.push("recipient");
        }
        if self.message.as_deref().map_or(true, str::is_empty) {
            missing.push("message");
        }
        missing
    }
}

/// Bulk submit request wrapper.
#[derive(Debug, Deserialize)]
pub struct BulkSubmitRequest {
    pub notifications: Vec<SubmitRequest>,
}

/// Response for a bulk submit: every created record, in request order.
#[derive(Debug, Serialize)]
pub struct BulkSubmitResponse {
    pub count: usize,
    pub notifications: Vec<NotificationRecord>,
}
