//! Queue backend factory

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::config::QueueSettings;
use crate::notification::Channel;

use super::backend::JobQueue;
use super::memory_backend::MemoryJobQueue;
use super::redis_backend::RedisJobQueue;
use super::ChannelQueues;

/// Create one queue per channel based on configuration.
///
/// - `"redis"`: durable sorted-set queues; requires a connection manager.
///   Connectivity failure here is fatal at startup, the service must not
///   accept submissions it cannot store.
/// - `"memory"` (default): in-process queues for tests and development.
pub fn create_channel_queues(
    settings: &QueueSettings,
    redis_conn: Option<ConnectionManager>,
) -> ChannelQueues {
    let lease_timeout = Duration::from_secs(settings.lease_timeout_seconds);
    let mut queues: HashMap<Channel, Arc<dyn JobQueue>> = HashMap::new();

    match (settings.backend.as_str(), redis_conn) {
        ("redis", Some(conn)) => {
            tracing::info!(backend = "redis", prefix = %settings.redis_prefix, "Creating Redis channel queues");
            for channel in Channel::ALL {
                let prefix = format!("{}:{}", settings.redis_prefix, channel);
                queues.insert(
                    channel,
                    Arc::new(RedisJobQueue::new(conn.clone(), prefix, lease_timeout)),
                );
            }
        }
        ("redis", None) => {
            tracing::warn!("Redis backend requested but no connection provided, falling back to memory");
            for channel in Channel::ALL {
                queues.insert(channel, Arc::new(MemoryJobQueue::new(lease_timeout)));
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory channel queues");
            for channel in Channel::ALL {
                queues.insert(channel, Arc::new(MemoryJobQueue::new(lease_timeout)));
            }
        }
    }

    ChannelQueues::new(queues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_by_default() {
        let settings = QueueSettings::default();
        // Smoke test: all four channels present, no panic on access.
        let queues = create_channel_queues(&settings, None);
        for channel in Channel::ALL {
            let _ = queues.get(channel);
        }
    }

    #[test]
    fn test_redis_without_connection_falls_back() {
        let settings = QueueSettings {
            backend: "redis".to_string(),
            ..QueueSettings::default()
        };
        let queues = create_channel_queues(&settings, None);
        let _ = queues.get(Channel::Email);
    }
}
