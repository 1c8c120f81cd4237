//! Per-channel job queues.
//!
//! Each of the four channels owns one independent, priority-ordered queue
//! behind the [`JobQueue`] trait. Dequeue grants an exclusive lease, which
//! is the system's only synchronization point; delivery is at-least-once.

pub mod backend;
pub mod factory;
pub mod memory_backend;
pub mod redis_backend;

pub use backend::{JobQueue, LeasedJob, QueueCounts, QueueError};
pub use factory::create_channel_queues;
pub use memory_backend::MemoryJobQueue;
pub use redis_backend::RedisJobQueue;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::notification::Channel;

/// The four channel queues, plus the read-only statistics rollup over them.
///
/// Channels run fully independently; this type only groups them for
/// routing and aggregation, it adds no cross-channel coordination.
#[derive(Clone)]
pub struct ChannelQueues {
    queues: HashMap<Channel, Arc<dyn JobQueue>>,
}

/// Aggregate counts across all channels.
///
/// The per-channel reads are independent and may observe different
/// instants under concurrent mutation; the totals are approximations,
/// not a transactionally consistent snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AggregateCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

impl ChannelQueues {
    /// Build from one backend per channel. Panics if a channel is missing;
    /// construction goes through [`create_channel_queues`] which always
    /// provides all four.
    pub fn new(queues: HashMap<Channel, Arc<dyn JobQueue>>) -> Self {
        for channel in Channel::ALL {
            assert!(queues.contains_key(&channel), "missing queue for channel {channel}");
        }
        Self { queues }
    }

    /// The queue owning jobs for `channel`.
    pub fn get(&self, channel: Channel) -> &Arc<dyn JobQueue> {
        // Invariant checked at construction.
        &self.queues[&channel]
    }

    /// Counts for a single channel.
    pub async fn counts(&self, channel: Channel) -> Result<QueueCounts, QueueError> {
        self.get(channel).counts().await
    }

    /// Sum waiting/active/completed/failed across all four channels.
    pub async fn aggregate(&self) -> Result<AggregateCounts, QueueError> {
        let mut totals = AggregateCounts::default();
        for channel in Channel::ALL {
            let counts = self.get(channel).counts().await?;
            totals.waiting += counts.waiting;
            totals.active += counts.active;
            totals.completed += counts.completed;
            totals.failed += counts.failed;
        }
        Ok(totals)
    }
}
