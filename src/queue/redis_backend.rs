//! Redis-based job queue backend using sorted sets.
//!
//! This backend persists the backlog in Redis so jobs survive a process
//! restart. Layout, per channel (all keys share one prefix):
//!
//! - `{prefix}:ready` - ZSET ordered by `(10 - priority_weight) * 1e13 + seq`,
//!   so `ZPOPMIN` yields priority descending, FIFO within a tier.
//! - `{prefix}:delayed` - ZSET scored by eligibility time (epoch millis).
//! - `{prefix}:leased` - HASH of lease id -> stored member.
//! - `{prefix}:deadlines` - ZSET of lease id -> lease deadline (epoch millis).
//! - `{prefix}:seq` - monotonic enqueue sequence counter.
//! - `{prefix}:completed`, `{prefix}:failed` - terminal outcome counters.
//!
//! Members are stored as `<weight>|<job json>` so the lease script can
//! recompute ready-set scores without parsing JSON. All state transitions
//! (promote delayed, reclaim expired leases, pop, ack, nack) run as Lua
//! scripts, which Redis executes atomically.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use crate::notification::NotificationJob;

use super::backend::{JobQueue, LeasedJob, QueueCounts, QueueError};

/// Promote due delayed jobs and expired leases into the ready set, then
/// pop the best ready member and lease it.
///
/// KEYS: ready, delayed, leased, deadlines, seq
/// ARGV: now_ms, lease_deadline_ms, lease_id
const LEASE_SCRIPT: &str = r#"
local function ready_score(member)
    local weight = tonumber(string.match(member, '^(%d+)|'))
    local seq = redis.call('INCR', KEYS[5])
    return (10 - weight) * 1e13 + seq
end

-- Delayed jobs whose eligibility time has passed re-enter the ordering.
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, member in ipairs(due) do
    redis.call('ZADD', KEYS[1], ready_score(member), member)
    redis.call('ZREM', KEYS[2], member)
end

-- Leases past their deadline are reclaimed.
local expired = redis.call('ZRANGEBYSCORE', KEYS[4], '-inf', ARGV[1])
for _, lease_id in ipairs(expired) do
    local member = redis.call('HGET', KEYS[3], lease_id)
    if member then
        redis.call('ZADD', KEYS[1], ready_score(member), member)
        redis.call('HDEL', KEYS[3], lease_id)
    end
    redis.call('ZREM', KEYS[4], lease_id)
end

local popped = redis.call('ZPOPMIN', KEYS[1], 1)
if #popped == 0 then
    return false
end
redis.call('HSET', KEYS[3], ARGV[3], popped[1])
redis.call('ZADD', KEYS[4], ARGV[2], ARGV[3])
return popped[1]
"#;

/// Remove a lease and bump a terminal counter.
///
/// KEYS: leased, deadlines, counter
/// ARGV: lease_id
const SETTLE_SCRIPT: &str = r#"
local member = redis.call('HGET', KEYS[1], ARGV[1])
if not member then
    return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('INCR', KEYS[3])
return 1
"#;

/// Move a leased job to the delayed set.
///
/// KEYS: leased, deadlines, delayed
/// ARGV: lease_id, eligible_at_ms, member
const NACK_SCRIPT: &str = r#"
local member = redis.call('HGET', KEYS[1], ARGV[1])
if not member then
    return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('ZADD', KEYS[3], ARGV[2], ARGV[3])
return 1
"#;

/// Redis-backed job queue for one channel.
pub struct RedisJobQueue {
    conn: ConnectionManager,
    prefix: String,
    lease_timeout: Duration,
    lease_script: Script,
    settle_script: Script,
    nack_script: Script,
}

impl RedisJobQueue {
    /// Create a queue rooted at `{prefix}` (for example
    /// `courier:queue:email`).
    pub fn new(conn: ConnectionManager, prefix: String, lease_timeout: Duration) -> Self {
        Self {
            conn,
            prefix,
            lease_timeout,
            lease_script: Script::new(LEASE_SCRIPT),
            settle_script: Script::new(SETTLE_SCRIPT),
            nack_script: Script::new(NACK_SCRIPT),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    fn encode_member(job: &NotificationJob) -> Result<String, QueueError> {
        Ok(format!("{}|{}", job.priority.as_weight(), serde_json::to_string(job)?))
    }

    fn decode_member(member: &str) -> Result<NotificationJob, QueueError> {
        let json = member
            .split_once('|')
            .map(|(_, rest)| rest)
            .unwrap_or(member);
        Ok(serde_json::from_str(json)?)
    }

    fn ready_score(weight: u8, seq: u64) -> f64 {
        (10 - weight) as f64 * 1e13 + seq as f64
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let seq: u64 = conn.incr(self.key("seq"), 1u64).await?;
        let member = Self::encode_member(&job)?;
        let score = Self::ready_score(job.priority.as_weight(), seq);
        let _: () = conn.zadd(self.key("ready"), member, score).await?;
        tracing::debug!(job_id = %job.id, channel = %job.channel, "Job enqueued to Redis");
        Ok(())
    }

    async fn enqueue_bulk(&self, jobs: Vec<NotificationJob>) -> Result<(), QueueError> {
        if jobs.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();

        // Reserve a contiguous sequence range, then insert all members
        // with a single ZADD so the batch lands atomically.
        let end: u64 = conn.incr(self.key("seq"), jobs.len() as u64).await?;
        let start = end - jobs.len() as u64 + 1;

        let mut items: Vec<(f64, String)> = Vec::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            let score = Self::ready_score(job.priority.as_weight(), start + i as u64);
            items.push((score, Self::encode_member(job)?));
        }
        let _: () = conn.zadd_multiple(self.key("ready"), &items).await?;
        tracing::debug!(count = items.len(), "Bulk jobs enqueued to Redis");
        Ok(())
    }

    async fn lease(&self) -> Result<Option<LeasedJob>, QueueError> {
        let mut conn = self.conn.clone();
        let now_ms = Utc::now().timestamp_millis();
        let deadline_ms = now_ms + self.lease_timeout.as_millis() as i64;
        let lease_id = Uuid::new_v4();

        let member: Option<String> = self
            .lease_script
            .key(self.key("ready"))
            .key(self.key("delayed"))
            .key(self.key("leased"))
            .key(self.key("deadlines"))
            .key(self.key("seq"))
            .arg(now_ms)
            .arg(deadline_ms)
            .arg(lease_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        let Some(member) = member else {
            return Ok(None);
        };

        let mut job = Self::decode_member(&member)?;
        job.attempt += 1;

        // Persist the incremented attempt so a reclaim after a crash keeps
        // counting. If this write is lost the attempt is repeated, which
        // at-least-once delivery already permits.
        let updated = Self::encode_member(&job)?;
        let _: () = conn
            .hset(self.key("leased"), lease_id.to_string(), updated)
            .await?;

        Ok(Some(LeasedJob { lease_id, job }))
    }

    async fn ack(&self, lease_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let settled: i64 = self
            .settle_script
            .key(self.key("leased"))
            .key(self.key("deadlines"))
            .key(self.key("completed"))
            .arg(lease_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        if settled == 0 {
            return Err(QueueError::UnknownLease(lease_id));
        }
        Ok(())
    }

    async fn fail(&self, lease_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let settled: i64 = self
            .settle_script
            .key(self.key("leased"))
            .key(self.key("deadlines"))
            .key(self.key("failed"))
            .arg(lease_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        if settled == 0 {
            return Err(QueueError::UnknownLease(lease_id));
        }
        Ok(())
    }

    async fn nack_with_delay(&self, lease_id: Uuid, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let eligible_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        // The member is re-read inside the script; the third ARGV is only
        // used for the delayed insert so the script stays read-free of JSON.
        let member: Option<String> = conn.hget(self.key("leased"), lease_id.to_string()).await?;
        let Some(member) = member else {
            return Err(QueueError::UnknownLease(lease_id));
        };

        let moved: i64 = self
            .nack_script
            .key(self.key("leased"))
            .key(self.key("deadlines"))
            .key(self.key("delayed"))
            .arg(lease_id.to_string())
            .arg(eligible_at)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;
        if moved == 0 {
            return Err(QueueError::UnknownLease(lease_id));
        }
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let mut conn = self.conn.clone();
        let ready: u64 = conn.zcard(self.key("ready")).await?;
        let delayed: u64 = conn.zcard(self.key("delayed")).await?;
        let active: u64 = conn.hlen(self.key("leased")).await?;
        let completed: Option<u64> = conn.get(self.key("completed")).await?;
        let failed: Option<u64> = conn.get(self.key("failed")).await?;

        Ok(QueueCounts {
            waiting: ready + delayed,
            active,
            completed: completed.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }
}
