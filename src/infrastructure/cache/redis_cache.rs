use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::cache::{Cache, CacheError, CacheHealth};
use crate::application::ports::job_queue::{JobQueue, JobQueueError, ReservedJob};

/// Cache and job broker over a shared Redis connection manager.
///
/// Queue layout per queue name `q`:
///   `{q}:ready`      list of job ids ready for delivery
///   `{q}:delayed`    zset of job ids scored by their ready time
///   `{q}:processing` zset of job ids scored by their lease deadline
///   `{q}:jobs`       hash of job id -> serialized record
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    payload: String,
    attempts: u32,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Move due delayed jobs onto the ready list.
    async fn promote_due(&self, queue: &str) -> Result<(), JobQueueError> {
        let mut conn = self.conn();
        let now_ms = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore(format!("{}:delayed", queue), i64::MIN, now_ms)
            .await
            .map_err(to_queue_error)?;

        for job_id in due {
            let removed: i64 = conn
                .zrem(format!("{}:delayed", queue), &job_id)
                .await
                .map_err(to_queue_error)?;
            // Another instance may have promoted it first.
            if removed > 0 {
                let _: i64 = conn
                    .rpush(format!("{}:ready", queue), &job_id)
                    .await
                    .map_err(to_queue_error)?;
            }
        }
        Ok(())
    }
}

fn to_queue_error(error: redis::RedisError) -> JobQueueError {
    JobQueueError::Unavailable(error.to_string())
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn();
        conn.get(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn();
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let pattern = format!("{}*", prefix);

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if !keys.is_empty() {
            let _: i64 = conn
                .del(keys)
                .await
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.conn();
        let millis: i64 = conn
            .pttl(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        if millis < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(millis as u64)))
    }

    async fn health(&self) -> CacheHealth {
        let mut conn = self.conn();
        let started = Instant::now();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        CacheHealth {
            ok: pong.is_ok(),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl JobQueue for RedisCache {
    async fn enqueue(
        &self,
        queue: &str,
        payload: &[u8],
        eta: Option<DateTime<Utc>>,
    ) -> Result<String, JobQueueError> {
        let mut conn = self.conn();
        let job_id = Uuid::new_v4().to_string();
        let record = JobRecord {
            payload: BASE64.encode(payload),
            attempts: 0,
        };
        let serialized =
            serde_json::to_string(&record).map_err(|e| JobQueueError::SerializationError(e.to_string()))?;

        let _: i64 = conn
            .hset(format!("{}:jobs", queue), &job_id, serialized)
            .await
            .map_err(to_queue_error)?;

        match eta {
            Some(eta) if eta > Utc::now() => {
                let _: i64 = conn
                    .zadd(format!("{}:delayed", queue), &job_id, eta.timestamp_millis())
                    .await
                    .map_err(to_queue_error)?;
            }
            _ => {
                let _: i64 = conn
                    .rpush(format!("{}:ready", queue), &job_id)
                    .await
                    .map_err(to_queue_error)?;
            }
        }

        Ok(job_id)
    }

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReservedJob>, JobQueueError> {
        self.promote_due(queue).await?;

        let mut conn = self.conn();
        let job_id: Option<String> = conn
            .lpop(format!("{}:ready", queue), None)
            .await
            .map_err(to_queue_error)?;
        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let deadline =
            Utc::now().timestamp_millis() + visibility_timeout.as_millis() as i64;
        let _: i64 = conn
            .zadd(format!("{}:processing", queue), &job_id, deadline)
            .await
            .map_err(to_queue_error)?;

        let raw: Option<String> = conn
            .hget(format!("{}:jobs", queue), &job_id)
            .await
            .map_err(to_queue_error)?;
        let Some(raw) = raw else {
            // Record vanished (acked elsewhere); drop the stray id.
            let _: i64 = conn
                .zrem(format!("{}:processing", queue), &job_id)
                .await
                .map_err(to_queue_error)?;
            return Ok(None);
        };

        let record: JobRecord = serde_json::from_str(&raw)
            .map_err(|e| JobQueueError::SerializationError(e.to_string()))?;
        let payload = BASE64
            .decode(&record.payload)
            .map_err(|e| JobQueueError::SerializationError(e.to_string()))?;

        Ok(Some(ReservedJob {
            job_id,
            payload,
            attempts: record.attempts,
        }))
    }

    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), JobQueueError> {
        let mut conn = self.conn();
        let _: i64 = conn
            .zrem(format!("{}:processing", queue), job_id)
            .await
            .map_err(to_queue_error)?;
        let _: i64 = conn
            .hdel(format!("{}:jobs", queue), job_id)
            .await
            .map_err(to_queue_error)?;
        Ok(())
    }

    async fn nack(
        &self,
        queue: &str,
        job_id: &str,
        reason: &str,
        retry_after: Duration,
    ) -> Result<(), JobQueueError> {
        let mut conn = self.conn();

        let raw: Option<String> = conn
            .hget(format!("{}:jobs", queue), job_id)
            .await
            .map_err(to_queue_error)?;
        let Some(raw) = raw else {
            return Err(JobQueueError::UnknownJob(job_id.to_string()));
        };

        let mut record: JobRecord = serde_json::from_str(&raw)
            .map_err(|e| JobQueueError::SerializationError(e.to_string()))?;
        record.attempts += 1;

        tracing::info!(
            job_id = %job_id,
            attempts = record.attempts,
            reason = %reason,
            retry_after_s = retry_after.as_secs(),
            "Job nacked; rescheduling"
        );

        let serialized = serde_json::to_string(&record)
            .map_err(|e| JobQueueError::SerializationError(e.to_string()))?;
        let _: i64 = conn
            .hset(format!("{}:jobs", queue), job_id, serialized)
            .await
            .map_err(to_queue_error)?;

        let _: i64 = conn
            .zrem(format!("{}:processing", queue), job_id)
            .await
            .map_err(to_queue_error)?;
        let ready_at = Utc::now().timestamp_millis() + retry_after.as_millis() as i64;
        let _: i64 = conn
            .zadd(format!("{}:delayed", queue), job_id, ready_at)
            .await
            .map_err(to_queue_error)?;

        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize, JobQueueError> {
        let mut conn = self.conn();
        let ready: i64 = conn
            .llen(format!("{}:ready", queue))
            .await
            .map_err(to_queue_error)?;
        let delayed: i64 = conn
            .zcard(format!("{}:delayed", queue))
            .await
            .map_err(to_queue_error)?;
        Ok((ready + delayed) as usize)
    }

    async fn requeue_expired(&self, queue: &str) -> Result<usize, JobQueueError> {
        let mut conn = self.conn();
        let now_ms = Utc::now().timestamp_millis();

        let expired: Vec<String> = conn
            .zrangebyscore(format!("{}:processing", queue), i64::MIN, now_ms)
            .await
            .map_err(to_queue_error)?;

        let mut requeued = 0;
        for job_id in expired {
            let removed: i64 = conn
                .zrem(format!("{}:processing", queue), &job_id)
                .await
                .map_err(to_queue_error)?;
            if removed > 0 {
                let _: i64 = conn
                    .rpush(format!("{}:ready", queue), &job_id)
                    .await
                    .map_err(to_queue_error)?;
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}
