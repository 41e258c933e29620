use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::cache::{Cache, CacheError, CacheHealth};
use crate::application::ports::job_queue::{JobQueue, JobQueueError, ReservedJob};

/// Process-local cache and broker with the same semantics as the Redis
/// implementation. Backs unit tests and single-process deployments; state
/// does not survive a restart.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    queues: Mutex<HashMap<String, QueueState>>,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<String>,
    delayed: Vec<(DateTime<Utc>, String)>,
    processing: HashMap<String, DateTime<Utc>>,
    jobs: HashMap<String, JobState>,
}

struct JobState {
    payload: Vec<u8>,
    attempts: u32,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn promote_due(state: &mut QueueState) {
        let now = Utc::now();
        let mut remaining = Vec::new();
        for (ready_at, job_id) in state.delayed.drain(..) {
            if ready_at <= now {
                state.ready.push_back(job_id);
            } else {
                remaining.push((ready_at, job_id));
            }
        }
        state.delayed = remaining;
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock().expect("memory cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("memory cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("memory cache poisoned");
        entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("memory cache poisoned");
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let entries = self.entries.lock().expect("memory cache poisoned");
        Ok(entries.get(key).and_then(|entry| {
            entry.expires_at.checked_duration_since(Instant::now())
        }))
    }

    async fn health(&self) -> CacheHealth {
        CacheHealth {
            ok: true,
            latency_ms: 0,
        }
    }
}

#[async_trait]
impl JobQueue for MemoryCache {
    async fn enqueue(
        &self,
        queue: &str,
        payload: &[u8],
        eta: Option<DateTime<Utc>>,
    ) -> Result<String, JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        let job_id = Uuid::new_v4().to_string();
        state.jobs.insert(
            job_id.clone(),
            JobState {
                payload: payload.to_vec(),
                attempts: 0,
            },
        );

        match eta {
            Some(eta) if eta > Utc::now() => state.delayed.push((eta, job_id.clone())),
            _ => state.ready.push_back(job_id.clone()),
        }

        Ok(job_id)
    }

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReservedJob>, JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        Self::promote_due(state);

        let Some(job_id) = state.ready.pop_front() else {
            return Ok(None);
        };

        let deadline = Utc::now()
            + chrono::Duration::from_std(visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
        state.processing.insert(job_id.clone(), deadline);

        let Some(job) = state.jobs.get(&job_id) else {
            state.processing.remove(&job_id);
            return Ok(None);
        };

        Ok(Some(ReservedJob {
            job_id,
            payload: job.payload.clone(),
            attempts: job.attempts,
        }))
    }

    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();
        state.processing.remove(job_id);
        state.jobs.remove(job_id);
        Ok(())
    }

    async fn nack(
        &self,
        queue: &str,
        job_id: &str,
        _reason: &str,
        retry_after: Duration,
    ) -> Result<(), JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        let Some(job) = state.jobs.get_mut(job_id) else {
            return Err(JobQueueError::UnknownJob(job_id.to_string()));
        };
        job.attempts += 1;

        state.processing.remove(job_id);
        let ready_at = Utc::now()
            + chrono::Duration::from_std(retry_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));
        state.delayed.push((ready_at, job_id.to_string()));
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize, JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();
        Ok(state.ready.len() + state.delayed.len())
    }

    async fn requeue_expired(&self, queue: &str) -> Result<usize, JobQueueError> {
        let mut queues = self.queues.lock().expect("memory queue poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        let now = Utc::now();
        let expired: Vec<String> = state
            .processing
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in &expired {
            state.processing.remove(job_id);
            state.ready.push_back(job_id.clone());
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new();
        cache
            .set("search:a", b"1", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("search:b", b"2", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("facets:all", b"3", Duration::from_secs(60))
            .await
            .unwrap();

        cache.delete_prefix("search:").await.unwrap();
        assert_eq!(cache.get("search:a").await.unwrap(), None);
        assert_eq!(cache.get("search:b").await.unwrap(), None);
        assert_eq!(cache.get("facets:all").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_queue_reserve_ack_cycle() {
        let queue = MemoryCache::new();
        let id = queue.enqueue("q", b"job-1", None).await.unwrap();

        let reserved = queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reserved.job_id, id);
        assert_eq!(reserved.payload, b"job-1");
        assert_eq!(reserved.attempts, 0);

        // Reserved jobs are invisible to other consumers.
        assert!(queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .is_none());

        queue.ack("q", &id).await.unwrap();
        assert_eq!(queue.depth("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nack_increments_attempts_and_delays() {
        let queue = MemoryCache::new();
        let id = queue.enqueue("q", b"job", None).await.unwrap();

        let job = queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();
        queue
            .nack("q", &job.job_id, "transient", Duration::from_millis(0))
            .await
            .unwrap();

        let retried = queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retried.job_id, id);
        assert_eq!(retried.attempts, 1);
    }

    #[tokio::test]
    async fn test_expired_lease_returns_to_ready() {
        let queue = MemoryCache::new();
        queue.enqueue("q", b"job", None).await.unwrap();

        let _job = queue
            .reserve("q", Duration::from_millis(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.requeue_expired("q").await.unwrap(), 1);

        assert!(queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_eta_delays_delivery() {
        let queue = MemoryCache::new();
        queue
            .enqueue("q", b"later", Some(Utc::now() + chrono::Duration::seconds(30)))
            .await
            .unwrap();

        assert!(queue
            .reserve("q", Duration::from_secs(300))
            .await
            .unwrap()
            .is_none());
        assert_eq!(queue.depth("q").await.unwrap(), 1);
    }
}
