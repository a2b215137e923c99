//! Terminal result storage.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use seqgen_models::{JobId, SequenceResult};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::QueueResult;

/// Keyed storage for finished job results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace the result for its job.
    async fn put(&self, result: &SequenceResult) -> QueueResult<()>;

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<SequenceResult>>;

    /// Returns true if an entry was removed.
    async fn delete(&self, job_id: &JobId) -> QueueResult<bool>;

    /// Number of stored results.
    async fn len(&self) -> QueueResult<usize>;

    /// Backend connectivity check.
    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

/// Process-local store. Entries are never evicted.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<JobId, SequenceResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, result: &SequenceResult) -> QueueResult<()> {
        self.results
            .write()
            .await
            .insert(result.sequence_id.clone(), result.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<SequenceResult>> {
        Ok(self.results.read().await.get(job_id).cloned())
    }

    async fn delete(&self, job_id: &JobId) -> QueueResult<bool> {
        Ok(self.results.write().await.remove(job_id).is_some())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.results.read().await.len())
    }
}

/// Redis-backed store, shared across API instances.
pub struct RedisResultStore {
    client: redis::Client,
    key_prefix: String,
    ttl: Option<Duration>,
}

impl RedisResultStore {
    pub fn new(redis_url: &str, key_prefix: impl Into<String>, ttl: Option<Duration>) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            ttl,
        })
    }

    /// Redis key for a job result.
    pub fn key(&self, job_id: &JobId) -> String {
        format!("{}:result:{}", self.key_prefix, job_id)
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, result: &SequenceResult) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = self.key(&result.sequence_id);
        let payload = serde_json::to_string(result)?;

        match self.ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, payload, ttl.as_secs().max(1)).await?,
            None => conn.set::<_, _, ()>(&key, payload).await?,
        }

        debug!("Stored result under {}", key);
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<SequenceResult>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.key(job_id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(self.key(job_id)).await?;
        Ok(removed > 0)
    }

    async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:result:*", self.key_prefix);
        let mut cursor: u64 = 0;
        let mut count = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            count += keys.len();
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(count)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
