//! Key-value storage with pluggable backend and a per-call timeout.

pub mod backend;
pub mod error;

pub use backend::{DynKv, InMemoryKv, KvBackend, RedisKv, SetOptions};
pub use error::KvError;

use std::{future::Future, time::Duration};

/// The gate's handle on its key-value store.
///
/// Every call is bounded by `timeout` and reported as [`KvError::Timeout`] when it expires.
#[derive(Clone)]
pub struct KvStore {
    backend: DynKv,
    timeout: Duration,
}

impl KvStore {
    /// Redis when `redis_url` is set and reachable, in-memory otherwise.
    pub async fn connect(redis_url: Option<&str>, timeout: Duration) -> Self {
        Self {
            backend: DynKv::new(redis_url).await,
            timeout,
        }
    }

    /// In-memory store, for single-replica setups and tests.
    pub fn in_memory(timeout: Duration) -> Self {
        Self {
            backend: DynKv::InMemory(InMemoryKv::new()),
            timeout,
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, KvError>>,
    ) -> Result<T, KvError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| KvError::Timeout(self.timeout))?
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.bounded(self.backend.get(key)).await
    }

    pub async fn set(&self, key: &str, value: String, opts: SetOptions) -> Result<bool, KvError> {
        self.bounded(self.backend.set(key, value, opts)).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, KvError> {
        self.bounded(self.backend.delete(key)).await
    }

    pub async fn take(&self, key: &str) -> Result<Option<String>, KvError> {
        self.bounded(self.backend.take(key)).await
    }

    pub async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        self.bounded(self.backend.increment_with_ttl(key, ttl)).await
    }
}
