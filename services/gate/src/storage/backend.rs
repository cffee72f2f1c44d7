//! Pluggable key-value backends.

use std::{
    future::{ready, Future},
    sync::LazyLock,
    time::{Duration, Instant},
};

use moka::{
    future::Cache,
    ops::compute::{CompResult, Op},
    Expiry,
};
use redis::{aio::ConnectionManager, Client, Script};

use super::error::KvError;

const CACHE_MAX_CAPACITY: u64 = 1_000_000;

/// `INCR`, then `PEXPIRE` when the counter was just created or has no expiry.
const INCREMENT_WITH_TTL_LUA: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

static INCREMENT_WITH_TTL: LazyLock<Script> = LazyLock::new(|| Script::new(INCREMENT_WITH_TTL_LUA));

/// Options for [`KvBackend::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expire the key after this long.
    pub ttl: Option<Duration>,
    /// Only write if the key does not exist yet.
    pub only_if_absent: bool,
}

/// Minimal key-value surface the gate needs.
pub trait KvBackend: Send + Sync + Clone + 'static {
    /// Read a value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, KvError>> + Send;

    /// Write a value. Returns `false` when `only_if_absent` was set and the key existed.
    fn set(
        &self,
        key: &str,
        value: String,
        opts: SetOptions,
    ) -> impl Future<Output = Result<bool, KvError>> + Send;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, KvError>> + Send;

    /// Atomically read and delete a key.
    fn take(&self, key: &str) -> impl Future<Output = Result<Option<String>, KvError>> + Send;

    /// Atomically increment an integer counter, creating it at 1 with `ttl`.
    ///
    /// A live counter keeps its expiry; one found without an expiry gets `ttl`.
    fn increment_with_ttl(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<i64, KvError>> + Send;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: String, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Evicts each entry at its own `expires_at`.
struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        created_at: Instant,
    ) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(updated_at))
    }
}

/// In-process backend on a moka cache with per-entry TTL.
///
/// Only suitable for a single gate replica.
#[derive(Clone)]
pub struct InMemoryKv {
    cache: Cache<String, StoredValue>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_MAX_CAPACITY)
            .expire_after(PerEntryExpiry)
            .build();
        Self { cache }
    }

    async fn live(&self, key: &str) -> Option<StoredValue> {
        self.cache
            .get(key)
            .await
            .filter(|v| v.is_live(Instant::now()))
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBackend for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.live(key).await.map(|v| v.value))
    }

    async fn set(&self, key: &str, value: String, opts: SetOptions) -> Result<bool, KvError> {
        let now = Instant::now();
        let stored = StoredValue::new(value, opts.ttl, now);

        if !opts.only_if_absent {
            self.cache.insert(key.to_string(), stored).await;
            return Ok(true);
        }

        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let occupied = current.is_some_and(|e| e.value().is_live(now));
                ready(if occupied { Op::Nop } else { Op::Put(stored) })
            })
            .await;

        Ok(matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        ))
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|v| v.is_live(Instant::now())))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, KvError> {
        // moka's remove hands the entry to exactly one caller
        Ok(self
            .cache
            .remove(key)
            .await
            .filter(|v| v.is_live(Instant::now()))
            .map(|v| v.value))
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let now = Instant::now();
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let next = match current.map(|e| e.into_value()).filter(|v| v.is_live(now)) {
                    Some(existing) => existing
                        .value
                        .parse::<i64>()
                        .ok()
                        .and_then(|n| n.checked_add(1))
                        .map(|n| StoredValue {
                            value: n.to_string(),
                            expires_at: existing.expires_at.or(Some(now + ttl)),
                        }),
                    None => Some(StoredValue::new("1".to_string(), Some(ttl), now)),
                };
                ready(next.map_or(Op::Nop, Op::Put))
            })
            .await;

        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => entry
                .into_value()
                .value
                .parse()
                .map_err(|_| KvError::NotAnInteger(key.to_string())),
            _ => Err(KvError::NotAnInteger(key.to_string())),
        }
    }
}

/// Redis backend for multi-replica deployments. Requires Redis 6.2+ for `GETDEL`.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn new(url: &str) -> Result<Self, KvError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Redis connection established");
        Ok(Self { conn })
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl KvBackend for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
    }

    async fn set(&self, key: &str, value: String, opts: SetOptions) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = opts.ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        if opts.only_if_absent {
            cmd.arg("NX");
        }
        // nil reply when NX refused the write
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        Ok(redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?)
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        Ok(INCREMENT_WITH_TTL
            .key(key)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?)
    }
}

/// Either backend, chosen at startup.
#[derive(Clone)]
pub enum DynKv {
    Redis(RedisKv),
    InMemory(InMemoryKv),
}

impl DynKv {
    /// Connects to Redis when a URL is given, falling back to memory if that fails.
    pub async fn new(redis_url: Option<&str>) -> Self {
        match redis_url {
            Some(url) => match RedisKv::new(url).await {
                Ok(backend) => Self::Redis(backend),
                Err(e) => {
                    tracing::error!("Failed to connect to Redis: {e}, falling back to in-memory");
                    Self::InMemory(InMemoryKv::new())
                }
            },
            None => {
                tracing::info!("No Redis URL provided, using in-memory storage");
                Self::InMemory(InMemoryKv::new())
            }
        }
    }
}

impl KvBackend for DynKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self {
            Self::Redis(b) => b.get(key).await,
            Self::InMemory(b) => b.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, opts: SetOptions) -> Result<bool, KvError> {
        match self {
            Self::Redis(b) => b.set(key, value, opts).await,
            Self::InMemory(b) => b.set(key, value, opts).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        match self {
            Self::Redis(b) => b.delete(key).await,
            Self::InMemory(b) => b.delete(key).await,
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>, KvError> {
        match self {
            Self::Redis(b) => b.take(key).await,
            Self::InMemory(b) => b.take(key).await,
        }
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        match self {
            Self::Redis(b) => b.increment_with_ttl(key, ttl).await,
            Self::InMemory(b) => b.increment_with_ttl(key, ttl).await,
        }
    }
}
