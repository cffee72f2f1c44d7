//! Errors from the key-value store.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("value under `{0}` is not an integer or would overflow")]
    NotAnInteger(String),

    #[error("kv operation timed out after {0:?}")]
    Timeout(Duration),
}
