//! Fixed-window request limits keyed by operation, client IP and account.

use std::{net::IpAddr, time::Duration};

use alloy::primitives::Address;
use onlystars_core::types::lowercase_address;

use crate::storage::KvStore;

const RATE_LIMIT_KEY_PREFIX: &str = "ratelimit";

/// Counts requests per window in the KV store.
///
/// The window starts with the first request: the counter is created together
/// with its expiry in one atomic step. When the store is unreachable requests
/// are let through.
#[derive(Clone)]
pub struct RateLimiter {
    kv: KvStore,
    window: Duration,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(kv: KvStore, window: Duration, max_requests: u64) -> Self {
        Self {
            kv,
            window,
            max_requests,
        }
    }

    fn key(operation: &str, ip: IpAddr, account: &Address) -> String {
        format!(
            "{RATE_LIMIT_KEY_PREFIX}:{operation}:{ip}:{}",
            lowercase_address(account)
        )
    }

    /// Records a request and returns whether it is within the limit.
    pub async fn check(&self, operation: &str, ip: IpAddr, account: &Address) -> bool {
        let key = Self::key(operation, ip, account);

        let count = match self.kv.increment_with_ttl(&key, self.window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(operation, %ip, error = %e, "rate limiter unavailable, allowing request");
                return true;
            }
        };

        let allowed = u64::try_from(count).is_ok_and(|c| c <= self.max_requests);
        if !allowed {
            tracing::debug!(operation, %ip, %account, count, "rate limit exceeded");
        }
        allowed
    }
}
