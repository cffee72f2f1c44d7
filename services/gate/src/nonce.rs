//! One-time challenge nonces.
//!
//! Each nonce is stored under `nonce:{account}:{token}` with the time it was
//! issued and an optional [`NonceScope`]. Redemption takes the record out of
//! the store atomically, so a nonce is gone after the first attempt whether
//! or not that attempt succeeds, and concurrent redemptions have exactly one
//! winner.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::Address;
use onlystars_core::{types::lowercase_address, NonceScope};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::storage::{KvError, KvStore, SetOptions};

/// Nonce key prefix, one key per issued nonce.
const NONCE_KEY_PREFIX: &str = "nonce";

/// Random bytes per nonce.
const NONCE_BYTES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error("nonce is unknown, expired or already used")]
    BadNonce,

    #[error("nonce was issued for a different scope")]
    ScopeMismatch,

    #[error("freshly generated nonce already exists")]
    Collision,

    #[error("failed to encode nonce record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("nonce storage unavailable: {0}")]
    Storage(#[from] KvError),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NonceRecord {
    /// Unix millis.
    issued_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<NonceScope>,
}

/// Issues and redeems nonces.
#[derive(Clone)]
pub struct NonceService {
    kv: KvStore,
    ttl: Duration,
}

impl NonceService {
    pub fn new(kv: KvStore, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Lifetime of issued nonces.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(account: &Address, token: &str) -> String {
        format!(
            "{NONCE_KEY_PREFIX}:{}:{token}",
            lowercase_address(account)
        )
    }

    /// Issues a fresh nonce for `account`, optionally bound to `scope`.
    pub async fn issue(
        &self,
        account: Address,
        scope: Option<NonceScope>,
    ) -> Result<String, NonceError> {
        let token = generate_token();
        let scoped = scope.is_some();
        let record = NonceRecord {
            issued_at: unix_millis(),
            scope,
        };

        let stored = self
            .kv
            .set(
                &Self::key(&account, &token),
                serde_json::to_string(&record)?,
                SetOptions {
                    ttl: Some(self.ttl),
                    only_if_absent: true,
                },
            )
            .await?;
        if !stored {
            return Err(NonceError::Collision);
        }

        tracing::debug!(%account, scoped, "issued nonce");
        Ok(token)
    }

    /// Redeems `nonce` for `account`.
    ///
    /// A scoped record only admits an `expected` scope matching every field it
    /// recorded; an unscoped record admits anything.
    pub async fn consume(
        &self,
        account: Address,
        nonce: &str,
        expected: Option<&NonceScope>,
    ) -> Result<(), NonceError> {
        // never issued by us, nothing to delete
        let Some(token) = normalize_token(nonce) else {
            return Err(NonceError::BadNonce);
        };

        let Some(raw) = self.kv.take(&Self::key(&account, &token)).await? else {
            return Err(NonceError::BadNonce);
        };

        let record: NonceRecord = serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(%account, error = %e, "unreadable nonce record");
            NonceError::BadNonce
        })?;

        match record.scope {
            Some(scope) if !scope.admits(expected) => Err(NonceError::ScopeMismatch),
            _ => Ok(()),
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn normalize_token(nonce: &str) -> Option<String> {
    let nonce = nonce.trim();
    (nonce.len() == NONCE_BYTES * 2 && nonce.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| nonce.to_ascii_lowercase())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
