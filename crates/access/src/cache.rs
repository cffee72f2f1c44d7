use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::resolver::AccessDecision;

/// How long a decision is served from memory.
pub const DECISION_TTL: Duration = Duration::from_secs(120);

/// In-memory memo of access decisions, keyed by [`AccessTarget::cache_key`].
///
/// Owned by (or shared between) resolvers; nothing is persisted.
///
/// [`AccessTarget::cache_key`]: onlystars_core::AccessTarget::cache_key
#[derive(Debug)]
pub struct DecisionCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (AccessDecision, Instant)>>,
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DECISION_TTL)
    }
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The decision stored under `key`, unless it has expired.
    pub fn get(&self, key: &str) -> Option<AccessDecision> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((decision, expires_at)) if Instant::now() < *expires_at => Some(decision.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `decision` under `key` and drops every expired entry.
    pub fn insert(&self, key: String, decision: AccessDecision) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key, (decision, now + self.ttl));
    }

    /// Number of stored entries, expired ones included until the next insert.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DecisionSource;

    fn decision(allowed: bool) -> AccessDecision {
        AccessDecision {
            allowed,
            source: DecisionSource::Ledger,
            reason: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = DecisionCache::default();
        cache.insert("post:0xabc:1".into(), decision(true));

        tokio::time::advance(Duration::from_secs(119)).await;
        assert_eq!(cache.get("post:0xabc:1"), Some(decision(true)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("post:0xabc:1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_sweeps_expired_entries() {
        let cache = DecisionCache::new(Duration::from_secs(1));
        for post in 0..10_000 {
            cache.insert(format!("post:0xabc:{post}"), decision(false));
        }
        assert_eq!(cache.len(), 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache.insert("post:0xabc:fresh".into(), decision(true));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("post:0xabc:fresh"), Some(decision(true)));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = DecisionCache::new(Duration::from_secs(60));
        cache.insert("a".into(), decision(true));
        cache.insert("b".into(), decision(false));

        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(decision(false)));

        cache.clear();
        assert_eq!(cache.get("b"), None);
        assert!(cache.is_empty());
    }
}
