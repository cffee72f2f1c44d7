//! Reads of subscription and post-access facts from the creator hub.

use std::{future::IntoFuture, time::Duration};

use alloy::{primitives::Address, providers::DynProvider};
use async_trait::async_trait;
use onlystars_core::{creator_hub::ICreatorHub::ICreatorHubInstance, AccessTarget, PostId};
use tokio::time::Instant;

use crate::metrics::record_ledger_call;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("creator hub call failed: {0}")]
    Call(#[from] alloy::contract::Error),

    #[error("creator hub call timed out after {0:?}")]
    Timeout(Duration),
}

/// Authoritative source of access facts.
#[async_trait]
pub trait CreatorLedger: Send + Sync {
    /// `isSubscriptionActive(user, creator)`.
    async fn is_subscription_active(
        &self,
        user: Address,
        creator: Address,
    ) -> Result<bool, LedgerError>;

    /// `hasPostAccess(user, postId)`.
    async fn has_post_access(&self, user: Address, post_id: PostId) -> Result<bool, LedgerError>;

    /// Answers the question `target` asks about `user`.
    async fn check(&self, user: Address, target: &AccessTarget) -> Result<bool, LedgerError> {
        match *target {
            AccessTarget::Post(post_id) => self.has_post_access(user, post_id).await,
            AccessTarget::Subscription(creator) => {
                self.is_subscription_active(user, creator).await
            }
        }
    }
}

/// [`CreatorLedger`] backed by `eth_call`s against the deployed creator hub.
pub struct OnchainLedger {
    hub: ICreatorHubInstance<DynProvider>,
    timeout: Duration,
}

impl OnchainLedger {
    pub fn new(hub_address: Address, provider: DynProvider, timeout: Duration) -> Self {
        Self {
            hub: ICreatorHubInstance::new(hub_address, provider),
            timeout,
        }
    }

    /// Runs one `eth_call` under the timeout and records its latency.
    async fn timed_call<F>(&self, name: &'static str, call: F) -> Result<bool, LedgerError>
    where
        F: IntoFuture<Output = Result<bool, alloy::contract::Error>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| LedgerError::Timeout(self.timeout))
            .and_then(|res| res.map_err(LedgerError::from));
        record_ledger_call(name, started.elapsed(), result.is_ok());
        result
    }
}

#[async_trait]
impl CreatorLedger for OnchainLedger {
    async fn is_subscription_active(
        &self,
        user: Address,
        creator: Address,
    ) -> Result<bool, LedgerError> {
        let call = self.hub.isSubscriptionActive(user, creator);
        self.timed_call("isSubscriptionActive", call.call()).await
    }

    async fn has_post_access(&self, user: Address, post_id: PostId) -> Result<bool, LedgerError> {
        let call = self.hub.hasPostAccess(user, post_id.as_u256());
        self.timed_call("hasPostAccess", call.call()).await
    }
}
