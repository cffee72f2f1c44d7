use std::{sync::Arc, time::Duration};

use alloy::primitives::Address;
use onlystars_core::{
    types::{AccessReason, CheckQuery, GateRequest, GateResponse, NonceRequest},
    AccessTarget, GateMessage, PostId,
};

use crate::{
    cache::DecisionCache,
    client::{GateApi, GateClientError},
    signer::{MessageSigner, SignerError},
};

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Served from the memo cache.
    Cache,
    /// The unauthenticated ledger read.
    Ledger,
    /// The signed proof flow.
    Proof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub source: DecisionSource,
    /// Gate reason code, or the failure that stopped the proof flow.
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum ProofFlowError {
    #[error(transparent)]
    Gate(#[from] GateClientError),
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Resolves access for the accounts of one signer.
pub struct AccessResolver<G, S> {
    gate: G,
    signer: S,
    cache: Arc<DecisionCache>,
    sign_timeout: Option<Duration>,
}

impl<G: GateApi, S: MessageSigner> AccessResolver<G, S> {
    /// Resolver with its own [`DecisionCache`] and no signing timeout.
    pub fn new(gate: G, signer: S) -> Self {
        Self {
            gate,
            signer,
            cache: Arc::new(DecisionCache::default()),
            sign_timeout: None,
        }
    }

    /// Shares `cache` with other resolvers.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<DecisionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Gives up on the signer after `timeout`.
    #[must_use]
    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    pub async fn check_post_access(&self, account: Address, post_id: PostId) -> AccessDecision {
        self.resolve(account, AccessTarget::Post(post_id)).await
    }

    pub async fn check_subscription_active(
        &self,
        account: Address,
        creator: Address,
    ) -> AccessDecision {
        self.resolve(account, AccessTarget::Subscription(creator))
            .await
    }

    /// Memo, then the cheap ledger read, then the signed proof.
    ///
    /// Never fails: errors along the proof flow become a denial whose
    /// `reason` describes them. Such denials, and denials caused by an
    /// unreachable ledger, are not memoized.
    pub async fn resolve(&self, account: Address, target: AccessTarget) -> AccessDecision {
        let key = target.cache_key(&account);
        if let Some(mut hit) = self.cache.get(&key) {
            hit.source = DecisionSource::Cache;
            return hit;
        }

        match self
            .gate
            .cheap_check(&CheckQuery::for_target(account, &target))
            .await
        {
            Ok(resp) if resp.answer(&target) == Some(true) => {
                let decision = AccessDecision {
                    allowed: true,
                    source: DecisionSource::Ledger,
                    reason: Some(AccessReason::from_ledger(&target, true).to_string()),
                };
                self.cache.insert(key, decision.clone());
                return decision;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%account, error = %e, "cheap check failed, falling back to proof");
            }
        }

        match self.prove(account, &target).await {
            Ok(resp) => {
                if let Some(failure) = resp.auth.signature_reason {
                    tracing::warn!(%account, %failure, "gate rejected the proof");
                }
                let decision = AccessDecision {
                    allowed: resp.allowed,
                    source: DecisionSource::Proof,
                    reason: Some(resp.reason.to_string()),
                };
                if resp.reason != AccessReason::LedgerUnavailable {
                    self.cache.insert(key, decision.clone());
                }
                decision
            }
            Err(e) => {
                tracing::info!(%account, error = %e, "proof flow failed, denying");
                AccessDecision {
                    allowed: false,
                    source: DecisionSource::Proof,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    async fn prove(
        &self,
        account: Address,
        target: &AccessTarget,
    ) -> Result<GateResponse, ProofFlowError> {
        if !self.signer.accounts().await?.contains(&account) {
            return Err(SignerError::UnknownAccount(account).into());
        }

        let mode = target.mode();
        let (post_id, creator_address) = match *target {
            AccessTarget::Post(post_id) => (Some(post_id), None),
            AccessTarget::Subscription(creator) => (None, Some(creator)),
        };

        let nonce = self
            .gate
            .request_nonce(&NonceRequest {
                account,
                mode: Some(mode),
                post_id,
                creator_address,
            })
            .await?
            .nonce;

        let message = GateMessage {
            mode,
            account,
            nonce: &nonce,
            post_id: post_id.as_ref(),
            creator: creator_address,
        }
        .build();

        let signing = self.signer.sign_message(account, &message);
        let signature = match self.sign_timeout {
            Some(timeout) => tokio::time::timeout(timeout, signing)
                .await
                .map_err(|_| SignerError::Timeout)??,
            None => signing.await?,
        };

        let resp = self
            .gate
            .submit_proof(&GateRequest {
                mode,
                account,
                post_id,
                creator_address,
                nonce: Some(nonce),
                signature: Some(signature),
                message: Some(message),
            })
            .await?;
        Ok(resp)
    }
}
