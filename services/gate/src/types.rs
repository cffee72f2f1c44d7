use std::sync::Arc;

use crate::{ledger::CreatorLedger, nonce::NonceService, rate_limit::RateLimiter, verifier::ProofVerifier};

/// Operation name for nonce issuance in rate-limit keys.
pub(crate) const NONCE_OPERATION: &str = "nonce";

/// Shared application state for gate handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) nonces: NonceService,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) verifier: ProofVerifier,
    pub(crate) ledger: Arc<dyn CreatorLedger>,
    /// Whether `X-Forwarded-For` / `X-Real-IP` name the client.
    pub(crate) trust_proxy_headers: bool,
}
