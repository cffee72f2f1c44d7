//! Proof verification: nonce redemption plus a signature over the canonical message.

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{eip191_hash_message, Address, Bytes},
    providers::DynProvider,
};
use async_trait::async_trait;
use onlystars_core::{
    creator_hub::{IERC1271, ERC1271_MAGIC_VALUE},
    signature::verify_personal_signature,
    types::{GateRequest, ProofFailure},
    GateMessage,
};

use crate::nonce::{NonceError, NonceService};

/// Checks that `signature` over `message` was produced by `account`.
#[async_trait]
pub trait MessageVerifier: Send + Sync {
    async fn verify(&self, account: Address, message: &str, signature: &str) -> bool;
}

/// EIP-191 personal-sign recovery. Externally owned accounts only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignVerifier;

#[async_trait]
impl MessageVerifier for PersonalSignVerifier {
    async fn verify(&self, account: Address, message: &str, signature: &str) -> bool {
        match verify_personal_signature(account, message, signature) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%account, error = %e, "personal signature rejected");
                false
            }
        }
    }
}

/// Personal-sign recovery with an ERC-1271 `isValidSignature` fallback for
/// contract wallets.
pub struct ContractAwareVerifier {
    provider: DynProvider,
    timeout: Duration,
}

impl ContractAwareVerifier {
    pub fn new(provider: DynProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl MessageVerifier for ContractAwareVerifier {
    async fn verify(&self, account: Address, message: &str, signature: &str) -> bool {
        if PersonalSignVerifier.verify(account, message, signature).await {
            return true;
        }

        let Ok(sig_bytes) = hex::decode(signature.trim().trim_start_matches("0x")) else {
            return false;
        };
        let wallet = IERC1271::new(account, self.provider.clone());
        let call = wallet.isValidSignature(eip191_hash_message(message), Bytes::from(sig_bytes));

        match tokio::time::timeout(self.timeout, call.call()).await {
            Ok(Ok(magic)) => magic.0 == ERC1271_MAGIC_VALUE,
            Ok(Err(e)) => {
                tracing::debug!(%account, error = %e, "isValidSignature call failed");
                false
            }
            Err(_) => {
                tracing::warn!(%account, timeout = ?self.timeout, "isValidSignature timed out");
                false
            }
        }
    }
}

/// Validates a [`GateRequest`]'s proof of account control.
#[derive(Clone)]
pub struct ProofVerifier {
    nonces: NonceService,
    messages: Arc<dyn MessageVerifier>,
}

impl ProofVerifier {
    pub fn new(nonces: NonceService, messages: Arc<dyn MessageVerifier>) -> Self {
        Self { nonces, messages }
    }

    /// Redeems the request's nonce against the scope its fields describe, then
    /// verifies the signature over the rebuilt canonical message.
    ///
    /// A request without nonce or signature never touches the store.
    pub async fn verify(&self, request: &GateRequest) -> Result<(), ProofFailure> {
        let (Some(nonce), Some(signature)) =
            (request.nonce.as_deref(), request.signature.as_deref())
        else {
            return Err(ProofFailure::MissingSig);
        };

        let expected = request.scope();
        match self
            .nonces
            .consume(request.account, nonce, Some(&expected))
            .await
        {
            Ok(()) => {}
            Err(NonceError::ScopeMismatch) => return Err(ProofFailure::ScopeMismatch),
            Err(NonceError::BadNonce) => return Err(ProofFailure::BadNonce),
            Err(e) => {
                tracing::error!(account = %request.account, error = %e, "nonce redemption failed");
                return Err(ProofFailure::BadNonce);
            }
        }

        let canonical = GateMessage {
            mode: request.mode,
            account: request.account,
            nonce,
            post_id: request.post_id.as_ref(),
            creator: request.creator_address,
        }
        .build();

        if request
            .message
            .as_deref()
            .is_some_and(|client| client != canonical)
        {
            tracing::info!(
                account = %request.account,
                "client message differs from canonical message, verifying canonical"
            );
        }

        if self
            .messages
            .verify(request.account, &canonical, signature)
            .await
        {
            Ok(())
        } else {
            Err(ProofFailure::BadSignature)
        }
    }
}
