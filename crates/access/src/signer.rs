use alloy::{
    primitives::{hex, Address},
    signers::{local::PrivateKeySigner, Signer},
};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The user declined to sign.
    #[error("signature request rejected")]
    Rejected,

    #[error("signer does not control account {0}")]
    UnknownAccount(Address),

    #[error("signing timed out")]
    Timeout,

    #[error("signing failed: {0}")]
    Signing(#[from] alloy::signers::Error),
}

/// An interactive wallet able to personal-sign text for its accounts.
///
/// `sign_message` may wait on the user for an arbitrary time; returning
/// [`SignerError::Rejected`] cancels the pending proof.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Accounts the signer can sign for.
    async fn accounts(&self) -> Result<Vec<Address>, SignerError>;

    /// EIP-191 personal signature of `message` by `account`, `0x`-prefixed hex.
    async fn sign_message(&self, account: Address, message: &str) -> Result<String, SignerError>;
}

#[async_trait]
impl MessageSigner for PrivateKeySigner {
    async fn accounts(&self) -> Result<Vec<Address>, SignerError> {
        Ok(vec![self.address()])
    }

    async fn sign_message(&self, account: Address, message: &str) -> Result<String, SignerError> {
        if account != self.address() {
            return Err(SignerError::UnknownAccount(account));
        }
        let signature = Signer::sign_message(self, message.as_bytes()).await?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}
