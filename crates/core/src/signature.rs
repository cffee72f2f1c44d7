//! EIP-191 personal-sign verification.

use alloy::primitives::{hex, Address, Signature, U256};

/// Standard ECDSA signature length.
pub const ECDSA_SIGNATURE_LEN: usize = 65;

/// Reasons a signature fails to verify.
#[derive(Debug, thiserror::Error)]
pub enum SignatureCheckError {
    /// Not valid hex.
    #[error("signature is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// Wrong byte length.
    #[error("signature must be exactly {ECDSA_SIGNATURE_LEN} bytes long, got {0}")]
    Length(usize),
    /// Recovery id outside `0`, `1`, `27`, `28`.
    #[error("invalid signature recovery id: {0}")]
    RecoveryId(u8),
    /// Public key recovery failed.
    #[error("failed to recover signer: {0}")]
    Recovery(#[from] alloy::primitives::SignatureError),
    /// Recovered a different address than the claimed account.
    #[error("signature was produced by {recovered}, not {expected}")]
    WrongSigner {
        /// The claimed account.
        expected: Address,
        /// The address recovered from the signature.
        recovered: Address,
    },
}

/// Decodes a hex string (with or without `0x`) holding `r || s || v` into raw bytes.
///
/// # Errors
/// Fails on invalid hex or a length other than 65 bytes.
pub fn decode_signature_bytes(signature: &str) -> Result<Vec<u8>, SignatureCheckError> {
    let bytes = hex::decode(signature.trim())?;
    if bytes.len() != ECDSA_SIGNATURE_LEN {
        return Err(SignatureCheckError::Length(bytes.len()));
    }
    Ok(bytes)
}

/// Parses a hex encoded 65-byte `r || s || v` signature.
///
/// # Errors
/// Fails on malformed hex, wrong length or an unknown recovery id.
pub fn parse_signature(signature: &str) -> Result<Signature, SignatureCheckError> {
    let bytes = decode_signature_bytes(signature)?;
    let r = U256::from_be_slice(&bytes[0..32]);
    let s = U256::from_be_slice(&bytes[32..64]);
    let v = bytes[64];

    let y_parity = match v {
        0 | 27 => false,
        1 | 28 => true,
        _ => return Err(SignatureCheckError::RecoveryId(v)),
    };

    Ok(Signature::new(r, s, y_parity))
}

/// Checks that `signature` is `account`'s personal-sign signature over `message`.
///
/// # Errors
/// Returns the reason verification failed.
pub fn verify_personal_signature(
    account: Address,
    message: &str,
    signature: &str,
) -> Result<(), SignatureCheckError> {
    let sig = parse_signature(signature)?;
    let recovered = sig.recover_address_from_msg(message.as_bytes())?;
    if recovered != account {
        return Err(SignatureCheckError::WrongSigner {
            expected: account,
            recovered,
        });
    }
    Ok(())
}
