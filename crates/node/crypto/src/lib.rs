//! Transaction signature layer.
//!
//! Transactions are authorized by recoverable secp256k1 signatures over
//! the keccak-256 digest of the payload bytes. Signer identity is the
//! Ethereum-style 20-byte address derived from the recovered public key,
//! which is what the oracle and validator sets are keyed by.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use alloy_primitives::{keccak256, Address};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use thiserror::Error;

/// Length of a recoverable signature: `r || s || v`.
pub const SIGNATURE_LEN: usize = 65;

/// Error type for signature operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signature is not 65 bytes or carries an invalid recovery id.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Public-key recovery failed; the signature does not match the
    /// payload.
    #[error("signature recovery failed")]
    Recovery,

    /// The provided public key could not be parsed.
    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Derive the 20-byte address of a verifying key: the low 20 bytes of
/// `keccak256(uncompressed_pubkey[1..])`.
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

/// Derive the address for a serialized SEC1 public key (compressed or
/// uncompressed).
pub fn address_from_public_key(bytes: &[u8]) -> Result<Address, CryptoError> {
    let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(address_from_key(&key))
}

/// Sign `payload` with `key`, producing a 65-byte recoverable signature
/// over `keccak256(payload)`.
pub fn sign(key: &SigningKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let digest = keccak256(payload);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let mut out = Vec::with_capacity(SIGNATURE_LEN);
    out.extend_from_slice(&signature.to_bytes());
    out.push(recovery_id.to_byte());
    Ok(out)
}

/// Recover the signer address of a 65-byte recoverable signature over
/// `keccak256(payload)`.
pub fn recover_address(payload: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    // Accept both the raw recovery byte and the legacy 27/28 convention.
    let v = signature[64];
    let recovery_id = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })
        .ok_or_else(|| CryptoError::MalformedSignature(format!("recovery id {v}")))?;

    let digest = keccak256(payload);
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|_| CryptoError::Recovery)?;
    Ok(address_from_key(&key))
}
