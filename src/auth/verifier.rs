//! Signature verification - recover the signer of a challenge.
//!
//! `PersonalSignVerifier` handles wallet `personal_sign` signatures:
//! secp256k1 recoverable ECDSA over
//! `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`,
//! hex-encoded as 65 bytes `r || s || v` with `v` in {0, 1, 27, 28}.
//! High-S signatures are rejected.
//!
//! Verification fails closed: any parse or recovery problem is `false`.

use crate::core::address::ADDRESS_BYTES;
use crate::core::WalletAddress;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

pub const SIGNATURE_BYTES: usize = 65;

pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, wallet_address: &WalletAddress, message: &str, signature: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignVerifier;

impl SignatureVerifier for PersonalSignVerifier {
    fn verify(&self, wallet_address: &WalletAddress, message: &str, signature: &str) -> bool {
        recover_address(message, signature).map(|signer| &signer == wallet_address).unwrap_or(false)
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Last 20 bytes of keccak256 over the uncompressed public key.
pub fn address_from_key(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; ADDRESS_BYTES];
    address.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&address)
}

pub fn recover_address(message: &str, signature: &str) -> Option<WalletAddress> {
    let raw = signature.trim();
    let raw = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    let bytes = hex::decode(raw).ok()?;
    if bytes.len() != SIGNATURE_BYTES {
        return None;
    }

    let sig = Signature::from_slice(&bytes[..64]).ok()?;
    // normalize_s yields Some only for high-S input.
    if sig.normalize_s().is_some() {
        return None;
    }
    let v = match bytes[64] {
        0 | 1 => bytes[64],
        27 | 28 => bytes[64] - 27,
        _ => return None,
    };
    let recovery_id = RecoveryId::from_byte(v)?;

    let hash = personal_message_hash(message.as_bytes());
    let key = VerifyingKey::recover_from_prehash(&hash, &sig, recovery_id).ok()?;
    Some(address_from_key(&key))
}

/// Client-side counterpart of [`recover_address`]: `0x`-prefixed hex, `v` in {27, 28}.
pub fn sign_personal_message(key: &SigningKey, message: &str) -> Option<String> {
    let hash = personal_message_hash(message.as_bytes());
    let (sig, recovery_id) = key.sign_prehash_recoverable(&hash).ok()?;
    let mut out = sig.to_bytes().to_vec();
    out.push(recovery_id.to_byte() + 27);
    Some(format!("0x{}", hex::encode(out)))
}
