//! Wallet signing and signer recovery
//!
//! The governance flow never holds a user's key: a wallet signs the serialized event as
//! an EIP-191 personal message and the client only needs to recover the signer address
//! from the signature. [`LocalWallet`] is a key held in process for the CLI and tests.

use core::fmt;

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::event::{strip_hex_prefix, Event};

/// Anything that can sign a message on behalf of an address
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Checksummed `0x` address of the signer
    fn address(&self) -> String;

    /// Sign `message` as an EIP-191 personal message, returning `0x` + r‖s‖v hex
    async fn sign_message(&self, message: &str) -> Result<String>;
}

// ----------------------------------------------------------------------------
// Hashing and Recovery
// ----------------------------------------------------------------------------

/// Keccak-256 of the EIP-191 prefixed message
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// EIP-55 mixed-case encoding of a 20-byte address
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    to_checksum_address(&address)
}

/// Recover the checksummed address that signed `message`.
///
/// `signature` is 65 bytes of hex (`r‖s‖v`, optional `0x`); `v` may be 0/1 or 27/28.
pub fn recover_address(message: &str, signature: &str) -> Result<String> {
    let bytes = hex::decode(strip_hex_prefix(signature.trim()))?;
    if bytes.len() != 65 {
        return Err(CoreError::Signature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        v => return Err(CoreError::Signature(format!("invalid recovery byte {}", v))),
    };
    let mut recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| CoreError::Signature(format!("invalid recovery byte {}", v)))?;
    let mut signature = Signature::from_slice(&bytes[..64])?;
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let prehash = hash_message(message.as_bytes());
    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)?;
    let address = address_of(&key);
    debug!("Recovered address: {}", address);
    Ok(address)
}

/// Check that `signature` over `message` was produced by `expected`
pub fn verify_message(message: &str, signature: &str, expected: &str) -> Result<()> {
    let recovered = recover_address(message, signature)?;
    if !strip_hex_prefix(&recovered).eq_ignore_ascii_case(strip_hex_prefix(expected)) {
        return Err(CoreError::SignatureMismatch {
            expected: expected.to_string(),
            recovered,
        });
    }
    Ok(())
}

/// Check a finalized event: its signature must recover to its pubkey
pub fn verify_event(event: &Event) -> Result<()> {
    if !event.has_valid_id() {
        return Err(CoreError::Signature(format!(
            "event id {} does not match its content",
            event.id
        )));
    }
    let message = event.unsigned().serialize();
    verify_message(&message, &event.sig, &event.pubkey)
}

// ----------------------------------------------------------------------------
// Local Wallet
// ----------------------------------------------------------------------------

/// In-process secp256k1 key that signs like an embedded wallet
#[derive(Clone)]
pub struct LocalWallet {
    key: SigningKey,
    address: String,
}

impl LocalWallet {
    /// Create a fresh random wallet
    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut OsRng))
    }

    /// Load a wallet from a 32-byte hex secret (optional `0x`)
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(secret.trim()))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Secret key as `0x` hex, for persisting a generated wallet
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }

    /// Synchronous EIP-191 signature, `0x` + r‖s‖v with v in {27, 28}
    pub fn sign(&self, message: &str) -> Result<String> {
        let prehash = hash_message(message.as_bytes());
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(&prehash)?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSigner for LocalWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        self.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const TEST_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    #[test]
    fn test_known_key_address() {
        let wallet = LocalWallet::from_hex(TEST_KEY).unwrap();
        assert_eq!(wallet.address(), TEST_ADDRESS);
        assert_eq!(wallet.secret_hex(), TEST_KEY);
    }

    #[test]
    fn test_recover_round_trip() {
        let wallet = LocalWallet::from_hex(TEST_KEY).unwrap();
        let message = r#"[0,"2c7536e3605d9c16a7a3d7b1898e529396a65c23",1,30100,[],""]"#;
        let signature = wallet.sign(message).unwrap();

        assert_eq!(signature.len(), 2 + 130);
        assert_eq!(recover_address(message, &signature).unwrap(), TEST_ADDRESS);
        assert_eq!(
            recover_address(message, signature.trim_start_matches("0x")).unwrap(),
            TEST_ADDRESS
        );
    }

    #[test]
    fn test_recover_detects_other_message() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign("original").unwrap();
        assert!(verify_message("original", &signature, &wallet.address()).is_ok());
        assert!(matches!(
            verify_message("tampered", &signature, &wallet.address()),
            Err(CoreError::SignatureMismatch { .. }) | Err(CoreError::Signature(_))
        ));
    }

    #[test]
    fn test_recover_accepts_zero_based_v() {
        let wallet = LocalWallet::random();
        let signature = wallet.sign("msg").unwrap();
        let mut bytes = hex::decode(&signature[2..]).unwrap();
        bytes[64] -= 27;
        let recovered = recover_address("msg", &hex::encode(bytes)).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_recover_rejects_malformed() {
        assert!(recover_address("m", "0x1234").is_err());
        assert!(recover_address("m", "zz").is_err());
        let mut bytes = vec![1u8; 65];
        bytes[64] = 5;
        assert!(recover_address("m", &hex::encode(bytes)).is_err());
    }

    #[test]
    fn test_checksum_address() {
        let bytes: [u8; 20] = hex::decode("2c7536e3605d9c16a7a3d7b1898e529396a65c23")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(to_checksum_address(&bytes), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn test_signer_trait() {
        let wallet = LocalWallet::random();
        let signer: &dyn MessageSigner = &wallet;
        let signature = signer.sign_message("hello").await.unwrap();
        assert_eq!(recover_address("hello", &signature).unwrap(), signer.address());
    }
}
