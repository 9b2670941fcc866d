//! Key derivation, addresses and ECDSA signatures (secp256k1)
//!
//! Keys and signatures travel as lowercase hex strings:
//! - private key: 64 hex digits, never starting with `0`
//! - public key: 64 hex digits of the X coordinate followed by one parity
//!   digit (`0` for even Y, `1` for odd Y), 65 digits in total
//! - address: 40 hex digits, RIPEMD-160 of the public key string
//! - signature: `[r, s]`, each 64 hex digits

use crate::error::{ChainError, Result};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use ripemd::{Digest, Ripemd160};
use secp256k1::{ecdsa, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub const PRIVATE_KEY_HEX_LEN: usize = 64;
pub const PUBLIC_KEY_HEX_LEN: usize = 65;
pub const ADDRESS_HEX_LEN: usize = 40;
pub const HASH_HEX_LEN: usize = 64;

/// Returns true when `s` is exactly `len` lowercase hex digits.
pub fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn validate_address(address: &str) -> Result<()> {
    if is_lower_hex(address, ADDRESS_HEX_LEN) {
        Ok(())
    } else {
        Err(ChainError::Format(format!(
            "Address must be {} lowercase hex digits: {:?}",
            ADDRESS_HEX_LEN, address
        )))
    }
}

pub fn validate_hash(hash: &str) -> Result<()> {
    if is_lower_hex(hash, HASH_HEX_LEN) {
        Ok(())
    } else {
        Err(ChainError::Format(format!(
            "Hash must be {} lowercase hex digits: {:?}",
            HASH_HEX_LEN, hash
        )))
    }
}

pub fn validate_public_key(public_key: &str) -> Result<()> {
    let parity = public_key.as_bytes().last().copied();
    if is_lower_hex(public_key, PUBLIC_KEY_HEX_LEN) && matches!(parity, Some(b'0') | Some(b'1')) {
        Ok(())
    } else {
        Err(ChainError::Format(format!(
            "Public key must be {} hex digits ending in 0 or 1: {:?}",
            PUBLIC_KEY_HEX_LEN, public_key
        )))
    }
}

/// ECDSA signature as the pair of zero-padded hex scalars `r` and `s`.
///
/// Serialized as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct Signature {
    pub r: String,
    pub s: String,
}

impl Signature {
    pub fn new(r: impl Into<String>, s: impl Into<String>) -> Self {
        Signature {
            r: r.into(),
            s: s.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_lower_hex(&self.r, HASH_HEX_LEN) && is_lower_hex(&self.s, HASH_HEX_LEN) {
            Ok(())
        } else {
            Err(ChainError::Format(
                "Signature components must be 64 lowercase hex digits".to_string(),
            ))
        }
    }
}

impl From<[String; 2]> for Signature {
    fn from([r, s]: [String; 2]) -> Self {
        Signature { r, s }
    }
}

impl From<Signature> for [String; 2] {
    fn from(sig: Signature) -> Self {
        [sig.r, sig.s]
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair whose hex private key has no leading zero digit.
    pub fn generate() -> Self {
        loop {
            let secret_key = SecretKey::new(&mut OsRng);
            // Full-width keys only: the first nibble must be non-zero.
            if secret_key.secret_bytes()[0] >> 4 != 0 {
                return Self::from_secret_key(secret_key);
            }
        }
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn from_private_key_hex(private_key: &str) -> Result<Self> {
        if !is_lower_hex(private_key, PRIVATE_KEY_HEX_LEN) {
            return Err(ChainError::Format(format!(
                "Private key must be {} lowercase hex digits",
                PRIVATE_KEY_HEX_LEN
            )));
        }
        let bytes = hex::decode(private_key)?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| ChainError::Format(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        compress_public_key(&self.public_key)
    }

    pub fn address(&self) -> String {
        address_of(&self.public_key_hex())
    }

    /// Signs an already-hashed 64-hex message.
    pub fn sign(&self, message_hash: &str) -> Result<Signature> {
        let message = message_from_hash(message_hash)?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        let compact = signature.serialize_compact();
        Ok(Signature {
            r: hex::encode(&compact[..32]),
            s: hex::encode(&compact[32..]),
        })
    }
}

/// Draws a fresh private key as 64 hex digits.
pub fn generate_private_key() -> String {
    KeyPair::generate().private_key_hex()
}

pub fn derive_public_key(private_key: &str) -> Result<String> {
    Ok(KeyPair::from_private_key_hex(private_key)?.public_key_hex())
}

/// RIPEMD-160 of the public key string.
pub fn derive_address(public_key: &str) -> Result<String> {
    validate_public_key(public_key)?;
    Ok(address_of(public_key))
}

pub fn sign(message_hash: &str, private_key: &str) -> Result<Signature> {
    KeyPair::from_private_key_hex(private_key)?.sign(message_hash)
}

/// Verifies `signature` over `message_hash` against a compressed public key.
///
/// Malformed hex is an error. Well-formed values that do not describe a
/// curve point or a valid scalar simply fail verification.
pub fn verify(message_hash: &str, public_key: &str, signature: &Signature) -> Result<bool> {
    let message = message_from_hash(message_hash)?;
    validate_public_key(public_key)?;
    signature.validate()?;

    let public_key = match decompress_public_key(public_key) {
        Some(key) => key,
        None => return Ok(false),
    };

    let mut compact = [0u8; 64];
    hex::decode_to_slice(&signature.r, &mut compact[..32])?;
    hex::decode_to_slice(&signature.s, &mut compact[32..])?;
    let mut signature = match ecdsa::Signature::from_compact(&compact) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    // Accept high-S signatures produced by other ECDSA implementations.
    signature.normalize_s();

    Ok(SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok())
}

fn address_of(public_key: &str) -> String {
    hex::encode(Ripemd160::digest(public_key.as_bytes()))
}

fn compress_public_key(public_key: &PublicKey) -> String {
    let serialized = public_key.serialize();
    let parity = if serialized[0] == 0x03 { '1' } else { '0' };
    let mut out = hex::encode(&serialized[1..]);
    out.push(parity);
    out
}

/// Rebuilds the curve point from the X coordinate and parity digit.
fn decompress_public_key(public_key: &str) -> Option<PublicKey> {
    let (x_hex, parity) = public_key.split_at(PUBLIC_KEY_HEX_LEN - 1);
    let mut serialized = [0u8; 33];
    serialized[0] = if parity == "1" { 0x03 } else { 0x02 };
    hex::decode_to_slice(x_hex, &mut serialized[1..]).ok()?;
    PublicKey::from_slice(&serialized).ok()
}

fn message_from_hash(message_hash: &str) -> Result<Message> {
    validate_hash(message_hash)?;
    let digest = hex::decode(message_hash)?;
    Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::Format(format!("Failed to create message: {}", e)))
}
