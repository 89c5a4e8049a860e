//! Encrypted per-invoice metadata.
//!
//! The metadata is encrypted to a one-off key at `<user key>/3/r1/r2` where `r1` and `r2` are
//! random 31-bit indices. The blob records both indices next to an ephemeral public key, so the
//! holder of the user's extended private key can re-derive the key and decrypt; nobody else can.
//!
//! Blob layout:
//!
//! ```text
//! version (1) || r1 (4, BE) || r2 (4, BE) || ephemeral pubkey (33) || nonce (12) || data || tag (16)
//! ```
use bitcoin::{
    hex::{DisplayHex, FromHex, HexToBytesError},
    secp256k1::{ecdh::SharedSecret, PublicKey, Secp256k1, SecretKey},
};
use core::{fmt, str::FromStr};
use rand_core::{CryptoRng, RngCore};
use tracing::{event, Level};

use crate::{
    keys::{HdKey, HdPrivateKey},
    secrets::ENCRYPTED_METADATA_KEY_CHILD_INDEX,
    symmetric_encryption::{Ciphertext, SymmetricKey},
    MetadataError,
};

const VERSION: u8 = 1;
const HEADER_LEN: usize = 1 + 4 + 4 + 33;
const INDEX_MASK: u32 = 0x7FFF_FFFF;

/// Context about an incoming payment that only the wallet owner should be able to read.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub invoice: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lnurl_sender: String,
}

/// Opaque encrypted metadata. Displayed and parsed as hex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMetadata(Vec<u8>);

impl EncryptedMetadata {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The two random indices the encryption key was derived at. `None` when the header is
    /// malformed, including indices outside the non-hardened range.
    pub fn key_indices(&self) -> Option<(u32, u32)> {
        if self.0.len() < HEADER_LEN || self.0[0] != VERSION {
            return None;
        }
        let r1 = u32::from_be_bytes(self.0[1..5].try_into().ok()?);
        let r2 = u32::from_be_bytes(self.0[5..9].try_into().ok()?);
        if r1 > INDEX_MASK || r2 > INDEX_MASK {
            return None;
        }
        Some((r1, r2))
    }
}

impl fmt::Display for EncryptedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hex())
    }
}

impl FromStr for EncryptedMetadata {
    type Err = HexToBytesError;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Ok(Self(Vec::<u8>::from_hex(hex)?))
    }
}

fn metadata_key<K: HdPrivateKey>(user_key: &K, r1: u32, r2: u32) -> Result<K, MetadataError> {
    Ok(user_key
        .derived_at(ENCRYPTED_METADATA_KEY_CHILD_INDEX, false)?
        .derived_at(r1, false)?
        .derived_at(r2, false)?)
}

fn random_secret_key(rng: &mut (impl RngCore + CryptoRng)) -> SecretKey {
    let mut bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut bytes);
        if let Ok(secret_key) = SecretKey::from_slice(&bytes) {
            return secret_key;
        }
    }
}

pub fn encrypt_metadata<K: HdPrivateKey>(
    user_key: &K,
    metadata: &OperationMetadata,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<EncryptedMetadata, MetadataError> {
    let plaintext = serde_json::to_vec(metadata)?;

    let r1 = rng.next_u32() & INDEX_MASK;
    let r2 = rng.next_u32() & INDEX_MASK;
    let key = metadata_key(user_key, r1, r2)?;

    let secp = Secp256k1::signing_only();
    let ephemeral_secret = random_secret_key(rng);
    let ephemeral_public = PublicKey::from_secret_key(&secp, &ephemeral_secret);
    let shared_secret = SharedSecret::new(&key.public_key(), &ephemeral_secret);

    let mut blob = Vec::with_capacity(HEADER_LEN + plaintext.len() + 28);
    blob.push(VERSION);
    blob.extend_from_slice(&r1.to_be_bytes());
    blob.extend_from_slice(&r2.to_be_bytes());
    blob.extend_from_slice(&ephemeral_public.serialize());

    let ciphertext = Ciphertext::encrypt(
        SymmetricKey(shared_secret.secret_bytes()),
        &plaintext,
        &blob[..HEADER_LEN],
        rng,
    )
    .map_err(|_| MetadataError::Encryption)?;
    blob.extend_from_slice(&ciphertext.to_bytes());

    event!(
        Level::DEBUG,
        key_path = key.path().to_string(),
        len = plaintext.len(),
        "encrypted invoice metadata"
    );

    Ok(EncryptedMetadata(blob))
}

pub fn decrypt_metadata<K: HdPrivateKey>(
    user_key: &K,
    encrypted: &EncryptedMetadata,
) -> Result<OperationMetadata, MetadataError> {
    let (r1, r2) = encrypted.key_indices().ok_or(MetadataError::MalformedBlob)?;
    let (header, rest) = encrypted.0.split_at(HEADER_LEN);
    let ephemeral_public =
        PublicKey::from_slice(&header[9..]).map_err(|_| MetadataError::MalformedBlob)?;
    let ciphertext = Ciphertext::from_bytes(rest).ok_or(MetadataError::MalformedBlob)?;

    let key = metadata_key(user_key, r1, r2)?;
    let shared_secret = SharedSecret::new(&ephemeral_public, &key.secret_key());
    let plaintext = ciphertext
        .decrypt(SymmetricKey(shared_secret.secret_bytes()), header)
        .ok_or(MetadataError::Decryption)?;

    Ok(serde_json::from_slice(&plaintext)?)
}
