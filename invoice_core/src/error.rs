//! Error types for invoice_core

use bitcoin::{bip32, secp256k1};
use core::fmt;

use crate::hdpath::PathError;

#[derive(Debug, Clone, PartialEq)]
pub enum DerivationError {
    /// The target path could not be parsed
    Path(PathError),
    /// The target path is not below the path of the key being derived from
    NotADescendant { from: String, to: String },
    /// Public keys cannot derive hardened children
    HardenedFromPublic { index: u32 },
    /// The index does not fit in 31 bits
    IndexOutOfRange { index: u32 },
    /// bip32 arithmetic failed (invalid tweak or depth overflow)
    Bip32(bip32::Error),
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationError::Path(e) => write!(f, "{}", e),
            DerivationError::NotADescendant { from, to } => {
                write!(f, "can't derive {} from a key at {}", to, from)
            }
            DerivationError::HardenedFromPublic { index } => {
                write!(f, "can't derive hardened index {}' from a public key", index)
            }
            DerivationError::IndexOutOfRange { index } => {
                write!(f, "derivation index {} is out of range", index)
            }
            DerivationError::Bip32(e) => write!(f, "bip32 derivation failed: {}", e),
        }
    }
}

impl std::error::Error for DerivationError {}

impl From<PathError> for DerivationError {
    fn from(e: PathError) -> Self {
        DerivationError::Path(e)
    }
}

impl From<bip32::Error> for DerivationError {
    fn from(e: bip32::Error) -> Self {
        DerivationError::Bip32(e)
    }
}

/// Illegal transitions of a persisted invoice's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The invoice was already used to issue a payment request
    AlreadyUsed,
    /// The invoice was never registered with the remote server
    NotRegistered,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::AlreadyUsed => write!(f, "invoice secret has already been used"),
            StateError::NotRegistered => write!(f, "invoice secret is not registered"),
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Debug)]
pub enum MetadataError {
    /// Couldn't serialize or parse the metadata JSON
    Json(serde_json::Error),
    /// Couldn't derive the encryption key
    Derivation(DerivationError),
    /// The blob is truncated or has an unknown version
    MalformedBlob,
    /// Authenticated decryption failed
    Decryption,
    /// AEAD encryption failed
    Encryption,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Json(e) => write!(f, "metadata json: {}", e),
            MetadataError::Derivation(e) => write!(f, "failed to derive encryption key: {}", e),
            MetadataError::MalformedBlob => write!(f, "encrypted metadata is malformed"),
            MetadataError::Decryption => write!(f, "failed to decrypt metadata"),
            MetadataError::Encryption => write!(f, "failed to encrypt metadata"),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Json(e) => Some(e),
            MetadataError::Derivation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(e: serde_json::Error) -> Self {
        MetadataError::Json(e)
    }
}

impl From<DerivationError> for MetadataError {
    fn from(e: DerivationError) -> Self {
        MetadataError::Derivation(e)
    }
}

/// Everything that can go wrong while turning a registered secret into a signed invoice. Each
/// variant names the step that failed.
#[derive(Debug)]
pub enum InvoiceError {
    /// The route hint node id isn't a valid public key
    RouteHintPubkey(secp256k1::Error),
    /// Re-deriving the identity key failed
    Derivation(DerivationError),
    /// The amount in msat doesn't fit in 64 bits
    AmountOverflow { amount_sat: u64 },
    /// The invoice fields were rejected by the encoder
    Creation(lightning_invoice::CreationError),
    /// The signer failed to produce a signature
    Signing(secp256k1::Error),
    /// The signed invoice didn't pass semantic checks
    Encoding(lightning_invoice::Bolt11SemanticError),
    /// Encrypting the metadata failed
    Metadata(MetadataError),
    /// The secret can't be used
    State(StateError),
}

impl fmt::Display for InvoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceError::RouteHintPubkey(e) => write!(f, "can't parse route hint pubkey: {}", e),
            InvoiceError::Derivation(e) => write!(f, "can't obtain identity privkey: {}", e),
            InvoiceError::AmountOverflow { amount_sat } => {
                write!(f, "amount of {} sat is too large", amount_sat)
            }
            InvoiceError::Creation(e) => write!(f, "failed to create invoice: {}", e),
            InvoiceError::Signing(e) => write!(f, "failed to sign invoice: {}", e),
            InvoiceError::Encoding(e) => write!(f, "failed to encode invoice: {}", e),
            InvoiceError::Metadata(e) => write!(f, "{}", e),
            InvoiceError::State(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for InvoiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvoiceError::Derivation(e) => Some(e),
            InvoiceError::Metadata(e) => Some(e),
            InvoiceError::State(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DerivationError> for InvoiceError {
    fn from(e: DerivationError) -> Self {
        InvoiceError::Derivation(e)
    }
}

impl From<MetadataError> for InvoiceError {
    fn from(e: MetadataError) -> Self {
        InvoiceError::Metadata(e)
    }
}

impl From<StateError> for InvoiceError {
    fn from(e: StateError) -> Self {
        InvoiceError::State(e)
    }
}

/// Outcome of checking a witness signature. `DoesNotVerify` is the only variant that means the
/// inputs were well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The input index doesn't exist in the transaction
    Sighash(bitcoin::transaction::InputsIndexError),
    /// The signature isn't strict DER
    MalformedSignature(secp256k1::Error),
    /// The signature is well formed but doesn't match the digest and key
    DoesNotVerify,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Sighash(e) => write!(f, "can't compute witness sighash: {}", e),
            VerifyError::MalformedSignature(e) => write!(f, "malformed signature: {}", e),
            VerifyError::DoesNotVerify => write!(f, "signature does not verify"),
        }
    }
}

impl std::error::Error for VerifyError {}
