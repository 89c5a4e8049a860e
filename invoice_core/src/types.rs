use bitcoin::hex::{DisplayHex, FromHex, HexToArrayError};
use core::{fmt, str::FromStr};
use sha2::{Digest, Sha256};

/// Implements hex Display/FromStr for a newtype around a 32 byte array
macro_rules! impl_hex_bytes {
    ($type:ident) => {
        impl $type {
            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }

            pub fn from_slice(slice: &[u8]) -> Option<Self> {
                Some(Self(slice.try_into().ok()?))
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.as_hex())
            }
        }

        impl FromStr for $type {
            type Err = HexToArrayError;

            fn from_str(hex: &str) -> Result<Self, Self::Err> {
                Ok(Self(<[u8; 32]>::from_hex(hex)?))
            }
        }
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaymentHash(pub [u8; 32]);

impl_hex_bytes!(PaymentHash);

impl fmt::Debug for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentHash({})", self)
    }
}

impl PaymentHash {
    pub fn to_sha256(&self) -> bitcoin::hashes::sha256::Hash {
        use bitcoin::hashes::Hash;
        bitcoin::hashes::sha256::Hash::from_byte_array(self.0)
    }
}

/// The proof of payment. Whoever learns it can claim the payment.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Preimage(pub [u8; 32]);

impl_hex_bytes!(Preimage);

impl Preimage {
    pub fn payment_hash(&self) -> PaymentHash {
        PaymentHash(Sha256::digest(self.0).into())
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preimage(..)")
    }
}

/// The BOLT11 payment address (`s` field).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PaymentSecret(pub [u8; 32]);

impl_hex_bytes!(PaymentSecret);

impl PaymentSecret {
    pub fn to_lightning(&self) -> lightning_invoice::PaymentSecret {
        lightning_invoice::PaymentSecret(self.0)
    }
}

impl fmt::Debug for PaymentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentSecret(..)")
    }
}

/// A short channel id with the top bit set, which no funded channel can have (its block height
/// would be absurd). Used as the hop in the route hint of locally created invoices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortChannelId(u64);

impl ShortChannelId {
    const SYNTHETIC_FLAG: u64 = 1 << 63;

    pub fn synthetic(raw: u64) -> Self {
        Self(raw | Self::SYNTHETIC_FLAG)
    }

    /// For values read back from storage. Returns `None` if the flag bit is missing.
    pub fn from_u64(value: u64) -> Option<Self> {
        (value & Self::SYNTHETIC_FLAG != 0).then_some(Self(value))
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn is_synthetic(self) -> bool {
        self.0 & Self::SYNTHETIC_FLAG != 0
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
