use crate::{
    hdpath::KeyPath,
    metadata::EncryptedMetadata,
    types::{PaymentHash, PaymentSecret, Preimage, ShortChannelId},
    StateError,
};

/// Where an invoice secret is in its life.
///
/// Secrets are stored once the remote server has accepted them, so records start out
/// `Registered`. `Unused` only exists so that rows written by older clients can be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceState {
    Unused,
    Registered,
    /// A payment request has been handed out. `used_at` is in seconds since the unix epoch.
    Used { used_at: u64 },
}

impl InvoiceState {
    pub const UNUSED: i64 = 0;
    pub const REGISTERED: i64 = 1;
    pub const USED: i64 = 2;

    pub fn code(&self) -> i64 {
        match self {
            InvoiceState::Unused => Self::UNUSED,
            InvoiceState::Registered => Self::REGISTERED,
            InvoiceState::Used { .. } => Self::USED,
        }
    }

    /// Rebuilds a state from its stored columns. `used_at` must be present exactly when the
    /// state is `Used`.
    pub fn from_columns(code: i64, used_at: Option<u64>) -> Option<Self> {
        match (code, used_at) {
            (Self::UNUSED, None) => Some(InvoiceState::Unused),
            (Self::REGISTERED, None) => Some(InvoiceState::Registered),
            (Self::USED, Some(used_at)) => Some(InvoiceState::Used { used_at }),
            _ => None,
        }
    }

    pub fn used_at(&self) -> Option<u64> {
        match self {
            InvoiceState::Used { used_at } => Some(*used_at),
            _ => None,
        }
    }
}

/// An invoice secret as it sits in the wallet database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedInvoice {
    pub preimage: Preimage,
    pub payment_hash: PaymentHash,
    pub payment_secret: PaymentSecret,
    pub key_path: KeyPath,
    pub short_channel_id: ShortChannelId,
    pub state: InvoiceState,
    pub amount_sat: u64,
    pub metadata: Option<EncryptedMetadata>,
}

impl PersistedInvoice {
    pub fn is_unused(&self) -> bool {
        self.state == InvoiceState::Registered
    }

    pub fn used_at(&self) -> Option<u64> {
        self.state.used_at()
    }

    pub fn ensure_unused(&self) -> Result<(), StateError> {
        match self.state {
            InvoiceState::Registered => Ok(()),
            InvoiceState::Used { .. } => Err(StateError::AlreadyUsed),
            InvoiceState::Unused => Err(StateError::NotRegistered),
        }
    }

    /// The one transition a record ever makes.
    pub fn mark_used(
        &mut self,
        amount_sat: u64,
        used_at: u64,
        metadata: Option<EncryptedMetadata>,
    ) -> Result<(), StateError> {
        self.ensure_unused()?;
        self.amount_sat = amount_sat;
        self.metadata = metadata;
        self.state = InvoiceState::Used { used_at };
        Ok(())
    }
}
