//! Secrets and signing for locally created lightning invoices.
//!
//! The flow is: [`generate_secrets`] produces fresh secrets, the caller registers their payment
//! hashes with the remote server and stores the accepted ones as [`PersistedInvoice`]s. Later
//! [`issue_invoice`] turns the oldest unused record into a signed BOLT11 invoice.

pub mod hdpath;
pub mod invoice;
pub mod keys;
pub mod metadata;
pub mod record;
pub mod secrets;
pub mod symmetric_encryption;
pub mod types;
pub mod witness;

mod error;
#[cfg(feature = "rusqlite")]
mod sqlite;

pub use bitcoin;
pub use error::*;
pub use invoice::{issue_invoice, InvoiceOptions, IssuedInvoice, RouteHints};
pub use keys::{ExtendedPrivateKey, ExtendedPublicKey, HdKey, HdPrivateKey};
pub use lightning_invoice;
pub use metadata::{decrypt_metadata, EncryptedMetadata, OperationMetadata};
pub use record::{InvoiceState, PersistedInvoice};
pub use secrets::{generate_secrets, InvoiceSecret, MAX_UNUSED_SECRETS};
pub use types::{PaymentHash, PaymentSecret, Preimage, ShortChannelId};
pub use witness::verify_witness_signature;
