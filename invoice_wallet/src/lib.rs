//! Keeps the pool of invoice secrets in a sqlite database and turns them into invoices.
pub mod config;
pub mod persist;
mod wallet;

pub use config::WalletConfig;
pub use invoice_core;
pub use persist::InvoiceStore;
pub use wallet::InvoiceWallet;
