use anyhow::{anyhow, Context as _, Result};
use invoice_core::{
    bitcoin::Network, decrypt_metadata, generate_secrets, issue_invoice, EncryptedMetadata,
    ExtendedPrivateKey, ExtendedPublicKey, InvoiceOptions, InvoiceSecret, OperationMetadata,
    PaymentHash, PersistedInvoice, RouteHints,
};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{event, Level};

use crate::{config::WalletConfig, persist::InvoiceStore};

/// The invoice side of a wallet: a store of invoice secrets and the keys to use them.
///
/// `user_key` and `muun_key` sit at the recovery path (`m/schema:1'/recovery:1'`).
pub struct InvoiceWallet<S = rusqlite::Connection, R = OsRng> {
    store: S,
    network: Network,
    user_key: ExtendedPrivateKey,
    muun_key: ExtendedPublicKey,
    rng: R,
}

impl InvoiceWallet {
    /// Opens (or creates) the wallet database in the configured data directory.
    pub fn open(
        config: &WalletConfig,
        network: Network,
        user_key: ExtendedPrivateKey,
        muun_key: ExtendedPublicKey,
    ) -> Result<Self> {
        std::fs::create_dir_all(config.data_dir())
            .with_context(|| format!("creating data dir {}", config.data_dir().display()))?;
        let db_path = config.db_path();
        event!(
            Level::INFO,
            path = db_path.display().to_string(),
            "opening wallet database"
        );
        let conn = rusqlite::Connection::open(&db_path)
            .with_context(|| format!("opening {}", db_path.display()))?;
        Self::new(conn, network, user_key, muun_key, OsRng)
    }
}

impl<S: InvoiceStore, R: RngCore + CryptoRng> InvoiceWallet<S, R> {
    pub fn new(
        mut store: S,
        network: Network,
        user_key: ExtendedPrivateKey,
        muun_key: ExtendedPublicKey,
        rng: R,
    ) -> Result<Self> {
        store.migrate()?;
        Ok(Self {
            store,
            network,
            user_key,
            muun_key,
            rng,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn count_unused(&self) -> Result<usize> {
        self.store.count_unused()
    }

    /// New secrets to register with the server, enough to refill the pool of unused ones.
    pub fn generate_secrets(&mut self) -> Result<Vec<InvoiceSecret<ExtendedPublicKey>>> {
        let unused = self.store.count_unused()?;
        let secrets = generate_secrets(
            &self.user_key.to_public(),
            &self.muun_key,
            unused,
            &mut self.rng,
        )?;
        event!(
            Level::DEBUG,
            unused = unused,
            generated = secrets.len(),
            "generated invoice secrets"
        );
        Ok(secrets)
    }

    /// Stores secrets the server has accepted.
    pub fn persist_secrets(&mut self, secrets: &[InvoiceSecret<ExtendedPublicKey>]) -> Result<()> {
        let records = secrets
            .iter()
            .map(InvoiceSecret::to_registered_record)
            .collect::<Vec<_>>();
        self.store.persist_registered(&records)
    }

    /// Makes a signed invoice from the oldest unused secret. `Ok(None)` when there are no unused
    /// secrets left.
    pub fn create_invoice(
        &mut self,
        route_hints: &RouteHints,
        options: &InvoiceOptions,
    ) -> Result<Option<String>> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        self.create_invoice_at(route_hints, options, now)
    }

    /// Like [`create_invoice`](Self::create_invoice) with `now` as the invoice timestamp.
    pub fn create_invoice_at(
        &mut self,
        route_hints: &RouteHints,
        options: &InvoiceOptions,
        now: Duration,
    ) -> Result<Option<String>> {
        let Self {
            store,
            network,
            user_key,
            rng,
            ..
        } = self;

        store.take_oldest_unused(|record| {
            let issued = issue_invoice(
                *network,
                &*user_key,
                record,
                route_hints,
                options,
                now,
                rng,
            )?;
            Ok((issued.encoded(), issued.record))
        })
    }

    /// The encrypted metadata stored with an invoice, if it has any. Errors if no invoice has
    /// `payment_hash`.
    pub fn get_metadata(&self, payment_hash: &PaymentHash) -> Result<Option<EncryptedMetadata>> {
        let invoice = self
            .store
            .find_by_payment_hash(payment_hash)?
            .ok_or_else(|| anyhow!("no invoice with payment hash {}", payment_hash))?;
        Ok(invoice.metadata)
    }

    pub fn decrypt_metadata(&self, metadata: &EncryptedMetadata) -> Result<OperationMetadata> {
        Ok(decrypt_metadata(&self.user_key, metadata)?)
    }

    pub fn find_invoice(&self, payment_hash: &PaymentHash) -> Result<Option<PersistedInvoice>> {
        self.store.find_by_payment_hash(payment_hash)
    }
}
