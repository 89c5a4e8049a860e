#![allow(dead_code)]
use invoice_wallet::invoice_core::{
    bitcoin::{
        secp256k1::{PublicKey, Secp256k1, SecretKey},
        Network,
    },
    hdpath::KeyPath,
    ExtendedPrivateKey, ExtendedPublicKey, HdKey, PaymentHash, RouteHints,
};
use invoice_wallet::InvoiceWallet;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use rusqlite::Connection;

pub type TestWallet = InvoiceWallet<Connection, ChaCha20Rng>;

pub const NETWORK: Network = Network::Regtest;

fn recovery_key(seed: u8) -> ExtendedPrivateKey {
    let recovery: KeyPath = "m/schema:1'/recovery:1'".parse().unwrap();
    ExtendedPrivateKey::new_master(NETWORK, &[seed; 32])
        .unwrap()
        .derive_to(&recovery)
        .unwrap()
}

pub fn user_key() -> ExtendedPrivateKey {
    recovery_key(1)
}

pub fn muun_key() -> ExtendedPublicKey {
    recovery_key(2).to_public()
}

pub fn route_hints() -> RouteHints {
    let secp = Secp256k1::signing_only();
    let node = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[0x11; 32]).unwrap());
    RouteHints {
        pubkey: node.to_string(),
        fee_base_msat: 1_000,
        fee_proportional_millionths: 100,
        cltv_expiry_delta: 144,
    }
}

pub fn wallet_on(conn: Connection, seed: u8) -> TestWallet {
    InvoiceWallet::new(
        conn,
        NETWORK,
        user_key(),
        muun_key(),
        ChaCha20Rng::from_seed([seed; 32]),
    )
    .unwrap()
}

pub fn memory_wallet(seed: u8) -> TestWallet {
    wallet_on(Connection::open_in_memory().unwrap(), seed)
}

/// Generates and stores secrets until the pool is full. Returns their payment hashes in the
/// order they were stored.
pub fn fill_pool<R: RngCore + CryptoRng>(
    wallet: &mut InvoiceWallet<Connection, R>,
) -> Vec<PaymentHash> {
    let secrets = wallet.generate_secrets().unwrap();
    wallet.persist_secrets(&secrets).unwrap();
    secrets.iter().map(|secret| secret.payment_hash).collect()
}
