#![allow(dead_code)]
use invoice_core::bitcoin::{
    secp256k1::{PublicKey, Secp256k1, SecretKey},
    Network,
};
use invoice_core::{
    generate_secrets, hdpath::KeyPath, DerivationError, ExtendedPrivateKey, ExtendedPublicKey,
    HdKey, InvoiceSecret, PersistedInvoice, RouteHints,
};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use std::{cell::Cell, rc::Rc};

pub const NETWORK: Network = Network::Regtest;

pub fn recovery_path() -> KeyPath {
    "m/schema:1'/recovery:1'".parse().unwrap()
}

pub fn user_key() -> ExtendedPrivateKey {
    ExtendedPrivateKey::new_master(NETWORK, &[1u8; 32])
        .unwrap()
        .derive_to(&recovery_path())
        .unwrap()
}

pub fn muun_key() -> ExtendedPrivateKey {
    ExtendedPrivateKey::new_master(NETWORK, &[2u8; 32])
        .unwrap()
        .derive_to(&recovery_path())
        .unwrap()
}

pub fn route_hints_node() -> PublicKey {
    let secp = Secp256k1::signing_only();
    PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[0x11; 32]).unwrap())
}

pub fn route_hints() -> RouteHints {
    RouteHints {
        pubkey: route_hints_node().to_string(),
        fee_base_msat: 1_000,
        fee_proportional_millionths: 100,
        cltv_expiry_delta: 144,
    }
}

pub fn test_rng(seed: u8) -> ChaCha20Rng {
    ChaCha20Rng::from_seed([seed; 32])
}

/// A freshly registered record along with the secret it was made from
pub fn registered(seed: u8) -> (InvoiceSecret<ExtendedPublicKey>, PersistedInvoice) {
    let secret = generate_secrets(
        &user_key().to_public(),
        &muun_key().to_public(),
        invoice_core::MAX_UNUSED_SECRETS - 1,
        &mut test_rng(seed),
    )
    .unwrap()
    .remove(0);
    let record = secret.to_registered_record();
    (secret, record)
}

/// Derives normally until its shared budget runs out, then fails every derivation.
#[derive(Clone, Debug)]
pub struct BudgetKey {
    inner: ExtendedPublicKey,
    budget: Rc<Cell<usize>>,
}

impl BudgetKey {
    pub fn new(inner: ExtendedPublicKey, budget: Rc<Cell<usize>>) -> Self {
        Self { inner, budget }
    }
}

impl HdKey for BudgetKey {
    fn path(&self) -> &KeyPath {
        self.inner.path()
    }

    fn derive_to(&self, path: &KeyPath) -> Result<Self, DerivationError> {
        let remaining = self.budget.get();
        if remaining == 0 {
            return Err(DerivationError::IndexOutOfRange { index: u32::MAX });
        }
        self.budget.set(remaining - 1);
        Ok(Self {
            inner: self.inner.derive_to(path)?,
            budget: self.budget.clone(),
        })
    }

    fn derived_at(&self, index: u32, hardened: bool) -> Result<Self, DerivationError> {
        let path = if hardened {
            self.path().hardened_child(index)
        } else {
            self.path().child(index)
        };
        self.derive_to(&path)
    }

    fn public_key(&self) -> PublicKey {
        self.inner.public_key()
    }
}
