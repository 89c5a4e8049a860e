use rand_core::{CryptoRng, RngCore};

use crate::{
    hdpath::KeyPath,
    keys::HdKey,
    record::{InvoiceState, PersistedInvoice},
    types::{PaymentHash, PaymentSecret, Preimage, ShortChannelId},
    DerivationError,
};

/// How many registered-but-unused secrets the wallet keeps around.
pub const MAX_UNUSED_SECRETS: usize = 5;

pub const IDENTITY_KEY_CHILD_INDEX: u32 = 0;
pub const HTLC_KEY_CHILD_INDEX: u32 = 1;
pub const ENCRYPTED_METADATA_KEY_CHILD_INDEX: u32 = 3;

const INDEX_MASK: u32 = 0x7FFF_FFFF;

/// The secrets needed to receive one lightning payment. They have to be registered with the
/// remote server and then persisted before an invoice can be made from them.
#[derive(Clone, Debug)]
pub struct InvoiceSecret<K> {
    preimage: Preimage,
    payment_secret: PaymentSecret,
    key_path: KeyPath,
    pub payment_hash: PaymentHash,
    pub identity_key: K,
    pub user_htlc_key: K,
    pub muun_htlc_key: K,
    pub short_channel_id: ShortChannelId,
}

impl<K> InvoiceSecret<K> {
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    /// The record to store once the server has accepted this secret.
    pub fn to_registered_record(&self) -> PersistedInvoice {
        PersistedInvoice {
            preimage: self.preimage,
            payment_hash: self.payment_hash,
            payment_secret: self.payment_secret,
            key_path: self.key_path.clone(),
            short_channel_id: self.short_channel_id,
            state: InvoiceState::Registered,
            amount_sat: 0,
            metadata: None,
        }
    }
}

/// Generates enough fresh secrets to top the pool back up to [`MAX_UNUSED_SECRETS`].
///
/// `user_key` and `muun_key` must both sit at a path the invoice base path extends (e.g.
/// `m/schema:1'/recovery:1'`). If any derivation fails nothing is returned.
pub fn generate_secrets<K: HdKey>(
    user_key: &K,
    muun_key: &K,
    unused: usize,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<InvoiceSecret<K>>, DerivationError> {
    let needed = MAX_UNUSED_SECRETS.saturating_sub(unused);
    let base = KeyPath::invoices_base();
    (0..needed)
        .map(|_| generate_secret(user_key, muun_key, &base, rng))
        .collect()
}

fn generate_secret<K: HdKey>(
    user_key: &K,
    muun_key: &K,
    base: &KeyPath,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<InvoiceSecret<K>, DerivationError> {
    let mut preimage = [0u8; 32];
    rng.fill_bytes(&mut preimage);
    let preimage = Preimage(preimage);

    let mut payment_secret = [0u8; 32];
    rng.fill_bytes(&mut payment_secret);

    let mut levels = [0u8; 8];
    rng.fill_bytes(&mut levels);
    let l1 = u32::from_le_bytes(levels[..4].try_into().expect("4 bytes")) & INDEX_MASK;
    let l2 = u32::from_le_bytes(levels[4..].try_into().expect("4 bytes")) & INDEX_MASK;

    let key_path = base.child(l1).child(l2);

    let identity_key = user_key.derive_to(&key_path.child(IDENTITY_KEY_CHILD_INDEX))?;

    // both parties derive their HTLC key at the same path so the server can rebuild the script
    let htlc_key_path = key_path.child(HTLC_KEY_CHILD_INDEX);
    let user_htlc_key = user_key.derive_to(&htlc_key_path)?;
    let muun_htlc_key = muun_key.derive_to(&htlc_key_path)?;

    let mut short_channel_id = [0u8; 8];
    rng.fill_bytes(&mut short_channel_id);
    let short_channel_id = ShortChannelId::synthetic(u64::from_le_bytes(short_channel_id));

    Ok(InvoiceSecret {
        payment_hash: preimage.payment_hash(),
        preimage,
        payment_secret: PaymentSecret(payment_secret),
        key_path,
        identity_key,
        user_htlc_key,
        muun_htlc_key,
        short_channel_id,
    })
}
