use bitcoin::{
    secp256k1::{ecdsa::RecoverableSignature, Message, PublicKey, Secp256k1, SecretKey},
    Network,
};
use core::{str::FromStr, time::Duration};
use lightning_invoice::{
    Bolt11Invoice, Currency, InvoiceBuilder, RawBolt11Invoice, RawTaggedField, RouteHint,
    RouteHintHop, RoutingFees, TaggedField,
};
use lightning_types::features::Bolt11InvoiceFeatures;
use rand_core::{CryptoRng, RngCore};
use tracing::{event, Level};

use crate::{
    keys::{HdKey, HdPrivateKey},
    metadata::{encrypt_metadata, OperationMetadata},
    record::PersistedInvoice,
    secrets::IDENTITY_KEY_CHILD_INDEX,
    InvoiceError,
};

/// `min_final_cltv_expiry_delta` of every invoice (about half a day of blocks).
pub const CLTV_EXPIRY_DELTA: u64 = 72;

/// How long an invoice can be paid for.
pub const INVOICE_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// What the remote server tells us about the hop between it and our node. Our node isn't
/// announced so every invoice carries exactly one route hint built from this.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHints {
    /// hex encoded node id of the server's node
    pub pubkey: String,
    pub fee_base_msat: u32,
    pub fee_proportional_millionths: u32,
    pub cltv_expiry_delta: u16,
}

impl RouteHints {
    pub fn node_id(&self) -> Result<PublicKey, InvoiceError> {
        PublicKey::from_str(&self.pubkey).map_err(InvoiceError::RouteHintPubkey)
    }

    fn to_route_hint(&self, record: &PersistedInvoice) -> Result<RouteHint, InvoiceError> {
        Ok(RouteHint(vec![RouteHintHop {
            src_node_id: self.node_id()?,
            short_channel_id: record.short_channel_id.to_u64(),
            fees: RoutingFees {
                base_msat: self.fee_base_msat,
                proportional_millionths: self.fee_proportional_millionths,
            },
            cltv_expiry_delta: self.cltv_expiry_delta,
            htlc_minimum_msat: None,
            htlc_maximum_msat: None,
        }]))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvoiceOptions {
    pub description: String,
    /// 0 makes an amountless invoice
    pub amount_sat: u64,
    pub metadata: Option<OperationMetadata>,
}

impl InvoiceOptions {
    /// The metadata to store alongside the record once `invoice` has been issued. Explicit
    /// metadata gets the invoice filled in. Otherwise a description alone is enough to keep the
    /// invoice around.
    pub fn metadata_for(&self, invoice: &str) -> Option<OperationMetadata> {
        match &self.metadata {
            Some(metadata) => Some(OperationMetadata {
                invoice: invoice.to_string(),
                ..metadata.clone()
            }),
            None if !self.description.is_empty() => Some(OperationMetadata {
                invoice: invoice.to_string(),
                ..Default::default()
            }),
            None => None,
        }
    }
}

/// Produces the compact recoverable signature over an invoice's digest.
pub trait DigestSigner {
    fn sign_digest_compact(
        &self,
        digest: &Message,
    ) -> Result<RecoverableSignature, bitcoin::secp256k1::Error>;
}

/// Signs with the identity key of a single invoice secret.
pub struct NodeSigner {
    secret_key: SecretKey,
}

impl NodeSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        Self { secret_key }
    }
}

impl DigestSigner for NodeSigner {
    fn sign_digest_compact(
        &self,
        digest: &Message,
    ) -> Result<RecoverableSignature, bitcoin::secp256k1::Error> {
        let secp = Secp256k1::signing_only();
        Ok(secp.sign_ecdsa_recoverable(digest, &self.secret_key))
    }
}

/// Lays out the unsigned invoice for `record`.
pub fn build_invoice(
    network: Network,
    record: &PersistedInvoice,
    route_hints: &RouteHints,
    options: &InvoiceOptions,
    now: Duration,
) -> Result<RawBolt11Invoice, InvoiceError> {
    let mut builder = InvoiceBuilder::new(Currency::from(network))
        .description(options.description.clone())
        .payment_hash(record.payment_hash.to_sha256())
        .payment_secret(record.payment_secret.to_lightning())
        .duration_since_epoch(now)
        .min_final_cltv_expiry_delta(CLTV_EXPIRY_DELTA)
        .expiry_time(INVOICE_EXPIRY)
        .private_route(route_hints.to_route_hint(record)?);

    if options.amount_sat != 0 {
        let amount_msat = options
            .amount_sat
            .checked_mul(1_000)
            .ok_or(InvoiceError::AmountOverflow {
                amount_sat: options.amount_sat,
            })?;
        builder = builder.amount_milli_satoshis(amount_msat);
    }

    let mut raw = builder.build_raw().map_err(InvoiceError::Creation)?;

    // the builder marks var_onion_optin and payment_secret as required
    for field in raw.data.tagged_fields.iter_mut() {
        if let RawTaggedField::KnownSemantics(TaggedField::Features(features)) = field {
            *features = invoice_features();
        }
    }

    Ok(raw)
}

/// Feature bits of every invoice: TLV onion payloads and payment secrets, both optional.
pub fn invoice_features() -> Bolt11InvoiceFeatures {
    let mut features = Bolt11InvoiceFeatures::empty();
    features.set_variable_length_onion_optional();
    features.set_payment_secret_optional();
    features
}

pub fn sign_invoice(
    raw: RawBolt11Invoice,
    signer: &impl DigestSigner,
) -> Result<Bolt11Invoice, InvoiceError> {
    let signed = raw
        .sign(|digest| signer.sign_digest_compact(digest))
        .map_err(InvoiceError::Signing)?;
    Bolt11Invoice::from_signed(signed).map_err(InvoiceError::Encoding)
}

/// A signed invoice together with the record that has to be saved for it.
#[derive(Clone, Debug)]
pub struct IssuedInvoice {
    pub invoice: Bolt11Invoice,
    pub record: PersistedInvoice,
}

impl IssuedInvoice {
    pub fn encoded(&self) -> String {
        self.invoice.to_string()
    }
}

/// Turns a registered secret into a signed invoice and returns the record marked as used.
///
/// The identity key is re-derived from `user_key` at the record's key path; it is never stored.
/// `record` itself is left untouched so a failure at any step leaves nothing to roll back.
pub fn issue_invoice<K: HdPrivateKey>(
    network: Network,
    user_key: &K,
    record: &PersistedInvoice,
    route_hints: &RouteHints,
    options: &InvoiceOptions,
    now: Duration,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<IssuedInvoice, InvoiceError> {
    record.ensure_unused()?;

    let raw = build_invoice(network, record, route_hints, options, now)?;

    let identity_key = user_key.derive_to(&record.key_path.child(IDENTITY_KEY_CHILD_INDEX))?;
    let invoice = sign_invoice(raw, &NodeSigner::new(identity_key.secret_key()))?;
    let encoded = invoice.to_string();

    let metadata = match options.metadata_for(&encoded) {
        Some(metadata) => Some(encrypt_metadata(user_key, &metadata, rng)?),
        None => None,
    };

    let mut record = record.clone();
    record.mark_used(options.amount_sat, now.as_secs(), metadata)?;

    event!(
        Level::INFO,
        payment_hash = record.payment_hash.to_string(),
        amount_sat = options.amount_sat,
        with_metadata = record.metadata.is_some(),
        "issued invoice"
    );

    Ok(IssuedInvoice { invoice, record })
}
