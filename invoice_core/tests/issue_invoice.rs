mod common;

use common::*;
use core::{str::FromStr, time::Duration};
use invoice_core::bitcoin::{
    hashes::Hash,
    secp256k1::{ecdsa::RecoverableSignature, Message},
};
use invoice_core::invoice::{
    build_invoice, invoice_features, sign_invoice, DigestSigner, CLTV_EXPIRY_DELTA,
    INVOICE_EXPIRY,
};
use invoice_core::lightning_invoice::{Bolt11Invoice, Bolt11InvoiceDescription, Currency};
use invoice_core::{
    decrypt_metadata, issue_invoice, HdKey, InvoiceError, InvoiceOptions, InvoiceState,
    OperationMetadata, RouteHints, StateError,
};

const NOW: Duration = Duration::from_secs(1_700_000_000);

fn description_of(invoice: &Bolt11Invoice) -> String {
    match invoice.description() {
        Bolt11InvoiceDescription::Direct(description) => description.to_string(),
        Bolt11InvoiceDescription::Hash(_) => panic!("expected a direct description"),
    }
}

#[test]
fn issued_invoice_decodes_to_what_was_asked_for() {
    let (secret, record) = registered(1);
    let options = InvoiceOptions {
        description: "coffee".into(),
        amount_sat: 2_500,
        metadata: None,
    };
    let issued = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &options,
        NOW,
        &mut test_rng(100),
    )
    .unwrap();

    let invoice = Bolt11Invoice::from_str(&issued.encoded()).unwrap();
    assert!(issued.encoded().starts_with("lnbcrt"));
    assert_eq!(invoice.currency(), Currency::Regtest);
    assert_eq!(invoice.payment_hash().to_byte_array(), record.payment_hash.0);
    assert_eq!(invoice.payment_secret().0, record.payment_secret.0);
    assert_eq!(description_of(&invoice), "coffee");
    assert_eq!(invoice.amount_milli_satoshis(), Some(2_500_000));
    assert_eq!(invoice.min_final_cltv_expiry_delta(), CLTV_EXPIRY_DELTA);
    assert_eq!(invoice.expiry_time(), INVOICE_EXPIRY);
    assert_eq!(invoice.duration_since_epoch(), NOW);

    let features = invoice.features().unwrap();
    assert!(features.supports_variable_length_onion());
    assert!(features.supports_payment_secret());
    assert!(!features.requires_variable_length_onion());
    assert!(!features.requires_payment_secret());
    assert_eq!(features, &invoice_features());

    let hints = invoice.route_hints();
    assert_eq!(hints.len(), 1);
    let hop = &hints[0].0[0];
    assert_eq!(hop.src_node_id, route_hints_node());
    assert_eq!(hop.short_channel_id, record.short_channel_id.to_u64());
    assert_eq!(hop.fees.base_msat, 1_000);
    assert_eq!(hop.fees.proportional_millionths, 100);
    assert_eq!(hop.cltv_expiry_delta, 144);

    // signed by the identity key that was handed to the server at registration
    assert_eq!(
        invoice.recover_payee_pub_key(),
        secret.identity_key.public_key()
    );

    assert_eq!(
        issued.record.state,
        InvoiceState::Used {
            used_at: NOW.as_secs()
        }
    );
    assert_eq!(issued.record.amount_sat, 2_500);
    assert_eq!(issued.record.payment_hash, record.payment_hash);
    // the input record is left alone
    assert_eq!(record.state, InvoiceState::Registered);
}

#[test]
fn amountless_invoice_without_description() {
    let (_, record) = registered(2);
    let issued = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &InvoiceOptions::default(),
        NOW,
        &mut test_rng(100),
    )
    .unwrap();

    let invoice = Bolt11Invoice::from_str(&issued.encoded()).unwrap();
    assert_eq!(invoice.amount_milli_satoshis(), None);
    assert_eq!(description_of(&invoice), "");
    assert_eq!(issued.record.amount_sat, 0);
    assert_eq!(issued.record.metadata, None);
}

#[test]
fn description_alone_produces_metadata() {
    let (_, record) = registered(3);
    let options = InvoiceOptions {
        description: "rent".into(),
        ..Default::default()
    };
    let issued = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &options,
        NOW,
        &mut test_rng(100),
    )
    .unwrap();

    let metadata = decrypt_metadata(&user_key(), issued.record.metadata.as_ref().unwrap()).unwrap();
    assert_eq!(
        metadata,
        OperationMetadata {
            invoice: issued.encoded(),
            lnurl_sender: String::new(),
        }
    );
}

#[test]
fn explicit_metadata_gets_the_invoice_filled_in() {
    let (_, record) = registered(4);
    let options = InvoiceOptions {
        description: String::new(),
        amount_sat: 10,
        metadata: Some(OperationMetadata {
            invoice: "to be replaced".into(),
            lnurl_sender: "alice@example.com".into(),
        }),
    };
    let issued = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &options,
        NOW,
        &mut test_rng(100),
    )
    .unwrap();

    let metadata = decrypt_metadata(&user_key(), issued.record.metadata.as_ref().unwrap()).unwrap();
    assert_eq!(metadata.invoice, issued.encoded());
    assert_eq!(metadata.lnurl_sender, "alice@example.com");

    // only the holder of the user key can read it
    let other_key = invoice_core::ExtendedPrivateKey::new_master(NETWORK, &[9u8; 32])
        .unwrap()
        .derive_to(&recovery_path())
        .unwrap();
    assert!(decrypt_metadata(&other_key, issued.record.metadata.as_ref().unwrap()).is_err());
}

#[test]
fn bad_route_hint_pubkey_is_reported() {
    let (_, record) = registered(5);
    for pubkey in ["", "zz", "02deadbeef"] {
        let hints = RouteHints {
            pubkey: pubkey.into(),
            ..route_hints()
        };
        let result = issue_invoice(
            NETWORK,
            &user_key(),
            &record,
            &hints,
            &InvoiceOptions::default(),
            NOW,
            &mut test_rng(100),
        );
        assert!(matches!(result, Err(InvoiceError::RouteHintPubkey(_))));
    }
}

#[test]
fn used_record_cannot_be_issued_again() {
    let (_, record) = registered(6);
    let issued = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &InvoiceOptions::default(),
        NOW,
        &mut test_rng(100),
    )
    .unwrap();

    let again = issue_invoice(
        NETWORK,
        &user_key(),
        &issued.record,
        &route_hints(),
        &InvoiceOptions::default(),
        NOW,
        &mut test_rng(101),
    );
    assert!(matches!(
        again,
        Err(InvoiceError::State(StateError::AlreadyUsed))
    ));
}

#[test]
fn oversized_amount_is_rejected() {
    let (_, record) = registered(7);
    let options = InvoiceOptions {
        amount_sat: u64::MAX,
        ..Default::default()
    };
    let result = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &options,
        NOW,
        &mut test_rng(100),
    );
    assert!(matches!(
        result,
        Err(InvoiceError::AmountOverflow {
            amount_sat: u64::MAX
        })
    ));
}

#[test]
fn overlong_description_is_a_creation_error() {
    let (_, record) = registered(8);
    let options = InvoiceOptions {
        description: "x".repeat(1_000),
        ..Default::default()
    };
    let result = issue_invoice(
        NETWORK,
        &user_key(),
        &record,
        &route_hints(),
        &options,
        NOW,
        &mut test_rng(100),
    );
    assert!(matches!(result, Err(InvoiceError::Creation(_))));
}

struct BrokenSigner;

impl DigestSigner for BrokenSigner {
    fn sign_digest_compact(
        &self,
        _digest: &Message,
    ) -> Result<RecoverableSignature, invoice_core::bitcoin::secp256k1::Error> {
        Err(invoice_core::bitcoin::secp256k1::Error::InvalidSecretKey)
    }
}

#[test]
fn signer_failure_is_reported() {
    let (_, record) = registered(9);
    let raw = build_invoice(
        NETWORK,
        &record,
        &route_hints(),
        &InvoiceOptions::default(),
        NOW,
    )
    .unwrap();
    assert!(matches!(
        sign_invoice(raw, &BrokenSigner),
        Err(InvoiceError::Signing(_))
    ));
}
