use bitcoin::{
    hashes::Hash,
    secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1},
    sighash::{EcdsaSighashType, SighashCache},
    Amount, Script, Transaction,
};
use core::borrow::Borrow;

use crate::VerifyError;

/// Checks a DER encoded `SIGHASH_ALL` signature over the BIP143 digest of input `input_index`,
/// with `script` as the script code and `amount` as the value of the output being spent.
///
/// High-S signatures are accepted.
pub fn verify_witness_signature<T: Borrow<Transaction>>(
    sighash_cache: &mut SighashCache<T>,
    input_index: usize,
    amount: Amount,
    script: &Script,
    signature: &[u8],
    public_key: &PublicKey,
) -> Result<(), VerifyError> {
    let sighash = sighash_cache
        .p2wsh_signature_hash(input_index, script, amount, EcdsaSighashType::All)
        .map_err(VerifyError::Sighash)?;

    let mut signature = Signature::from_der(signature).map_err(VerifyError::MalformedSignature)?;
    signature.normalize_s();

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(sighash.to_byte_array());
    secp.verify_ecdsa(&message, &signature, public_key)
        .map_err(|_| VerifyError::DoesNotVerify)
}
