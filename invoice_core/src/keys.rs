use bitcoin::{
    bip32::{ChildNumber, Xpriv, Xpub},
    secp256k1::{PublicKey, Secp256k1, SecretKey},
    NetworkKind,
};
use core::fmt;

use crate::{
    hdpath::{KeyPath, PathSegment},
    DerivationError,
};

/// A bip32 key that remembers the path it sits at.
///
/// Derivation is always expressed relative to the root, so `derive_to` only accepts paths that
/// extend the key's own path.
pub trait HdKey: Sized {
    fn path(&self) -> &KeyPath;

    fn derive_to(&self, path: &KeyPath) -> Result<Self, DerivationError>;

    fn derived_at(&self, index: u32, hardened: bool) -> Result<Self, DerivationError>;

    fn public_key(&self) -> PublicKey;
}

/// An [`HdKey`] that can also hand out its secret key.
pub trait HdPrivateKey: HdKey {
    fn secret_key(&self) -> SecretKey;
}

fn remaining_steps<'a>(
    from: &KeyPath,
    to: &'a KeyPath,
) -> Result<&'a [PathSegment], DerivationError> {
    to.strip_prefix(from)
        .ok_or_else(|| DerivationError::NotADescendant {
            from: from.to_string(),
            to: to.to_string(),
        })
}

fn child_numbers(steps: &[PathSegment]) -> Result<Vec<ChildNumber>, DerivationError> {
    steps.iter().map(PathSegment::child_number).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    xpub: Xpub,
    path: KeyPath,
}

impl ExtendedPublicKey {
    pub fn new(xpub: Xpub, path: KeyPath) -> Self {
        Self { xpub, path }
    }

    pub fn xpub(&self) -> &Xpub {
        &self.xpub
    }
}

impl HdKey for ExtendedPublicKey {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn derive_to(&self, path: &KeyPath) -> Result<Self, DerivationError> {
        let steps = remaining_steps(&self.path, path)?;
        if let Some(hardened) = steps.iter().find(|segment| segment.is_hardened()) {
            return Err(DerivationError::HardenedFromPublic {
                index: hardened.index(),
            });
        }
        let secp = Secp256k1::verification_only();
        let xpub = self.xpub.derive_pub(&secp, &child_numbers(steps)?)?;
        Ok(Self {
            xpub,
            path: path.clone(),
        })
    }

    fn derived_at(&self, index: u32, hardened: bool) -> Result<Self, DerivationError> {
        if hardened {
            return Err(DerivationError::HardenedFromPublic { index });
        }
        self.derive_to(&self.path.child(index))
    }

    fn public_key(&self) -> PublicKey {
        self.xpub.public_key
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPrivateKey {
    xpriv: Xpriv,
    path: KeyPath,
}

impl ExtendedPrivateKey {
    pub fn new(xpriv: Xpriv, path: KeyPath) -> Self {
        Self { xpriv, path }
    }

    pub fn new_master(
        network: impl Into<NetworkKind>,
        seed: &[u8],
    ) -> Result<Self, DerivationError> {
        Ok(Self {
            xpriv: Xpriv::new_master(network, seed)?,
            path: KeyPath::root(),
        })
    }

    pub fn to_public(&self) -> ExtendedPublicKey {
        let secp = Secp256k1::signing_only();
        ExtendedPublicKey {
            xpub: Xpub::from_priv(&secp, &self.xpriv),
            path: self.path.clone(),
        }
    }

    pub fn xpriv(&self) -> &Xpriv {
        &self.xpriv
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("path", &self.path.to_string())
            .finish_non_exhaustive()
    }
}

impl HdKey for ExtendedPrivateKey {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn derive_to(&self, path: &KeyPath) -> Result<Self, DerivationError> {
        let steps = remaining_steps(&self.path, path)?;
        let secp = Secp256k1::signing_only();
        let xpriv = self.xpriv.derive_priv(&secp, &child_numbers(steps)?)?;
        Ok(Self {
            xpriv,
            path: path.clone(),
        })
    }

    fn derived_at(&self, index: u32, hardened: bool) -> Result<Self, DerivationError> {
        let path = if hardened {
            self.path.hardened_child(index)
        } else {
            self.path.child(index)
        };
        self.derive_to(&path)
    }

    fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        self.xpriv.private_key.public_key(&secp)
    }
}

impl HdPrivateKey for ExtendedPrivateKey {
    fn secret_key(&self) -> SecretKey {
        self.xpriv.private_key
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::Network;

    fn recovery_key() -> ExtendedPrivateKey {
        ExtendedPrivateKey::new_master(Network::Regtest, &[7u8; 32])
            .unwrap()
            .derive_to(&"m/schema:1'/recovery:1'".parse().unwrap())
            .unwrap()
    }

    #[test]
    fn public_and_private_derivation_agree() {
        let xpriv = recovery_key();
        let xpub = xpriv.to_public();
        let target = KeyPath::invoices_base().child(1337).child(42).child(1);

        let from_priv = xpriv.derive_to(&target).unwrap();
        let from_pub = xpub.derive_to(&target).unwrap();

        assert_eq!(from_priv.public_key(), from_pub.public_key());
        assert_eq!(from_pub.path(), &target);
    }

    #[test]
    fn derive_to_matches_rust_bitcoin() {
        let xpriv = recovery_key();
        let secp = Secp256k1::new();
        let expected = xpriv
            .xpriv()
            .derive_priv(
                &secp,
                &[
                    ChildNumber::from_normal_idx(4).unwrap(),
                    ChildNumber::from_normal_idx(9).unwrap(),
                ],
            )
            .unwrap();

        let derived = xpriv.derive_to(&KeyPath::invoices_base().child(9)).unwrap();
        assert_eq!(derived.xpriv(), &expected);
    }

    #[test]
    fn derived_at_extends_the_path() {
        let xpriv = recovery_key();
        let child = xpriv.derived_at(3, false).unwrap().derived_at(5, false).unwrap();
        assert_eq!(child.path().to_string(), "m/schema:1'/recovery:1'/3/5");
    }

    #[test]
    fn public_key_cannot_derive_hardened() {
        let xpub = recovery_key().to_public();
        let target = KeyPath::invoices_base().hardened_child(0);
        assert_eq!(
            xpub.derive_to(&target),
            Err(DerivationError::HardenedFromPublic { index: 0 })
        );
        assert_eq!(
            xpub.derived_at(2, true),
            Err(DerivationError::HardenedFromPublic { index: 2 })
        );
    }

    #[test]
    fn unrelated_path_is_rejected() {
        let xpub = recovery_key().to_public();
        let elsewhere: KeyPath = "m/schema:1'/recovery:2'/4".parse().unwrap();
        assert!(matches!(
            xpub.derive_to(&elsewhere),
            Err(DerivationError::NotADescendant { .. })
        ));
    }

    #[test]
    fn out_of_range_index_fails() {
        let xpriv = recovery_key();
        assert_eq!(
            xpriv.derived_at(1 << 31, false).unwrap_err(),
            DerivationError::IndexOutOfRange { index: 1 << 31 }
        );
    }
}
