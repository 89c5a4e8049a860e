use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305,
};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// ChaCha20Poly1305 ciphertext of arbitrary length with its nonce and tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    nonce: [u8; NONCE_LEN],
    data: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl Ciphertext {
    pub fn encrypt(
        encryption_key: SymmetricKey,
        plaintext: &[u8],
        associated_data: &[u8],
        rng: &mut impl rand_core::RngCore,
    ) -> Result<Self, chacha20poly1305::Error> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let cipher = ChaCha20Poly1305::new(&encryption_key.0.into());
        let mut data = plaintext.to_vec();
        let tag = cipher.encrypt_in_place_detached(&nonce.into(), associated_data, &mut data[..])?;

        Ok(Self {
            nonce,
            data,
            tag: tag.into(),
        })
    }

    pub fn decrypt(&self, encryption_key: SymmetricKey, associated_data: &[u8]) -> Option<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(&encryption_key.0.into());
        let mut plaintext = self.data.clone();
        cipher
            .decrypt_in_place_detached(
                &self.nonce.into(),
                associated_data,
                &mut plaintext[..],
                &self.tag.into(),
            )
            .ok()?;
        Some(plaintext)
    }

    /// `nonce || data || tag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_LEN + self.data.len() + TAG_LEN);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.data);
        bytes.extend_from_slice(&self.tag);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (data, tag) = rest.split_at(rest.len() - TAG_LEN);
        Some(Self {
            nonce: nonce.try_into().ok()?,
            data: data.to_vec(),
            tag: tag.try_into().ok()?,
        })
    }
}

#[derive(Clone, Copy)]
pub struct SymmetricKey(pub [u8; 32]);
