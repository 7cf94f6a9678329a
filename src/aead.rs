//! Symmetric cipher: AES-256-GCM with detached tag.
//!
//! Every call to [`encrypt`] draws a fresh 12-byte nonce from the OS RNG.
//! There is no way to pass a nonce in.

use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm, Nonce,
};
use getrandom::getrandom;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;

/// 256-bit symmetric key. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_BYTES]);

impl SymmetricKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Fresh random key (tests, benches, one-off sealing).
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_BYTES];
        getrandom(&mut bytes).map_err(|_| CryptoError::Rng)?;
        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }
}

impl core::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// One ciphertext with its nonce and authentication tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_BYTES],
    tag: [u8; TAG_BYTES],
}

impl EncryptedEnvelope {
    /// Reassemble an envelope from its parts (wire decoding).
    pub fn from_parts(ciphertext: Vec<u8>, nonce: [u8; NONCE_BYTES], tag: [u8; TAG_BYTES]) -> Self {
        Self { ciphertext, nonce, tag }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_BYTES] {
        &self.nonce
    }

    pub fn tag(&self) -> &[u8; TAG_BYTES] {
        &self.tag
    }
}

pub(crate) fn random_nonce() -> Result<[u8; NONCE_BYTES], CryptoError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| CryptoError::Rng)?;
    Ok(n)
}

/// Seal raw bytes under `key` with associated data.
pub(crate) fn seal(key: &SymmetricKey, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedEnvelope, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::InvalidKey("aes key length".into()))?;
    let nonce = random_nonce()?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
        .map_err(|_| CryptoError::InvalidKey("plaintext too long".into()))?;

    let mut tag_bytes = [0u8; TAG_BYTES];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(EncryptedEnvelope {
        ciphertext: buffer,
        nonce,
        tag: tag_bytes,
    })
}

/// Open an envelope. The buffer is wiped if verification fails.
pub(crate) fn open(key: &SymmetricKey, envelope: &EncryptedEnvelope, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::AuthenticationFailure)?;

    let mut buffer = Zeroizing::new(envelope.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.nonce),
            aad,
            buffer.as_mut_slice(),
            GenericArray::from_slice(&envelope.tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(buffer)
}

/// Encrypt a chat message.
pub fn encrypt(plaintext: &str, key: &SymmetricKey) -> Result<EncryptedEnvelope, CryptoError> {
    seal(key, plaintext.as_bytes(), MESSAGE_AAD)
}

/// Decrypt a chat message.
///
/// Fails with [`CryptoError::AuthenticationFailure`] on any tampering or a
/// wrong key; never returns partial plaintext.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<String, CryptoError> {
    let bytes = open(key, envelope, MESSAGE_AAD)?;
    // Authenticated but not UTF-8 means the sender never used `encrypt`.
    String::from_utf8(bytes.to_vec()).map_err(|_| CryptoError::AuthenticationFailure)
}

const MESSAGE_AAD: &[u8] = b"campus-e2ee-v1|msg";
