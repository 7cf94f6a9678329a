//! Password-based private-key wrapping (at-rest storage).
//!
//! wrapping_key = PBKDF2-HMAC-SHA256(password, salt, iterations, 32)
//! blob         = base64(salt[16] || nonce[12] || ciphertext || tag[16])
//!
//! The plaintext under the wrapping key is the portable private-key
//! encoding. The iteration count is not stored in the blob.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use getrandom::getrandom;
use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::{self, EncryptedEnvelope, SymmetricKey, KEY_BYTES, NONCE_BYTES, TAG_BYTES};
use crate::error::CryptoError;
use crate::keys::{self, KeyPair};

pub const SALT_BYTES: usize = 16;

/// Default PBKDF2 round count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Smallest salt || nonce || tag blob (empty ciphertext).
pub const MIN_WRAPPED_BYTES: usize = SALT_BYTES + NONCE_BYTES + TAG_BYTES;

const WRAP_AAD: &[u8] = b"campus-e2ee-v1|wrap";

/// PBKDF2 tuning. Must be identical for wrap and unwrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

fn wrapping_key(password: &str, salt: &[u8; SALT_BYTES], params: KdfParams) -> Result<SymmetricKey, CryptoError> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation);
    }
    let mut out = Zeroizing::new([0u8; KEY_BYTES]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, params.iterations, &mut out[..])
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(SymmetricKey::from_bytes(*out))
}

/// Encrypt `pair`'s private key under `password`.
pub fn encrypt_private_key(pair: &KeyPair, password: &str, params: KdfParams) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_BYTES];
    getrandom(&mut salt).map_err(|_| CryptoError::Rng)?;

    let key = wrapping_key(password, &salt, params)?;
    let encoded = keys::export_private_key(pair);
    let sealed = aead::seal(&key, encoded.as_bytes(), WRAP_AAD)?;

    let mut blob = Vec::with_capacity(MIN_WRAPPED_BYTES + sealed.ciphertext().len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(sealed.nonce());
    blob.extend_from_slice(sealed.ciphertext());
    blob.extend_from_slice(sealed.tag());
    Ok(STANDARD.encode(blob))
}

/// Reverse of [`encrypt_private_key`]. Every failure is
/// [`CryptoError::WrongPasswordOrCorruptKey`].
pub fn decrypt_private_key(wrapped: &str, password: &str, params: KdfParams) -> Result<KeyPair, CryptoError> {
    let blob = STANDARD
        .decode(wrapped.trim())
        .map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
    if blob.len() < MIN_WRAPPED_BYTES {
        return Err(CryptoError::WrongPasswordOrCorruptKey);
    }

    let (salt, rest) = blob.split_at(SALT_BYTES);
    let (nonce, rest) = rest.split_at(NONCE_BYTES);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_BYTES);

    let salt: [u8; SALT_BYTES] = salt.try_into().map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
    let nonce: [u8; NONCE_BYTES] = nonce.try_into().map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
    let tag: [u8; TAG_BYTES] = tag.try_into().map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;

    let key = wrapping_key(password, &salt, params).map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
    let sealed = EncryptedEnvelope::from_parts(ciphertext.to_vec(), nonce, tag);
    let encoded = aead::open(&key, &sealed, WRAP_AAD).map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;

    let encoded = core::str::from_utf8(&encoded).map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
    keys::import_private_key(encoded).map_err(|_| CryptoError::WrongPasswordOrCorruptKey)
}
