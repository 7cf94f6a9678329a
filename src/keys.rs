//! X25519 identity key pairs.
//!
//! Encoding:
//!   public  = base64(x25519_pk[32])
//!   private = base64(x25519_sk[32])
//!
//! The private encoding is crate-internal: it only ever flows into the
//! password wrapper (`wrap`).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::OsRng;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const X25519_KEY_BYTES: usize = 32;

/// Bytes of SHA3-256 kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Public key
// ---------------------------------------------------------------------------

/// A peer's (or our own) shareable X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(X25519PublicKey);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; X25519_KEY_BYTES] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; X25519_KEY_BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("public key must be {} bytes, got {}", X25519_KEY_BYTES, bytes.len())))?;
        Ok(Self(X25519PublicKey::from(raw)))
    }

    /// Constant-time equality on the raw encoding.
    pub fn ct_eq(&self, other: &PublicKey) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }

    /// Short human-comparable digest, e.g. `"a1b2 c3d4 ..."`.
    pub fn fingerprint(&self) -> String {
        let digest = Sha3_256::digest(self.0.as_bytes());
        let hex = hex::encode(&digest[..FINGERPRINT_BYTES]);
        hex.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn inner(&self) -> &X25519PublicKey {
        &self.0
    }
}

impl core::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

// ---------------------------------------------------------------------------
// Key pair
// ---------------------------------------------------------------------------

/// A local identity. The secret half zeroizes on drop.
pub struct KeyPair {
    public: PublicKey,
    secret: StaticSecret,
}

impl KeyPair {
    /// Generate a fresh identity from the OS RNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey(X25519PublicKey::from(&secret));
        Self { public, secret }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    pub(crate) fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; X25519_KEY_BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("private key must be {} bytes, got {}", X25519_KEY_BYTES, bytes.len())))?;
        let raw = Zeroizing::new(raw);
        let secret = StaticSecret::from(*raw);
        let public = PublicKey(X25519PublicKey::from(&secret));
        Ok(Self { public, secret })
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Portable encodings
// ---------------------------------------------------------------------------

pub fn export_public_key(key: &PublicKey) -> String {
    STANDARD.encode(key.to_bytes())
}

pub fn import_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("public key base64: {}", e)))?;
    PublicKey::from_bytes(&bytes)
}

pub(crate) fn export_private_key(pair: &KeyPair) -> Zeroizing<String> {
    let raw = Zeroizing::new(pair.secret.to_bytes());
    Zeroizing::new(STANDARD.encode(raw.as_slice()))
}

pub(crate) fn import_private_key(encoded: &str) -> Result<KeyPair, CryptoError> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidKey("private key base64".into()))?,
    );
    KeyPair::from_secret_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_roundtrip() {
        let pair = KeyPair::generate();
        let encoded = export_public_key(pair.public_key());
        let decoded = import_public_key(&encoded).unwrap();
        assert_eq!(&decoded, pair.public_key());
        assert_eq!(export_public_key(&decoded), encoded);
    }

    #[test]
    fn private_key_roundtrip() {
        let pair = KeyPair::generate();
        let encoded = export_private_key(&pair);
        let restored = import_private_key(&encoded).unwrap();
        assert_eq!(restored.public_key(), pair.public_key());
        assert_eq!(*export_private_key(&restored), *encoded);
    }

    #[test]
    fn fresh_pairs_differ() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn import_rejects_wrong_length() {
        let short = STANDARD.encode([1u8; 31]);
        assert!(matches!(import_public_key(&short), Err(CryptoError::InvalidKey(_))));
        assert!(matches!(import_public_key("not base64!!"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn fingerprint_format() {
        let pair = KeyPair::generate();
        let fp = pair.public_key().fingerprint();
        let groups: Vec<&str> = fp.split(' ').collect();
        assert_eq!(groups.len(), 8);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn ct_eq_matches_eq() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert!(a.public_key().ct_eq(a.public_key()));
        assert!(!a.public_key().ct_eq(b.public_key()));
    }

    #[test]
    fn debug_hides_secret() {
        let pair = KeyPair::generate();
        let dbg = format!("{:?}", pair);
        assert!(dbg.contains("KeyPair"));
        assert!(!dbg.contains(&*export_private_key(&pair)));
    }
}
