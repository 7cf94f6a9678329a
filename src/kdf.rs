//! Shared-secret derivation.
//!
//! dh  = X25519(my_secret, peer_public)
//! key = HKDF-SHA256(dh, salt=None, info=PROTOCOL_ID || b"|msg", len=32)
//!
//! Nothing here is persisted; callers cache the result in memory.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::{SymmetricKey, KEY_BYTES};
use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Protocol identifier for KDF domain separation.
pub const PROTOCOL_ID: &[u8] = b"campus-e2ee-v1";

/// Derive the symmetric key shared between `mine` and the owner of `peer`.
///
/// `derive_shared_key(a, b.pub) == derive_shared_key(b, a.pub)`.
pub fn derive_shared_key(mine: &KeyPair, peer: &PublicKey) -> Result<SymmetricKey, CryptoError> {
    let dh = mine.secret().diffie_hellman(peer.inner());
    if !dh.was_contributory() {
        return Err(CryptoError::InvalidKey("peer public key is a low-order point".into()));
    }

    let mut info = Vec::with_capacity(PROTOCOL_ID.len() + 4);
    info.extend_from_slice(PROTOCOL_ID);
    info.extend_from_slice(b"|msg");

    let hk = Hkdf::<Sha256>::new(None, dh.as_bytes());
    let mut out = Zeroizing::new([0u8; KEY_BYTES]);
    hk.expand(&info, &mut out[..]).map_err(|_| CryptoError::KeyDerivation)?;
    Ok(SymmetricKey::from_bytes(*out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead;

    #[test]
    fn agreement_is_symmetric() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let ab = derive_shared_key(&a, b.public_key()).unwrap();
        let ba = derive_shared_key(&b, a.public_key()).unwrap();
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let k1 = derive_shared_key(&a, b.public_key()).unwrap();
        let k2 = derive_shared_key(&a, b.public_key()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_peers_different_keys() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();
        let ab = derive_shared_key(&a, b.public_key()).unwrap();
        let ac = derive_shared_key(&a, c.public_key()).unwrap();
        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn low_order_point_rejected() {
        let a = KeyPair::generate();
        let zero = PublicKey::from_bytes(&[0u8; 32]).unwrap();
        assert!(matches!(derive_shared_key(&a, &zero), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn derived_key_feeds_cipher() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let ab = derive_shared_key(&a, b.public_key()).unwrap();
        let ba = derive_shared_key(&b, a.public_key()).unwrap();
        let env = aead::encrypt("ping", &ab).unwrap();
        assert_eq!(aead::decrypt(&env, &ba).unwrap(), "ping");
    }
}
