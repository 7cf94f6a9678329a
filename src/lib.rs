//! # Campus E2EE
//!
//! End-to-end encryption primitives for one-to-one campus chat.
//!
//! ## Quick Start
//!
//! ```rust
//! use campus_e2ee::{derive_shared_key, encrypt, decrypt, wire, KeyPair};
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! let k_ab = derive_shared_key(&alice, bob.public_key()).unwrap();
//! let k_ba = derive_shared_key(&bob, alice.public_key()).unwrap();
//!
//! let text = wire::serialize(&encrypt("hello", &k_ab).unwrap()).unwrap();
//! assert!(wire::is_encrypted(&text));
//!
//! let envelope = wire::parse(&text).unwrap();
//! assert_eq!(decrypt(&envelope, &k_ba).unwrap(), "hello");
//! ```
//!
//! ## Building Blocks
//!
//! - **Cipher**: AES-256-GCM, random 96-bit nonce per call, 128-bit tag
//! - **Key agreement**: X25519 + HKDF-SHA256
//! - **At-rest wrap**: PBKDF2-HMAC-SHA256 + AES-256-GCM
//! - **Wire**: compact JSON `{ct, iv, tag}`, plaintext-tolerant detection
//!
//! ## What's NOT Provided
//!
//! - Session state, key storage, directories (see `campus-e2ee-session`)
//! - Ratcheting or group keys

#![deny(unsafe_code)]

mod error;

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod wire;
pub mod wrap;

pub use aead::{decrypt, encrypt, EncryptedEnvelope, SymmetricKey};
pub use error::CryptoError;
pub use kdf::derive_shared_key;
pub use keys::{export_public_key, import_public_key, KeyPair, PublicKey};
pub use wrap::{decrypt_private_key, encrypt_private_key, KdfParams};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
