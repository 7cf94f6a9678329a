//! Unified error type for the E2EE primitives.

use thiserror::Error;

/// Failures of the cipher, key, derivation, wrap and wire layers.
///
/// Decrypt-side failures stay coarse on purpose: a tag mismatch, a wrong key
/// and a truncated ciphertext all surface as [`CryptoError::AuthenticationFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// AEAD tag did not verify. No plaintext is released.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Password-wrapped private key could not be opened.
    #[error("wrong password or corrupt private key")]
    WrongPasswordOrCorruptKey,

    /// Key material has the wrong length or encoding.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Envelope text is not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The OS random source failed.
    #[error("random number generator unavailable")]
    Rng,

    /// HKDF or PBKDF2 rejected its parameters.
    #[error("key derivation failed")]
    KeyDerivation,
}
