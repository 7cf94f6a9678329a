//! Session configuration: degradation, recovery and key-change policies.
//!
//! Environment variables (all optional):
//!   CAMPUS_E2EE_FALLBACK          open | closed          (default open)
//!   CAMPUS_E2EE_RECOVERY          regenerate | strict    (default regenerate)
//!   CAMPUS_E2EE_PEER_KEY_CHANGE   accept | reject        (default accept)
//!   CAMPUS_E2EE_KDF_ITERATIONS    integer >= 100000      (default 100000)

use campus_e2ee::wrap::DEFAULT_ITERATIONS;
use campus_e2ee::KdfParams;

use crate::error::SessionError;

/// What to do when a message cannot be encrypted or decrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Encrypt returns the plaintext, decrypt returns the raw payload.
    #[default]
    FailOpen,
    /// Errors surface to the caller.
    FailClosed,
}

/// What to do when the stored identity cannot be unwrapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Replace it with a fresh identity. Old messages become unreadable.
    #[default]
    Regenerate,
    /// Refuse with `SessionError::WrongPassword`; leave storage untouched.
    Strict,
}

/// What to do when a peer presents a key different from the one on record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PeerKeyChangePolicy {
    /// Re-derive against the new key and emit `PeerKeyChanged`.
    #[default]
    AcceptAndNotify,
    /// Keep the old key and return `SessionError::PeerKeyChanged`.
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub fallback: FallbackPolicy,
    pub recovery: RecoveryPolicy,
    pub peer_key_change: PeerKeyChangePolicy,
    pub kdf: KdfParams,
}

impl SessionConfig {
    /// Read overrides from `CAMPUS_E2EE_*`. Unset variables keep defaults;
    /// unrecognized values are errors.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let mut config = Self::default();

        if let Some(v) = get("CAMPUS_E2EE_FALLBACK") {
            config.fallback = match v.trim().to_ascii_lowercase().as_str() {
                "open" => FallbackPolicy::FailOpen,
                "closed" => FallbackPolicy::FailClosed,
                other => return Err(SessionError::Config(format!("CAMPUS_E2EE_FALLBACK: {:?}", other))),
            };
        }

        if let Some(v) = get("CAMPUS_E2EE_RECOVERY") {
            config.recovery = match v.trim().to_ascii_lowercase().as_str() {
                "regenerate" => RecoveryPolicy::Regenerate,
                "strict" => RecoveryPolicy::Strict,
                other => return Err(SessionError::Config(format!("CAMPUS_E2EE_RECOVERY: {:?}", other))),
            };
        }

        if let Some(v) = get("CAMPUS_E2EE_PEER_KEY_CHANGE") {
            config.peer_key_change = match v.trim().to_ascii_lowercase().as_str() {
                "accept" => PeerKeyChangePolicy::AcceptAndNotify,
                "reject" => PeerKeyChangePolicy::Reject,
                other => {
                    return Err(SessionError::Config(format!("CAMPUS_E2EE_PEER_KEY_CHANGE: {:?}", other)))
                }
            };
        }

        if let Some(v) = get("CAMPUS_E2EE_KDF_ITERATIONS") {
            let iterations: u32 = v
                .trim()
                .parse()
                .map_err(|_| SessionError::Config(format!("CAMPUS_E2EE_KDF_ITERATIONS: {:?}", v)))?;
            if iterations < DEFAULT_ITERATIONS {
                return Err(SessionError::Config(format!(
                    "CAMPUS_E2EE_KDF_ITERATIONS must be at least {}",
                    DEFAULT_ITERATIONS
                )));
            }
            config.kdf = KdfParams::with_iterations(iterations);
        }

        Ok(config)
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_peer_key_change(mut self, policy: PeerKeyChangePolicy) -> Self {
        self.peer_key_change = policy;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_observed_behavior() {
        let c = SessionConfig::default();
        assert_eq!(c.fallback, FallbackPolicy::FailOpen);
        assert_eq!(c.recovery, RecoveryPolicy::Regenerate);
        assert_eq!(c.peer_key_change, PeerKeyChangePolicy::AcceptAndNotify);
        assert_eq!(c.kdf.iterations, 100_000);
    }

    #[test]
    fn empty_env_is_default() {
        assert_eq!(SessionConfig::from_lookup(lookup(&[])).unwrap(), SessionConfig::default());
    }

    #[test]
    fn env_overrides() {
        let c = SessionConfig::from_lookup(lookup(&[
            ("CAMPUS_E2EE_FALLBACK", "Closed"),
            ("CAMPUS_E2EE_RECOVERY", "strict"),
            ("CAMPUS_E2EE_PEER_KEY_CHANGE", "reject"),
            ("CAMPUS_E2EE_KDF_ITERATIONS", "250000"),
        ]))
        .unwrap();
        assert_eq!(c.fallback, FallbackPolicy::FailClosed);
        assert_eq!(c.recovery, RecoveryPolicy::Strict);
        assert_eq!(c.peer_key_change, PeerKeyChangePolicy::Reject);
        assert_eq!(c.kdf.iterations, 250_000);
    }

    #[test]
    fn weak_iterations_rejected() {
        let r = SessionConfig::from_lookup(lookup(&[("CAMPUS_E2EE_KDF_ITERATIONS", "1000")]));
        assert!(matches!(r, Err(SessionError::Config(_))));
    }

    #[test]
    fn unknown_values_rejected() {
        let r = SessionConfig::from_lookup(lookup(&[("CAMPUS_E2EE_FALLBACK", "maybe")]));
        assert!(matches!(r, Err(SessionError::Config(_))));
    }
}
