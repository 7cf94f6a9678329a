//! Transport envelope encoding.
//!
//! Format (v1):
//!   {"ct":"<base64 ciphertext>","iv":"<base64 nonce[12]>","tag":"<base64 tag[16]>"}
//!
//! Exactly three fields, standard base64, no unknown keys. Anything that
//! does not parse is plaintext as far as `is_encrypted` is concerned.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::aead::{EncryptedEnvelope, NONCE_BYTES, TAG_BYTES};
use crate::error::CryptoError;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
    ct: String,
    iv: String,
    tag: String,
}

/// Encode an envelope as compact JSON text.
pub fn serialize(envelope: &EncryptedEnvelope) -> Result<String, CryptoError> {
    let wire = WireEnvelope {
        ct: STANDARD.encode(envelope.ciphertext()),
        iv: STANDARD.encode(envelope.nonce()),
        tag: STANDARD.encode(envelope.tag()),
    };
    serde_json::to_string(&wire).map_err(|e| CryptoError::Malformed(e.to_string()))
}

/// Decode envelope text produced by [`serialize`].
pub fn parse(text: &str) -> Result<EncryptedEnvelope, CryptoError> {
    let wire: WireEnvelope =
        serde_json::from_str(text).map_err(|e| CryptoError::Malformed(e.to_string()))?;

    let ciphertext = STANDARD
        .decode(&wire.ct)
        .map_err(|e| CryptoError::Malformed(format!("ct: {}", e)))?;
    let nonce: [u8; NONCE_BYTES] = decode_fixed(&wire.iv, "iv")?;
    let tag: [u8; TAG_BYTES] = decode_fixed(&wire.tag, "tag")?;

    Ok(EncryptedEnvelope::from_parts(ciphertext, nonce, tag))
}

fn decode_fixed<const N: usize>(field: &str, name: &str) -> Result<[u8; N], CryptoError> {
    let bytes = STANDARD
        .decode(field)
        .map_err(|e| CryptoError::Malformed(format!("{}: {}", name, e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Malformed(format!("{} must be {} bytes, got {}", name, N, bytes.len())))
}

/// Whether `payload` is a serialized envelope. Never panics; any doubt
/// resolves to `false`.
pub fn is_encrypted(payload: &str) -> bool {
    if !payload.trim_start().starts_with('{') {
        return false;
    }
    parse(payload).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::{self, SymmetricKey};

    #[test]
    fn serialize_then_parse() {
        let key = SymmetricKey::generate().unwrap();
        let env = aead::encrypt("hi there", &key).unwrap();
        let text = serialize(&env).unwrap();
        assert_eq!(parse(&text).unwrap(), env);
        assert!(is_encrypted(&text));
    }

    #[test]
    fn field_names_are_stable() {
        let env = EncryptedEnvelope::from_parts(vec![1, 2, 3], [0u8; NONCE_BYTES], [0u8; TAG_BYTES]);
        assert_eq!(
            serialize(&env).unwrap(),
            r#"{"ct":"AQID","iv":"AAAAAAAAAAAAAAAA","tag":"AAAAAAAAAAAAAAAAAAAAAA=="}"#
        );
    }

    #[test]
    fn plaintext_is_not_encrypted() {
        for s in [
            "",
            "hello",
            "Hey, are you coming to the library tonight?",
            "aGVsbG8gd29ybGQ=",
            "{",
            "{}",
            "{\"ct\":1}",
            "[1,2,3]",
            "null",
        ] {
            assert!(!is_encrypted(s), "{:?}", s);
        }
    }

    #[test]
    fn wrong_lengths_rejected() {
        let short_iv = r#"{"ct":"AQID","iv":"AAAA","tag":"AAAAAAAAAAAAAAAAAAAAAA=="}"#;
        assert!(matches!(parse(short_iv), Err(CryptoError::Malformed(_))));
        assert!(!is_encrypted(short_iv));
    }

    #[test]
    fn unknown_fields_rejected() {
        let extra = r#"{"ct":"AQID","iv":"AAAAAAAAAAAAAAAA","tag":"AAAAAAAAAAAAAAAAAAAAAA==","v":1}"#;
        assert!(!is_encrypted(extra));
    }

    #[test]
    fn leading_whitespace_tolerated() {
        let env = EncryptedEnvelope::from_parts(vec![], [9u8; NONCE_BYTES], [8u8; TAG_BYTES]);
        let text = format!("  {}", serialize(&env).unwrap());
        assert!(is_encrypted(&text));
    }
}
