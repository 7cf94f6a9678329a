#![no_main]

use campus_e2ee::{EncryptedEnvelope, SymmetricKey};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static KEY: Lazy<SymmetricKey> = Lazy::new(|| SymmetricKey::generate().unwrap());

fuzz_target!(|data: &[u8]| {
    if data.len() < 28 {
        return;
    }

    let (nonce, rest) = data.split_at(12);
    let (tag, ct) = rest.split_at(16);

    let env = EncryptedEnvelope::from_parts(ct.to_vec(), nonce.try_into().unwrap(), tag.try_into().unwrap());

    // A random envelope must never authenticate.
    assert!(campus_e2ee::decrypt(&env, &KEY).is_err());
});
