#![no_main]

use campus_e2ee::KdfParams;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = campus_e2ee::decrypt_private_key(text, "fuzz", KdfParams::with_iterations(1));
    }
});
