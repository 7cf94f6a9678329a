#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let detected = campus_e2ee::wire::is_encrypted(text);
        let parsed = campus_e2ee::wire::parse(text);
        assert!(!detected || parsed.is_ok());
    }
});
