#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic; malformed input is an error.
        let _ = fiskal::xml::exc_c14n(s);
    }
});
