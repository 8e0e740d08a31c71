#![no_main]

use fiskal::core::FiscalResponse;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic, and anything that is not a success keeps the raw body.
        if let FiscalResponse::Failure { raw_response, .. } = fiskal::xml::parse_response(s) {
            assert_eq!(raw_response, s);
        }
    }
});
