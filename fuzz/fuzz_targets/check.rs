#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Building and validating report errors, never panic.
        let _ = sable_typeck::check("fuzz.sable", s);
    }
});
