#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = elfmodel::parse(data, "<fuzz>") {
        // Linked versions always point inside the version table
        for symbol in image.dynamic_symbols() {
            if symbol.has_version() {
                assert!(image.symbol_version(symbol).is_some());
            }
        }
        let _ = image.to_json();
    }
});
