#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lazybson;
use lazybson::RawDocument;

fuzz_target!(|buf: &[u8]| {
    if let Ok(doc) = RawDocument::from_bytes(buf) {
        for _ in doc {}
        let _ = doc.to_string();
    }
});
