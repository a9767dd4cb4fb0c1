#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lazybson;
use lazybson::{RawDocumentBuf, raw::read_document};

fuzz_target!(|buf: &[u8]| {
    if buf.len() >= 4 {
        // Focus on document length field manipulation
        if let Ok(doc) = read_document(buf.to_vec()) {
            let _ = doc.reader().materialize();
        }
        let _ = RawDocumentBuf::from_bytes(buf.to_vec());
    }
});
