#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lazybson;
use lazybson::{Document, RawDocument};

fuzz_target!(|buf: &[u8]| {
    let Ok(doc) = RawDocument::from_bytes(buf) else {
        return;
    };
    let Ok(decoded) = doc.to_document() else {
        return;
    };
    let Ok(encoded) = decoded.encode_to_vec() else {
        return;
    };
    let Ok(again) = Document::decode_from_bytes(&encoded) else {
        panic!("re-encoded document failed to decode: {decoded}");
    };
    if again != decoded {
        // NaN doubles never compare equal; compare the bytes instead.
        assert_eq!(again.encode_to_vec().ok(), Some(encoded));
    }
});
