#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate lazybson;
use arbitrary::Arbitrary;
use lazybson::{Document, RawDocumentBuf, ScanState};

#[derive(Debug, Arbitrary)]
struct Input {
    keys: Vec<String>,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(doc) = RawDocumentBuf::from_bytes(input.bytes) else {
        return;
    };
    let mut reader = doc.reader();
    for key in &input.keys {
        match reader.read(key) {
            Ok(Some(value)) => {
                let _ = value.to_bson();
            }
            Ok(None) => assert_eq!(reader.state(), ScanState::FullyScanned),
            Err(_) => assert_ne!(reader.state(), ScanState::FullyScanned),
        }
    }

    // A fully decoded document agrees with the lazy one.
    if let (Ok(lazy), Ok(eager)) = (reader.to_document(), Document::decode_from_bytes(doc.as_bytes())) {
        assert_eq!(lazy.encode_to_vec().ok(), eager.encode_to_vec().ok());
    }
});
