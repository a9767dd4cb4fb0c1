use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use super::*;
use crate::{
    Bson,
    BsonRef,
    CStr,
    ObjectId,
    cstr,
    error::ErrorKind,
    spec::{BinarySubtype, ElementType},
    writer::{FieldWriter, LegacyFieldWriter, LegacyValueWriter, ValueWriter},
};

fn five_fields() -> RawDocumentBuf {
    build_document(|w| {
        w.write_i32(cstr!("a"), 1);
        w.write_i32(cstr!("b"), 2);
        w.write_str(cstr!("c"), "three");
        w.write_document(cstr!("d"), |d| d.write_bool(cstr!("x"), true));
        w.write_array(cstr!("e"), |a| {
            a.write_i64(5);
            a.write_null();
        });
    })
}

/// `{"a": 1, "b": <tag 0x42>}`: the frame is valid, the second element is not.
fn bad_second_element() -> Vec<u8> {
    let mut bytes = vec![0u8, 0, 0, 0];
    bytes.extend([0x10, b'a', 0, 1, 0, 0, 0]);
    bytes.extend([0x42, b'b', 0, 1, 0, 0, 0]);
    bytes.push(0);
    let len = bytes.len() as i32;
    bytes[..4].copy_from_slice(&len.to_le_bytes());
    bytes
}

#[test]
fn writes_a_single_field() {
    let doc = build_document(|w| w.write_i32(cstr!("foo"), 42));
    assert_eq!(
        doc.as_bytes(),
        [0x0e, 0, 0, 0, 0x10, b'f', b'o', b'o', 0, 0x2a, 0, 0, 0, 0]
    );
    assert_eq!(doc.to_string(), r#"{"foo": 42}"#);
}

#[test]
fn empty_containers() {
    let doc = build_document(|_| {});
    let array = build_array(|_| {});
    assert_eq!(doc.as_bytes(), [5, 0, 0, 0, 0]);
    assert_eq!(array.as_bytes(), [5, 0, 0, 0, 0]);
    assert_eq!(doc.to_string(), "{}");
    assert_eq!(array.to_string(), "[]");
    assert!(doc.is_empty());

    let mut reader = doc.reader();
    assert_eq!(reader.len().unwrap(), 0);
    assert_eq!(reader.state(), ScanState::FullyScanned);
}

#[test]
fn stops_scanning_at_the_requested_key() {
    let mut reader = five_fields().reader();
    assert_eq!(reader.state(), ScanState::Unscanned);

    assert_eq!(reader.read("b").unwrap().unwrap().read_int32().unwrap(), 2);
    assert_eq!(reader.scanned_len(), 2);
    assert_matches!(reader.state(), ScanState::PartiallyScanned { offset } if offset == 18);
    assert!(reader.get("c").is_none());

    // Earlier keys come from the cache without moving the cursor.
    assert_eq!(reader.read("a").unwrap().unwrap().read_int32().unwrap(), 1);
    assert_eq!(reader.scanned_len(), 2);

    assert_eq!(reader.read("d").unwrap().unwrap().element_type(), ElementType::EmbeddedDocument);
    assert_eq!(reader.scanned_len(), 4);
}

#[test]
fn missing_key_scans_to_the_end() {
    let mut reader = five_fields().reader();
    assert!(reader.read("zzz").unwrap().is_none());
    assert_eq!(reader.state(), ScanState::FullyScanned);
    assert_eq!(reader.scanned_len(), 5);
    assert!(!reader.contains("zzz").unwrap());
}

#[test]
fn repeated_reads_return_the_cached_value() {
    let mut reader = five_fields().reader();
    let first = reader.read("c").unwrap().unwrap() as *const ValueReader;
    let second = reader.read("c").unwrap().unwrap() as *const ValueReader;
    assert_eq!(first, second);
    assert_eq!(reader.scanned_len(), 3);
}

#[test]
fn entries_keep_document_order() {
    let mut reader = five_fields().reader();
    reader.read("c").unwrap();
    let keys: Vec<_> = reader.keys().unwrap().collect();
    assert_eq!(keys, ["a", "b", "c", "d", "e"]);
    assert_eq!(reader.len().unwrap(), 5);
}

#[test]
fn failed_scan_keeps_the_cache() {
    let doc = RawDocumentBuf::from_bytes(bad_second_element()).unwrap();
    let mut reader = doc.reader();

    assert_eq!(reader.read("a").unwrap().unwrap().read_int32().unwrap(), 1);
    let error = reader.read("zzz").unwrap_err();
    assert_matches!(error.kind, ErrorKind::UnknownBsonType { code: 0x42 });
    assert_eq!(error.key.as_deref(), Some("b"));

    assert_matches!(reader.state(), ScanState::PartiallyScanned { offset: 11 });
    assert_eq!(reader.scanned_len(), 1);
    assert!(reader.get("a").is_some());
    assert_eq!(reader.read("a").unwrap().unwrap().read_int32().unwrap(), 1);

    // The failure is reported again rather than skipped.
    assert!(reader.read("zzz").is_err());
    assert!(reader.materialize().is_err());
}

#[test]
fn duplicate_keys_keep_the_first_value() {
    let doc = build_document(|w| {
        w.write_i32(cstr!("k"), 1);
        w.write_i32(cstr!("k"), 2);
        w.write_i32(cstr!("z"), 3);
    });
    let mut reader = doc.reader();
    assert_eq!(reader.read("z").unwrap().unwrap().read_int32().unwrap(), 3);
    assert_eq!(reader.read("k").unwrap().unwrap().read_int32().unwrap(), 1);
    assert_eq!(reader.len().unwrap(), 2);
    assert_eq!(reader.scanned_len(), 3);
    assert_eq!(doc.get("k").unwrap(), Some(BsonRef::Int32(1)));

    let eager = reader.to_document().unwrap();
    assert_eq!(eager.len(), 3);
    assert_eq!(eager.get_i32("k").unwrap(), 1);
    assert_eq!(eager.encode_to_vec().unwrap(), doc.as_bytes());
}

#[test]
fn materialize_descends_into_nested_values() {
    let mut reader = five_fields().reader();
    reader.materialize().unwrap();
    assert_eq!(reader.state(), ScanState::FullyScanned);

    let nested = reader.get("d").unwrap();
    assert!(nested.is_materialized());
    let array = reader.get("e").unwrap();
    assert!(array.is_materialized());
    assert!(!reader.get("a").unwrap().is_materialized());

    let inner = reader.read_mut("d").unwrap().unwrap().as_document_mut().unwrap();
    assert_eq!(inner.state(), ScanState::FullyScanned);
    assert!(inner.read("x").unwrap().unwrap().read_bool().unwrap());
}

#[test]
fn materialized_and_fresh_readers_agree() {
    let mut materialized = five_fields().reader();
    materialized.materialize().unwrap();
    let mut fresh = five_fields().reader();

    for name in ["e", "a", "d", "c", "b", "missing"] {
        let expected = fresh.read(name).unwrap().map(|v| v.to_bson().unwrap());
        let actual = materialized.read(name).unwrap().map(|v| v.to_bson().unwrap());
        assert_eq!(actual, expected, "{name}");
    }

    let entries = |reader: &mut DocumentReader| {
        reader
            .entries()
            .unwrap()
            .map(|(key, value)| (key.to_owned(), value.to_bson().unwrap()))
            .collect::<Vec<_>>()
    };
    assert_eq!(entries(&mut materialized), entries(&mut fresh));
    assert_eq!(
        materialized.keys().unwrap().collect::<Vec<_>>(),
        ["a", "b", "c", "d", "e"]
    );
    assert_eq!(materialized.to_document().unwrap(), fresh.to_document().unwrap());
}

#[test]
fn nested_readers_scan_lazily() {
    let mut reader = five_fields().reader();
    let value = reader.read_mut("d").unwrap().unwrap();
    assert!(!value.is_materialized());
    let inner = value.as_document_mut().unwrap();
    assert_eq!(inner.state(), ScanState::Unscanned);
    assert!(inner.read("x").unwrap().unwrap().read_bool().unwrap());
    assert!(value.is_materialized());
}

#[test]
fn typed_reads_check_the_stored_type() {
    let mut reader = five_fields().reader();
    let value = reader.read("c").unwrap().unwrap();
    assert_eq!(value.read_string().unwrap(), "three");
    let error = value.read_int32().unwrap_err();
    assert_matches!(
        error.kind,
        ErrorKind::TypeMismatch {
            expected: ElementType::Int32,
            actual: ElementType::String,
        }
    );
    assert!(value.read_document().is_err());
}

#[test]
fn array_reads_by_index() {
    let array = build_array(|a| {
        a.write_str("zero");
        a.write_i32(1);
        a.write_document(|d| d.write_str(cstr!("name"), "two"));
    });
    let mut reader = array.reader();
    assert_eq!(reader.read(1).unwrap().unwrap().read_int32().unwrap(), 1);
    assert_eq!(reader.scanned_len(), 2);
    assert!(reader.read(7).unwrap().is_none());
    assert_eq!(reader.state(), ScanState::FullyScanned);
    assert_eq!(reader.len().unwrap(), 3);

    let mut nested = reader.get(2).unwrap().read_document().unwrap();
    assert_eq!(nested.read("name").unwrap().unwrap().read_string().unwrap(), "two");

    let values = reader.to_vec().unwrap();
    assert_eq!(values[0], Bson::String("zero".into()));
}

#[test]
fn frame_validation() {
    let error = RawDocument::from_bytes(&[6u8, 0, 0, 0, 0]).unwrap_err();
    assert!(error.is_malformed_document());

    let error = RawDocument::from_bytes(&[5u8, 0, 0, 0, 1]).unwrap_err();
    assert!(error.is_malformed_document());

    let error = RawDocument::from_bytes(&[5u8, 0, 0]).unwrap_err();
    assert!(error.is_malformed_document());

    let error = RawDocumentBuf::from_bytes(vec![0xffu8, 0xff, 0xff, 0xff, 0]).unwrap_err();
    assert!(error.is_malformed_document());
}

#[test]
fn element_overrunning_its_document_is_malformed() {
    // {"s": string declaring 100 bytes}
    let mut bytes = vec![0, 0, 0, 0, 0x02, b's', 0, 100, 0, 0, 0, b'h', b'i', 0, 0];
    let len = bytes.len() as i32;
    bytes[..4].copy_from_slice(&len.to_le_bytes());

    let doc = RawDocumentBuf::from_bytes(bytes).unwrap();
    let error = doc.reader().read("s").unwrap_err();
    assert_eq!(error.key.as_deref(), Some("s"));
    assert!(error.is_truncated_input() || error.is_malformed_document());
}

#[test]
fn invalid_utf8_is_reported_on_access() {
    // {"s": "\xff"}
    let mut bytes = vec![0, 0, 0, 0, 0x02, b's', 0, 2, 0, 0, 0, 0xff, 0, 0];
    let len = bytes.len() as i32;
    bytes[..4].copy_from_slice(&len.to_le_bytes());

    let doc = RawDocumentBuf::from_bytes(bytes).unwrap();
    let mut reader = doc.reader();
    let value = reader.read("s").unwrap().unwrap();
    assert_matches!(value.read_string().unwrap_err().kind, ErrorKind::InvalidEncoding);
}

#[test]
fn completable_writer_matches_block_builder() {
    let built = build_document(|w| {
        w.write_str(cstr!("name"), "Paul");
        w.write_document(cstr!("address"), |d| d.write_i32(cstr!("zip"), 10115));
        w.write_array(cstr!("tags"), |a| a.write_str("x"));
    });

    let mut writer = open_document();
    writer.write_str(cstr!("name"), "Paul");
    writer.write_document(cstr!("address"), |d| d.write_i32(cstr!("zip"), 10115));
    writer.write_array(cstr!("tags"), |a| a.write_str("x"));
    assert_eq!(writer.build().as_bytes(), built.as_bytes());

    let mut array = open_array();
    assert!(array.is_empty());
    for i in 0..3 {
        array.write_i32(i);
    }
    assert_eq!(array.len(), 3);
    assert_eq!(array.build().to_string(), "[0, 1, 2]");
}

#[test]
fn append_all_copies_fields() {
    let source = build_document(|w| {
        w.write_i32(cstr!("a"), 1);
        w.write_str(cstr!("b"), "two");
    });
    let mut writer = open_document();
    writer.write_bool(cstr!("first"), true);
    writer.append_all(&source);
    writer.append_all(&build_document(|_| {}));
    let doc = writer.build();
    assert_eq!(doc.to_string(), r#"{"first": true, "a": 1, "b": "two"}"#);
}

#[test]
fn dynamic_keys_go_through_cstr() {
    let mut writer = open_document();
    for name in ["x", "y"] {
        writer.write_null(CStr::from_str(name).unwrap());
    }
    assert_eq!(writer.build().to_string(), r#"{"x": null, "y": null}"#);
    assert_matches!(
        CStr::from_str("a\0b").unwrap_err().kind,
        ErrorKind::InvalidCString { .. }
    );
}

#[test]
#[allow(deprecated)]
fn legacy_types_round_trip() {
    let scope = build_document(|w| w.write_i32(cstr!("x"), 1));
    let oid = ObjectId::from_bytes([7; 12]);
    let doc = build_document(|w| {
        w.write_symbol(cstr!("sym"), "s");
        w.write_undefined(cstr!("u"));
        w.write_db_pointer(cstr!("ptr"), "db.coll", oid);
        w.write_javascript_with_scope(cstr!("code"), "f(x)", &scope);
        w.write_array(cstr!("arr"), |a| {
            a.write_symbol("t");
            a.write_undefined();
        });
    });

    let mut reader = doc.reader();
    assert_eq!(reader.read("sym").unwrap().unwrap().read_symbol().unwrap(), "s");
    reader.read("u").unwrap().unwrap().read_undefined().unwrap();
    let pointer = reader.read("ptr").unwrap().unwrap().read_db_pointer().unwrap();
    assert_eq!(pointer.namespace(), "db.coll");
    assert_eq!(pointer.id(), oid);
    let code = reader.read("code").unwrap().unwrap().read_javascript_with_scope().unwrap();
    assert_eq!(code.code, "f(x)");
    assert_eq!(code.scope.as_bytes(), scope.as_bytes());

    let copy = RawDocumentBuf::try_from(&doc.to_document().unwrap()).unwrap();
    assert_eq!(copy.as_bytes(), doc.as_bytes());
}

#[test]
fn old_binary_subtype_round_trips() {
    let doc = build_document(|w| w.write_binary(cstr!("b"), BinarySubtype::BinaryOld, b"abc"));
    let mut reader = doc.reader();
    let binary = reader.read("b").unwrap().unwrap().read_binary().unwrap();
    assert_eq!(binary.subtype, BinarySubtype::BinaryOld);
    assert_eq!(binary.bytes, b"abc");

    let document = doc.to_document().unwrap();
    assert_eq!(document.encode_to_vec().unwrap(), doc.as_bytes());
}

#[test]
fn owned_documents_share_their_bytes() {
    let doc = five_fields();
    let mut reader = doc.reader();
    let nested = reader.read("d").unwrap().unwrap().read_raw_document().unwrap();
    assert_eq!(nested.to_string(), r#"{"x": true}"#);
    assert_eq!(reader.as_raw_document().as_bytes(), doc.as_bytes());
    assert_eq!(
        reader.to_document().unwrap(),
        doc.to_document().unwrap()
    );
}
