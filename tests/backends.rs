//! The same write and read scenarios run against the streaming byte writer and the eager
//! `Document` backend. Both must agree byte for byte.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use lazybson::{
    Bson,
    BsonRef,
    DateTime,
    Decimal128,
    Document,
    FieldWriter,
    LegacyFieldWriter,
    ObjectId,
    Timestamp,
    ValueWriter,
    cstr,
    error::ErrorKind,
    raw::{RawDocumentBuf, build_document, open_document},
    spec::{BinarySubtype, ElementType},
};

fn user_id() -> ObjectId {
    ObjectId::from_parts(1_600_000_000, [1, 2, 3, 4, 5], [0, 0, 9])
}

fn write_profile<W: FieldWriter>(w: &mut W) {
    w.write_document(cstr!("user"), |user| {
        user.write_str(cstr!("$ref"), "users");
        user.write_object_id(cstr!("$id"), user_id());
    });
    w.write_i64(cstr!("age"), 18);
    w.write_bool(cstr!("isAlive"), true);
    w.write_array(cstr!("children"), |children| {
        children.write_document(|c| c.write_str(cstr!("name"), "Paul"));
        children.write_document(|c| c.write_str(cstr!("name"), "Alice"));
    });
}

#[allow(deprecated)]
fn write_every_type<W: FieldWriter>(w: &mut W) {
    let scope = build_document(|s| s.write_i32(cstr!("x"), 1));
    w.write_f64(cstr!("double"), 1.5);
    w.write_str(cstr!("string"), "héllo");
    w.write_document(cstr!("document"), |_| {});
    w.write_array(cstr!("array"), |a| {
        a.write_i32(1);
        a.write_array(|inner| inner.write_null());
    });
    w.write_binary(cstr!("binary"), BinarySubtype::Generic, &[1, 2, 3]);
    w.write_binary(cstr!("binary_old"), BinarySubtype::BinaryOld, &[4, 5]);
    w.write_undefined(cstr!("undefined"));
    w.write_object_id(cstr!("oid"), user_id());
    w.write_bool(cstr!("bool"), false);
    w.write_datetime(cstr!("date"), DateTime::from_millis(-1));
    w.write_null(cstr!("null"));
    w.write_regex(cstr!("regex"), cstr!("^a.*"), cstr!("im"));
    w.write_db_pointer(cstr!("pointer"), "db.coll", user_id());
    w.write_javascript(cstr!("code"), "f()");
    w.write_symbol(cstr!("symbol"), "sym");
    w.write_javascript_with_scope(cstr!("code_w_s"), "g(x)", &scope);
    w.write_i32(cstr!("int32"), -7);
    w.write_timestamp(
        cstr!("timestamp"),
        Timestamp {
            time: 3,
            increment: 4,
        },
    );
    w.write_i64(cstr!("int64"), i64::MIN);
    w.write_decimal128(cstr!("decimal"), Decimal128::from_bytes([0; 16]));
    w.write_min_key(cstr!("min"));
    w.write_max_key(cstr!("max"));
}

fn write_repeated_name<W: FieldWriter>(w: &mut W) {
    w.write_i32(cstr!("a"), 1);
    w.write_i32(cstr!("b"), 2);
    w.write_i32(cstr!("a"), 3);
}

/// Pipes `{"a": <tag 0x42>}` as a nested value. Its frame is valid, its element is not.
fn pipe_unknown_element<W: FieldWriter>(w: &mut W) {
    let unknown =
        RawDocumentBuf::from_bytes(vec![12, 0, 0, 0, 0x42, b'a', 0, 1, 0, 0, 0, 0]).unwrap();
    w.write_bson(cstr!("d"), BsonRef::Document(&unknown));
    w.write_array(cstr!("list"), |a| a.write_bson(BsonRef::Document(&unknown)));
    w.write_i32(cstr!("after"), 1);
}

fn raw_backend(scenario: impl FnOnce(&mut lazybson::raw::CompletableDocumentWriter)) -> Vec<u8> {
    let mut writer = open_document();
    scenario(&mut writer);
    writer.build().to_vec()
}

fn eager_backend(scenario: impl FnOnce(&mut Document)) -> Vec<u8> {
    let mut doc = Document::new();
    scenario(&mut doc);
    doc.encode_to_vec().unwrap()
}

#[test]
fn profile_bytes_match() {
    let raw = raw_backend(write_profile);
    let eager = eager_backend(write_profile);
    assert_eq!(raw, eager);
    assert_eq!(raw, build_document(|w| write_profile(w)).to_vec());
}

#[test]
fn every_type_bytes_match() {
    let raw = raw_backend(write_every_type);
    let eager = eager_backend(write_every_type);
    assert_eq!(raw, eager);
}

#[test]
fn profile_round_trips_and_restringifies() {
    let original = build_document(|w| write_profile(w));
    let text = original.to_string();
    let expected = format!(
        concat!(
            r#"{{"user": {{"$ref": "users", "$id": {{"$oid": "{}"}}}}, "#,
            r#""age": 18, "isAlive": true, "children": [{{"name": "Paul"}}, {{"name": "Alice"}}]}}"#
        ),
        user_id()
    );
    assert_eq!(text, expected);

    let reread = RawDocumentBuf::from_bytes(original.to_vec()).unwrap();
    assert_eq!(reread.to_string(), text);

    let eager = Document::decode_from_bytes(original.as_bytes()).unwrap();
    assert_eq!(eager.to_string(), text);
    assert_eq!(eager.encode_to_vec().unwrap(), original.to_vec());
}

#[test]
fn every_type_renders_identically() {
    let raw = build_document(|w| write_every_type(w));
    let eager = Document::decode_from_bytes(raw.as_bytes()).unwrap();
    assert_eq!(raw.to_string(), eager.to_string());
}

#[test]
fn lazy_and_eager_reads_agree() {
    let bytes = build_document(|w| write_profile(w));
    let eager = Document::decode_from_bytes(bytes.as_bytes()).unwrap();
    let mut reader = bytes.reader();

    assert_eq!(
        reader.read("age").unwrap().unwrap().read_int64().unwrap(),
        eager.get_i64("age").unwrap()
    );
    assert_eq!(
        reader.read("isAlive").unwrap().unwrap().read_bool().unwrap(),
        eager.get_bool("isAlive").unwrap()
    );

    let children = reader.read_mut("children").unwrap().unwrap().as_array_mut().unwrap();
    let second = children.read_mut(1).unwrap().unwrap().as_document_mut().unwrap();
    let name = second.read("name").unwrap().unwrap().read_string().unwrap();
    let eager_children = eager.get_array("children").unwrap();
    assert_eq!(
        Some(name),
        eager_children[1].as_document().and_then(|d| d.get("name")).and_then(Bson::as_str)
    );

    assert_eq!(reader.to_document().unwrap(), eager);
}

#[test]
fn typed_access_fails_the_same_way() {
    let bytes = build_document(|w| write_profile(w));
    let eager = Document::decode_from_bytes(bytes.as_bytes()).unwrap();
    let mut reader = bytes.reader();

    let lazy_error = reader.read("age").unwrap().unwrap().read_int32().unwrap_err();
    let eager_error = eager.get_i32("age").unwrap_err();
    assert_matches!(lazy_error.kind, ErrorKind::TypeMismatch { .. });
    assert_eq!(lazy_error.kind, eager_error.kind);

    assert!(reader.read("missing").unwrap().is_none());
    assert_matches!(
        eager.get_i32("missing").unwrap_err().kind,
        ErrorKind::MissingField { .. }
    );
}

#[test]
fn malformed_input_fails_in_both_backends() {
    // Declared length 13, actual length 12.
    let short = [13, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
    assert!(RawDocumentBuf::from_bytes(short.to_vec()).unwrap_err().is_malformed_document());
    assert!(Document::decode_from_bytes(&short).unwrap_err().is_malformed_document());

    let unknown = [12, 0, 0, 0, 0x42, b'a', 0, 1, 0, 0, 0, 0];
    let raw = RawDocumentBuf::from_bytes(unknown.to_vec()).unwrap();
    assert_matches!(
        raw.reader().len().unwrap_err().kind,
        ErrorKind::UnknownBsonType { code: 0x42, .. }
    );
    assert_matches!(
        Document::decode_from_bytes(&unknown).unwrap_err().kind,
        ErrorKind::UnknownBsonType { code: 0x42, .. }
    );
}

#[test]
fn documents_pipe_into_either_backend() {
    let source = build_document(|w| write_profile(w));

    let mut raw = open_document();
    raw.write_document(cstr!("copy"), |w| {
        for element in source.iter() {
            let (key, value) = element.unwrap();
            w.write_bson(lazybson::CStr::from_str(key).unwrap(), value);
        }
    });

    let mut eager = Document::new();
    eager.write_document(cstr!("copy"), |w| {
        for element in source.iter() {
            let (key, value) = element.unwrap();
            w.write_bson(lazybson::CStr::from_str(key).unwrap(), value);
        }
    });

    assert_eq!(raw.build().to_vec(), eager.encode_to_vec().unwrap());
}

#[test]
fn repeated_names_are_kept_by_both_backends() {
    let raw = raw_backend(write_repeated_name);
    let eager = eager_backend(write_repeated_name);
    assert_eq!(raw, eager);
    assert_eq!(raw.len(), 26);

    let mut doc = Document::new();
    write_repeated_name(&mut doc);
    assert_eq!(doc.keys().collect::<Vec<_>>(), ["a", "b", "a"]);

    let mut reader = RawDocumentBuf::from_bytes(raw.clone()).unwrap().reader();
    let first = reader.read("a").unwrap().unwrap().read_int32().unwrap();
    assert_eq!(first, 1);
    assert_eq!(doc.get_i32("a").unwrap(), first);

    assert_eq!(reader.to_document().unwrap(), doc);
    assert_eq!(Document::decode_from_bytes(&raw).unwrap(), doc);
    assert_eq!(doc.to_string(), r#"{"a": 1, "b": 2, "a": 3}"#);
}

#[test]
fn undecodable_nested_values_are_kept_verbatim() {
    let raw = raw_backend(pipe_unknown_element);
    let eager = eager_backend(pipe_unknown_element);
    assert_eq!(raw.len(), 57);
    assert_eq!(raw, eager);

    let mut doc = Document::new();
    pipe_unknown_element(&mut doc);
    assert_eq!(doc.len(), 3);
    assert_eq!(doc.get_i32("after").unwrap(), 1);
    let Some(Bson::Undecoded(nested)) = doc.get("d") else {
        panic!("expected an undecoded value, got {:?}", doc.get("d"));
    };
    assert_eq!(nested.element_type(), ElementType::EmbeddedDocument);
    assert_eq!(nested.as_bytes(), &raw[7..19]);
    assert_matches!(nested.error().kind, ErrorKind::UnknownBsonType { code: 0x42, .. });
    assert_matches!(doc.get_array("list").unwrap().as_slice(), [Bson::Undecoded(_)]);

    let reread = RawDocumentBuf::from_bytes(raw).unwrap();
    assert_eq!(doc.to_string(), reread.to_string());
}
