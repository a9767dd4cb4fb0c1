#![cfg(feature = "serde")]

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use lazybson::{
    Binary,
    Bson,
    DateTime,
    Document,
    ObjectId,
    Timestamp,
    decode_from_bson,
    decode_from_reader,
    encode_to_bson,
    error::ErrorKind,
    spec::{BinarySubtype, ElementType},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UserRef {
    #[serde(rename = "$ref")]
    collection: String,
    #[serde(rename = "$id")]
    id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Child {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    user: UserRef,
    age: i64,
    is_alive: bool,
    children: Vec<Child>,
}

fn person() -> Person {
    Person {
        user: UserRef {
            collection: "users".to_string(),
            id: ObjectId::from_bytes([0x5f, 0x5e, 0x10, 0, 1, 2, 3, 4, 5, 0, 0, 9]),
        },
        age: 18,
        is_alive: true,
        children: vec![
            Child {
                name: "Paul".to_string(),
            },
            Child {
                name: "Alice".to_string(),
            },
        ],
    }
}

#[test]
fn test_person_round_trip() {
    let bytes = encode_to_bson(&person()).unwrap();
    let text = bytes.to_string();
    assert_eq!(
        text,
        concat!(
            r#"{"user": {"$ref": "users", "$id": {"$oid": "5f5e10000102030405000009"}}, "#,
            r#""age": 18, "isAlive": true, "children": [{"name": "Paul"}, {"name": "Alice"}]}"#
        )
    );

    let mut reader = bytes.reader();
    assert_eq!(
        reader.read("age").unwrap().unwrap().element_type(),
        ElementType::Int64
    );

    let decoded: Person = decode_from_bson(bytes.clone().into_bytes()).unwrap();
    assert_eq!(decoded, person());
    assert_eq!(encode_to_bson(&decoded).unwrap().to_string(), text);
}

#[test]
fn test_missing_field() {
    let bytes = encode_to_bson(&Child {
        name: "Paul".to_string(),
    })
    .unwrap();
    let error = decode_from_bson::<Person>(bytes.into_bytes()).unwrap_err();
    assert_matches!(error.kind, ErrorKind::MissingField { ref name, .. } if name == "user");
}

#[test]
fn test_nested_errors_carry_the_key() {
    #[derive(Serialize)]
    struct WrongAge {
        user: UserRef,
        age: &'static str,
    }
    let bytes = encode_to_bson(&WrongAge {
        user: person().user,
        age: "eighteen",
    })
    .unwrap();
    let error = decode_from_bson::<Person>(bytes.into_bytes()).unwrap_err();
    assert_eq!(error.key.as_deref(), Some("age"));
}

#[test]
fn test_decode_stops_at_the_last_declared_field() {
    #[derive(Deserialize)]
    struct AgeOnly {
        age: i64,
    }
    let bytes = encode_to_bson(&person()).unwrap();
    let mut reader = bytes.reader();
    let value: AgeOnly = decode_from_reader(&mut reader).unwrap();
    assert_eq!(value.age, 18);
    assert_eq!(reader.scanned_len(), 2);
}

#[test]
fn test_de_map() {
    let mut doc = Document::new();
    doc.insert("x", 0);
    doc.insert("y", 1);
    let bytes = doc.to_raw_document_buf().unwrap();

    let map: BTreeMap<String, i32> = decode_from_bson(bytes.into_bytes()).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert("x".to_string(), 0);
    expected.insert("y".to_string(), 1);
    assert_eq!(expected, map);
}

#[test]
fn test_ser_map() {
    let mut map = BTreeMap::new();
    map.insert("x", 0);
    map.insert("y", 1);
    let bytes = encode_to_bson(&map).unwrap();
    assert_eq!(bytes.to_string(), r#"{"x": 0, "y": 1}"#);
}

#[test]
fn test_value_types() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Values {
        id: ObjectId,
        at: DateTime,
        ts: Timestamp,
        data: Binary,
        #[serde(with = "serde_bytes")]
        raw: Vec<u8>,
        anything: Bson,
    }

    let values = Values {
        id: ObjectId::from_bytes([1; 12]),
        at: DateTime::from_millis(1_500_000_000_000),
        ts: Timestamp {
            time: 10,
            increment: 20,
        },
        data: Binary {
            subtype: BinarySubtype::Uuid,
            bytes: vec![0; 16],
        },
        raw: vec![1, 2, 3],
        anything: Bson::Document(Document::from_iter([(
            "nested".to_string(),
            Bson::Int32(1),
        )])),
    };

    let bytes = encode_to_bson(&values).unwrap();
    let mut reader = bytes.reader();
    let types: Vec<_> = reader
        .entries()
        .unwrap()
        .map(|(_, value)| value.element_type())
        .collect();
    assert_eq!(
        types,
        [
            ElementType::ObjectId,
            ElementType::DateTime,
            ElementType::Timestamp,
            ElementType::Binary,
            ElementType::Binary,
            ElementType::EmbeddedDocument,
        ]
    );

    let decoded: Values = decode_from_bson(bytes.into_bytes()).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_top_level_must_be_a_document() {
    let error = encode_to_bson(&vec![1, 2, 3]).unwrap_err();
    assert_matches!(error.kind, ErrorKind::Serialization { .. });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Shape {
    Empty,
    Circle(f64),
    Rect { w: i32, h: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    n: i32,
    big: i64,
    text: String,
    flag: bool,
    ratio: f64,
    items: Vec<i32>,
    note: Option<String>,
    shape: Shape,
}

fn shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::Empty),
        (-1e6..1e6f64).prop_map(Shape::Circle),
        (any::<i32>(), any::<i32>()).prop_map(|(w, h)| Shape::Rect { w, h }),
    ]
}

fn record() -> impl Strategy<Value = Record> {
    (
        any::<i32>(),
        any::<i64>(),
        "\\PC{0,16}",
        any::<bool>(),
        -1e9..1e9f64,
        prop::collection::vec(any::<i32>(), 0..8),
        prop::option::of("[a-z]{0,8}"),
        shape(),
    )
        .prop_map(|(n, big, text, flag, ratio, items, note, shape)| Record {
            n,
            big,
            text,
            flag,
            ratio,
            items,
            note,
            shape,
        })
}

proptest! {
    #[test]
    fn test_records_round_trip(value in record()) {
        let bytes = encode_to_bson(&value).unwrap();
        let decoded: Record = decode_from_bson(bytes.clone().into_bytes()).unwrap();
        prop_assert_eq!(&decoded, &value);

        let eager = Document::decode_from_bytes(bytes.as_bytes()).unwrap();
        prop_assert_eq!(eager.encode_to_vec().unwrap(), bytes.to_vec());
    }
}
