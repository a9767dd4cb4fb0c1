//! Canonical text rendering shared by every document type.
//!
//! Documents render as `{"k": v, ...}` and arrays as `[v, ...]`. Strings, numbers, booleans and
//! null are written as JSON literals; every other type is written in its relaxed extended JSON
//! form. [`RawDocument`], [`RawArray`], [`Document`] and [`Bson`] all funnel through the same
//! value renderer, so a document prints the same whichever backend holds it.

use std::fmt::{self, Formatter, Write};

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{Bson, BsonRef, Document, RawArray, RawDocument, bson_ref::BinaryRef};

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn fmt_str(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0c}' => f.write_str("\\f")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn fmt_f64(f: &mut Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str(r#"{"$numberDouble": "NaN"}"#)
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        write!(f, r#"{{"$numberDouble": "{text}"}}"#)
    } else {
        write!(f, "{value:?}")
    }
}

fn fmt_binary(f: &mut Formatter<'_>, binary: BinaryRef<'_>) -> fmt::Result {
    write!(
        f,
        r#"{{"$binary": {{"base64": "{}", "subType": "{:02x}"}}}}"#,
        base64_encode(binary.bytes),
        u8::from(binary.subtype)
    )
}

/// Renders a malformed region in place of the values that could not be decoded.
fn fmt_malformed(f: &mut Formatter<'_>, error: impl fmt::Display) -> fmt::Result {
    write!(f, "<malformed: {error}>")
}

pub(crate) fn fmt_bson_ref(f: &mut Formatter<'_>, value: BsonRef<'_>) -> fmt::Result {
    match value {
        BsonRef::Double(d) => fmt_f64(f, d),
        BsonRef::String(s) => fmt_str(f, s),
        BsonRef::Document(doc) => fmt_raw_document(f, doc),
        BsonRef::Array(array) => fmt_raw_array(f, array),
        BsonRef::Binary(binary) => fmt_binary(f, binary),
        BsonRef::Undefined => f.write_str(r#"{"$undefined": true}"#),
        BsonRef::ObjectId(oid) => write!(f, r#"{{"$oid": "{oid}"}}"#),
        BsonRef::Boolean(b) => write!(f, "{b}"),
        BsonRef::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Some(text) if (0..=253_402_300_799_999).contains(&dt.timestamp_millis()) => {
                write!(f, r#"{{"$date": "{text}"}}"#)
            }
            _ => write!(
                f,
                r#"{{"$date": {{"$numberLong": "{}"}}}}"#,
                dt.timestamp_millis()
            ),
        },
        BsonRef::Null => f.write_str("null"),
        BsonRef::RegularExpression(re) => {
            f.write_str(r#"{"$regularExpression": {"pattern": "#)?;
            fmt_str(f, re.pattern.as_str())?;
            f.write_str(r#", "options": "#)?;
            fmt_str(f, re.options.as_str())?;
            f.write_str("}}")
        }
        BsonRef::DbPointer(p) => {
            f.write_str(r#"{"$dbPointer": {"$ref": "#)?;
            fmt_str(f, p.namespace())?;
            write!(f, r#", "$id": {{"$oid": "{}"}}}}}}"#, p.id())
        }
        BsonRef::JavaScriptCode(code) => {
            f.write_str(r#"{"$code": "#)?;
            fmt_str(f, code)?;
            f.write_char('}')
        }
        BsonRef::Symbol(symbol) => {
            f.write_str(r#"{"$symbol": "#)?;
            fmt_str(f, symbol)?;
            f.write_char('}')
        }
        BsonRef::JavaScriptCodeWithScope(c) => {
            f.write_str(r#"{"$code": "#)?;
            fmt_str(f, c.code)?;
            f.write_str(r#", "$scope": "#)?;
            fmt_raw_document(f, c.scope)?;
            f.write_char('}')
        }
        BsonRef::Int32(i) => write!(f, "{i}"),
        BsonRef::Timestamp(ts) => write!(
            f,
            r#"{{"$timestamp": {{"t": {}, "i": {}}}}}"#,
            ts.time, ts.increment
        ),
        BsonRef::Int64(i) => write!(f, "{i}"),
        BsonRef::Decimal128(d) => write!(f, r#"{{"$numberDecimal": "{d}"}}"#),
        BsonRef::MaxKey => f.write_str(r#"{"$maxKey": 1}"#),
        BsonRef::MinKey => f.write_str(r#"{"$minKey": 1}"#),
    }
}

pub(crate) fn fmt_raw_document(f: &mut Formatter<'_>, doc: &RawDocument) -> fmt::Result {
    f.write_char('{')?;
    for (i, element) in doc.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match element {
            Ok((key, value)) => {
                fmt_str(f, key)?;
                f.write_str(": ")?;
                fmt_bson_ref(f, value)?;
            }
            Err(error) => fmt_malformed(f, error)?,
        }
    }
    f.write_char('}')
}

pub(crate) fn fmt_raw_array(f: &mut Formatter<'_>, array: &RawArray) -> fmt::Result {
    f.write_char('[')?;
    for (i, element) in array.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match element {
            Ok(value) => fmt_bson_ref(f, value)?,
            Err(error) => fmt_malformed(f, error)?,
        }
    }
    f.write_char(']')
}

pub(crate) fn fmt_document(f: &mut Formatter<'_>, doc: &Document) -> fmt::Result {
    f.write_char('{')?;
    for (i, (key, value)) in doc.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt_str(f, key)?;
        f.write_str(": ")?;
        fmt_bson(f, value)?;
    }
    f.write_char('}')
}

pub(crate) fn fmt_bson(f: &mut Formatter<'_>, value: &Bson) -> fmt::Result {
    match value {
        Bson::Document(doc) => fmt_document(f, doc),
        Bson::Array(array) => {
            f.write_char('[')?;
            for (i, value) in array.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_bson(f, value)?;
            }
            f.write_char(']')
        }
        Bson::JavaScriptCodeWithScope(c) => {
            f.write_str(r#"{"$code": "#)?;
            fmt_str(f, &c.code)?;
            f.write_str(r#", "$scope": "#)?;
            fmt_document(f, &c.scope)?;
            f.write_char('}')
        }
        Bson::Undecoded(undecoded) => match undecoded.as_bson_ref() {
            Ok(value) => fmt_bson_ref(f, value),
            Err(error) => fmt_malformed(f, &error),
        },
        other => match other.as_scalar_ref() {
            Some(value) => fmt_bson_ref(f, value),
            None => Err(fmt::Error),
        },
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{
        Bson,
        DateTime,
        Document,
        Timestamp,
        cstr,
        oid::ObjectId,
        raw::{RawDocument, build_document},
        spec::BinarySubtype,
        writer::{FieldWriter, LegacyFieldWriter, ValueWriter},
    };

    #[test]
    fn renders_json_literals() {
        let doc = build_document(|w| {
            w.write_str(cstr!("s"), "a \"quoted\"\nline");
            w.write_f64(cstr!("d"), 1.0);
            w.write_bool(cstr!("b"), false);
            w.write_null(cstr!("n"));
            w.write_array(cstr!("e"), |_| {});
            w.write_document(cstr!("o"), |_| {});
        });
        assert_eq!(
            doc.to_string(),
            r#"{"s": "a \"quoted\"\nline", "d": 1.0, "b": false, "n": null, "e": [], "o": {}}"#
        );
    }

    #[test]
    #[allow(deprecated)]
    fn renders_extended_types() {
        let oid = ObjectId::from_bytes([1; 12]);
        let doc = build_document(|w| {
            w.write_object_id(cstr!("id"), oid);
            w.write_datetime(cstr!("at"), DateTime::from_millis(0));
            w.write_binary(cstr!("bin"), BinarySubtype::Generic, b"hi");
            w.write_timestamp(
                cstr!("ts"),
                Timestamp {
                    time: 1,
                    increment: 2,
                },
            );
            w.write_undefined(cstr!("u"));
            w.write_f64(cstr!("nan"), f64::NAN);
        });
        assert_eq!(
            doc.to_string(),
            concat!(
                r#"{"id": {"$oid": "010101010101010101010101"}, "#,
                r#""at": {"$date": "1970-01-01T00:00:00Z"}, "#,
                r#""bin": {"$binary": {"base64": "aGk=", "subType": "00"}}, "#,
                r#""ts": {"$timestamp": {"t": 1, "i": 2}}, "#,
                r#""u": {"$undefined": true}, "#,
                r#""nan": {"$numberDouble": "NaN"}}"#
            )
        );
    }

    #[test]
    fn backends_render_identically() {
        let raw = build_document(|w| {
            w.write_i64(cstr!("n"), -3);
            w.write_array(cstr!("xs"), |a| {
                a.write_regex(cstr!("^a"), cstr!("i"));
                a.write_max_key();
            });
        });
        let mut doc = Document::new();
        doc.insert("n", -3i64);
        doc.insert(
            "xs",
            vec![
                Bson::RegularExpression(crate::Regex::new("^a", "i").unwrap()),
                Bson::MaxKey,
            ],
        );
        assert_eq!(raw.to_string(), doc.to_string());
    }

    #[test]
    fn malformed_content_renders_a_marker() {
        // {"a": <tag 0x42>}: the frame is valid, the element is not.
        let bytes = [12, 0, 0, 0, 0x42, b'a', 0, 1, 0, 0, 0, 0];
        let doc = RawDocument::from_bytes(&bytes).unwrap();
        assert!(doc.to_string().starts_with("{<malformed: "));
    }
}
