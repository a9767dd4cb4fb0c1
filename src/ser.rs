// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Serializer

use serde::{
    Serialize,
    ser::{
        Impossible,
        SerializeMap,
        SerializeSeq,
        SerializeStruct,
        SerializeStructVariant,
        SerializeTuple,
        SerializeTupleStruct,
        SerializeTupleVariant,
        Serializer,
    },
};
use serde_bytes::Bytes;
use tracing::debug;

use crate::{
    Binary,
    Bson,
    BsonRef,
    DateTime,
    Decimal128,
    Document,
    RawDocumentBuf,
    Timestamp,
    bson_ref::{BinaryRef, JavaScriptCodeWithScopeRef},
    codec,
    cstr::{CStr, CString},
    error::{Error, Result},
    oid::ObjectId,
    raw::{CompletableArrayWriter, CompletableDocumentWriter, open_array, open_document},
    spec::ElementType,
    writer::{FieldWriter, ValueWriter},
};

pub(crate) const OBJECT_ID_NEWTYPE: &str = "$__lazybson_private_oid";
pub(crate) const DATETIME_NEWTYPE: &str = "$__lazybson_private_datetime";
pub(crate) const TIMESTAMP_NEWTYPE: &str = "$__lazybson_private_timestamp";
pub(crate) const DECIMAL128_NEWTYPE: &str = "$__lazybson_private_decimal128";
pub(crate) const BINARY_NEWTYPE: &str = "$__lazybson_private_binary";
pub(crate) const RAW_VALUE_NEWTYPE: &str = "$__lazybson_private_raw_value";

/// Marks the byte layout of the next `serialize_bytes` / `visit_bytes` call, for the value types
/// that travel through serde as newtype-wrapped bytes.
///
/// | hint       | bytes                                         |
/// |------------|-----------------------------------------------|
/// | ObjectId   | the 12 id bytes                               |
/// | DateTime   | milliseconds as little-endian i64             |
/// | Timestamp  | increment then time, each little-endian u32   |
/// | Decimal128 | the 16 BID bytes                              |
/// | Binary     | subtype byte followed by the payload          |
/// | RawValue   | element type byte followed by the value bytes |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NewtypeHint {
    ObjectId,
    DateTime,
    Timestamp,
    Decimal128,
    Binary,
    RawValue,
}

impl NewtypeHint {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            OBJECT_ID_NEWTYPE => Self::ObjectId,
            DATETIME_NEWTYPE => Self::DateTime,
            TIMESTAMP_NEWTYPE => Self::Timestamp,
            DECIMAL128_NEWTYPE => Self::Decimal128,
            BINARY_NEWTYPE => Self::Binary,
            RAW_VALUE_NEWTYPE => Self::RawValue,
            _ => return None,
        })
    }

    fn decode(self, bytes: &[u8]) -> Result<BsonRef<'_>> {
        Ok(match self {
            Self::ObjectId => BsonRef::ObjectId(ObjectId::from_bytes(fixed(bytes)?)),
            Self::DateTime => {
                BsonRef::DateTime(DateTime::from_millis(i64::from_le_bytes(fixed(bytes)?)))
            }
            Self::Timestamp => BsonRef::Timestamp(Timestamp::from_le_bytes(fixed(bytes)?)),
            Self::Decimal128 => BsonRef::Decimal128(Decimal128::from_bytes(fixed(bytes)?)),
            Self::Binary => match bytes.split_first() {
                Some((subtype, payload)) => BsonRef::Binary(BinaryRef {
                    subtype: (*subtype).into(),
                    bytes: payload,
                }),
                None => return Err(Error::serialization("binary value without a subtype")),
            },
            Self::RawValue => match bytes.split_first() {
                Some((tag, value)) => {
                    let element_type =
                        ElementType::from(*tag).ok_or_else(|| Error::unknown_type(*tag))?;
                    codec::decode_value(element_type, value)?
                }
                None => return Err(Error::serialization("raw value without an element type")),
            },
        })
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::serialization(format!("expected {N} bytes, got {}", bytes.len()))
    })
}

/// Encode a `T` as a BSON document.
///
/// `T` must serialize as a map or a struct; anything else (a bare integer, a sequence, ...) is
/// rejected because a BSON document cannot hold it at the top level.
///
/// ```rust
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Cat {
///     name: String,
///     lives: i32,
/// }
///
/// let doc = lazybson::encode_to_bson(&Cat { name: "Tom".into(), lives: 9 })?;
/// assert_eq!(doc.to_string(), r#"{"name": "Tom", "lives": 9}"#);
/// # Ok::<(), lazybson::error::Error>(())
/// ```
pub fn encode_to_bson<T: Serialize + ?Sized>(value: &T) -> Result<RawDocumentBuf> {
    let mut array = open_array();
    value.serialize(SlotSerializer::new(ElementSlot(&mut array)))?;
    let mut reader = array.build().reader();
    match reader.read(0)? {
        Some(root) if root.element_type() == ElementType::EmbeddedDocument => {
            root.read_raw_document()
        }
        root => {
            let element_type = root.map(|r| r.element_type());
            debug!(?element_type, "rejected non-document value at the top level");
            Err(Error::serialization(format!(
                "top-level value must serialize to a document, got {element_type:?}"
            )))
        }
    }
}

/// Serialize `value` and write it under `name` with any [`FieldWriter`].
///
/// This is the building block of [`encode_to_bson`], exposed so that typed values can be mixed
/// with hand-written fields, or written into the eager [`Document`] backend.
///
/// ```rust
/// use lazybson::{cstr, raw::build_document, ser::write_field, FieldWriter};
///
/// let doc = build_document(|w| {
///     w.write_i32(cstr!("v"), 1);
///     write_field(w, cstr!("tags"), &["a", "b"]).unwrap();
/// });
/// assert_eq!(doc.to_string(), r#"{"v": 1, "tags": ["a", "b"]}"#);
/// ```
pub fn write_field<W, T>(writer: &mut W, name: &CStr, value: &T) -> Result<()>
where
    W: FieldWriter,
    T: Serialize + ?Sized,
{
    value
        .serialize(SlotSerializer::new(FieldSlot { writer, name }))
        .map_err(|e| e.with_key(name.as_str()))
}

/// Serialize `value` and append it to an array with any [`ValueWriter`].
pub fn write_element<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: ValueWriter,
    T: Serialize + ?Sized,
{
    value.serialize(SlotSerializer::new(ElementSlot(writer)))
}

/// The place a single serialized value lands: a named field of a document or the next element
/// of an array.
pub(crate) trait Slot: Sized {
    type Fields: FieldWriter;
    type Elements: ValueWriter;

    fn write(self, value: BsonRef<'_>);

    fn document(self) -> Self::Fields;

    fn array(self) -> Self::Elements;
}

pub(crate) struct FieldSlot<'a, 'n, W> {
    writer: &'a mut W,
    name: &'n CStr,
}

impl<'a, W: FieldWriter + 'a> Slot for FieldSlot<'a, '_, W> {
    type Fields = W::DocumentWriter<'a>;
    type Elements = W::ArrayWriter<'a>;

    fn write(self, value: BsonRef<'_>) {
        self.writer.write_bson(self.name, value);
    }

    fn document(self) -> Self::Fields {
        let FieldSlot { writer, name } = self;
        writer.open_document(name)
    }

    fn array(self) -> Self::Elements {
        let FieldSlot { writer, name } = self;
        writer.open_array(name)
    }
}

pub(crate) struct ElementSlot<'a, W>(&'a mut W);

impl<'a, W: ValueWriter + 'a> Slot for ElementSlot<'a, W> {
    type Fields = W::DocumentWriter<'a>;
    type Elements = W::ArrayWriter<'a>;

    fn write(self, value: BsonRef<'_>) {
        self.0.write_bson(value);
    }

    fn document(self) -> Self::Fields {
        self.0.open_document()
    }

    fn array(self) -> Self::Elements {
        self.0.open_array()
    }
}

/// Serializes exactly one value into a [`Slot`].
pub(crate) struct SlotSerializer<S> {
    slot: S,
    hint: Option<NewtypeHint>,
}

impl<S: Slot> SlotSerializer<S> {
    fn new(slot: S) -> Self {
        Self { slot, hint: None }
    }

    fn write(self, value: BsonRef<'_>) -> Result<()> {
        self.slot.write(value);
        Ok(())
    }
}

impl<S: Slot> Serializer for SlotSerializer<S> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqSerializer<S::Elements>;
    type SerializeTuple = SeqSerializer<S::Elements>;
    type SerializeTupleStruct = SeqSerializer<S::Elements>;
    type SerializeTupleVariant = TupleVariantSerializer<S>;
    type SerializeMap = MapSerializer<S::Fields>;
    type SerializeStruct = StructSerializer<S::Fields>;
    type SerializeStructVariant = StructVariantSerializer<S>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write(BsonRef::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i32(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i32(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.write(BsonRef::Int32(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write(BsonRef::Int64(v))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_i32(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_i32(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_i64(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_i64(v),
            Err(_) => Err(Error::serialization(format!(
                "{v} does not fit in a BSON int64"
            ))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.write(BsonRef::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut buf = [0; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write(BsonRef::String(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        let value = match self.hint {
            Some(hint) => hint.decode(v)?,
            None => BsonRef::Binary(BinaryRef {
                subtype: crate::spec::BinarySubtype::Generic,
                bytes: v,
            }),
        };
        self.write(value)
    }

    fn serialize_none(self) -> Result<()> {
        self.write(BsonRef::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.serialize_none()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        mut self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        self.hint = NewtypeHint::from_name(name);
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        let name = CStr::from_str(variant)?;
        let mut fields = self.slot.document();
        write_field(&mut fields, name, value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(SeqSerializer {
            writer: self.slot.array(),
            index: 0,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Ok(TupleVariantSerializer {
            slot: self.slot,
            variant: CStr::from_str(variant)?,
            inner: open_array(),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(MapSerializer {
            writer: self.slot.document(),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(StructSerializer {
            writer: self.slot.document(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Ok(StructVariantSerializer {
            slot: self.slot,
            variant: CStr::from_str(variant)?,
            inner: open_document(),
        })
    }
}

pub(crate) struct SeqSerializer<W> {
    writer: W,
    index: usize,
}

impl<W: ValueWriter> SerializeSeq for SeqSerializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let index = self.index;
        self.index += 1;
        write_element(&mut self.writer, value).map_err(|e| e.with_index(index))
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: ValueWriter> SerializeTuple for SeqSerializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<W: ValueWriter> SerializeTupleStruct for SeqSerializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct MapSerializer<W> {
    writer: W,
    key: Option<CString>,
}

impl<W: FieldWriter> SerializeMap for MapSerializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::serialization("map value serialized before its key"))?;
        write_field(&mut self.writer, &key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct StructSerializer<W> {
    writer: W,
}

impl<W: FieldWriter> SerializeStruct for StructSerializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        write_field(&mut self.writer, CStr::from_str(key)?, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Buffers the elements of a tuple variant, then writes `{variant: [elements]}` on `end`.
pub(crate) struct TupleVariantSerializer<S> {
    slot: S,
    variant: &'static CStr,
    inner: CompletableArrayWriter,
}

impl<S: Slot> SerializeTupleVariant for TupleVariantSerializer<S> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let index = self.inner.len();
        write_element(&mut self.inner, value).map_err(|e| e.with_index(index))
    }

    fn end(self) -> Result<()> {
        let array = self.inner.build();
        self.slot
            .document()
            .write_bson(self.variant, BsonRef::Array(&array));
        Ok(())
    }
}

/// Buffers the fields of a struct variant, then writes `{variant: {fields}}` on `end`.
pub(crate) struct StructVariantSerializer<S> {
    slot: S,
    variant: &'static CStr,
    inner: CompletableDocumentWriter,
}

impl<S: Slot> SerializeStructVariant for StructVariantSerializer<S> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        write_field(&mut self.inner, CStr::from_str(key)?, value)
    }

    fn end(self) -> Result<()> {
        let doc = self.inner.build();
        self.slot
            .document()
            .write_bson(self.variant, BsonRef::Document(&doc));
        Ok(())
    }
}

/// Serializes map keys. Strings are used as they are; integers, booleans and unit variants are
/// stringified.
struct KeySerializer;

fn key_must_be_a_string() -> Error {
    Error::serialization("map keys must be strings, integers, booleans or unit variants")
}

macro_rules! stringified_keys {
    ($($method:ident($ty:ty)),*) => {$(
        fn $method(self, v: $ty) -> Result<CString> {
            CString::try_from(v.to_string())
        }
    )*};
}

macro_rules! rejected_keys {
    ($($method:ident($ty:ty)),*) => {$(
        fn $method(self, _v: $ty) -> Result<CString> {
            Err(key_must_be_a_string())
        }
    )*};
}

impl Serializer for KeySerializer {
    type Ok = CString;
    type Error = Error;

    type SerializeSeq = Impossible<CString, Error>;
    type SerializeTuple = Impossible<CString, Error>;
    type SerializeTupleStruct = Impossible<CString, Error>;
    type SerializeTupleVariant = Impossible<CString, Error>;
    type SerializeMap = Impossible<CString, Error>;
    type SerializeStruct = Impossible<CString, Error>;
    type SerializeStructVariant = Impossible<CString, Error>;

    stringified_keys!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_char(char),
        serialize_str(&str)
    );

    rejected_keys!(serialize_f32(f32), serialize_f64(f64), serialize_bytes(&[u8]));

    fn serialize_none(self) -> Result<CString> {
        Err(key_must_be_a_string())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<CString> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<CString> {
        Err(key_must_be_a_string())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CString> {
        Err(key_must_be_a_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<CString> {
        CString::try_from(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<CString> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<CString> {
        Err(key_must_be_a_string())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_must_be_a_string())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_must_be_a_string())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_must_be_a_string())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_must_be_a_string())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_newtype_struct(OBJECT_ID_NEWTYPE, Bytes::new(&self.bytes()))
        }
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_i64(self.timestamp_millis())
        } else {
            let bytes = self.timestamp_millis().to_le_bytes();
            serializer.serialize_newtype_struct(DATETIME_NEWTYPE, Bytes::new(&bytes))
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_u64(self.to_u64())
        } else {
            serializer.serialize_newtype_struct(TIMESTAMP_NEWTYPE, Bytes::new(&self.to_le_bytes()))
        }
    }
}

impl Serialize for Decimal128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DECIMAL128_NEWTYPE, Bytes::new(&self.bytes()))
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut bytes = Vec::with_capacity(self.bytes.len() + 1);
        bytes.push(u8::from(self.subtype));
        bytes.extend_from_slice(&self.bytes);
        serializer.serialize_newtype_struct(BINARY_NEWTYPE, Bytes::new(&bytes))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The `[element type] ++ value bytes` layout of [`NewtypeHint::RawValue`].
fn raw_value_bytes(value: &Bson) -> Result<Vec<u8>> {
    let mut bytes = vec![value.element_type() as u8];
    match value {
        Bson::JavaScriptCodeWithScope(code) => {
            let scope = code.scope.to_raw_document_buf()?;
            codec::append_value(
                &mut bytes,
                BsonRef::JavaScriptCodeWithScope(JavaScriptCodeWithScopeRef {
                    code: &code.code,
                    scope: &scope,
                }),
            );
        }
        other => match other.as_scalar_ref() {
            Some(value) => codec::append_value(&mut bytes, value),
            None => return Err(Error::serialization("containers have no raw value form")),
        },
    }
    Ok(bytes)
}

impl Serialize for Bson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Bson::Double(v) => serializer.serialize_f64(*v),
            Bson::String(v) => serializer.serialize_str(v),
            Bson::Array(v) => v.serialize(serializer),
            Bson::Document(v) => v.serialize(serializer),
            Bson::Boolean(v) => serializer.serialize_bool(*v),
            Bson::Null => serializer.serialize_unit(),
            Bson::Int32(v) => serializer.serialize_i32(*v),
            Bson::Int64(v) => serializer.serialize_i64(*v),
            Bson::ObjectId(v) => v.serialize(serializer),
            Bson::DateTime(v) => v.serialize(serializer),
            Bson::Timestamp(v) => v.serialize(serializer),
            Bson::Decimal128(v) => v.serialize(serializer),
            Bson::Binary(v) => v.serialize(serializer),
            other if serializer.is_human_readable() => serializer.collect_str(other),
            other => {
                let bytes = raw_value_bytes(other).map_err(serde::ser::Error::custom)?;
                serializer.serialize_newtype_struct(RAW_VALUE_NEWTYPE, Bytes::new(&bytes))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde::Serialize;
    use std::collections::BTreeMap;

    use super::{encode_to_bson, write_field};
    use crate::{
        Bson,
        Document,
        Regex,
        cstr,
        error::ErrorKind,
        oid::ObjectId,
        raw::build_document,
        writer::FieldWriter,
    };

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Line(i32, i32),
        Rect { w: i32, h: i32 },
    }

    #[test]
    fn enums_use_the_externally_tagged_form() {
        #[derive(Serialize)]
        struct Shapes {
            shapes: Vec<Shape>,
        }

        let doc = encode_to_bson(&Shapes {
            shapes: vec![
                Shape::Point,
                Shape::Circle(1.5),
                Shape::Line(1, 2),
                Shape::Rect { w: 3, h: 4 },
            ],
        })
        .unwrap();
        assert_eq!(
            doc.to_string(),
            r#"{"shapes": ["Point", {"Circle": 1.5}, {"Line": [1, 2]}, {"Rect": {"w": 3, "h": 4}}]}"#
        );
    }

    #[test]
    fn integers_widen() {
        #[derive(Serialize)]
        struct Ints {
            a: u8,
            b: u32,
            c: u64,
        }

        let doc = encode_to_bson(&Ints { a: 1, b: 2, c: 3 }).unwrap();
        let mut reader = doc.reader();
        assert_eq!(reader.read("a").unwrap().unwrap().read_int32().unwrap(), 1);
        assert_eq!(reader.read("b").unwrap().unwrap().read_int64().unwrap(), 2);
        assert_eq!(reader.read("c").unwrap().unwrap().read_int64().unwrap(), 3);

        let err = encode_to_bson(&Ints {
            a: 0,
            b: 0,
            c: u64::MAX,
        })
        .unwrap_err();
        assert_matches!(err.kind, ErrorKind::Serialization { .. });
        assert_eq!(err.key.as_deref(), Some("c"));
    }

    #[test]
    fn top_level_must_be_a_document() {
        assert_matches!(
            encode_to_bson(&42).unwrap_err().kind,
            ErrorKind::Serialization { .. }
        );
        assert_matches!(
            encode_to_bson(&[1, 2]).unwrap_err().kind,
            ErrorKind::Serialization { .. }
        );
    }

    #[test]
    fn map_keys_are_stringified() {
        let mut map = BTreeMap::new();
        map.insert(1, "one");
        map.insert(2, "two");
        assert_eq!(
            encode_to_bson(&map).unwrap().to_string(),
            r#"{"1": "one", "2": "two"}"#
        );
    }

    #[test]
    fn value_types_keep_their_bson_type() {
        let mut doc = Document::new();
        doc.insert("id", ObjectId::from_bytes([7; 12]));
        doc.insert("re", Regex::new("a+", "xi").unwrap());
        doc.insert("min", Bson::MinKey);

        let encoded = encode_to_bson(&doc).unwrap();
        assert_eq!(encoded.to_document().unwrap(), doc);
    }

    #[test]
    fn writes_into_the_eager_backend() {
        let mut doc = Document::new();
        write_field(&mut doc, cstr!("xs"), &vec![1, 2]).unwrap();
        doc.write_bool(cstr!("ok"), true);

        let raw = build_document(|w| {
            write_field(w, cstr!("xs"), &vec![1, 2]).unwrap();
            w.write_bool(cstr!("ok"), true);
        });
        assert_eq!(doc.encode_to_vec().unwrap(), raw.to_vec());
    }
}
