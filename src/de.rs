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

//! Deserializer

use std::{fmt, marker::PhantomData};

use bytes::Bytes;
use serde::de::{
    self,
    Deserialize,
    DeserializeOwned,
    DeserializeSeed,
    Deserializer,
    EnumAccess,
    IntoDeserializer,
    MapAccess,
    SeqAccess,
    VariantAccess,
    Visitor,
};

use crate::{
    Binary,
    Bson,
    BsonRef,
    DateTime,
    Decimal128,
    Document,
    Timestamp,
    codec,
    error::{Error, Result},
    oid::ObjectId,
    raw::{ArrayReader, DocumentReader, ValueReader, read_document},
    ser::{
        BINARY_NEWTYPE,
        DATETIME_NEWTYPE,
        DECIMAL128_NEWTYPE,
        NewtypeHint,
        OBJECT_ID_NEWTYPE,
        RAW_VALUE_NEWTYPE,
        TIMESTAMP_NEWTYPE,
    },
    spec::ElementType,
};

/// Decode a `T` from the bytes of a BSON document.
///
/// Struct fields are requested by name, so the document is scanned only as far as the last
/// field `T` declares. A field that is absent fails with
/// [`ErrorKind::MissingField`](crate::error::ErrorKind::MissingField) unless `T` marks it
/// optional or defaulted.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Cat {
///     name: String,
///     lives: i32,
/// }
///
/// let tom = Cat { name: "Tom".into(), lives: 9 };
/// let doc = lazybson::encode_to_bson(&tom)?;
/// let decoded: Cat = lazybson::decode_from_bson(doc.into_bytes())?;
/// assert_eq!(decoded, tom);
/// # Ok::<(), lazybson::error::Error>(())
/// ```
pub fn decode_from_bson<T: DeserializeOwned>(bytes: impl Into<Bytes>) -> Result<T> {
    let mut reader = read_document(bytes)?.reader();
    decode_from_reader(&mut reader)
}

/// Decode a `T` through an existing reader. Fields scanned while decoding stay cached in
/// `reader`.
pub fn decode_from_reader<T: DeserializeOwned>(reader: &mut DocumentReader) -> Result<T> {
    T::deserialize(DocumentDeserializer { reader })
}

fn hinted_type(hint: NewtypeHint) -> Option<ElementType> {
    match hint {
        NewtypeHint::ObjectId => Some(ElementType::ObjectId),
        NewtypeHint::DateTime => Some(ElementType::DateTime),
        NewtypeHint::Timestamp => Some(ElementType::Timestamp),
        NewtypeHint::Decimal128 => Some(ElementType::Decimal128),
        NewtypeHint::Binary => Some(ElementType::Binary),
        NewtypeHint::RawValue => None,
    }
}

fn raw_value_bytes(element_type: ElementType, value: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len() + 1);
    bytes.push(element_type as u8);
    bytes.extend_from_slice(value);
    bytes
}

/// Deserializes a whole document out of a [`DocumentReader`].
struct DocumentDeserializer<'a> {
    reader: &'a mut DocumentReader,
}

impl<'de> Deserializer<'de> for DocumentDeserializer<'_> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(DocumentAccess::new(self.reader)?)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(StructAccess {
            reader: self.reader,
            fields: fields.iter(),
            current: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(EnumDocument {
            reader: self.reader,
        })
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match NewtypeHint::from_name(name) {
            None => visitor.visit_newtype_struct(self),
            Some(NewtypeHint::RawValue) => visitor.visit_bytes(&raw_value_bytes(
                ElementType::EmbeddedDocument,
                self.reader.as_raw_document().as_bytes(),
            )),
            Some(hint) => Err(Error::type_mismatch(
                hinted_type(hint).unwrap_or(ElementType::EmbeddedDocument),
                ElementType::EmbeddedDocument,
            )),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string bytes byte_buf
        unit unit_struct seq tuple tuple_struct map identifier
    }
}

/// Visits every field of a document in order. Forces a full scan.
struct DocumentAccess<'a> {
    reader: &'a mut DocumentReader,
    index: usize,
    len: usize,
}

impl<'a> DocumentAccess<'a> {
    fn new(reader: &'a mut DocumentReader) -> Result<Self> {
        let len = reader.len()?;
        Ok(Self {
            reader,
            index: 0,
            len,
        })
    }
}

impl<'de> MapAccess<'de> for DocumentAccess<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        if self.index >= self.len {
            return Ok(None);
        }
        match self.reader.entry_at_mut(self.index) {
            Some((key, _)) => seed.deserialize(key.into_deserializer()).map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let index = self.index;
        self.index += 1;
        let (key, value) = self
            .reader
            .entry_at_mut(index)
            .ok_or_else(|| Error::deserialization("map value requested past the last field"))?;
        seed.deserialize(ValueDeserializer { value })
            .map_err(|e| e.with_key(key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len - self.index)
    }
}

/// Visits only the fields a struct declares, each looked up by name. Fields absent from the
/// document are skipped, leaving serde to report them missing or fill in defaults.
struct StructAccess<'a> {
    reader: &'a mut DocumentReader,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<&'static str>,
}

impl<'de> MapAccess<'de> for StructAccess<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        for &field in self.fields.by_ref() {
            if self.reader.contains(field)? {
                self.current = Some(field);
                return seed.deserialize(field.into_deserializer()).map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let field = self
            .current
            .take()
            .ok_or_else(|| Error::deserialization("struct value requested before its key"))?;
        let value = self
            .reader
            .read_mut(field)?
            .ok_or_else(|| Error::missing_field(field))?;
        seed.deserialize(ValueDeserializer { value })
            .map_err(|e| e.with_key(field))
    }
}

/// Reads an enum stored as `{"Variant": content}`.
struct EnumDocument<'a> {
    reader: &'a mut DocumentReader,
}

impl<'de, 'a> EnumAccess<'de> for EnumDocument<'a> {
    type Error = Error;
    type Variant = VariantContent<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let EnumDocument { reader } = self;
        if reader.len()? != 1 {
            return Err(Error::deserialization(
                "expected a document with exactly one key for an enum variant",
            ));
        }
        let (key, value) = reader
            .entry_at_mut(0)
            .ok_or_else(|| Error::deserialization("enum document has no variant"))?;
        let key: de::value::StrDeserializer<'_, Error> = key.into_deserializer();
        let variant = seed.deserialize(key)?;
        Ok((variant, VariantContent { value }))
    }
}

struct VariantContent<'a> {
    value: &'a mut ValueReader,
}

impl<'de> VariantAccess<'de> for VariantContent<'_> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        <()>::deserialize(ValueDeserializer { value: self.value })
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(ValueDeserializer { value: self.value })
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        ValueDeserializer { value: self.value }.deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        ValueDeserializer { value: self.value }.deserialize_struct("", fields, visitor)
    }
}

/// Visits the elements of an array, scanning one element ahead at a time.
struct ArrayAccess<'a> {
    reader: &'a mut ArrayReader,
    index: usize,
}

impl<'de> SeqAccess<'de> for ArrayAccess<'_> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let index = self.index;
        match self.reader.read_mut(index)? {
            Some(value) => {
                self.index += 1;
                seed.deserialize(ValueDeserializer { value })
                    .map(Some)
                    .map_err(|e| e.with_index(index))
            }
            None => Ok(None),
        }
    }
}

/// Deserializes one value held by a [`ValueReader`].
struct ValueDeserializer<'a> {
    value: &'a mut ValueReader,
}

impl ValueDeserializer<'_> {
    fn mismatch(&self, expected: ElementType) -> Error {
        Error::type_mismatch(expected, self.value.element_type())
    }

    fn deserialize_hinted<'de, V: Visitor<'de>>(
        self,
        hint: NewtypeHint,
        visitor: V,
    ) -> Result<V::Value> {
        match hint {
            NewtypeHint::ObjectId => visitor.visit_bytes(&self.value.read_object_id()?.bytes()),
            NewtypeHint::DateTime => visitor.visit_bytes(
                &self
                    .value
                    .read_datetime()?
                    .timestamp_millis()
                    .to_le_bytes(),
            ),
            NewtypeHint::Timestamp => {
                visitor.visit_bytes(&self.value.read_timestamp()?.to_le_bytes())
            }
            NewtypeHint::Decimal128 => {
                visitor.visit_bytes(&self.value.read_decimal128()?.bytes())
            }
            NewtypeHint::Binary => {
                let binary = self.value.read_binary()?;
                let mut bytes = Vec::with_capacity(binary.bytes.len() + 1);
                bytes.push(u8::from(binary.subtype));
                bytes.extend_from_slice(binary.bytes);
                visitor.visit_byte_buf(bytes)
            }
            NewtypeHint::RawValue => visitor.visit_byte_buf(raw_value_bytes(
                self.value.element_type(),
                self.value.as_bytes(),
            )),
        }
    }
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let element_type = self.value.element_type();
        match element_type {
            ElementType::EmbeddedDocument => DocumentDeserializer {
                reader: self.value.as_document_mut()?,
            }
            .deserialize_any(visitor),
            ElementType::Array => visitor.visit_seq(ArrayAccess {
                reader: self.value.as_array_mut()?,
                index: 0,
            }),
            _ => match self.value.as_bson_ref()? {
                BsonRef::Double(v) => visitor.visit_f64(v),
                BsonRef::String(v) | BsonRef::JavaScriptCode(v) | BsonRef::Symbol(v) => {
                    visitor.visit_str(v)
                }
                BsonRef::Binary(v) => visitor.visit_bytes(v.bytes),
                BsonRef::Null | BsonRef::Undefined | BsonRef::MinKey | BsonRef::MaxKey => {
                    visitor.visit_unit()
                }
                BsonRef::ObjectId(v) => visitor.visit_string(v.to_hex()),
                BsonRef::Boolean(v) => visitor.visit_bool(v),
                BsonRef::DateTime(v) => visitor.visit_i64(v.timestamp_millis()),
                BsonRef::Int32(v) => visitor.visit_i32(v),
                BsonRef::Timestamp(v) => visitor.visit_u64(v.to_u64()),
                BsonRef::Int64(v) => visitor.visit_i64(v),
                BsonRef::Decimal128(v) => visitor.visit_bytes(&v.bytes()),
                BsonRef::RegularExpression(_)
                | BsonRef::DbPointer(_)
                | BsonRef::JavaScriptCodeWithScope(_)
                | BsonRef::Document(_)
                | BsonRef::Array(_) => Err(Error::deserialization(format!(
                    "{element_type} has no plain serde form; deserialize it as Bson"
                ))),
            },
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value.element_type() {
            ElementType::Null | ElementType::Undefined => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match NewtypeHint::from_name(name) {
            Some(hint) => self.deserialize_hinted(hint, visitor),
            None => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        if self.value.element_type() != ElementType::EmbeddedDocument {
            return Err(self.mismatch(ElementType::EmbeddedDocument));
        }
        DocumentDeserializer {
            reader: self.value.as_document_mut()?,
        }
        .deserialize_struct(name, fields, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.value.element_type() != ElementType::EmbeddedDocument {
            return Err(self.mismatch(ElementType::EmbeddedDocument));
        }
        visitor.visit_map(DocumentAccess::new(self.value.as_document_mut()?)?)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.value.element_type() != ElementType::Array {
            return Err(self.mismatch(ElementType::Array));
        }
        visitor.visit_seq(ArrayAccess {
            reader: self.value.as_array_mut()?,
            index: 0,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value.element_type() {
            ElementType::String => {
                let variant = self.value.read_string()?;
                visitor.visit_enum(variant.into_deserializer())
            }
            ElementType::EmbeddedDocument => DocumentDeserializer {
                reader: self.value.as_document_mut()?,
            }
            .deserialize_enum(name, variants, visitor),
            _ => Err(self.mismatch(ElementType::String)),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value.element_type() {
            ElementType::Binary => visitor.visit_bytes(self.value.read_binary()?.bytes),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        unit unit_struct identifier
    }
}

/// A value type carried through serde as newtype-wrapped bytes.
trait HintedBytes: Sized {
    const NEWTYPE: &'static str;
    const EXPECTING: &'static str;

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self>;
}

impl HintedBytes for ObjectId {
    const NEWTYPE: &'static str = OBJECT_ID_NEWTYPE;
    const EXPECTING: &'static str = "12 ObjectId bytes";

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(ObjectId::from_bytes)
    }
}

impl HintedBytes for DateTime {
    const NEWTYPE: &'static str = DATETIME_NEWTYPE;
    const EXPECTING: &'static str = "8 DateTime bytes";

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self> {
        bytes
            .try_into()
            .ok()
            .map(|b| DateTime::from_millis(i64::from_le_bytes(b)))
    }
}

impl HintedBytes for Timestamp {
    const NEWTYPE: &'static str = TIMESTAMP_NEWTYPE;
    const EXPECTING: &'static str = "8 Timestamp bytes";

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Timestamp::from_le_bytes)
    }
}

impl HintedBytes for Decimal128 {
    const NEWTYPE: &'static str = DECIMAL128_NEWTYPE;
    const EXPECTING: &'static str = "16 Decimal128 bytes";

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Decimal128::from_bytes)
    }
}

impl HintedBytes for Binary {
    const NEWTYPE: &'static str = BINARY_NEWTYPE;
    const EXPECTING: &'static str = "a binary subtype followed by the payload";

    fn from_hinted_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.split_first().map(|(subtype, payload)| Binary {
            subtype: (*subtype).into(),
            bytes: payload.to_vec(),
        })
    }
}

struct HintedBytesVisitor<T>(PhantomData<T>);

impl<T> HintedBytesVisitor<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<'de, T: HintedBytes> Visitor<'de> for HintedBytesVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(T::EXPECTING)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<T, E> {
        T::from_hinted_bytes(v).ok_or_else(|| E::invalid_length(v.len(), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<T, A::Error> {
        let mut bytes = Vec::new();
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        self.visit_bytes(&bytes)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<T, D::Error> {
        deserializer.deserialize_bytes(self)
    }
}

fn deserialize_hinted<'de, T: HintedBytes, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<T, D::Error> {
    deserializer.deserialize_newtype_struct(T::NEWTYPE, HintedBytesVisitor::<T>::new())
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let hex = String::deserialize(deserializer)?;
            ObjectId::parse_str(&hex).map_err(de::Error::custom)
        } else {
            deserialize_hinted(deserializer)
        }
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            i64::deserialize(deserializer).map(DateTime::from_millis)
        } else {
            deserialize_hinted(deserializer)
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            u64::deserialize(deserializer).map(Timestamp::from_u64)
        } else {
            deserialize_hinted(deserializer)
        }
    }
}

impl<'de> Deserialize<'de> for Decimal128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_hinted(deserializer)
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_hinted(deserializer)
    }
}

/// Decodes the `[element type] ++ value bytes` form handed out for [`RAW_VALUE_NEWTYPE`], and
/// falls back to [`BsonVisitor`] for other formats.
struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = Bson;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a BSON value")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Bson, E> {
        let decode = || -> Result<Bson> {
            let (tag, value) = v
                .split_first()
                .ok_or_else(|| Error::deserialization("raw value without an element type"))?;
            let element_type = ElementType::from(*tag).ok_or_else(|| Error::unknown_type(*tag))?;
            codec::decode_value(element_type, value)?.to_bson()
        };
        decode().map_err(E::custom)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Bson, D::Error> {
        deserializer.deserialize_any(BsonVisitor)
    }
}

/// Builds a [`Bson`] from the plain serde data model.
struct BsonVisitor;

impl<'de> Visitor<'de> for BsonVisitor {
    type Value = Bson;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a BSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Bson, E> {
        Ok(Bson::Boolean(v))
    }

    fn visit_i32<E: de::Error>(self, v: i32) -> std::result::Result<Bson, E> {
        Ok(Bson::Int32(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Bson, E> {
        Ok(Bson::Int64(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Bson, E> {
        i64::try_from(v)
            .map(Bson::Int64)
            .map_err(|_| E::custom(format!("{v} does not fit in a BSON int64")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Bson, E> {
        Ok(Bson::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Bson, E> {
        Ok(Bson::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Bson, E> {
        Ok(Bson::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Bson, E> {
        Ok(Bson::Binary(Binary {
            subtype: crate::spec::BinarySubtype::Generic,
            bytes: v.to_vec(),
        }))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Bson, E> {
        Ok(Bson::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Bson, E> {
        Ok(Bson::Null)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Bson, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Bson, A::Error> {
        let mut array = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<Bson>()? {
            array.push(value);
        }
        Ok(Bson::Array(array))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Bson, A::Error> {
        let mut doc = Document::new();
        while let Some((key, value)) = map.next_entry::<String, Bson>()? {
            doc.append(key, value);
        }
        Ok(Bson::Document(doc))
    }
}

impl<'de> Deserialize<'de> for Bson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(RAW_VALUE_NEWTYPE, RawValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Bson::deserialize(deserializer)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(&other.element_type().to_string()),
                &"a document",
            )),
        }
    }
}
