use super::{ArrayReader, DocumentReader, RawArrayBuf, RawDocumentBuf};
use crate::{
    Bson,
    BsonRef,
    DateTime,
    Decimal128,
    Timestamp,
    buf::Span,
    bson_ref::{BinaryRef, DbPointerRef, JavaScriptCodeWithScopeRef, RegexRef},
    codec,
    error::{Error, Result},
    oid::ObjectId,
    spec::ElementType,
};

#[derive(Clone, Debug)]
enum Nested {
    Document(DocumentReader),
    Array(ArrayReader),
}

/// One field (or array element) located by a [`DocumentReader`] or [`ArrayReader`].
///
/// Holds the element type and the span of the value bytes. Scalar accessors decode the bytes on
/// every call; there is one per BSON type, and each fails with
/// [`ErrorKind::TypeMismatch`](crate::error::ErrorKind::TypeMismatch) if the value is stored with
/// a different type.
#[derive(Clone, Debug)]
pub struct ValueReader {
    element_type: ElementType,
    span: Span,
    nested: Option<Nested>,
}

macro_rules! typed_accessor {
    ($(#[$attr:meta])* $name:ident, $element_type:ident, $out:ty, $pat:pat => $value:expr) => {
        $(#[$attr])*
        pub fn $name(&self) -> Result<$out> {
            match self.expect(ElementType::$element_type)? {
                $pat => Ok($value),
                other => Err(Error::type_mismatch(
                    ElementType::$element_type,
                    other.element_type(),
                )),
            }
        }
    };
}

impl ValueReader {
    pub(crate) fn new(element_type: ElementType, span: Span) -> Self {
        Self {
            element_type,
            span,
            nested: None,
        }
    }

    /// The stored type of this value.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The raw value bytes, without tag or name.
    pub fn as_bytes(&self) -> &[u8] {
        &self.span
    }

    /// The span of the raw value bytes.
    pub fn as_span(&self) -> &Span {
        &self.span
    }

    /// Decode the value as a borrowed [`BsonRef`].
    pub fn as_bson_ref(&self) -> Result<BsonRef<'_>> {
        codec::decode_value(self.element_type, &self.span)
    }

    /// Decode the value, recursively, into an owned [`Bson`].
    pub fn to_bson(&self) -> Result<Bson> {
        self.as_bson_ref()?.to_bson()
    }

    fn expect(&self, expected: ElementType) -> Result<BsonRef<'_>> {
        if self.element_type != expected {
            return Err(Error::type_mismatch(expected, self.element_type));
        }
        self.as_bson_ref()
    }

    typed_accessor!(
        /// Read a double.
        read_double, Double, f64, BsonRef::Double(v) => v
    );
    typed_accessor!(
        /// Read a UTF-8 string.
        read_string, String, &str, BsonRef::String(v) => v
    );
    typed_accessor!(
        /// Read a binary value.
        read_binary, Binary, BinaryRef<'_>, BsonRef::Binary(v) => v
    );
    typed_accessor!(
        /// Read an ObjectId.
        read_object_id, ObjectId, ObjectId, BsonRef::ObjectId(v) => v
    );
    typed_accessor!(
        /// Read a boolean.
        read_bool, Boolean, bool, BsonRef::Boolean(v) => v
    );
    typed_accessor!(
        /// Read a UTC datetime.
        read_datetime, DateTime, DateTime, BsonRef::DateTime(v) => v
    );
    typed_accessor!(
        /// Read a regular expression.
        read_regex, RegularExpression, RegexRef<'_>, BsonRef::RegularExpression(v) => v
    );
    typed_accessor!(
        /// Read a DB pointer (deprecated type).
        read_db_pointer, DbPointer, DbPointerRef<'_>, BsonRef::DbPointer(v) => v
    );
    typed_accessor!(
        /// Read JavaScript code.
        read_javascript, JavaScriptCode, &str, BsonRef::JavaScriptCode(v) => v
    );
    typed_accessor!(
        /// Read a symbol (deprecated type).
        read_symbol, Symbol, &str, BsonRef::Symbol(v) => v
    );
    typed_accessor!(
        /// Read JavaScript code with scope (deprecated type).
        read_javascript_with_scope,
        JavaScriptCodeWithScope,
        JavaScriptCodeWithScopeRef<'_>,
        BsonRef::JavaScriptCodeWithScope(v) => v
    );
    typed_accessor!(
        /// Read a 32-bit integer.
        read_int32, Int32, i32, BsonRef::Int32(v) => v
    );
    typed_accessor!(
        /// Read a timestamp.
        read_timestamp, Timestamp, Timestamp, BsonRef::Timestamp(v) => v
    );
    typed_accessor!(
        /// Read a 64-bit integer.
        read_int64, Int64, i64, BsonRef::Int64(v) => v
    );
    typed_accessor!(
        /// Read a 128-bit decimal.
        read_decimal128, Decimal128, Decimal128, BsonRef::Decimal128(v) => v
    );
    typed_accessor!(
        /// Check that the value is null.
        read_null, Null, (), BsonRef::Null => ()
    );
    typed_accessor!(
        /// Check that the value is undefined (deprecated type).
        read_undefined, Undefined, (), BsonRef::Undefined => ()
    );
    typed_accessor!(
        /// Check that the value is the min key.
        read_min_key, MinKey, (), BsonRef::MinKey => ()
    );
    typed_accessor!(
        /// Check that the value is the max key.
        read_max_key, MaxKey, (), BsonRef::MaxKey => ()
    );

    /// The embedded document, sharing this value's bytes.
    pub fn read_raw_document(&self) -> Result<RawDocumentBuf> {
        if self.element_type != ElementType::EmbeddedDocument {
            return Err(Error::type_mismatch(
                ElementType::EmbeddedDocument,
                self.element_type,
            ));
        }
        RawDocumentBuf::from_span(self.span.clone())
    }

    /// The embedded array, sharing this value's bytes.
    pub fn read_raw_array(&self) -> Result<RawArrayBuf> {
        if self.element_type != ElementType::Array {
            return Err(Error::type_mismatch(ElementType::Array, self.element_type));
        }
        RawArrayBuf::from_span(self.span.clone())
    }

    /// A reader over the embedded document.
    ///
    /// The returned reader is independent of this one: scanning it does not populate any cache
    /// here. If this value has been [materialized](ValueReader::materialize), a copy of the
    /// fully scanned nested reader is returned instead.
    pub fn read_document(&self) -> Result<DocumentReader> {
        match &self.nested {
            Some(Nested::Document(reader)) => Ok(reader.clone()),
            _ => Ok(self.read_raw_document()?.reader()),
        }
    }

    /// A reader over the embedded array. See [`ValueReader::read_document`].
    pub fn read_array(&self) -> Result<ArrayReader> {
        match &self.nested {
            Some(Nested::Array(reader)) => Ok(reader.clone()),
            _ => Ok(self.read_raw_array()?.reader()),
        }
    }

    /// The nested document reader cached in this value, created on first use. Everything it
    /// scans stays cached for later calls.
    pub fn as_document_mut(&mut self) -> Result<&mut DocumentReader> {
        if !matches!(self.nested, Some(Nested::Document(_))) {
            self.nested = Some(Nested::Document(self.read_raw_document()?.reader()));
        }
        match &mut self.nested {
            Some(Nested::Document(reader)) => Ok(reader),
            _ => Err(Error::type_mismatch(
                ElementType::EmbeddedDocument,
                self.element_type,
            )),
        }
    }

    /// The nested array reader cached in this value, created on first use.
    pub fn as_array_mut(&mut self) -> Result<&mut ArrayReader> {
        if !matches!(self.nested, Some(Nested::Array(_))) {
            self.nested = Some(Nested::Array(self.read_raw_array()?.reader()));
        }
        match &mut self.nested {
            Some(Nested::Array(reader)) => Ok(reader),
            _ => Err(Error::type_mismatch(ElementType::Array, self.element_type)),
        }
    }

    /// For documents and arrays, fully scan the nested reader cached in this value, recursively.
    /// Scalars are left alone.
    pub fn materialize(&mut self) -> Result<()> {
        match self.element_type {
            ElementType::EmbeddedDocument => self.as_document_mut()?.materialize(),
            ElementType::Array => self.as_array_mut()?.materialize(),
            _ => Ok(()),
        }
    }

    /// Whether a nested reader is cached in this value.
    pub fn is_materialized(&self) -> bool {
        self.nested.is_some()
    }
}
