//! The two writer capabilities every backend implements.
//!
//! A [`FieldWriter`] appends named fields to a document; a [`ValueWriter`] appends unnamed values
//! to an array, which receive the keys `"0"`, `"1"`, … in order. Opening a nested document or
//! array hands out a child writer that borrows its parent; the child is closed, and its length
//! recorded, when it is dropped.
//!
//! Both traits funnel every scalar through a single primitive (`write_bson`), so a backend only
//! has to say how one [`BsonRef`] is appended and how nested writers are opened.
//!
//! Writers for the deprecated types (Symbol, Undefined, DBPointer and JavaScript code with scope)
//! live on [`LegacyFieldWriter`] and [`LegacyValueWriter`], which must be imported explicitly.
//! Values of those types can still be copied verbatim through `write_bson`.

use crate::{
    BsonRef,
    DateTime,
    Decimal128,
    RawDocument,
    Timestamp,
    bson_ref::{BinaryRef, DbPointerRef, JavaScriptCodeWithScopeRef, RegexRef},
    cstr::CStr,
    oid::ObjectId,
    spec::BinarySubtype,
};

/// Appends named fields to a document.
pub trait FieldWriter {
    /// The writer for a nested document opened by [`FieldWriter::open_document`].
    type DocumentWriter<'w>: FieldWriter
    where
        Self: 'w;

    /// The writer for a nested array opened by [`FieldWriter::open_array`].
    type ArrayWriter<'w>: ValueWriter
    where
        Self: 'w;

    /// Append `value` under `name`. Documents and arrays inside `value` are copied verbatim.
    fn write_bson(&mut self, name: &CStr, value: BsonRef<'_>);

    /// Open a nested document under `name`. It is closed when the returned writer is dropped.
    fn open_document(&mut self, name: &CStr) -> Self::DocumentWriter<'_>;

    /// Open a nested array under `name`. It is closed when the returned writer is dropped.
    fn open_array(&mut self, name: &CStr) -> Self::ArrayWriter<'_>;

    /// Write a nested document whose fields are produced by `f`.
    fn write_document<'w>(
        &'w mut self,
        name: &CStr,
        f: impl FnOnce(&mut Self::DocumentWriter<'w>),
    ) {
        let mut writer = self.open_document(name);
        f(&mut writer);
    }

    /// Write a nested array whose elements are produced by `f`.
    fn write_array<'w>(&'w mut self, name: &CStr, f: impl FnOnce(&mut Self::ArrayWriter<'w>)) {
        let mut writer = self.open_array(name);
        f(&mut writer);
    }

    fn write_f64(&mut self, name: &CStr, value: f64) {
        self.write_bson(name, BsonRef::Double(value));
    }

    fn write_str(&mut self, name: &CStr, value: &str) {
        self.write_bson(name, BsonRef::String(value));
    }

    fn write_binary(&mut self, name: &CStr, subtype: BinarySubtype, bytes: &[u8]) {
        self.write_bson(name, BsonRef::Binary(BinaryRef { subtype, bytes }));
    }

    fn write_object_id(&mut self, name: &CStr, value: ObjectId) {
        self.write_bson(name, BsonRef::ObjectId(value));
    }

    fn write_bool(&mut self, name: &CStr, value: bool) {
        self.write_bson(name, BsonRef::Boolean(value));
    }

    fn write_datetime(&mut self, name: &CStr, value: DateTime) {
        self.write_bson(name, BsonRef::DateTime(value));
    }

    fn write_null(&mut self, name: &CStr) {
        self.write_bson(name, BsonRef::Null);
    }

    fn write_regex(&mut self, name: &CStr, pattern: &CStr, options: &CStr) {
        self.write_bson(
            name,
            BsonRef::RegularExpression(RegexRef { pattern, options }),
        );
    }

    fn write_javascript(&mut self, name: &CStr, code: &str) {
        self.write_bson(name, BsonRef::JavaScriptCode(code));
    }

    fn write_i32(&mut self, name: &CStr, value: i32) {
        self.write_bson(name, BsonRef::Int32(value));
    }

    fn write_timestamp(&mut self, name: &CStr, value: Timestamp) {
        self.write_bson(name, BsonRef::Timestamp(value));
    }

    fn write_i64(&mut self, name: &CStr, value: i64) {
        self.write_bson(name, BsonRef::Int64(value));
    }

    fn write_decimal128(&mut self, name: &CStr, value: Decimal128) {
        self.write_bson(name, BsonRef::Decimal128(value));
    }

    fn write_min_key(&mut self, name: &CStr) {
        self.write_bson(name, BsonRef::MinKey);
    }

    fn write_max_key(&mut self, name: &CStr) {
        self.write_bson(name, BsonRef::MaxKey);
    }
}

/// Appends unnamed values to an array.
pub trait ValueWriter {
    /// The writer for a nested document opened by [`ValueWriter::open_document`].
    type DocumentWriter<'w>: FieldWriter
    where
        Self: 'w;

    /// The writer for a nested array opened by [`ValueWriter::open_array`].
    type ArrayWriter<'w>: ValueWriter
    where
        Self: 'w;

    /// Append `value` as the next element.
    fn write_bson(&mut self, value: BsonRef<'_>);

    /// Open a nested document as the next element.
    fn open_document(&mut self) -> Self::DocumentWriter<'_>;

    /// Open a nested array as the next element.
    fn open_array(&mut self) -> Self::ArrayWriter<'_>;

    /// Write a nested document whose fields are produced by `f`.
    fn write_document<'w>(&'w mut self, f: impl FnOnce(&mut Self::DocumentWriter<'w>)) {
        let mut writer = self.open_document();
        f(&mut writer);
    }

    /// Write a nested array whose elements are produced by `f`.
    fn write_array<'w>(&'w mut self, f: impl FnOnce(&mut Self::ArrayWriter<'w>)) {
        let mut writer = self.open_array();
        f(&mut writer);
    }

    fn write_f64(&mut self, value: f64) {
        self.write_bson(BsonRef::Double(value));
    }

    fn write_str(&mut self, value: &str) {
        self.write_bson(BsonRef::String(value));
    }

    fn write_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) {
        self.write_bson(BsonRef::Binary(BinaryRef { subtype, bytes }));
    }

    fn write_object_id(&mut self, value: ObjectId) {
        self.write_bson(BsonRef::ObjectId(value));
    }

    fn write_bool(&mut self, value: bool) {
        self.write_bson(BsonRef::Boolean(value));
    }

    fn write_datetime(&mut self, value: DateTime) {
        self.write_bson(BsonRef::DateTime(value));
    }

    fn write_null(&mut self) {
        self.write_bson(BsonRef::Null);
    }

    fn write_regex(&mut self, pattern: &CStr, options: &CStr) {
        self.write_bson(BsonRef::RegularExpression(RegexRef { pattern, options }));
    }

    fn write_javascript(&mut self, code: &str) {
        self.write_bson(BsonRef::JavaScriptCode(code));
    }

    fn write_i32(&mut self, value: i32) {
        self.write_bson(BsonRef::Int32(value));
    }

    fn write_timestamp(&mut self, value: Timestamp) {
        self.write_bson(BsonRef::Timestamp(value));
    }

    fn write_i64(&mut self, value: i64) {
        self.write_bson(BsonRef::Int64(value));
    }

    fn write_decimal128(&mut self, value: Decimal128) {
        self.write_bson(BsonRef::Decimal128(value));
    }

    fn write_min_key(&mut self) {
        self.write_bson(BsonRef::MinKey);
    }

    fn write_max_key(&mut self) {
        self.write_bson(BsonRef::MaxKey);
    }
}

/// Writers for the deprecated BSON types. Implemented for every [`FieldWriter`].
pub trait LegacyFieldWriter: FieldWriter {
    #[deprecated(note = "Symbol is deprecated in the BSON specification; write a string")]
    fn write_symbol(&mut self, name: &CStr, value: &str) {
        self.write_bson(name, BsonRef::Symbol(value));
    }

    #[deprecated(note = "Undefined is deprecated in the BSON specification; write null")]
    fn write_undefined(&mut self, name: &CStr) {
        self.write_bson(name, BsonRef::Undefined);
    }

    #[deprecated(note = "DBPointer is deprecated in the BSON specification; write a DBRef")]
    fn write_db_pointer(&mut self, name: &CStr, namespace: &str, id: ObjectId) {
        self.write_bson(name, BsonRef::DbPointer(DbPointerRef::new(namespace, id)));
    }

    #[deprecated(
        note = "JavaScript code with scope is deprecated in the BSON specification; write code"
    )]
    fn write_javascript_with_scope(&mut self, name: &CStr, code: &str, scope: &RawDocument) {
        self.write_bson(
            name,
            BsonRef::JavaScriptCodeWithScope(JavaScriptCodeWithScopeRef { code, scope }),
        );
    }
}

impl<W: FieldWriter + ?Sized> LegacyFieldWriter for W {}

/// Writers for the deprecated BSON types. Implemented for every [`ValueWriter`].
pub trait LegacyValueWriter: ValueWriter {
    #[deprecated(note = "Symbol is deprecated in the BSON specification; write a string")]
    fn write_symbol(&mut self, value: &str) {
        self.write_bson(BsonRef::Symbol(value));
    }

    #[deprecated(note = "Undefined is deprecated in the BSON specification; write null")]
    fn write_undefined(&mut self) {
        self.write_bson(BsonRef::Undefined);
    }

    #[deprecated(note = "DBPointer is deprecated in the BSON specification; write a DBRef")]
    fn write_db_pointer(&mut self, namespace: &str, id: ObjectId) {
        self.write_bson(BsonRef::DbPointer(DbPointerRef::new(namespace, id)));
    }

    #[deprecated(
        note = "JavaScript code with scope is deprecated in the BSON specification; write code"
    )]
    fn write_javascript_with_scope(&mut self, code: &str, scope: &RawDocument) {
        self.write_bson(BsonRef::JavaScriptCodeWithScope(
            JavaScriptCodeWithScopeRef { code, scope },
        ));
    }
}

impl<W: ValueWriter + ?Sized> LegacyValueWriter for W {}
