//! A BSON document represented as an ordered list of fields with keyed lookup.
//!
//! [`Document`] is the eager backend: decoding parses every element up front, and writing
//! through [`FieldWriter`] builds the tree in memory. Encoding a `Document` produces the same
//! bytes as the streaming writers in [`raw`](crate::raw) for the same sequence of writes,
//! repeated names and malformed nested values included.

use std::{
    fmt::{self, Debug, Display, Formatter},
    iter::FusedIterator,
    mem,
    slice,
    vec,
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    Binary,
    Bson,
    BsonRef,
    DateTime,
    RawDocument,
    RawDocumentBuf,
    Timestamp,
    bson::{Array, Undecoded},
    bson_ref::JavaScriptCodeWithScopeRef,
    cstr::CStr,
    error::{Error, Result},
    oid::ObjectId,
    raw::{self, RawFieldWriter},
    spec::ElementType,
    writer::{FieldWriter, ValueWriter},
};

/// A BSON document: fields in write order, looked up by key.
///
/// A key may occur more than once, as it can in encoded BSON. Every occurrence is kept and
/// encoded, while lookups resolve to the first one, matching
/// [`DocumentReader`](crate::DocumentReader).
#[derive(Clone, Default)]
pub struct Document {
    fields: Vec<(String, Bson)>,
    /// Position in `fields` of the first occurrence of each key.
    index: IndexMap<String, usize>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Display for Document {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        crate::display::fmt_document(fmt, self)
    }
}

impl Debug for Document {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "Document(")?;
        fmt.debug_map().entries(self.iter()).finish()?;
        write!(fmt, ")")
    }
}

/// An iterator over the fields of a [`Document`], in write order.
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    inner: slice::Iter<'a, (String, Bson)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a String, &'a Bson);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, value)| (key, value))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

/// An owning iterator over the fields of a [`Document`], in write order.
#[derive(Debug)]
pub struct IntoIter {
    inner: vec::IntoIter<(String, Bson)>,
}

impl Iterator for IntoIter {
    type Item = (String, Bson);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for IntoIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for IntoIter {}

impl FusedIterator for IntoIter {}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Bson);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        Iter {
            inner: self.fields.iter(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Bson);
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter {
            inner: self.fields.into_iter(),
        }
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut doc = Document::new();
        doc.extend(iter);
        doc
    }
}

impl<K: Into<String>, V: Into<Bson>> Extend<(K, V)> for Document {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl Document {
    /// Creates a new empty Document.
    pub fn new() -> Document {
        Document {
            fields: Vec::new(),
            index: IndexMap::new(),
        }
    }

    /// Gets an iterator over the fields of the document, repeated keys included.
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Clears the document, removing all values.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.index.clear();
    }

    /// Returns a reference to the Bson corresponding to the first occurrence of the key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Bson> {
        let position = *self.index.get(key.as_ref())?;
        Some(&self.fields[position].1)
    }

    /// Gets a mutable reference to the Bson corresponding to the first occurrence of the key.
    pub fn get_mut(&mut self, key: impl AsRef<str>) -> Option<&mut Bson> {
        let position = *self.index.get(key.as_ref())?;
        Some(&mut self.fields[position].1)
    }

    fn get_typed<'a, T>(
        &'a self,
        key: &str,
        expected: ElementType,
        f: impl FnOnce(&'a Bson) -> Option<T>,
    ) -> Result<T> {
        let value = self
            .get(key)
            .ok_or_else(|| Error::missing_field(key).with_key(key))?;
        f(value).ok_or_else(|| Error::type_mismatch(expected, value.element_type()).with_key(key))
    }

    /// Get a floating point value for this key if it exists and has the correct type.
    pub fn get_f64(&self, key: impl AsRef<str>) -> Result<f64> {
        self.get_typed(key.as_ref(), ElementType::Double, Bson::as_f64)
    }

    /// Get a string slice this key if it exists and has the correct type.
    pub fn get_str(&self, key: impl AsRef<str>) -> Result<&str> {
        self.get_typed(key.as_ref(), ElementType::String, Bson::as_str)
    }

    /// Get a reference to an array for this key if it exists and has the correct type.
    pub fn get_array(&self, key: impl AsRef<str>) -> Result<&Array> {
        self.get_typed(key.as_ref(), ElementType::Array, Bson::as_array)
    }

    /// Get a reference to a document for this key if it exists and has the correct type.
    pub fn get_document(&self, key: impl AsRef<str>) -> Result<&Document> {
        self.get_typed(key.as_ref(), ElementType::EmbeddedDocument, Bson::as_document)
    }

    /// Get a bool value for this key if it exists and has the correct type.
    pub fn get_bool(&self, key: impl AsRef<str>) -> Result<bool> {
        self.get_typed(key.as_ref(), ElementType::Boolean, Bson::as_bool)
    }

    /// Returns wether this key has a null value
    pub fn is_null(&self, key: impl AsRef<str>) -> bool {
        self.get(key) == Some(&Bson::Null)
    }

    /// Get an i32 value for this key if it exists and has the correct type.
    pub fn get_i32(&self, key: impl AsRef<str>) -> Result<i32> {
        self.get_typed(key.as_ref(), ElementType::Int32, Bson::as_i32)
    }

    /// Get an i64 value for this key if it exists and has the correct type.
    pub fn get_i64(&self, key: impl AsRef<str>) -> Result<i64> {
        self.get_typed(key.as_ref(), ElementType::Int64, Bson::as_i64)
    }

    /// Get a time stamp value for this key if it exists and has the correct type.
    pub fn get_timestamp(&self, key: impl AsRef<str>) -> Result<Timestamp> {
        self.get_typed(key.as_ref(), ElementType::Timestamp, Bson::as_timestamp)
    }

    /// Get a reference to a generic binary value for this key if it exists and has the correct
    /// type.
    pub fn get_binary(&self, key: impl AsRef<str>) -> Result<&Binary> {
        self.get_typed(key.as_ref(), ElementType::Binary, |b| match b {
            Bson::Binary(binary) => Some(binary),
            _ => None,
        })
    }

    /// Get an object id value for this key if it exists and has the correct type.
    pub fn get_object_id(&self, key: impl AsRef<str>) -> Result<ObjectId> {
        self.get_typed(key.as_ref(), ElementType::ObjectId, Bson::as_object_id)
    }

    /// Get a reference to a UTC datetime value for this key if it exists and has the correct
    /// type.
    pub fn get_datetime(&self, key: impl AsRef<str>) -> Result<DateTime> {
        self.get_typed(key.as_ref(), ElementType::DateTime, Bson::as_datetime)
    }

    /// Returns true if the map contains a value for the specified key.
    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        self.index.contains_key(key.as_ref())
    }

    /// Gets the keys of every field in the document, in write order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &String> {
        self.fields.iter().map(|(key, _)| key)
    }

    /// Gets the values of every field in the document, in write order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = &Bson> {
        self.fields.iter().map(|(_, value)| value)
    }

    /// Returns the number of fields in the document, repeated keys included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document contains no elements
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sets the value for `key`, returning the value it replaces.
    ///
    /// An existing key keeps its position; later occurrences of it are removed. A new key is
    /// appended. Accepts any type that can be converted into Bson.
    pub fn insert<KT: Into<String>, BT: Into<Bson>>(&mut self, key: KT, val: BT) -> Option<Bson> {
        let key = key.into();
        let Some(&position) = self.index.get(&key) else {
            self.append(key, val);
            return None;
        };
        let old = mem::replace(&mut self.fields[position].1, val.into());
        if self.fields[position + 1..].iter().any(|(k, _)| *k == key) {
            let mut seen = 0;
            self.fields.retain(|(k, _)| {
                seen += 1;
                seen <= position + 1 || *k != key
            });
            self.reindex();
        }
        Some(old)
    }

    /// Appends a field even if `key` is already present. Lookups keep resolving to the first
    /// occurrence; encoding writes both.
    pub fn append<KT: Into<String>, BT: Into<Bson>>(&mut self, key: KT, val: BT) {
        let key = key.into();
        let position = self.fields.len();
        if !self.index.contains_key(&key) {
            self.index.insert(key.clone(), position);
        }
        self.fields.push((key, val.into()));
    }

    /// Takes every occurrence of `key` out of the document, returning the first one's value.
    /// Computes in **O(n)** time.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Bson> {
        let key = key.as_ref();
        if !self.index.contains_key(key) {
            return None;
        }
        let mut removed = None;
        let mut kept = Vec::with_capacity(self.fields.len());
        for (k, v) in mem::take(&mut self.fields) {
            if k != key {
                kept.push((k, v));
            } else if removed.is_none() {
                removed = Some(v);
            }
        }
        self.fields = kept;
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, (key, _)) in self.fields.iter().enumerate() {
            if !self.index.contains_key(key) {
                self.index.insert(key.clone(), position);
            }
        }
    }

    /// Parse a whole document eagerly from `bytes`.
    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Document> {
        RawDocument::from_bytes(bytes)?.to_document()
    }

    /// Write every field of this document, in order, to `writer`.
    ///
    /// Fails with [`ErrorKind::InvalidCString`](crate::error::ErrorKind::InvalidCString) if a
    /// key contains a null byte.
    pub fn write_to<W: FieldWriter>(&self, writer: &mut W) -> Result<()> {
        for (key, value) in self {
            let name = CStr::from_str(key)?;
            write_field(writer, name, value).map_err(|e| e.with_key(key.as_str()))?;
        }
        Ok(())
    }

    /// Encode this document into a new byte buffer.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        {
            let mut writer = RawFieldWriter::open(&mut data);
            self.write_to(&mut writer)?;
        }
        Ok(data)
    }

    /// Encode this document into an immutable raw document.
    pub fn to_raw_document_buf(&self) -> Result<RawDocumentBuf> {
        let mut writer = raw::open_document();
        self.write_to(&mut writer)?;
        Ok(writer.build())
    }
}

fn write_field<W: FieldWriter>(writer: &mut W, name: &CStr, value: &Bson) -> Result<()> {
    let mut result = Ok(());
    match value {
        Bson::Document(doc) => writer.write_document(name, |w| result = doc.write_to(w)),
        Bson::Array(array) => writer.write_array(name, |w| result = write_elements(w, array)),
        Bson::JavaScriptCodeWithScope(code) => {
            let scope = code.scope.to_raw_document_buf()?;
            writer.write_bson(
                name,
                BsonRef::JavaScriptCodeWithScope(JavaScriptCodeWithScopeRef {
                    code: &code.code,
                    scope: &scope,
                }),
            );
        }
        Bson::Undecoded(undecoded) => writer.write_bson(name, undecoded.as_bson_ref()?),
        _ => {
            if let Some(value) = value.as_scalar_ref() {
                writer.write_bson(name, value);
            }
        }
    }
    result
}

fn write_elements<W: ValueWriter>(writer: &mut W, array: &[Bson]) -> Result<()> {
    for (index, value) in array.iter().enumerate() {
        let mut result = Ok(());
        match value {
            Bson::Document(doc) => writer.write_document(|w| result = doc.write_to(w)),
            Bson::Array(array) => writer.write_array(|w| result = write_elements(w, array)),
            Bson::JavaScriptCodeWithScope(code) => {
                let scope = code.scope.to_raw_document_buf()?;
                writer.write_bson(BsonRef::JavaScriptCodeWithScope(
                    JavaScriptCodeWithScopeRef {
                        code: &code.code,
                        scope: &scope,
                    },
                ));
            }
            Bson::Undecoded(undecoded) => writer.write_bson(undecoded.as_bson_ref()?),
            _ => {
                if let Some(value) = value.as_scalar_ref() {
                    writer.write_bson(value);
                }
            }
        }
        result.map_err(|e| e.with_index(index))?;
    }
    Ok(())
}

/// Converts a written value to its owned form. Nested raw values are decoded eagerly; one that
/// fails to decode is kept as [`Bson::Undecoded`].
fn to_owned_value(value: BsonRef<'_>) -> Bson {
    match value.to_bson() {
        Ok(value) => value,
        Err(error) => {
            debug!(
                %error,
                element_type = %value.element_type(),
                "keeping undecodable value verbatim"
            );
            Bson::Undecoded(Undecoded::new(value, error))
        }
    }
}

impl FieldWriter for Document {
    type DocumentWriter<'w> = DocumentSlot<'w, Document>;
    type ArrayWriter<'w> = DocumentSlot<'w, Array>;

    /// Append `value` under `name`. Writing a name twice keeps both fields, as the streaming
    /// backend does.
    fn write_bson(&mut self, name: &CStr, value: BsonRef<'_>) {
        self.append(name.as_str(), to_owned_value(value));
    }

    fn open_document(&mut self, name: &CStr) -> DocumentSlot<'_, Document> {
        DocumentSlot::new(self, name)
    }

    fn open_array(&mut self, name: &CStr) -> DocumentSlot<'_, Array> {
        DocumentSlot::new(self, name)
    }
}

impl ValueWriter for Array {
    type DocumentWriter<'w> = ArraySlot<'w, Document>;
    type ArrayWriter<'w> = ArraySlot<'w, Array>;

    fn write_bson(&mut self, value: BsonRef<'_>) {
        self.push(to_owned_value(value));
    }

    fn open_document(&mut self) -> ArraySlot<'_, Document> {
        ArraySlot::new(self)
    }

    fn open_array(&mut self) -> ArraySlot<'_, Array> {
        ArraySlot::new(self)
    }
}

/// A nested document or array being written into a [`Document`]. The value is appended under
/// its name when the slot is dropped.
pub struct DocumentSlot<'a, T: Default + Into<Bson>> {
    parent: &'a mut Document,
    name: String,
    value: T,
}

impl<'a, T: Default + Into<Bson>> DocumentSlot<'a, T> {
    fn new(parent: &'a mut Document, name: &CStr) -> Self {
        Self {
            parent,
            name: name.as_str().to_owned(),
            value: T::default(),
        }
    }
}

impl<T: Default + Into<Bson>> Drop for DocumentSlot<'_, T> {
    fn drop(&mut self) {
        let value = mem::take(&mut self.value);
        self.parent.append(mem::take(&mut self.name), value);
    }
}

/// A nested document or array being written into an [`Array`]. The value is pushed when the
/// slot is dropped.
pub struct ArraySlot<'a, T: Default + Into<Bson>> {
    parent: &'a mut Array,
    value: T,
}

impl<'a, T: Default + Into<Bson>> ArraySlot<'a, T> {
    fn new(parent: &'a mut Array) -> Self {
        Self {
            parent,
            value: T::default(),
        }
    }
}

impl<T: Default + Into<Bson>> Drop for ArraySlot<'_, T> {
    fn drop(&mut self) {
        let value = mem::take(&mut self.value);
        self.parent.push(value.into());
    }
}

macro_rules! delegate_writers {
    ($($slot:ident),*) => {$(
        impl FieldWriter for $slot<'_, Document> {
            type DocumentWriter<'w>
                = DocumentSlot<'w, Document>
            where
                Self: 'w;
            type ArrayWriter<'w>
                = DocumentSlot<'w, Array>
            where
                Self: 'w;

            fn write_bson(&mut self, name: &CStr, value: BsonRef<'_>) {
                self.value.write_bson(name, value);
            }

            fn open_document(&mut self, name: &CStr) -> DocumentSlot<'_, Document> {
                self.value.open_document(name)
            }

            fn open_array(&mut self, name: &CStr) -> DocumentSlot<'_, Array> {
                self.value.open_array(name)
            }
        }

        impl ValueWriter for $slot<'_, Array> {
            type DocumentWriter<'w>
                = ArraySlot<'w, Document>
            where
                Self: 'w;
            type ArrayWriter<'w>
                = ArraySlot<'w, Array>
            where
                Self: 'w;

            fn write_bson(&mut self, value: BsonRef<'_>) {
                self.value.write_bson(value);
            }

            fn open_document(&mut self) -> ArraySlot<'_, Document> {
                self.value.open_document()
            }

            fn open_array(&mut self) -> ArraySlot<'_, Array> {
                self.value.open_array()
            }
        }
    )*};
}

delegate_writers!(DocumentSlot, ArraySlot);

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Document;
    use crate::{
        Bson,
        cstr,
        error::ErrorKind,
        spec::ElementType,
        writer::{FieldWriter, ValueWriter},
    };

    #[test]
    fn typed_getters_report_missing_and_mismatched_fields() {
        let mut doc = Document::new();
        doc.insert("n", 5);

        assert_eq!(doc.get_i32("n").unwrap(), 5);
        let missing = doc.get_i32("m").unwrap_err();
        assert_eq!(
            missing.kind,
            ErrorKind::MissingField {
                name: "m".to_string()
            }
        );
        let mismatch = doc.get_str("n").unwrap_err();
        assert_eq!(
            mismatch.kind,
            ErrorKind::TypeMismatch {
                expected: ElementType::String,
                actual: ElementType::Int32
            }
        );
        assert_eq!(mismatch.key.as_deref(), Some("n"));
    }

    #[test]
    fn nested_slots_insert_on_drop() {
        let mut doc = Document::new();
        doc.write_document(cstr!("outer"), |w| {
            w.write_i32(cstr!("x"), 1);
            w.write_array(cstr!("list"), |a| {
                a.write_str("a");
                a.write_document(|d| d.write_bool(cstr!("ok"), true));
            });
        });
        doc.write_null(cstr!("after"));

        let outer = doc.get_document("outer").unwrap();
        assert_eq!(outer.get_i32("x").unwrap(), 1);
        let list = outer.get_array("list").unwrap();
        assert_eq!(list[0], Bson::String("a".to_string()));
        assert_eq!(list[1].as_document().unwrap().get_bool("ok").unwrap(), true);
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["outer", "after"]);
    }

    #[test]
    fn repeated_keys_resolve_to_the_first_occurrence() {
        let mut doc = Document::new();
        doc.append("k", 1);
        doc.append("j", 2);
        doc.append("k", 3);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get_i32("k").unwrap(), 1);
        assert_eq!(
            doc.values().collect::<Vec<_>>(),
            [&Bson::Int32(1), &Bson::Int32(2), &Bson::Int32(3)]
        );

        *doc.get_mut("k").unwrap() = Bson::Int32(4);
        assert_eq!(doc.iter().next_back(), Some((&"k".to_string(), &Bson::Int32(3))));

        assert_eq!(doc.insert("k", 5), Some(Bson::Int32(4)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["k", "j"]);
        assert_eq!(doc.get_i32("k").unwrap(), 5);

        doc.append("k", 6);
        assert_eq!(doc.remove("k"), Some(Bson::Int32(5)));
        assert!(!doc.contains_key("k"));
        assert_eq!(doc.get_i32("j").unwrap(), 2);
        assert_eq!(
            doc.into_iter().collect::<Vec<_>>(),
            [("j".to_string(), Bson::Int32(2))]
        );
    }

    #[test]
    fn encode_decode() {
        let mut doc = Document::new();
        doc.insert("a", 1i64);
        doc.insert("b", vec![Bson::from("x"), Bson::Null]);
        let bytes = doc.encode_to_vec().unwrap();
        assert_eq!(Document::decode_from_bytes(&bytes).unwrap(), doc);
    }

    #[test]
    fn keys_with_null_bytes_are_rejected_on_encode() {
        let mut doc = Document::new();
        doc.insert("a\0b", 1);
        assert!(matches!(
            doc.encode_to_vec().unwrap_err().kind,
            ErrorKind::InvalidCString { .. }
        ));
    }
}
