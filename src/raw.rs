//! An API for interacting with raw BSON bytes.
//!
//! This module provides two document types, [`RawDocumentBuf`] and [`&RawDocument`](RawDocument)
//! (an owned buffer and a reference respectively, akin to [`String`] and [`&str`](str)), and the
//! matching [`RawArrayBuf`] / [`&RawArray`](RawArray) pair. Constructing any of them validates
//! only the outer frame: the length prefix must match the byte count and the last byte must be
//! the null terminator. Elements are decoded on demand.
//!
//! The owned types are backed by a shared [`Span`], so cloning one, slicing a nested document out
//! of one, or handing one to a [`DocumentReader`] never copies the bytes.
//!
//! ```rust
//! use lazybson::{cstr, raw::build_document, FieldWriter};
//!
//! let doc = build_document(|w| {
//!     w.write_str(cstr!("hi"), "y'all");
//!     w.write_i32(cstr!("n"), 3);
//! });
//!
//! let mut reader = doc.reader();
//! assert_eq!(reader.read("hi")?.unwrap().read_string()?, "y'all");
//! assert_eq!(doc.to_string(), r#"{"hi": "y'all", "n": 3}"#);
//! # Ok::<(), lazybson::error::Error>(())
//! ```

mod reader;
#[cfg(test)]
mod test;
mod value;
mod writer;

use std::{
    borrow::{Borrow, ToOwned},
    fmt,
    ops::Deref,
};

use bytes::Bytes;

pub use self::{
    reader::{ArrayReader, DocumentReader, ScanState},
    value::ValueReader,
    writer::{
        CompletableArrayWriter,
        CompletableDocumentWriter,
        RawFieldWriter,
        RawValueWriter,
        build_array,
        build_document,
        open_array,
        open_document,
    },
};
use crate::{
    BsonRef,
    Document,
    buf::{Cursor, Span},
    codec::{self, MIN_BSON_DOCUMENT_SIZE},
    error::{Error, Result},
    Bson,
};

fn validate_frame(data: &[u8]) -> Result<()> {
    if data.len() < MIN_BSON_DOCUMENT_SIZE as usize {
        return Err(Error::malformed(format!(
            "document too short: {} bytes",
            data.len()
        )));
    }

    let length = Cursor::new(data).read_i32()?;
    if length < 0 || length as usize != data.len() {
        return Err(Error::malformed(format!(
            "declared length {length} does not match actual length {}",
            data.len()
        )));
    }

    if data[data.len() - 1] != 0 {
        return Err(Error::malformed("document not null-terminated"));
    }
    Ok(())
}

/// Wrap `bytes` as an immutable document, validating its frame. Elements are decoded lazily.
pub fn read_document(bytes: impl Into<Bytes>) -> Result<RawDocumentBuf> {
    RawDocumentBuf::from_bytes(bytes)
}

/// A slice of a BSON document (akin to [`std::str`]).
///
/// This is an _unsized_ type, meaning that it must always be used behind a pointer like `&`. For
/// an owned version of this type, see [`RawDocumentBuf`].
///
/// Element access on a `&RawDocument` is a linear scan that caches nothing. For repeated or
/// selective access, wrap the bytes in a [`DocumentReader`].
#[derive(PartialEq, Eq)]
#[repr(transparent)]
pub struct RawDocument {
    data: [u8],
}

impl RawDocument {
    /// Constructs a new [`RawDocument`], validating _only_ the following invariants:
    ///   * `data` is at least five bytes long (the minimum for a valid BSON document)
    ///   * the initial four bytes of `data` accurately represent the length of the bytes
    ///   * the last byte of `data` is a 0
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &D) -> Result<&RawDocument> {
        let data = data.as_ref();
        validate_frame(data)?;
        Ok(RawDocument::new_unchecked(data))
    }

    pub(crate) fn new_unchecked<D: AsRef<[u8]> + ?Sized>(data: &D) -> &RawDocument {
        // SAFETY: RawDocument is #[repr(transparent)] over [u8], and the pointer came from a
        // safe reference.
        unsafe { &*(data.as_ref() as *const [u8] as *const RawDocument) }
    }

    /// Returns a reference to the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether this document contains no elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() == MIN_BSON_DOCUMENT_SIZE as usize
    }

    /// Iterate over the elements in order, decoding each one. Iteration stops after the first
    /// error.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.data)
    }

    /// Gets the value for `key` by scanning from the start of the document.
    pub fn get(&self, key: impl AsRef<str>) -> Result<Option<BsonRef<'_>>> {
        for result in self.iter() {
            let (k, v) = result?;
            if key.as_ref() == k {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Creates a new [`RawDocumentBuf`] with an owned copy of the bytes.
    pub fn to_raw_document_buf(&self) -> RawDocumentBuf {
        RawDocumentBuf::from_span_unchecked(Span::new(self.data.to_vec()))
    }

    /// Decode the whole document, recursively, into an eager [`Document`]. Repeated keys are
    /// kept in order.
    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document::new();
        for result in self.iter() {
            let (key, value) = result?;
            doc.append(key, value.to_bson().map_err(|e| e.with_key(key))?);
        }
        Ok(doc)
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

impl fmt::Display for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::display::fmt_raw_document(f, self)
    }
}

impl AsRef<RawDocument> for RawDocument {
    fn as_ref(&self) -> &RawDocument {
        self
    }
}

impl ToOwned for RawDocument {
    type Owned = RawDocumentBuf;

    fn to_owned(&self) -> Self::Owned {
        self.to_raw_document_buf()
    }
}

impl<'a> IntoIterator for &'a RawDocument {
    type IntoIter = Iter<'a>;
    type Item = Result<(&'a str, BsonRef<'a>)>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// An owned, immutable BSON document backed by shared bytes.
///
/// This is what the writers produce and what [`read_document`] returns. Cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDocumentBuf {
    span: Span,
}

impl RawDocumentBuf {
    /// Wrap `bytes`, validating the document frame.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<RawDocumentBuf> {
        Self::from_span(Span::new(bytes))
    }

    /// Wrap a span, validating the document frame.
    pub fn from_span(span: Span) -> Result<RawDocumentBuf> {
        validate_frame(&span)?;
        Ok(Self::from_span_unchecked(span))
    }

    pub(crate) fn from_span_unchecked(span: Span) -> RawDocumentBuf {
        Self { span }
    }

    /// A new lazy reader over this document. The reader shares these bytes.
    pub fn reader(&self) -> DocumentReader {
        DocumentReader::new(self.clone())
    }

    /// The span holding the document bytes.
    pub fn as_span(&self) -> &Span {
        &self.span
    }

    /// Copy the bytes into a new `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.span.to_vec()
    }

    /// Consume the document, returning its bytes without copying.
    pub fn into_bytes(self) -> Bytes {
        self.span.into_bytes()
    }

    /// Decode every element eagerly. Equivalent to [`RawDocument::to_document`].
    pub fn to_document(&self) -> Result<Document> {
        self.deref().to_document()
    }
}

impl Default for RawDocumentBuf {
    fn default() -> Self {
        open_document().build()
    }
}

impl Deref for RawDocumentBuf {
    type Target = RawDocument;

    fn deref(&self) -> &RawDocument {
        RawDocument::new_unchecked(self.span.as_bytes())
    }
}

impl Borrow<RawDocument> for RawDocumentBuf {
    fn borrow(&self) -> &RawDocument {
        self
    }
}

impl AsRef<RawDocument> for RawDocumentBuf {
    fn as_ref(&self) -> &RawDocument {
        self
    }
}

impl fmt::Debug for RawDocumentBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocumentBuf")
            .field("data", &hex::encode(self.span.as_bytes()))
            .finish()
    }
}

impl fmt::Display for RawDocumentBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.deref(), f)
    }
}

impl TryFrom<&Document> for RawDocumentBuf {
    type Error = Error;

    fn try_from(doc: &Document) -> Result<RawDocumentBuf> {
        doc.to_raw_document_buf()
    }
}

/// A slice of a BSON array: a document whose keys are "0", "1", ….
///
/// Keys are not checked against their positions; they are skipped on read and regenerated on
/// write.
#[derive(PartialEq, Eq)]
#[repr(transparent)]
pub struct RawArray {
    doc: RawDocument,
}

impl RawArray {
    /// Constructs a new [`RawArray`], validating the frame the same way as
    /// [`RawDocument::from_bytes`].
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &D) -> Result<&RawArray> {
        Ok(RawArray::from_doc(RawDocument::from_bytes(data)?))
    }

    pub(crate) fn from_doc(doc: &RawDocument) -> &RawArray {
        // SAFETY: RawArray is #[repr(transparent)] over RawDocument, and the pointer came from a
        // safe reference.
        unsafe { &*(doc as *const RawDocument as *const RawArray) }
    }

    /// Returns a reference to the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.doc.as_bytes()
    }

    /// Whether this array contains no elements.
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    /// View this array as a document keyed by the stringified indices.
    pub fn as_doc(&self) -> &RawDocument {
        &self.doc
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> ArrayIter<'_> {
        ArrayIter {
            inner: self.doc.iter(),
        }
    }

    /// Gets the element at `index` by scanning from the start of the array.
    pub fn get(&self, index: usize) -> Result<Option<BsonRef<'_>>> {
        self.iter().nth(index).transpose()
    }

    /// Creates a new [`RawArrayBuf`] with an owned copy of the bytes.
    pub fn to_raw_array_buf(&self) -> RawArrayBuf {
        RawArrayBuf {
            doc: self.doc.to_raw_document_buf(),
        }
    }

    /// Decode the whole array, recursively, into owned values.
    pub fn to_vec(&self) -> Result<Vec<Bson>> {
        self.iter()
            .enumerate()
            .map(|(i, value)| {
                value
                    .and_then(|v| v.to_bson())
                    .map_err(|e| e.with_index(i))
            })
            .collect()
    }
}

impl fmt::Debug for RawArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawArray")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for RawArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::display::fmt_raw_array(f, self)
    }
}

impl ToOwned for RawArray {
    type Owned = RawArrayBuf;

    fn to_owned(&self) -> Self::Owned {
        self.to_raw_array_buf()
    }
}

impl<'a> IntoIterator for &'a RawArray {
    type IntoIter = ArrayIter<'a>;
    type Item = Result<BsonRef<'a>>;

    fn into_iter(self) -> ArrayIter<'a> {
        self.iter()
    }
}

/// An owned, immutable BSON array backed by shared bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RawArrayBuf {
    doc: RawDocumentBuf,
}

impl RawArrayBuf {
    /// Wrap `bytes`, validating the array frame.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<RawArrayBuf> {
        Ok(Self {
            doc: RawDocumentBuf::from_bytes(bytes)?,
        })
    }

    /// Wrap a span, validating the array frame.
    pub fn from_span(span: Span) -> Result<RawArrayBuf> {
        Ok(Self {
            doc: RawDocumentBuf::from_span(span)?,
        })
    }

    pub(crate) fn from_span_unchecked(span: Span) -> RawArrayBuf {
        Self {
            doc: RawDocumentBuf::from_span_unchecked(span),
        }
    }

    /// A new lazy reader over this array. The reader shares these bytes.
    pub fn reader(&self) -> ArrayReader {
        ArrayReader::new(self.clone())
    }

    /// The span holding the array bytes.
    pub fn as_span(&self) -> &Span {
        self.doc.as_span()
    }

    /// Consume the array, returning its bytes without copying.
    pub fn into_bytes(self) -> Bytes {
        self.doc.into_bytes()
    }
}

impl Default for RawArrayBuf {
    fn default() -> Self {
        open_array().build()
    }
}

impl Deref for RawArrayBuf {
    type Target = RawArray;

    fn deref(&self) -> &RawArray {
        RawArray::from_doc(&self.doc)
    }
}

impl Borrow<RawArray> for RawArrayBuf {
    fn borrow(&self) -> &RawArray {
        self
    }
}

impl fmt::Debug for RawArrayBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawArrayBuf")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for RawArrayBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.deref(), f)
    }
}

/// An iterator over the document's entries.
pub struct Iter<'a> {
    data: &'a [u8],
    offset: usize,

    /// Whether the underlying doc is assumed to be valid or if an error has been encountered.
    /// After an error, all subsequent iterations will return None.
    valid: bool,
}

impl<'a> Iter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 4,
            valid: true,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(&'a str, BsonRef<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid {
            return None;
        }

        let result = codec::read_element(self.data, self.offset).and_then(|element| {
            let Some(element) = element else {
                return Ok(None);
            };
            self.offset = element.value_end;
            let value = codec::decode_value(element.element_type, element.value(self.data))
                .map_err(|e| e.with_key(element.key))?;
            Ok(Some((element.key, value)))
        });

        match result {
            Ok(Some(kv)) => Some(Ok(kv)),
            Ok(None) => {
                self.valid = false;
                None
            }
            Err(e) => {
                self.valid = false;
                Some(Err(e))
            }
        }
    }
}

/// An iterator over the array's elements.
pub struct ArrayIter<'a> {
    inner: Iter<'a>,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Result<BsonRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| r.map(|(_, v)| v))
    }
}
