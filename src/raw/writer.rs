use super::{RawArrayBuf, RawDocument, RawDocumentBuf};
use crate::{
    BsonRef,
    buf::Span,
    codec::{self, MIN_BSON_DOCUMENT_SIZE},
    cstr::CStr,
    spec::ElementType,
    writer::{FieldWriter, ValueWriter},
};

/// Start a document at the end of `data`: push a placeholder length to be patched on close.
fn open_frame(data: &mut Vec<u8>) -> usize {
    let start = data.len();
    data.extend(MIN_BSON_DOCUMENT_SIZE.to_le_bytes());
    start
}

fn close_frame(data: &mut Vec<u8>, start: usize) {
    data.push(0);
    codec::patch_length(data, start);
}

fn append_key(data: &mut Vec<u8>, element_type: ElementType, name: &CStr) {
    data.push(element_type as u8);
    name.append_to(data);
}

fn append_index_key(data: &mut Vec<u8>, element_type: ElementType, index: &mut usize) {
    data.push(element_type as u8);
    data.extend_from_slice(index.to_string().as_bytes());
    data.push(0);
    *index += 1;
}

/// Writes the fields of a document nested inside a byte buffer. The document's length prefix is
/// patched in when the writer is dropped.
pub struct RawFieldWriter<'a> {
    data: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> RawFieldWriter<'a> {
    pub(crate) fn open(data: &'a mut Vec<u8>) -> Self {
        let start = open_frame(data);
        Self { data, start }
    }
}

impl Drop for RawFieldWriter<'_> {
    fn drop(&mut self) {
        close_frame(self.data, self.start);
    }
}

impl FieldWriter for RawFieldWriter<'_> {
    type DocumentWriter<'w>
        = RawFieldWriter<'w>
    where
        Self: 'w;
    type ArrayWriter<'w>
        = RawValueWriter<'w>
    where
        Self: 'w;

    fn write_bson(&mut self, name: &CStr, value: BsonRef<'_>) {
        codec::append_element(self.data, name, value);
    }

    fn open_document(&mut self, name: &CStr) -> RawFieldWriter<'_> {
        append_key(self.data, ElementType::EmbeddedDocument, name);
        RawFieldWriter::open(self.data)
    }

    fn open_array(&mut self, name: &CStr) -> RawValueWriter<'_> {
        append_key(self.data, ElementType::Array, name);
        RawValueWriter::open(self.data)
    }
}

/// Writes the elements of an array nested inside a byte buffer, generating the keys `"0"`, `"1"`,
/// …. The array's length prefix is patched in when the writer is dropped.
pub struct RawValueWriter<'a> {
    data: &'a mut Vec<u8>,
    start: usize,
    next_index: usize,
}

impl<'a> RawValueWriter<'a> {
    pub(crate) fn open(data: &'a mut Vec<u8>) -> Self {
        let start = open_frame(data);
        Self {
            data,
            start,
            next_index: 0,
        }
    }
}

impl Drop for RawValueWriter<'_> {
    fn drop(&mut self) {
        close_frame(self.data, self.start);
    }
}

impl ValueWriter for RawValueWriter<'_> {
    type DocumentWriter<'w>
        = RawFieldWriter<'w>
    where
        Self: 'w;
    type ArrayWriter<'w>
        = RawValueWriter<'w>
    where
        Self: 'w;

    fn write_bson(&mut self, value: BsonRef<'_>) {
        append_index_key(self.data, value.element_type(), &mut self.next_index);
        codec::append_value(self.data, value);
    }

    fn open_document(&mut self) -> RawFieldWriter<'_> {
        append_index_key(self.data, ElementType::EmbeddedDocument, &mut self.next_index);
        RawFieldWriter::open(self.data)
    }

    fn open_array(&mut self) -> RawValueWriter<'_> {
        append_index_key(self.data, ElementType::Array, &mut self.next_index);
        RawValueWriter::open(self.data)
    }
}

/// Build a document from a block.
///
/// ```rust
/// use lazybson::{cstr, raw::build_document, FieldWriter};
///
/// let doc = build_document(|w| w.write_i32(cstr!("foo"), 42));
/// assert_eq!(doc.to_string(), r#"{"foo": 42}"#);
/// ```
pub fn build_document(f: impl FnOnce(&mut RawFieldWriter<'_>)) -> RawDocumentBuf {
    let mut data = Vec::new();
    {
        let mut writer = RawFieldWriter::open(&mut data);
        f(&mut writer);
    }
    RawDocumentBuf::from_span_unchecked(Span::new(data))
}

/// Build an array from a block.
pub fn build_array(f: impl FnOnce(&mut RawValueWriter<'_>)) -> RawArrayBuf {
    let mut data = Vec::new();
    {
        let mut writer = RawValueWriter::open(&mut data);
        f(&mut writer);
    }
    RawArrayBuf::from_span_unchecked(Span::new(data))
}

/// Open a document to be written field by field and finished with
/// [`CompletableDocumentWriter::build`].
pub fn open_document() -> CompletableDocumentWriter {
    CompletableDocumentWriter::new()
}

/// Open an array to be written element by element and finished with
/// [`CompletableArrayWriter::build`].
pub fn open_array() -> CompletableArrayWriter {
    CompletableArrayWriter::new()
}

/// A document writer that is not tied to a block: fields can be appended from loops or across
/// calls, and [`build`](CompletableDocumentWriter::build) consumes the writer, so nothing can be
/// appended once the document is finished.
///
/// The output is byte-identical to [`build_document`] for the same sequence of writes.
///
/// ```rust
/// use lazybson::{raw::open_document, CStr, FieldWriter};
///
/// let mut writer = open_document();
/// for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
///     writer.write_i32(CStr::from_str(name)?, i as i32);
/// }
/// let doc = writer.build();
/// assert_eq!(doc.to_string(), r#"{"a": 0, "b": 1, "c": 2}"#);
/// # Ok::<(), lazybson::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CompletableDocumentWriter {
    data: Vec<u8>,
}

impl CompletableDocumentWriter {
    fn new() -> Self {
        let mut data = Vec::new();
        open_frame(&mut data);
        Self { data }
    }

    /// Copy every field of `doc` into this document, without decoding or re-encoding them.
    pub fn append_all(&mut self, doc: &RawDocument) {
        let bytes = doc.as_bytes();
        self.data.extend_from_slice(&bytes[4..bytes.len() - 1]);
    }

    /// Finish the document.
    pub fn build(mut self) -> RawDocumentBuf {
        close_frame(&mut self.data, 0);
        RawDocumentBuf::from_span_unchecked(Span::new(self.data))
    }
}

impl Default for CompletableDocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldWriter for CompletableDocumentWriter {
    type DocumentWriter<'w> = RawFieldWriter<'w>;
    type ArrayWriter<'w> = RawValueWriter<'w>;

    fn write_bson(&mut self, name: &CStr, value: BsonRef<'_>) {
        codec::append_element(&mut self.data, name, value);
    }

    fn open_document(&mut self, name: &CStr) -> RawFieldWriter<'_> {
        append_key(&mut self.data, ElementType::EmbeddedDocument, name);
        RawFieldWriter::open(&mut self.data)
    }

    fn open_array(&mut self, name: &CStr) -> RawValueWriter<'_> {
        append_key(&mut self.data, ElementType::Array, name);
        RawValueWriter::open(&mut self.data)
    }
}

/// An array writer that is not tied to a block. See [`CompletableDocumentWriter`].
#[derive(Debug, Clone)]
pub struct CompletableArrayWriter {
    data: Vec<u8>,
    next_index: usize,
}

impl CompletableArrayWriter {
    fn new() -> Self {
        let mut data = Vec::new();
        open_frame(&mut data);
        Self {
            data,
            next_index: 0,
        }
    }

    /// The number of elements written so far.
    pub fn len(&self) -> usize {
        self.next_index
    }

    /// Whether no element has been written yet.
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Finish the array.
    pub fn build(mut self) -> RawArrayBuf {
        close_frame(&mut self.data, 0);
        RawArrayBuf::from_span_unchecked(Span::new(self.data))
    }
}

impl Default for CompletableArrayWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueWriter for CompletableArrayWriter {
    type DocumentWriter<'w> = RawFieldWriter<'w>;
    type ArrayWriter<'w> = RawValueWriter<'w>;

    fn write_bson(&mut self, value: BsonRef<'_>) {
        append_index_key(&mut self.data, value.element_type(), &mut self.next_index);
        codec::append_value(&mut self.data, value);
    }

    fn open_document(&mut self) -> RawFieldWriter<'_> {
        append_index_key(
            &mut self.data,
            ElementType::EmbeddedDocument,
            &mut self.next_index,
        );
        RawFieldWriter::open(&mut self.data)
    }

    fn open_array(&mut self) -> RawValueWriter<'_> {
        append_index_key(&mut self.data, ElementType::Array, &mut self.next_index);
        RawValueWriter::open(&mut self.data)
    }
}
