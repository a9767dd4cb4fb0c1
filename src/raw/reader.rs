use indexmap::{IndexMap, map::Entry};
use tracing::{debug, trace};

use super::{RawArrayBuf, RawDocumentBuf, ValueReader};
use crate::{
    Document,
    buf::Span,
    codec::{self, RawElement},
    error::Result,
};

/// How much of a reader's element stream has been scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanState {
    /// No element has been scanned yet.
    Unscanned,
    /// Some elements are cached; scanning resumes at the given byte offset.
    PartiallyScanned {
        /// Offset of the next unscanned element, relative to the start of the document.
        offset: usize,
    },
    /// Every element has been scanned and cached.
    FullyScanned,
}

/// What one scan step produced.
enum Step {
    /// A new element was cached at this position.
    Cached(usize),
    /// A key seen earlier was found again; the first occurrence stays cached.
    Duplicate,
    /// The terminator was reached.
    Done,
}

/// The resumable cursor shared by document and array readers.
#[derive(Clone, Debug)]
struct Scanner {
    span: Span,
    state: ScanState,
    scanned: usize,
}

impl Scanner {
    fn new(span: Span) -> Self {
        Self {
            span,
            state: ScanState::Unscanned,
            scanned: 0,
        }
    }

    fn offset(&self) -> Option<usize> {
        match self.state {
            ScanState::Unscanned => Some(4),
            ScanState::PartiallyScanned { offset } => Some(offset),
            ScanState::FullyScanned => None,
        }
    }

    /// Locate the next element and slice out its value. The cursor only advances once the
    /// element has been fully delimited, so a failure leaves the state untouched and every
    /// element cached so far stays valid.
    fn next(&mut self) -> Result<Option<(String, ValueReader)>> {
        let Some(offset) = self.offset() else {
            return Ok(None);
        };

        let element: Option<RawElement<'_>> = match codec::read_element(&self.span, offset) {
            Ok(element) => element,
            Err(error) => {
                debug!(offset, %error, "failed to scan BSON element");
                return Err(error);
            }
        };

        let Some(element) = element else {
            trace!(offset, elements = self.scanned, "reached end of document");
            self.state = ScanState::FullyScanned;
            return Ok(None);
        };

        trace!(
            key = element.key,
            offset,
            element_type = ?element.element_type,
            "scanned BSON element"
        );
        let value = ValueReader::new(
            element.element_type,
            self.span
                .subrange(element.value_start..element.value_end)
                .map_err(|e| e.with_key(element.key))?,
        );
        let key = element.key.to_owned();
        self.state = ScanState::PartiallyScanned {
            offset: element.value_end,
        };
        self.scanned += 1;
        Ok(Some((key, value)))
    }
}

/// A lazily scanning reader over one BSON document.
///
/// Fields are decoded on demand. [`DocumentReader::read`] scans forward only as far as the
/// requested key, caching every element it passes; later requests for those keys are served from
/// the cache without touching the bytes again. The scan never moves backwards and never
/// re-reads a byte.
///
/// ```rust
/// use lazybson::{cstr, raw::build_document, FieldWriter, ScanState};
///
/// let doc = build_document(|w| {
///     w.write_i32(cstr!("a"), 1);
///     w.write_i32(cstr!("b"), 2);
///     w.write_i32(cstr!("c"), 3);
/// });
///
/// let mut reader = doc.reader();
/// assert_eq!(reader.read("b")?.unwrap().read_int32()?, 2);
/// // "c" has not been looked at yet.
/// assert_eq!(reader.scanned_len(), 2);
/// assert!(matches!(reader.state(), ScanState::PartiallyScanned { .. }));
/// # Ok::<(), lazybson::error::Error>(())
/// ```
///
/// A reader is not synchronized: reads take `&mut self` because scanning mutates the cache. Once
/// [materialized](DocumentReader::materialize), a reader can be shared immutably and queried with
/// [`DocumentReader::get`].
#[derive(Clone, Debug)]
pub struct DocumentReader {
    doc: RawDocumentBuf,
    scanner: Scanner,
    entries: IndexMap<String, ValueReader>,
}

impl DocumentReader {
    pub(crate) fn new(doc: RawDocumentBuf) -> Self {
        Self {
            scanner: Scanner::new(doc.as_span().clone()),
            doc,
            entries: IndexMap::new(),
        }
    }

    /// Scan one element, caching it unless its key was already seen.
    fn advance(&mut self) -> Result<Step> {
        let Some((key, value)) = self.scanner.next()? else {
            return Ok(Step::Done);
        };
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                debug!(key = entry.key().as_str(), "ignoring duplicate key");
                Ok(Step::Duplicate)
            }
            Entry::Vacant(entry) => {
                let index = entry.index();
                entry.insert(value);
                Ok(Step::Cached(index))
            }
        }
    }

    /// Scan until `name` is cached or the document is exhausted, returning its position.
    fn seek(&mut self, name: &str) -> Result<Option<usize>> {
        if let Some(index) = self.entries.get_index_of(name) {
            return Ok(Some(index));
        }
        loop {
            match self.advance()? {
                Step::Cached(index) if self.entries.get_index(index).is_some_and(|(k, _)| k == name) => {
                    return Ok(Some(index));
                }
                Step::Cached(_) | Step::Duplicate => {}
                Step::Done => return Ok(None),
            }
        }
    }

    fn scan_all(&mut self) -> Result<()> {
        while !matches!(self.advance()?, Step::Done) {}
        Ok(())
    }

    /// Read the value of the field `name`, scanning forward from the last position if it has
    /// not been cached yet. Returns `Ok(None)` if the document has no such field.
    ///
    /// If the scan hits a malformed element, the error is returned and the reader keeps every
    /// entry cached before it.
    pub fn read(&mut self, name: &str) -> Result<Option<&ValueReader>> {
        let index = self.seek(name)?;
        Ok(index.and_then(|i| self.entries.get_index(i)).map(|(_, v)| v))
    }

    /// Like [`DocumentReader::read`], but hands out the cached reader mutably so nested readers
    /// can be cached inside it.
    pub fn read_mut(&mut self, name: &str) -> Result<Option<&mut ValueReader>> {
        let index = self.seek(name)?;
        Ok(index
            .and_then(|i| self.entries.get_index_mut(i))
            .map(|(_, v)| v))
    }

    /// Look up `name` in the cache only. Never scans.
    pub fn get(&self, name: &str) -> Option<&ValueReader> {
        self.entries.get(name)
    }

    /// Whether the document has a field `name`, scanning as far as needed to find out.
    pub fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.seek(name)?.is_some())
    }

    /// Scan the whole document and iterate over its fields in order.
    pub fn entries(&mut self) -> Result<impl ExactSizeIterator<Item = (&str, &ValueReader)>> {
        self.scan_all()?;
        Ok(self.entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Scan the whole document and return its keys in order.
    pub fn keys(&mut self) -> Result<impl ExactSizeIterator<Item = &str>> {
        self.scan_all()?;
        Ok(self.entries.keys().map(String::as_str))
    }

    /// Scan the whole document and return its number of distinct fields.
    pub fn len(&mut self) -> Result<usize> {
        self.scan_all()?;
        Ok(self.entries.len())
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    pub(crate) fn entry_at_mut(&mut self, index: usize) -> Option<(&str, &mut ValueReader)> {
        self.entries
            .get_index_mut(index)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Force a full scan of this document and, recursively, of every nested document and array,
    /// so that later access never parses.
    pub fn materialize(&mut self) -> Result<()> {
        self.scan_all()?;
        for (key, value) in self.entries.iter_mut() {
            value.materialize().map_err(|e| e.with_key(key.as_str()))?;
        }
        debug!(fields = self.entries.len(), "materialized document");
        Ok(())
    }

    /// The number of elements scanned so far, duplicates included.
    pub fn scanned_len(&self) -> usize {
        self.scanner.scanned
    }

    /// How far scanning has progressed.
    pub fn state(&self) -> ScanState {
        self.scanner.state
    }

    /// The document this reader scans.
    pub fn as_raw_document(&self) -> &RawDocumentBuf {
        &self.doc
    }

    /// Decode the whole document eagerly into a [`Document`]. Repeated keys are kept in order.
    pub fn to_document(&mut self) -> Result<Document> {
        self.scan_all()?;
        if self.scanner.scanned != self.entries.len() {
            // The cache holds first occurrences only.
            return self.doc.to_document();
        }
        let mut doc = Document::new();
        for (key, value) in self.entries.iter() {
            doc.insert(key.as_str(), value.to_bson().map_err(|e| e.with_key(key.as_str()))?);
        }
        Ok(doc)
    }
}

impl From<RawDocumentBuf> for DocumentReader {
    fn from(doc: RawDocumentBuf) -> Self {
        Self::new(doc)
    }
}

/// A lazily scanning reader over one BSON array.
///
/// Identical to [`DocumentReader`], except that elements are addressed by position: keys are
/// skipped during the scan, and [`ArrayReader::read`] stops as soon as the requested index has
/// been reached.
#[derive(Clone, Debug)]
pub struct ArrayReader {
    array: RawArrayBuf,
    scanner: Scanner,
    elements: Vec<ValueReader>,
}

impl ArrayReader {
    pub(crate) fn new(array: RawArrayBuf) -> Self {
        Self {
            scanner: Scanner::new(array.as_span().clone()),
            array,
            elements: Vec::new(),
        }
    }

    fn advance(&mut self) -> Result<bool> {
        match self.scanner.next() {
            Ok(Some((_, value))) => {
                self.elements.push(value);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(e.with_index(self.elements.len())),
        }
    }

    fn seek(&mut self, index: usize) -> Result<bool> {
        while self.elements.len() <= index {
            if !self.advance()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn scan_all(&mut self) -> Result<()> {
        while self.advance()? {}
        Ok(())
    }

    /// Read the element at `index`, scanning forward if needed. Returns `Ok(None)` if the array
    /// is shorter.
    pub fn read(&mut self, index: usize) -> Result<Option<&ValueReader>> {
        self.seek(index)?;
        Ok(self.elements.get(index))
    }

    /// Like [`ArrayReader::read`], but hands out the cached reader mutably.
    pub fn read_mut(&mut self, index: usize) -> Result<Option<&mut ValueReader>> {
        self.seek(index)?;
        Ok(self.elements.get_mut(index))
    }

    /// Look up `index` in the cache only. Never scans.
    pub fn get(&self, index: usize) -> Option<&ValueReader> {
        self.elements.get(index)
    }

    /// Scan the whole array and return all elements in order.
    pub fn elements(&mut self) -> Result<&[ValueReader]> {
        self.scan_all()?;
        Ok(&self.elements)
    }

    /// Scan the whole array and return its length.
    pub fn len(&mut self) -> Result<usize> {
        self.scan_all()?;
        Ok(self.elements.len())
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Force a full, recursive scan. See [`DocumentReader::materialize`].
    pub fn materialize(&mut self) -> Result<()> {
        self.scan_all()?;
        for (index, value) in self.elements.iter_mut().enumerate() {
            value.materialize().map_err(|e| e.with_index(index))?;
        }
        debug!(elements = self.elements.len(), "materialized array");
        Ok(())
    }

    /// The number of elements scanned so far.
    pub fn scanned_len(&self) -> usize {
        self.scanner.scanned
    }

    /// How far scanning has progressed.
    pub fn state(&self) -> ScanState {
        self.scanner.state
    }

    /// The array this reader scans.
    pub fn as_raw_array(&self) -> &RawArrayBuf {
        &self.array
    }

    /// Decode the whole array eagerly.
    pub fn to_vec(&mut self) -> Result<Vec<crate::Bson>> {
        self.scan_all()?;
        self.elements
            .iter()
            .enumerate()
            .map(|(i, v)| v.to_bson().map_err(|e| e.with_index(i)))
            .collect()
    }
}

impl From<RawArrayBuf> for ArrayReader {
    fn from(array: RawArrayBuf) -> Self {
        Self::new(array)
    }
}
