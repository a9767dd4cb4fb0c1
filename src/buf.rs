//! Byte regions and sequential cursors, the foundation of all parsing in this crate.
//!
//! A [`Span`] is an immutable view over a shared backing buffer. Slicing a span never copies: the
//! new span shares ownership of the same allocation, so readers over nested documents can outlive
//! the reader that discovered them. A [`Cursor`] reads a span front to back.

use std::ops::{Bound, Deref, RangeBounds};

use bytes::Bytes;

use crate::error::{Error, ErrorKind, Result};

/// An immutable, cheaply cloneable view over a contiguous region of shared bytes.
///
/// Invariant: `0 <= start <= end <= backing.len()`, upheld by [`Bytes`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Span {
    bytes: Bytes,
}

impl Span {
    /// Creates a span covering the whole of `bytes`.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Creates a span over a `'static` slice without copying it.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::from_static(bytes),
        }
    }

    /// Returns a zero-copy slice of this span, or an error if `range` is out of bounds.
    pub fn subrange(&self, range: impl RangeBounds<usize>) -> Result<Span> {
        let len = self.bytes.len();
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n.saturating_add(1),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        if start > end || end > len {
            return Err(ErrorKind::OutOfBounds { start, end, len }.into());
        }
        Ok(Span {
            bytes: self.bytes.slice(start..end),
        })
    }

    /// Returns a cursor positioned at the start of this span.
    pub fn reader(&self) -> Cursor<'_> {
        Cursor::new(&self.bytes)
    }

    /// The bytes covered by this span.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the covered bytes into a new `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl Deref for Span {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Bytes> for Span {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl From<Vec<u8>> for Span {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("data", &hex::encode(&self.bytes))
            .finish()
    }
}

/// A sequential reader over a byte slice. All multi-byte integers are little-endian.
///
/// Cursors are `Copy`: [`Cursor::peek`] hands out an independent cursor at the same position that
/// can be advanced without moving this one.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub(crate) fn at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// The offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Whether at least `n` bytes remain.
    pub fn request(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// An independent cursor at the current position.
    pub fn peek(&self) -> Cursor<'a> {
        *self
    }

    /// Advances past `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_slice(n).map(|_| ())
    }

    /// Reads the next `n` bytes as a slice of the underlying data.
    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if !self.request(n) {
            return Err(Error::truncated(n, self.remaining()));
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    /// Reads the next `N` bytes as a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Reads a nul-terminated UTF-8 string, consuming the terminator.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let start = self.position;
        let len = self.cstr_len()?;
        self.position = start + len + 1;
        crate::codec::to_str(&self.data[start..start + len])
    }

    /// Advances past a nul-terminated string without validating its contents, returning the
    /// number of bytes skipped (terminator included).
    pub fn skip_cstr(&mut self) -> Result<usize> {
        let len = self.cstr_len()?;
        self.position += len + 1;
        Ok(len + 1)
    }

    fn cstr_len(&self) -> Result<usize> {
        self.data
            .get(self.position..)
            .and_then(|rest| rest.iter().position(|b| *b == 0))
            .ok_or_else(|| Error::malformed("cstring is not null-terminated"))
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::Span;
    use crate::error::ErrorKind;

    #[test]
    fn subrange_shares_and_checks_bounds() {
        let span = Span::from_static(b"hello world");
        let world = span.subrange(6..).unwrap();
        assert_eq!(world.as_bytes(), b"world");
        assert_eq!(world.subrange(1..=2).unwrap().as_bytes(), b"or");
        assert!(span.subrange(..0).unwrap().is_empty());

        assert_matches!(
            world.subrange(2..9).unwrap_err().kind,
            ErrorKind::OutOfBounds {
                start: 2,
                end: 9,
                len: 5
            }
        );
        assert_matches!(
            span.subrange(4..2).unwrap_err().kind,
            ErrorKind::OutOfBounds { .. }
        );
    }

    #[test]
    fn peeked_cursors_advance_independently() {
        let span = Span::new(vec![0x2a, 0, 0, 0, 0xff]);
        let mut cursor = span.reader();
        let mut ahead = cursor.peek();
        assert_eq!(ahead.read_i32().unwrap(), 42);
        assert_eq!(ahead.read_i8().unwrap(), -1);
        assert!(!ahead.request(1));

        assert_eq!(cursor.position(), 0);
        assert!(cursor.request(5));
        cursor.skip(4).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0xff);
    }

    #[test]
    fn short_reads_report_what_was_missing() {
        let span = Span::new(vec![1, 2, 3]);
        let mut cursor = span.reader();
        assert_matches!(
            cursor.read_i64().unwrap_err().kind,
            ErrorKind::TruncatedInput {
                needed: 8,
                remaining: 3
            }
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn cstrings() {
        let span = Span::from_static(b"ab\0\0cd");
        let mut cursor = span.reader();
        assert_eq!(cursor.read_cstr().unwrap(), "ab");
        assert_eq!(cursor.skip_cstr().unwrap(), 1);
        assert_eq!(cursor.position(), 4);
        assert_matches!(
            cursor.read_cstr().unwrap_err().kind,
            ErrorKind::MalformedDocument { .. }
        );

        let invalid = Span::new(vec![0xc3, 0x28, 0]);
        assert_matches!(
            invalid.reader().read_cstr().unwrap_err().kind,
            ErrorKind::InvalidEncoding
        );
    }
}
