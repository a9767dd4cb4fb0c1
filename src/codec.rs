//! Bit-exact encoding and decoding of individual BSON values, and the element scanner shared by
//! every reader in the crate.

use crate::{
    BsonRef,
    DateTime,
    Decimal128,
    RawArray,
    RawDocument,
    Timestamp,
    buf::Cursor,
    bson_ref::{BinaryRef, DbPointerRef, JavaScriptCodeWithScopeRef, RegexRef},
    cstr::CStr,
    error::{Error, Result},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

pub(crate) const MIN_BSON_STRING_SIZE: i32 = 4 + 1; // 4 bytes for length, one byte for null terminator
pub(crate) const MIN_BSON_DOCUMENT_SIZE: i32 = 4 + 1; // 4 bytes for length, one byte for null terminator
pub(crate) const MIN_CODE_WITH_SCOPE_SIZE: i32 = 4 + MIN_BSON_STRING_SIZE + MIN_BSON_DOCUMENT_SIZE;

pub(crate) fn to_str(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::invalid_encoding())
}

pub(crate) fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_i32(buf, s.len() as i32 + 1);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Overwrite the length prefix of the document or array that began at `start`, once everything
/// up to and including its null terminator has been written.
pub(crate) fn patch_length(buf: &mut [u8], start: usize) {
    let length = (buf.len() - start) as i32;
    buf[start..start + 4].copy_from_slice(&length.to_le_bytes());
}

/// Append a full element: type tag, name, then value.
pub(crate) fn append_element(buf: &mut Vec<u8>, name: &CStr, value: BsonRef<'_>) {
    buf.push(value.element_type() as u8);
    name.append_to(buf);
    append_value(buf, value);
}

/// Append the value bytes of `value`, without tag or name.
pub(crate) fn append_value(buf: &mut Vec<u8>, value: BsonRef<'_>) {
    match value {
        BsonRef::Int32(i) => buf.extend_from_slice(&i.to_le_bytes()),
        BsonRef::Int64(i) => buf.extend_from_slice(&i.to_le_bytes()),
        BsonRef::Double(d) => buf.extend_from_slice(&d.to_le_bytes()),
        BsonRef::String(s) | BsonRef::JavaScriptCode(s) | BsonRef::Symbol(s) => {
            write_string(buf, s)
        }
        BsonRef::Document(d) => buf.extend_from_slice(d.as_bytes()),
        BsonRef::Array(a) => buf.extend_from_slice(a.as_bytes()),
        BsonRef::Binary(b) => {
            write_i32(buf, b.len());
            buf.push(b.subtype.into());
            if let BinarySubtype::BinaryOld = b.subtype {
                write_i32(buf, b.bytes.len() as i32);
            }
            buf.extend_from_slice(b.bytes);
        }
        BsonRef::Boolean(b) => buf.push(b as u8),
        BsonRef::DateTime(dt) => buf.extend_from_slice(&dt.timestamp_millis().to_le_bytes()),
        BsonRef::Timestamp(ts) => buf.extend_from_slice(&ts.to_le_bytes()),
        BsonRef::ObjectId(oid) => buf.extend_from_slice(&oid.bytes()),
        BsonRef::Decimal128(d) => buf.extend_from_slice(&d.bytes()),
        BsonRef::RegularExpression(re) => {
            re.pattern.append_to(buf);
            re.options.append_to(buf);
        }
        BsonRef::DbPointer(p) => {
            write_string(buf, p.namespace);
            buf.extend_from_slice(&p.id.bytes());
        }
        BsonRef::JavaScriptCodeWithScope(c) => {
            write_i32(buf, c.len());
            write_string(buf, c.code);
            buf.extend_from_slice(c.scope.as_bytes());
        }
        BsonRef::Null | BsonRef::Undefined | BsonRef::MinKey | BsonRef::MaxKey => {}
    }
}

fn read_len(cursor: &mut Cursor<'_>) -> Result<usize> {
    let len = cursor.read_i32()?;
    if len < 0 {
        return Err(Error::malformed(format!("negative length: {len}")));
    }
    Ok(len as usize)
}

/// The number of value bytes an element of type `element_type` occupies, starting at the
/// cursor's position. Only the length-determining bytes are inspected; the contents are
/// validated later by [`decode_value`].
pub(crate) fn value_len(element_type: ElementType, mut cursor: Cursor<'_>) -> Result<usize> {
    let start = cursor.peek();
    let len = match element_type {
        ElementType::Int32 => 4,
        ElementType::Boolean => 1,
        ElementType::Int64
        | ElementType::Double
        | ElementType::DateTime
        | ElementType::Timestamp => 8,
        ElementType::ObjectId => 12,
        ElementType::Decimal128 => 16,
        ElementType::Null | ElementType::Undefined | ElementType::MinKey | ElementType::MaxKey => {
            0
        }
        ElementType::String | ElementType::JavaScriptCode | ElementType::Symbol => {
            let len = read_len(&mut cursor)?;
            if len < 1 {
                return Err(Error::malformed(format!("string too short: {len} bytes")));
            }
            4 + len
        }
        ElementType::EmbeddedDocument | ElementType::Array => {
            let size = cursor.read_i32()?;
            if size < MIN_BSON_DOCUMENT_SIZE {
                return Err(Error::malformed(format!("document too small: {size} bytes")));
            }
            size as usize
        }
        ElementType::Binary => 4 + 1 + read_len(&mut cursor)?,
        ElementType::RegularExpression => cursor.skip_cstr()? + cursor.skip_cstr()?,
        ElementType::DbPointer => {
            let len = read_len(&mut cursor)?;
            4 + len + 12
        }
        ElementType::JavaScriptCodeWithScope => {
            let size = cursor.read_i32()?;
            if size < MIN_CODE_WITH_SCOPE_SIZE {
                return Err(Error::malformed(format!(
                    "code with scope too small: {size} bytes"
                )));
            }
            size as usize
        }
    };

    if !start.request(len) {
        return Err(Error::truncated(len, start.remaining()));
    }
    Ok(len)
}

/// One element located by [`read_element`]. Offsets are relative to the enclosing document.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawElement<'a> {
    pub(crate) key: &'a str,
    pub(crate) element_type: ElementType,
    pub(crate) value_start: usize,
    pub(crate) value_end: usize,
}

impl<'a> RawElement<'a> {
    pub(crate) fn value<'d>(&self, doc: &'d [u8]) -> &'d [u8] {
        &doc[self.value_start..self.value_end]
    }
}

/// Locate the element that begins at `offset` in `doc`, which must hold a whole document or
/// array (length prefix through null terminator). Returns `None` at the terminator.
pub(crate) fn read_element(doc: &[u8], offset: usize) -> Result<Option<RawElement<'_>>> {
    let terminator = doc.len().saturating_sub(1);
    if offset == terminator {
        return match doc.get(offset) {
            Some(0) => Ok(None),
            _ => Err(Error::malformed("document not null terminated")),
        };
    } else if offset > terminator {
        return Err(Error::malformed("iteration overflowed document"));
    }

    let mut cursor = Cursor::at(doc, offset);
    let tag = cursor.read_u8()?;
    if tag == 0 {
        return Err(Error::malformed(format!(
            "null terminator at offset {offset}, before the end of the document"
        )));
    }
    let key = cursor.read_cstr()?;
    let element_type = ElementType::from(tag).ok_or_else(|| Error::unknown_type(tag).with_key(key))?;

    let value_start = cursor.position();
    let len = value_len(element_type, cursor).map_err(|e| e.with_key(key))?;
    let value_end = value_start + len;
    if value_end > terminator {
        return Err(Error::malformed(format!(
            "element length exceeds remaining length of document: {} vs {}",
            len,
            terminator - value_start
        ))
        .with_key(key));
    }

    Ok(Some(RawElement {
        key,
        element_type,
        value_start,
        value_end,
    }))
}

fn read_string<'a>(cursor: &mut Cursor<'a>) -> Result<&'a str> {
    let len = read_len(cursor)?;
    if len < 1 {
        return Err(Error::malformed(format!("string too short: {len} bytes")));
    }
    let bytes = cursor.read_slice(len)?;
    match bytes.split_last() {
        Some((0, s)) => to_str(s),
        _ => Err(Error::malformed("string not null terminated")),
    }
}

fn read_regex_part<'a>(cursor: &mut Cursor<'a>) -> Result<&'a CStr> {
    Ok(CStr::from_str_unchecked(cursor.read_cstr()?))
}

fn check_consumed(cursor: &Cursor<'_>, element_type: ElementType) -> Result<()> {
    if cursor.remaining() != 0 {
        return Err(Error::malformed(format!(
            "{element_type} value has {} trailing bytes",
            cursor.remaining()
        )));
    }
    Ok(())
}

/// Decode the value bytes of one element, as sliced out by [`read_element`].
pub(crate) fn decode_value(element_type: ElementType, bytes: &[u8]) -> Result<BsonRef<'_>> {
    let mut cursor = Cursor::new(bytes);
    let value = match element_type {
        ElementType::Int32 => BsonRef::Int32(cursor.read_i32()?),
        ElementType::Int64 => BsonRef::Int64(cursor.read_i64()?),
        ElementType::Double => BsonRef::Double(cursor.read_f64()?),
        ElementType::String => BsonRef::String(read_string(&mut cursor)?),
        ElementType::JavaScriptCode => BsonRef::JavaScriptCode(read_string(&mut cursor)?),
        ElementType::Symbol => BsonRef::Symbol(read_string(&mut cursor)?),
        ElementType::EmbeddedDocument => {
            cursor.skip(bytes.len())?;
            BsonRef::Document(RawDocument::from_bytes(bytes)?)
        }
        ElementType::Array => {
            cursor.skip(bytes.len())?;
            BsonRef::Array(RawArray::from_bytes(bytes)?)
        }
        ElementType::Binary => {
            let len = read_len(&mut cursor)?;
            let subtype = BinarySubtype::from(cursor.read_u8()?);
            let data = cursor.read_slice(len)?;
            let data = match subtype {
                BinarySubtype::BinaryOld => {
                    let mut inner = Cursor::new(data);
                    let old_len = inner
                        .read_i32()
                        .map_err(|_| Error::malformed("old binary subtype has no inner declared length"))?;
                    if old_len < 0 || old_len as usize + 4 != len {
                        return Err(Error::malformed(
                            "old binary subtype has wrong inner declared length",
                        ));
                    }
                    inner.read_slice(old_len as usize)?
                }
                _ => data,
            };
            BsonRef::Binary(BinaryRef {
                subtype,
                bytes: data,
            })
        }
        ElementType::ObjectId => BsonRef::ObjectId(ObjectId::from_bytes(cursor.read_array()?)),
        ElementType::Boolean => match cursor.read_u8()? {
            0 => BsonRef::Boolean(false),
            1 => BsonRef::Boolean(true),
            other => {
                return Err(Error::malformed(format!(
                    "boolean must be stored as 0 or 1, got {other}"
                )));
            }
        },
        ElementType::DateTime => BsonRef::DateTime(DateTime::from_millis(cursor.read_i64()?)),
        ElementType::Timestamp => BsonRef::Timestamp(Timestamp::from_le_bytes(cursor.read_array()?)),
        ElementType::Decimal128 => {
            BsonRef::Decimal128(Decimal128::from_bytes(cursor.read_array()?))
        }
        ElementType::RegularExpression => BsonRef::RegularExpression(RegexRef {
            pattern: read_regex_part(&mut cursor)?,
            options: read_regex_part(&mut cursor)?,
        }),
        ElementType::DbPointer => {
            let namespace = read_string(&mut cursor)?;
            let id = ObjectId::from_bytes(cursor.read_array()?);
            BsonRef::DbPointer(DbPointerRef::new(namespace, id))
        }
        ElementType::JavaScriptCodeWithScope => {
            let total = read_len(&mut cursor)?;
            if total != bytes.len() {
                return Err(Error::malformed(format!(
                    "code with scope length mismatch: declared {total}, actual {}",
                    bytes.len()
                )));
            }
            let code = read_string(&mut cursor)?;
            let scope = RawDocument::from_bytes(cursor.read_slice(cursor.remaining())?)?;
            BsonRef::JavaScriptCodeWithScope(JavaScriptCodeWithScopeRef { code, scope })
        }
        ElementType::Null => BsonRef::Null,
        ElementType::Undefined => BsonRef::Undefined,
        ElementType::MinKey => BsonRef::MinKey,
        ElementType::MaxKey => BsonRef::MaxKey,
    };
    check_consumed(&cursor, element_type)?;
    Ok(value)
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{cstr, error::ErrorKind};

    fn encode(value: BsonRef<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        append_value(&mut buf, value);
        buf
    }

    #[test]
    fn fixed_sizes() {
        let values = [
            (BsonRef::Double(2.5), 8),
            (BsonRef::Boolean(true), 1),
            (BsonRef::Int32(-7), 4),
            (BsonRef::Int64(1 << 40), 8),
            (BsonRef::DateTime(DateTime::from_millis(-1)), 8),
            (
                BsonRef::Timestamp(Timestamp {
                    time: 1,
                    increment: 2,
                }),
                8,
            ),
            (BsonRef::Decimal128(Decimal128::from_bytes([7; 16])), 16),
            (BsonRef::ObjectId(ObjectId::from_bytes([1; 12])), 12),
            (BsonRef::Null, 0),
            (BsonRef::Undefined, 0),
            (BsonRef::MinKey, 0),
            (BsonRef::MaxKey, 0),
        ];
        for (value, size) in values {
            let bytes = encode(value);
            assert_eq!(bytes.len(), size, "{value:?}");
            assert_eq!(value_len(value.element_type(), Cursor::new(&bytes)).unwrap(), size);
            assert_eq!(decode_value(value.element_type(), &bytes).unwrap(), value);
        }
    }

    #[test]
    fn string_layout() {
        let bytes = encode(BsonRef::String("hi"));
        assert_eq!(bytes, [3, 0, 0, 0, b'h', b'i', 0]);
        assert_eq!(value_len(ElementType::String, Cursor::new(&bytes)).unwrap(), 7);
    }

    #[test]
    fn timestamp_layout_is_increment_then_time() {
        let bytes = encode(BsonRef::Timestamp(Timestamp {
            time: 0x01020304,
            increment: 0x0A0B0C0D,
        }));
        assert_eq!(bytes, [0x0D, 0x0C, 0x0B, 0x0A, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn regex_size_scans_both_cstrings() {
        let bytes = encode(BsonRef::RegularExpression(RegexRef {
            pattern: cstr!("a+b"),
            options: cstr!("i"),
        }));
        assert_eq!(bytes, b"a+b\0i\0");
        assert_eq!(
            value_len(ElementType::RegularExpression, Cursor::new(&bytes)).unwrap(),
            6
        );
    }

    #[test]
    fn binary_old_carries_inner_length() {
        let value = BsonRef::Binary(BinaryRef {
            subtype: BinarySubtype::BinaryOld,
            bytes: &[1, 2, 3],
        });
        let bytes = encode(value);
        assert_eq!(bytes, [7, 0, 0, 0, 2, 3, 0, 0, 0, 1, 2, 3]);
        assert_eq!(decode_value(ElementType::Binary, &bytes).unwrap(), value);

        let mut bad = bytes.clone();
        bad[5] = 2;
        assert_matches!(
            decode_value(ElementType::Binary, &bad).unwrap_err().kind,
            ErrorKind::MalformedDocument { .. }
        );
    }

    #[test]
    fn truncated_values() {
        assert_matches!(
            value_len(ElementType::Int64, Cursor::new(&[1, 2, 3])).unwrap_err().kind,
            ErrorKind::TruncatedInput {
                needed: 8,
                remaining: 3
            }
        );
        assert_matches!(
            value_len(ElementType::String, Cursor::new(&[10, 0, 0, 0, b'a', 0])).unwrap_err().kind,
            ErrorKind::TruncatedInput { .. }
        );
    }

    #[test]
    fn invalid_utf8_is_invalid_encoding() {
        let bytes = [3, 0, 0, 0, 0xFF, 0xFE, 0];
        assert_matches!(
            decode_value(ElementType::String, &bytes).unwrap_err().kind,
            ErrorKind::InvalidEncoding
        );
    }

    #[test]
    fn boolean_must_be_zero_or_one() {
        assert_matches!(
            decode_value(ElementType::Boolean, &[2]).unwrap_err().kind,
            ErrorKind::MalformedDocument { .. }
        );
    }

    #[test]
    fn unknown_tag_reports_key() {
        let doc = [10, 0, 0, 0, 0x42, b'k', 0, 0, 0, 0];
        let err = read_element(&doc, 4).unwrap_err();
        assert_matches!(err.kind, ErrorKind::UnknownBsonType { code: 0x42 });
        assert_eq!(err.key.as_deref(), Some("k"));
    }
}
