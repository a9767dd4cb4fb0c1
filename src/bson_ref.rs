use crate::{
    Binary,
    Bson,
    DateTime,
    DbPointer,
    Decimal128,
    JavaScriptCodeWithScope,
    RawArray,
    RawDocument,
    Timestamp,
    cstr::CStr,
    error::Result,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// A BSON value referencing raw bytes stored elsewhere.
///
/// This is the single input type of the primitive encoder (every writer funnels through
/// [`FieldWriter::write_bson`](crate::FieldWriter::write_bson)) and the output of the primitive
/// decoder ([`ValueReader::as_bson_ref`](crate::ValueReader::as_bson_ref)).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BsonRef<'a> {
    /// 64-bit binary floating point
    Double(f64),
    /// UTF-8 string
    String(&'a str),
    /// Embedded document
    Document(&'a RawDocument),
    /// Array
    Array(&'a RawArray),
    /// Binary data
    Binary(BinaryRef<'a>),
    /// Deprecated. Undefined (value)
    Undefined,
    /// [ObjectId](http://dochub.mongodb.org/core/objectids)
    ObjectId(ObjectId),
    /// Boolean value
    Boolean(bool),
    /// UTC datetime
    DateTime(DateTime),
    /// Null value
    Null,
    /// Regular expression
    RegularExpression(RegexRef<'a>),
    /// Deprecated. DBPointer
    DbPointer(DbPointerRef<'a>),
    /// JavaScript code
    JavaScriptCode(&'a str),
    /// Deprecated. Symbol
    Symbol(&'a str),
    /// Deprecated. JavaScript code w/ scope
    JavaScriptCodeWithScope(JavaScriptCodeWithScopeRef<'a>),
    /// 32-bit signed integer
    Int32(i32),
    /// Timestamp
    Timestamp(Timestamp),
    /// 64-bit signed integer
    Int64(i64),
    /// 128-bit decimal floating point
    Decimal128(Decimal128),
    /// Max key
    MaxKey,
    /// Min key
    MinKey,
}

impl<'a> BsonRef<'a> {
    /// Get the [`ElementType`] of this value.
    pub fn element_type(&self) -> ElementType {
        match *self {
            BsonRef::Double(..) => ElementType::Double,
            BsonRef::String(..) => ElementType::String,
            BsonRef::Array(..) => ElementType::Array,
            BsonRef::Document(..) => ElementType::EmbeddedDocument,
            BsonRef::Boolean(..) => ElementType::Boolean,
            BsonRef::Null => ElementType::Null,
            BsonRef::RegularExpression(..) => ElementType::RegularExpression,
            BsonRef::JavaScriptCode(..) => ElementType::JavaScriptCode,
            BsonRef::JavaScriptCodeWithScope(..) => ElementType::JavaScriptCodeWithScope,
            BsonRef::Int32(..) => ElementType::Int32,
            BsonRef::Int64(..) => ElementType::Int64,
            BsonRef::Timestamp(..) => ElementType::Timestamp,
            BsonRef::Binary(..) => ElementType::Binary,
            BsonRef::ObjectId(..) => ElementType::ObjectId,
            BsonRef::DateTime(..) => ElementType::DateTime,
            BsonRef::Symbol(..) => ElementType::Symbol,
            BsonRef::Decimal128(..) => ElementType::Decimal128,
            BsonRef::Undefined => ElementType::Undefined,
            BsonRef::MaxKey => ElementType::MaxKey,
            BsonRef::MinKey => ElementType::MinKey,
            BsonRef::DbPointer(..) => ElementType::DbPointer,
        }
    }

    /// Convert this [`BsonRef`] to the equivalent owned [`Bson`], decoding nested documents and
    /// arrays eagerly.
    pub fn to_bson(&self) -> Result<Bson> {
        Ok(match *self {
            BsonRef::Double(d) => Bson::Double(d),
            BsonRef::String(s) => Bson::String(s.to_string()),
            BsonRef::Document(d) => Bson::Document(d.to_document()?),
            BsonRef::Array(a) => Bson::Array(a.to_vec()?),
            BsonRef::Binary(b) => Bson::Binary(b.to_binary()),
            BsonRef::Undefined => Bson::Undefined,
            BsonRef::ObjectId(o) => Bson::ObjectId(o),
            BsonRef::Boolean(b) => Bson::Boolean(b),
            BsonRef::DateTime(dt) => Bson::DateTime(dt),
            BsonRef::Null => Bson::Null,
            BsonRef::RegularExpression(re) => Bson::RegularExpression(re.into()),
            BsonRef::DbPointer(p) => Bson::DbPointer(DbPointer {
                namespace: p.namespace.to_string(),
                id: p.id,
            }),
            BsonRef::JavaScriptCode(c) => Bson::JavaScriptCode(c.to_string()),
            BsonRef::Symbol(s) => Bson::Symbol(s.to_string()),
            BsonRef::JavaScriptCodeWithScope(c) => {
                Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                    code: c.code.to_string(),
                    scope: c.scope.to_document()?,
                })
            }
            BsonRef::Int32(i) => Bson::Int32(i),
            BsonRef::Timestamp(ts) => Bson::Timestamp(ts),
            BsonRef::Int64(i) => Bson::Int64(i),
            BsonRef::Decimal128(d) => Bson::Decimal128(d),
            BsonRef::MaxKey => Bson::MaxKey,
            BsonRef::MinKey => Bson::MinKey,
        })
    }
}

impl From<f64> for BsonRef<'_> {
    fn from(f: f64) -> Self {
        BsonRef::Double(f)
    }
}

impl<'a> From<&'a str> for BsonRef<'a> {
    fn from(s: &'a str) -> Self {
        BsonRef::String(s)
    }
}

impl<'a> From<&'a RawDocument> for BsonRef<'a> {
    fn from(d: &'a RawDocument) -> Self {
        BsonRef::Document(d)
    }
}

impl<'a> From<&'a RawArray> for BsonRef<'a> {
    fn from(a: &'a RawArray) -> Self {
        BsonRef::Array(a)
    }
}

impl From<bool> for BsonRef<'_> {
    fn from(b: bool) -> Self {
        BsonRef::Boolean(b)
    }
}

impl From<i32> for BsonRef<'_> {
    fn from(i: i32) -> Self {
        BsonRef::Int32(i)
    }
}

impl From<i64> for BsonRef<'_> {
    fn from(i: i64) -> Self {
        BsonRef::Int64(i)
    }
}

impl From<ObjectId> for BsonRef<'_> {
    fn from(oid: ObjectId) -> Self {
        BsonRef::ObjectId(oid)
    }
}

impl From<DateTime> for BsonRef<'_> {
    fn from(dt: DateTime) -> Self {
        BsonRef::DateTime(dt)
    }
}

impl From<Timestamp> for BsonRef<'_> {
    fn from(ts: Timestamp) -> Self {
        BsonRef::Timestamp(ts)
    }
}

impl From<Decimal128> for BsonRef<'_> {
    fn from(d: Decimal128) -> Self {
        BsonRef::Decimal128(d)
    }
}

impl<'a> From<BinaryRef<'a>> for BsonRef<'a> {
    fn from(b: BinaryRef<'a>) -> Self {
        BsonRef::Binary(b)
    }
}

impl<'a> From<RegexRef<'a>> for BsonRef<'a> {
    fn from(re: RegexRef<'a>) -> Self {
        BsonRef::RegularExpression(re)
    }
}

/// A BSON binary value referencing raw bytes stored elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryRef<'a> {
    /// The subtype of the binary value.
    pub subtype: BinarySubtype,

    /// The binary bytes.
    pub bytes: &'a [u8],
}

impl BinaryRef<'_> {
    /// Copy the contents into a [`Binary`].
    pub fn to_binary(&self) -> Binary {
        Binary {
            subtype: self.subtype,
            bytes: self.bytes.to_owned(),
        }
    }

    /// The length of the value as written: the payload, plus the inner length prefix carried by
    /// the legacy binary subtype.
    pub(crate) fn len(&self) -> i32 {
        match self.subtype {
            BinarySubtype::BinaryOld => self.bytes.len() as i32 + 4,
            _ => self.bytes.len() as i32,
        }
    }
}

/// A BSON regex referencing raw bytes stored elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegexRef<'a> {
    /// The regex pattern to match.
    pub pattern: &'a CStr,

    /// The options for the regex.
    ///
    /// Options are identified by characters, which must be stored in
    /// alphabetical order. Valid options are 'i' for case insensitive matching, 'm' for
    /// multiline matching, 'x' for verbose mode, 'l' to make \w, \W, etc. locale dependent,
    /// 's' for dotall mode ('.' matches everything), and 'u' to make \w, \W, etc. match
    /// unicode.
    pub options: &'a CStr,
}

/// A BSON DB pointer value referencing raw bytes stored elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DbPointerRef<'a> {
    pub(crate) namespace: &'a str,
    pub(crate) id: ObjectId,
}

impl<'a> DbPointerRef<'a> {
    /// Creates a DB pointer to the document with id `id` in `namespace`.
    pub fn new(namespace: &'a str, id: ObjectId) -> Self {
        Self { namespace, id }
    }

    /// The namespace of the referenced document.
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// The id of the referenced document.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// A BSON "code with scope" value referencing raw bytes stored elsewhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JavaScriptCodeWithScopeRef<'a> {
    /// The JavaScript code.
    pub code: &'a str,

    /// The scope document containing variable bindings.
    pub scope: &'a RawDocument,
}

impl JavaScriptCodeWithScopeRef<'_> {
    /// The total encoded length: the length prefix, the code string and the scope document.
    pub(crate) fn len(&self) -> i32 {
        4 + 4 + self.code.len() as i32 + 1 + self.scope.as_bytes().len() as i32
    }
}
