//! Contains the error-related types for the `lazybson` crate.

use thiserror::Error;

use crate::spec::ElementType;

/// The result type for all methods that can return an error in the `lazybson` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `lazybson` crate.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// The document key associated with the error, if any.
    pub key: Option<String>,

    /// The array index associated with the error, if any.
    pub index: Option<usize>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(key) = self.key.as_deref() {
            write!(f, "Error at key \"{key}\": ")?;
        } else if let Some(index) = self.index {
            write!(f, "Error at array index {index}: ")?;
        }

        write!(f, "{}", self.kind)
    }
}

/// The types of errors that can occur in the `lazybson` crate.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input ended in the middle of an element.
    #[error("Truncated input: needed {needed} bytes, but only {remaining} remain")]
    #[non_exhaustive]
    TruncatedInput { needed: usize, remaining: usize },

    /// The structure of a document or array was invalid, e.g. a missing null terminator or a
    /// length prefix that does not match the bytes it describes.
    #[error("Malformed document: {message}")]
    #[non_exhaustive]
    MalformedDocument { message: String },

    /// An element type tag outside of the set defined by the BSON specification.
    #[error("Unknown BSON type: {code:#04x}")]
    #[non_exhaustive]
    UnknownBsonType { code: u8 },

    /// Invalid UTF-8 bytes were encountered in a string or cstring.
    #[error("Invalid UTF-8")]
    InvalidEncoding,

    /// A typed accessor was called against a value stored with another type.
    #[error("Expected type {expected:?}, got type {actual:?}")]
    #[non_exhaustive]
    TypeMismatch {
        /// The type the caller asked for.
        expected: ElementType,

        /// The type actually stored.
        actual: ElementType,
    },

    /// A required field was not present in the document.
    #[error("Missing field \"{name}\"")]
    #[non_exhaustive]
    MissingField { name: String },

    /// A subrange of a span was requested outside of its bounds.
    #[error("Range {start}..{end} is out of bounds for a span of length {len}")]
    #[non_exhaustive]
    OutOfBounds { start: usize, end: usize, len: usize },

    /// A string used as a key or regex part contained an interior null byte.
    #[error("cstring with interior null: {value:?}")]
    #[non_exhaustive]
    InvalidCString { value: String },

    /// An ObjectId could not be parsed.
    #[error("Invalid ObjectId: {message}")]
    #[non_exhaustive]
    InvalidObjectId { message: String },

    /// An error reported by a type being serialized.
    #[error("Serialization error: {message}")]
    #[non_exhaustive]
    Serialization { message: String },

    /// An error reported by a type being deserialized.
    #[error("Deserialization error: {message}")]
    #[non_exhaustive]
    Deserialization { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            key: None,
            index: None,
        }
    }
}

impl Error {
    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        if self.key.is_none() && self.index.is_none() {
            self.key = Some(key.into());
        }
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        if self.key.is_none() && self.index.is_none() {
            self.index = Some(index);
        }
        self
    }

    pub(crate) fn truncated(needed: usize, remaining: usize) -> Self {
        ErrorKind::TruncatedInput { needed, remaining }.into()
    }

    pub(crate) fn malformed(message: impl ToString) -> Self {
        ErrorKind::MalformedDocument {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn unknown_type(code: u8) -> Self {
        ErrorKind::UnknownBsonType { code }.into()
    }

    pub(crate) fn invalid_encoding() -> Self {
        ErrorKind::InvalidEncoding.into()
    }

    pub(crate) fn type_mismatch(expected: ElementType, actual: ElementType) -> Self {
        ErrorKind::TypeMismatch { expected, actual }.into()
    }

    pub(crate) fn missing_field(name: impl Into<String>) -> Self {
        ErrorKind::MissingField { name: name.into() }.into()
    }

    pub(crate) fn serialization(message: impl ToString) -> Self {
        ErrorKind::Serialization {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn deserialization(message: impl ToString) -> Self {
        ErrorKind::Deserialization {
            message: message.to_string(),
        }
        .into()
    }

    /// Whether this error was caused by input that ended mid-element.
    pub fn is_truncated_input(&self) -> bool {
        matches!(self.kind, ErrorKind::TruncatedInput { .. })
    }

    /// Whether this error was caused by a structurally invalid document.
    pub fn is_malformed_document(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedDocument { .. })
    }

    /// Whether this error was caused by a typed accessor called against the wrong type.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::TypeMismatch { .. })
    }

    /// Whether this error was caused by a required field being absent.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingField { .. })
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::serialization(msg)
    }
}

#[cfg(feature = "serde")]
impl serde::de::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::deserialization(msg)
    }

    fn missing_field(field: &'static str) -> Self {
        ErrorKind::MissingField {
            name: field.to_string(),
        }
        .into()
    }
}
