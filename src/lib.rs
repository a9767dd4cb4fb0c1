// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! BSON is a binary format in which zero or more key/value pairs are stored as a single entity.
//! We call this entity a document.
//!
//! This library supports version 1.1 of the [BSON standard](http://bsonspec.org/spec.html), with
//! an emphasis on reading documents lazily: a [`DocumentReader`] decodes fields only when they are
//! asked for, stops scanning as soon as the requested field is found, and caches everything it
//! has seen so no byte is interpreted twice.
//!
//! ## Writing
//!
//! Documents are written through the [`FieldWriter`] trait and arrays through [`ValueWriter`].
//! The streaming backend in [`raw`] appends bytes directly; [`Document`] is an eager, in-memory
//! backend implementing the same traits.
//!
//! ```rust
//! use lazybson::{cstr, raw::build_document, FieldWriter, ValueWriter};
//!
//! let doc = build_document(|w| {
//!     w.write_str(cstr!("name"), "Paul");
//!     w.write_i64(cstr!("age"), 18);
//!     w.write_array(cstr!("tags"), |a| {
//!         a.write_str("admin");
//!     });
//! });
//! assert_eq!(doc.to_string(), r#"{"name": "Paul", "age": 18, "tags": ["admin"]}"#);
//! ```
//!
//! ## Reading
//!
//! ```rust
//! use lazybson::{cstr, raw::build_document, read_document, FieldWriter};
//!
//! let bytes = build_document(|w| {
//!     w.write_i32(cstr!("a"), 1);
//!     w.write_i32(cstr!("b"), 2);
//!     w.write_i32(cstr!("c"), 3);
//! })
//! .into_bytes();
//!
//! let mut reader = read_document(bytes)?.reader();
//! assert_eq!(reader.read("b")?.unwrap().read_int32()?, 2);
//! // "c" has not been looked at yet.
//! assert_eq!(reader.scanned_len(), 2);
//! # Ok::<(), lazybson::error::Error>(())
//! ```
//!
//! ## Features
//!
//! | Feature | Description                                                   | Default |
//! |---------|---------------------------------------------------------------|---------|
//! | `serde` | [`encode_to_bson`] / [`decode_from_bson`] for any serde type  | yes     |

#![cfg_attr(docsrs, feature(doc_cfg))]

#[doc(inline)]
pub use self::{
    bson::{
        Array,
        Binary,
        Bson,
        DbPointer,
        JavaScriptCodeWithScope,
        Regex,
        Timestamp,
        Undecoded,
    },
    bson_ref::{BinaryRef, BsonRef, DbPointerRef, JavaScriptCodeWithScopeRef, RegexRef},
    buf::{Cursor, Span},
    cstr::{CStr, CString},
    datetime::DateTime,
    decimal128::Decimal128,
    document::Document,
    oid::ObjectId,
    raw::{
        ArrayReader,
        DocumentReader,
        RawArray,
        RawArrayBuf,
        RawDocument,
        RawDocumentBuf,
        ScanState,
        ValueReader,
        read_document,
    },
    writer::{FieldWriter, LegacyFieldWriter, LegacyValueWriter, ValueWriter},
};
#[cfg(feature = "serde")]
#[doc(inline)]
pub use self::{
    de::{decode_from_bson, decode_from_reader},
    ser::encode_to_bson,
};

mod bson;
mod bson_ref;
mod buf;
mod codec;
pub mod cstr;
pub mod datetime;
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod de;
pub mod decimal128;
pub mod document;
mod display;
pub mod error;
pub mod oid;
pub mod raw;
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod ser;
pub mod spec;
mod writer;
