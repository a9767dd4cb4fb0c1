use core::str;

use crate::error::{Error, ErrorKind, Result};

#[allow(rustdoc::invalid_rust_codeblocks)]
/// A borrowed BSON-spec cstring: zero or more UTF-8 encoded characters, excluding the nul byte.
/// Element names and regular expression parts are cstrings. Can be constructed at compile-time
/// via the [`cstr!`](crate::cstr!) macro or at run-time from a [`prim@str`] via [`TryFrom`].
///
/// Writers take element names as `&CStr`, so a name with an embedded nul byte is rejected before
/// any bytes are written:
/// ```compile_fail
/// # use lazybson::cstr;
/// let invalid: &lazybson::CStr = cstr!("foo\0bar");  // will not compile
/// ```
#[derive(Debug)]
#[repr(transparent)]
pub struct CStr {
    data: [u8],
}

impl<'a> TryFrom<&'a str> for &'a CStr {
    type Error = Error;

    fn try_from(value: &str) -> Result<&CStr> {
        match validate_cstr(value) {
            Some(cs) => Ok(cs),
            None => Err(ErrorKind::InvalidCString {
                value: value.to_string(),
            }
            .into()),
        }
    }
}

impl CStr {
    /// Convenience shorthand for making the types of `TryFrom` line up.
    pub fn from_str(value: &str) -> Result<&CStr> {
        value.try_into()
    }

    pub(crate) const fn from_str_unchecked(value: &str) -> &Self {
        // Safety: the conversion is safe because CStr is repr(transparent), and the deref is safe
        // because the pointer came from a safe reference.
        unsafe { &*(value.as_bytes() as *const [u8] as *const CStr) }
    }

    /// View the buffer as a Rust `&str`.
    pub fn as_str(&self) -> &str {
        // Safety: the only way to construct a CStr is from a valid &str.
        unsafe { str::from_utf8_unchecked(&self.data) }
    }

    /// The length in bytes of the buffer, excluding the nul terminator.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer contains zero bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn append_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.data);
        buf.push(0);
    }
}

impl PartialEq for CStr {
    fn eq(&self, other: &CStr) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for CStr {}

impl std::hash::Hash for CStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl std::borrow::ToOwned for CStr {
    type Owned = CString;

    fn to_owned(&self) -> Self::Owned {
        self.into()
    }
}

impl AsRef<CStr> for CStr {
    fn as_ref(&self) -> &CStr {
        self
    }
}

impl AsRef<str> for CStr {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for CStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

#[doc(hidden)]
#[diagnostic::on_unimplemented(message = "the string literal contains a zero byte")]
pub trait ValidCStr {}
#[doc(hidden)]
pub struct IsValidCStr<const VALID: bool>;
#[doc(hidden)]
impl ValidCStr for IsValidCStr<true> {}

#[doc(hidden)]
pub const fn validate_cstr(text: &str) -> Option<&CStr> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0 {
            return None;
        }
        i += 1;
    }
    Some(CStr::from_str_unchecked(text))
}
#[doc(hidden)]
pub const fn assert_valid_cstr<T: ValidCStr>() {}

/// Construct a `'static &CStr`. The absence of interior nul bytes is verified at compile-time.
/// ```
/// # use lazybson::{CStr, cstr};
/// let key: &CStr = cstr!("hello");
/// ```
#[macro_export]
macro_rules! cstr {
    ($text:literal) => {{
        const VALIDATED: Option<&$crate::CStr> = $crate::cstr::validate_cstr($text);
        const VALID: bool = VALIDATED.is_some();
        $crate::cstr::assert_valid_cstr::<$crate::cstr::IsValidCStr<VALID>>();
        VALIDATED.unwrap()
    }};
}

/// An owned BSON-spec cstring. `CString` is to `CStr` as [`String`] is to [`prim@str`].
#[derive(Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct CString {
    data: String,
}

impl TryFrom<String> for CString {
    type Error = Error;

    fn try_from(data: String) -> Result<Self> {
        let _: &CStr = data.as_str().try_into()?;
        Ok(Self { data })
    }
}

impl TryFrom<&str> for CString {
    type Error = Error;

    fn try_from(data: &str) -> Result<Self> {
        let cs: &CStr = data.try_into()?;
        Ok(cs.into())
    }
}

impl CString {
    /// Consume `self` to return the underlying `String`.
    pub fn into_string(self) -> String {
        self.data
    }

    /// View the buffer as a Rust `&str`.
    pub fn as_str(&self) -> &str {
        self.data.as_str()
    }
}

impl From<&CStr> for CString {
    fn from(value: &CStr) -> Self {
        Self {
            data: value.as_str().into(),
        }
    }
}

impl AsRef<CStr> for CString {
    fn as_ref(&self) -> &CStr {
        CStr::from_str_unchecked(self.data.as_str())
    }
}

impl std::ops::Deref for CString {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        self.as_ref()
    }
}

impl std::fmt::Debug for CString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.data.fmt(f)
    }
}

impl std::fmt::Display for CString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.data.fmt(f)
    }
}

impl std::borrow::Borrow<CStr> for CString {
    fn borrow(&self) -> &CStr {
        self.as_ref()
    }
}
