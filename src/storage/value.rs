//! Stored values and their encodings.
//!
//! A string value is either integer-encoded or a raw byte buffer. Readers go
//! through [`StringValue::decoded`], which materializes the decimal text of an
//! integer-encoded value on demand, so the encoding is never observable except
//! through the numeric fast paths.
//!
//! ```text
//!   SET k 42 ──────────> Int(42)  ──APPEND/SETBIT──> Raw(b"42...")
//!   SET k hello ───────> Raw(b"hello")
//!   INCR on Raw(b"7") ─> Int(8)
//! ```

use crate::args;
use bytes::{Bytes, BytesMut};
use std::borrow::Cow;
use std::collections::HashSet;

/// The semantic type of a key, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Set,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Set => "set",
        }
    }
}

/// Representation discriminant of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Int,
    Raw,
    Hashtable,
}

/// A string value in one of its two encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringValue {
    Int(i64),
    Raw(BytesMut),
}

impl StringValue {
    /// Builds a value from client supplied bytes, integer-encoding it when
    /// the payload is a canonical 64-bit decimal.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        let data = data.as_ref();
        match args::parse_i64(data) {
            Some(n) => StringValue::Int(n),
            None => StringValue::Raw(BytesMut::from(data)),
        }
    }

    /// Builds a raw-encoded value regardless of its content.
    pub fn raw(data: impl AsRef<[u8]>) -> Self {
        StringValue::Raw(BytesMut::from(data.as_ref()))
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            StringValue::Int(_) => Encoding::Int,
            StringValue::Raw(_) => Encoding::Raw,
        }
    }

    /// Returns the canonical byte view of the value.
    pub fn decoded(&self) -> Cow<'_, [u8]> {
        match self {
            StringValue::Int(n) => Cow::Owned(args::format_i64(*n).into_bytes()),
            StringValue::Raw(buf) => Cow::Borrowed(&buf[..]),
        }
    }

    /// Returns the decoded value as an owned `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        match self.decoded() {
            Cow::Owned(v) => Bytes::from(v),
            Cow::Borrowed(s) => Bytes::copy_from_slice(s),
        }
    }

    /// Length in bytes of the decoded value.
    pub fn len(&self) -> usize {
        match self {
            StringValue::Int(n) => args::format_i64(*n).len(),
            StringValue::Raw(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the integer payload, upgrading a raw value holding a canonical
    /// integer to `Int` in place. `None` if the value is not an integer.
    pub fn as_int_mut(&mut self) -> Option<&mut i64> {
        if let StringValue::Raw(buf) = self {
            let n = args::parse_i64(buf)?;
            *self = StringValue::Int(n);
        }
        match self {
            StringValue::Int(n) => Some(n),
            StringValue::Raw(_) => None,
        }
    }

    /// Returns the byte buffer for in-place writes. An integer-encoded value
    /// is decoded to `Raw` first.
    pub fn raw_mut(&mut self) -> &mut BytesMut {
        if let StringValue::Int(n) = *self {
            *self = StringValue::Raw(BytesMut::from(args::format_i64(n).as_bytes()));
        }
        match self {
            StringValue::Raw(buf) => buf,
            StringValue::Int(_) => unreachable!("integer value was just decoded"),
        }
    }
}

/// A value stored in the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(StringValue),
    Set(HashSet<Bytes>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Str(_) => ValueType::String,
            Value::Set(_) => ValueType::Set,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::Str(s) => s.encoding(),
            Value::Set(_) => Encoding::Hashtable,
        }
    }

    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut StringValue> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<StringValue> for Value {
    fn from(value: StringValue) -> Self {
        Value::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_picks_encoding() {
        assert_eq!(StringValue::from_bytes("42"), StringValue::Int(42));
        assert_eq!(StringValue::from_bytes("-7").encoding(), Encoding::Int);
        assert_eq!(StringValue::from_bytes("007").encoding(), Encoding::Raw);
        assert_eq!(StringValue::from_bytes("hello").encoding(), Encoding::Raw);
        assert_eq!(StringValue::raw("42").encoding(), Encoding::Raw);
    }

    #[test]
    fn test_decoded_view() {
        let int = StringValue::Int(-120);
        assert_eq!(&*int.decoded(), b"-120");
        assert_eq!(int.len(), 4);

        let raw = StringValue::from_bytes(b"\xff\x00");
        assert_eq!(&*raw.decoded(), b"\xff\x00");
        assert_eq!(raw.to_bytes(), Bytes::from_static(b"\xff\x00"));
    }

    #[test]
    fn test_as_int_mut_upgrades_raw() {
        let mut value = StringValue::raw("15");
        *value.as_int_mut().unwrap() += 1;
        assert_eq!(value, StringValue::Int(16));

        let mut text = StringValue::raw("notanint");
        assert!(text.as_int_mut().is_none());
        assert_eq!(text.encoding(), Encoding::Raw);
    }

    #[test]
    fn test_raw_mut_decodes_int() {
        let mut value = StringValue::Int(12);
        value.raw_mut().extend_from_slice(b"ab");
        assert_eq!(value.encoding(), Encoding::Raw);
        assert_eq!(&*value.decoded(), b"12ab");
    }

    #[test]
    fn test_value_type_and_encoding() {
        let s = Value::from(StringValue::Int(1));
        assert_eq!(s.value_type(), ValueType::String);
        assert_eq!(s.value_type().as_str(), "string");

        let set = Value::Set(HashSet::new());
        assert_eq!(set.value_type(), ValueType::Set);
        assert_eq!(set.encoding(), Encoding::Hashtable);
        assert!(set.as_string().is_none());
    }
}
