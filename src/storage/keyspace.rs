//! The keyspace port consumed by command implementations.
//!
//! Commands never touch the shard maps directly. They receive a
//! `&mut dyn KeyspaceService` scoped to the keys they declared, which keeps
//! them testable against any store and lets the engine decide how exclusion
//! is acquired.

use crate::args;
use crate::storage::value::{StringValue, Value, ValueType};
use bytes::Bytes;
use thiserror::Error;

/// Failures reported by keyspace operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceError {
    #[error("key does not exist")]
    NotExist,

    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotInteger,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("value is not a valid float")]
    NotFloat,
}

/// Operations a command may perform against the keys it holds.
///
/// Every lookup applies lazy expiry: an expired key is reclaimed on access and
/// reported as absent.
pub trait KeyspaceService {
    /// Looks up a live value of any type.
    fn get_value(&mut self, key: &[u8]) -> Option<&mut Value>;

    /// Stores `value` under `key`. A live expiry on an existing key is kept;
    /// callers with SET semantics clear it explicitly.
    fn set_value(&mut self, key: Bytes, value: Value) -> &mut Value;

    /// Removes the expiry of a live key. Returns `true` if one was set.
    fn clear_expire(&mut self, key: &[u8]) -> bool;

    /// Sets an absolute expiry in unix milliseconds. Returns `false` if the
    /// key does not exist.
    fn set_expire(&mut self, key: &[u8], at_ms: u64) -> bool;

    /// Returns the absolute expiry of a live key, if any.
    fn get_expire(&mut self, key: &[u8]) -> Result<Option<u64>, KeyspaceError>;

    /// Removes a key. Returns `true` if a live key was removed.
    fn delete(&mut self, key: &[u8]) -> bool;

    /// Looks up a value that must be of type `ty`.
    fn get_value_by_type(
        &mut self,
        key: &[u8],
        ty: ValueType,
    ) -> Result<Option<&mut Value>, KeyspaceError> {
        match self.get_value(key) {
            Some(value) if value.value_type() != ty => Err(KeyspaceError::WrongType),
            other => Ok(other),
        }
    }

    /// Looks up a string value.
    fn get_string(&mut self, key: &[u8]) -> Result<Option<&mut StringValue>, KeyspaceError> {
        Ok(self
            .get_value_by_type(key, ValueType::String)?
            .and_then(Value::as_string_mut))
    }

    /// Adds `delta` to an integer value in place and returns the result.
    ///
    /// The existing expiry is kept. `NotExist` is returned for absent keys so
    /// the caller decides how the key is created.
    fn incrby(&mut self, key: &[u8], delta: i64) -> Result<i64, KeyspaceError> {
        let value = self.get_string(key)?.ok_or(KeyspaceError::NotExist)?;
        let n = value.as_int_mut().ok_or(KeyspaceError::NotInteger)?;
        *n = n.checked_add(delta).ok_or(KeyspaceError::Overflow)?;
        Ok(*n)
    }

    fn decrby(&mut self, key: &[u8], delta: i64) -> Result<i64, KeyspaceError> {
        let value = self.get_string(key)?.ok_or(KeyspaceError::NotExist)?;
        let n = value.as_int_mut().ok_or(KeyspaceError::NotInteger)?;
        *n = n.checked_sub(delta).ok_or(KeyspaceError::Overflow)?;
        Ok(*n)
    }

    /// Adds the textual float `delta` to a value and returns the new text.
    ///
    /// The result is stored raw-encoded with the expiry kept.
    fn incrbyfloat(&mut self, key: &[u8], delta: &[u8]) -> Result<Bytes, KeyspaceError> {
        let incr = args::parse_long_double(delta).ok_or(KeyspaceError::NotFloat)?;
        let value = self.get_string(key)?.ok_or(KeyspaceError::NotExist)?;
        let current = args::parse_long_double(&value.decoded()).ok_or(KeyspaceError::NotFloat)?;

        let result = current + incr;
        if !result.is_finite() {
            return Err(KeyspaceError::NotFloat);
        }

        let text = args::format_float(result);
        *value = StringValue::raw(&text);
        Ok(Bytes::from(text))
    }
}
