//! Owned XML-RPC value model shared by the transport and processing layers

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::RpcError;

/// A single XML-RPC value as sent to or received from the daemon.
///
/// Covers the standard scalar types plus the `i8` (64-bit integer)
/// extension rTorrent uses for sizes and rates. Timestamps appear both
/// as `Int` microsecond counts (post-processed by descriptors) and as
/// native `dateTime.iso8601` values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// Consumes the value and returns the element list, if this is an array.
    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Consumes the value expecting a string.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the value is not a string
    pub fn try_into_string(self) -> Result<String, RpcError> {
        match self {
            Value::String(value) => Ok(value),
            other => Err(RpcError::UnexpectedValue {
                message: format!("expected a string, got {} value", other.type_name()),
            }),
        }
    }

    /// Consumes the value expecting an integer.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the value is not an integer
    pub fn try_into_i64(self) -> Result<i64, RpcError> {
        self.as_i64().ok_or_else(|| RpcError::UnexpectedValue {
            message: format!("expected an integer, got {} value", self.type_name()),
        })
    }

    /// Consumes the value expecting a boolean.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the value is not a boolean
    pub fn try_into_bool(self) -> Result<bool, RpcError> {
        self.as_bool().ok_or_else(|| RpcError::UnexpectedValue {
            message: format!("expected a boolean, got {} value", self.type_name()),
        })
    }

    /// Consumes the value expecting a timestamp.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the value is not a timestamp
    pub fn try_into_datetime(self) -> Result<DateTime<Utc>, RpcError> {
        self.as_datetime().ok_or_else(|| RpcError::UnexpectedValue {
            message: format!("expected a timestamp, got {} value", self.type_name()),
        })
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "base64",
            Value::DateTime(_) => "dateTime",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value}"),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::DateTime(value) => write!(f, "{value}"),
            Value::Array(values) => write!(f, "<array of {}>", values.len()),
            Value::Struct(members) => write!(f, "<struct of {}>", members.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn test_accessors_match_variants() {
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::String("x".to_string()).as_i64(), None);
        assert_eq!(Value::from("name").as_str(), Some("name"));
        assert_eq!(Value::from(true).as_bool(), Some(true));

        let array = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(array.as_array().map(<[Value]>::len), Some(2));
        assert_eq!(array.into_array().unwrap().len(), 2);
    }

    #[test]
    fn test_type_name_for_errors() {
        assert_eq!(Value::Int(0).type_name(), "int");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
        assert_eq!(Value::Bytes(vec![]).type_name(), "base64");
    }
}
