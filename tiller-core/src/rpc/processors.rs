//! Stateless value transforms applied around the wire boundary
//!
//! Descriptors reference these as declarative [`PreProcessor`] and
//! [`PostProcessor`] entries rather than boxed closures, so registry
//! tables stay inspectable and the transforms stay trivially testable.

use chrono::{DateTime, Utc};

use super::value::Value;
use super::RpcError;

/// Converts a boolean to the daemon's string sentinel form.
pub fn bool_to_wire(value: bool) -> Value {
    Value::String(if value { "1" } else { "0" }.to_string())
}

/// Coerces the daemon's truthy/falsy sentinels to a boolean.
///
/// # Errors
///
/// - `RpcError::UnexpectedValue` - If the value is not `1`, `"1"`, `0`, or `"0"`
pub fn wire_to_bool(value: &Value) -> Result<bool, RpcError> {
    match value {
        Value::Int(1) => Ok(true),
        Value::Int(0) => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::String(s) if s == "1" => Ok(true),
        Value::String(s) if s == "0" => Ok(false),
        other => Err(RpcError::UnexpectedValue {
            message: format!("cannot interpret {other:?} as a boolean sentinel"),
        }),
    }
}

/// Maps an enum value to its wire index within `valid`.
///
/// # Errors
///
/// - `RpcError::UnexpectedValue` - If the value is not a string in `valid`
pub fn enum_to_index(valid: &[&str], value: &Value) -> Result<i64, RpcError> {
    let name = value.as_str().ok_or_else(|| RpcError::UnexpectedValue {
        message: format!("expected one of {valid:?}, got {} value", value.type_name()),
    })?;

    valid
        .iter()
        .position(|candidate| *candidate == name)
        .map(|index| index as i64)
        .ok_or_else(|| RpcError::UnexpectedValue {
            message: format!("'{name}' is not one of {valid:?}"),
        })
}

/// Maps a wire index back to its enum value within `valid`.
///
/// # Errors
///
/// - `RpcError::UnexpectedValue` - If the index is not an integer in range
pub fn index_to_enum(valid: &[&str], value: &Value) -> Result<Value, RpcError> {
    let index = value.as_i64().ok_or_else(|| RpcError::UnexpectedValue {
        message: format!("expected an index, got {} value", value.type_name()),
    })?;

    usize::try_from(index)
        .ok()
        .and_then(|index| valid.get(index))
        .map(|name| Value::String((*name).to_string()))
        .ok_or_else(|| RpcError::UnexpectedValue {
            message: format!("index {index} out of range for {valid:?}"),
        })
}

/// Interprets an integer as microseconds since the Unix epoch, UTC.
///
/// # Errors
///
/// - `RpcError::UnexpectedValue` - If the value is not an in-range integer
pub fn micros_to_datetime(value: &Value) -> Result<DateTime<Utc>, RpcError> {
    let micros = value.as_i64().ok_or_else(|| RpcError::UnexpectedValue {
        message: format!("expected a microsecond timestamp, got {} value", value.type_name()),
    })?;

    DateTime::from_timestamp_micros(micros).ok_or_else(|| RpcError::UnexpectedValue {
        message: format!("timestamp {micros} is out of range"),
    })
}

/// True iff the daemon reported success (exit code zero).
pub fn check_success(value: &Value) -> bool {
    value.as_i64() == Some(0)
}

/// A single argument transform applied before transmission.
///
/// Pre-processors receive the full current argument vector and return a
/// replacement vector, so a single entry can transform, inject, or drop
/// positional slots. Slots count from the end of the vector because
/// entity identity arguments are prepended after registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreProcessor {
    /// Replace the enum value `slot_from_end` positions from the end
    /// with its index in `values`.
    EnumToIndex {
        values: &'static [&'static str],
        slot_from_end: usize,
    },
    /// Replace the boolean `slot_from_end` positions from the end with
    /// the daemon's string sentinel.
    BoolToWire { slot_from_end: usize },
}

impl PreProcessor {
    /// Applies this transform to the argument vector.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the targeted slot is missing or has the wrong shape
    pub fn apply(&self, mut args: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        let slot_from_end = match self {
            PreProcessor::EnumToIndex { slot_from_end, .. }
            | PreProcessor::BoolToWire { slot_from_end } => *slot_from_end,
        };

        let slot = args
            .len()
            .checked_sub(slot_from_end + 1)
            .ok_or_else(|| RpcError::UnexpectedValue {
                message: format!(
                    "pre-processor slot {slot_from_end} from end exceeds {} arguments",
                    args.len()
                ),
            })?;

        args[slot] = match self {
            PreProcessor::EnumToIndex { values, .. } => {
                Value::Int(enum_to_index(values, &args[slot])?)
            }
            PreProcessor::BoolToWire { .. } => {
                let flag = args[slot].as_bool().ok_or_else(|| RpcError::UnexpectedValue {
                    message: format!("expected a boolean, got {} value", args[slot].type_name()),
                })?;
                bool_to_wire(flag)
            }
        };

        Ok(args)
    }
}

/// A single result transform applied after the batched call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessor {
    /// Map a wire index to its enum value in `values`.
    IndexToEnum { values: &'static [&'static str] },
    /// Interpret the result as microseconds since the Unix epoch.
    MicrosToDatetime,
    /// Collapse the daemon's exit code to a success boolean.
    CheckSuccess,
    /// Coerce the daemon's truthy/falsy sentinels to a boolean.
    WireToBool,
}

impl PostProcessor {
    /// Applies this transform to a raw wire result.
    ///
    /// # Errors
    ///
    /// - `RpcError::UnexpectedValue` - If the result has the wrong shape for the transform
    pub fn apply(&self, value: Value) -> Result<Value, RpcError> {
        match self {
            PostProcessor::IndexToEnum { values } => index_to_enum(values, &value),
            PostProcessor::MicrosToDatetime => Ok(Value::DateTime(micros_to_datetime(&value)?)),
            PostProcessor::CheckSuccess => Ok(Value::Bool(check_success(&value))),
            PostProcessor::WireToBool => Ok(Value::Bool(wire_to_bool(&value)?)),
        }
    }
}

#[cfg(test)]
mod processor_tests {
    use chrono::NaiveDate;

    use super::*;

    const PRIORITIES: &[&str] = &["off", "low", "normal", "high"];

    #[test]
    fn test_bool_to_wire_sentinels() {
        assert_eq!(bool_to_wire(true), Value::from("1"));
        assert_eq!(bool_to_wire(false), Value::from("0"));
    }

    #[test]
    fn test_wire_to_bool_accepts_int_and_string_sentinels() {
        assert!(wire_to_bool(&Value::Int(1)).unwrap());
        assert!(wire_to_bool(&Value::from("1")).unwrap());
        assert!(!wire_to_bool(&Value::Int(0)).unwrap());
        assert!(!wire_to_bool(&Value::from("0")).unwrap());
    }

    #[test]
    fn test_wire_to_bool_rejects_other_values() {
        let result = wire_to_bool(&Value::from("yes"));
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    }

    #[test]
    fn test_enum_round_trip() {
        for (index, name) in PRIORITIES.iter().enumerate() {
            let wire = enum_to_index(PRIORITIES, &Value::from(*name)).unwrap();
            assert_eq!(wire, index as i64);
            let back = index_to_enum(PRIORITIES, &Value::Int(wire)).unwrap();
            assert_eq!(back, Value::from(*name));
        }
    }

    #[test]
    fn test_enum_to_index_rejects_unknown_value() {
        let result = enum_to_index(PRIORITIES, &Value::from("urgent"));
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    }

    #[test]
    fn test_index_to_enum_rejects_out_of_range() {
        let result = index_to_enum(PRIORITIES, &Value::Int(4));
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
        let result = index_to_enum(PRIORITIES, &Value::Int(-1));
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    }

    #[test]
    fn test_micros_to_datetime_microsecond_resolution() {
        let timestamp = micros_to_datetime(&Value::Int(1_414_776_586_757_462)).unwrap();
        let expected = NaiveDate::from_ymd_opt(2014, 10, 31)
            .unwrap()
            .and_hms_micro_opt(10, 29, 46, 757_462)
            .unwrap()
            .and_utc();
        assert_eq!(timestamp, expected);
    }

    #[test]
    fn test_check_success_zero_only() {
        assert!(check_success(&Value::Int(0)));
        assert!(!check_success(&Value::Int(-1)));
        assert!(!check_success(&Value::Int(1)));
        assert!(!check_success(&Value::from("0")));
    }

    #[test]
    fn test_pre_processor_replaces_trailing_slot() {
        let pre = PreProcessor::EnumToIndex {
            values: PRIORITIES,
            slot_from_end: 0,
        };
        let args = vec![Value::from("HASH"), Value::from("high")];
        let processed = pre.apply(args).unwrap();
        assert_eq!(processed, vec![Value::from("HASH"), Value::Int(3)]);
    }

    #[test]
    fn test_pre_processor_missing_slot_is_error() {
        let pre = PreProcessor::BoolToWire { slot_from_end: 2 };
        let result = pre.apply(vec![Value::from(true)]);
        assert!(matches!(result, Err(RpcError::UnexpectedValue { .. })));
    }
}
