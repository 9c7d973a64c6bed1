//! Engine primitives and the coercions between them and Rust field types.
//!
//! Every bound value is reduced to one of SQLite's storage classes
//! ([`Value`]); every fetched cell is read back as a [`Value`] and converted
//! into the target field through [`FromValue`]. Date/time values use a single
//! encoding in both directions: RFC 3339 text.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A SQLite value as bound to or read from a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Type tag for columns and bound properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    DateTime,
}

impl ValueType {
    /// Classifies a SQLite type name as reported by SQLx.
    ///
    /// Follows SQLite's affinity rules for declared types it does not name
    /// exactly (`VARCHAR(20)` is text, `BIGINT` is integer).
    pub fn from_sqlite(name: &str) -> Option<ValueType> {
        let upper = name.to_ascii_uppercase();
        let ty = match upper.as_str() {
            "" => return None,
            "NULL" => ValueType::Null,
            "BOOLEAN" | "BOOL" => ValueType::Boolean,
            "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" => ValueType::DateTime,
            s if s.contains("INT") => ValueType::Integer,
            s if s.contains("CHAR") || s.contains("CLOB") || s.contains("TEXT") => ValueType::Text,
            s if s.contains("BLOB") => ValueType::Blob,
            s if s.contains("REAL") || s.contains("FLOA") || s.contains("DOUB") => ValueType::Real,
            _ => ValueType::Real,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::Text => "text",
            ValueType::Blob => "blob",
            ValueType::Boolean => "boolean",
            ValueType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a value could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("unexpected NULL for non-optional {0} value")]
    UnexpectedNull(ValueType),

    #[error("cannot convert {found} to {expected}")]
    Mismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("invalid {expected} text '{text}'")]
    InvalidText { expected: ValueType, text: String },

    #[error("date/time encoding failed: {0}")]
    DateTime(String),
}

/// Converts a Rust value into an engine primitive for binding.
pub trait ToValue {
    fn to_value(&self) -> Result<Value, ConversionError>;
}

/// Converts a fetched engine primitive into a Rust value.
pub trait FromValue: Sized {
    /// Type tag recorded in binding tables.
    fn value_type() -> ValueType;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch(expected: ValueType, found: &Value) -> ConversionError {
    match found {
        Value::Null => ConversionError::UnexpectedNull(expected),
        other => ConversionError::Mismatch {
            expected,
            found: other.value_type(),
        },
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(self.clone())
    }
}

fn to_i64(value: Value) -> Result<i64, ConversionError> {
    match value {
        Value::Integer(i) => Ok(i),
        Value::Real(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        Value::Real(f) => Err(ConversionError::OutOfRange {
            value: f.to_string(),
            target: "i64",
        }),
        Value::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| ConversionError::InvalidText {
                expected: ValueType::Integer,
                text,
            }),
        other => Err(mismatch(ValueType::Integer, &other)),
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Integer(*self))
    }
}

impl FromValue for i64 {
    fn value_type() -> ValueType {
        ValueType::Integer
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        to_i64(value)
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Result<Value, ConversionError> {
                    i64::try_from(*self)
                        .map(Value::Integer)
                        .map_err(|_| ConversionError::OutOfRange {
                            value: self.to_string(),
                            target: "i64",
                        })
                }
            }

            impl FromValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::Integer
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    let wide = to_i64(value)?;
                    <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                        value: wide.to_string(),
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

integer_value!(i8, i16, i32, isize, u8, u16, u32, u64, usize);

impl ToValue for bool {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Integer(i64::from(*self)))
    }
}

impl FromValue for bool {
    fn value_type() -> ValueType {
        ValueType::Boolean
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            Value::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ConversionError::InvalidText {
                    expected: ValueType::Boolean,
                    text,
                }),
            },
            other => Err(mismatch(ValueType::Boolean, &other)),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Real(*self))
    }
}

impl FromValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Real
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            Value::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ConversionError::InvalidText {
                    expected: ValueType::Real,
                    text,
                }),
            other => Err(mismatch(ValueType::Real, &other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Real(f64::from(*self)))
    }
}

impl FromValue for f32 {
    fn value_type() -> ValueType {
        ValueType::Real
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Text(self.clone()))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Text(self.to_owned()))
    }
}

impl FromValue for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(text) => Ok(text),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Real(f) => Ok(f.to_string()),
            Value::Blob(bytes) => String::from_utf8(bytes).map_err(|_| ConversionError::Mismatch {
                expected: ValueType::Text,
                found: ValueType::Blob,
            }),
            Value::Null => Err(ConversionError::UnexpectedNull(ValueType::Text)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Blob(self.clone()))
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Blob(self.to_vec()))
    }
}

impl FromValue for Vec<u8> {
    fn value_type() -> ValueType {
        ValueType::Blob
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(bytes) => Ok(bytes),
            Value::Text(text) => Ok(text.into_bytes()),
            other => Err(mismatch(ValueType::Blob, &other)),
        }
    }
}

impl ToValue for OffsetDateTime {
    fn to_value(&self) -> Result<Value, ConversionError> {
        self.format(&Rfc3339)
            .map(Value::Text)
            .map_err(|e| ConversionError::DateTime(e.to_string()))
    }
}

impl FromValue for OffsetDateTime {
    fn value_type() -> ValueType {
        ValueType::DateTime
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(text) => OffsetDateTime::parse(&text, &Rfc3339).map_err(|_| {
                ConversionError::InvalidText {
                    expected: ValueType::DateTime,
                    text,
                }
            }),
            Value::Integer(seconds) => OffsetDateTime::from_unix_timestamp(seconds)
                .map_err(|e| ConversionError::DateTime(e.to_string())),
            other => Err(mismatch(ValueType::DateTime, &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Result<Value, ConversionError> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Result<Value, ConversionError> {
        (**self).to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_integer_coercions() {
        assert_eq!(i64::from_value(Value::Integer(42)).unwrap(), 42);
        assert_eq!(i64::from_value(Value::Real(7.0)).unwrap(), 7);
        assert_eq!(i64::from_value(Value::Text(" 15 ".into())).unwrap(), 15);
        assert!(i64::from_value(Value::Real(7.5)).is_err());
        assert_eq!(
            i64::from_value(Value::Null),
            Err(ConversionError::UnexpectedNull(ValueType::Integer))
        );
    }

    #[test]
    fn test_narrowing_is_range_checked() {
        assert_eq!(i32::from_value(Value::Integer(-5)).unwrap(), -5);
        assert!(matches!(
            u8::from_value(Value::Integer(300)),
            Err(ConversionError::OutOfRange { target: "u8", .. })
        ));
        assert!(u64::MAX.to_value().is_err());
    }

    #[test]
    fn test_text_and_blob() {
        assert_eq!(String::from_value(Value::Integer(3)).unwrap(), "3");
        assert_eq!(
            Vec::<u8>::from_value(Value::Blob(vec![1, 2])).unwrap(),
            vec![1, 2]
        );
        assert_eq!("hi".to_value().unwrap(), Value::Text("hi".into()));
        assert!(matches!(
            String::from_value(Value::Blob(vec![0xff, 0xfe])),
            Err(ConversionError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_bool() {
        assert_eq!(true.to_value().unwrap(), Value::Integer(1));
        assert!(!bool::from_value(Value::Integer(0)).unwrap());
        assert!(bool::from_value(Value::Text("TRUE".into())).unwrap());
    }

    #[test]
    fn test_datetime_uses_rfc3339_text() {
        let when = datetime!(1990-05-17 08:30:00 UTC);
        let encoded = when.to_value().unwrap();
        assert_eq!(encoded, Value::Text("1990-05-17T08:30:00Z".into()));
        assert_eq!(OffsetDateTime::from_value(encoded).unwrap(), when);
        assert_eq!(
            OffsetDateTime::from_value(Value::Integer(0)).unwrap(),
            OffsetDateTime::UNIX_EPOCH
        );
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(None::<String>.to_value().unwrap(), Value::Null);
        assert_eq!(Option::<i32>::value_type(), ValueType::Integer);
    }

    #[test]
    fn test_value_type_from_sqlite_names() {
        assert_eq!(ValueType::from_sqlite("INTEGER"), Some(ValueType::Integer));
        assert_eq!(ValueType::from_sqlite("varchar(20)"), Some(ValueType::Text));
        assert_eq!(ValueType::from_sqlite("DATETIME"), Some(ValueType::DateTime));
        assert_eq!(ValueType::from_sqlite("BOOLEAN"), Some(ValueType::Boolean));
        assert_eq!(ValueType::from_sqlite("NULL"), Some(ValueType::Null));
        assert_eq!(ValueType::from_sqlite(""), None);
    }
}
