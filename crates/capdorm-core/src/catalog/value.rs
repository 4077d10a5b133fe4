//! Runtime column values and scalar conversions.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;

/// A single column value, matching the SQLite storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating point.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary data.
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the storage class, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(
                String::from_utf8(v.to_vec()).map_err(|e| FromSqlError::Other(Box::new(e)))?,
            ),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        })
    }
}

/// Failure converting between a [`Value`] and a record field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The stored value has a different storage class.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Storage class the field accepts.
        expected: &'static str,
        /// Storage class that was supplied.
        found: &'static str,
    },

    /// An integer does not fit the field's type.
    #[error("integer {value} out of range for {target}")]
    OutOfRange {
        /// The stored integer.
        value: i64,
        /// Rust type of the field.
        target: &'static str,
    },

    /// The field path does not name a column of the record.
    #[error("unknown field path")]
    UnknownField,
}

/// Conversion between a Rust scalar and a column [`Value`].
///
/// Implemented for the scalar types a record field may hold. A record field
/// whose type does not implement it is rejected by `#[derive(Record)]`.
pub trait FieldValue: Sized {
    /// Encode the field for storage.
    fn to_value(&self) -> Value;

    /// Decode the field from storage.
    fn from_value(value: Value) -> Result<Self, FieldError>;
}

fn mismatch(expected: &'static str, value: &Value) -> FieldError {
    FieldError::TypeMismatch {
        expected,
        found: value.kind(),
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, FieldError> {
                    match value {
                        Value::Integer(v) => <$ty>::try_from(v).map_err(|_| FieldError::OutOfRange {
                            value: v,
                            target: stringify!($ty),
                        }),
                        other => Err(mismatch("integer", &other)),
                    }
                }
            }
        )*
    };
}

integer_field_value!(i8, i16, i32, u8, u16, u32);

impl FieldValue for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Real(v) => Ok(v),
            // SQLite stores integral reals in REAL columns as integers when asked.
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl FieldValue for f32 {
    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FieldValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(mismatch("blob", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
