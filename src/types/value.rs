//! The tagged variant that carries a single value across the dynamic pipeline
//! boundary, plus the conversions between it and the monomorphized element types.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::CodecError;
use crate::types::{Decimal, ElementKind};

/// One value of any supported element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ElementKind {
        match self {
            Value::Int8(_) => ElementKind::Int8,
            Value::Int16(_) => ElementKind::Int16,
            Value::Int32(_) => ElementKind::Int32,
            Value::Int64(_) => ElementKind::Int64,
            Value::UInt8(_) => ElementKind::UInt8,
            Value::UInt16(_) => ElementKind::UInt16,
            Value::UInt32(_) => ElementKind::UInt32,
            Value::UInt64(_) => ElementKind::UInt64,
            Value::Float32(_) => ElementKind::Float32,
            Value::Float64(_) => ElementKind::Float64,
            Value::Boolean(_) => ElementKind::Boolean,
            Value::Decimal(_) => ElementKind::Decimal,
            Value::Date(_) => ElementKind::Date,
            Value::DateTime(_) => ElementKind::DateTime,
            Value::String(_) => ElementKind::String,
            Value::Bytes(_) => ElementKind::Bytes,
        }
    }
}

/// A monomorphized element type that has a `Value` variant.
pub trait ValueType: Sized + Send + 'static {
    const KIND: ElementKind;

    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

macro_rules! impl_value_type {
    ($T:ty, $variant:ident) => {
        impl ValueType for $T {
            const KIND: ElementKind = ElementKind::$variant;

            #[inline]
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            #[inline]
            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(CodecError::TypeMismatch {
                        expected: ElementKind::$variant,
                        actual: other.kind(),
                    }),
                }
            }
        }

        impl From<$T> for Value {
            fn from(v: $T) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_value_type!(i8, Int8);
impl_value_type!(i16, Int16);
impl_value_type!(i32, Int32);
impl_value_type!(i64, Int64);
impl_value_type!(u8, UInt8);
impl_value_type!(u16, UInt16);
impl_value_type!(u32, UInt32);
impl_value_type!(u64, UInt64);
impl_value_type!(f32, Float32);
impl_value_type!(f64, Float64);
impl_value_type!(bool, Boolean);
impl_value_type!(Decimal, Decimal);
impl_value_type!(NaiveDate, Date);
impl_value_type!(NaiveDateTime, DateTime);
impl_value_type!(String, String);
impl_value_type!(Vec<u8>, Bytes);
