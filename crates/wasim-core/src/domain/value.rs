//! Typed value conversion for raw data-request buffers.
//!
//! The module sends each data-request value as an untyped byte buffer.  What
//! those bytes mean depends on two things the request declared up front:
//!
//! - its **value size**, either a byte count or one of the `DATA_TYPE_*`
//!   codes, and
//! - its **result kind**: `Double`, `Integer`, `String` or `Formatted` for
//!   calculator code, numeric for named variables.
//!
//! [`ValueStorage::resolve`] combines the two into the concrete storage type,
//! and [`try_convert`] reinterprets a buffer as a caller-chosen Rust type.
//! A numeric value converts only to the same type or to a type that holds it
//! without loss, following the standard library's `From` impls (an `i16`
//! widens to `i32`, `i64`, `f32` and `f64`; an `f64` converts only to `f64`).
//! Text converts only to `String`.  Anything else yields `None`, so callers
//! can probe candidate types in order.

use crate::protocol::messages::{
    CalcResultType, DATA_TYPE_DOUBLE, DATA_TYPE_FLOAT, DATA_TYPE_INT16, DATA_TYPE_INT32,
    DATA_TYPE_INT64, DATA_TYPE_INT8,
};

/// Concrete layout of a value buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueStorage {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// NUL-terminated text in a buffer of the given size.
    Text(usize),
}

impl ValueStorage {
    /// Determines the storage for a declared `value_size` and result `kind`.
    ///
    /// Returns `None` when the size cannot hold a value of that kind.
    pub fn resolve(value_size: u32, kind: CalcResultType) -> Option<ValueStorage> {
        let text = matches!(kind, CalcResultType::String | CalcResultType::Formatted);
        let predefined = match value_size {
            DATA_TYPE_INT8 => Some(ValueStorage::I8),
            DATA_TYPE_INT16 => Some(ValueStorage::I16),
            DATA_TYPE_INT32 => Some(ValueStorage::I32),
            DATA_TYPE_INT64 => Some(ValueStorage::I64),
            DATA_TYPE_FLOAT => Some(ValueStorage::F32),
            DATA_TYPE_DOUBLE => Some(ValueStorage::F64),
            _ => None,
        };
        if let Some(storage) = predefined {
            return (!text).then_some(storage);
        }

        match (kind, value_size) {
            (_, 0) => None,
            (CalcResultType::String | CalcResultType::Formatted, n) => Some(ValueStorage::Text(n as usize)),
            (CalcResultType::Integer, 1) => Some(ValueStorage::I8),
            (CalcResultType::Integer, 2) => Some(ValueStorage::I16),
            (CalcResultType::Integer, 4) => Some(ValueStorage::I32),
            (CalcResultType::Integer, 8) => Some(ValueStorage::I64),
            (CalcResultType::Double, 1) => Some(ValueStorage::I8),
            (CalcResultType::Double, 2) => Some(ValueStorage::I16),
            (CalcResultType::Double, 4) => Some(ValueStorage::F32),
            (CalcResultType::Double, 8) => Some(ValueStorage::F64),
            _ => None,
        }
    }

    /// Number of bytes the value occupies.
    pub fn size(self) -> usize {
        match self {
            ValueStorage::I8 => 1,
            ValueStorage::I16 => 2,
            ValueStorage::I32 | ValueStorage::F32 => 4,
            ValueStorage::I64 | ValueStorage::F64 => 8,
            ValueStorage::Text(n) => n,
        }
    }

    /// Returns `true` for integer storage.
    pub fn is_integer(self) -> bool {
        matches!(self, ValueStorage::I8 | ValueStorage::I16 | ValueStorage::I32 | ValueStorage::I64)
    }

    /// Returns `true` for text storage.
    pub fn is_text(self) -> bool {
        matches!(self, ValueStorage::Text(_))
    }
}

/// A decoded numeric value in its storage type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// Decodes a little-endian scalar of `storage` from the front of `bytes`.
    pub fn decode(bytes: &[u8], storage: ValueStorage) -> Option<Scalar> {
        let value = match storage {
            ValueStorage::I8 => Scalar::I8(i8::from_le_bytes(bytes.get(..1)?.try_into().ok()?)),
            ValueStorage::I16 => Scalar::I16(i16::from_le_bytes(bytes.get(..2)?.try_into().ok()?)),
            ValueStorage::I32 => Scalar::I32(i32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            ValueStorage::I64 => Scalar::I64(i64::from_le_bytes(bytes.get(..8)?.try_into().ok()?)),
            ValueStorage::F32 => Scalar::F32(f32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            ValueStorage::F64 => Scalar::F64(f64::from_le_bytes(bytes.get(..8)?.try_into().ok()?)),
            ValueStorage::Text(_) => return None,
        };
        Some(value)
    }

    /// The value as `f64`, for comparisons.  May round 64-bit integers.
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::I8(v) => f64::from(v),
            Scalar::I16(v) => f64::from(v),
            Scalar::I32(v) => f64::from(v),
            Scalar::I64(v) => v as f64,
            Scalar::F32(v) => f64::from(v),
            Scalar::F64(v) => v,
        }
    }
}

/// Types a value buffer can be converted into.
pub trait FromValue: Sized {
    /// Converts a numeric value, or returns `None` if it does not fit losslessly.
    fn from_scalar(value: Scalar) -> Option<Self>;

    /// Converts a text value.  Only `String` accepts text.
    fn from_text(_text: &str) -> Option<Self> {
        None
    }
}

macro_rules! impl_from_value {
    ($target:ty: $($variant:ident),+) => {
        impl FromValue for $target {
            fn from_scalar(value: Scalar) -> Option<Self> {
                match value {
                    $(Scalar::$variant(v) => Some(<$target>::from(v)),)+
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(i8: I8);
impl_from_value!(i16: I8, I16);
impl_from_value!(i32: I8, I16, I32);
impl_from_value!(i64: I8, I16, I32, I64);
impl_from_value!(f32: I8, I16, F32);
impl_from_value!(f64: I8, I16, I32, F32, F64);

impl FromValue for String {
    fn from_scalar(_value: Scalar) -> Option<Self> {
        None
    }

    fn from_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

/// Returns the text in `bytes`, cut at the first NUL within `size` bytes.
pub fn text_value(bytes: &[u8], size: usize) -> String {
    let field = &bytes[..size.min(bytes.len())];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Reinterprets `bytes` as `T` given the buffer's `storage`.
///
/// Returns `None` if the buffer is shorter than the storage size or `T` is
/// not a compatible target.  Never panics.
///
/// # Examples
///
/// ```rust
/// use wasim_core::domain::value::{try_convert, ValueStorage};
///
/// let bytes = 1500i32.to_le_bytes();
/// assert_eq!(try_convert::<i64>(&bytes, ValueStorage::I32), Some(1500));
/// assert_eq!(try_convert::<f64>(&bytes, ValueStorage::I32), Some(1500.0));
/// assert_eq!(try_convert::<i16>(&bytes, ValueStorage::I32), None);
/// assert_eq!(try_convert::<String>(&bytes, ValueStorage::I32), None);
/// ```
pub fn try_convert<T: FromValue>(bytes: &[u8], storage: ValueStorage) -> Option<T> {
    if bytes.len() < storage.size() {
        return None;
    }
    match storage {
        ValueStorage::Text(size) => T::from_text(&text_value(bytes, size)),
        _ => T::from_scalar(Scalar::decode(bytes, storage)?),
    }
}
