//! Typed partition values plus helpers for broadcasting them into Arrow arrays.
//!
//! A partition value is the constant a file contributes for one partition
//! column, usually parsed from a `key=value` path segment. Broadcasting is
//! strict: a value only fills a column whose Arrow type it belongs to, and a
//! mismatch is reported instead of coerced.

use std::iter;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Date32Array, Decimal128Array,
    Float32Array, Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, LargeBinaryArray,
    LargeStringArray, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt8Array, UInt16Array, UInt32Array,
    UInt64Array, new_null_array,
};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{
    DataType, Date32Type, Decimal128Type, DecimalType, Float32Type, Float64Type, Int8Type,
    Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use dsbridge_result::{Error, Result};
use time::{Date, Month};

/// Path segment value Hive writes for a null partition value.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// A constant value for one partition column.
///
/// Integer and timestamp payloads are stored at their widest width; the target
/// column's Arrow type decides the final width when the value is broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    /// Unscaled decimal; the column type supplies precision and scale.
    Decimal128(i128),
    String(String),
    Binary(Vec<u8>),
    /// Days since the Unix epoch (1970-01-01).
    Date32(i32),
    /// Ticks since the Unix epoch in the column's time unit.
    Timestamp(i64),
}

macro_rules! impl_from_for_partition_value {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for PartitionValue {
                fn from(v: $t) -> Self {
                    PartitionValue::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_partition_value!(Int, i8, i16, i32, i64, u8, u16, u32);
impl_from_for_partition_value!(Float, f32, f64);
impl_from_for_partition_value!(String, String);
impl_from_for_partition_value!(Boolean, bool);
impl_from_for_partition_value!(Binary, Vec<u8>);

impl From<&str> for PartitionValue {
    fn from(v: &str) -> Self {
        PartitionValue::String(v.to_string())
    }
}

impl<T> From<Option<T>> for PartitionValue
where
    T: Into<PartitionValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PartitionValue::Null)
    }
}

/// Broadcast a native integer into a primitive array, rejecting values that do
/// not fit the target width.
macro_rules! int_array {
    ($array:ty, $native:ty, $value:expr, $len:expr, $data_type:expr) => {{
        let native = <$native>::try_from($value).map_err(|_| {
            Error::PartitionValueMismatch(format!(
                "integer {} out of range for {:?}",
                $value, $data_type
            ))
        })?;
        Arc::new(<$array>::from_value(native, $len)) as ArrayRef
    }};
}

impl PartitionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PartitionValue::Null => "null",
            PartitionValue::Boolean(_) => "boolean",
            PartitionValue::Int(_) => "integer",
            PartitionValue::Float(_) => "float",
            PartitionValue::Decimal128(_) => "decimal",
            PartitionValue::String(_) => "string",
            PartitionValue::Binary(_) => "binary",
            PartitionValue::Date32(_) => "date",
            PartitionValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PartitionValue::Null)
    }

    /// Human-friendly rendering used in log output.
    pub fn format_display(&self) -> String {
        match self {
            PartitionValue::Null => "NULL".to_string(),
            PartitionValue::Boolean(b) => b.to_string(),
            PartitionValue::Int(i) => i.to_string(),
            PartitionValue::Float(f) => f.to_string(),
            PartitionValue::Decimal128(d) => format!("{d} (unscaled)"),
            PartitionValue::String(s) => format!("\"{}\"", escape_string(s)),
            PartitionValue::Binary(b) => format!("<{} bytes>", b.len()),
            PartitionValue::Date32(days) => format!("DATE '{}'", format_date32(*days)),
            PartitionValue::Timestamp(t) => format!("TIMESTAMP {t}"),
        }
    }

    /// Build an array of `len` copies of this value typed as `data_type`.
    ///
    /// `Null` fills any type. Every other variant only fills the Arrow types of
    /// its own family; anything else is [`Error::PartitionValueMismatch`].
    pub fn to_array(&self, data_type: &DataType, len: usize) -> Result<ArrayRef> {
        let array: ArrayRef = match (self, data_type) {
            (PartitionValue::Null, dt) => new_null_array(dt, len),
            (PartitionValue::Boolean(b), DataType::Boolean) => {
                Arc::new(BooleanArray::from(vec![*b; len]))
            }
            (PartitionValue::Int(v), DataType::Int8) => {
                int_array!(Int8Array, i8, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::Int16) => {
                int_array!(Int16Array, i16, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::Int32) => {
                int_array!(Int32Array, i32, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::Int64) => Arc::new(Int64Array::from_value(*v, len)),
            (PartitionValue::Int(v), DataType::UInt8) => {
                int_array!(UInt8Array, u8, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::UInt16) => {
                int_array!(UInt16Array, u16, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::UInt32) => {
                int_array!(UInt32Array, u32, *v, len, data_type)
            }
            (PartitionValue::Int(v), DataType::UInt64) => {
                int_array!(UInt64Array, u64, *v, len, data_type)
            }
            (PartitionValue::Float(v), DataType::Float32) => {
                let narrowed = *v as f32;
                if v.is_finite() && !narrowed.is_finite() {
                    return Err(Error::PartitionValueMismatch(format!(
                        "float {v} out of range for Float32"
                    )));
                }
                Arc::new(Float32Array::from_value(narrowed, len))
            }
            (PartitionValue::Float(v), DataType::Float64) => {
                Arc::new(Float64Array::from_value(*v, len))
            }
            (PartitionValue::Decimal128(v), DataType::Decimal128(precision, scale)) => {
                Decimal128Type::validate_decimal_precision(*v, *precision).map_err(|err| {
                    Error::PartitionValueMismatch(format!(
                        "decimal {v} does not fit {data_type:?}: {err}"
                    ))
                })?;
                Arc::new(
                    Decimal128Array::from_value(*v, len)
                        .with_precision_and_scale(*precision, *scale)?,
                )
            }
            (PartitionValue::String(s), DataType::Utf8) => {
                Arc::new(StringArray::from_iter_values(iter::repeat_n(s.as_str(), len)))
            }
            (PartitionValue::String(s), DataType::LargeUtf8) => Arc::new(
                LargeStringArray::from_iter_values(iter::repeat_n(s.as_str(), len)),
            ),
            (PartitionValue::Binary(b), DataType::Binary) => {
                Arc::new(BinaryArray::from_iter_values(iter::repeat_n(b.as_slice(), len)))
            }
            (PartitionValue::Binary(b), DataType::LargeBinary) => Arc::new(
                LargeBinaryArray::from_iter_values(iter::repeat_n(b.as_slice(), len)),
            ),
            (PartitionValue::Date32(days), DataType::Date32) => {
                Arc::new(Date32Array::from_value(*days, len))
            }
            (PartitionValue::Timestamp(t), DataType::Timestamp(unit, tz)) => match unit {
                TimeUnit::Second => Arc::new(
                    TimestampSecondArray::from_value(*t, len).with_timezone_opt(tz.clone()),
                ),
                TimeUnit::Millisecond => Arc::new(
                    TimestampMillisecondArray::from_value(*t, len).with_timezone_opt(tz.clone()),
                ),
                TimeUnit::Microsecond => Arc::new(
                    TimestampMicrosecondArray::from_value(*t, len).with_timezone_opt(tz.clone()),
                ),
                TimeUnit::Nanosecond => Arc::new(
                    TimestampNanosecondArray::from_value(*t, len).with_timezone_opt(tz.clone()),
                ),
            },
            (value, dt) => {
                return Err(Error::PartitionValueMismatch(format!(
                    "{} value {} cannot fill a column of type {dt:?}",
                    value.type_name(),
                    value.format_display()
                )));
            }
        };
        Ok(array)
    }

    /// Read the value stored at `index` of `array`.
    pub fn from_array_ref(array: &ArrayRef, index: usize) -> Result<PartitionValue> {
        if index >= array.len() {
            return Err(Error::InvalidArgumentError(format!(
                "index {index} out of bounds for array of length {}",
                array.len()
            )));
        }
        if array.is_null(index) {
            return Ok(PartitionValue::Null);
        }

        let value = match array.data_type() {
            DataType::Boolean => PartitionValue::Boolean(array.as_boolean().value(index)),
            DataType::Int8 => {
                PartitionValue::Int(array.as_primitive::<Int8Type>().value(index).into())
            }
            DataType::Int16 => {
                PartitionValue::Int(array.as_primitive::<Int16Type>().value(index).into())
            }
            DataType::Int32 => {
                PartitionValue::Int(array.as_primitive::<Int32Type>().value(index).into())
            }
            DataType::Int64 => PartitionValue::Int(array.as_primitive::<Int64Type>().value(index)),
            DataType::UInt8 => {
                PartitionValue::Int(array.as_primitive::<UInt8Type>().value(index).into())
            }
            DataType::UInt16 => {
                PartitionValue::Int(array.as_primitive::<UInt16Type>().value(index).into())
            }
            DataType::UInt32 => {
                PartitionValue::Int(array.as_primitive::<UInt32Type>().value(index).into())
            }
            DataType::UInt64 => {
                let raw = array.as_primitive::<UInt64Type>().value(index);
                let value = i64::try_from(raw).map_err(|_| {
                    Error::PartitionValueMismatch(format!("UInt64 value {raw} exceeds i64"))
                })?;
                PartitionValue::Int(value)
            }
            DataType::Float32 => {
                PartitionValue::Float(array.as_primitive::<Float32Type>().value(index).into())
            }
            DataType::Float64 => {
                PartitionValue::Float(array.as_primitive::<Float64Type>().value(index))
            }
            DataType::Decimal128(_, _) => {
                PartitionValue::Decimal128(array.as_primitive::<Decimal128Type>().value(index))
            }
            DataType::Utf8 => PartitionValue::String(array.as_string::<i32>().value(index).into()),
            DataType::LargeUtf8 => {
                PartitionValue::String(array.as_string::<i64>().value(index).into())
            }
            DataType::Binary => {
                PartitionValue::Binary(array.as_binary::<i32>().value(index).into())
            }
            DataType::LargeBinary => {
                PartitionValue::Binary(array.as_binary::<i64>().value(index).into())
            }
            DataType::Date32 => {
                PartitionValue::Date32(array.as_primitive::<Date32Type>().value(index))
            }
            DataType::Timestamp(TimeUnit::Second, _) => {
                PartitionValue::Timestamp(array.as_primitive::<TimestampSecondType>().value(index))
            }
            DataType::Timestamp(TimeUnit::Millisecond, _) => PartitionValue::Timestamp(
                array.as_primitive::<TimestampMillisecondType>().value(index),
            ),
            DataType::Timestamp(TimeUnit::Microsecond, _) => PartitionValue::Timestamp(
                array.as_primitive::<TimestampMicrosecondType>().value(index),
            ),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => PartitionValue::Timestamp(
                array.as_primitive::<TimestampNanosecondType>().value(index),
            ),
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "unsupported partition column type: {other:?}"
                )));
            }
        };
        Ok(value)
    }

    /// Parse a raw path-segment value into a value of `data_type`.
    ///
    /// The empty string and [`HIVE_DEFAULT_PARTITION`] parse to `Null`. Strings
    /// and binaries are taken verbatim; every other type goes through a strict
    /// Arrow cast so unparsable input is an error rather than a silent null.
    pub fn parse(raw: &str, data_type: &DataType) -> Result<PartitionValue> {
        if raw.is_empty() || raw == HIVE_DEFAULT_PARTITION {
            return Ok(PartitionValue::Null);
        }

        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 => Ok(PartitionValue::String(raw.to_string())),
            DataType::Binary | DataType::LargeBinary => {
                Ok(PartitionValue::Binary(raw.as_bytes().to_vec()))
            }
            dt => {
                let source: ArrayRef = Arc::new(StringArray::from(vec![raw]));
                let options = CastOptions {
                    safe: false,
                    ..Default::default()
                };
                let cast = cast_with_options(&source, dt, &options).map_err(|err| {
                    Error::InvalidArgumentError(format!(
                        "cannot parse partition value '{raw}' as {dt:?}: {err}"
                    ))
                })?;
                PartitionValue::from_array_ref(&cast, 0)
            }
        }
    }
}

fn format_date32(days: i32) -> String {
    let julian = match epoch_julian_day().checked_add(days) {
        Some(value) => value,
        None => return days.to_string(),
    };

    match Date::from_julian_day(julian) {
        Ok(date) => {
            let (year, month, day) = date.to_calendar_date();
            format!("{:04}-{:02}-{:02}", year, month as u8, day)
        }
        Err(_) => days.to_string(),
    }
}

fn epoch_julian_day() -> i32 {
    // 1970-01-01 is always representable; the fallback is its known julian day.
    Date::from_calendar_date(1970, Month::January, 1)
        .map(Date::to_julian_day)
        .unwrap_or(2_440_588)
}

fn escape_string(value: &str) -> String {
    value.chars().flat_map(|c| c.escape_default()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_broadcasts_to_requested_length() {
        let array = PartitionValue::from("X").to_array(&DataType::Utf8, 3).unwrap();
        let strings = array.as_string::<i32>();
        assert_eq!(strings.len(), 3);
        assert!(strings.iter().all(|v| v == Some("X")));
    }

    #[test]
    fn integer_must_fit_target_width() {
        let err = PartitionValue::Int(300)
            .to_array(&DataType::Int8, 2)
            .unwrap_err();
        assert!(matches!(err, Error::PartitionValueMismatch(_)));

        let ok = PartitionValue::Int(-7).to_array(&DataType::Int16, 2).unwrap();
        assert_eq!(ok.as_primitive::<Int16Type>().values(), &[-7, -7]);
    }

    #[test]
    fn decimal_must_fit_target_precision() {
        let err = PartitionValue::Decimal128(123_456)
            .to_array(&DataType::Decimal128(3, 0), 2)
            .unwrap_err();
        assert!(matches!(err, Error::PartitionValueMismatch(_)));

        let dt = DataType::Decimal128(5, 2);
        let ok = PartitionValue::Decimal128(-12_345).to_array(&dt, 2).unwrap();
        assert_eq!(ok.data_type(), &dt);
        assert_eq!(ok.as_primitive::<Decimal128Type>().values(), &[-12_345, -12_345]);
    }

    #[test]
    fn family_mismatch_fails_fast() {
        let err = PartitionValue::Int(1)
            .to_array(&DataType::Utf8, 1)
            .unwrap_err();
        assert!(matches!(err, Error::PartitionValueMismatch(msg) if msg.contains("integer")));

        let err = PartitionValue::from("1")
            .to_array(&DataType::Int32, 1)
            .unwrap_err();
        assert!(matches!(err, Error::PartitionValueMismatch(_)));
    }

    #[test]
    fn null_fills_any_type() {
        let array = PartitionValue::Null
            .to_array(&DataType::Date32, 4)
            .unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(array.null_count(), 4);
    }

    #[test]
    fn timestamp_keeps_timezone() {
        let dt = DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()));
        let array = PartitionValue::Timestamp(1_000).to_array(&dt, 2).unwrap();
        assert_eq!(array.data_type(), &dt);
    }

    #[test]
    fn parse_hive_default_as_null() {
        assert_eq!(
            PartitionValue::parse(HIVE_DEFAULT_PARTITION, &DataType::Int32).unwrap(),
            PartitionValue::Null
        );
        assert_eq!(
            PartitionValue::parse("", &DataType::Utf8).unwrap(),
            PartitionValue::Null
        );
    }

    #[test]
    fn parse_typed_values() {
        assert_eq!(
            PartitionValue::parse("42", &DataType::Int32).unwrap(),
            PartitionValue::Int(42)
        );
        assert_eq!(
            PartitionValue::parse("true", &DataType::Boolean).unwrap(),
            PartitionValue::Boolean(true)
        );
        assert_eq!(
            PartitionValue::parse("1970-01-02", &DataType::Date32).unwrap(),
            PartitionValue::Date32(1)
        );
        assert_eq!(
            PartitionValue::parse("us-west", &DataType::Utf8).unwrap(),
            PartitionValue::from("us-west")
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = PartitionValue::parse("abc", &DataType::Int64).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }

    #[test]
    fn display_formats_dates() {
        assert_eq!(
            PartitionValue::Date32(19_723).format_display(),
            "DATE '2024-01-01'"
        );
        assert_eq!(PartitionValue::from("a\"b").format_display(), "\"a\\\"b\"");
    }
}
