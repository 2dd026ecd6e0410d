use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Int32Type};
use dsbridge_result::Error;
use dsbridge_types::{PartitionValue, eq_ignore_case, fold_case};

#[test]
fn parsed_values_broadcast_into_their_declared_type() {
    let cases = [
        ("7", DataType::Int32),
        ("2024-03-05", DataType::Date32),
        ("false", DataType::Boolean),
        ("1.25", DataType::Float64),
        ("12.50", DataType::Decimal128(10, 2)),
        ("eu", DataType::Utf8),
    ];

    for (raw, data_type) in cases {
        let value = PartitionValue::parse(raw, &data_type).expect("parse");
        let array = value.to_array(&data_type, 5).expect("broadcast");
        assert_eq!(array.len(), 5, "{raw} as {data_type:?}");
        assert_eq!(array.data_type(), &data_type);
        assert_eq!(array.null_count(), 0);
        for row in 0..5 {
            assert_eq!(PartitionValue::from_array_ref(&array, row).unwrap(), value);
        }
    }
}

#[test]
fn decimal_value_keeps_unscaled_representation() {
    let value = PartitionValue::parse("12.50", &DataType::Decimal128(10, 2)).unwrap();
    assert_eq!(value, PartitionValue::Decimal128(1250));
}

#[test]
fn zero_length_broadcast_is_allowed() {
    let array = PartitionValue::Int(3).to_array(&DataType::Int32, 0).unwrap();
    assert_eq!(array.as_primitive::<Int32Type>().len(), 0);
}

#[test]
fn option_converts_to_null() {
    let none: Option<i32> = None;
    assert_eq!(PartitionValue::from(none), PartitionValue::Null);
    assert_eq!(PartitionValue::from(Some(5i32)), PartitionValue::Int(5));
}

#[test]
fn out_of_bounds_index_is_rejected() {
    let array = PartitionValue::Int(1).to_array(&DataType::Int64, 1).unwrap();
    assert!(matches!(
        PartitionValue::from_array_ref(&array, 1),
        Err(Error::InvalidArgumentError(_))
    ));
}

#[test]
fn folding_helpers_agree() {
    for (a, b) in [("Region", "REGION"), ("Größe", "GRÖSSE")] {
        assert!(eq_ignore_case(a, b));
        assert_eq!(fold_case(a), fold_case(b));
    }
}
