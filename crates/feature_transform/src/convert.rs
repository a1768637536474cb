//! Typed repeated values to Arrow arrays.

use std::sync::Arc;

use arrow::array::{
    ArrayBuilder, ArrayRef, BooleanArray, BooleanBuilder, Float32Array, Float32Builder,
    Float64Array, Float64Builder, Int32Array, Int32Builder, Int64Array, Int64Builder, ListBuilder,
    NullArray, StringArray, StringBuilder, TimestampSecondArray, TimestampSecondBuilder,
};

use crate::coerce::RepeatedValueColumn;
use crate::error::{Result, TransformError};

/// Convert `column` into an Arrow array of exactly `num_rows` elements.
pub fn column_to_array(
    name: &str,
    column: &RepeatedValueColumn,
    num_rows: usize,
) -> Result<ArrayRef> {
    if column.len() != num_rows {
        return Err(TransformError::conversion(
            name,
            format!(
                "{} column has {} values, expected {num_rows}",
                column.kind_name(),
                column.len()
            ),
        ));
    }

    let array: ArrayRef = match column {
        RepeatedValueColumn::Empty => Arc::new(NullArray::new(0)),
        RepeatedValueColumn::Int32(v) => Arc::new(Int32Array::from(v.clone())),
        RepeatedValueColumn::Int64(v) => Arc::new(Int64Array::from(v.clone())),
        RepeatedValueColumn::Float(v) => Arc::new(Float32Array::from(v.clone())),
        RepeatedValueColumn::Double(v) => Arc::new(Float64Array::from(v.clone())),
        RepeatedValueColumn::String(v) => Arc::new(StringArray::from_iter_values(v)),
        RepeatedValueColumn::Bool(v) => Arc::new(BooleanArray::from(v.clone())),
        RepeatedValueColumn::UnixTimestamp(v) => Arc::new(TimestampSecondArray::from(v.clone())),
        RepeatedValueColumn::Int32List(rows) => {
            list_array(rows, Int32Builder::new(), |b, v| b.append_value(*v))
        }
        RepeatedValueColumn::Int64List(rows) => {
            list_array(rows, Int64Builder::new(), |b, v| b.append_value(*v))
        }
        RepeatedValueColumn::FloatList(rows) => {
            list_array(rows, Float32Builder::new(), |b, v| b.append_value(*v))
        }
        RepeatedValueColumn::DoubleList(rows) => {
            list_array(rows, Float64Builder::new(), |b, v| b.append_value(*v))
        }
        RepeatedValueColumn::StringList(rows) => {
            list_array(rows, StringBuilder::new(), |b, v| b.append_value(v))
        }
        RepeatedValueColumn::BoolList(rows) => {
            list_array(rows, BooleanBuilder::new(), |b, v| b.append_value(*v))
        }
        RepeatedValueColumn::UnixTimestampList(rows) => {
            list_array(rows, TimestampSecondBuilder::new(), |b, v| b.append_value(*v))
        }
    };
    Ok(array)
}

fn list_array<T, B>(rows: &[Vec<T>], values: B, append: impl Fn(&mut B, &T)) -> ArrayRef
where
    B: ArrayBuilder,
{
    let mut builder = ListBuilder::new(values);
    for row in rows {
        for value in row {
            append(builder.values(), value);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{DataType, Int32Type, Int64Type, TimeUnit};

    use super::*;

    #[test]
    fn scalar_columns_map_to_matching_arrow_types() {
        let cases = [
            (RepeatedValueColumn::Int32(vec![1, 2]), DataType::Int32),
            (RepeatedValueColumn::Int64(vec![1, 2]), DataType::Int64),
            (RepeatedValueColumn::Float(vec![1.0, 2.0]), DataType::Float32),
            (RepeatedValueColumn::Double(vec![1.0, 2.0]), DataType::Float64),
            (
                RepeatedValueColumn::String(vec!["a".to_string(), "b".to_string()]),
                DataType::Utf8,
            ),
            (RepeatedValueColumn::Bool(vec![true, false]), DataType::Boolean),
            (
                RepeatedValueColumn::UnixTimestamp(vec![1_700_000_000, 1_700_000_001]),
                DataType::Timestamp(TimeUnit::Second, None),
            ),
        ];
        for (column, expected) in cases {
            let array = column_to_array("c", &column, 2).unwrap();
            assert_eq!(array.data_type(), &expected);
            assert_eq!(array.len(), 2);
        }
    }

    #[test]
    fn list_columns_keep_row_boundaries() {
        let column = RepeatedValueColumn::Int64List(vec![vec![1, 2, 3], vec![], vec![4]]);
        let array = column_to_array("c", &column, 3).unwrap();
        let list = array.as_list::<i32>();
        assert_eq!(list.len(), 3);
        assert_eq!(
            list.value(0).as_primitive::<Int64Type>().values().to_vec(),
            vec![1, 2, 3]
        );
        assert_eq!(list.value(1).len(), 0);
        assert_eq!(list.value(2).as_primitive::<Int64Type>().values().to_vec(), vec![4]);

        let column = RepeatedValueColumn::Int32List(vec![vec![7]]);
        let array = column_to_array("c", &column, 1).unwrap();
        assert_eq!(
            array
                .as_list::<i32>()
                .value(0)
                .as_primitive::<Int32Type>()
                .values()
                .to_vec(),
            vec![7]
        );
    }

    #[test]
    fn string_lists_round_trip_values() {
        let column = RepeatedValueColumn::StringList(vec![vec!["x".to_string(), "y".to_string()]]);
        let array = column_to_array("c", &column, 1).unwrap();
        let inner = array.as_list::<i32>().value(0);
        let strings = inner.as_string::<i32>();
        assert_eq!(strings.value(0), "x");
        assert_eq!(strings.value(1), "y");
    }

    #[test]
    fn row_count_mismatch_is_a_conversion_error() {
        let err = column_to_array("driver_id", &RepeatedValueColumn::Int64(vec![1]), 2).unwrap_err();
        assert!(matches!(err, TransformError::Conversion { ref name, .. } if name == "driver_id"));
        assert!(column_to_array("x", &RepeatedValueColumn::Empty, 3).is_err());
    }

    #[test]
    fn empty_column_is_valid_for_zero_rows() {
        let array = column_to_array("x", &RepeatedValueColumn::Empty, 0).unwrap();
        assert_eq!(array.len(), 0);
        assert_eq!(array.data_type(), &DataType::Null);
    }
}
