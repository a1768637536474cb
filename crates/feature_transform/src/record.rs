//! Assembly of the columnar input record sent to the transformation endpoint.
//!
//! Column order is fixed: stored feature vectors first (input order), then
//! request-context values, then entity join values (map order for both).

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::coerce::RepeatedValueColumn;
use crate::convert::column_to_array;
use crate::error::{Result, TransformError};
use crate::vector::FeatureVector;

/// Accumulates named columns that all share one row count.
#[derive(Debug)]
pub struct ColumnarRecordBuilder {
    num_rows: usize,
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
}

impl ColumnarRecordBuilder {
    pub fn new(num_rows: usize) -> Self {
        Self {
            num_rows,
            fields: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn push_array(&mut self, name: &str, array: ArrayRef) -> Result<&mut Self> {
        if array.len() != self.num_rows {
            return Err(TransformError::conversion(
                name,
                format!("column has {} values, expected {}", array.len(), self.num_rows),
            ));
        }
        self.fields.push(Field::new(name, array.data_type().clone(), true));
        self.columns.push(array);
        Ok(self)
    }

    pub fn push_features(&mut self, features: &[FeatureVector]) -> Result<&mut Self> {
        for vector in features {
            self.push_array(&vector.name, vector.values.clone())?;
        }
        Ok(self)
    }

    pub fn push_values(
        &mut self,
        values: &BTreeMap<String, RepeatedValueColumn>,
    ) -> Result<&mut Self> {
        for (name, column) in values {
            let array = column_to_array(name, column, self.num_rows)?;
            self.push_array(name, array)?;
        }
        Ok(self)
    }

    pub fn finish(self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields));
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        RecordBatch::try_new_with_options(schema, self.columns, &options)
            .map_err(|err| TransformError::conversion("input record", err.to_string()))
    }
}

/// Build the transformation input from stored features, request-context
/// values and entity join values.
pub fn build_input_record(
    features: &[FeatureVector],
    request_data: &BTreeMap<String, RepeatedValueColumn>,
    entity_rows: &BTreeMap<String, RepeatedValueColumn>,
    num_rows: usize,
) -> Result<RecordBatch> {
    let mut builder = ColumnarRecordBuilder::new(num_rows);
    builder
        .push_features(features)?
        .push_values(request_data)?
        .push_values(entity_rows)?;
    builder.finish()
}
