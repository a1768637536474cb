//! Transformation output to feature vectors.
//!
//! The decoded record is filtered against the view's projection and every
//! kept column is stamped PRESENT with the instant of reconciliation. Source
//! event times do not survive the transformation round trip.

use std::collections::HashSet;
use std::time::SystemTime;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use crate::codec::decode_record;
use crate::error::{Result, TransformError};
use crate::model::OnDemandFeatureView;
use crate::vector::FeatureVector;

/// Separator between view namespace and feature in full feature names.
pub const FULL_NAME_SEPARATOR: &str = "__";

/// Feature name with the `<view>__` namespace stripped when
/// `full_feature_names` is set.
///
/// Full names must hold exactly one separator.
pub fn bare_feature_name(field_name: &str, full_feature_names: bool) -> Result<&str> {
    if !full_feature_names {
        return Ok(field_name);
    }
    match field_name.split_once(FULL_NAME_SEPARATOR) {
        Some((_, feature)) if !feature.contains(FULL_NAME_SEPARATOR) => Ok(feature),
        _ => Err(TransformError::Projection(field_name.to_string())),
    }
}

/// Decode a transformation response and reconcile it against `view`.
pub fn extract_transformation_response(
    view: &OnDemandFeatureView,
    payload: Bytes,
    num_rows: usize,
    full_feature_names: bool,
) -> Result<Vec<FeatureVector>> {
    let record = decode_record(payload, num_rows)?;
    reconcile_record(view, &record, full_feature_names)
}

pub fn reconcile_record(
    view: &OnDemandFeatureView,
    record: &RecordBatch,
    full_feature_names: bool,
) -> Result<Vec<FeatureVector>> {
    let captured_at = SystemTime::now();
    let schema = record.schema();
    let mut seen = HashSet::new();
    let mut vectors = Vec::with_capacity(record.num_columns());

    for (field, column) in schema.fields().iter().zip(record.columns()) {
        if let Some(projection) = &view.projection {
            let feature = bare_feature_name(field.name(), full_feature_names)?;
            if !projection.contains(feature) {
                tracing::debug!(
                    view = %view.name,
                    column = %field.name(),
                    "dropping column outside projection"
                );
                continue;
            }
        }

        if !seen.insert(field.name().as_str()) {
            return Err(TransformError::Decode(format!(
                "duplicate output column `{}`",
                field.name()
            )));
        }
        vectors.push(FeatureVector::present(
            field.name().clone(),
            column.clone(),
            captured_at,
        ));
    }

    Ok(vectors)
}
