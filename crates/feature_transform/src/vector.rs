//! Named, per-row annotated feature columns returned to callers.

use std::time::SystemTime;

use arrow::array::{Array, ArrayRef};
use serde::{Deserialize, Serialize};

/// Per-row presence of a feature value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldStatus {
    Present,
    NullValue,
    NotFound,
    OutsideMaxAge,
}

#[derive(Clone, Debug)]
pub struct FeatureVector {
    pub name: String,
    pub values: ArrayRef,
    pub statuses: Vec<FieldStatus>,
    pub timestamps: Vec<SystemTime>,
}

impl FeatureVector {
    /// A vector whose rows are all present and stamped with `captured_at`.
    pub fn present(name: impl Into<String>, values: ArrayRef, captured_at: SystemTime) -> Self {
        let rows = values.len();
        Self {
            name: name.into(),
            values,
            statuses: vec![FieldStatus::Present; rows],
            timestamps: vec![captured_at; rows],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.values.len()
    }

    /// Values, statuses and timestamps all describe the same rows.
    pub fn is_consistent(&self) -> bool {
        self.statuses.len() == self.values.len() && self.timestamps.len() == self.values.len()
    }
}
