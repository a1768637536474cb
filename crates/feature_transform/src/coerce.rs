//! Polymorphic JSON request values to typed repeated-value columns.
//!
//! Callers send entity and request-context values as JSON arrays of scalars or
//! of one level of nested arrays. `parse` classifies the array from its first
//! element into a [`RepeatedValueColumn`]; `narrow` then converts that column
//! to the type the registry declares for the field.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{Result, TransformError};
use crate::model::ValueType;

/// Decoded repeated value. Exactly one representation is held at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum RepeatedValueColumn {
    /// Zero-length input; no representation chosen.
    Empty,
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    Bool(Vec<bool>),
    /// Seconds since the unix epoch.
    UnixTimestamp(Vec<i64>),
    Int32List(Vec<Vec<i32>>),
    Int64List(Vec<Vec<i64>>),
    FloatList(Vec<Vec<f32>>),
    DoubleList(Vec<Vec<f64>>),
    StringList(Vec<Vec<String>>),
    BoolList(Vec<Vec<bool>>),
    UnixTimestampList(Vec<Vec<i64>>),
}

impl RepeatedValueColumn {
    /// Declared type matching the held representation, `None` when empty.
    pub fn value_type(&self) -> Option<ValueType> {
        let ty = match self {
            Self::Empty => return None,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Bool(_) => ValueType::Bool,
            Self::UnixTimestamp(_) => ValueType::UnixTimestamp,
            Self::Int32List(_) => ValueType::Int32List,
            Self::Int64List(_) => ValueType::Int64List,
            Self::FloatList(_) => ValueType::FloatList,
            Self::DoubleList(_) => ValueType::DoubleList,
            Self::StringList(_) => ValueType::StringList,
            Self::BoolList(_) => ValueType::BoolList,
            Self::UnixTimestampList(_) => ValueType::UnixTimestampList,
        };
        Some(ty)
    }

    pub fn kind_name(&self) -> &'static str {
        self.value_type().map(|ty| ty.as_str()).unwrap_or("EMPTY")
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Int32(v) => v.len(),
            Self::Int64(v) | Self::UnixTimestamp(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Int32List(v) => v.len(),
            Self::Int64List(v) | Self::UnixTimestampList(v) => v.len(),
            Self::FloatList(v) => v.len(),
            Self::DoubleList(v) => v.len(),
            Self::StringList(v) => v.len(),
            Self::BoolList(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of one JSON scalar as seen by inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarKind {
    Int,
    Double,
    String,
    Bool,
}

fn classify_scalar(value: &JsonValue) -> Option<ScalarKind> {
    match value {
        JsonValue::Bool(_) => Some(ScalarKind::Bool),
        JsonValue::String(_) => Some(ScalarKind::String),
        JsonValue::Number(n) => {
            if as_exact_i64(n).is_some() {
                Some(ScalarKind::Int)
            } else {
                Some(ScalarKind::Double)
            }
        }
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Integer value of `n` if it has no fractional part and fits in i64.
fn as_exact_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(v) = n.as_i64() {
        return Some(v);
    }
    let f = n.as_f64()?;
    // 2^63 itself is out of range.
    if f.fract() == 0.0 && f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
        Some(f as i64)
    } else {
        None
    }
}

fn describe(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn mismatch(kind: ScalarKind, index: usize, value: &JsonValue) -> TransformError {
    TransformError::Inference(format!(
        "element {index} is a {}, expected {kind:?} like the first element",
        describe(value)
    ))
}

fn collect_scalars<T>(
    values: &[JsonValue],
    kind: ScalarKind,
    extract: impl Fn(&JsonValue) -> Option<T>,
) -> Result<Vec<T>> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| extract(value).ok_or_else(|| mismatch(kind, idx, value)))
        .collect()
}

fn extract_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => as_exact_i64(n),
        _ => None,
    }
}

fn extract_double(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn extract_string(value: &JsonValue) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn extract_bool(value: &JsonValue) -> Option<bool> {
    value.as_bool()
}

fn nested_elements<'a>(index: usize, value: &'a JsonValue) -> Result<&'a [JsonValue]> {
    match value {
        JsonValue::Array(items) => Ok(items),
        other => Err(TransformError::Inference(format!(
            "element {index} is a {}, expected a nested array like the first element",
            describe(other)
        ))),
    }
}

fn collect_nested<T>(
    values: &[JsonValue],
    kind: ScalarKind,
    extract: impl Fn(&JsonValue) -> Option<T> + Copy,
) -> Result<Vec<Vec<T>>> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| collect_scalars(nested_elements(idx, value)?, kind, extract))
        .collect()
}

/// Classify the first element and decode the whole array accordingly.
pub fn parse_values(values: &[JsonValue]) -> Result<RepeatedValueColumn> {
    let Some(first) = values.first() else {
        return Ok(RepeatedValueColumn::Empty);
    };

    if let JsonValue::Array(_) = first {
        return parse_nested(values);
    }

    let kind = classify_scalar(first).ok_or_else(|| {
        TransformError::Inference(format!("unsupported element type {}", describe(first)))
    })?;
    let column = match kind {
        ScalarKind::Int => RepeatedValueColumn::Int64(collect_scalars(values, kind, extract_int)?),
        ScalarKind::Double => {
            RepeatedValueColumn::Double(collect_scalars(values, kind, extract_double)?)
        }
        ScalarKind::String => {
            RepeatedValueColumn::String(collect_scalars(values, kind, extract_string)?)
        }
        ScalarKind::Bool => RepeatedValueColumn::Bool(collect_scalars(values, kind, extract_bool)?),
    };
    Ok(column)
}

fn parse_nested(values: &[JsonValue]) -> Result<RepeatedValueColumn> {
    // The first element of the first non-empty nested array decides the kind.
    let mut first_item = None;
    for (idx, value) in values.iter().enumerate() {
        if let Some(item) = nested_elements(idx, value)?.first() {
            first_item = Some(item);
            break;
        }
    }

    let kind = match first_item {
        None => ScalarKind::Int,
        Some(JsonValue::Array(_)) => {
            return Err(TransformError::Inference(
                "nested arrays deeper than one level are not supported".to_string(),
            ))
        }
        Some(item) => classify_scalar(item).ok_or_else(|| {
            TransformError::Inference(format!(
                "unsupported nested element type {}",
                describe(item)
            ))
        })?,
    };

    let column = match kind {
        ScalarKind::Int => {
            RepeatedValueColumn::Int64List(collect_nested(values, kind, extract_int)?)
        }
        ScalarKind::Double => {
            RepeatedValueColumn::DoubleList(collect_nested(values, kind, extract_double)?)
        }
        ScalarKind::String => {
            RepeatedValueColumn::StringList(collect_nested(values, kind, extract_string)?)
        }
        ScalarKind::Bool => {
            RepeatedValueColumn::BoolList(collect_nested(values, kind, extract_bool)?)
        }
    };
    Ok(column)
}

/// Parse a JSON document holding one repeated value.
pub fn parse(json: &str) -> Result<RepeatedValueColumn> {
    let value: JsonValue = serde_json::from_str(json)
        .map_err(|err| TransformError::Inference(format!("invalid json: {err}")))?;
    parse_json(&value)
}

pub fn parse_json(value: &JsonValue) -> Result<RepeatedValueColumn> {
    match value {
        JsonValue::Array(values) => parse_values(values),
        other => Err(TransformError::Inference(format!(
            "expected a json array, got {}",
            describe(other)
        ))),
    }
}

type NarrowFn = fn(RepeatedValueColumn, ValueType) -> Result<RepeatedValueColumn>;

/// Conversion table indexed by (held representation, declared type).
fn narrowing_rule(from: ValueType, to: ValueType) -> Option<NarrowFn> {
    use ValueType::*;

    let rule: NarrowFn = match (from, to) {
        (Int64, Int32) => |c, to| map_scalars(c, to, int64_to_int32).map(RepeatedValueColumn::Int32),
        (Int64, Double) => {
            |c, to| map_scalars(c, to, int64_to_double).map(RepeatedValueColumn::Double)
        }
        (Int64, Float) => |c, to| map_scalars(c, to, int64_to_float).map(RepeatedValueColumn::Float),
        (Int64, UnixTimestamp) => {
            |c, to| map_scalars(c, to, int64_to_timestamp).map(RepeatedValueColumn::UnixTimestamp)
        }
        (Double, Float) => {
            |c, to| map_scalars(c, to, double_to_float).map(RepeatedValueColumn::Float)
        }
        (Int64List, Int32List) => {
            |c, to| map_lists(c, to, int64_to_int32).map(RepeatedValueColumn::Int32List)
        }
        (Int64List, DoubleList) => {
            |c, to| map_lists(c, to, int64_to_double).map(RepeatedValueColumn::DoubleList)
        }
        (Int64List, FloatList) => {
            |c, to| map_lists(c, to, int64_to_float).map(RepeatedValueColumn::FloatList)
        }
        (Int64List, UnixTimestampList) => |c, to| {
            map_lists(c, to, int64_to_timestamp).map(RepeatedValueColumn::UnixTimestampList)
        },
        (DoubleList, FloatList) => {
            |c, to| map_lists(c, to, double_to_float).map(RepeatedValueColumn::FloatList)
        }
        _ => return None,
    };
    Some(rule)
}

/// Convert `column` to the representation of `declared`.
///
/// A column already matching `declared`, or one with no representation, is
/// returned unchanged.
pub fn narrow(column: RepeatedValueColumn, declared: ValueType) -> Result<RepeatedValueColumn> {
    let Some(held) = column.value_type() else {
        return Ok(column);
    };
    if held == declared {
        return Ok(column);
    }
    match narrowing_rule(held, declared) {
        Some(rule) => rule(column, declared),
        None => Err(TransformError::Narrowing {
            from: held.as_str(),
            to: declared,
            reason: "no conversion between these types".to_string(),
        }),
    }
}

/// Narrow every column named in `types`; other columns pass through.
pub fn narrow_rows<S: std::hash::BuildHasher>(
    rows: BTreeMap<String, RepeatedValueColumn>,
    types: &std::collections::HashMap<String, ValueType, S>,
) -> Result<BTreeMap<String, RepeatedValueColumn>> {
    rows.into_iter()
        .map(|(name, column)| match types.get(&name) {
            Some(declared) => narrow(column, *declared).map(|column| (name, column)),
            None => Ok((name, column)),
        })
        .collect()
}

trait Scalars: Sized {
    fn take_scalars(column: RepeatedValueColumn) -> Option<Vec<Self>>;
    fn take_lists(column: RepeatedValueColumn) -> Option<Vec<Vec<Self>>>;
}

impl Scalars for i64 {
    fn take_scalars(column: RepeatedValueColumn) -> Option<Vec<Self>> {
        match column {
            RepeatedValueColumn::Int64(v) => Some(v),
            _ => None,
        }
    }

    fn take_lists(column: RepeatedValueColumn) -> Option<Vec<Vec<Self>>> {
        match column {
            RepeatedValueColumn::Int64List(v) => Some(v),
            _ => None,
        }
    }
}

impl Scalars for f64 {
    fn take_scalars(column: RepeatedValueColumn) -> Option<Vec<Self>> {
        match column {
            RepeatedValueColumn::Double(v) => Some(v),
            _ => None,
        }
    }

    fn take_lists(column: RepeatedValueColumn) -> Option<Vec<Vec<Self>>> {
        match column {
            RepeatedValueColumn::DoubleList(v) => Some(v),
            _ => None,
        }
    }
}

fn narrowing_error(from: &'static str, to: ValueType, reason: String) -> TransformError {
    TransformError::Narrowing { from, to, reason }
}

fn map_scalars<S: Scalars, T>(
    column: RepeatedValueColumn,
    to: ValueType,
    convert: impl Fn(S) -> Result<T, String>,
) -> Result<Vec<T>> {
    let from = column.kind_name();
    let values = S::take_scalars(column)
        .ok_or_else(|| narrowing_error(from, to, "unexpected representation".to_string()))?;
    values
        .into_iter()
        .enumerate()
        .map(|(idx, v)| convert(v).map_err(|e| narrowing_error(from, to, format!("row {idx}: {e}"))))
        .collect()
}

fn map_lists<S: Scalars, T>(
    column: RepeatedValueColumn,
    to: ValueType,
    convert: impl Fn(S) -> Result<T, String>,
) -> Result<Vec<Vec<T>>> {
    let from = column.kind_name();
    let rows = S::take_lists(column)
        .ok_or_else(|| narrowing_error(from, to, "unexpected representation".to_string()))?;
    rows.into_iter()
        .enumerate()
        .map(|(row, values)| {
            values
                .into_iter()
                .map(|v| {
                    convert(v).map_err(|e| narrowing_error(from, to, format!("row {row}: {e}")))
                })
                .collect()
        })
        .collect()
}

fn int64_to_int32(v: i64) -> Result<i32, String> {
    i32::try_from(v).map_err(|_| format!("{v} does not fit in 32 bits"))
}

fn int64_to_timestamp(v: i64) -> Result<i64, String> {
    Ok(v)
}

fn int64_to_double(v: i64) -> Result<f64, String> {
    // Compared in i128 so the saturating cast back cannot mask 2^63.
    let f = v as f64;
    if f as i128 == i128::from(v) {
        Ok(f)
    } else {
        Err(format!("{v} is not exactly representable as a double"))
    }
}

fn int64_to_float(v: i64) -> Result<f32, String> {
    let f = v as f32;
    if f as i128 == i128::from(v) {
        Ok(f)
    } else {
        Err(format!("{v} is not exactly representable as a float"))
    }
}

fn double_to_float(v: f64) -> Result<f32, String> {
    if v.is_finite() && v.abs() > f64::from(f32::MAX) {
        return Err(format!("{v} is outside the float range"));
    }
    Ok(v as f32)
}
