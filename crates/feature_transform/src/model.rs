//! Registry metadata consumed by the transformation path.
//!
//! These types mirror what the registry hands out per request. This crate only
//! reads them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared value type of a join key, request field or feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int32,
    Int64,
    Float,
    Double,
    String,
    Bool,
    UnixTimestamp,
    Int32List,
    Int64List,
    FloatList,
    DoubleList,
    StringList,
    BoolList,
    UnixTimestampList,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::UnixTimestamp => "UNIX_TIMESTAMP",
            Self::Int32List => "INT32_LIST",
            Self::Int64List => "INT64_LIST",
            Self::FloatList => "FLOAT_LIST",
            Self::DoubleList => "DOUBLE_LIST",
            Self::StringList => "STRING_LIST",
            Self::BoolList => "BOOL_LIST",
            Self::UnixTimestampList => "UNIX_TIMESTAMP_LIST",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub dtype: ValueType,
}

/// The subset of a view's features a caller asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureViewProjection {
    pub name: String,
    #[serde(default)]
    pub name_alias: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureViewProjection {
    /// Namespace used when full feature names are requested.
    pub fn name_to_use(&self) -> &str {
        self.name_alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn contains(&self, feature_name: &str) -> bool {
        self.features.iter().any(|f| f.name == feature_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandFeatureView {
    pub name: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub projection: Option<FeatureViewProjection>,
}

impl OnDemandFeatureView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            projection: None,
        }
    }

    /// Restrict the view to `features`, keeping the view name as namespace.
    pub fn with_projection<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = (S, ValueType)>,
        S: Into<String>,
    {
        self.projection = Some(FeatureViewProjection {
            name: self.name.clone(),
            name_alias: None,
            features: features
                .into_iter()
                .map(|(name, dtype)| Feature {
                    name: name.into(),
                    dtype,
                })
                .collect(),
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub join_key: String,
    pub value_type: ValueType,
}

/// Join-key name to declared value type.
pub type EntityKeyTypeMap = HashMap<String, ValueType>;

pub fn entity_key_types(entities: &[Entity]) -> EntityKeyTypeMap {
    entities
        .iter()
        .map(|entity| (entity.join_key.clone(), entity.value_type))
        .collect()
}
