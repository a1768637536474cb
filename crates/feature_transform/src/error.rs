//! Error taxonomy for the on-demand transformation path.
//!
//! Every failure is surfaced to the immediate caller; nothing here retries.

use std::time::Duration;

use arrow::error::ArrowError;
use thiserror::Error;

use crate::model::ValueType;

pub type Result<T, E = TransformError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransformError {
    /// A supplied value cannot become a typed column.
    #[error("cannot convert `{name}` into a column: {reason}")]
    Conversion { name: String, reason: String },

    /// A JSON array does not fit any supported repeated-value kind.
    #[error("cannot infer value type: {0}")]
    Inference(String),

    /// A parsed value is not representable in the declared type.
    #[error("cannot narrow {from} values to {to}: {reason}")]
    Narrowing {
        from: &'static str,
        to: ValueType,
        reason: String,
    },

    #[error("failed to encode columnar record: {0}")]
    Encode(#[source] ArrowError),

    #[error("failed to connect to transformation endpoint {endpoint}: {reason}")]
    Dial { endpoint: String, reason: String },

    #[error("transformation rpc failed: {0}")]
    Rpc(String),

    #[error("transformation rpc cancelled after {0:?}")]
    Cancelled(Duration),

    #[error("failed to decode transformation response: {0}")]
    Decode(String),

    /// A full feature name has no `<view>__<feature>` shape.
    #[error("feature name `{0}` is not of the form <view>__<feature>")]
    Projection(String),
}

impl TransformError {
    pub(crate) fn conversion(name: &str, reason: impl Into<String>) -> Self {
        Self::Conversion {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures raised while talking to the endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Dial { .. } | Self::Rpc(_) | Self::Cancelled(_))
    }
}

impl From<volo_grpc::Status> for TransformError {
    fn from(status: volo_grpc::Status) -> Self {
        Self::Rpc(status.to_string())
    }
}
