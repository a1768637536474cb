//! On-demand feature transformation client.
//!
//! Packages stored feature values, request-time values and entity join values
//! into an Arrow record, ships it to an external transformation service over
//! gRPC, and reconciles the returned record into named feature vectors.
//!
//! `coerce` turns caller JSON into typed columns, `record` and `codec` build
//! and serialize the input, `invoker` talks to the endpoint, `reconcile`
//! turns the response into [`FeatureVector`]s, and `service` chains the three
//! per on-demand view.

include!(concat!(env!("OUT_DIR"), "/volo_gen.rs"));

pub mod codec;
pub mod coerce;
pub mod config;
pub mod convert;
pub mod echo;
pub mod error;
pub mod invoker;
pub mod model;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod sink;
pub mod vector;

pub use crate::coerce::{narrow, narrow_rows, parse, parse_json, RepeatedValueColumn};
pub use crate::config::TransformationConfig;
pub use crate::error::{Result, TransformError};
pub use crate::invoker::{
    ChannelConnector, GrpcConnector, TransformationChannel, TransformationInvoker,
    TransformationServiceInfo, TransformationServiceType,
};
pub use crate::model::{
    entity_key_types, Entity, EntityKeyTypeMap, Feature, FeatureViewProjection,
    OnDemandFeatureView, ValueType,
};
pub use crate::reconcile::extract_transformation_response;
pub use crate::record::{build_input_record, ColumnarRecordBuilder};
pub use crate::service::{OnDemandTransformer, TransformationJob};
pub use crate::sink::SeekableByteSink;
pub use crate::vector::{FeatureVector, FieldStatus};
