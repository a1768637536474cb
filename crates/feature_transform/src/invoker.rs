//! Client side of the transformation RPC.
//!
//! Each call opens its own channel through a [`ChannelConnector`] and drops it
//! before returning, on success, RPC failure and deadline expiry alike. No
//! retries happen here.

use std::sync::Arc;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::time;

use crate::codec::encode_record;
use crate::config::TransformationConfig;
use crate::error::{Result, TransformError};
use crate::volo_gen::feast::serving as rpc;

/// Fully qualified gRPC service name.
pub const SERVICE_NAME: &str = "feast.serving.TransformationService";

/// One open connection to a transformation endpoint.
#[async_trait]
pub trait TransformationChannel: Send + Sync {
    async fn transform_features(
        &self,
        request: rpc::TransformFeaturesRequest,
    ) -> Result<rpc::TransformFeaturesResponse>;

    async fn service_info(&self) -> Result<rpc::GetTransformationServiceInfoResponse>;
}

/// Opens channels. The channel is released when the returned box is dropped.
///
/// Connectors may dial lazily. A channel whose first call cannot reach the
/// endpoint reports [`TransformError::Dial`] from that call.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn TransformationChannel>>;
}

/// Connects to a transformation service over gRPC.
#[derive(Clone, Debug)]
pub struct GrpcConnector {
    endpoint: String,
}

impl GrpcConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChannelConnector for GrpcConnector {
    async fn connect(&self) -> Result<Box<dyn TransformationChannel>> {
        let dial_error = |reason: String| TransformError::Dial {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let addr = tokio::net::lookup_host(self.endpoint.as_str())
            .await
            .map_err(|err| dial_error(err.to_string()))?
            .next()
            .ok_or_else(|| dial_error("address resolved to nothing".to_string()))?;

        let client = rpc::TransformationServiceClientBuilder::new(SERVICE_NAME)
            .address(volo::net::Address::from(addr))
            .build();
        tracing::debug!(endpoint = %self.endpoint, %addr, "opened transformation channel");
        Ok(Box::new(GrpcChannel {
            client,
            endpoint: self.endpoint.clone(),
        }))
    }
}

struct GrpcChannel {
    client: rpc::TransformationServiceClient,
    endpoint: String,
}

#[async_trait]
impl TransformationChannel for GrpcChannel {
    async fn transform_features(
        &self,
        request: rpc::TransformFeaturesRequest,
    ) -> Result<rpc::TransformFeaturesResponse> {
        let resp = self
            .client
            .transform_features(request)
            .await
            .map_err(|status| classify_status(&self.endpoint, status))?;
        Ok(resp.into_inner())
    }

    async fn service_info(&self) -> Result<rpc::GetTransformationServiceInfoResponse> {
        let resp = self
            .client
            .get_transformation_service_info(rpc::GetTransformationServiceInfoRequest {})
            .await
            .map_err(|status| classify_status(&self.endpoint, status))?;
        Ok(resp.into_inner())
    }
}

/// The volo client connects on first use, so connect failures arrive as a
/// status carrying the socket error in its source chain.
fn classify_status(endpoint: &str, status: volo_grpc::Status) -> TransformError {
    if is_connect_failure(&status) {
        TransformError::Dial {
            endpoint: endpoint.to_string(),
            reason: status.to_string(),
        }
    } else {
        TransformError::from(status)
    }
}

fn is_connect_failure(status: &volo_grpc::Status) -> bool {
    let mut source = std::error::Error::source(status);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::AddrNotAvailable
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

impl Drop for GrpcChannel {
    fn drop(&mut self) {
        tracing::debug!(endpoint = %self.endpoint, "released transformation channel");
    }
}

/// Kind of transformation server behind an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformationServiceType {
    Invalid,
    Python,
    Custom,
    Unknown(i32),
}

impl TransformationServiceType {
    pub fn from_wire(value: i32) -> Self {
        match value {
            0 => Self::Invalid,
            1 => Self::Python,
            100 => Self::Custom,
            other => Self::Unknown(other),
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            Self::Invalid => 0,
            Self::Python => 1,
            Self::Custom => 100,
            Self::Unknown(other) => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformationServiceInfo {
    pub service_type: TransformationServiceType,
    pub details: String,
}

/// Ships columnar records to the transformation endpoint.
#[derive(Clone)]
pub struct TransformationInvoker {
    connector: Arc<dyn ChannelConnector>,
    project: String,
    rpc_timeout: Duration,
}

impl TransformationInvoker {
    /// Invoker talking gRPC to the configured endpoint.
    pub fn new(config: &TransformationConfig) -> Self {
        Self::with_connector(
            Arc::new(GrpcConnector::new(config.endpoint.clone())),
            config.project.clone(),
            config.rpc_timeout(),
        )
    }

    pub fn with_connector(
        connector: Arc<dyn ChannelConnector>,
        project: impl Into<String>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            project: project.into(),
            rpc_timeout,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Serialize `record`, send it for `view_name` and return the raw
    /// response payload.
    pub async fn invoke(&self, view_name: &str, record: &RecordBatch) -> Result<Bytes> {
        let payload = encode_record(record)?;
        tracing::debug!(
            view = %view_name,
            rows = record.num_rows(),
            columns = record.num_columns(),
            bytes = payload.len(),
            "sending transformation request"
        );

        let request = rpc::TransformFeaturesRequest {
            on_demand_feature_view_name: view_name.to_string().into(),
            project: self.project.clone().into(),
            transformation_input: Some(rpc::ValueType {
                arrow_value: payload,
            }),
        };

        // The channel lives only inside this future, so it is dropped on
        // every exit path including the deadline firing.
        let call = async {
            let channel = self.connector.connect().await?;
            let response = channel.transform_features(request).await?;
            Ok::<_, TransformError>(response)
        };
        let response = match time::timeout(self.rpc_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(view = %view_name, error = %err, "transformation call failed");
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(view = %view_name, timeout = ?self.rpc_timeout, "transformation call timed out");
                return Err(TransformError::Cancelled(self.rpc_timeout));
            }
        };

        response
            .transformation_output
            .map(|output| output.arrow_value)
            .ok_or_else(|| {
                TransformError::Decode("response carries no transformation output".to_string())
            })
    }

    /// Ask the endpoint what kind of transformation server it runs.
    pub async fn service_info(&self) -> Result<TransformationServiceInfo> {
        let call = async {
            let channel = self.connector.connect().await?;
            let info = channel.service_info().await?;
            Ok::<_, TransformError>(info)
        };
        let info = match time::timeout(self.rpc_timeout, call).await {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "transformation service info call failed");
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.rpc_timeout,
                    "transformation service info call timed out"
                );
                return Err(TransformError::Cancelled(self.rpc_timeout));
            }
        };
        Ok(TransformationServiceInfo {
            service_type: TransformationServiceType::from_wire(info.service_type),
            details: info.transformation_service_type_details.to_string(),
        })
    }
}
