//! Transformation server that returns its input unchanged.
//!
//! Used for end-to-end checks of the client path and for local smoke tests.
//! The payload is decoded and re-encoded, so malformed input is rejected the
//! same way a real transformation server would reject it.

use std::net::SocketAddr;

use crate::codec::{encode_record, read_record};
use crate::invoker::TransformationServiceType;
use crate::volo_gen::feast::serving as rpc;

#[derive(Clone, Debug, Default)]
pub struct EchoTransformationService;

impl rpc::TransformationService for EchoTransformationService {
    async fn get_transformation_service_info(
        &self,
        _req: volo_grpc::Request<rpc::GetTransformationServiceInfoRequest>,
    ) -> Result<volo_grpc::Response<rpc::GetTransformationServiceInfoResponse>, volo_grpc::Status>
    {
        Ok(volo_grpc::Response::new(
            rpc::GetTransformationServiceInfoResponse {
                service_type: TransformationServiceType::Custom.to_wire(),
                transformation_service_type_details: format!(
                    "echo: feature_transform {}",
                    env!("CARGO_PKG_VERSION")
                )
                .into(),
            },
        ))
    }

    async fn transform_features(
        &self,
        req: volo_grpc::Request<rpc::TransformFeaturesRequest>,
    ) -> Result<volo_grpc::Response<rpc::TransformFeaturesResponse>, volo_grpc::Status> {
        let req = req.into_inner();
        let input = req
            .transformation_input
            .ok_or_else(|| volo_grpc::Status::invalid_argument("missing transformation_input"))?;

        let record = read_record(input.arrow_value)
            .map_err(|err| volo_grpc::Status::invalid_argument(err.to_string()))?;
        let payload =
            encode_record(&record).map_err(|err| volo_grpc::Status::internal(err.to_string()))?;
        tracing::debug!(
            view = %req.on_demand_feature_view_name,
            project = %req.project,
            rows = record.num_rows(),
            "echoing transformation input"
        );

        Ok(volo_grpc::Response::new(rpc::TransformFeaturesResponse {
            transformation_output: Some(rpc::ValueType {
                arrow_value: payload,
            }),
        }))
    }
}

/// Serve the echo transformation service on `addr` until the server stops.
pub async fn serve_echo(addr: SocketAddr) -> anyhow::Result<()> {
    let svc = rpc::TransformationServiceServer::new(EchoTransformationService);
    let svc = volo_grpc::server::ServiceBuilder::new(svc).build::<
        rpc::TransformationServiceRequestRecv,
        rpc::TransformationServiceResponseSend,
    >();
    tracing::info!(%addr, "echo transformation server listening");
    volo_grpc::server::Server::new()
        .add_service(svc)
        .run(volo::net::Address::from(addr))
        .await
        .map_err(|err| anyhow::anyhow!("echo transformation server failed: {err}"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bytes::Bytes;

    use super::*;
    use crate::codec::decode_record;
    use crate::coerce::RepeatedValueColumn;
    use crate::record::build_input_record;
    use crate::volo_gen::feast::serving::TransformationService;

    fn request(arrow_value: Option<Bytes>) -> volo_grpc::Request<rpc::TransformFeaturesRequest> {
        volo_grpc::Request::new(rpc::TransformFeaturesRequest {
            on_demand_feature_view_name: "odfv".into(),
            project: "p".into(),
            transformation_input: arrow_value.map(|arrow_value| rpc::ValueType { arrow_value }),
        })
    }

    #[tokio::test]
    async fn echoes_the_decoded_record() {
        let values = BTreeMap::from([(
            "s".to_string(),
            RepeatedValueColumn::String(vec!["a".to_string(), "b".to_string()]),
        )]);
        let record = build_input_record(&[], &values, &BTreeMap::new(), 2).unwrap();
        let payload = encode_record(&record).unwrap();

        let resp = EchoTransformationService
            .transform_features(request(Some(payload)))
            .await
            .unwrap()
            .into_inner();
        let output = resp.transformation_output.unwrap().arrow_value;
        assert_eq!(decode_record(output, 2).unwrap(), record);
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_input() {
        assert!(EchoTransformationService
            .transform_features(request(None))
            .await
            .is_err());
        assert!(EchoTransformationService
            .transform_features(request(Some(Bytes::from_static(b"garbage"))))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reports_custom_service_type() {
        let resp = EchoTransformationService
            .get_transformation_service_info(volo_grpc::Request::new(
                rpc::GetTransformationServiceInfoRequest {},
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.service_type, 100);
        assert!(resp.transformation_service_type_details.starts_with("echo"));
    }
}
