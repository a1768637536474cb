use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use arrow::array::{AsArray, Int64Array};
use arrow::datatypes::Int64Type;
use bytes::Bytes;
use feature_transform::volo_gen::feast::serving as rpc;
use feature_transform::{
    echo, FeatureVector, FieldStatus, OnDemandFeatureView, OnDemandTransformer,
    RepeatedValueColumn, TransformError, TransformationConfig, TransformationInvoker,
    TransformationJob, TransformationServiceType,
};
use tokio::task::JoinHandle;

struct EchoServer {
    addr: SocketAddr,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn free_port() -> anyhow::Result<SocketAddr> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").context("bind free-port socket")?;
    Ok(listener.local_addr()?)
}

async fn start_echo() -> anyhow::Result<EchoServer> {
    let addr = free_port()?;
    let handle = tokio::spawn(echo::serve_echo(addr));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(EchoServer { addr, handle });
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("echo server did not start on {addr}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn transformer(addr: SocketAddr) -> OnDemandTransformer {
    OnDemandTransformer::new(TransformationInvoker::new(&TransformationConfig::new(
        addr.to_string(),
        "test",
    )))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_server_round_trips_feature_values() -> anyhow::Result<()> {
    let server = start_echo().await?;
    let transformer = transformer(server.addr);

    let features = vec![FeatureVector::present(
        "f",
        Arc::new(Int64Array::from((0..10).collect::<Vec<i64>>())),
        SystemTime::now(),
    )];
    let vectors = transformer
        .get_transformation(
            &OnDemandFeatureView::new("odfv"),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &features,
            10,
            false,
        )
        .await
        .context("transform through echo server")?;

    assert_eq!(vectors.len(), 1);
    let vector = &vectors[0];
    assert_eq!(vector.name, "f");
    assert_eq!(
        vector.values.as_primitive::<Int64Type>().values().to_vec(),
        (0..10).collect::<Vec<i64>>()
    );
    assert_eq!(vector.statuses, vec![FieldStatus::Present; 10]);
    assert_eq!(vector.timestamps.len(), 10);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_server_handles_concurrent_views() -> anyhow::Result<()> {
    let server = start_echo().await?;
    let transformer = transformer(server.addr);

    let jobs: Vec<_> = (0..4)
        .map(|idx| TransformationJob {
            view: OnDemandFeatureView::new(format!("view_{idx}")),
            request_data: BTreeMap::from([(
                format!("input_{idx}"),
                RepeatedValueColumn::String(vec![format!("v{idx}"); 3]),
            )]),
            entity_rows: BTreeMap::from([(
                "driver_id".to_string(),
                RepeatedValueColumn::Int64(vec![1, 2, 3]),
            )]),
            features: vec![],
            num_rows: 3,
            full_feature_names: false,
        })
        .collect();

    let results = transformer.get_transformations(&jobs).await?;
    for (idx, vectors) in results.iter().enumerate() {
        let names: Vec<_> = vectors.iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, [format!("input_{idx}"), "driver_id".to_string()]);
        assert_eq!(vectors[0].values.as_string::<i32>().value(2), format!("v{idx}"));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_server_reports_custom_type() -> anyhow::Result<()> {
    let server = start_echo().await?;
    let info = transformer(server.addr).invoker().service_info().await?;
    assert_eq!(info.service_type, TransformationServiceType::Custom);
    assert!(info.details.starts_with("echo"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_server_rejects_malformed_payload() -> anyhow::Result<()> {
    let server = start_echo().await?;
    let client = rpc::TransformationServiceClientBuilder::new("feast.serving.TransformationService")
        .address(volo::net::Address::from(server.addr))
        .build();

    let result = client
        .transform_features(rpc::TransformFeaturesRequest {
            on_demand_feature_view_name: "odfv".into(),
            project: "test".into(),
            transformation_input: Some(rpc::ValueType {
                arrow_value: Bytes::from_static(b"not an arrow file"),
            }),
        })
        .await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connection_is_a_dial_error() -> anyhow::Result<()> {
    let addr = free_port()?;
    let invoker = TransformationInvoker::new(
        &TransformationConfig::new(addr.to_string(), "test").with_rpc_timeout(Duration::from_secs(2)),
    );
    let err = invoker.service_info().await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
    assert!(matches!(err, TransformError::Dial { .. }), "unexpected error: {err}");

    let err = transformer(addr)
        .get_transformation(
            &OnDemandFeatureView::new("odfv"),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &[],
            0,
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransformError::Dial { .. }), "unexpected error: {err}");
    Ok(())
}
