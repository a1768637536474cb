// feature-transform binary entry point.
//
// Runs one on-demand transformation against a configured endpoint from JSON
// files on disk, queries endpoint info, or hosts the echo transformation
// server for local testing.

use std::collections::{BTreeMap, HashMap};
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use clap::{Parser, Subcommand};
use feature_transform::{
    echo, entity_key_types, narrow_rows, parse_json, Entity, FeatureVector, FieldStatus,
    OnDemandFeatureView, OnDemandTransformer, RepeatedValueColumn, TransformationConfig,
    TransformationInvoker, ValueType,
};
use serde::{Deserialize, Serialize};

/// CLI entry point wrapper.
#[derive(Parser, Debug)]
#[command(name = "feature-transform")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the echo transformation server.
    ServeEcho(ServeEchoArgs),
    /// Print what kind of transformation server the endpoint runs.
    Info(InfoArgs),
    /// Transform request values for one on-demand feature view.
    Transform(TransformArgs),
}

#[derive(Parser, Debug)]
struct ServeEchoArgs {
    #[arg(long, env = "FEATURE_TRANSFORM_LISTEN", default_value = "127.0.0.1:6569")]
    listen: SocketAddr,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[command(flatten)]
    transformation: TransformationConfig,
}

#[derive(Parser, Debug)]
struct TransformArgs {
    #[command(flatten)]
    transformation: TransformationConfig,

    /// On-demand feature view definition (JSON).
    #[arg(long)]
    view: PathBuf,

    /// Request body with `entities` and `request_context` (JSON).
    #[arg(long)]
    request: PathBuf,

    /// Entity definitions used to narrow join key values (JSON array).
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Expect `<view>__<feature>` names in the transformation output.
    #[arg(long)]
    full_feature_names: bool,
}

/// Request body accepted by `transform`.
#[derive(Debug, Default, Deserialize)]
struct TransformRequestBody {
    #[serde(default)]
    entities: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    request_context: BTreeMap<String, serde_json::Value>,
    /// Declared types of request-context fields.
    #[serde(default)]
    request_schema: HashMap<String, ValueType>,
}

#[derive(Debug, Serialize)]
struct FeatureVectorOutput {
    view: String,
    name: String,
    values: Vec<String>,
    statuses: Vec<FieldStatus>,
    event_timestamps: Vec<u64>,
}

/// Parse CLI args, initialize logging, and run the requested subcommand.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Enable ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,h2=warn,hyper=warn".into()),
        )
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::ServeEcho(args) => echo::serve_echo(args.listen).await,
        Command::Info(args) => run_info(args).await,
        Command::Transform(args) => run_transform(args).await,
    }
}

async fn run_info(args: InfoArgs) -> anyhow::Result<()> {
    let invoker = TransformationInvoker::new(&args.transformation);
    let info = invoker
        .service_info()
        .await
        .with_context(|| format!("query {}", args.transformation.endpoint))?;
    println!("type: {:?}", info.service_type);
    println!("details: {}", info.details);
    Ok(())
}

async fn run_transform(args: TransformArgs) -> anyhow::Result<()> {
    let view: OnDemandFeatureView = read_json(&args.view)?;
    let body: TransformRequestBody = read_json(&args.request)?;
    let entities: Vec<Entity> = match &args.entities {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let entity_rows = coerce_values(&body.entities).context("decode entities")?;
    let entity_rows =
        narrow_rows(entity_rows, &entity_key_types(&entities)).context("narrow entity values")?;
    let request_data = coerce_values(&body.request_context).context("decode request context")?;
    let request_data =
        narrow_rows(request_data, &body.request_schema).context("narrow request context")?;

    let num_rows = entity_rows
        .values()
        .chain(request_data.values())
        .map(RepeatedValueColumn::len)
        .next()
        .unwrap_or(0);

    let transformer = OnDemandTransformer::new(TransformationInvoker::new(&args.transformation));
    let vectors = transformer
        .get_transformation(
            &view,
            &request_data,
            &entity_rows,
            &[],
            num_rows,
            args.full_feature_names,
        )
        .await
        .with_context(|| format!("transform view {}", view.name))?;

    let namespace = view
        .projection
        .as_ref()
        .map_or(view.name.as_str(), |projection| projection.name_to_use());
    let output = vectors
        .iter()
        .map(|vector| render_vector(namespace, vector))
        .collect::<anyhow::Result<Vec<_>>>()?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("decode {}", path.display()))
}

fn coerce_values(
    values: &BTreeMap<String, serde_json::Value>,
) -> anyhow::Result<BTreeMap<String, RepeatedValueColumn>> {
    values
        .iter()
        .map(|(name, value)| {
            let column = parse_json(value).with_context(|| format!("field {name}"))?;
            Ok((name.clone(), column))
        })
        .collect()
}

fn render_vector(view: &str, vector: &FeatureVector) -> anyhow::Result<FeatureVectorOutput> {
    let formatter = ArrayFormatter::try_new(vector.values.as_ref(), &FormatOptions::default())
        .with_context(|| format!("format values of {}", vector.name))?;
    let values = (0..vector.values.len())
        .map(|idx| formatter.value(idx).to_string())
        .collect();
    let event_timestamps = vector
        .timestamps
        .iter()
        .map(|ts| unix_seconds(*ts))
        .collect();
    Ok(FeatureVectorOutput {
        view: view.to_string(),
        name: vector.name.clone(),
        values,
        statuses: vector.statuses.clone(),
        event_timestamps,
    })
}

fn unix_seconds(ts: SystemTime) -> u64 {
    ts.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};

    use super::*;

    #[test]
    fn request_body_defaults_missing_sections() {
        let body: TransformRequestBody =
            serde_json::from_str(r#"{"entities": {"driver_id": [1, 2]}}"#).unwrap();
        assert_eq!(body.entities.len(), 1);
        assert!(body.request_context.is_empty());
        assert!(body.request_schema.is_empty());
    }

    #[test]
    fn coerce_values_reports_field_name() {
        let values = BTreeMap::from([("bad".to_string(), serde_json::json!([1, "x"]))]);
        let err = coerce_values(&values).unwrap_err();
        assert!(format!("{err:#}").contains("field bad"));
    }

    #[test]
    fn render_vector_formats_cells() {
        let vector = FeatureVector::present(
            "f",
            Arc::new(Int64Array::from(vec![3, 4])),
            UNIX_EPOCH + std::time::Duration::from_secs(42),
        );
        let out = render_vector("odfv", &vector).unwrap();
        assert_eq!(out.view, "odfv");
        assert_eq!(out.values, ["3", "4"]);
        assert_eq!(out.event_timestamps, [42, 42]);

        let vector = FeatureVector::present(
            "s",
            Arc::new(StringArray::from(vec!["a"])),
            SystemTime::now(),
        );
        assert_eq!(render_vector("odfv", &vector).unwrap().values, ["a"]);
    }

    #[test]
    fn read_json_loads_view_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        std::fs::write(
            &path,
            r#"{"name": "odfv", "projection": {"name": "odfv", "features": [{"name": "f", "dtype": "DOUBLE"}]}}"#,
        )
        .unwrap();
        let view: OnDemandFeatureView = read_json(&path).unwrap();
        assert!(view.projection.unwrap().contains("f"));
        assert!(read_json::<OnDemandFeatureView>(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn cli_parses_transform_flags() {
        let args = Args::try_parse_from([
            "feature-transform",
            "transform",
            "--transformation-endpoint",
            "127.0.0.1:9000",
            "--view",
            "view.json",
            "--request",
            "request.json",
            "--full-feature-names",
        ])
        .unwrap();
        match args.cmd {
            Command::Transform(args) => {
                assert!(args.full_feature_names);
                assert_eq!(args.transformation.endpoint, "127.0.0.1:9000");
                assert!(args.entities.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
