//! Endpoint configuration for the transformation client.

use std::time::Duration;

/// Where and how to reach the transformation service.
#[derive(clap::Args, Clone, Debug)]
pub struct TransformationConfig {
    /// Transformation service address, `host:port`.
    #[arg(
        long = "transformation-endpoint",
        env = "FEATURE_TRANSFORM_ENDPOINT",
        default_value = "127.0.0.1:6569"
    )]
    pub endpoint: String,

    /// Project the on-demand views belong to.
    #[arg(long, env = "FEATURE_TRANSFORM_PROJECT", default_value = "default")]
    pub project: String,

    /// Deadline for one transformation round trip (ms).
    #[arg(long, env = "FEATURE_TRANSFORM_RPC_TIMEOUT_MS", default_value_t = 5_000)]
    pub rpc_timeout_ms: u64,
}

impl TransformationConfig {
    pub fn new(endpoint: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            project: project.into(),
            rpc_timeout_ms: 5_000,
        }
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms.max(1))
    }
}
