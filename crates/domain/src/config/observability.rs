use serde::{Deserialize, Serialize};

/// Optional OpenTelemetry export for the relay.
///
/// Without an `otlp_endpoint` the relay only writes JSON logs.  With one,
/// every `tracing` span (including each forwarded request) is also exported
/// over OTLP/gRPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// e.g. `http://localhost:4317`
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// `TraceIdRatioBased` sampling ratio in `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_service_name() -> String {
    "relaychat-relay".into()
}

fn d_sample_rate() -> f64 {
    1.0
}
