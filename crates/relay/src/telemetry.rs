//! Log and trace export setup for the relay binary.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rc_domain::config::ObservabilityConfig;

const SERVE_FILTER: &str = "info,rc_relay=debug";
const COMMAND_FILTER: &str = "warn";

/// Holds the OTLP provider, if any, until [`Telemetry::shutdown`] flushes it.
#[must_use = "call shutdown() on exit to flush exported spans"]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// JSON logs for `serve`.  Spans are also exported over OTLP/gRPC when
    /// `otlp_endpoint` is set and the exporter builds.
    pub fn init(obs: &ObservabilityConfig) -> Self {
        let provider = match otlp_provider(obs) {
            Ok(provider) => provider,
            Err(e) => {
                // The subscriber isn't up yet.
                eprintln!("WARNING: OTLP export disabled: {e}");
                None
            }
        };
        let otel_layer = provider
            .as_ref()
            .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("relaychat-relay")));

        tracing_subscriber::registry()
            .with(filter(SERVE_FILTER))
            .with(tracing_subscriber::fmt::layer().json())
            .with(otel_layer)
            .init();

        if let Some(endpoint) = &obs.otlp_endpoint {
            if provider.is_some() {
                tracing::info!(endpoint = %endpoint, sample_rate = obs.sample_rate, "OTLP export enabled");
            }
        }
        Self { provider }
    }

    /// Compact warnings on stderr for one-shot commands.
    pub fn init_cli() {
        tracing_subscriber::fmt()
            .with_env_filter(filter(COMMAND_FILTER))
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    pub fn shutdown(self) {
        let Some(provider) = self.provider else { return };
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = ?e, "flushing exported spans failed");
        }
    }
}

/// `RUST_LOG` when it parses, else `default`.
fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn otlp_provider(obs: &ObservabilityConfig) -> anyhow::Result<Option<SdkTracerProvider>> {
    let Some(endpoint) = &obs.otlp_endpoint else {
        return Ok(None);
    };
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| anyhow::anyhow!("exporter for {endpoint}: {e}"))?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();
    Ok(Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(sampler(obs.sample_rate))
            .with_resource(resource)
            .build(),
    ))
}

/// The edges of the ratio skip trace-id hashing.
fn sampler(rate: f64) -> Sampler {
    if rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_means_no_provider() {
        let obs = ObservabilityConfig::default();
        assert!(otlp_provider(&obs).unwrap().is_none());
    }

    #[test]
    fn sample_rate_edges() {
        assert!(matches!(sampler(1.0), Sampler::AlwaysOn));
        assert!(matches!(sampler(0.0), Sampler::AlwaysOff));
        assert!(matches!(sampler(0.25), Sampler::TraceIdRatioBased(r) if (r - 0.25).abs() < f64::EPSILON));
    }
}
