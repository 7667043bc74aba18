//! Tracing subscriber setup.
//!
//! Logs go to stdout as text or JSON lines. Spans are also exported over OTLP
//! when an exporter endpoint is configured.

use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Config, LogFormat};
use crate::error::{AppError, Result};

const DEFAULT_FILTER: &str = "clawmachine_backend=debug,tower_http=debug,sqlx::query=info";

/// Flushes and shuts down the span exporter when dropped. Hold it until exit.
pub struct OtelGuard {
    provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Failed to shut down span exporter: {e:?}");
        }
    }
}

fn span_provider(endpoint: &str, service_name: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Config(format!("OTLP exporter for {}: {}", endpoint, e)))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", service_name.to_owned()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .build())
}

/// Install the global subscriber. Returns a guard when spans are exported.
pub fn init_tracing(config: &Config) -> Result<Option<OtelGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let fmt_layer = match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
    };

    let provider = config
        .otel_exporter_otlp_endpoint
        .as_deref()
        .map(|endpoint| span_provider(endpoint, &config.otel_service_name))
        .transpose()?;
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("clawmachine")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("tracing already initialised: {}", e)))?;

    if let Some(endpoint) = config.otel_exporter_otlp_endpoint.as_deref() {
        tracing::info!(
            otel_endpoint = endpoint,
            service_name = %config.otel_service_name,
            "Exporting spans over OTLP"
        );
    }
    Ok(provider.map(|provider| OtelGuard { provider }))
}
