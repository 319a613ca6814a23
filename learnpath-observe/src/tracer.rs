//! Tracing subscriber setup.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format of the console layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default for development).
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Configuration for the tracer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Service name recorded on exported spans.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Also export spans through OpenTelemetry's stdout exporter.
    pub otel_stdout: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            service_name: "learnpath".to_string(),
            level: "info".to_string(),
            format: LogFormat::Pretty,
            otel_stdout: false,
        }
    }
}

impl TracerConfig {
    pub fn for_service(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}

/// Error type for tracer initialization.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// Filter directive did not parse.
    #[error("invalid log filter '{0}'")]
    InvalidFilter(String),

    /// Failed to set global subscriber.
    #[error("failed to set global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Guard that shuts down tracing when dropped.
///
/// Holds the OpenTelemetry tracer provider, when one was installed, so pending spans
/// are flushed on exit.
pub struct TracingGuard {
    provider: Option<TracerProvider>,
}

impl TracingGuard {
    /// Shutdown the tracer and flush pending spans.
    pub fn shutdown(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!("failed to shutdown tracer provider: {e}");
        }
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn env_filter(level: &str) -> Result<EnvFilter, TracerError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|_| TracerError::InvalidFilter(level.to_string())),
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns a guard that must be kept alive for the duration of the program.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is already set.
pub fn init_tracing(config: TracerConfig) -> Result<TracingGuard, TracerError> {
    let filter = env_filter(&config.level)?;

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    let (provider, otel_layer) = if config.otel_stdout {
        let provider = TracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer(config.service_name.clone());
        (
            Some(provider),
            Some(tracing_opentelemetry::layer().with_tracer(tracer)),
        )
    } else {
        (None, None)
    };

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TracingGuard { provider })
}
