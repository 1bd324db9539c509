use crate::config::{Environment, LogLevel};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber: pretty output in development, JSON in production.
///
/// `RUST_LOG` takes precedence over `level`. The OpenTelemetry layer only exports
/// once a tracer provider is installed, see [`crate::TelemetryGuard::init`].
pub fn setup_logging(level: LogLevel, environment: Environment) {
    install(level, environment, tracing_opentelemetry::layer());
}

/// Shared by plain logging and the OTLP setup, which differ only in `otel_layer`.
pub(crate) fn install<L>(level: LogLevel, environment: Environment, otel_layer: L)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(otel_layer);

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .init(),
    }
}

fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}
