use crate::config::Config;
use common::TelemetryGuard;

/// Installs the tracing subscriber. With an OTLP endpoint configured, spans and
/// metrics are exported too and the returned guard flushes them on drop.
pub fn setup_logging(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    match config.otel_endpoint.as_deref() {
        Some(endpoint) => {
            let guard = TelemetryGuard::init(
                "gateway",
                endpoint,
                config.log_level,
                config.environment,
            )?;
            Ok(Some(guard))
        }
        None => {
            common::setup_logging(config.log_level, config.environment);
            Ok(None)
        }
    }
}
