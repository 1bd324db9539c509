use anyhow::Context;
use gateway::{
    config::get_configuration, logging::setup_logging, routes::run_server, state::AppState,
};
use inference::{ModelClient, OrtBackend};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;
    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        environment = config.environment.as_str(),
        model = %config.model.name,
        device = if config.model.enable_gpu { "cuda" } else { "cpu" },
        "Starting PCB defect detection gateway"
    );

    let model = Arc::new(ModelClient::new(config.model_config()));

    // The server answers /health (unhealthy) while the model is loading.
    let loader = Arc::clone(&model);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = loader.load::<OrtBackend>() {
            tracing::error!(error = ?e, "Model failed to load; predictions will be refused");
        }
    });

    let state = AppState::from_config(&config, Arc::clone(&model));
    let result = run_server(&config.address(), state, shutdown_signal()).await;

    model.unload();
    tracing::info!("Gateway stopped");

    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
