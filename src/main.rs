use onion_node_monitor::{shutdown_signal, AppError, Config, Supervisor};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onion_node_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Starting Lightning Node Monitor ===");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            if matches!(e, AppError::Transport(_)) {
                tracing::error!("Check that Tor is running and its SOCKS port is reachable");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let supervisor = Supervisor::bootstrap(config).await?;
    supervisor.run_until(shutdown_signal()).await;
    Ok(())
}
