use ftpwatch::host::{HostConfig, HostError, LoggingExecutor, CONFIG_ENV};
use ftpwatch::ClientFactory;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if std::env::var("FTPWATCH_LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run() -> Result<(), HostError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .ok_or(HostError::MissingConfig)?;
    let config = HostConfig::load(&path)?;
    tracing::info!(config = %path, "Loaded configuration");

    let factory = Arc::new(ClientFactory::default());
    let mut listener = config
        .build_listener(factory.clone(), Arc::new(LoggingExecutor))
        .await?;
    listener.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    listener.stop().await;
    factory.close_all().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ftpwatch failed");
            ExitCode::FAILURE
        }
    }
}
