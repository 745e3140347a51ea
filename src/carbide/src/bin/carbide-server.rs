use carbide::{start_server, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("carbide=info")),
        )
        .init();

    let mut config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            Config::load(&path)?
        }
        None => {
            tracing::info!("Using built-in default configuration");
            Config::default()
        }
    };
    config.apply_env()?;

    tracing::info!(
        "Starting carbide server on {}:{}",
        config.server.bind_address,
        config.server.port
    );
    tracing::info!("Server endpoints:");
    tracing::info!(
        "  Health: http://{}:{}/health",
        config.server.bind_address,
        config.server.port
    );
    tracing::info!(
        "  Bundles: http://{}:{}/v2/hauler/<project>-manifest.yaml/manifests/<tag>",
        config.server.bind_address,
        config.server.port
    );

    let handle = start_server(config).await?;
    handle.await?;
    Ok(())
}
