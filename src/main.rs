use anyhow::Context;
use bedrock_bridge::{
    catalog::Catalog,
    config::{Cli, Config},
    listener,
    persistence::TrackedPositionRegistry,
    session::Services,
    transport::TcpConnector,
};
use clap::Parser;
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.filter))
                .context("invalid log filter")?,
        )
        .init();

    let catalog = match &config.data_dir {
        Some(dir) => Catalog::load(dir)?,
        None => Catalog::builtin(),
    }
    .into_shared();
    let positions = Arc::new(match config.store_path() {
        Some(path) => TrackedPositionRegistry::open(path)?,
        None => TrackedPositionRegistry::in_memory(),
    });
    let connector = Arc::new(TcpConnector::new(config.network.remote.clone()));

    let bind = config.network.bind;
    let services = Services::new(Arc::new(config), catalog, Arc::clone(&positions), connector)?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("Started");

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(listener::run(listener, services, shutdown.clone()));
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown.cancel();
    server.await??;

    positions.save()?;
    Ok(())
}
