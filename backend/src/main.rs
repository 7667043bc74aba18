//! Clawmachine backend - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use clawmachine_backend::{
    api,
    cli::{runner, Cli, Command},
    config::Config,
    error::Result,
    services::metrics_service,
    storage::filesystem::FilesystemStorage,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command() {
        Command::Migrate => runner::run_migrate(&config, &cli.format).await,
        Command::CreateAgent { name } => runner::run_create_agent(&config, &cli.format, name).await,
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let _otel_guard = telemetry::init_tracing(&config)?;
    tracing::info!("Starting Clawmachine backend");

    // Connect to database and run migrations
    let db_pool = runner::connect(&config).await?;
    tracing::info!("Database ready");

    tokio::fs::create_dir_all(&config.storage_path).await?;
    let storage = Arc::new(FilesystemStorage::new(
        &config.storage_path,
        &config.public_base_url,
    ));

    // Initialize Prometheus metrics recorder
    let metrics_handle = metrics_service::init_metrics()?;
    tracing::info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config.bind_address.parse()?;

    let mut app_state = api::AppState::new(config, db_pool, storage);
    app_state.set_metrics_handle(metrics_handle);
    let app = api::routes::create_router(Arc::new(app_state));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
