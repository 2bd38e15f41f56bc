use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use flaird::Config;
use flaird::Engine;
use flaird::api;
use flaird::engine::spawn_poll_timers;

/// Flair smart vent bridge
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "flaird.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("flaird starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let engine = Arc::new(Engine::new());
    engine.register_integrations_from_config(&config);

    // Event loop first so registrations made during Start land in state
    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine stopped with error: {}", e);
            }
        })
    };

    if let Err(e) = engine.start(&config) {
        tracing::error!("Failed to start integrations: {}", e);
    }

    let timers = spawn_poll_timers(
        engine.clone(),
        config.polling.short_poll(),
        config.polling.long_poll(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = {
        let engine = engine.clone();
        let listen = config.api.listen.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(listen, port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        })
    };

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    timers.abort();
    let _ = shutdown_tx.send(());
    if let Err(e) = api_task.await {
        tracing::warn!("HTTP API task ended abnormally: {}", e);
    }

    tracing::info!("Shutting down integrations...");
    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("flaird shutdown complete");

    Ok(())
}
