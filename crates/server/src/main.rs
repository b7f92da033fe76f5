use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formulio_core::{
    load_config, validate_config, CatalogStore, Config, HttpFeedFetcher, LibrqbitMetadataClient,
    PassReport, PipelineRunner,
};

use formulio_server::api::create_router;
use formulio_server::state::AppState;
use formulio_server::{metrics, reload};

#[derive(Parser)]
#[command(name = "formulio")]
#[command(about = "Motorsport replay catalog built from torrent feeds", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "FORMULIO_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pass of every pipeline stage and exit
    Run,
    /// Serve the catalog addon, reloading fragments as they change
    Serve,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run(Cli::parse()).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("FORMULIO_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        data_dir = %config.data_dir.display(),
        lanes = config.lanes.len(),
        "Configuration loaded successfully"
    );

    match cli.command {
        Command::Run => run_pipeline(config).await,
        Command::Serve => serve(config).await,
    }
}

async fn build_runner(config: &Config) -> Result<PipelineRunner> {
    let fetcher =
        HttpFeedFetcher::new(&config.harvester).context("Failed to create feed fetcher")?;

    let session_dir = config.data_path(&config.resolver.session_dir);
    let client = LibrqbitMetadataClient::new(&config.resolver, session_dir.clone())
        .await
        .with_context(|| format!("Failed to start torrent session in {:?}", session_dir))?;

    Ok(PipelineRunner::new(
        config.clone(),
        Arc::new(fetcher),
        Arc::new(client),
    ))
}

async fn run_pipeline(config: Config) -> Result<()> {
    let runner = build_runner(&config).await?;
    let report = runner.run_once().await.context("Pipeline pass failed")?;
    log_pass(&report);
    Ok(())
}

fn log_pass(report: &PassReport) {
    info!(
        accepted = report.harvest.accepted,
        routed = report.route.routed,
        created = report.sequence.created,
        "Pass finished"
    );
    for lane in &report.lanes {
        if let Some(error) = &lane.error {
            warn!(lane = %lane.lane, error = %error, "Lane failed");
            continue;
        }
        info!(
            lane = %lane.lane,
            retired = lane.retire.as_ref().map_or(0, |r| r.items_retired),
            archived = lane.resolve.items_archived,
            pending = lane.resolve.items_pending,
            entries = lane.merge.entries,
            written = lane.merge.written,
            "Lane summary"
        );
    }
}

async fn serve(config: Config) -> Result<()> {
    let store = Arc::new(CatalogStore::from_config(&config));
    let initial = store.reload().await;
    metrics::record_reload(&initial);
    info!(
        loaded = initial.reloaded,
        missing = initial.missing,
        "Catalog snapshots initialized"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reload_handle = reload::spawn_reload_loop(
        Arc::clone(&store),
        Duration::from_secs(config.server.reload_interval_secs),
        shutdown_rx,
    );

    let runner = if config.server.pipeline_interval_secs > 0 {
        let runner = Arc::new(build_runner(&config).await?);
        runner.start(Duration::from_secs(config.server.pipeline_interval_secs));
        Some(runner)
    } else {
        info!("In-process pipeline loop disabled");
        None
    };

    let state = Arc::new(AppState::new(config.clone(), store));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some(runner) = &runner {
        runner.stop();
    }
    let _ = shutdown_tx.send(());
    let _ = reload_handle.await;
    info!("Reload loop stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
}
