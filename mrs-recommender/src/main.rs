//! mrs-recommender - Music recommendation microservice
//!
//! Extracts acoustic features from song audio, keeps them in SQLite, and
//! recommends similar reference tracks through a pre-trained clustering
//! model. Default port: 4003.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use mrs_recommender::analyzer::essentia_factory;
use mrs_recommender::config::{CliArgs, ServiceConfig};
use mrs_recommender::pipeline::{
    spawn_startup_backfill, BackfillScheduler, ExtractionPipeline, ExtractionPool,
};
use mrs_recommender::recommend::{EngineState, RecommendationEngine};
use mrs_recommender::services::{Downloader, HttpSongCatalog, SongCatalog};
use mrs_recommender::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Subscriber first at RUST_LOG or info; the configured level replaces
    // it once config is loaded, unless RUST_LOG is set
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    if !level_from_env {
        match EnvFilter::try_new(&config.log_level) {
            Ok(level) => {
                if let Err(e) = filter_handle.reload(level) {
                    warn!("Failed to apply log level {}: {}", config.log_level, e);
                }
            }
            Err(e) => warn!("Invalid log level {}: {}", config.log_level, e),
        }
    }

    info!(
        "Starting mrs-recommender v{} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP"),
    );
    match &config.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none, using defaults"),
    }
    info!("Database: {}", config.database_path.display());
    info!("Model: {}", config.model_path.display());
    info!("Dataset: {}", config.dataset_path.display());

    let db = mrs_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let engine_state = EngineState::load(&config.model_path, &config.dataset_path);
    if !matches!(engine_state, EngineState::Ready(_)) {
        warn!("Recommendations unavailable until assets are fixed and the service restarted");
    }
    let engine = Arc::new(RecommendationEngine::new(
        engine_state,
        db.clone(),
        config.recommendation_limit_default,
    ));

    let downloader =
        Downloader::new(config.download_timeout).context("Failed to build HTTP client")?;
    let pipeline = Arc::new(ExtractionPipeline::new(
        db.clone(),
        downloader,
        config.url_aliases.clone(),
    ));
    let extraction_pool = Arc::new(ExtractionPool::start(
        pipeline,
        essentia_factory(config.analyzer.clone()),
        config.workers,
    ));

    let catalog: Arc<dyn SongCatalog> = Arc::new(
        HttpSongCatalog::new(config.music_service_url.clone(), config.download_timeout)
            .context("Failed to build catalog client")?,
    );
    info!("Song catalog: {}", config.music_service_url);

    let backfill = Arc::new(BackfillScheduler::new(
        catalog,
        db.clone(),
        Arc::clone(&extraction_pool),
    ));

    if config.backfill_on_startup {
        info!("Scheduling startup backfill");
        spawn_startup_backfill(Arc::clone(&backfill));
    } else {
        info!("Startup backfill disabled");
    }

    let state = AppState::new(db, engine, extraction_pool, backfill);
    let app = mrs_recommender::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
