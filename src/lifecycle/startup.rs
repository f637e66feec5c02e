//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging, metrics and the router in dependency order
//! - Start background tasks (rebuilds, config reload, admin API)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tracing_subscriber::util::TryInitError;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::watcher::{apply_updates, ConfigWatcher};
use crate::config::{load_config, ConfigError, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics};
use crate::routing::dfa::BuildError;
use crate::routing::router::{RebuildCoordinator, Router};
use crate::routing::source::DefaultEndpointDataSource;

const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("endpoint table: {0}")]
    Endpoints(#[from] ValidationError),

    #[error("router: {0}")]
    Build(#[from] BuildError),

    #[error("logging: {0}")]
    Logging(#[from] TryInitError),

    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("listener: {0}")]
    Io(#[from] io::Error),

    #[error("server task: {0}")]
    Task(#[from] JoinError),
}

/// Runs the router service until a shutdown signal arrives.
pub async fn run(config_path: &Path) -> Result<(), StartupError> {
    let config = load_config(config_path)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        endpoints = config.endpoints.len(),
        "endpoint-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let source = Arc::new(DefaultEndpointDataSource::new(config.build_endpoints()?));
    let router = Arc::new(Router::new(source.clone())?);
    let shutdown = Shutdown::new();

    tokio::spawn(RebuildCoordinator::new(router.clone()).run(shutdown.subscribe()));

    let (watcher, updates) = ConfigWatcher::new(config_path);
    let _watcher = watcher.run()?;
    tokio::spawn(apply_updates(updates, source, shutdown.subscribe()));

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(AdminState {
            router: router.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = tokio::spawn(HttpServer::new(router).run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    server.await??;
    if shutdown.drain(DRAIN_DEADLINE).await {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}
