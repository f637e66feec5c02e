//! Configuration file watcher for hot reload of the endpoint table.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;
use crate::routing::source::DefaultEndpointDataSource;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file on notify's background thread.
    ///
    /// The returned handle must be kept alive for as long as reloads are
    /// wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload config. Keeping current endpoints.");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Replaces the endpoints of `source` with those of `config`.
///
/// Returns the number of endpoints applied. The source is left untouched
/// when any endpoint fails to convert.
pub fn apply_config(source: &DefaultEndpointDataSource, config: &RouterConfig) -> usize {
    match config.build_endpoints() {
        Ok(endpoints) => {
            let count = endpoints.len();
            source.set_endpoints(endpoints);
            tracing::info!(endpoints = count, "Endpoint table reloaded");
            count
        }
        Err(e) => {
            tracing::error!(error = %e, "Reloaded config has invalid endpoints. Keeping current endpoints.");
            source.len()
        }
    }
}

/// Applies every configuration received from a [`ConfigWatcher`] until
/// the channel closes or shutdown is signalled.
pub async fn apply_updates(
    mut updates: mpsc::UnboundedReceiver<RouterConfig>,
    source: Arc<DefaultEndpointDataSource>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    apply_config(&source, &config);
                }
                None => break,
            },
            _ = shutdown.recv() => {
                tracing::info!("Config reload task received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
