// src/pipeline/watch.rs

//! Continuous mirroring of all resource classes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{Config, ResourceKind};
use crate::services::{ResourceSettings, ScraperResource};
use crate::storage::ScheduleStore;
use crate::utils::http::DocumentFetcher;
use crate::watch::HubConfig;

/// Validate the configuration and mirror every class until Ctrl-C.
pub async fn run_watch(
    config: &Config,
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn ScheduleStore>,
) -> Result<()> {
    config.validate()?;
    watch_until(config, fetcher, store, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutdown requested"),
            Err(error) => log::error!("Failed to listen for Ctrl-C: {}", error),
        }
    })
    .await;

    Ok(())
}

/// Mirror every class until `shutdown` resolves, then stop all hubs.
///
/// Returns the started resources after they have been stopped.
pub async fn watch_until(
    config: &Config,
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn ScheduleStore>,
    shutdown: impl Future<Output = ()>,
) -> Vec<Arc<ScraperResource>> {
    let mut resources = Vec::with_capacity(ResourceKind::ALL.len());
    let mut listeners: Vec<JoinHandle<()>> = Vec::with_capacity(ResourceKind::ALL.len());

    for kind in ResourceKind::ALL {
        let (resource, refresh_rx) = ScraperResource::new(
            kind,
            ResourceSettings::from_config(config, kind),
            HubConfig::for_kind(&config.hub, kind),
            Arc::clone(&fetcher),
            Arc::clone(&store),
        );
        listeners.push(tokio::spawn(log_refreshes(kind, refresh_rx)));
        resource.start().await;
        resources.push(resource);
    }
    log::info!("Watching {}", config.scraper.base_url);

    shutdown.await;

    for resource in &resources {
        resource.stop().await;
    }
    for listener in listeners {
        listener.abort();
    }
    resources
}

async fn log_refreshes(kind: ResourceKind, mut refresh_rx: mpsc::Receiver<i64>) {
    while let Some(index) = refresh_rx.recv().await {
        log::info!("Refreshed {}", kind.store_key(index));
    }
}
