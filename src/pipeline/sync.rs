// src/pipeline/sync.rs

//! One-shot mirror of every resource class.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::models::{Config, ResourceKind};
use crate::services::{ResourceSettings, ScraperResource};
use crate::storage::ScheduleStore;
use crate::utils::http::DocumentFetcher;
use crate::watch::HubConfig;

/// Summary of one class's sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: ResourceKind,
    /// Item pages attempted
    pub total: usize,
    /// Pages that could not be fetched, parsed or saved, the list page included
    pub failures: usize,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} synced",
            self.kind,
            self.total.saturating_sub(self.failures),
            self.total
        )
    }
}

/// Scrape every list page, then fetch and persist every listed entity.
///
/// Each class runs with as many concurrent fetches as it has hub workers.
pub async fn run_sync(
    config: &Config,
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn ScheduleStore>,
) -> Vec<SyncOutcome> {
    let mut outcomes = Vec::with_capacity(ResourceKind::ALL.len());
    for kind in ResourceKind::ALL {
        let (resource, _refresh_rx) = ScraperResource::new(
            kind,
            ResourceSettings::from_config(config, kind),
            HubConfig::for_kind(&config.hub, kind),
            Arc::clone(&fetcher),
            Arc::clone(&store),
        );
        let concurrency = config.hub.workers(kind).max(1);
        let outcome = sync_kind(&resource, store.as_ref(), concurrency).await;
        log::info!("{}", outcome);
        outcomes.push(outcome);
    }
    outcomes
}

async fn sync_kind(
    resource: &ScraperResource,
    store: &dyn ScheduleStore,
    concurrency: usize,
) -> SyncOutcome {
    let kind = resource.kind();
    let mut outcome = SyncOutcome {
        kind,
        total: 0,
        failures: 0,
    };

    match resource.scrape_indexes().await {
        Ok(indexes) => resource.update_indexes(indexes),
        Err(error) => {
            log::error!(
                "Sync {}: list page {} failed: {}",
                kind,
                resource.settings().list_url(),
                error
            );
            outcome.failures += 1;
            resource.update_indexes(Vec::new());
        }
    }

    let indexes = resource.indexes();
    outcome.total = indexes.len();
    log::info!("Sync {}: {} page(s) to fetch", kind, indexes.len());

    let mut results = stream::iter(indexes)
        .map(|index| async move { (index, resource.scrape_one(index).await) })
        .buffer_unordered(concurrency);

    while let Some((index, result)) = results.next().await {
        let saved = match result {
            Ok(entity) => store.save(&entity).await.map(|()| entity),
            Err(error) => Err(error),
        };
        match saved {
            Ok(entity) => {
                resource.update_metadata(entity.designator(), entity.full_name(), index);
            }
            Err(error) => {
                log::warn!("Sync {}: {} failed: {}", kind, kind.store_key(index), error);
                outcome.failures += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::utils::http::testing::StaticFetcher;

    const PAGE: &str = r#"<html><body><span class="tytulnapis">12 Pracownia</span>
        <table class="tabela">
          <tr><th>Nr</th><th>Godz</th><th>Pn</th></tr>
          <tr><td class="nr">1</td><td class="g">8:00- 8:45</td>
              <td class="l"><span class="p">chem</span> <a class="o">1a</a></td></tr>
        </table></body></html>"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.scraper.base_url = "http://plan.test".into();
        config.endpoints.divisions_list = "/divisions.html".into();
        config.endpoints.teachers_list = "/teachers.html".into();
        config.endpoints.rooms_list = "/rooms.html".into();
        config.static_indices.rooms = vec![9];
        config
    }

    #[tokio::test]
    async fn test_sync_counts_failures() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.set("http://plan.test/divisions.html", "<table></table>");
        fetcher.set(
            "http://plan.test/rooms.html",
            r#"<a href="plany/s4.html">12</a><a href="plany/s5.html">13</a>"#,
        );
        fetcher.set("http://plan.test/plany/s4.html", PAGE);
        fetcher.set("http://plan.test/plany/s9.html", PAGE);

        let store = Arc::new(MemoryStorage::new());
        let outcomes = run_sync(
            &config(),
            Arc::clone(&fetcher) as Arc<dyn DocumentFetcher>,
            Arc::clone(&store) as Arc<dyn ScheduleStore>,
        )
        .await;

        assert_eq!(
            outcomes,
            vec![
                SyncOutcome { kind: ResourceKind::Division, total: 0, failures: 0 },
                // missing list page
                SyncOutcome { kind: ResourceKind::Teacher, total: 0, failures: 1 },
                // s5 is missing
                SyncOutcome { kind: ResourceKind::Room, total: 3, failures: 1 },
            ]
        );
        assert_eq!(store.keys(), vec!["room:4", "room:9"]);
    }
}
