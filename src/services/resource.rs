// src/services/resource.rs

//! Reconciliation controller for one resource class.
//!
//! A `ScraperResource` owns a hub whose index-0 observer watches the class's
//! list page. Whenever the list changes the authoritative index set is
//! re-scraped and the hub's observers are converged onto it; each item
//! observer re-parses its page on change, persists the entity and emits the
//! index on the refresh channel.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{Config, Entity, ResourceKind};
use crate::services::index::scrape_indexes;
use crate::services::metadata::DesignatorIndex;
use crate::storage::ScheduleStore;
use crate::utils::http::DocumentFetcher;
use crate::utils::{endpoint_url, item_url};
use crate::watch::{Change, Hub, HubConfig, LIST_OBSERVER_INDEX, Observer, ObserverHandler};

/// Polling interval of item `index`, staggered so pages don't poll in lockstep.
pub fn polling_interval(index: i64, base: Duration) -> Duration {
    let stagger = ((index + 1) / 10).max(0) as u64;
    Duration::from_secs(stagger) + base
}

/// Per-class endpoints and timing.
#[derive(Debug, Clone)]
pub struct ResourceSettings {
    pub base_url: String,
    /// Path of the list page
    pub list_endpoint: String,
    /// Item path template containing `%d`
    pub item_template: String,
    /// Indices observed whatever the list page says
    pub static_indexes: Vec<i64>,
    pub list_interval: Duration,
    pub base_interval: Duration,
    pub refresh_capacity: usize,
    /// Longest wait on a full refresh channel
    pub notify_timeout: Duration,
}

impl ResourceSettings {
    pub fn from_config(config: &Config, kind: ResourceKind) -> Self {
        Self {
            base_url: config.scraper.base_url.clone(),
            list_endpoint: config.endpoints.list(kind).to_string(),
            item_template: config.endpoints.item(kind).to_string(),
            static_indexes: config.static_indices.get(kind).to_vec(),
            list_interval: Duration::from_secs(config.hub.list_interval_secs),
            base_interval: Duration::from_secs(config.hub.base_interval_secs),
            refresh_capacity: config.hub.refresh_capacity,
            notify_timeout: Duration::from_secs(config.hub.notify_timeout_secs),
        }
    }

    pub fn list_url(&self) -> String {
        endpoint_url(&self.base_url, &self.list_endpoint)
    }

    pub fn item_url(&self, index: i64) -> String {
        item_url(&self.base_url, &self.item_template, index)
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    pub removed: usize,
}

/// Keeps one hub's observers in step with a class's list page.
pub struct ScraperResource {
    kind: ResourceKind,
    settings: ResourceSettings,
    hub: Hub,
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn ScheduleStore>,
    indexes: RwLock<Vec<i64>>,
    metadata: RwLock<DesignatorIndex>,
    refresh_tx: mpsc::Sender<i64>,
    reconcile: tokio::sync::Mutex<()>,
    list_handler: Arc<dyn ObserverHandler>,
    item_handler: Arc<dyn ObserverHandler>,
}

impl ScraperResource {
    /// Create a resource and the receiving end of its refresh channel.
    pub fn new(
        kind: ResourceKind,
        settings: ResourceSettings,
        hub_config: HubConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        store: Arc<dyn ScheduleStore>,
    ) -> (Arc<Self>, mpsc::Receiver<i64>) {
        let (refresh_tx, refresh_rx) = mpsc::channel(settings.refresh_capacity.max(1));
        let hub = Hub::new(kind.as_str(), hub_config, Arc::clone(&fetcher));

        let resource = Arc::new_cyclic(|this: &Weak<Self>| Self {
            kind,
            settings,
            hub,
            fetcher,
            store,
            indexes: RwLock::new(Vec::new()),
            metadata: RwLock::new(DesignatorIndex::new()),
            refresh_tx,
            reconcile: tokio::sync::Mutex::new(()),
            list_handler: Arc::new(ListHandler {
                kind,
                resource: this.clone(),
            }),
            item_handler: Arc::new(ItemHandler {
                kind,
                resource: this.clone(),
            }),
        });
        (resource, refresh_rx)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn settings(&self) -> &ResourceSettings {
        &self.settings
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Start polling: install the list observer and converge on the static indices.
    pub async fn start(&self) {
        self.hub.start();

        let list_observer = Observer::new(
            LIST_OBSERVER_INDEX,
            self.settings.list_url(),
            self.settings.list_interval,
            Arc::clone(&self.list_handler),
        );
        self.hub.add_observer(Arc::new(list_observer));

        self.update_indexes(Vec::new());
        self.refresh_observers().await;
        log::info!("Resource {} started", self.kind);
    }

    pub async fn stop(&self) {
        self.hub.stop().await;
        log::info!("Resource {} stopped", self.kind);
    }

    fn read_indexes(&self) -> RwLockReadGuard<'_, Vec<i64>> {
        self.indexes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_metadata(&self) -> RwLockReadGuard<'_, DesignatorIndex> {
        self.metadata.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_metadata(&self) -> RwLockWriteGuard<'_, DesignatorIndex> {
        self.metadata.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the authoritative index set.
    ///
    /// Static indices are merged in; zero and negative indices are dropped.
    pub fn update_indexes(&self, indexes: Vec<i64>) {
        let mut merged: Vec<i64> = indexes
            .into_iter()
            .chain(self.settings.static_indexes.iter().copied())
            .filter(|index| *index > LIST_OBSERVER_INDEX)
            .collect();
        merged.sort_unstable();
        merged.dedup();

        log::debug!("Resource {}: {} index(es)", self.kind, merged.len());
        *self.indexes.write().unwrap_or_else(PoisonError::into_inner) = merged;
    }

    /// Current authoritative index set, ascending.
    pub fn indexes(&self) -> Vec<i64> {
        self.read_indexes().clone()
    }

    /// Converge the hub's item observers onto the authoritative index set.
    ///
    /// Removed indices lose their persisted entity and metadata. Concurrent
    /// calls run one at a time.
    pub async fn refresh_observers(&self) -> RefreshReport {
        let _guard = self.reconcile.lock().await;

        let target: BTreeSet<i64> = self.read_indexes().iter().copied().collect();
        let live = self.hub.get_all_observers(true);
        let mut report = RefreshReport::default();

        for index in target.iter().filter(|index| !live.contains_key(*index)) {
            if self.hub.add_observer(Arc::new(self.new_observer(*index))) {
                report.added += 1;
            }
        }

        for index in live.keys().filter(|index| !target.contains(*index)) {
            self.hub.remove_observer(*index);
            if let Err(error) = self
                .kind
                .remove_from_store(self.store.as_ref(), *index)
                .await
            {
                log::error!(
                    "Resource {}: failed to delete {}: {}",
                    self.kind,
                    self.kind.store_key(*index),
                    error
                );
            }
            self.write_metadata().evict(*index);
            report.removed += 1;
        }

        if report.added > 0 || report.removed > 0 {
            log::info!(
                "Resource {}: {} observer(s) added, {} removed, {} live",
                self.kind,
                report.added,
                report.removed,
                target.len()
            );
        }
        report
    }

    /// Observer for one item page.
    pub fn new_observer(&self, index: i64) -> Observer {
        Observer::new(
            index,
            self.settings.item_url(index),
            polling_interval(index, self.settings.base_interval),
            Arc::clone(&self.item_handler),
        )
    }

    /// Fetch the list page and return the indices it links to.
    pub async fn scrape_indexes(&self) -> Result<Vec<i64>> {
        let body = self.fetcher.fetch(&self.settings.list_url()).await?;
        let document = Html::parse_document(&body);
        scrape_indexes(
            &document,
            &self.settings.item_template,
            self.kind.list_link_selector(),
        )
    }

    /// Fetch and parse a single item page.
    pub async fn scrape_one(&self, index: i64) -> Result<Entity> {
        let body = self.fetcher.fetch(&self.settings.item_url(index)).await?;
        let document = Html::parse_document(&body);
        self.kind.scrape_document(index, &document)
    }

    pub fn update_metadata(&self, designator: &str, full_name: &str, index: i64) {
        self.write_metadata().update(designator, full_name, index);
    }

    /// Designator → indices snapshot.
    pub fn designators(&self) -> HashMap<String, Vec<i64>> {
        self.read_metadata().designators()
    }

    /// Full name → indices snapshot.
    pub fn full_names(&self) -> HashMap<String, Vec<i64>> {
        self.read_metadata().full_names()
    }

    async fn on_list_change(&self) {
        match self.scrape_indexes().await {
            Ok(indexes) => {
                self.update_indexes(indexes);
                self.refresh_observers().await;
            }
            Err(error) => log::warn!(
                "Resource {}: index scrape of {} failed: {}",
                self.kind,
                self.settings.list_url(),
                error
            ),
        }
    }

    /// Whether `observer` is still the one registered for its index.
    fn is_live(&self, observer: &Arc<Observer>) -> bool {
        self.hub
            .get_observer(observer.index())
            .is_some_and(|live| Arc::ptr_eq(&live, observer))
    }

    async fn on_item_change(&self, observer: &Arc<Observer>, change: Change) {
        let index = observer.index();
        let entity = match self.scrape_one(index).await {
            Ok(entity) => entity,
            Err(error) => {
                log::error!("Resource {}: scrape of {} failed: {}", self.kind, observer.url(), error);
                return;
            }
        };

        {
            // Reconciliation may have dropped the index while the page was fetched.
            let _guard = self.reconcile.lock().await;
            if !self.is_live(observer) {
                log::debug!(
                    "Resource {}: discarding scrape of removed {}",
                    self.kind,
                    entity.store_key()
                );
                return;
            }
            if let Err(error) = self.store.save(&entity).await {
                log::error!(
                    "Resource {}: failed to save {}: {}",
                    self.kind,
                    entity.store_key(),
                    error
                );
                return;
            }
            self.update_metadata(entity.designator(), entity.full_name(), index);
        }

        if change.first_run {
            return;
        }
        if let Err(error) = self
            .refresh_tx
            .send_timeout(index, self.settings.notify_timeout)
            .await
        {
            log::warn!(
                "Resource {}: refresh notification for {} dropped: {}",
                self.kind,
                index,
                error
            );
        }
    }
}

struct ListHandler {
    kind: ResourceKind,
    resource: Weak<ScraperResource>,
}

#[async_trait]
impl ObserverHandler for ListHandler {
    fn extract(&self, document: &Html) -> Result<String> {
        self.kind.list_extract(document)
    }

    async fn on_change(&self, _observer: Arc<Observer>, _change: Change) {
        if let Some(resource) = self.resource.upgrade() {
            resource.on_list_change().await;
        }
    }
}

struct ItemHandler {
    kind: ResourceKind,
    resource: Weak<ScraperResource>,
}

#[async_trait]
impl ObserverHandler for ItemHandler {
    fn extract(&self, document: &Html) -> Result<String> {
        self.kind.extract(document)
    }

    async fn on_change(&self, observer: Arc<Observer>, change: Change) {
        if let Some(resource) = self.resource.upgrade() {
            resource.on_item_change(&observer, change).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::utils::http::testing::StaticFetcher;
    use crate::watch::fingerprint;

    const BASE: &str = "http://plan.test";

    fn settings(static_indexes: Vec<i64>) -> ResourceSettings {
        ResourceSettings {
            base_url: BASE.to_string(),
            list_endpoint: "/lista.html".to_string(),
            item_template: "/plany/o%d.html".to_string(),
            static_indexes,
            list_interval: Duration::from_millis(50),
            base_interval: Duration::from_millis(50),
            refresh_capacity: 8,
            notify_timeout: Duration::from_millis(200),
        }
    }

    fn hub_config() -> HubConfig {
        HubConfig {
            workers: 2,
            queue_capacity: 16,
            tick: Duration::from_millis(10),
            enqueue_timeout: Duration::from_millis(100),
        }
    }

    fn item_page(designator: &str, subject: &str) -> String {
        format!(
            r#"<html><body><span class="tytulnapis">{designator} klasa</span>
            <table class="tabela">
              <tr><th>Nr</th><th>Godz</th><th>Pn</th></tr>
              <tr><td class="nr">1</td><td class="g">8:00- 8:45</td>
                  <td class="l"><span class="p">{subject}</span> <a class="n">Kw</a></td></tr>
            </table></body></html>"#
        )
    }

    fn resource(
        static_indexes: Vec<i64>,
    ) -> (
        Arc<ScraperResource>,
        mpsc::Receiver<i64>,
        Arc<StaticFetcher>,
        Arc<MemoryStorage>,
    ) {
        let fetcher = Arc::new(StaticFetcher::new());
        let store = Arc::new(MemoryStorage::new());
        let (resource, rx) = ScraperResource::new(
            ResourceKind::Division,
            settings(static_indexes),
            hub_config(),
            Arc::clone(&fetcher) as Arc<dyn DocumentFetcher>,
            Arc::clone(&store) as Arc<dyn ScheduleStore>,
        );
        (resource, rx, fetcher, store)
    }

    fn live(resource: &ScraperResource) -> Vec<i64> {
        resource.hub().get_all_observers(true).into_keys().collect()
    }

    #[test]
    fn test_polling_interval_is_staggered() {
        let base = Duration::from_secs(15);
        assert_eq!(polling_interval(1, base), Duration::from_secs(15));
        assert_eq!(polling_interval(9, base), Duration::from_secs(16));
        assert_eq!(polling_interval(19, base), Duration::from_secs(17));
        assert_eq!(polling_interval(19, base), polling_interval(19, base));
    }

    #[test]
    fn test_update_indexes_merges_static() {
        let (resource, _rx, _, _) = resource(vec![5, 2]);
        resource.update_indexes(vec![3, 0, -1, 2, 3]);
        assert_eq!(resource.indexes(), vec![2, 3, 5]);
    }

    #[tokio::test]
    async fn test_refresh_converges() {
        let (resource, _rx, _, store) = resource(Vec::new());

        resource.update_indexes(vec![1, 2, 3]);
        let report = resource.refresh_observers().await;
        assert_eq!(report, RefreshReport { added: 3, removed: 0 });
        assert_eq!(live(&resource), vec![1, 2, 3]);

        let stale = resource.kind().scrape_document(1, &Html::parse_document(&item_page("1a", "mat")));
        store.save(&stale.unwrap()).await.unwrap();
        resource.update_metadata("1a", "klasa", 1);

        resource.update_indexes(vec![2, 3, 4]);
        let report = resource.refresh_observers().await;
        assert_eq!(report, RefreshReport { added: 1, removed: 1 });
        assert_eq!(live(&resource), vec![2, 3, 4]);
        assert!(store.is_empty());
        assert!(resource.designators().is_empty());

        // repeat passes are no-ops
        let report = resource.refresh_observers().await;
        assert_eq!(report, RefreshReport::default());
        assert_eq!(live(&resource), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_refresh_keeps_existing_observers() {
        let (resource, _rx, _, _) = resource(Vec::new());
        resource.update_indexes(vec![1]);
        resource.refresh_observers().await;
        let before = resource.hub().get_observer(1).unwrap();

        resource.update_indexes(vec![1, 2]);
        resource.refresh_observers().await;
        let after = resource.hub().get_observer(1).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_scrape_indexes_from_list() {
        let (resource, _rx, fetcher, _) = resource(Vec::new());
        fetcher.set(
            "http://plan.test/lista.html",
            r#"<table><tr><td><a href="plany/o2.html">2a</a><a href="plany/n9.html">Kw</a><a href="plany/o1.html">1a</a></td></tr></table>"#,
        );
        assert_eq!(resource.scrape_indexes().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_running_resource_mirrors_and_notifies() {
        let (resource, mut rx, fetcher, store) = resource(Vec::new());
        fetcher.set(
            "http://plan.test/lista.html",
            r#"<table><tr><td><a href="plany/o1.html">1a</a></td><td><a href="plany/o2.html">2a</a></td></tr></table>"#,
        );
        fetcher.set("http://plan.test/plany/o1.html", &item_page("1a", "mat"));
        fetcher.set("http://plan.test/plany/o2.html", &item_page("2a", "fiz"));

        resource.start().await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while store.len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(store.keys(), vec!["division:1", "division:2"]);
        // first observations are not announced
        assert!(rx.try_recv().is_err());

        fetcher.set("http://plan.test/plany/o1.html", &item_page("1a", "chem"));
        let index = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(index, Some(1));
        assert_eq!(resource.designators()["1a"], vec![1]);
        assert_eq!(resource.designators()["2a"], vec![2]);

        let stored = store.load(ResourceKind::Division, 1).await.unwrap().unwrap();
        let lesson = &stored.schedule().schedule_days[0].lesson_groups[0].lessons[0];
        assert_eq!(lesson.full_name, "chem");

        resource.stop().await;
    }

    #[tokio::test]
    async fn test_inflight_scrape_of_removed_index_is_discarded() {
        let (resource, mut rx, fetcher, store) = resource(Vec::new());
        fetcher.set("http://plan.test/plany/o1.html", &item_page("1a", "mat"));
        resource.update_indexes(vec![1]);
        resource.refresh_observers().await;
        let observer = resource.hub().get_observer(1).unwrap();

        fetcher.set_delay(Duration::from_millis(300));
        let callback = tokio::spawn(Arc::clone(&observer).notify(Change { first_run: false }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        resource.update_indexes(Vec::new());
        let report = resource.refresh_observers().await;
        assert_eq!(report, RefreshReport { added: 0, removed: 1 });
        callback.await.unwrap();

        assert!(live(&resource).is_empty());
        assert!(store.is_empty());
        assert!(resource.designators().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_first_run_comes_from_the_detected_change() {
        let (resource, mut rx, fetcher, store) = resource(Vec::new());
        fetcher.set("http://plan.test/plany/o1.html", &item_page("1a", "mat"));
        resource.update_indexes(vec![1]);
        resource.refresh_observers().await;
        let observer = resource.hub().get_observer(1).unwrap();

        let change = observer.check_changed(fetcher.as_ref()).await.unwrap();
        assert!(change.first_run);

        fetcher.set_delay(Duration::from_millis(200));
        let callback = tokio::spawn(Arc::clone(&observer).notify(change));
        // a later poll records new content while the callback is still fetching
        fetcher.set("http://plan.test/plany/o1.html", &item_page("1a", "chem"));
        assert!(observer.record(fingerprint("newer")).is_some());
        assert!(!observer.is_first_run());
        callback.await.unwrap();

        assert_eq!(store.keys(), vec!["division:1"]);
        // the first observation stays silent
        assert!(rx.try_recv().is_err());

        fetcher.set_delay(Duration::ZERO);
        Arc::clone(&observer).notify(Change { first_run: false }).await;
        assert_eq!(rx.try_recv().ok(), Some(1));
    }
}
