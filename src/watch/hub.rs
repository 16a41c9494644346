// src/watch/hub.rs

//! Worker pool plus cooperative scheduler driving a set of observers.
//!
//! The scheduler wakes on a fixed tick, reserves every due observer and
//! pushes it onto a bounded task queue. Workers pull observers off the
//! queue, run the fingerprint check and hand changed observers to their
//! handler on a detached task. A full queue never stalls the scheduler:
//! each push waits at most `enqueue_timeout`, after which that observer's
//! tick is dropped and logged.

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{HubSettings, ResourceKind};
use crate::utils::http::DocumentFetcher;
use crate::watch::observer::{LIST_OBSERVER_INDEX, Observer};

/// Sizing and timing of a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Capacity of the task queue
    pub queue_capacity: usize,
    /// Scheduler tick
    pub tick: Duration,
    /// Longest wait for queue space before a tick is dropped
    pub enqueue_timeout: Duration,
}

impl HubConfig {
    /// Hub configuration for one resource class.
    pub fn for_kind(settings: &HubSettings, kind: ResourceKind) -> Self {
        Self {
            workers: settings.workers(kind),
            queue_capacity: settings.queue_capacity,
            tick: Duration::from_millis(settings.tick_ms),
            enqueue_timeout: Duration::from_secs(settings.enqueue_timeout_secs),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1000,
            tick: Duration::from_secs(1),
            enqueue_timeout: Duration::from_secs(10),
        }
    }
}

/// Lifecycle of a hub. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Created,
    Running,
    Stopped,
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Observers pushed onto the task queue
    pub queued: usize,
    /// Observers whose tick was dropped on a full queue
    pub dropped: usize,
}

struct HubInner {
    name: String,
    config: HubConfig,
    observers: RwLock<HashMap<i64, Arc<Observer>>>,
    tasks_tx: mpsc::Sender<Arc<Observer>>,
    tasks_rx: tokio::sync::Mutex<mpsc::Receiver<Arc<Observer>>>,
    fetcher: Arc<dyn DocumentFetcher>,
    quit_tx: watch::Sender<bool>,
}

/// Owns a set of observers and polls them on their own schedules.
pub struct Hub {
    inner: Arc<HubInner>,
    state: Mutex<HubState>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Hub {
    /// Create a hub; nothing runs until [`Hub::start`].
    pub fn new(
        name: impl Into<String>,
        config: HubConfig,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        let (tasks_tx, tasks_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (quit_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(HubInner {
                name: name.into(),
                config,
                observers: RwLock::new(HashMap::new()),
                tasks_tx,
                tasks_rx: tokio::sync::Mutex::new(tasks_rx),
                fetcher,
                quit_tx,
            }),
            state: Mutex::new(HubState::Created),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> HubState {
        *lock(&self.state)
    }

    /// Spawn the workers and the scheduler. Only valid once.
    pub fn start(&self) {
        let mut state = lock(&self.state);
        if *state != HubState::Created {
            log::warn!("Hub {}: start ignored in state {:?}", self.inner.name, *state);
            return;
        }

        let mut handles = lock(&self.handles);
        for id in 0..self.inner.config.workers {
            handles.push(tokio::spawn(worker(Arc::clone(&self.inner), id)));
        }
        handles.push(tokio::spawn(scheduler(Arc::clone(&self.inner))));
        *state = HubState::Running;

        log::info!(
            "Hub {} started with {} worker(s)",
            self.inner.name,
            self.inner.config.workers
        );
    }

    /// Signal shutdown and wait for workers and scheduler to exit.
    ///
    /// In-flight fetches finish; detached change handlers are not awaited.
    pub async fn stop(&self) {
        let handles = {
            let mut state = lock(&self.state);
            if *state == HubState::Stopped {
                return;
            }
            *state = HubState::Stopped;
            mem::take(&mut *lock(&self.handles))
        };

        self.inner.quit_tx.send_replace(true);
        for handle in handles {
            if let Err(error) = handle.await {
                log::error!("Hub {}: task ended abnormally: {}", self.inner.name, error);
            }
        }
        log::info!("Hub {} stopped", self.inner.name);
    }

    /// Register an observer. Duplicate indices are rejected.
    pub fn add_observer(&self, observer: Arc<Observer>) -> bool {
        let mut observers = self.write_observers();
        let index = observer.index();
        if observers.contains_key(&index) {
            log::warn!("Hub {}: observer {} already exists", self.inner.name, index);
            return false;
        }
        observer.reset();
        observers.insert(index, observer);
        log::debug!("Hub {}: added observer {}", self.inner.name, index);
        true
    }

    /// Unregister an observer and clear its fingerprint.
    pub fn remove_observer(&self, index: i64) -> Option<Arc<Observer>> {
        let removed = self.write_observers().remove(&index);
        match &removed {
            Some(observer) => {
                observer.reset();
                log::debug!("Hub {}: removed observer {}", self.inner.name, index);
            }
            None => log::debug!(
                "Hub {}: observer {} does not exist",
                self.inner.name,
                index
            ),
        }
        removed
    }

    pub fn get_observer(&self, index: i64) -> Option<Arc<Observer>> {
        self.read_observers().get(&index).cloned()
    }

    /// New map of the registered observers, optionally without the list observer.
    ///
    /// The values are shared handles to the live observers, not snapshots.
    pub fn get_all_observers(&self, exclude_list_observer: bool) -> BTreeMap<i64, Arc<Observer>> {
        self.read_observers()
            .iter()
            .filter(|(index, _)| !(exclude_list_observer && **index == LIST_OBSERVER_INDEX))
            .map(|(index, observer)| (*index, Arc::clone(observer)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_observers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_observers().is_empty()
    }

    /// Run one scheduler pass as of `now`.
    pub async fn dispatch_due(&self, now: Instant) -> DispatchReport {
        self.inner.dispatch_due(now).await
    }

    fn read_observers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<i64, Arc<Observer>>> {
        self.inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_observers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<i64, Arc<Observer>>> {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl HubInner {
    fn quitting(&self) -> bool {
        *self.quit_tx.borrow()
    }

    async fn dispatch_due(&self, now: Instant) -> DispatchReport {
        let due: Vec<Arc<Observer>> = {
            let observers = self
                .observers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            observers
                .values()
                .filter(|observer| observer.claim_if_due(now))
                .cloned()
                .collect()
        };

        let mut report = DispatchReport::default();
        for observer in due {
            if self.quitting() {
                observer.release();
                continue;
            }
            match self
                .tasks_tx
                .send_timeout(Arc::clone(&observer), self.config.enqueue_timeout)
                .await
            {
                Ok(()) => report.queued += 1,
                Err(SendTimeoutError::Timeout(observer)) => {
                    observer.release();
                    report.dropped += 1;
                    log::warn!(
                        "Hub {}: task queue full, dropped tick for {}",
                        self.name,
                        observer.url()
                    );
                }
                Err(SendTimeoutError::Closed(observer)) => {
                    observer.release();
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

async fn scheduler(inner: Arc<HubInner>) {
    let mut quit = inner.quit_tx.subscribe();
    let mut ticker = tokio::time::interval(inner.config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *quit.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = quit.changed() => {}
            _ = ticker.tick() => {
                let report = inner.dispatch_due(Instant::now()).await;
                if report.dropped > 0 {
                    log::warn!(
                        "Hub {}: {} tick(s) dropped, {} queued",
                        inner.name,
                        report.dropped,
                        report.queued
                    );
                }
            }
        }
    }
    log::debug!("Hub {}: scheduler stopped", inner.name);
}

async fn worker(inner: Arc<HubInner>, id: usize) {
    let mut quit = inner.quit_tx.subscribe();
    log::debug!("Hub {}: worker {} started", inner.name, id);

    loop {
        if *quit.borrow_and_update() {
            break;
        }
        let task = tokio::select! {
            biased;
            _ = quit.changed() => continue,
            task = async { inner.tasks_rx.lock().await.recv().await } => task,
        };
        let Some(observer) = task else {
            break;
        };

        observer.release();
        log::debug!("Hub {}: worker {} checking {}", inner.name, id, observer.url());
        if let Some(change) = observer.check_changed(inner.fetcher.as_ref()).await {
            // Detached: no ordering or completion guarantee relative to this loop.
            tokio::spawn(observer.notify(change));
        }
    }
    log::debug!("Hub {}: worker {} stopped", inner.name, id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::testing::StaticFetcher;
    use crate::watch::testing::CountingHandler;

    fn make_observer(index: i64, handler: &Arc<CountingHandler>) -> Arc<Observer> {
        Arc::new(Observer::new(
            index,
            format!("http://plan.test/{index}.html"),
            Duration::from_secs(3600),
            Arc::clone(handler) as _,
        ))
    }

    fn hub(config: HubConfig, fetcher: Arc<StaticFetcher>) -> Hub {
        Hub::new("test", config, fetcher)
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates() {
        let handler = CountingHandler::new();
        let hub = hub(HubConfig::default(), Arc::new(StaticFetcher::new()));

        assert!(hub.add_observer(make_observer(1, &handler)));
        assert!(!hub.add_observer(make_observer(1, &handler)));
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_clears_hash() {
        let handler = CountingHandler::new();
        let hub = hub(HubConfig::default(), Arc::new(StaticFetcher::new()));
        let observer = make_observer(3, &handler);
        hub.add_observer(Arc::clone(&observer));
        observer.record("abc".to_string());

        let removed = hub.remove_observer(3).unwrap();
        assert!(removed.hash().is_none());
        assert!(hub.get_observer(3).is_none());
        assert!(hub.remove_observer(3).is_none());
    }

    #[tokio::test]
    async fn test_get_all_observers_excludes_list_observer() {
        let handler = CountingHandler::new();
        let hub = hub(HubConfig::default(), Arc::new(StaticFetcher::new()));
        for index in [0, 1, 2] {
            hub.add_observer(make_observer(index, &handler));
        }

        let all = hub.get_all_observers(false);
        let items = hub.get_all_observers(true);
        assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(items.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        // the map is detached from later mutation, its values are not
        assert!(Arc::ptr_eq(&items[&1], &hub.get_observer(1).unwrap()));
        hub.remove_observer(2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_backpressure_does_not_block_scheduler() {
        let handler = CountingHandler::new();
        let config = HubConfig {
            workers: 0,
            queue_capacity: 1,
            tick: Duration::from_millis(10),
            enqueue_timeout: Duration::from_millis(50),
        };
        let hub = hub(config, Arc::new(StaticFetcher::new()));
        for index in 1..=4 {
            hub.add_observer(make_observer(index, &handler));
        }

        let started = std::time::Instant::now();
        let report = tokio::time::timeout(Duration::from_secs(2), hub.dispatch_due(Instant::now()))
            .await
            .expect("scheduler pass blocked on a full queue");

        assert_eq!(report.queued, 1);
        assert_eq!(report.dropped, 3);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_queued_observer_is_not_requeued() {
        let handler = CountingHandler::new();
        let config = HubConfig {
            workers: 0,
            ..HubConfig::default()
        };
        let hub = hub(config, Arc::new(StaticFetcher::new()));
        let observer = Arc::new(Observer::new(
            1,
            "http://plan.test/1.html",
            Duration::from_millis(1),
            Arc::clone(&handler) as _,
        ));
        hub.add_observer(observer);

        let now = Instant::now();
        assert_eq!(hub.dispatch_due(now).await.queued, 1);
        let later = now + Duration::from_secs(5);
        assert_eq!(hub.dispatch_due(later).await, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_running_hub_invokes_callback() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.set("http://plan.test/1.html", "<p>lesson</p>");
        let handler = CountingHandler::new();
        let config = HubConfig {
            workers: 2,
            queue_capacity: 8,
            tick: Duration::from_millis(10),
            enqueue_timeout: Duration::from_millis(100),
        };
        let hub = hub(config, Arc::clone(&fetcher));
        hub.add_observer(make_observer(1, &handler));

        hub.start();
        assert_eq!(hub.state(), HubState::Running);

        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("callback never ran");

        hub.stop().await;
        assert_eq!(hub.state(), HubState::Stopped);
        assert_eq!(handler.calls(), 1);
        assert_eq!(handler.first_runs(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_terminal() {
        let hub = hub(HubConfig::default(), Arc::new(StaticFetcher::new()));
        hub.stop().await;
        assert_eq!(hub.state(), HubState::Stopped);

        hub.start();
        assert_eq!(hub.state(), HubState::Stopped);
    }
}
