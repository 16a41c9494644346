// src/watch/observer.rs

//! A single polled document and its content fingerprint.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::error::Result;
use crate::utils::http::DocumentFetcher;

/// Index reserved for the observer watching a resource class's index page.
pub const LIST_OBSERVER_INDEX: i64 = 0;

/// Resource-specific behaviour plugged into an [`Observer`].
#[async_trait]
pub trait ObserverHandler: Send + Sync {
    /// Canonical text projection of a document; its digest is the fingerprint.
    fn extract(&self, document: &Html) -> Result<String>;

    /// Called on a detached task whenever the fingerprint changed.
    async fn on_change(&self, observer: Arc<Observer>, change: Change);
}

/// A detected fingerprint change, captured when it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// No fingerprint was stored before this one
    pub first_run: bool,
}

/// Hex-encoded SHA-256 of the extracted projection.
pub fn fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

struct ObserverState {
    hash: String,
    next_run: Instant,
    first_run: bool,
    queued: bool,
}

impl ObserverState {
    fn fresh() -> Self {
        Self {
            hash: String::new(),
            next_run: Instant::now(),
            first_run: true,
            queued: false,
        }
    }
}

/// Point-in-time copy of an observer's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverSnapshot {
    pub index: i64,
    pub url: String,
    pub interval: Duration,
    pub hash: Option<String>,
    pub first_run: bool,
}

/// Polls one remote document and reports content changes.
pub struct Observer {
    index: i64,
    url: String,
    interval: Duration,
    handler: Arc<dyn ObserverHandler>,
    state: Mutex<ObserverState>,
}

impl Observer {
    /// Create an observer that is due immediately.
    pub fn new(
        index: i64,
        url: impl Into<String>,
        interval: Duration,
        handler: Arc<dyn ObserverHandler>,
    ) -> Self {
        Self {
            index,
            url: url.into(),
            interval,
            handler,
            state: Mutex::new(ObserverState::fresh()),
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_list_observer(&self) -> bool {
        self.index == LIST_OBSERVER_INDEX
    }

    fn state(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fingerprint of the last successful fetch, `None` if never observed.
    pub fn hash(&self) -> Option<String> {
        let state = self.state();
        (!state.hash.is_empty()).then(|| state.hash.clone())
    }

    /// Whether the latest detected change was the first observation.
    pub fn is_first_run(&self) -> bool {
        self.state().first_run
    }

    pub fn next_run(&self) -> Instant {
        self.state().next_run
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        let state = self.state();
        ObserverSnapshot {
            index: self.index,
            url: self.url.clone(),
            interval: self.interval,
            hash: (!state.hash.is_empty()).then(|| state.hash.clone()),
            first_run: state.first_run,
        }
    }

    /// Forget everything observed so far.
    pub fn reset(&self) {
        *self.state() = ObserverState::fresh();
    }

    /// Reserve the observer for dispatch if it is due and not already queued.
    pub(crate) fn claim_if_due(&self, now: Instant) -> bool {
        let mut state = self.state();
        if state.queued || state.next_run > now {
            return false;
        }
        state.next_run = now + self.interval;
        state.queued = true;
        true
    }

    /// Mark the observer as no longer sitting in a task queue.
    pub(crate) fn release(&self) {
        self.state().queued = false;
    }

    /// Fetch the document and compare its fingerprint with the stored one.
    ///
    /// Fetch and extraction failures are logged and reported as unchanged.
    pub async fn check_changed(&self, fetcher: &dyn DocumentFetcher) -> Option<Change> {
        let body = match fetcher.fetch(&self.url).await {
            Ok(body) => body,
            Err(error) => {
                log::warn!("Observer {} ({}): fetch failed: {}", self.index, self.url, error);
                return None;
            }
        };

        let content = {
            let document = Html::parse_document(&body);
            match self.handler.extract(&document) {
                Ok(content) => content,
                Err(error) => {
                    log::warn!(
                        "Observer {} ({}): extraction failed: {}",
                        self.index,
                        self.url,
                        error
                    );
                    return None;
                }
            }
        };

        self.record(fingerprint(&content))
    }

    /// Store `digest` if it differs from the current fingerprint.
    pub(crate) fn record(&self, digest: String) -> Option<Change> {
        let mut state = self.state();
        if state.hash == digest {
            return None;
        }
        state.first_run = state.hash.is_empty();
        state.hash = digest;
        Some(Change {
            first_run: state.first_run,
        })
    }

    /// Run the change handler for this observer.
    pub async fn notify(self: Arc<Self>, change: Change) {
        let handler = Arc::clone(&self.handler);
        handler.on_change(self, change).await;
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("index", &self.index)
            .field("url", &self.url)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
