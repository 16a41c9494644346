//! Polling and change detection.
//!
//! - `Observer`: one remote document, its fingerprint and schedule
//! - `Hub`: scheduler plus worker pool driving a set of observers

pub mod hub;
pub mod observer;

pub use hub::{DispatchReport, Hub, HubConfig, HubState};
pub use observer::{Change, LIST_OBSERVER_INDEX, Observer, ObserverHandler, ObserverSnapshot, fingerprint};
