//! Pipeline entry points for mirror operations.
//!
//! - `run_watch`: Poll every resource class until shutdown
//! - `run_sync`: Fetch everything once into the store

pub mod sync;
pub mod watch;

pub use sync::{SyncOutcome, run_sync};
pub use watch::{run_watch, watch_until};
