//! Service layer for the timetable mirror.
//!
//! This module contains the business logic for:
//! - Timetable grid extraction (`timetable`)
//! - Heading splitting (`titles`)
//! - List page scraping (`index`)
//! - Designator lookup (`DesignatorIndex`)
//! - Per-class reconciliation (`ScraperResource`)
//!
//! Per-kind extraction is implemented on `ResourceKind` in `kind`.

pub mod index;
mod kind;
pub mod metadata;
pub mod resource;
pub mod timetable;
pub mod titles;

pub use metadata::DesignatorIndex;
pub use resource::{RefreshReport, ResourceSettings, ScraperResource, polling_interval};
