// src/models/mod.rs

//! Domain models for the timetable mirror.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod entity;
mod kind;
mod schedule;

// Re-export all public types
pub use config::{Config, EndpointsConfig, HubSettings, ScraperConfig, StaticIndices};
pub use entity::{Division, Entity, Room, Teacher};
pub use kind::ResourceKind;
pub use schedule::{Lesson, LessonGroup, Schedule, ScheduleDay, TimeRange, Timestamp};
