// src/lib.rs

//! Timetable Mirror Library
//!
//! Polls an Optivum-style timetable site, detects page changes by content
//! fingerprint and mirrors divisions, teachers and rooms into a local store.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
pub mod watch;
