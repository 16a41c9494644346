// src/models/kind.rs

//! Resource classes mirrored from the timetable site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One class of timetable documents.
///
/// Parsing and fingerprinting behaviour for each class lives in
/// `services::kind`; this type only carries identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Division,
    Teacher,
    Room,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Division,
        ResourceKind::Teacher,
        ResourceKind::Room,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Division => "division",
            ResourceKind::Teacher => "teacher",
            ResourceKind::Room => "room",
        }
    }

    /// Persistence key for an entity of this kind.
    pub fn store_key(&self, index: i64) -> String {
        format!("{}:{}", self.as_str(), index)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "division" | "divisions" => Ok(ResourceKind::Division),
            "teacher" | "teachers" => Ok(ResourceKind::Teacher),
            "room" | "rooms" => Ok(ResourceKind::Room),
            other => Err(AppError::validation(format!(
                "unknown resource kind '{other}'"
            ))),
        }
    }
}
