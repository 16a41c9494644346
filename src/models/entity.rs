// src/models/entity.rs

//! Persisted timetable owners: divisions, teachers and rooms.

use serde::{Deserialize, Serialize};

use crate::models::{ResourceKind, Schedule};

/// A class/division timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    pub index: i64,
    pub designator: String,
    pub full_name: String,
    pub schedule: Schedule,
}

/// A teacher timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub index: i64,
    pub designator: String,
    pub full_name: String,
    pub schedule: Schedule,
}

/// A room timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub index: i64,
    pub designator: String,
    pub full_name: String,
    pub schedule: Schedule,
}

/// Any of the three timetable owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Division(Division),
    Teacher(Teacher),
    Room(Room),
}

impl Entity {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Entity::Division(_) => ResourceKind::Division,
            Entity::Teacher(_) => ResourceKind::Teacher,
            Entity::Room(_) => ResourceKind::Room,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            Entity::Division(d) => d.index,
            Entity::Teacher(t) => t.index,
            Entity::Room(r) => r.index,
        }
    }

    pub fn designator(&self) -> &str {
        match self {
            Entity::Division(d) => &d.designator,
            Entity::Teacher(t) => &t.designator,
            Entity::Room(r) => &r.designator,
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            Entity::Division(d) => &d.full_name,
            Entity::Teacher(t) => &t.full_name,
            Entity::Room(r) => &r.full_name,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        match self {
            Entity::Division(d) => &d.schedule,
            Entity::Teacher(t) => &t.schedule,
            Entity::Room(r) => &r.schedule,
        }
    }

    /// Persistence key, `"<type>:<index>"`.
    pub fn store_key(&self) -> String {
        self.kind().store_key(self.index())
    }
}
