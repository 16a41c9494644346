// src/models/schedule.rs

//! Timetable data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wall-clock time of day, hour and minute only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub hour: u8,
    pub minute: u8,
}

impl Timestamp {
    /// Create a timestamp, rejecting values outside 0..=23 / 0..=59.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Start and end of a timetable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A single lesson as printed in one timetable cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Subject name
    pub full_name: String,

    /// Short code of the teaching teacher
    pub teacher_designator: String,

    /// Short code of the attending division
    pub division_designator: String,

    /// Short code of the room
    pub room_designator: String,

    /// Slot time; `None` when the row label could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

/// Parallel lessons occupying one slot on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonGroup {
    pub lessons: Vec<Lesson>,
}

/// All populated slots of one work day, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub lesson_groups: Vec<LessonGroup>,
}

/// Week timetable, Monday first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_days: Vec<ScheduleDay>,
}

impl Schedule {
    /// Create a schedule with `days` empty days.
    pub fn with_days(days: usize) -> Self {
        Self {
            schedule_days: vec![ScheduleDay::default(); days],
        }
    }

    /// Iterate over every lesson in the schedule.
    pub fn lessons_mut(&mut self) -> impl Iterator<Item = &mut Lesson> {
        self.schedule_days
            .iter_mut()
            .flat_map(|day| day.lesson_groups.iter_mut())
            .flat_map(|group| group.lessons.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_bounds() {
        assert!(Timestamp::new(23, 59).is_some());
        assert!(Timestamp::new(24, 0).is_none());
        assert!(Timestamp::new(8, 60).is_none());
    }

    #[test]
    fn test_time_range_display() {
        let range = TimeRange {
            start: Timestamp { hour: 8, minute: 0 },
            end: Timestamp { hour: 8, minute: 45 },
        };
        assert_eq!(range.to_string(), "08:00-08:45");
    }
}
