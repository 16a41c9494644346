// src/services/kind.rs

//! Per-kind extraction and persistence behaviour.

use scraper::Html;

use crate::error::Result;
use crate::models::{Division, Entity, Lesson, ResourceKind, Room, Schedule, Teacher};
use crate::services::timetable::scrape_schedule;
use crate::services::titles::{
    scrape_division_title, scrape_room_title, scrape_teacher_title, scrape_title,
};
use crate::storage::ScheduleStore;
use crate::utils::text::{element_text, parse_selector};

impl ResourceKind {
    /// Canonical projection of an item page used for change detection.
    pub fn extract(&self, document: &Html) -> Result<String> {
        let mut parts = match self {
            ResourceKind::Division => {
                let mut parts = texts(document, "table.tabela td, table.tabela th")?;
                parts.extend(hrefs(document, "table.tabela a")?);
                parts
            }
            ResourceKind::Teacher => texts(document, "table td, table th")?,
            ResourceKind::Room => hrefs(document, "a")?,
        };
        parts.push(scrape_title(document).unwrap_or_default());
        Ok(parts.join(" "))
    }

    /// Anchors on the list page that point at this kind's item pages.
    pub fn list_link_selector(&self) -> &'static str {
        match self {
            ResourceKind::Division | ResourceKind::Teacher => "table a",
            ResourceKind::Room => "a",
        }
    }

    /// Canonical projection of the list page used for change detection.
    pub fn list_extract(&self, document: &Html) -> Result<String> {
        Ok(hrefs(document, self.list_link_selector())?.join(" "))
    }

    /// Parse an item page into an entity of this kind.
    pub fn scrape_document(&self, index: i64, document: &Html) -> Result<Entity> {
        let mut schedule = scrape_schedule(document)?;

        let entity = match self {
            ResourceKind::Division => {
                let (designator, full_name) = scrape_division_title(document)?;
                fill_owner(&mut schedule, |lesson| &mut lesson.division_designator, &designator);
                Entity::Division(Division {
                    index,
                    designator,
                    full_name,
                    schedule,
                })
            }
            ResourceKind::Teacher => {
                let (designator, full_name) = scrape_teacher_title(document)?;
                fill_owner(&mut schedule, |lesson| &mut lesson.teacher_designator, &designator);
                Entity::Teacher(Teacher {
                    index,
                    designator,
                    full_name,
                    schedule,
                })
            }
            ResourceKind::Room => {
                let (designator, full_name) = scrape_room_title(document)?;
                fill_owner(&mut schedule, |lesson| &mut lesson.room_designator, &designator);
                Entity::Room(Room {
                    index,
                    designator,
                    full_name,
                    schedule,
                })
            }
        };
        Ok(entity)
    }

    /// Delete the persisted entity of this kind.
    pub async fn remove_from_store(&self, store: &dyn ScheduleStore, index: i64) -> Result<()> {
        store.delete(*self, index).await
    }
}

/// Owner pages omit their own designator from every lesson.
fn fill_owner(
    schedule: &mut Schedule,
    field: impl Fn(&mut Lesson) -> &mut String,
    designator: &str,
) {
    for lesson in schedule.lessons_mut() {
        let value = field(lesson);
        if value.is_empty() {
            *value = designator.to_string();
        }
    }
}

fn texts(document: &Html, selector: &str) -> Result<Vec<String>> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .map(|element| element_text(&element))
        .collect())
}

fn hrefs(document: &Html, selector: &str) -> Result<Vec<String>> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect())
}
