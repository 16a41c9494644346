// src/services/timetable.rs

//! Timetable grid extraction.
//!
//! The page markup carries no explicit day or column metadata, so the grid
//! layout is inferred from cell counts: the `td.nr` column numbers the rows,
//! column 2 holds the slot's time range and every `td.l` cell after the
//! schedule start column belongs to one work day.

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::{AppError, Result};
use crate::models::{Lesson, LessonGroup, Schedule, TimeRange, Timestamp};
use crate::utils::text::{
    element_text, is_empty_or_invisible, normalize_whitespace, parse_selector,
};

const TABLE_ROW: &str = "table.tabela tr";
const TABLE_CELL: &str = "table.tabela > tbody > tr > td";
const ROW_NUMBER_CELL: &str = "table.tabela td.nr";
const LESSON_CELL: &str = "table.tabela td.l";

const SUBJECT: &str = "span.p";
const TEACHER: &str = "a.n";
const ROOM: &str = "a.s";
const DIVISION: &str = "a.o";
const NESTED_SUBJECT: &str = "span > span.p";

const TIME_COLUMN: usize = 2;
const TIME_RANGE_PATTERN: &str = r"(\d{1,2})\s*:\s*(\d{2})\s*-\s*(\d{1,2})\s*:\s*(\d{2})";
const LINE_BREAK_PATTERN: &str = r"(?i)<br\s*/?>";

/// Grid shape inferred from cell counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridLayout {
    columns: usize,
    start_column: usize,
    work_days: usize,
}

impl GridLayout {
    fn infer(document: &Html) -> Result<Self> {
        let rows = parse_selector(TABLE_ROW)?;
        let columns = document
            .select(&rows)
            .next()
            .map(|row| row.children().filter_map(ElementRef::wrap).count())
            .ok_or_else(|| AppError::parse("timetable", "no table rows found"))?;

        let numbered_rows = document.select(&parse_selector(ROW_NUMBER_CELL)?).count();
        if numbered_rows == 0 {
            return Err(AppError::parse("timetable", "no rows found"));
        }
        let lesson_cells = document.select(&parse_selector(LESSON_CELL)?).count();

        // Assumes every work day contributes one lesson column per row; a
        // table with merged or irregular cells yields a wrong day count.
        let per_row = lesson_cells / numbered_rows;
        let start_column = columns.checked_sub(per_row).ok_or_else(|| {
            AppError::parse(
                "timetable",
                format!("{lesson_cells} lesson cells do not fit {columns} columns"),
            )
        })?;
        let work_days = columns - start_column;
        if work_days == 0 {
            return Err(AppError::parse("timetable", "no work days found"));
        }

        Ok(Self {
            columns,
            start_column,
            work_days,
        })
    }
}

/// Extract the week grid of a timetable page.
pub fn scrape_schedule(document: &Html) -> Result<Schedule> {
    let layout = GridLayout::infer(document)?;
    let time_pattern = compile(TIME_RANGE_PATTERN)?;
    let line_break = compile(LINE_BREAK_PATTERN)?;
    let cells = parse_selector(TABLE_CELL)?;

    let mut schedule = Schedule::with_days(layout.work_days);
    let mut column = 0;
    let mut day = 0;
    let mut time_range = None;

    for cell in document.select(&cells) {
        column = if column < layout.columns { column + 1 } else { 1 };

        // An unreadable label keeps the previous slot's range.
        if column == TIME_COLUMN {
            if let Some(range) = find_time_range(&time_pattern, &element_text(&cell)) {
                time_range = Some(range);
            }
        }
        if column <= layout.start_column {
            continue;
        }

        day = if day < layout.work_days { day + 1 } else { 1 };

        let mut lessons = parse_lessons(&line_break, cell)?;
        if lessons.is_empty() {
            continue;
        }
        for lesson in &mut lessons {
            lesson.time_range = time_range;
        }
        schedule.schedule_days[day - 1]
            .lesson_groups
            .push(LessonGroup { lessons });
    }

    Ok(schedule)
}

/// Parse an `H:MM-H:MM` label, skipping any leading row label.
pub fn parse_time_range(text: &str) -> Result<TimeRange> {
    let pattern = compile(TIME_RANGE_PATTERN)?;
    find_time_range(&pattern, text)
        .ok_or_else(|| AppError::parse("time range", format!("invalid label '{}'", text.trim())))
}

fn find_time_range(pattern: &Regex, text: &str) -> Option<TimeRange> {
    let caps = pattern.captures(text)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
    Some(TimeRange {
        start: Timestamp::new(number(1)?, number(2)?)?,
        end: Timestamp::new(number(3)?, number(4)?)?,
    })
}

/// Split one grid cell into its parallel lessons.
///
/// Lessons are separated by `<br>`; a cell without line breaks that still
/// nests several subject spans is split along those spans instead.
fn parse_lessons(line_break: &Regex, cell: ElementRef<'_>) -> Result<Vec<Lesson>> {
    if is_empty_or_invisible(&element_text(&cell)) {
        return Ok(Vec::new());
    }

    let inner = cell.inner_html();
    let segments: Vec<&str> = line_break.split(&inner).collect();
    if segments.len() == 1 {
        let nested = parse_selector(NESTED_SUBJECT)?;
        let groups: Vec<ElementRef<'_>> = cell
            .select(&nested)
            .filter_map(|subject| subject.parent().and_then(ElementRef::wrap))
            .collect();
        if groups.len() > 1 {
            return groups.into_iter().map(parse_lesson).collect();
        }
        return Ok(vec![parse_lesson(cell)?]);
    }

    let mut lessons = Vec::with_capacity(segments.len());
    for segment in segments {
        let fragment = Html::parse_fragment(segment);
        let root = fragment.root_element();
        if is_empty_or_invisible(&element_text(&root)) {
            continue;
        }
        lessons.push(parse_lesson(root)?);
    }
    Ok(lessons)
}

fn parse_lesson(element: ElementRef<'_>) -> Result<Lesson> {
    let first = |selector: &str| -> Result<String> {
        let selector = parse_selector(selector)?;
        Ok(element
            .select(&selector)
            .next()
            .map(|found| normalize_whitespace(&element_text(&found)))
            .unwrap_or_default())
    };

    let mut full_name = first(SUBJECT)?;
    if full_name.is_empty() {
        full_name = normalize_whitespace(&element_text(&element));
    }

    Ok(Lesson {
        full_name,
        teacher_designator: first(TEACHER)?,
        division_designator: first(DIVISION)?,
        room_designator: first(ROOM)?,
        time_range: None,
    })
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::parse("pattern", e))
}
