// src/services/titles.rs

//! Page heading extraction and per-kind splitting into designator and name.

use scraper::Html;

use crate::error::{AppError, Result};
use crate::utils::text::{element_text, normalize_whitespace, parse_selector};

const TITLE_SELECTOR: &str = "span.tytulnapis";

/// Printed heading of a timetable page.
pub fn scrape_title(document: &Html) -> Result<String> {
    let selector = parse_selector(TITLE_SELECTOR)?;
    document
        .select(&selector)
        .next()
        .map(|title| normalize_whitespace(&element_text(&title)))
        .ok_or_else(|| AppError::parse("title", "no title found"))
}

/// `"1TI technik-informatyk"` → `("1TI", "technik-informatyk")`.
pub fn split_division_title(title: &str) -> (String, String) {
    let mut parts = title.split_whitespace();
    let designator = parts.next().unwrap_or_default().to_string();
    let full_name = parts.collect::<Vec<_>>().join(" ");
    (designator, full_name)
}

/// `"J.Kowalski (Kw)"` → `("Kw", "J.Kowalski")`.
///
/// The trailing parenthesized group is the designator; without one the
/// second whitespace token is used.
pub fn split_teacher_title(title: &str) -> (String, String) {
    let title = title.trim();
    if title.ends_with(')') {
        if let Some(open) = title.rfind('(') {
            let designator = title[open + 1..title.len() - 1].trim().to_string();
            let full_name = title[..open].trim().to_string();
            if !designator.is_empty() {
                return (designator, full_name);
            }
        }
    }

    let mut parts = title.split_whitespace();
    let full_name = parts.next().unwrap_or_default().to_string();
    let designator = parts
        .next()
        .map(|raw| raw.trim_matches(|c| c == '(' || c == ')').to_string())
        .unwrap_or_default();
    (designator, full_name)
}

/// `"12 Pracownia chemiczna"` → `("12", "Pracownia chemiczna")`; a bare
/// designator doubles as the name.
pub fn split_room_title(title: &str) -> (String, String) {
    let title = title.trim();
    let (designator, rest) = match title.split_once(char::is_whitespace) {
        Some((designator, rest)) => (designator, rest.trim()),
        None => (title, ""),
    };
    let full_name = if rest.is_empty() { designator } else { rest };
    (designator.to_string(), full_name.to_string())
}

/// Designator and full name of a division page.
pub fn scrape_division_title(document: &Html) -> Result<(String, String)> {
    Ok(split_division_title(&scrape_title(document)?))
}

/// Designator and full name of a teacher page.
pub fn scrape_teacher_title(document: &Html) -> Result<(String, String)> {
    Ok(split_teacher_title(&scrape_title(document)?))
}

/// Designator and full name of a room page.
pub fn scrape_room_title(document: &Html) -> Result<(String, String)> {
    Ok(split_room_title(&scrape_title(document)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_scrape_title() {
        let doc = Html::parse_document(
            r#"<html><body><span class="tytulnapis">  1TI&nbsp;informatyk </span></body></html>"#,
        );
        assert_eq!(scrape_title(&doc).unwrap(), "1TI informatyk");
    }

    #[test]
    fn test_scrape_title_missing() {
        let doc = Html::parse_document("<html><body><p>nothing</p></body></html>");
        assert!(matches!(scrape_title(&doc), Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_split_division_title() {
        assert_eq!(split_division_title("1TI technik-informatyk"), pair("1TI", "technik-informatyk"));
        assert_eq!(split_division_title("2a"), pair("2a", ""));
    }

    #[test]
    fn test_split_teacher_title() {
        assert_eq!(split_teacher_title("J.Kowalski (Kw)"), pair("Kw", "J.Kowalski"));
        assert_eq!(split_teacher_title("Jan Kowalski (JK)"), pair("JK", "Jan Kowalski"));
        assert_eq!(split_teacher_title("A.Nowak Nw"), pair("Nw", "A.Nowak"));
        assert_eq!(split_teacher_title("A.Nowak"), pair("", "A.Nowak"));
    }

    #[test]
    fn test_split_room_title() {
        assert_eq!(split_room_title("12 Pracownia chemiczna"), pair("12", "Pracownia chemiczna"));
        assert_eq!(split_room_title("sg"), pair("sg", "sg"));
    }
}
