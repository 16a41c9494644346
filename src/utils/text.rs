// src/utils/text.rs

//! Text and selector helpers shared by the extractors.

use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};

/// Placeholder substituted with the resource index in endpoint templates.
pub const INDEX_PLACEHOLDER: &str = "%d";

/// Substitute `index` into an endpoint template.
pub fn expand_index(template: &str, index: i64) -> String {
    template.replace(INDEX_PLACEHOLDER, &index.to_string())
}

/// True when the text holds nothing but whitespace or non-breaking spaces.
pub fn is_empty_or_invisible(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{a0}')
}

/// Collapse runs of whitespace (including `&nbsp;`) into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concatenated text content of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

/// Parse a CSS selector, mapping failures into [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
