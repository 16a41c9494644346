// src/services/index.rs

//! Resource index discovery from the list page.

use std::collections::BTreeSet;

use regex::Regex;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::utils::text::{INDEX_PLACEHOLDER, parse_selector};

/// Build a pattern matching hrefs that point at pages of `template`.
///
/// Only the last path segment of the template is significant, so relative
/// links such as `plany/o12.html` and `o12.html` both match `/plany/o%d.html`.
pub fn index_pattern(template: &str) -> Result<Regex> {
    let file = template.rsplit('/').next().unwrap_or(template);
    let (prefix, suffix) = file.split_once(INDEX_PLACEHOLDER).ok_or_else(|| {
        AppError::validation(format!("template '{template}' has no {INDEX_PLACEHOLDER}"))
    })?;
    let pattern = format!(
        r"(?:^|/){}(\d+){}(?:[?#].*)?$",
        regex::escape(prefix),
        regex::escape(suffix)
    );
    Regex::new(&pattern).map_err(|e| AppError::parse("index pattern", e))
}

/// Collect the sorted, de-duplicated indices linked from a list page.
///
/// `link_selector` picks the anchors to inspect; non-positive indices are
/// dropped since index 0 belongs to the list page itself.
pub fn scrape_indexes(document: &Html, template: &str, link_selector: &str) -> Result<Vec<i64>> {
    let pattern = index_pattern(template)?;
    let links = parse_selector(link_selector)?;

    let indexes: BTreeSet<i64> = document
        .select(&links)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| pattern.captures(href.trim()))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .filter(|index| *index > 0)
        .collect();

    Ok(indexes.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"<html><body>
        <table>
          <tr><td><a href="plany/o3.html" target="plan">1TI</a></td></tr>
          <tr><td><a href="plany/o1.html" target="plan">1a</a></td></tr>
          <tr><td><a href="plany/o3.html">1TI again</a></td></tr>
          <tr><td><a href="plany/n7.html">Kw</a></td></tr>
          <tr><td><a href="plany/o0.html">bogus</a></td></tr>
          <tr><td><a href="plany/oo2.html">bogus</a></td></tr>
        </table>
        <a href="plany/s4.html">sala 4</a>
        <a href="http://plan.test/plany/s11.html?x=1">sala 11</a>
        </body></html>"#;

    #[test]
    fn test_scrape_division_indexes() {
        let doc = Html::parse_document(LIST);
        let indexes = scrape_indexes(&doc, "/plany/o%d.html", "table a").unwrap();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[test]
    fn test_scrape_teacher_indexes() {
        let doc = Html::parse_document(LIST);
        let indexes = scrape_indexes(&doc, "/plany/n%d.html", "table a").unwrap();
        assert_eq!(indexes, vec![7]);
    }

    #[test]
    fn test_scrape_room_indexes_outside_table() {
        let doc = Html::parse_document(LIST);
        assert_eq!(
            scrape_indexes(&doc, "/plany/s%d.html", "a").unwrap(),
            vec![4, 11]
        );
        assert!(scrape_indexes(&doc, "/plany/s%d.html", "table a")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_template_without_placeholder() {
        assert!(matches!(
            index_pattern("/plany/lista.html"),
            Err(AppError::Validation(_))
        ));
    }
}
