//! Utility functions and helpers.

pub mod http;
pub mod text;

/// Join the site root and an endpoint path.
///
/// Endpoints are written relative to the site root, with or without a
/// leading slash.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = endpoint.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Full URL of a single resource page.
pub fn item_url(base_url: &str, template: &str, index: i64) -> String {
    endpoint_url(base_url, &text::expand_index(template, index))
}
