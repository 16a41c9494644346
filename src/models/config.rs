//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ResourceKind;
use crate::utils::text::INDEX_PLACEHOLDER;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream site and HTTP behaviour
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Index pages and per-resource URL templates
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Worker pools and scheduling
    #[serde(default)]
    pub hub: HubSettings,

    /// Indices observed regardless of what the index pages list
    #[serde(default)]
    pub static_indices: StaticIndices,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.scraper.base_url)
            .map_err(|e| AppError::config(format!("scraper.base_url: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::config(
                "scraper.base_url must be an http(s) URL",
            ));
        }
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::config("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::config("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.retry_attempts == 0 {
            return Err(AppError::config("scraper.retry_attempts must be > 0"));
        }
        for kind in ResourceKind::ALL {
            if !self.endpoints.item(kind).contains(INDEX_PLACEHOLDER) {
                return Err(AppError::config(format!(
                    "endpoints.{kind} must contain '{INDEX_PLACEHOLDER}'"
                )));
            }
            if self.endpoints.list(kind).trim().is_empty() {
                return Err(AppError::config(format!(
                    "list endpoint for {kind} is empty"
                )));
            }
            if self.hub.workers(kind) == 0 {
                return Err(AppError::config(format!(
                    "hub.{kind}_workers must be > 0"
                )));
            }
        }
        if self.hub.queue_capacity == 0 {
            return Err(AppError::config("hub.queue_capacity must be > 0"));
        }
        if self.hub.refresh_capacity == 0 {
            return Err(AppError::config("hub.refresh_capacity must be > 0"));
        }
        if self.hub.tick_ms == 0 {
            return Err(AppError::config("hub.tick_ms must be > 0"));
        }
        if self.hub.list_interval_secs == 0 {
            return Err(AppError::config("hub.list_interval_secs must be > 0"));
        }
        Ok(())
    }
}

/// Upstream site and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Root URL every endpoint is appended to
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-attempt request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per fetch before giving up
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between attempts in seconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,

    /// Accept invalid TLS certificates (self-hosted school servers)
    #[serde(default)]
    pub ignore_certificates: bool,
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_delay_secs: defaults::retry_delay(),
            ignore_certificates: false,
        }
    }
}

/// Endpoint paths relative to `scraper.base_url`.
///
/// Item templates carry a `%d` placeholder for the resource index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "defaults::list_endpoint")]
    pub divisions_list: String,
    #[serde(default = "defaults::list_endpoint")]
    pub teachers_list: String,
    #[serde(default = "defaults::list_endpoint")]
    pub rooms_list: String,
    #[serde(default = "defaults::division_endpoint")]
    pub division: String,
    #[serde(default = "defaults::teacher_endpoint")]
    pub teacher: String,
    #[serde(default = "defaults::room_endpoint")]
    pub room: String,
}

impl EndpointsConfig {
    /// Index page listing every resource of `kind`.
    pub fn list(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Division => &self.divisions_list,
            ResourceKind::Teacher => &self.teachers_list,
            ResourceKind::Room => &self.rooms_list,
        }
    }

    /// Per-resource template for `kind`.
    pub fn item(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Division => &self.division,
            ResourceKind::Teacher => &self.teacher,
            ResourceKind::Room => &self.room,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            divisions_list: defaults::list_endpoint(),
            teachers_list: defaults::list_endpoint(),
            rooms_list: defaults::list_endpoint(),
            division: defaults::division_endpoint(),
            teacher: defaults::teacher_endpoint(),
            room: defaults::room_endpoint(),
        }
    }
}

/// Worker pool and scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default = "defaults::division_workers")]
    pub division_workers: usize,
    #[serde(default = "defaults::teacher_workers")]
    pub teacher_workers: usize,
    #[serde(default = "defaults::room_workers")]
    pub room_workers: usize,

    /// Capacity of each hub's task queue
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    /// Scheduler tick in milliseconds
    #[serde(default = "defaults::tick_ms")]
    pub tick_ms: u64,

    /// How long the scheduler waits on a full queue before dropping a tick
    #[serde(default = "defaults::enqueue_timeout")]
    pub enqueue_timeout_secs: u64,

    /// Polling interval of the index pages
    #[serde(default = "defaults::list_interval")]
    pub list_interval_secs: u64,

    /// Constant part of the staggered per-resource interval
    #[serde(default = "defaults::base_interval")]
    pub base_interval_secs: u64,

    /// Capacity of each refresh notification channel
    #[serde(default = "defaults::refresh_capacity")]
    pub refresh_capacity: usize,

    /// How long a callback waits on a full refresh channel
    #[serde(default = "defaults::notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl HubSettings {
    /// Worker pool size for `kind`.
    pub fn workers(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Division => self.division_workers,
            ResourceKind::Teacher => self.teacher_workers,
            ResourceKind::Room => self.room_workers,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            division_workers: defaults::division_workers(),
            teacher_workers: defaults::teacher_workers(),
            room_workers: defaults::room_workers(),
            queue_capacity: defaults::queue_capacity(),
            tick_ms: defaults::tick_ms(),
            enqueue_timeout_secs: defaults::enqueue_timeout(),
            list_interval_secs: defaults::list_interval(),
            base_interval_secs: defaults::base_interval(),
            refresh_capacity: defaults::refresh_capacity(),
            notify_timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Indices that are always observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticIndices {
    #[serde(default)]
    pub divisions: Vec<i64>,
    #[serde(default)]
    pub teachers: Vec<i64>,
    #[serde(default)]
    pub rooms: Vec<i64>,
}

impl StaticIndices {
    pub fn get(&self, kind: ResourceKind) -> &[i64] {
        match kind {
            ResourceKind::Division => &self.divisions,
            ResourceKind::Teacher => &self.teachers,
            ResourceKind::Room => &self.rooms,
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn base_url() -> String {
        "http://localhost:8080".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; timetable-mirror/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        5
    }

    // Endpoint defaults
    pub fn list_endpoint() -> String {
        "/lista.html".into()
    }
    pub fn division_endpoint() -> String {
        "/plany/o%d.html".into()
    }
    pub fn teacher_endpoint() -> String {
        "/plany/n%d.html".into()
    }
    pub fn room_endpoint() -> String {
        "/plany/s%d.html".into()
    }

    // Hub defaults
    pub fn division_workers() -> usize {
        4
    }
    pub fn teacher_workers() -> usize {
        4
    }
    pub fn room_workers() -> usize {
        2
    }
    pub fn queue_capacity() -> usize {
        1000
    }
    pub fn tick_ms() -> u64 {
        1000
    }
    pub fn enqueue_timeout() -> u64 {
        10
    }
    pub fn list_interval() -> u64 {
        5
    }
    pub fn base_interval() -> u64 {
        15
    }
    pub fn refresh_capacity() -> usize {
        256
    }
    pub fn notify_timeout() -> u64 {
        5
    }
}
