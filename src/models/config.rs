//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Listing page and harvest cadence settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Outbound HTTP behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Feed serving settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Feed channel identity
    #[serde(default)]
    pub feed: FeedConfig,
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

    /// Apply deployment overrides from the environment.
    ///
    /// Recognized variables: `LISTING_URL`, `WEB_PORT`, `DATABASE_PATH`,
    /// `RETENTION_DAYS`, `HARVEST_INTERVAL_SECS`. Unparseable values are
    /// a configuration error rather than a silent fallback.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("LISTING_URL") {
            self.harvest.listing_url = value;
        }
        if let Ok(value) = std::env::var("WEB_PORT") {
            self.server.port = value
                .parse()
                .map_err(|_| AppError::config(format!("invalid WEB_PORT: {value}")))?;
        }
        if let Ok(value) = std::env::var("DATABASE_PATH") {
            self.store.db_path = value;
        }
        if let Ok(value) = std::env::var("RETENTION_DAYS") {
            self.store.retention_days = value
                .parse()
                .map_err(|_| AppError::config(format!("invalid RETENTION_DAYS: {value}")))?;
        }
        if let Ok(value) = std::env::var("HARVEST_INTERVAL_SECS") {
            self.harvest.interval_secs = value
                .parse()
                .map_err(|_| AppError::config(format!("invalid HARVEST_INTERVAL_SECS: {value}")))?;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.listing_url.trim().is_empty() {
            return Err(AppError::config("harvest.listing_url is empty"));
        }
        url::Url::parse(&self.harvest.listing_url)
            .map_err(|e| AppError::config(format!("harvest.listing_url is not a URL: {e}")))?;
        url::Url::parse(&self.harvest.base_url)
            .map_err(|e| AppError::config(format!("harvest.base_url is not a URL: {e}")))?;
        if self.harvest.interval_secs == 0 {
            return Err(AppError::config("harvest.interval_secs must be > 0"));
        }
        if self.harvest.max_concurrent == 0 {
            return Err(AppError::config("harvest.max_concurrent must be > 0"));
        }
        if self.fetch.requests_per_second <= 0.0 {
            return Err(AppError::config("fetch.requests_per_second must be > 0"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::config("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_attempts == 0 {
            return Err(AppError::config("fetch.max_attempts must be > 0"));
        }
        if self.fetch.cooldown_min_secs > self.fetch.cooldown_max_secs {
            return Err(AppError::config(
                "fetch.cooldown_min_secs must not exceed fetch.cooldown_max_secs",
            ));
        }
        if self.fetch.user_agents.is_empty() {
            return Err(AppError::config("fetch.user_agents must not be empty"));
        }
        if self.store.retention_days == 0 {
            return Err(AppError::config("store.retention_days must be > 0"));
        }
        Ok(())
    }
}

/// Listing page and harvest cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// URL of the announcement listing page
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Base origin against which relative detail links are resolved
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Seconds between harvest passes
    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,

    /// Maximum concurrent detail-page enrichments
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Expected display format of the listing timestamp
    #[serde(default = "defaults::date_format")]
    pub date_format: String,

    /// Label prefix stripped from the location cell
    #[serde(default = "defaults::location_prefix")]
    pub location_prefix: String,

    /// CSS selectors for the listing page
    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
            base_url: defaults::base_url(),
            interval_secs: defaults::interval_secs(),
            max_concurrent: defaults::max_concurrent(),
            date_format: defaults::date_format(),
            location_prefix: defaults::location_prefix(),
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for scraping the listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each entry in the announcement list
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// Selector for the date cell within an entry
    #[serde(default = "defaults::date_selector")]
    pub date_selector: String,

    /// Selector for the title/link element within an entry
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Selector for the location label within an entry
    #[serde(default = "defaults::category_selector")]
    pub category_selector: String,

    /// HTML attribute name for extracting links
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            row_selector: defaults::row_selector(),
            date_selector: defaults::date_selector(),
            title_selector: defaults::title_selector(),
            category_selector: defaults::category_selector(),
            link_attr: defaults::link_attr(),
        }
    }
}

/// Outbound HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Global outbound request rate cap
    #[serde(default = "defaults::requests_per_second")]
    pub requests_per_second: f64,

    /// Burst allowance for the rate cap
    #[serde(default = "defaults::burst")]
    pub burst: u32,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Attempt ceiling per fetch, including the first attempt
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts in milliseconds
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Lower bound of the extra cooldown after an upstream 429, in seconds
    #[serde(default = "defaults::cooldown_min_secs")]
    pub cooldown_min_secs: u64,

    /// Upper bound of the extra cooldown after an upstream 429, in seconds
    #[serde(default = "defaults::cooldown_max_secs")]
    pub cooldown_max_secs: u64,

    /// Client identity pool, rotated by attempt number
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            requests_per_second: defaults::requests_per_second(),
            burst: defaults::burst(),
            timeout_secs: defaults::timeout_secs(),
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base_ms(),
            cooldown_min_secs: defaults::cooldown_min_secs(),
            cooldown_max_secs: defaults::cooldown_max_secs(),
            user_agents: defaults::user_agents(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "defaults::db_path")]
    pub db_path: String,

    /// Retention horizon for pruning, in days
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
            retention_days: defaults::retention_days(),
        }
    }
}

impl StoreConfig {
    /// Retention horizon in seconds.
    pub fn retention_secs(&self) -> i64 {
        i64::from(self.retention_days) * 24 * 60 * 60
    }
}

/// Feed serving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port the feed endpoints listen on
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
        }
    }
}

/// Feed channel identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Channel title
    #[serde(default = "defaults::feed_title")]
    pub title: String,

    /// Channel description
    #[serde(default = "defaults::feed_description")]
    pub description: String,

    /// Publisher name attached to every item
    #[serde(default = "defaults::feed_author_name")]
    pub author_name: String,

    /// Publisher contact address attached to every item
    #[serde(default = "defaults::feed_author_email")]
    pub author_email: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: defaults::feed_title(),
            description: defaults::feed_description(),
            author_name: defaults::feed_author_name(),
            author_email: defaults::feed_author_email(),
        }
    }
}

mod defaults {
    // Harvest defaults
    pub fn listing_url() -> String {
        "https://www.berlin.de/polizei/polizeimeldungen/".into()
    }
    pub fn base_url() -> String {
        "https://www.berlin.de".into()
    }
    pub fn interval_secs() -> u64 {
        3600
    }
    pub fn max_concurrent() -> usize {
        2
    }
    pub fn date_format() -> String {
        "%d.%m.%Y %H:%M Uhr".into()
    }
    pub fn location_prefix() -> String {
        "Ereignisort: ".into()
    }

    // Listing selector defaults
    pub fn row_selector() -> String {
        "ul.list--tablelist > li".into()
    }
    pub fn date_selector() -> String {
        "div.cell.nowrap.date".into()
    }
    pub fn title_selector() -> String {
        "a".into()
    }
    pub fn category_selector() -> String {
        "span.category".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }

    // Fetch defaults
    pub fn requests_per_second() -> f64 {
        0.5
    }
    pub fn burst() -> u32 {
        1
    }
    pub fn timeout_secs() -> u64 {
        20
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff_base_ms() -> u64 {
        1000
    }
    pub fn cooldown_min_secs() -> u64 {
        30
    }
    pub fn cooldown_max_secs() -> u64 {
        60
    }
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0".into(),
        ]
    }

    // Store defaults
    pub fn db_path() -> String {
        "data/records.db".into()
    }
    pub fn retention_days() -> u32 {
        183
    }

    // Server defaults
    pub fn port() -> u16 {
        8080
    }

    // Feed defaults
    pub fn feed_title() -> String {
        "Berliner Polizeimeldungen".into()
    }
    pub fn feed_description() -> String {
        "Ein Feed für Berliner Polizeimeldungen".into()
    }
    pub fn feed_author_name() -> String {
        "Presseabteilung".into()
    }
    pub fn feed_author_email() -> String {
        "pressestelle@polizei.berlin.de".into()
    }
}
