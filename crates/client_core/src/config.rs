use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::OpportunityStatus;

pub const DEFAULT_CONFIG_FILE: &str = "producer.toml";

pub const PRODUCTION_API_BASE_URLS: &[&str] = &[
    "https://producer-producer-api.fly.dev",
    "https://api.producer-producer.com",
];

pub const LOCAL_API_BASE_URLS: &[&str] = &[
    "http://localhost:8080",
    "http://127.0.0.1:8080",
    "http://localhost:8000",
    "http://127.0.0.1:8000",
];

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Candidate hosts in preference order; the first healthy one is used.
    pub base_urls: Vec<String>,
    pub request_timeout: Duration,
    pub healthcheck_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SwipeSettings {
    /// Fraction of the card width a drag must cover to count as a decision.
    pub threshold: f64,
    pub max_rotation_deg: f64,
    pub fly_off: Duration,
    pub reset: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub min_score: f64,
    pub limit: u32,
    pub hidden_status_limit: u32,
    pub saved_limit: u32,
    pub undo_status: OpportunityStatus,
    /// Signed-in users get `/opportunities/for-me` instead of the public feed.
    pub personalized: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub swipe: SwipeSettings,
    pub feed: FeedSettings,
    pub session_path: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_urls: PRODUCTION_API_BASE_URLS
                .iter()
                .map(|url| url.to_string())
                .collect(),
            request_timeout: Duration::from_millis(12_000),
            healthcheck_timeout: Duration::from_millis(2_500),
        }
    }
}

impl Default for SwipeSettings {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            max_rotation_deg: 15.0,
            fly_off: Duration::from_millis(300),
            reset: Duration::from_millis(180),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            limit: 50,
            hidden_status_limit: 200,
            saved_limit: 100,
            undo_status: OpportunityStatus::Open,
            personalized: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            swipe: SwipeSettings::default(),
            feed: FeedSettings::default(),
            session_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    #[serde(default)]
    api: FileApiSettings,
    #[serde(default)]
    swipe: FileSwipeSettings,
    #[serde(default)]
    feed: FileFeedSettings,
    session_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileApiSettings {
    base_urls: Option<Vec<String>>,
    request_timeout_ms: Option<u64>,
    healthcheck_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSwipeSettings {
    threshold: Option<f64>,
    max_rotation_deg: Option<f64>,
    fly_off_ms: Option<u64>,
    reset_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileFeedSettings {
    min_score: Option<f64>,
    limit: Option<u32>,
    undo_status: Option<OpportunityStatus>,
    personalized: Option<bool>,
}

/// Defaults, then `producer.toml` (or `$PP_CONFIG`), then `PP_*` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let path = std::env::var("PP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    load_settings_from(&path, |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        settings.apply_file(file_cfg);
    }

    settings.apply_env(env);
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(urls) = file_cfg.api.base_urls {
            let urls = expand_base_urls(&urls.join(","));
            if !urls.is_empty() {
                self.api.base_urls = urls;
            }
        }
        if let Some(ms) = file_cfg.api.request_timeout_ms {
            self.api.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file_cfg.api.healthcheck_timeout_ms {
            self.api.healthcheck_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = file_cfg.swipe.threshold {
            self.swipe.threshold = v;
        }
        if let Some(v) = file_cfg.swipe.max_rotation_deg {
            self.swipe.max_rotation_deg = v;
        }
        if let Some(ms) = file_cfg.swipe.fly_off_ms {
            self.swipe.fly_off = Duration::from_millis(ms);
        }
        if let Some(ms) = file_cfg.swipe.reset_ms {
            self.swipe.reset = Duration::from_millis(ms);
        }
        if let Some(v) = file_cfg.feed.min_score {
            self.feed.min_score = v;
        }
        if let Some(v) = file_cfg.feed.limit {
            self.feed.limit = v;
        }
        if let Some(v) = file_cfg.feed.undo_status {
            self.feed.undo_status = v;
        }
        if let Some(v) = file_cfg.feed.personalized {
            self.feed.personalized = v;
        }
        if let Some(path) = file_cfg.session_path {
            self.session_path = Some(path);
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PP_API_BASE_URLS").or_else(|| env("PP_API_BASE_URL")) {
            let urls = expand_base_urls(&v);
            if !urls.is_empty() {
                self.api.base_urls = urls;
            }
        }
        if let Some(ms) = env("PP_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.api.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env("PP_HEALTHCHECK_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.api.healthcheck_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = env("PP_SWIPE_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
            self.swipe.threshold = v;
        }
        if let Some(ms) = env("PP_FLY_OFF_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.swipe.fly_off = Duration::from_millis(ms);
        }
        if let Some(v) = env("PP_FEED_MIN_SCORE").and_then(|v| v.parse::<f64>().ok()) {
            self.feed.min_score = v;
        }
        if let Some(v) = env("PP_FEED_LIMIT").and_then(|v| v.parse::<u32>().ok()) {
            self.feed.limit = v;
        }
        if let Some(v) = env("PP_FEED_PERSONALIZED").and_then(|v| v.parse::<bool>().ok()) {
            self.feed.personalized = v;
        }
        if let Some(v) = env("PP_UNDO_STATUS").and_then(|v| OpportunityStatus::parse(&v)) {
            self.feed.undo_status = v;
        }
        if let Some(v) = env("PP_SESSION_PATH").filter(|v| !v.trim().is_empty()) {
            self.session_path = Some(PathBuf::from(v));
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(self.swipe.threshold > 0.0 && self.swipe.threshold <= 1.0) {
            anyhow::bail!(
                "swipe threshold must be within (0, 1], got {}",
                self.swipe.threshold
            );
        }
        if self.api.base_urls.is_empty() {
            anyhow::bail!("at least one API base URL is required");
        }
        Ok(())
    }

    /// Session file location, defaulting to the platform data directory.
    pub fn resolved_session_path(&self) -> Option<PathBuf> {
        self.session_path.clone().or_else(|| {
            dirs::data_local_dir().map(|base| base.join("producer-producer").join("session.json"))
        })
    }
}

pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parses a comma-separated host list, expanding the `local` and
/// `prod`/`production` shorthands. Duplicates keep their first position.
pub fn expand_base_urls(raw: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let expanded: Vec<String> = match part.trim() {
            "local" => LOCAL_API_BASE_URLS.iter().map(|u| u.to_string()).collect(),
            "prod" | "production" => PRODUCTION_API_BASE_URLS
                .iter()
                .map(|u| u.to_string())
                .collect(),
            other => normalize_base_url(other).into_iter().collect(),
        };
        for url in expanded {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
