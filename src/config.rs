//! Configuration loading and validation.
//!
//! Settings come from a TOML file (default `./config/gallery.toml`); API
//! keys come from the environment, optionally seeded from a `.env` file.
//! Every section has defaults, so a file containing only `[db]` is valid.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/gallery.sqlite"
//!
//! [crawler]
//! min_relevance_score = 0.6
//! published_within_days = 365
//!
//! [rate_limits]
//! requests_per_second = 1.0
//! classify_delay_ms = 500
//!
//! [classifier]
//! model = "gemini-2.0-flash"
//!
//! [[sources.youtube.channels]]
//! id = "UC..."
//! name = "Boston Dynamics"
//! default_category = "industrial_automation"
//!
//! [[sources.news]]
//! name = "The Robot Report"
//! url = "https://www.therobotreport.com/feed/"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Needed by |
//! |----------|-----------|
//! | `GEMINI_API_KEY` or `GOOGLE_AI_API_KEY` | classification |
//! | `YOUTUBE_API_KEY` | `youtube` |
//! | `SERPAPI_KEY` | `serpapi`, `serpapi_images`, `social` |
//! | `GOOGLE_CUSTOM_SEARCH_API_KEY`, `GOOGLE_CUSTOM_SEARCH_ENGINE_ID` | `google`, `google_images` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration problems that must stop a command before it starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<String>),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_busy_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f64,
    #[serde(default = "default_max_results_per_source")]
    pub max_results_per_source: usize,
    #[serde(default = "default_max_results_per_query")]
    pub max_results_per_query: usize,
    #[serde(default = "default_video_min_duration")]
    pub video_min_duration: i64,
    #[serde(default = "default_video_max_duration")]
    pub video_max_duration: i64,
    #[serde(default = "default_published_within_days")]
    pub published_within_days: i64,
    #[serde(default = "default_image_min_width")]
    pub image_min_width: u32,
    #[serde(default = "default_image_min_height")]
    pub image_min_height: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: default_min_relevance(),
            max_results_per_source: default_max_results_per_source(),
            max_results_per_query: default_max_results_per_query(),
            video_min_duration: default_video_min_duration(),
            video_max_duration: default_video_max_duration(),
            published_within_days: default_published_within_days(),
            image_min_width: default_image_min_width(),
            image_min_height: default_image_min_height(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_min_relevance() -> f64 {
    0.6
}
fn default_max_results_per_source() -> usize {
    50
}
fn default_max_results_per_query() -> usize {
    20
}
fn default_video_min_duration() -> i64 {
    30
}
fn default_video_max_duration() -> i64 {
    1800
}
fn default_published_within_days() -> i64 {
    365
}
fn default_image_min_width() -> u32 {
    400
}
fn default_image_min_height() -> u32 {
    300
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("gallery-crawler/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitsConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    /// Pause between two classifications in the pipeline.
    #[serde(default = "default_classify_delay_ms")]
    pub classify_delay_ms: u64,
    #[serde(default = "default_youtube_daily_quota")]
    pub youtube_daily_quota: u32,
    #[serde(default = "default_google_daily_quota")]
    pub google_daily_quota: u32,
    #[serde(default = "default_serpapi_searches_per_run")]
    pub serpapi_searches_per_run: u32,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            classify_delay_ms: default_classify_delay_ms(),
            youtube_daily_quota: default_youtube_daily_quota(),
            google_daily_quota: default_google_daily_quota(),
            serpapi_searches_per_run: default_serpapi_searches_per_run(),
        }
    }
}

fn default_requests_per_second() -> f64 {
    1.0
}
fn default_classify_delay_ms() -> u64 {
    500
}
fn default_youtube_daily_quota() -> u32 {
    10_000
}
fn default_google_daily_quota() -> u32 {
    100
}
fn default_serpapi_searches_per_run() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_classifier_timeout_secs(),
            description_limit: default_description_limit(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_max_retries() -> u32 {
    3
}
fn default_classifier_timeout_secs() -> u64 {
    60
}
fn default_description_limit() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            dir: default_archive_dir(),
        }
    }
}

fn default_archive_enabled() -> bool {
    true
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("./data/raw")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub youtube: YoutubeConfig,
    #[serde(default)]
    pub news: Vec<NewsFeedConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub social: SocialConfig,
}

/// A search query plus the taxonomy hints attached to its results.
#[derive(Debug, Deserialize, Clone)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    #[serde(default)]
    pub channels: Vec<YoutubeChannel>,
    #[serde(default)]
    pub search_queries: Vec<QuerySpec>,
    #[serde(default = "default_youtube_api_base")]
    pub api_base: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            search_queries: Vec::new(),
            api_base: default_youtube_api_base(),
        }
    }
}

fn default_youtube_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_category: Option<String>,
    #[serde(default)]
    pub default_tasks: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsFeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub default_category: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub news_queries: Vec<QuerySpec>,
    #[serde(default)]
    pub image_queries: Vec<QuerySpec>,
    #[serde(default = "default_google_api_base")]
    pub google_api_base: String,
    #[serde(default = "default_serpapi_base")]
    pub serpapi_base: String,
    #[serde(default = "default_results_per_search")]
    pub results_per_search: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            news_queries: Vec::new(),
            image_queries: Vec::new(),
            google_api_base: default_google_api_base(),
            serpapi_base: default_serpapi_base(),
            results_per_search: default_results_per_search(),
        }
    }
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}
fn default_serpapi_base() -> String {
    "https://serpapi.com/search".to_string()
}
fn default_results_per_search() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocialConfig {
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
            queries: Vec::new(),
        }
    }
}

fn default_platforms() -> Vec<String> {
    ["linkedin", "tiktok", "twitter", "facebook", "instagram"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// API keys read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
}

impl Credentials {
    /// Read keys from the process environment. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env_var("GOOGLE_AI_API_KEY").or_else(|| env_var("GEMINI_API_KEY")),
            youtube_api_key: env_var("YOUTUBE_API_KEY"),
            serpapi_key: env_var("SERPAPI_KEY"),
            google_search_api_key: env_var("GOOGLE_CUSTOM_SEARCH_API_KEY"),
            google_search_engine_id: env_var("GOOGLE_CUSTOM_SEARCH_ENGINE_ID"),
        }
    }

    /// Settings an adapter needs that are not present.
    pub fn missing_for_adapter(&self, adapter: &str) -> Vec<String> {
        let mut missing = Vec::new();
        match adapter {
            "youtube" => {
                if self.youtube_api_key.is_none() {
                    missing.push("YOUTUBE_API_KEY".to_string());
                }
            }
            "serpapi" | "serpapi_images" | "social" => {
                if self.serpapi_key.is_none() {
                    missing.push("SERPAPI_KEY".to_string());
                }
            }
            "google" | "google_images" => {
                if self.google_search_api_key.is_none() {
                    missing.push("GOOGLE_CUSTOM_SEARCH_API_KEY".to_string());
                }
                if self.google_search_engine_id.is_none() {
                    missing.push("GOOGLE_CUSTOM_SEARCH_ENGINE_ID".to_string());
                }
            }
            _ => {}
        }
        missing
    }

    /// Check everything a run over `adapters` needs, reporting every gap at
    /// once. Classification always needs the model key.
    pub fn validate_for(&self, adapters: &[&str]) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY (or GOOGLE_AI_API_KEY)".to_string());
        }
        for adapter in adapters {
            for key in self.missing_for_adapter(adapter) {
                if !missing.contains(&key) {
                    missing.push(key);
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSettings(missing))
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// A century; anything longer is a typo and would overflow date arithmetic.
const MAX_PUBLISHED_WITHIN_DAYS: i64 = 36_500;

fn validate(config: &Config) -> Result<(), ConfigError> {
    let c = &config.crawler;
    if !(0.0..=1.0).contains(&c.min_relevance_score) {
        return Err(invalid("crawler.min_relevance_score", "must be in [0.0, 1.0]"));
    }
    if c.video_min_duration > c.video_max_duration {
        return Err(invalid(
            "crawler.video_min_duration",
            "must not exceed crawler.video_max_duration",
        ));
    }
    if !(1..=MAX_PUBLISHED_WITHIN_DAYS).contains(&c.published_within_days) {
        return Err(invalid(
            "crawler.published_within_days",
            "must be between 1 and 36500",
        ));
    }
    if c.http_timeout_secs == 0 {
        return Err(invalid("crawler.http_timeout_secs", "must be > 0"));
    }
    let r = &config.rate_limits;
    if r.requests_per_second.is_nan() || r.requests_per_second <= 0.0 {
        return Err(invalid("rate_limits.requests_per_second", "must be > 0"));
    }
    if config.classifier.timeout_secs == 0 {
        return Err(invalid("classifier.timeout_secs", "must be > 0"));
    }
    if config.classifier.description_limit == 0 {
        return Err(invalid("classifier.description_limit", "must be > 0"));
    }
    for platform in &config.sources.social.platforms {
        if crate::connector_social::Platform::parse(platform).is_none() {
            return Err(invalid(
                "sources.social.platforms",
                &format!("unknown platform '{platform}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/g.sqlite\"\n").unwrap();
        assert_eq!(cfg.crawler.min_relevance_score, 0.6);
        assert_eq!(cfg.crawler.video_min_duration, 30);
        assert_eq!(cfg.crawler.video_max_duration, 1800);
        assert_eq!(cfg.crawler.image_min_width, 400);
        assert_eq!(cfg.rate_limits.youtube_daily_quota, 10_000);
        assert_eq!(cfg.rate_limits.google_daily_quota, 100);
        assert_eq!(cfg.classifier.model, "gemini-2.0-flash");
        assert_eq!(cfg.sources.social.platforms.len(), 5);
        assert!(cfg.archive.enabled);
    }

    #[test]
    fn sources_parse() {
        let cfg = parse_config(
            r#"
[db]
path = "g.sqlite"

[[sources.youtube.channels]]
id = "UC123"
name = "Acme"
default_category = "service_robotics"

[[sources.news]]
name = "Robot Report"
url = "https://example.com/feed"

[[sources.search.news_queries]]
query = "AMR warehouse deployment"
category = "industrial_automation"
tasks = ["transportation"]

[sources.social]
platforms = ["tiktok"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.sources.youtube.channels[0].id, "UC123");
        assert_eq!(cfg.sources.news[0].name, "Robot Report");
        assert_eq!(cfg.sources.search.news_queries[0].tasks, vec!["transportation"]);
        assert_eq!(cfg.sources.social.platforms, vec!["tiktok"]);
    }

    #[test]
    fn rejects_bad_values() {
        let err = parse_config("[db]\npath = \"g\"\n[crawler]\nmin_relevance_score = 1.5\n")
            .unwrap_err();
        assert!(err.to_string().contains("min_relevance_score"));

        let err =
            parse_config("[db]\npath = \"g\"\n[rate_limits]\nrequests_per_second = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("requests_per_second"));

        let err = parse_config("[db]\npath = \"g\"\n[sources.social]\nplatforms = [\"myspace\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn publication_window_is_bounded() {
        let window = |days: i64| parse_config(&format!("[db]\npath = \"g\"\n[crawler]\npublished_within_days = {days}\n"));
        assert!(window(0).is_err());
        assert_eq!(window(36_500).unwrap().crawler.published_within_days, 36_500);
        let err = window(100_000_000_000_000).unwrap_err();
        assert!(err.to_string().contains("published_within_days"));
    }

    #[test]
    fn missing_settings_are_all_reported() {
        let creds = Credentials::default();
        let err = creds.validate_for(&["youtube", "google", "serpapi", "social"]).unwrap_err();
        let ConfigError::MissingSettings(missing) = err else {
            panic!("expected MissingSettings");
        };
        assert_eq!(missing.len(), 5);
        assert!(missing.iter().any(|m| m.starts_with("GEMINI_API_KEY")));
        assert!(missing.contains(&"GOOGLE_CUSTOM_SEARCH_ENGINE_ID".to_string()));
        assert_eq!(missing.iter().filter(|m| *m == "SERPAPI_KEY").count(), 1);
    }

    #[test]
    fn news_needs_only_model_key() {
        let creds = Credentials {
            gemini_api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(creds.validate_for(&["news"]).is_ok());
        assert!(creds.validate_for(&["youtube"]).is_err());
    }
}
