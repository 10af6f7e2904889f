//! `gallery sources`: every adapter and whether it can run.

use anyhow::Result;

use crate::config::{Config, Credentials};
use crate::traits::AdapterRegistry;

/// Readiness of one adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatus {
    pub name: String,
    pub description: String,
    /// Environment settings the adapter needs but does not have.
    pub missing: Vec<String>,
    /// Configured queries, channels or feeds.
    pub targets: usize,
}

impl SourceStatus {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty() && self.targets > 0
    }
}

pub fn source_statuses(
    config: &Config,
    credentials: &Credentials,
    registry: &AdapterRegistry,
) -> Vec<SourceStatus> {
    registry
        .adapters()
        .iter()
        .map(|adapter| SourceStatus {
            name: adapter.name().to_string(),
            description: adapter.description().to_string(),
            missing: credentials.missing_for_adapter(adapter.name()),
            targets: target_count(config, adapter.name()),
        })
        .collect()
}

fn target_count(config: &Config, adapter: &str) -> usize {
    let s = &config.sources;
    match adapter {
        "youtube" => s.youtube.channels.len() + s.youtube.search_queries.len(),
        "news" => s.news.len(),
        "google" | "serpapi" => s.search.news_queries.len(),
        "google_images" | "serpapi_images" => s.search.image_queries.len(),
        "social" => s.social.queries.len() * s.social.platforms.len(),
        _ => 0,
    }
}

pub fn list_sources(config: &Config, credentials: &Credentials) -> Result<()> {
    let registry = AdapterRegistry::from_config(config, credentials, None)?;
    let statuses = source_statuses(config, credentials, &registry);

    println!("{:<16} {:<10} {:>7}  DESCRIPTION", "SOURCE", "STATUS", "TARGETS");
    for s in &statuses {
        let status = if s.is_ready() {
            "ready"
        } else if s.missing.is_empty() {
            "empty"
        } else {
            "no keys"
        };
        println!("{:<16} {:<10} {:>7}  {}", s.name, status, s.targets, s.description);
        if !s.missing.is_empty() {
            println!("{:<16} missing: {}", "", s.missing.join(", "));
        }
    }

    if credentials.gemini_api_key.is_none() {
        println!();
        println!("Classification is unavailable: set GEMINI_API_KEY (or GOOGLE_AI_API_KEY).");
    }
    Ok(())
}
