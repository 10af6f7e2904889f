//! Social platform adapter (`social`).
//!
//! LinkedIn, TikTok, X/Twitter, Facebook and Instagram posts are found
//! through SerpAPI Google searches restricted with `site:`. Results whose
//! URL is not on the platform's domains are dropped; the media type is
//! read from the URL shape. Searches share the SerpAPI per-run budget.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use gallery_core::canonical::{canonicalize_url, url_external_id};
use gallery_core::models::{CandidateItem, MediaType, SourceType};

use crate::archive::{RawArchive, RawRecord};
use crate::config::{Config, QuerySpec, SearchConfig, SocialConfig};
use crate::http::{build_client, get_json, str_field};
use crate::pacing::{Pacer, QuotaBudget};
use crate::traits::SourceAdapter;

/// A social platform searched through `site:` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linkedin,
    Tiktok,
    Twitter,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Linkedin,
        Platform::Tiktok,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
    ];

    /// Parse a configured platform name. `x` is accepted for Twitter.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Some(Platform::Linkedin),
            "tiktok" => Some(Platform::Tiktok),
            "twitter" | "x" => Some(Platform::Twitter),
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Linkedin => "LinkedIn",
            Platform::Tiktok => "TikTok",
            Platform::Twitter => "X",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Platform::Linkedin => SourceType::Linkedin,
            Platform::Tiktok => SourceType::Tiktok,
            Platform::Twitter => SourceType::Twitter,
            Platform::Facebook => SourceType::Facebook,
            Platform::Instagram => SourceType::Instagram,
        }
    }

    /// Domain used in the `site:` restriction.
    pub fn site(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin.com",
            Platform::Tiktok => "tiktok.com",
            Platform::Twitter => "x.com",
            Platform::Facebook => "facebook.com",
            Platform::Instagram => "instagram.com",
        }
    }

    /// Hosts (and their subdomains) that belong to the platform.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Platform::Linkedin => &["linkedin.com"],
            Platform::Tiktok => &["tiktok.com"],
            Platform::Twitter => &["x.com", "twitter.com"],
            Platform::Facebook => &["facebook.com", "fb.com", "fb.watch"],
            Platform::Instagram => &["instagram.com"],
        }
    }

    pub fn owns_url(&self, raw: &str) -> bool {
        let Some(host) = Url::parse(raw.trim())
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        self.domains()
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    /// Google video search (`tbm=vid`) finds TikTok posts better than web search.
    pub fn uses_video_search(&self) -> bool {
        matches!(self, Platform::Tiktok)
    }

    /// Media type implied by a post URL.
    pub fn media_type_for(&self, url: &str) -> MediaType {
        let video = match self {
            Platform::Tiktok => true,
            Platform::Twitter => url.contains("/status/"),
            Platform::Facebook => url.contains("/watch") || url.contains("/videos/"),
            Platform::Instagram => url.contains("/reel/"),
            Platform::Linkedin => false,
        };
        if video {
            MediaType::Video
        } else {
            MediaType::Article
        }
    }

    /// Account name embedded in a post URL, when there is one.
    pub fn author_from_url(&self, raw: &str) -> Option<String> {
        let url = Url::parse(raw.trim()).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let first = *segments.first()?;
        match self {
            Platform::Linkedin => match first {
                "posts" => segments
                    .get(1)
                    .and_then(|s| s.split(['_', '-']).next())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                "in" | "company" => segments.get(1).map(|s| s.to_string()),
                _ => None,
            },
            Platform::Tiktok => first.starts_with('@').then(|| first.to_string()),
            Platform::Twitter => (segments.get(1) == Some(&"status")).then(|| format!("@{}", first.trim_start_matches('@'))),
            Platform::Facebook => {
                if first == "watch" {
                    Some("Facebook Watch".to_string())
                } else {
                    (segments.get(1) == Some(&"videos")).then(|| first.to_string())
                }
            }
            Platform::Instagram => {
                (!matches!(first, "p" | "reel" | "reels" | "explore") && segments.len() > 1)
                    .then(|| format!("@{first}"))
            }
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SocialAdapter {
    social: SocialConfig,
    search: SearchConfig,
    max_per_platform: usize,
    results_per_query: usize,
    api_key: String,
    client: reqwest::Client,
    pacer: Pacer,
    budget: Arc<QuotaBudget>,
    archive: Option<Arc<RawArchive>>,
}

impl SocialAdapter {
    pub fn new(
        config: &Config,
        api_key: String,
        budget: Arc<QuotaBudget>,
        archive: Option<Arc<RawArchive>>,
    ) -> Result<Self> {
        Ok(Self {
            social: config.sources.social.clone(),
            search: config.sources.search.clone(),
            max_per_platform: config.crawler.max_results_per_source,
            results_per_query: config.crawler.max_results_per_query,
            api_key,
            client: build_client(&config.crawler)?,
            pacer: Pacer::per_second(config.rate_limits.requests_per_second),
            budget,
            archive,
        })
    }

    fn platforms(&self) -> Vec<Platform> {
        let mut out = Vec::new();
        for name in &self.social.platforms {
            match Platform::parse(name) {
                Some(p) if !out.contains(&p) => out.push(p),
                Some(_) => {}
                None => tracing::warn!(platform = %name, "unknown social platform, skipping"),
            }
        }
        out
    }

    async fn run_query(&self, platform: Platform, spec: &QuerySpec) -> Result<Option<Vec<CandidateItem>>> {
        if !self.budget.try_spend(1) {
            return Ok(None);
        }
        self.pacer.wait().await;

        let mut query = vec![
            ("api_key", self.api_key.clone()),
            ("engine", "google".to_string()),
            ("q", format!("site:{} {}", platform.site(), spec.query)),
            ("num", self.results_per_query.clamp(1, 100).to_string()),
        ];
        let search_type = if platform.uses_video_search() {
            query.push(("tbm", "vid".into()));
            "video"
        } else {
            "web"
        };
        let response = get_json(&self.client, &self.search.serpapi_base, &query).await?;
        if let Some(error) = str_field(&response, "error") {
            anyhow::bail!("SerpAPI error: {error}");
        }

        let mut record = RawRecord::new("social", spec, search_type, response);
        record.platform = Some(platform.as_str().to_string());
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.append(&record) {
                tracing::warn!(error = %format!("{e:#}"), "failed to archive raw response");
            }
        }
        Ok(Some(parse_social_response(&record.response, platform, spec)))
    }
}

#[async_trait]
impl SourceAdapter for SocialAdapter {
    fn name(&self) -> &str {
        "social"
    }

    fn description(&self) -> &str {
        "Posts from LinkedIn, TikTok, X, Facebook and Instagram via site: search"
    }

    fn source_types(&self) -> &[SourceType] {
        &[
            SourceType::Linkedin,
            SourceType::Tiktok,
            SourceType::Twitter,
            SourceType::Facebook,
            SourceType::Instagram,
        ]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();

        'platforms: for platform in self.platforms() {
            let mut found = 0usize;
            for spec in &self.social.queries {
                if found >= self.max_per_platform {
                    break;
                }
                match self.run_query(platform, spec).await {
                    Ok(Some(posts)) => {
                        for post in posts {
                            if found >= self.max_per_platform {
                                break;
                            }
                            if seen.insert(post.source_url.clone()) {
                                found += 1;
                                items.push(post);
                            }
                        }
                    }
                    Ok(None) => break 'platforms,
                    Err(e) => {
                        tracing::warn!(%platform, query = %spec.query, error = %format!("{e:#}"), "social search failed");
                    }
                }
            }
            tracing::info!(%platform, items = found, "platform search done");
        }
        Ok(items)
    }
}

/// Candidates for `platform` from a SerpAPI `google` response.
///
/// Reads `organic_results` and `video_results`; entries off the
/// platform's domains are dropped. URLs are canonicalized so that
/// `twitter.com` and `x.com` links collapse into one candidate.
pub fn parse_social_response(response: &Value, platform: Platform, spec: &QuerySpec) -> Vec<CandidateItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for (key, always_video) in [("organic_results", false), ("video_results", true)] {
        let Some(results) = response.get(key).and_then(Value::as_array) else {
            continue;
        };
        for result in results {
            let Some(raw_url) = str_field(result, "link") else {
                continue;
            };
            if !platform.owns_url(&raw_url) {
                continue;
            }
            let url = canonicalize_url(&raw_url);
            if !seen.insert(url.clone()) {
                continue;
            }

            let media_type = if always_video {
                MediaType::Video
            } else {
                platform.media_type_for(&url)
            };
            let mut item = CandidateItem::new(
                platform.source_type(),
                url_external_id(&url),
                url.clone(),
                str_field(result, "title").unwrap_or_default(),
                media_type,
            );
            item.source_name = platform.label().to_string();
            item.description = str_field(result, "snippet");
            item.thumbnail_url = str_field(result, "thumbnail");
            item.metadata.author = result
                .pointer("/channel/name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| platform.author_from_url(&url));
            item.metadata.search_query = Some(spec.query.clone());
            item.default_category = spec.category.clone();
            item.default_tasks = spec.tasks.clone();
            items.push(item);
        }
    }
    items
}
