//! RSS/Atom news feed adapter.
//!
//! Fetches each configured feed, parses it with `feed-rs`, and keeps
//! entries that are recent enough and look robotics-related. Summaries are
//! reduced to plain text. Entries without a publication date are kept.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use gallery_core::canonical::url_external_id;
use gallery_core::models::{CandidateItem, MediaType, SourceType};

use crate::config::{Config, CrawlerConfig, NewsFeedConfig};
use crate::http::{build_client, get_bytes};
use crate::pacing::Pacer;
use crate::traits::SourceAdapter;

/// Terms that mark an entry as robotics content.
pub const ROBOTICS_KEYWORDS: &[&str] = &[
    "robot",
    "robotic",
    "automation",
    "autonomous",
    "agv",
    "amr",
    "cobot",
    "manipulator",
    "humanoid",
    "quadruped",
    "drone",
    "warehouse automation",
    "industrial automation",
    "service robot",
    "delivery robot",
    "surgical robot",
    "inspection robot",
];

pub struct NewsAdapter {
    feeds: Vec<NewsFeedConfig>,
    crawler: CrawlerConfig,
    client: reqwest::Client,
    pacer: Pacer,
}

impl NewsAdapter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            feeds: config.sources.news.clone(),
            crawler: config.crawler.clone(),
            client: build_client(&config.crawler)?,
            pacer: Pacer::per_second(config.rate_limits.requests_per_second),
        })
    }

    async fn crawl_feed(&self, feed: &NewsFeedConfig) -> Result<Vec<CandidateItem>> {
        self.pacer.wait().await;
        let bytes = get_bytes(&self.client, &feed.url).await?;
        parse_feed(&bytes, feed, &self.crawler, Utc::now())
    }
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    fn name(&self) -> &str {
        "news"
    }

    fn description(&self) -> &str {
        "Articles from configured RSS/Atom news feeds"
    }

    fn source_types(&self) -> &[SourceType] {
        &[SourceType::News]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        for feed in &self.feeds {
            match self.crawl_feed(feed).await {
                Ok(entries) => {
                    tracing::info!(feed = %feed.name, items = entries.len(), "feed crawl complete");
                    items.extend(entries);
                }
                Err(e) => {
                    tracing::warn!(feed = %feed.name, error = %format!("{e:#}"), "feed crawl failed");
                }
            }
        }
        Ok(items)
    }
}

/// Parse a feed document into candidates.
pub fn parse_feed(
    bytes: &[u8],
    feed: &NewsFeedConfig,
    crawler: &CrawlerConfig,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateItem>> {
    let parsed = feed_rs::parser::parse(bytes)
        .with_context(|| format!("Failed to parse feed {}", feed.url))?;
    let cutoff = now - Duration::days(crawler.published_within_days);

    let mut items = Vec::new();
    for entry in parsed.entries.into_iter().take(crawler.max_results_per_source) {
        let Some(url) = entry.links.first().map(|l| l.href.trim().to_string()) else {
            tracing::debug!(feed = %feed.name, id = %entry.id, "entry without link");
            continue;
        };
        if url.is_empty() {
            continue;
        }

        let published_at = entry.published.or(entry.updated);
        if published_at.is_some_and(|p| p < cutoff) {
            continue;
        }

        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let raw_summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        if !is_robotics_related(&format!("{title} {raw_summary}")) {
            continue;
        }

        let thumbnail = entry
            .media
            .iter()
            .find_map(|m| {
                m.content
                    .iter()
                    .filter(|c| {
                        c.content_type
                            .as_ref()
                            .is_some_and(|t| t.to_string().starts_with("image/"))
                    })
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            })
            .or_else(|| {
                entry
                    .media
                    .iter()
                    .find_map(|m| m.thumbnails.first().map(|t| t.image.uri.clone()))
            })
            .or_else(|| first_img_src(&raw_summary));

        let mut item = CandidateItem::new(
            SourceType::News,
            url_external_id(&url),
            url,
            strip_html(&title),
            MediaType::Article,
        );
        item.source_name = feed.name.clone();
        item.description = Some(strip_html(&raw_summary)).filter(|d| !d.is_empty());
        item.thumbnail_url = thumbnail;
        item.published_at = published_at;
        item.default_category = feed.default_category.clone();
        items.push(item);
    }
    Ok(items)
}

/// Whether `text` mentions any robotics keyword, case-insensitively.
pub fn is_robotics_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    ROBOTICS_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Plain text of an HTML fragment: tags removed, common entities decoded,
/// whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#8217;", "'")
        .replace("&#8230;", "...")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `src` of the first `<img>` tag in an HTML fragment.
fn first_img_src(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let tag_start = lower.find("<img")?;
    let tag_end = tag_start + lower[tag_start..].find('>')?;
    let tag = &html[tag_start..tag_end];
    let src_at = tag.to_ascii_lowercase().find("src=")? + 4;
    let rest = &tag[src_at..];
    let quote = rest.chars().next()?;
    let value = if quote == '"' || quote == '\'' {
        rest[1..].split(quote).next()?
    } else {
        rest.split_whitespace().next()?
    };
    Some(value.to_string()).filter(|v| !v.is_empty())
}
