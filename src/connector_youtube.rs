//! YouTube Data API v3 adapter.
//!
//! Two discovery paths, both ending in a batched `videos.list` call:
//!
//! - **Channels**: `channels.list` → uploads playlist → `playlistItems.list`.
//! - **Search queries**: `search.list` restricted to embeddable videos
//!   published within `crawler.published_within_days`.
//!
//! Videos outside `[video_min_duration, video_max_duration]` or older than
//! the publication window are dropped. Every call is charged against the
//! daily quota (`search.list` costs 100 units, everything else 1); once
//! the budget is exhausted the adapter returns what it already has.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use gallery_core::models::{CandidateItem, MediaType, SourceType};

use crate::config::{Config, CrawlerConfig, QuerySpec, YoutubeChannel, YoutubeConfig};
use crate::http::{build_client, get_json, int_field, str_field};
use crate::pacing::{Pacer, QuotaBudget};
use crate::traits::SourceAdapter;

const SEARCH_COST: u32 = 100;
const LIST_COST: u32 = 1;
const MAX_PAGE_SIZE: usize = 50;
const MAX_SEARCH_PAGE_SIZE: usize = 25;

pub struct YoutubeAdapter {
    config: YoutubeConfig,
    crawler: CrawlerConfig,
    api_key: String,
    client: reqwest::Client,
    pacer: Pacer,
    quota: QuotaBudget,
}

impl YoutubeAdapter {
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        Ok(Self {
            config: config.sources.youtube.clone(),
            crawler: config.crawler.clone(),
            api_key,
            client: build_client(&config.crawler)?,
            pacer: Pacer::per_second(config.rate_limits.requests_per_second),
            quota: QuotaBudget::new("youtube", config.rate_limits.youtube_daily_quota),
        })
    }

    pub fn quota_used(&self) -> u32 {
        self.quota.used()
    }

    /// Paced, quota-charged API call. `None` once the quota is spent.
    async fn call(
        &self,
        endpoint: &str,
        cost: u32,
        mut query: Vec<(&str, String)>,
    ) -> Result<Option<Value>> {
        if !self.quota.try_spend(cost) {
            return Ok(None);
        }
        self.pacer.wait().await;
        query.push(("key", self.api_key.clone()));
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), endpoint);
        get_json(&self.client, &url, &query).await.map(Some)
    }

    async fn crawl_channel(&self, channel: &YoutubeChannel) -> Result<Vec<CandidateItem>> {
        let Some(response) = self
            .call(
                "channels",
                LIST_COST,
                vec![("part", "contentDetails".into()), ("id", channel.id.clone())],
            )
            .await?
        else {
            return Ok(Vec::new());
        };

        let Some(uploads) = response
            .pointer("/items/0/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
        else {
            tracing::warn!(channel = %channel.name, id = %channel.id, "channel not found or has no uploads playlist");
            return Ok(Vec::new());
        };

        let page_size = self.crawler.max_results_per_source.clamp(1, MAX_PAGE_SIZE);
        let Some(playlist) = self
            .call(
                "playlistItems",
                LIST_COST,
                vec![
                    ("part", "snippet".into()),
                    ("playlistId", uploads.to_string()),
                    ("maxResults", page_size.to_string()),
                ],
            )
            .await?
        else {
            return Ok(Vec::new());
        };

        let ids: Vec<String> = items_of(&playlist)
            .filter_map(|item| item.pointer("/snippet/resourceId/videoId"))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let mut videos = self.fetch_videos(&ids).await?;
        for video in &mut videos {
            video.source_name = channel.name.clone();
            video.default_category = channel.default_category.clone();
            video.default_tasks = channel.default_tasks.clone();
        }
        Ok(videos)
    }

    async fn search(&self, spec: &QuerySpec) -> Result<Vec<CandidateItem>> {
        let published_after =
            (Utc::now() - Duration::days(self.crawler.published_within_days)).to_rfc3339();
        let page_size = self.crawler.max_results_per_query.clamp(1, MAX_SEARCH_PAGE_SIZE);
        let Some(response) = self
            .call(
                "search",
                SEARCH_COST,
                vec![
                    ("part", "snippet".into()),
                    ("q", spec.query.clone()),
                    ("type", "video".into()),
                    ("videoEmbeddable", "true".into()),
                    ("publishedAfter", published_after),
                    ("maxResults", page_size.to_string()),
                    ("order", "relevance".into()),
                ],
            )
            .await?
        else {
            return Ok(Vec::new());
        };

        let ids: Vec<String> = items_of(&response)
            .filter_map(|item| item.pointer("/id/videoId"))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let mut videos = self.fetch_videos(&ids).await?;
        for video in &mut videos {
            video.default_category = spec.category.clone();
            video.default_tasks = spec.tasks.clone();
            video.metadata.search_query = Some(spec.query.clone());
        }
        Ok(videos)
    }

    /// Details for `ids`, 50 per `videos.list` call, filtered by duration and age.
    async fn fetch_videos(&self, ids: &[String]) -> Result<Vec<CandidateItem>> {
        let now = Utc::now();
        let mut out = Vec::new();
        for batch in ids.chunks(MAX_PAGE_SIZE) {
            let Some(response) = self
                .call(
                    "videos",
                    LIST_COST,
                    vec![
                        ("part", "snippet,contentDetails,statistics".into()),
                        ("id", batch.join(",")),
                    ],
                )
                .await?
            else {
                break;
            };
            out.extend(items_of(&response).filter_map(|v| parse_video(v, &self.crawler, now)));
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for YoutubeAdapter {
    fn name(&self) -> &str {
        "youtube"
    }

    fn description(&self) -> &str {
        "Videos from configured YouTube channels and search queries"
    }

    fn source_types(&self) -> &[SourceType] {
        &[SourceType::Youtube]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();

        for channel in &self.config.channels {
            if self.quota.is_exhausted() {
                break;
            }
            match self
                .crawl_channel(channel)
                .await
                .with_context(|| format!("channel {}", channel.name))
            {
                Ok(videos) => {
                    tracing::info!(channel = %channel.name, videos = videos.len(), "channel crawl done");
                    items.extend(videos.into_iter().filter(|v| seen.insert(v.external_id.clone())));
                }
                Err(e) => tracing::warn!(channel = %channel.name, error = %format!("{e:#}"), "channel crawl failed"),
            }
        }

        for spec in &self.config.search_queries {
            if self.quota.is_exhausted() {
                break;
            }
            match self.search(spec).await {
                Ok(videos) => {
                    tracing::info!(query = %spec.query, videos = videos.len(), "search done");
                    items.extend(videos.into_iter().filter(|v| seen.insert(v.external_id.clone())));
                }
                Err(e) => tracing::warn!(query = %spec.query, error = %format!("{e:#}"), "search failed"),
            }
        }

        tracing::info!(items = items.len(), quota_used = self.quota.used(), "youtube crawl complete");
        Ok(items)
    }
}

fn items_of(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Build a candidate from one `videos.list` resource.
///
/// Returns `None` for resources without an id, or whose duration or age
/// falls outside the configured window.
pub fn parse_video(video: &Value, crawler: &CrawlerConfig, now: DateTime<Utc>) -> Option<CandidateItem> {
    let id = str_field(video, "id")?;
    let snippet = video.get("snippet").unwrap_or(&Value::Null);

    let duration = video
        .pointer("/contentDetails/duration")
        .and_then(Value::as_str)
        .and_then(parse_iso8601_duration)
        .unwrap_or(0);
    if duration < crawler.video_min_duration || duration > crawler.video_max_duration {
        tracing::debug!(video_id = %id, duration, "video outside duration window");
        return None;
    }

    let published_at = str_field(snippet, "publishedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc));
    if let Some(published) = published_at {
        if published < now - Duration::days(crawler.published_within_days) {
            tracing::debug!(video_id = %id, "video older than publication window");
            return None;
        }
    }

    let mut item = CandidateItem::new(
        SourceType::Youtube,
        id.clone(),
        format!("https://www.youtube.com/watch?v={id}"),
        str_field(snippet, "title").unwrap_or_default(),
        MediaType::Video,
    );
    item.content_url = format!("https://www.youtube.com/embed/{id}");
    item.source_name = str_field(snippet, "channelTitle").unwrap_or_else(|| "YouTube".to_string());
    item.description = str_field(snippet, "description");
    item.thumbnail_url = snippet.get("thumbnails").and_then(best_thumbnail);
    item.duration_seconds = Some(duration);
    item.published_at = published_at;
    if let Some(stats) = video.get("statistics") {
        item.metadata.view_count = int_field(stats, "viewCount");
        item.metadata.like_count = int_field(stats, "likeCount");
    }
    Some(item)
}

/// Highest-resolution thumbnail URL available.
pub fn best_thumbnail(thumbnails: &Value) -> Option<String> {
    ["maxres", "standard", "high", "medium", "default"]
        .iter()
        .find_map(|quality| thumbnails.get(*quality).and_then(|t| str_field(t, "url")))
}

/// Seconds in an ISO 8601 duration such as `PT1H2M3S` or `P1DT30M`.
pub fn parse_iso8601_duration(s: &str) -> Option<i64> {
    let rest = s.trim().strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = 0i64;
    for (part, units) in [
        (date_part, &[('W', 604_800i64), ('D', 86_400)][..]),
        (time_part, &[('H', 3_600i64), ('M', 60), ('S', 1)][..]),
    ] {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                continue;
            }
            let factor = units.iter().find(|(u, _)| *u == c)?.1;
            let value: f64 = number.parse().ok()?;
            // the float cast saturates; the sum must not wrap
            total = total.checked_add((value * factor as f64) as i64)?;
            number.clear();
        }
        if !number.is_empty() {
            return None;
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn video(id: &str, duration: &str, published: &str) -> Value {
        serde_json::json!({
            "id": id,
            "snippet": {
                "title": format!("Video {id}"),
                "description": "AMRs moving totes",
                "channelTitle": "Acme Robotics",
                "publishedAt": published,
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/d.jpg"},
                    "high": {"url": "https://i.ytimg.com/h.jpg"}
                }
            },
            "contentDetails": {"duration": duration},
            "statistics": {"viewCount": "1200", "likeCount": "34"}
        })
    }

    #[test]
    fn durations() {
        assert_eq!(parse_iso8601_duration("PT15M33S"), Some(933));
        assert_eq!(parse_iso8601_duration("PT1H"), Some(3600));
        assert_eq!(parse_iso8601_duration("P1DT2M"), Some(86_520));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
        assert_eq!(parse_iso8601_duration("15:33"), None);
        assert_eq!(parse_iso8601_duration("PT5X"), None);
        assert_eq!(parse_iso8601_duration("P99999999999999999999DT1S"), None);
        assert_eq!(parse_iso8601_duration("P99999999999999WT99999999999999H"), None);
        assert_eq!(parse_iso8601_duration("P99999999999999999999D"), Some(i64::MAX));
    }

    #[test]
    fn parses_video_resource() {
        let now = Utc::now();
        let published = (now - Duration::days(3)).to_rfc3339();
        let item = parse_video(&video("abc123", "PT2M", &published), &CrawlerConfig::default(), now)
            .unwrap();
        assert_eq!(item.external_id, "abc123");
        assert_eq!(item.source_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(item.content_url, "https://www.youtube.com/embed/abc123");
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://i.ytimg.com/h.jpg"));
        assert_eq!(item.duration_seconds, Some(120));
        assert_eq!(item.metadata.view_count, Some(1200));
        assert_eq!(item.metadata.like_count, Some(34));
        assert_eq!(item.source_name, "Acme Robotics");
        assert_eq!(item.media_type, MediaType::Video);
    }

    #[test]
    fn filters_duration_and_age() {
        let now = Utc::now();
        let fresh = (now - Duration::days(3)).to_rfc3339();
        let stale = (now - Duration::days(400)).to_rfc3339();
        let cfg = CrawlerConfig::default();
        assert!(parse_video(&video("a", "PT10S", &fresh), &cfg, now).is_none());
        assert!(parse_video(&video("b", "PT31M", &fresh), &cfg, now).is_none());
        assert!(parse_video(&video("c", "PT30S", &fresh), &cfg, now).is_some());
        assert!(parse_video(&video("d", "PT2M", &stale), &cfg, now).is_none());
    }

    #[tokio::test]
    async fn channel_crawl_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "UC1"))
            .and(query_param("key", "yt-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"contentDetails": {"relatedPlaylists": {"uploads": "UU1"}}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "UU1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"snippet": {"resourceId": {"videoId": "v1"}}},
                    {"snippet": {"resourceId": {"videoId": "v2"}}}
                ]
            })))
            .mount(&server)
            .await;
        let published = (Utc::now() - Duration::days(1)).to_rfc3339();
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "v1,v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [video("v1", "PT3M", &published), video("v2", "PT5S", &published)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = crate::config::parse_config("[db]\npath = \"g.sqlite\"\n[rate_limits]\nrequests_per_second = 1000.0\n").unwrap();
        config.sources.youtube.api_base = server.uri();
        config.sources.youtube.channels.push(YoutubeChannel {
            id: "UC1".into(),
            name: "Acme".into(),
            default_category: Some("industrial_automation".into()),
            default_tasks: vec!["palletizing".into()],
        });

        let adapter = YoutubeAdapter::new(&config, "yt-key".into()).unwrap();
        let items = adapter.produce().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, "v1");
        assert_eq!(items[0].source_name, "Acme");
        assert_eq!(items[0].default_category.as_deref(), Some("industrial_automation"));
        assert_eq!(items[0].default_tasks, vec!["palletizing"]);
        assert_eq!(adapter.quota_used(), 3);
    }

    #[tokio::test]
    async fn search_stops_when_quota_is_spent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = crate::config::parse_config(
            "[db]\npath = \"g.sqlite\"\n[rate_limits]\nrequests_per_second = 1000.0\nyoutube_daily_quota = 150\n",
        )
        .unwrap();
        config.sources.youtube.api_base = server.uri();
        for q in ["robot arm", "agv"] {
            config.sources.youtube.search_queries.push(QuerySpec {
                query: q.into(),
                category: None,
                tasks: Vec::new(),
            });
        }
        let adapter = YoutubeAdapter::new(&config, "k".into()).unwrap();
        assert!(adapter.produce().await.unwrap().is_empty());
        assert_eq!(adapter.quota_used(), 100);
    }
}
