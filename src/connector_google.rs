//! Google Custom Search adapters (`google` and `google_images`).
//!
//! Each configured query under `[sources.search]` becomes one Custom Search
//! call, restricted to `published_within_days`. The free tier allows 100
//! searches per day, so both adapters share one [`QuotaBudget`]. Raw
//! responses go to the archive before parsing.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use gallery_core::canonical::{display_host, url_external_id};
use gallery_core::models::{CandidateItem, MediaType, SourceType};

use crate::archive::{RawArchive, RawRecord};
use crate::config::{Config, CrawlerConfig, QuerySpec, SearchConfig};
use crate::http::{build_client, get_json, int_field, str_field};
use crate::pacing::{Pacer, QuotaBudget};
use crate::traits::SourceAdapter;

/// Custom Search returns at most 10 results per call.
const MAX_NUM: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleSearchKind {
    News,
    Images,
}

impl GoogleSearchKind {
    pub fn adapter_name(&self) -> &'static str {
        match self {
            GoogleSearchKind::News => "google",
            GoogleSearchKind::Images => "google_images",
        }
    }

    pub fn search_type(&self) -> &'static str {
        match self {
            GoogleSearchKind::News => "news",
            GoogleSearchKind::Images => "images",
        }
    }
}

pub struct GoogleSearchAdapter {
    kind: GoogleSearchKind,
    search: SearchConfig,
    crawler: CrawlerConfig,
    api_key: String,
    engine_id: String,
    client: reqwest::Client,
    pacer: Pacer,
    quota: Arc<QuotaBudget>,
    archive: Option<Arc<RawArchive>>,
}

impl GoogleSearchAdapter {
    pub fn new(
        kind: GoogleSearchKind,
        config: &Config,
        api_key: String,
        engine_id: String,
        quota: Arc<QuotaBudget>,
        archive: Option<Arc<RawArchive>>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            search: config.sources.search.clone(),
            crawler: config.crawler.clone(),
            api_key,
            engine_id,
            client: build_client(&config.crawler)?,
            pacer: Pacer::per_second(config.rate_limits.requests_per_second),
            quota,
            archive,
        })
    }

    fn queries(&self) -> &[QuerySpec] {
        match self.kind {
            GoogleSearchKind::News => &self.search.news_queries,
            GoogleSearchKind::Images => &self.search.image_queries,
        }
    }

    async fn run_query(&self, spec: &QuerySpec) -> Result<Option<Vec<CandidateItem>>> {
        if !self.quota.try_spend(1) {
            return Ok(None);
        }
        self.pacer.wait().await;

        let mut query = vec![
            ("key", self.api_key.clone()),
            ("cx", self.engine_id.clone()),
            ("q", spec.query.clone()),
            ("num", self.search.results_per_search.clamp(1, MAX_NUM).to_string()),
            ("dateRestrict", format!("d{}", self.crawler.published_within_days)),
        ];
        if self.kind == GoogleSearchKind::Images {
            query.push(("searchType", "image".into()));
            query.push(("imgSize", "large".into()));
            query.push(("imgType", "photo".into()));
        }
        let response = get_json(&self.client, &self.search.google_api_base, &query).await?;

        let record = RawRecord::new(self.kind.adapter_name(), spec, self.kind.search_type(), response);
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.append(&record) {
                tracing::warn!(error = %format!("{e:#}"), "failed to archive raw response");
            }
        }

        Ok(Some(match self.kind {
            GoogleSearchKind::News => parse_news_response(&record.response, spec),
            GoogleSearchKind::Images => parse_image_response(&record.response, spec, &self.crawler),
        }))
    }
}

#[async_trait]
impl SourceAdapter for GoogleSearchAdapter {
    fn name(&self) -> &str {
        self.kind.adapter_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            GoogleSearchKind::News => "Articles from Google Custom Search news queries",
            GoogleSearchKind::Images => "Large photos from Google Custom Search image queries",
        }
    }

    fn source_types(&self) -> &[SourceType] {
        match self.kind {
            GoogleSearchKind::News => &[SourceType::GoogleNews],
            GoogleSearchKind::Images => &[SourceType::GoogleImage],
        }
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        for spec in self.queries() {
            match self.run_query(spec).await {
                Ok(Some(found)) => {
                    tracing::debug!(adapter = self.name(), query = %spec.query, results = found.len(), "search done");
                    items.extend(found);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(adapter = self.name(), query = %spec.query, error = %format!("{e:#}"), "search failed");
                }
            }
        }
        tracing::info!(adapter = self.name(), items = items.len(), quota_used = self.quota.used(), "google search complete");
        Ok(items)
    }
}

fn results(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn apply_hints(item: &mut CandidateItem, spec: &QuerySpec) {
    item.default_category = spec.category.clone();
    item.default_tasks = spec.tasks.clone();
    item.metadata.search_query = Some(spec.query.clone());
}

/// Candidates from a web search response.
pub fn parse_news_response(response: &Value, spec: &QuerySpec) -> Vec<CandidateItem> {
    results(response)
        .filter_map(|result| {
            let url = str_field(result, "link")?;
            let mut item = CandidateItem::new(
                SourceType::GoogleNews,
                url_external_id(&url),
                url.clone(),
                str_field(result, "title").unwrap_or_default(),
                MediaType::Article,
            );
            item.source_name = display_host(&url).unwrap_or_default();
            item.description = str_field(result, "snippet");
            item.thumbnail_url = result.get("pagemap").and_then(pagemap_image);
            apply_hints(&mut item, spec);
            Some(item)
        })
        .collect()
}

/// Candidates from an image search response, dropping images below the
/// configured minimum size.
pub fn parse_image_response(
    response: &Value,
    spec: &QuerySpec,
    crawler: &CrawlerConfig,
) -> Vec<CandidateItem> {
    results(response)
        .filter_map(|result| {
            let image_url = str_field(result, "link")?;
            let image = result.get("image").unwrap_or(&Value::Null);
            let width = int_field(image, "width").unwrap_or(0);
            let height = int_field(image, "height").unwrap_or(0);
            if width < i64::from(crawler.image_min_width) || height < i64::from(crawler.image_min_height) {
                return None;
            }

            let page_url = str_field(image, "contextLink").unwrap_or_else(|| image_url.clone());
            let mut item = CandidateItem::new(
                SourceType::GoogleImage,
                url_external_id(&image_url),
                page_url.clone(),
                str_field(result, "title").unwrap_or_default(),
                MediaType::Image,
            );
            item.content_url = image_url.clone();
            item.source_name = display_host(&page_url).unwrap_or_default();
            item.description = str_field(result, "snippet");
            item.thumbnail_url = Some(str_field(image, "thumbnailLink").unwrap_or(image_url));
            item.metadata.image_width = u32::try_from(width).ok();
            item.metadata.image_height = u32::try_from(height).ok();
            apply_hints(&mut item, spec);
            Some(item)
        })
        .collect()
}

/// Representative image from a result's `pagemap`.
fn pagemap_image(pagemap: &Value) -> Option<String> {
    pagemap
        .pointer("/cse_image/0")
        .and_then(|v| str_field(v, "src"))
        .or_else(|| pagemap.pointer("/cse_thumbnail/0").and_then(|v| str_field(v, "src")))
        .or_else(|| pagemap.pointer("/metatags/0").and_then(|v| str_field(v, "og:image")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> QuerySpec {
        QuerySpec {
            query: "hospital delivery robot".into(),
            category: Some("service_robotics".into()),
            tasks: vec!["delivery".into()],
        }
    }

    #[test]
    fn news_results() {
        let response = serde_json::json!({
            "items": [
                {
                    "link": "https://www.example.com/story",
                    "title": "Robots deliver meds",
                    "snippet": "A hospital deployed...",
                    "pagemap": {"metatags": [{"og:image": "https://www.example.com/og.jpg"}]}
                },
                {"title": "no link"}
            ]
        });
        let items = parse_news_response(&response, &spec());
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.source_type, SourceType::GoogleNews);
        assert_eq!(item.source_name, "example.com");
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://www.example.com/og.jpg"));
        assert_eq!(item.default_category.as_deref(), Some("service_robotics"));
        assert_eq!(item.default_tasks, vec!["delivery"]);
        assert_eq!(item.metadata.search_query.as_deref(), Some("hospital delivery robot"));
    }

    #[test]
    fn cse_image_wins_over_metatags() {
        let pagemap = serde_json::json!({
            "cse_image": [{"src": "https://a/cse.jpg"}],
            "metatags": [{"og:image": "https://a/og.jpg"}]
        });
        assert_eq!(pagemap_image(&pagemap).as_deref(), Some("https://a/cse.jpg"));
        assert_eq!(pagemap_image(&serde_json::json!({})), None);
    }

    #[test]
    fn image_results_are_size_filtered() {
        let response = serde_json::json!({
            "items": [
                {
                    "link": "https://cdn.example.com/big.jpg",
                    "title": "Robot in ward",
                    "image": {"width": 1200, "height": 800, "contextLink": "https://example.com/post", "thumbnailLink": "https://t/1.jpg"}
                },
                {
                    "link": "https://cdn.example.com/small.jpg",
                    "image": {"width": 200, "height": 100}
                }
            ]
        });
        let items = parse_image_response(&response, &spec(), &CrawlerConfig::default());
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.source_url, "https://example.com/post");
        assert_eq!(item.content_url, "https://cdn.example.com/big.jpg");
        assert_eq!(item.external_id, url_external_id("https://cdn.example.com/big.jpg"));
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://t/1.jpg"));
        assert_eq!(item.metadata.image_width, Some(1200));
        assert_eq!(item.media_type, MediaType::Image);
    }

    #[tokio::test]
    async fn image_adapter_sends_image_params_and_archives() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("searchType", "image"))
            .and(query_param("cx", "engine"))
            .and(query_param("dateRestrict", "d365"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::parse_config(
            "[db]\npath = \"g.sqlite\"\n[rate_limits]\nrequests_per_second = 1000.0\n",
        )
        .unwrap();
        config.sources.search.google_api_base = server.uri();
        config.sources.search.image_queries.push(spec());
        let archive = Arc::new(RawArchive::with_stamp(tmp.path(), "t"));
        let quota = Arc::new(QuotaBudget::new("google", 100));
        let adapter = GoogleSearchAdapter::new(
            GoogleSearchKind::Images,
            &config,
            "key".into(),
            "engine".into(),
            quota.clone(),
            Some(archive.clone()),
        )
        .unwrap();

        assert!(adapter.produce().await.unwrap().is_empty());
        assert_eq!(quota.used(), 1);
        let archived = crate::archive::read_archive(&archive.path_for("google_images")).unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].search_type, "images");
        assert_eq!(archived[0].category_hint.as_deref(), Some("service_robotics"));
    }
}
