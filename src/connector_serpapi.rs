//! SerpAPI adapters (`serpapi` and `serpapi_images`).
//!
//! Same query lists as the Google Custom Search adapters, sent through
//! SerpAPI's `google` and `google_images` engines. Searches are counted
//! against a per-run budget shared with the social adapter. Raw responses
//! go to the archive before parsing; the parse functions here are also
//! used by `gallery reprocess`.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpApiKind {
    News,
    Images,
}

impl SerpApiKind {
    pub fn adapter_name(&self) -> &'static str {
        match self {
            SerpApiKind::News => "serpapi",
            SerpApiKind::Images => "serpapi_images",
        }
    }

    pub fn search_type(&self) -> &'static str {
        match self {
            SerpApiKind::News => "news",
            SerpApiKind::Images => "images",
        }
    }
}

pub struct SerpApiAdapter {
    kind: SerpApiKind,
    search: SearchConfig,
    crawler: CrawlerConfig,
    api_key: String,
    client: reqwest::Client,
    pacer: Pacer,
    budget: Arc<QuotaBudget>,
    archive: Option<Arc<RawArchive>>,
}

impl SerpApiAdapter {
    pub fn new(
        kind: SerpApiKind,
        config: &Config,
        api_key: String,
        budget: Arc<QuotaBudget>,
        archive: Option<Arc<RawArchive>>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            search: config.sources.search.clone(),
            crawler: config.crawler.clone(),
            api_key,
            client: build_client(&config.crawler)?,
            pacer: Pacer::per_second(config.rate_limits.requests_per_second),
            budget,
            archive,
        })
    }

    fn queries(&self) -> &[QuerySpec] {
        match self.kind {
            SerpApiKind::News => &self.search.news_queries,
            SerpApiKind::Images => &self.search.image_queries,
        }
    }

    async fn run_query(&self, spec: &QuerySpec) -> Result<Option<Vec<CandidateItem>>> {
        if !self.budget.try_spend(1) {
            return Ok(None);
        }
        self.pacer.wait().await;

        let mut query = vec![
            ("api_key", self.api_key.clone()),
            ("q", spec.query.clone()),
            ("num", self.search.results_per_search.to_string()),
        ];
        match self.kind {
            SerpApiKind::News => query.push(("engine", "google".into())),
            SerpApiKind::Images => {
                query.push(("engine", "google_images".into()));
                query.push(("tbm", "isch".into()));
            }
        }
        let response = get_json(&self.client, &self.search.serpapi_base, &query).await?;
        if let Some(error) = str_field(&response, "error") {
            anyhow::bail!("SerpAPI error: {error}");
        }

        let record = RawRecord::new(self.kind.adapter_name(), spec, self.kind.search_type(), response);
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.append(&record) {
                tracing::warn!(error = %format!("{e:#}"), "failed to archive raw response");
            }
        }

        let limit = self.search.results_per_search as usize;
        Ok(Some(match self.kind {
            SerpApiKind::News => parse_news_response(&record.response, spec, limit),
            SerpApiKind::Images => parse_image_response(&record.response, spec, &self.crawler, limit),
        }))
    }
}

#[async_trait]
impl SourceAdapter for SerpApiAdapter {
    fn name(&self) -> &str {
        self.kind.adapter_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            SerpApiKind::News => "Articles from SerpAPI Google web search",
            SerpApiKind::Images => "Large photos from SerpAPI Google image search",
        }
    }

    fn source_types(&self) -> &[SourceType] {
        match self.kind {
            SerpApiKind::News => &[SourceType::SerpapiNews],
            SerpApiKind::Images => &[SourceType::SerpapiImage],
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
        tracing::info!(adapter = self.name(), items = items.len(), searches_used = self.budget.used(), "serpapi search complete");
        Ok(items)
    }
}

fn array<'a>(response: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    response
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Candidates from a `google` engine response (`organic_results`).
pub fn parse_news_response(response: &Value, spec: &QuerySpec, limit: usize) -> Vec<CandidateItem> {
    array(response, "organic_results")
        .take(limit)
        .filter_map(|result| {
            let url = str_field(result, "link")?;
            let mut item = CandidateItem::new(
                SourceType::SerpapiNews,
                url_external_id(&url),
                url.clone(),
                str_field(result, "title").unwrap_or_default(),
                MediaType::Article,
            );
            item.source_name = display_host(&url).unwrap_or_default();
            item.description = str_field(result, "snippet");
            item.thumbnail_url = str_field(result, "thumbnail");
            item.default_category = spec.category.clone();
            item.default_tasks = spec.tasks.clone();
            item.metadata.search_query = Some(spec.query.clone());
            Some(item)
        })
        .collect()
}

/// Candidates from a `google_images` engine response (`images_results`),
/// dropping images below the configured minimum size.
pub fn parse_image_response(
    response: &Value,
    spec: &QuerySpec,
    crawler: &CrawlerConfig,
    limit: usize,
) -> Vec<CandidateItem> {
    array(response, "images_results")
        .take(limit)
        .filter_map(|result| {
            let image_url = str_field(result, "original")?;
            let width = int_field(result, "original_width").unwrap_or(0);
            let height = int_field(result, "original_height").unwrap_or(0);
            if width < i64::from(crawler.image_min_width) || height < i64::from(crawler.image_min_height) {
                return None;
            }

            let page_url = str_field(result, "link").unwrap_or_else(|| image_url.clone());
            let source_name = str_field(result, "source")
                .or_else(|| display_host(&page_url))
                .unwrap_or_default();
            let mut item = CandidateItem::new(
                SourceType::SerpapiImage,
                url_external_id(&image_url),
                page_url,
                str_field(result, "title").unwrap_or_default(),
                MediaType::Image,
            );
            item.content_url = image_url.clone();
            item.description = Some(format!("Image from {source_name}"));
            item.source_name = source_name;
            item.thumbnail_url = Some(str_field(result, "thumbnail").unwrap_or(image_url));
            item.metadata.image_width = u32::try_from(width).ok();
            item.metadata.image_height = u32::try_from(height).ok();
            item.default_category = spec.category.clone();
            item.default_tasks = spec.tasks.clone();
            item.metadata.search_query = Some(spec.query.clone());
            Some(item)
        })
        .collect()
}
