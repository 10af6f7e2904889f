//! Source adapter trait and registry.
//!
//! Every external source implements [`SourceAdapter`]: it turns its
//! configured queries, channels or feeds into [`CandidateItem`]s. The
//! pipeline never sees anything source-specific beyond that shape.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 AdapterRegistry                   │
//! │  ┌────────┐ ┌──────┐ ┌────────────┐ ┌──────────┐  │
//! │  │youtube │ │ news │ │google/serp │ │  social  │  │
//! │  │  API   │ │ RSS  │ │news+images │ │ site: q. │  │
//! │  └────────┘ └──────┘ └────────────┘ └──────────┘  │
//! └───────────────────────┬───────────────────────────┘
//!                         ▼
//!        run_crawl() → dedup → classify → gate → store
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # use gallery_crawler::traits::AdapterRegistry;
//! # fn example(registry: &AdapterRegistry) -> anyhow::Result<()> {
//! let selected = registry.select(&["youtube".to_string(), "news".to_string()])?;
//! assert_eq!(selected.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use gallery_core::models::{CandidateItem, SourceType};

use crate::archive::RawArchive;
use crate::config::{Config, Credentials};

/// Adapter names in registration order.
pub const ADAPTER_NAMES: [&str; 7] = [
    "youtube",
    "news",
    "google",
    "google_images",
    "serpapi",
    "serpapi_images",
    "social",
];

// ═══════════════════════════════════════════════════════════════════════
// SourceAdapter Trait
// ═══════════════════════════════════════════════════════════════════════

/// A configured source that produces candidate items.
///
/// # Lifecycle
///
/// 1. Built by [`AdapterRegistry::from_config`] or registered with
///    [`AdapterRegistry::register`].
/// 2. [`produce`](SourceAdapter::produce) is called once per crawl, on its
///    own tokio task, concurrently with the other selected adapters.
/// 3. The returned candidates are flattened and processed one at a time.
///
/// Failures of single queries or entries are logged and skipped inside
/// the adapter. An `Err` means the adapter as a whole could not run; the
/// crawl logs it and carries on with zero candidates from that adapter.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used for `--sources` selection (e.g. `"youtube"`).
    fn name(&self) -> &str;

    /// One-line description for `gallery sources`.
    fn description(&self) -> &str;

    /// Source types this adapter emits.
    fn source_types(&self) -> &[SourceType];

    async fn produce(&self) -> Result<Vec<CandidateItem>>;
}

// ═══════════════════════════════════════════════════════════════════════
// AdapterRegistry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of source adapters.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Create a registry holding every built-in adapter.
    ///
    /// Adapters whose credentials are missing are still registered; the
    /// crawl command checks credentials for the selected adapters before
    /// anything runs. Search adapters write raw responses to `archive`
    /// when one is given.
    pub fn from_config(
        config: &Config,
        creds: &Credentials,
        archive: Option<Arc<RawArchive>>,
    ) -> Result<Self> {
        use crate::connector_google::{GoogleSearchAdapter, GoogleSearchKind};
        use crate::connector_news::NewsAdapter;
        use crate::connector_serpapi::{SerpApiAdapter, SerpApiKind};
        use crate::connector_social::SocialAdapter;
        use crate::connector_youtube::YoutubeAdapter;

        let key = |k: &Option<String>| k.clone().unwrap_or_default();
        let google_quota = Arc::new(crate::pacing::QuotaBudget::new(
            "google",
            config.rate_limits.google_daily_quota,
        ));
        let serpapi_quota = Arc::new(crate::pacing::QuotaBudget::new(
            "serpapi",
            config.rate_limits.serpapi_searches_per_run,
        ));

        let mut registry = Self::new();
        registry.register(Arc::new(YoutubeAdapter::new(
            config,
            key(&creds.youtube_api_key),
        )?));
        registry.register(Arc::new(NewsAdapter::new(config)?));
        for kind in [GoogleSearchKind::News, GoogleSearchKind::Images] {
            registry.register(Arc::new(GoogleSearchAdapter::new(
                kind,
                config,
                key(&creds.google_search_api_key),
                key(&creds.google_search_engine_id),
                google_quota.clone(),
                archive.clone(),
            )?));
        }
        for kind in [SerpApiKind::News, SerpApiKind::Images] {
            registry.register(Arc::new(SerpApiAdapter::new(
                kind,
                config,
                key(&creds.serpapi_key),
                serpapi_quota.clone(),
                archive.clone(),
            )?));
        }
        registry.register(Arc::new(SocialAdapter::new(
            config,
            key(&creds.serpapi_key),
            serpapi_quota,
            archive,
        )?));
        Ok(registry)
    }

    /// Register an adapter. A later adapter with the same name shadows an earlier one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.retain(|a| a.name() != adapter.name());
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Resolve `--sources` names. `all` selects every adapter; unknown
    /// names are an error listing the known ones.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn SourceAdapter>>> {
        if names.is_empty() || names.iter().any(|n| n.trim() == "all") {
            return Ok(self.adapters.clone());
        }
        let mut selected: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        for name in names {
            let name = name.trim();
            if selected.iter().any(|a| a.name() == name) {
                continue;
            }
            match self.get(name) {
                Some(adapter) => selected.push(adapter),
                None => bail!(
                    "Unknown source '{}'. Available: all, {}",
                    name,
                    self.names().join(", ")
                ),
            }
        }
        Ok(selected)
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_core::models::MediaType;

    struct Fixed(&'static str);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "fixed"
        }
        fn source_types(&self) -> &[SourceType] {
            &[SourceType::Other]
        }
        async fn produce(&self) -> Result<Vec<CandidateItem>> {
            Ok(vec![CandidateItem::new(
                SourceType::Other,
                self.0,
                format!("https://example.com/{}", self.0),
                self.0,
                MediaType::Article,
            )])
        }
    }

    fn registry() -> AdapterRegistry {
        let mut r = AdapterRegistry::new();
        r.register(Arc::new(Fixed("a")));
        r.register(Arc::new(Fixed("b")));
        r
    }

    #[test]
    fn select_all_and_named() {
        let r = registry();
        assert_eq!(r.select(&["all".into()]).unwrap().len(), 2);
        assert_eq!(r.select(&[]).unwrap().len(), 2);
        let picked = r.select(&["b".into(), "b".into()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name(), "b");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let Err(err) = registry().select(&["c".into()]) else {
            panic!("expected unknown source to be rejected");
        };
        let err = err.to_string();
        assert!(err.contains("Unknown source 'c'"));
        assert!(err.contains("a, b"));
    }

    #[test]
    fn register_replaces_same_name() {
        let mut r = registry();
        r.register(Arc::new(Fixed("a")));
        assert_eq!(r.len(), 2);
        assert_eq!(r.names(), vec!["b", "a"]);
    }

    #[test]
    fn built_ins_are_all_registered() {
        let config = crate::config::parse_config("[db]\npath = \"g.sqlite\"\n").unwrap();
        let r = AdapterRegistry::from_config(&config, &Credentials::default(), None).unwrap();
        assert_eq!(r.names(), ADAPTER_NAMES.to_vec());
    }
}
