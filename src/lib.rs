//! # Robotics Gallery Crawler
//!
//! Collects robotics deployment content (videos, articles, images, social
//! posts) from external sources, classifies every candidate against a fixed
//! robotics taxonomy with a language model, and stores the relevant ones as
//! pending gallery records for human moderation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │   Adapters   │──▶│         Pipeline         │──▶│  SQLite  │
//! │ YouTube/RSS  │   │ dedup → classify → gate  │   │ gallery  │
//! │ Search/Social│   │   → merge → persist      │   │  + runs  │
//! └──────┬───────┘   └────────────┬─────────────┘   └────┬─────┘
//!        │                        │                      │
//!        ▼                        ▼                      ▼
//!  ┌────────────┐          ┌────────────┐         ┌────────────┐
//!  │ raw archive│          │   Gemini   │         │ moderation │
//!  │  (JSONL)   │          │ classifier │         │  commands  │
//!  └────────────┘          └────────────┘         └────────────┘
//! ```
//!
//! The data model, taxonomy, classifier contract and store trait live in the
//! dependency-light `gallery-core` crate; this crate supplies the concrete
//! adapters, the Gemini client, the SQLite store and the `gallery` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! gallery init                          # create database
//! gallery sources                       # check keys and targets
//! gallery crawl --sources youtube,news  # crawl and classify
//! gallery pending                       # review the queue
//! gallery moderate <id> --status approved
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`traits`] | `SourceAdapter` trait and adapter registry |
//! | [`connector_youtube`] | YouTube Data API v3 adapter |
//! | [`connector_news`] | RSS/Atom feed adapter |
//! | [`connector_google`] | Google Custom Search adapters |
//! | [`connector_serpapi`] | SerpAPI search adapters |
//! | [`connector_social`] | Social posts via SerpAPI `site:` search |
//! | [`http`] | Shared HTTP client helpers |
//! | [`pacing`] | Request pacing and quota budgets |
//! | [`archive`] | Raw search response archive |
//! | [`llm`] | Gemini language model client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`run`] | Crawler run tracking |
//! | [`reprocess`] | Re-ingest archived responses |
//! | [`reclassify`] | Batch reclassification |
//! | [`moderation`] | Pending queue, moderation, run history |
//! | [`stats`] | Catalog statistics |
//! | [`sources`] | Adapter readiness listing |
//! | [`progress`] | Crawl progress on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `GalleryStore` |

pub mod archive;
pub mod config;
pub mod connector_google;
pub mod connector_news;
pub mod connector_serpapi;
pub mod connector_social;
pub mod connector_youtube;
pub mod db;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod moderation;
pub mod pacing;
pub mod progress;
pub mod reclassify;
pub mod reprocess;
pub mod run;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
pub mod traits;
