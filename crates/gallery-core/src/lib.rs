//! # Gallery Core
//!
//! Shared logic for the robotics application gallery: the candidate and
//! record models, the closed classification taxonomy, the classifier
//! contract with its validation rules, URL canonicalization, and the store
//! abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Everything that talks to the outside world lives in the
//! `gallery-crawler` application crate and plugs in through the
//! [`classifier::LanguageModel`] and [`store::GalleryStore`] traits.

#[macro_use]
mod vocab;

pub mod canonical;
pub mod classification;
pub mod classifier;
pub mod models;
pub mod prompt;
pub mod store;
pub mod taxonomy;
