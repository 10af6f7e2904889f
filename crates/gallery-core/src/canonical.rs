//! URL canonicalization and URL-derived identifiers.
//!
//! The same post is often reachable under several hosts (`twitter.com`,
//! `mobile.twitter.com`, `x.com`). Dedup keys on the canonical form, so
//! every URL is passed through [`canonicalize_url`] before it is looked up
//! or written.

use sha2::{Digest, Sha256};
use url::Url;

/// Host aliases rewritten to a single canonical host.
const HOST_ALIASES: &[(&str, &str)] = &[
    ("twitter.com", "x.com"),
    ("www.twitter.com", "x.com"),
    ("mobile.twitter.com", "x.com"),
    ("www.x.com", "x.com"),
    ("mobile.x.com", "x.com"),
    ("m.youtube.com", "www.youtube.com"),
    ("youtube.com", "www.youtube.com"),
];

/// Canonical form of a URL for deduplication.
///
/// Lowercases the host, maps alias hosts onto their canonical host, and
/// drops the fragment. Strings that do not parse as absolute URLs are
/// returned trimmed but otherwise untouched.
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    url.set_fragment(None);

    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        let canonical = HOST_ALIASES
            .iter()
            .find(|(alias, _)| *alias == host)
            .map(|(_, to)| *to);
        if let Some(to) = canonical {
            // set_host only fails for cannot-be-a-base URLs, which have no host
            let _ = url.set_host(Some(to));
        }
    }
    url.to_string()
}

/// First 16 hex characters of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Stable external id for URL-keyed sources.
pub fn url_external_id(raw_url: &str) -> String {
    short_hash(&canonicalize_url(raw_url))
}

/// Host of a URL without a leading `www.`, used as a display source name.
pub fn display_host(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
