//! HTTP plumbing shared by the source adapters.
//!
//! One `reqwest` client per adapter, built with the crawler's timeout and
//! user agent, plus a JSON `GET` helper that turns non-2xx answers into
//! errors carrying the status and the start of the body. Transport errors
//! are stripped of their URL before they are wrapped, so query parameters
//! (which carry API keys) never appear in error messages.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use gallery_core::models::truncate_chars;

use crate::config::CrawlerConfig;

/// Build the client every adapter request goes through.
pub fn build_client(crawler: &CrawlerConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(crawler.http_timeout_secs))
        .user_agent(crawler.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")
}

/// `GET url?query` and decode the body as JSON.
pub async fn get_json(client: &reqwest::Client, url: &str, query: &[(&str, String)]) -> Result<Value> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("request to {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{url} returned {status}: {}", truncate_chars(body.trim(), 300));
    }

    response
        .json()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{url} returned invalid JSON"))
}

/// `GET url` and return the raw body bytes.
pub async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("{url} returned {status}");
    }
    let body = response.bytes().await.map_err(reqwest::Error::without_url)?;
    Ok(body.to_vec())
}

/// Non-empty string at `value[key]`, trimmed.
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integer at `value[key]`, given either as a number or a numeric string.
pub fn int_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn decodes_json_and_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "robot arm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = build_client(&CrawlerConfig::default()).unwrap();
        let url = format!("{}/search", server.uri());
        let value = get_json(&client, &url, &[("q", "robot arm".to_string())])
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn field_helpers() {
        let v = serde_json::json!({"a": " x ", "b": "", "n": "42", "m": 7, "f": 3.9});
        assert_eq!(str_field(&v, "a").as_deref(), Some("x"));
        assert_eq!(str_field(&v, "b"), None);
        assert_eq!(int_field(&v, "n"), Some(42));
        assert_eq!(int_field(&v, "m"), Some(7));
        assert_eq!(int_field(&v, "f"), Some(3));
        assert_eq!(int_field(&v, "a"), None);
    }

    #[tokio::test]
    async fn error_status_hides_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = build_client(&CrawlerConfig::default()).unwrap();
        let url = format!("{}/search", server.uri());
        let err = get_json(&client, &url, &[("key", "secret-key".to_string())])
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("403"));
        assert!(err.contains("quota exceeded"));
        assert!(!err.contains("secret-key"));
    }

    #[tokio::test]
    async fn transport_error_hides_query() {
        let client = build_client(&CrawlerConfig {
            http_timeout_secs: 2,
            ..CrawlerConfig::default()
        })
        .unwrap();
        let err = get_json(&client, "http://127.0.0.1:1/search", &[("key", "secret-key".to_string())])
            .await
            .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("request to http://127.0.0.1:1/search failed"));
        assert!(!text.contains("secret-key"), "leaked key: {text}");
    }

    #[tokio::test]
    async fn invalid_json_hides_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = build_client(&CrawlerConfig::default()).unwrap();
        let url = format!("{}/search", server.uri());
        let err = get_json(&client, &url, &[("key", "secret-key".to_string())])
            .await
            .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("invalid JSON"));
        assert!(!text.contains("secret-key"), "leaked key: {text}");
    }
}
