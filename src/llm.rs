//! Gemini `generateContent` client.
//!
//! Implements [`LanguageModel`] over the Google Generative Language REST
//! API. The request timeout comes from `[classifier].timeout_secs`.
//!
//! Retry strategy:
//! - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error or timeout → retry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gallery_core::classifier::{Classifier, LanguageModel, ModelError};

use crate::config::{ClassifierConfig, ConfigError, Credentials};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize, Debug)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize, Debug)]
struct PartResponse {
    #[serde(default)]
    text: String,
}

/// Gemini language model.
#[derive(Clone, Debug)]
pub struct GeminiModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
    timeout: Duration,
}

impl GeminiModel {
    pub fn new(config: &ClassifierConfig, api_key: String) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            timeout,
        })
    }

    async fn call_once(&self, body: &GeminiRequest) -> Result<String, Attempt> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Attempt::Retry(ModelError::Timeout(self.timeout))
                } else {
                    Attempt::Retry(ModelError::Request(e.without_url().to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let err = ModelError::Api {
                status: status.as_u16(),
                body: body_text,
            };
            // Rate limited or server error: retry
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(Attempt::Retry(err));
            }
            return Err(Attempt::Fatal(err));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(ModelError::Request(e.without_url().to_string())))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Attempt::Fatal(ModelError::EmptyResponse));
        }
        Ok(text)
    }
}

enum Attempt {
    Retry(ModelError),
    Fatal(ModelError),
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.call_once(&body).await {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    tracing::debug!(attempt, error = %e, "gemini call failed, retrying");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ModelError::Request("retries exhausted".to_string())))
    }
}

/// Classifier over Gemini, configured from `[classifier]`.
pub fn build_classifier(
    config: &ClassifierConfig,
    credentials: &Credentials,
) -> anyhow::Result<Classifier> {
    let api_key = credentials.gemini_api_key.clone().ok_or_else(|| {
        ConfigError::MissingSettings(vec!["GEMINI_API_KEY (or GOOGLE_AI_API_KEY)".to_string()])
    })?;
    let model = GeminiModel::new(config, api_key)?;
    tracing::debug!(model = %config.model, "classifier ready");
    Ok(Classifier::new(Arc::new(model)).with_description_limit(config.description_limit))
}
