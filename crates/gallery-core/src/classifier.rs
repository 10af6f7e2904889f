//! The classifier: prompt a language model, parse its answer, validate.
//!
//! [`Classifier::classify`] never fails. Every path ends in a valid
//! [`ClassificationResult`]; the accompanying [`ClassifyOutcome`] records
//! which path was taken so callers can log degraded answers.
//!
//! ```text
//! item ──▶ prompt ──▶ LanguageModel::generate
//!                         │ Ok(text)            │ Err(e)
//!                         ▼                     ▼
//!                  strip fences, parse    ClassificationResult::fallback
//!                   │ object   │ other          (Fallback(e))
//!                   ▼          ▼
//!               validate   validate({})
//!               (Model)    (Unparsable)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::classification::{ClassificationHints, ClassificationResult};
use crate::models::CandidateItem;
use crate::prompt::{build_prompt, DEFAULT_DESCRIPTION_LIMIT};

/// Errors a [`LanguageModel`] implementation may report.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned no text")]
    EmptyResponse,
}

/// A text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// How a classification was obtained.
#[derive(Debug)]
pub enum ClassifyOutcome {
    /// The model answered with a JSON object.
    Model,
    /// The model answered, but not with a JSON object.
    Unparsable,
    /// The model could not be consulted.
    Fallback(ModelError),
}

impl ClassifyOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ClassifyOutcome::Model)
    }
}

/// A validated result plus the path that produced it.
#[derive(Debug)]
pub struct Classified {
    pub result: ClassificationResult,
    pub outcome: ClassifyOutcome,
}

/// Taxonomy classifier over an injected [`LanguageModel`].
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn LanguageModel>,
    description_limit: usize,
}

impl Classifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            description_limit: DEFAULT_DESCRIPTION_LIMIT,
        }
    }

    /// Override the description length embedded in the prompt.
    pub fn with_description_limit(mut self, limit: usize) -> Self {
        self.description_limit = limit;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Classify one candidate.
    pub async fn classify(&self, item: &CandidateItem) -> Classified {
        let prompt = build_prompt(item, self.description_limit);
        match self.model.generate(&prompt).await {
            Ok(text) => self.interpret(item, &text),
            Err(e) => self.fallback(item, e),
        }
    }

    /// Validate a raw model answer for `item`.
    pub fn interpret(&self, item: &CandidateItem, text: &str) -> Classified {
        let hints = ClassificationHints::from_item(item);
        match parse_model_output(text) {
            Some(raw) => Classified {
                result: ClassificationResult::validate(&raw, hints),
                outcome: ClassifyOutcome::Model,
            },
            None => {
                tracing::debug!(
                    external_id = %item.external_id,
                    "model answer was not a JSON object"
                );
                Classified {
                    result: ClassificationResult::validate(&Map::new(), hints),
                    outcome: ClassifyOutcome::Unparsable,
                }
            }
        }
    }

    /// The total-failure result for `item`.
    pub fn fallback(&self, item: &CandidateItem, error: ModelError) -> Classified {
        Classified {
            result: ClassificationResult::fallback(item),
            outcome: ClassifyOutcome::Fallback(error),
        }
    }
}

/// Strip code fences from a model answer and parse it as a JSON object.
///
/// Accepts the payload bare, wrapped in ```` ```json ```` / ```` ``` ````
/// fences, or preceded by prose with a fenced block. Anything that is not
/// a JSON object yields `None`.
pub fn parse_model_output(text: &str) -> Option<Map<String, Value>> {
    let body = strip_fences(text);
    match serde_json::from_str::<Value>(body).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    if !s.starts_with("```") {
        if let Some(idx) = s.find("```json") {
            s = &s[idx..];
        }
    }
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(end) = s.find("```") {
        s = &s[..end];
    }
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, SourceType};
    use crate::taxonomy::ContentType;
    use std::sync::Mutex;

    struct Scripted {
        answers: Mutex<Vec<Result<String, ModelError>>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn item() -> CandidateItem {
        let mut item = CandidateItem::new(
            SourceType::News,
            "n1",
            "https://example.com/n1",
            "Hospital delivery robots",
            MediaType::Article,
        );
        item.source_name = "example.com".into();
        item
    }

    #[test]
    fn strips_json_fences() {
        let m = parse_model_output("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(m["a"], 1);
        let m = parse_model_output("```\n{\"a\": 2}\n```").unwrap();
        assert_eq!(m["a"], 2);
        let m = parse_model_output("  {\"a\": 3}  ").unwrap();
        assert_eq!(m["a"], 3);
    }

    #[test]
    fn fenced_block_after_prose() {
        let m = parse_model_output("Here you go:\n```json\n{\"a\": 4}\n```\nThanks").unwrap();
        assert_eq!(m["a"], 4);
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(parse_model_output("[1, 2]").is_none());
        assert!(parse_model_output("I think it's a demo").is_none());
        assert!(parse_model_output("").is_none());
    }

    #[tokio::test]
    async fn model_answer_is_validated() {
        let model = Scripted::new(vec![Ok(
            "```json\n{\"content_type\": \"real_application\", \"relevance_score\": 0.55}\n```"
                .into(),
        )]);
        let c = Classifier::new(model).classify(&item()).await;
        assert!(matches!(c.outcome, ClassifyOutcome::Model));
        assert_eq!(c.result.content_type, ContentType::RealApplication);
        assert_eq!(c.result.relevance_score, 0.7);
    }

    #[tokio::test]
    async fn prose_answer_is_unparsable_but_valid() {
        let model = Scripted::new(vec![Ok("This looks like a warehouse robot.".into())]);
        let c = Classifier::new(model).classify(&item()).await;
        assert!(matches!(c.outcome, ClassifyOutcome::Unparsable));
        assert_eq!(c.result, ClassificationResult::empty());
    }

    #[tokio::test]
    async fn model_error_yields_fallback() {
        let model = Scripted::new(vec![Err(ModelError::Api {
            status: 503,
            body: "overloaded".into(),
        })]);
        let c = Classifier::new(model).classify(&item()).await;
        assert!(c.outcome.is_degraded());
        assert!(matches!(c.outcome, ClassifyOutcome::Fallback(ModelError::Api { status: 503, .. })));
        assert_eq!(c.result.relevance_score, 0.4);
        assert_eq!(
            c.result.summary.as_deref(),
            Some("Robotics content from example.com")
        );
    }
}
