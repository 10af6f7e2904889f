//! Classification result and the validation rules applied to model output.
//!
//! The language model answers in free text that is supposed to be a JSON
//! object. Whatever it returns, [`ClassificationResult::validate`] turns
//! the parsed object into a result in which every field is a vocabulary
//! member or a documented default. Validation never fails and is
//! idempotent: validating the serialized form of a validated result yields
//! the same result.
//!
//! # Defaults
//!
//! | Field | Invalid or missing |
//! |-------|--------------------|
//! | `content_type` | `tech_demo` |
//! | `deployment_maturity` | `unknown` |
//! | `application_category` | hint, else `industrial_automation` |
//! | `scene_type` | `null` |
//! | `educational_value` | `2` (clamped to 1..=5) |
//! | `relevance_score` | `0.5` (clamped to 0..=1) |
//! | `task_types` | hint tasks, else derived from `specific_tasks` |
//! | `confidence` | `0.7` for each sub-dimension |
//!
//! After clamping, `relevance_score` is tied to `content_type`: a
//! `tech_demo` never scores above 0.6, and a `real_application` or
//! `case_study` never scores below 0.7.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{truncate_chars, CandidateItem};
use crate::taxonomy::{
    derive_task_types, parse_terms, ApplicationCategory, ContentType, DeploymentMaturity,
    DeploymentScale, FloorType, FunctionalRequirement, HumanPresence, Lighting, ProblemSolved,
    SceneType, Setting, SpecificTask, TaskType, MAX_TASK_TYPES,
};

/// Cap on specific tasks kept per item.
pub const MAX_SPECIFIC_TASKS: usize = 3;
/// Cap on the stored summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 1000;

pub const DEFAULT_EDUCATIONAL_VALUE: u8 = 2;
pub const DEFAULT_RELEVANCE: f64 = 0.5;
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Relevance and confidence used when the model could not be reached.
pub const FALLBACK_RELEVANCE: f64 = 0.4;
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Upper bound on relevance for staged demos.
pub const TECH_DEMO_MAX_RELEVANCE: f64 = 0.6;
/// Lower bound on relevance for real deployments and case studies.
pub const DEPLOYMENT_MIN_RELEVANCE: f64 = 0.7;

/// Sub-dimensions that always carry a confidence value.
pub const CONFIDENCE_KEYS: [&str; 4] = ["category", "tasks", "requirements", "content_type"];

/// Physical environment shown in the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub setting: Option<Setting>,
    pub human_presence: Option<HumanPresence>,
    pub floor_type: Option<FloorType>,
    pub lighting: Option<Lighting>,
}

/// Business context of the shown deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationContext {
    pub problem_solved: Option<ProblemSolved>,
    pub deployment_scale: Option<DeploymentScale>,
    pub customer_identified: bool,
    pub has_metrics: bool,
}

/// A validated, taxonomy-constrained judgment for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content_type: ContentType,
    pub deployment_maturity: DeploymentMaturity,
    pub application_category: ApplicationCategory,
    pub specific_tasks: Vec<SpecificTask>,
    pub task_types: Vec<TaskType>,
    pub scene_type: Option<SceneType>,
    pub application_context: ApplicationContext,
    pub educational_value: u8,
    pub functional_requirements: Vec<FunctionalRequirement>,
    pub environment: Environment,
    pub summary: Option<String>,
    pub relevance_score: f64,
    pub confidence: BTreeMap<String, f64>,
}

/// Adapter-supplied hints used to back-fill fields the model left empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationHints<'a> {
    pub category: Option<&'a str>,
    pub tasks: &'a [String],
}

impl<'a> ClassificationHints<'a> {
    pub fn from_item(item: &'a CandidateItem) -> Self {
        Self {
            category: item.default_category.as_deref(),
            tasks: &item.default_tasks,
        }
    }
}

impl ClassificationResult {
    /// The result of validating an empty model answer with no hints.
    pub fn empty() -> Self {
        Self::validate(&Map::new(), ClassificationHints::default())
    }

    /// Validate a parsed model answer.
    pub fn validate(raw: &Map<String, Value>, hints: ClassificationHints<'_>) -> Self {
        let category_term = term(raw.get("application_category")).or(hints.category);
        let application_category = category_term
            .and_then(ApplicationCategory::parse)
            .unwrap_or(ApplicationCategory::IndustrialAutomation);

        let content_type = term(raw.get("content_type"))
            .and_then(ContentType::parse)
            .unwrap_or(ContentType::TechDemo);
        let deployment_maturity = term(raw.get("deployment_maturity"))
            .and_then(DeploymentMaturity::parse)
            .unwrap_or(DeploymentMaturity::Unknown);
        let scene_type = term(raw.get("scene_type")).and_then(SceneType::parse);

        let mut specific_tasks = parse_terms(&str_list(raw.get("specific_tasks")), SpecificTask::parse);
        specific_tasks.truncate(MAX_SPECIFIC_TASKS);

        let task_terms = if is_absent(raw.get("task_types")) {
            hints.tasks.iter().map(String::as_str).collect()
        } else {
            str_list(raw.get("task_types"))
        };
        let mut task_types = parse_terms(&task_terms, TaskType::parse);
        task_types.truncate(MAX_TASK_TYPES);
        if task_types.is_empty() {
            task_types = derive_task_types(&specific_tasks);
        }

        let functional_requirements = parse_terms(
            &str_list(raw.get("functional_requirements")),
            FunctionalRequirement::parse,
        );

        let educational_value = coerce_int(raw.get("educational_value"))
            .map(|v| v.clamp(1, 5) as u8)
            .unwrap_or(DEFAULT_EDUCATIONAL_VALUE);

        let relevance = coerce_float(raw.get("relevance_score"))
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_RELEVANCE);
        let relevance_score = adjust_relevance(content_type, relevance);

        let summary = term(raw.get("summary")).map(|s| truncate_chars(s, SUMMARY_MAX_CHARS));

        Self {
            content_type,
            deployment_maturity,
            application_category,
            specific_tasks,
            task_types,
            scene_type,
            application_context: parse_context(raw.get("application_context")),
            educational_value,
            functional_requirements,
            environment: parse_environment(raw.get("environment")),
            summary,
            relevance_score,
            confidence: parse_confidence(raw.get("confidence")),
        }
    }

    /// The result used when the model could not be consulted at all.
    ///
    /// Category and task types come from the item's hints; everything else
    /// is a conservative default that will normally fall below the
    /// relevance gate.
    pub fn fallback(item: &CandidateItem) -> Self {
        let hints = ClassificationHints::from_item(item);
        let application_category = hints
            .category
            .and_then(ApplicationCategory::parse)
            .unwrap_or(ApplicationCategory::IndustrialAutomation);
        let hint_terms: Vec<&str> = hints.tasks.iter().map(String::as_str).collect();
        let mut task_types = parse_terms(&hint_terms, TaskType::parse);
        task_types.truncate(MAX_TASK_TYPES);

        Self {
            content_type: ContentType::TechDemo,
            deployment_maturity: DeploymentMaturity::Unknown,
            application_category,
            specific_tasks: Vec::new(),
            task_types,
            scene_type: None,
            application_context: ApplicationContext::default(),
            educational_value: DEFAULT_EDUCATIONAL_VALUE,
            functional_requirements: Vec::new(),
            environment: Environment {
                setting: Some(Setting::Indoor),
                human_presence: Some(HumanPresence::LowTraffic),
                floor_type: None,
                lighting: None,
            },
            summary: Some(format!("Robotics content from {}", item.source_name)),
            relevance_score: adjust_relevance(ContentType::TechDemo, FALLBACK_RELEVANCE),
            confidence: CONFIDENCE_KEYS
                .iter()
                .map(|k| (k.to_string(), FALLBACK_CONFIDENCE))
                .collect(),
        }
    }

    /// Serialize to the JSON shape the model is asked to produce.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Apply the content-type/relevance consistency rule to a clamped score.
pub fn adjust_relevance(content_type: ContentType, score: f64) -> f64 {
    match content_type {
        ContentType::TechDemo => score.min(TECH_DEMO_MAX_RELEVANCE),
        ContentType::RealApplication | ContentType::CaseStudy => {
            score.max(DEPLOYMENT_MIN_RELEVANCE)
        }
        _ => score,
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// A non-empty trimmed string, or `None`.
fn term(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String members of an array. A bare string counts as a one-element list.
fn str_list(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim()],
        _ => Vec::new(),
    }
}

fn coerce_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let f = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (!f.is_nan()).then_some(f)
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn parse_confidence(value: Option<&Value>) -> BTreeMap<String, f64> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| coerce_float(Some(v)).map(|f| (k.clone(), f.clamp(0.0, 1.0))))
            .collect(),
        _ => CONFIDENCE_KEYS
            .iter()
            .map(|k| (k.to_string(), DEFAULT_CONFIDENCE))
            .collect(),
    }
}

fn parse_context(value: Option<&Value>) -> ApplicationContext {
    let Some(Value::Object(map)) = value else {
        return ApplicationContext::default();
    };
    ApplicationContext {
        problem_solved: term(map.get("problem_solved")).and_then(ProblemSolved::parse),
        deployment_scale: term(map.get("deployment_scale")).and_then(DeploymentScale::parse),
        customer_identified: coerce_bool(map.get("customer_identified")),
        has_metrics: coerce_bool(map.get("has_metrics")),
    }
}

fn parse_environment(value: Option<&Value>) -> Environment {
    let Some(Value::Object(map)) = value else {
        return Environment::default();
    };
    Environment {
        setting: term(map.get("setting")).and_then(Setting::parse),
        human_presence: term(map.get("human_presence")).and_then(HumanPresence::parse),
        floor_type: term(map.get("floor_type")).and_then(FloorType::parse),
        lighting: term(map.get("lighting")).and_then(Lighting::parse),
    }
}
