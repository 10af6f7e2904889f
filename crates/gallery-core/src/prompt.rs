//! Classification prompt.
//!
//! The vocabularies in the prompt are rendered from the taxonomy enums, so
//! the model is always asked for exactly the terms the validator accepts.

use std::fmt::Write;

use crate::models::{truncate_chars, CandidateItem, TITLE_MAX_CHARS};
use crate::taxonomy::{
    ApplicationCategory, DeploymentMaturity, DeploymentScale, FloorType,
    FunctionalRequirement, HumanPresence, Lighting, ProblemSolved, SceneType, Setting,
    SpecificTask, TaskType,
};

/// Default cap on the description embedded in the prompt.
pub const DEFAULT_DESCRIPTION_LIMIT: usize = 2000;

fn terms<T: Copy + std::fmt::Display>(all: &[T]) -> String {
    all.iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the classification prompt for one item.
pub fn build_prompt(item: &CandidateItem, description_limit: usize) -> String {
    let title = truncate_chars(&item.title, TITLE_MAX_CHARS);
    let description = item
        .description
        .as_deref()
        .map(|d| truncate_chars(d, description_limit))
        .unwrap_or_default();

    let mut p = String::with_capacity(4096);
    p.push_str(
        "You are classifying robotics content for a gallery of real-world robot \
         applications. Judge what the content actually shows.\n\n",
    );
    let _ = writeln!(p, "Title: {title}");
    let _ = writeln!(p, "Description: {description}");
    let _ = writeln!(p, "Source: {}", item.source_name);
    let _ = writeln!(p, "Media type: {}", item.media_type);
    p.push('\n');

    p.push_str("content_type, pick one:\n");
    p.push_str("- real_application: a robot doing real work at a named customer site\n");
    p.push_str("- pilot_poc: a trial or proof of concept at a real site\n");
    p.push_str("- case_study: a deployment write-up with outcomes or metrics\n");
    p.push_str("- tech_demo: a lab, trade show, or staged demonstration\n");
    p.push_str("- product_announcement: a product launch or marketing piece\n");
    p.push_str("- tutorial: a how-to or educational walkthrough\n");
    p.push_str("When unsure between real_application and tech_demo, answer tech_demo.\n\n");

    let _ = writeln!(p, "deployment_maturity, pick one: {}", terms(DeploymentMaturity::ALL));
    let _ = writeln!(p, "application_category, pick one: {}", terms(ApplicationCategory::ALL));
    let _ = writeln!(p, "specific_tasks, up to 3 of: {}", terms(SpecificTask::ALL));
    let _ = writeln!(p, "task_types, up to 3 of: {}", terms(TaskType::ALL));
    let _ = writeln!(p, "scene_type, one of or null: {}", terms(SceneType::ALL));
    let _ = writeln!(
        p,
        "functional_requirements, any of: {}",
        terms(FunctionalRequirement::ALL)
    );
    let _ = writeln!(
        p,
        "environment.setting: {}; environment.human_presence: {}; \
         environment.floor_type: {}; environment.lighting: {}",
        terms(Setting::ALL),
        terms(HumanPresence::ALL),
        terms(FloorType::ALL),
        terms(Lighting::ALL)
    );
    let _ = writeln!(
        p,
        "application_context.problem_solved: {}; application_context.deployment_scale: {}",
        terms(ProblemSolved::ALL),
        terms(DeploymentScale::ALL)
    );
    p.push_str(
        "educational_value: integer 1-5. relevance_score: 0.0-1.0, how useful this is \
         as an example of robots deployed in the real world.\n\n",
    );

    p.push_str(
        "Respond with a single JSON object and nothing else, in this shape:\n\
         {\n\
         \x20 \"content_type\": \"tech_demo\",\n\
         \x20 \"deployment_maturity\": \"unknown\",\n\
         \x20 \"application_category\": \"industrial_automation\",\n\
         \x20 \"specific_tasks\": [],\n\
         \x20 \"task_types\": [],\n\
         \x20 \"scene_type\": null,\n\
         \x20 \"functional_requirements\": [],\n\
         \x20 \"environment\": {\"setting\": null, \"human_presence\": null, \"floor_type\": null, \"lighting\": null},\n\
         \x20 \"application_context\": {\"problem_solved\": null, \"deployment_scale\": null, \"customer_identified\": false, \"has_metrics\": false},\n\
         \x20 \"educational_value\": 2,\n\
         \x20 \"relevance_score\": 0.5,\n\
         \x20 \"confidence\": {\"category\": 0.5, \"tasks\": 0.5, \"requirements\": 0.5, \"content_type\": 0.5},\n\
         \x20 \"summary\": \"one or two sentences\"\n\
         }\n",
    );
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, SourceType};

    #[test]
    fn prompt_lists_every_vocabulary_term() {
        let item = CandidateItem::new(
            SourceType::News,
            "x",
            "https://example.com/a",
            "AMRs at a 3PL",
            MediaType::Article,
        );
        let p = build_prompt(&item, DEFAULT_DESCRIPTION_LIMIT);
        for t in SpecificTask::ALL {
            assert!(p.contains(t.as_str()), "missing {t}");
        }
        for t in FunctionalRequirement::ALL {
            assert!(p.contains(t.as_str()), "missing {t}");
        }
        assert!(p.contains("Title: AMRs at a 3PL"));
    }

    #[test]
    fn description_is_truncated() {
        let mut item = CandidateItem::new(
            SourceType::News,
            "x",
            "https://example.com/a",
            "t",
            MediaType::Article,
        );
        item.description = Some(format!("{}TAIL", "a".repeat(50)));
        let p = build_prompt(&item, 50);
        assert!(!p.contains("TAIL"));
    }
}
