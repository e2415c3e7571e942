//! Prompt template loading and rendering via `minijinja`.
//!
//! Two templates make up a prompt: `system.j2` sets the narrator's voice and
//! `report.j2` lists the classified changes. Defaults are compiled into the
//! binary; pointing `TEMPLATES_DIR` at a directory holding both files
//! replaces them without recompiling.

use std::collections::BTreeMap;

use minijinja::{Environment, context};
use serde::Serialize;
use turnwatch_core::{StructuredChangeReport, SummarizerError};

use crate::error::RunnerError;

const TEMPLATE_NAMES: [&str; 2] = ["system", "report"];

const DEFAULT_SYSTEM: &str = include_str!("../templates/system.j2");
const DEFAULT_REPORT: &str = include_str!("../templates/report.j2");

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the narrator.
    pub system: String,
    /// User message carrying the turn report.
    pub user: String,
}

/// Unit changes folded per civilization; individual field edits are too
/// noisy to hand to a narrator.
#[derive(Serialize)]
struct MilitarySummary<'a> {
    civilization: &'a str,
    changes: usize,
}

impl PromptEngine {
    /// Create a prompt engine from the embedded templates, or from
    /// `system.j2` and `report.j2` in `templates_dir` when given.
    pub fn new(templates_dir: Option<&str>) -> Result<Self, RunnerError> {
        let mut env = Environment::new();

        match templates_dir {
            None => {
                env.add_template("system", DEFAULT_SYSTEM).map_err(|e| {
                    RunnerError::Template(format!("failed to add system template: {e}"))
                })?;
                env.add_template("report", DEFAULT_REPORT).map_err(|e| {
                    RunnerError::Template(format!("failed to add report template: {e}"))
                })?;
            }
            Some(dir) => {
                for name in TEMPLATE_NAMES {
                    let source = load_template(dir, &format!("{name}.j2"))?;
                    env.add_template_owned(name, source).map_err(|e| {
                        RunnerError::Template(format!("failed to add {name} template: {e}"))
                    })?;
                }
            }
        }

        Ok(Self { env })
    }

    /// Render the prompt for one turn report.
    pub fn render(
        &self,
        report: &StructuredChangeReport,
    ) -> Result<RenderedPrompt, SummarizerError> {
        let mut per_civ: BTreeMap<&str, usize> = BTreeMap::new();
        for change in &report.military {
            let count = per_civ.entry(change.civilization.as_str()).or_insert(0);
            *count = count.saturating_add(1);
        }
        let military: Vec<MilitarySummary<'_>> = per_civ
            .into_iter()
            .map(|(civilization, changes)| MilitarySummary {
                civilization,
                changes,
            })
            .collect();

        let ctx = context! {
            cities => &report.cities,
            technologies => &report.technologies,
            diplomacy => &report.diplomacy,
            military => military,
            quiet => report.is_empty(),
        };

        let system = self.render_one("system", &ctx)?;
        let user = self.render_one("report", &ctx)?;
        Ok(RenderedPrompt {
            system: system.trim().to_owned(),
            user: user.trim().to_owned(),
        })
    }

    fn render_one(&self, name: &str, ctx: &minijinja::Value) -> Result<String, SummarizerError> {
        self.env
            .get_template(name)
            .map_err(|e| SummarizerError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| SummarizerError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, RunnerError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| RunnerError::Template(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use turnwatch_core::{
        CityAction, CityChange, DiplomacyChange, MilitaryChange, TechnologyChange,
    };

    use super::*;

    fn busy_report() -> StructuredChangeReport {
        let unit = |civ: &str, x: u32| MilitaryChange {
            civilization: civ.to_owned(),
            unit: "Warrior".to_owned(),
            location: format!(r#"{{"x":{x},"y":0}}"#),
            path: format!(
                r#"root[tileMap][tileList][position={{"x":{x},"y":0}}][militaryUnit][health]"#
            ),
            old_value: Some(json!(100)),
            new_value: Some(json!(60)),
        };
        StructuredChangeReport {
            military: vec![unit("Nok", 1), unit("Nok", 2), unit("Egypt", 9)],
            cities: vec![CityChange {
                civilization: "Iroquois".to_owned(),
                city_name: "Onondaga".to_owned(),
                action: CityAction::Founded,
            }],
            technologies: vec![TechnologyChange {
                civilization: "Spain".to_owned(),
                technology: "Writing".to_owned(),
            }],
            diplomacy: vec![DiplomacyChange {
                civilizations: ["Spain".to_owned(), "Egypt".to_owned()],
                old_status: "Peace".to_owned(),
                new_status: "War".to_owned(),
            }],
        }
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let unique = format!(
            "turnwatch_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn embedded_templates_render_every_category() {
        let engine = PromptEngine::new(None).unwrap();
        let prompt = engine.render(&busy_report()).unwrap();

        assert!(prompt.system.contains("Unciv"));
        assert!(!prompt.system.contains("Nothing notable"));
        assert!(prompt.user.contains("Iroquois founded Onondaga"), "{}", prompt.user);
        assert!(prompt.user.contains("Spain researched Writing"));
        assert!(prompt.user.contains("Spain towards Egypt: Peace -> War"));
        assert!(prompt.user.contains("Nok: 2 unit changes"));
        assert!(prompt.user.contains("Egypt: 1 unit change"));
        assert!(!prompt.user.contains("Egypt: 1 unit changes"));
    }

    #[test]
    fn quiet_report_still_renders() {
        let engine = PromptEngine::new(None).unwrap();
        let prompt = engine.render(&StructuredChangeReport::default()).unwrap();
        assert!(prompt.system.contains("Nothing notable"));
        assert!(prompt.user.contains("No recognized changes."));
        assert!(!prompt.user.contains("Cities:"));
    }

    #[test]
    fn templates_dir_overrides_defaults() {
        let dir = temp_dir("override");
        std::fs::write(dir.join("system.j2"), "Be brief.").ok();
        std::fs::write(
            dir.join("report.j2"),
            "{% for t in technologies %}{{ t.technology }};{% endfor %}",
        )
        .ok();

        let engine = PromptEngine::new(dir.to_str()).unwrap();
        let prompt = engine.render(&busy_report()).unwrap();
        assert_eq!(prompt.system, "Be brief.");
        assert_eq!(prompt.user, "Writing;");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_template_returns_error() {
        let dir = temp_dir("missing");
        std::fs::write(dir.join("system.j2"), "only the system prompt").ok();

        let result = PromptEngine::new(dir.to_str());
        assert!(matches!(result, Err(RunnerError::Template(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
