//! Subcommand implementations

use crate::script::{ReplayScript, Step};
use anyhow::{Context, Result};
use metacard_engine::{CardSnapshot, CardState, EngineConfig, OverrideState, RuleEngine, SettleReport};
use metacard_model::Vocabulary;
use metacard_rules::{LoadReport, RuleSet};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Read a vocabulary document
///
/// # Errors
/// Unreadable or inconsistent vocabulary.
pub fn load_vocabulary(path: &Path) -> Result<Vocabulary> {
    Vocabulary::load(path).with_context(|| format!("loading vocabulary {}", path.display()))
}

/// Read engine configuration, or the defaults when no file is given
///
/// # Errors
/// Unreadable or invalid configuration.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Compile a rule document and report what was loaded
///
/// # Errors
/// Unreadable or unparsable rule file, or any invalid rule in strict mode.
pub fn check(vocabulary: &Vocabulary, rules_path: &Path, strict: bool) -> Result<LoadReport> {
    let (rules, report) = RuleSet::load(vocabulary, rules_path, strict)
        .with_context(|| format!("checking rules {}", rules_path.display()))?;
    info!(rules = rules.len(), skipped = report.skipped, "rule document checked");
    Ok(report)
}

/// Human-readable load report
#[must_use]
pub fn render_load_report(report: &LoadReport) -> String {
    let mut out = format!("{} rules loaded, {} skipped\n", report.loaded, report.skipped);
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "  {diagnostic}");
    }
    out
}

/// One replayed step and what it did
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Step as written
    pub step: String,
    /// Settle report
    pub report: SettleReport,
}

/// Result of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    /// Settle report of opening the card
    pub opened: SettleReport,
    /// Per-step reports
    pub steps: Vec<StepOutcome>,
    /// Final card
    pub card: CardSnapshot,
}

/// Open a card and feed it the script's steps
///
/// # Errors
/// Unresolvable selectors or an engine error at any step.
pub fn replay(engine: &RuleEngine, script: &ReplayScript) -> Result<ReplayOutcome> {
    let vocabulary = engine.vocabulary();
    let (object_type, class) = script.resolve_target(vocabulary)?;
    let initial = script.resolve_initial(vocabulary)?;
    let (mut card, opened) = engine.open_card(object_type, class, initial)?;

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let report = apply_step(engine, &mut card, step)
            .with_context(|| format!("step {} ({step})", index + 1))?;
        steps.push(StepOutcome {
            step: step.to_string(),
            report,
        });
    }

    let card_snapshot = card.snapshot();
    engine.discard(card);
    Ok(ReplayOutcome {
        opened,
        steps,
        card: card_snapshot,
    })
}

fn apply_step(engine: &RuleEngine, card: &mut CardState, step: &Step) -> Result<SettleReport> {
    let vocabulary = engine.vocabulary();
    let report = match step {
        Step::Edit(assignment) => {
            let property = vocabulary.resolve_property(&assignment.property)?;
            engine.user_edit(card, property, assignment.value.clone())?
        }
        Step::Activate(selector) => {
            engine.activate_edit(card, vocabulary.resolve_property(selector)?)?;
            SettleReport::default()
        }
        Step::SetClass(selector) => {
            let class = selector
                .as_ref()
                .map(|selector| vocabulary.resolve_class(selector))
                .transpose()?;
            engine.set_class(card, class)?
        }
        Step::Add(selector) => engine.add_property(card, vocabulary.resolve_property(selector)?)?,
        Step::Remove(selector) => {
            engine.remove_property(card, vocabulary.resolve_property(selector)?)?
        }
        Step::Reevaluate => engine.reevaluate(card)?,
    };
    Ok(report)
}

/// Human-readable replay output: one line per step, then the card
#[must_use]
pub fn render_replay(outcome: &ReplayOutcome, vocabulary: &Vocabulary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "open: {}", summarize(&outcome.opened));
    for step in &outcome.steps {
        let _ = writeln!(out, "{}: {}", step.step, summarize(&step.report));
    }
    out.push('\n');
    out.push_str(&render_card(&outcome.card, vocabulary));
    out
}

fn summarize(report: &SettleReport) -> String {
    let mut parts = vec![format!("{} iterations", report.iterations)];
    if !report.fired.is_empty() {
        parts.push(format!("{} fired", report.fired.len()));
    }
    if !report.deactivated.is_empty() {
        parts.push(format!("{} deactivated", report.deactivated.len()));
    }
    if !report.changed.is_empty() {
        parts.push(format!("{} changed", report.changed.len()));
    }
    for diagnostic in &report.diagnostics {
        parts.push(diagnostic.to_string());
    }
    parts.join(", ")
}

/// Card as a plain table
#[must_use]
pub fn render_card(card: &CardSnapshot, vocabulary: &Vocabulary) -> String {
    let class = card
        .class
        .and_then(|class| vocabulary.class(class))
        .map_or("(no class)", |def| def.name.as_str());
    let mut out = format!("class: {class}\n");
    for property in &card.properties {
        let marker = match property.state {
            OverrideState::Unset => ' ',
            OverrideState::RuleDerived(_) => '=',
            OverrideState::UserOverridden => '*',
        };
        let required = if property.required { " (required)" } else { "" };
        let _ = writeln!(
            out,
            "{marker} {}{required}: {}",
            property.label,
            property.value.render("; ")
        );
    }
    out
}

/// Build an engine from files
///
/// # Errors
/// Invalid configuration or rule file.
pub fn build_engine(
    vocabulary: Vocabulary,
    rules_path: &Path,
    config: EngineConfig,
) -> Result<(RuleEngine, LoadReport)> {
    RuleEngine::load(Arc::new(vocabulary), rules_path, config)
        .with_context(|| format!("loading rules {}", rules_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacard_test_utils::{vocabulary, VOCABULARY_YAML};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const RULES: &str = r#"
rules:
  - name: USA city
    scope: { class: CL.Customer }
    when: [{ property: PD.Country, value: USA }]
    effects:
      - { type: set_value, property: PD.City, template: "Famous city of {PD.Country} is Florida" }
      - { type: set_required, property: PD.City }
  - name: broken
    when: [{ property: PD.Nowhere, value: x }]
    effects: [{ type: set_label, property: PD.City, label: never }]
"#;

    fn file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn check_reports_skipped_rules() {
        let rules = file(".yaml", RULES);
        let report = check(&vocabulary(), rules.path(), false).unwrap();
        assert_eq!((report.loaded, report.skipped), (1, 1));

        let text = render_load_report(&report);
        assert!(text.starts_with("1 rules loaded, 1 skipped\n"));
        assert!(text.contains("broken"));

        assert!(check(&vocabulary(), rules.path(), true).is_err());
    }

    #[test]
    fn replay_settles_each_step() {
        let rules = file(".yaml", RULES);
        let (engine, _) = build_engine(vocabulary(), rules.path(), EngineConfig::default()).unwrap();
        let script = ReplayScript::from_yaml_str(
            r"
class: CL.Customer
steps:
  - edit: { property: PD.Country, value: USA }
  - edit: { property: PD.Country, value: Canada }
  - set_class: CL.Invoice
",
        )
        .unwrap();

        let outcome = replay(&engine, &script).unwrap();
        assert_eq!(outcome.steps.len(), 3);
        assert_eq!(outcome.steps[0].step, "edit PD.Country = USA");
        assert_eq!(outcome.steps[0].report.fired.len(), 1);

        let text = render_replay(&outcome, engine.vocabulary());
        assert!(text.contains("edit PD.Country = Canada: "));
        // City left the class but still follows its placeholder.
        assert!(text.ends_with(
            "class: Invoice\n* Country: Canada\n= City: Famous city of Canada is Florida\n  Zip: \n"
        ));
    }

    #[test]
    fn failing_step_is_named() {
        let rules = file(".yaml", RULES);
        let (engine, _) = build_engine(vocabulary(), rules.path(), EngineConfig::default()).unwrap();
        let script = ReplayScript::from_yaml_str(
            "class: CL.Customer\nsteps:\n  - remove: PD.City\n",
        )
        .unwrap();

        let err = replay(&engine, &script).unwrap_err();
        assert!(format!("{err:#}").starts_with("step 1 (remove PD.City)"));
    }

    #[test]
    fn card_rendering_marks_ownership() {
        let rules = file(".yaml", RULES);
        let (engine, _) = build_engine(vocabulary(), rules.path(), EngineConfig::default()).unwrap();
        let script = ReplayScript::from_yaml_str(
            "class: CL.Customer\nsteps:\n  - edit: { property: PD.Country, value: USA }\n",
        )
        .unwrap();

        let outcome = replay(&engine, &script).unwrap();
        assert_eq!(
            render_card(&outcome.card, engine.vocabulary()),
            "class: Customer\n* Country: USA\n= City (required): Famous city of USA is Florida\n"
        );
    }

    #[test]
    fn bundled_demo_replays_cleanly() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        let vocabulary = load_vocabulary(&demos.join("vocabulary.yaml")).unwrap();
        let config = load_config(Some(&demos.join("engine.toml"))).unwrap();
        let (engine, report) = build_engine(vocabulary, &demos.join("rules.yaml"), config).unwrap();
        assert!(report.is_clean());

        let script = ReplayScript::load(demos.join("replay.yaml")).unwrap();
        let outcome = replay(&engine, &script).unwrap();
        assert!(outcome.steps.last().unwrap().report.is_quiet());

        let card = &outcome.card;
        let value = |id| card.property(id).unwrap().value.to_string();
        assert_eq!(value(metacard_test_utils::props::ZIP), "Canada-0000");
        assert_eq!(value(metacard_test_utils::props::CITY), "Famous city of Canada is Florida");
        assert!(card.property(metacard_test_utils::props::COMMENT).is_some());
    }

    #[test]
    fn config_defaults_without_file() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());

        let config = file(".toml", "max_iterations = 5\n");
        assert_eq!(load_config(Some(config.path())).unwrap().max_iterations, 5);

        let vocab = file(".yaml", VOCABULARY_YAML);
        assert!(load_vocabulary(vocab.path()).is_ok());
    }
}
