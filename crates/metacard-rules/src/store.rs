//! Rule definition store
//!
//! [`RuleSet::compile`] walks a [`RuleDocument`] depth-first, resolves every
//! selector against the vocabulary and assigns pre-order [`RuleId`]s. Rules
//! that fail validation are skipped together with their children and
//! reported on the [`LoadReport`].
//!
//! The compiled set also carries a dependency index so the engine can find
//! the rules affected by a change without scanning the whole set.

use crate::diagnostics::{Diagnostic, DiagnosticKind, LoadReport};
use crate::document::{EffectEntry, RuleDocument, RuleEntry, RuleFormat};
use crate::error::{RuleLoadError, RuleResult};
use crate::rule::{Condition, Effect, Payload, Rule, RuleId, Scope, Slot};
use crate::template::RawTemplate;
use indexmap::IndexMap;
use metacard_model::{PropertyId, Vocabulary};
use std::path::Path;
use tracing::{debug, info, warn};

/// Settings a nested rule takes from its parent when it does not set them
#[derive(Debug, Clone, Default)]
struct Inherited {
    forced: bool,
    priority: i32,
    delimiter: Option<String>,
}

/// Immutable, compiled set of rules for one vault
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_slot: IndexMap<Slot, Vec<RuleId>>,
    forced_targets: IndexMap<PropertyId, Vec<RuleId>>,
    value_targets: IndexMap<PropertyId, Vec<RuleId>>,
    presentation_targets: IndexMap<PropertyId, Vec<RuleId>>,
}

impl RuleSet {
    /// Compile a document against the vocabulary
    ///
    /// Never fails; problems end up on the returned report.
    #[must_use]
    pub fn compile(vocabulary: &Vocabulary, document: &RuleDocument) -> (Self, LoadReport) {
        let mut compiler = Compiler {
            vocabulary,
            rules: Vec::new(),
            report: LoadReport::default(),
        };
        let root = Inherited::default();
        for (index, entry) in document.rules.iter().enumerate() {
            compiler.compile_entry(entry, None, &root, &display_name(entry, index, None));
        }

        let Compiler {
            rules, mut report, ..
        } = compiler;
        report.loaded = rules.len();

        let set = Self::index(rules);
        info!(
            loaded = report.loaded,
            skipped = report.skipped,
            diagnostics = report.diagnostics.len(),
            "rule set compiled"
        );
        (set, report)
    }

    /// Parse and compile rule text
    ///
    /// With `strict`, any error-level diagnostic rejects the whole document.
    ///
    /// # Errors
    /// Malformed document, or [`RuleLoadError::Rejected`] in strict mode.
    pub fn load_str(
        vocabulary: &Vocabulary,
        content: &str,
        format: RuleFormat,
        strict: bool,
    ) -> RuleResult<(Self, LoadReport)> {
        let document = RuleDocument::parse(content, format)?;
        Self::finish(Self::compile(vocabulary, &document), strict)
    }

    /// Read, parse and compile a rule file
    ///
    /// # Errors
    /// IO failure, malformed document, or rejection in strict mode.
    pub fn load(
        vocabulary: &Vocabulary,
        path: impl AsRef<Path>,
        strict: bool,
    ) -> RuleResult<(Self, LoadReport)> {
        let document = RuleDocument::load(path)?;
        Self::finish(Self::compile(vocabulary, &document), strict)
    }

    fn finish((set, report): (Self, LoadReport), strict: bool) -> RuleResult<(Self, LoadReport)> {
        if strict {
            let errors: Vec<Diagnostic> = report.errors().cloned().collect();
            if !errors.is_empty() {
                return Err(RuleLoadError::Rejected(errors));
            }
        }
        Ok((set, report))
    }

    fn index(rules: Vec<Rule>) -> Self {
        let mut set = Self {
            rules,
            ..Self::default()
        };

        for rule in &set.rules {
            for slot in rule.trigger_slots() {
                push_unique(set.by_slot.entry(slot).or_default(), rule.id);
            }
            for effect in &rule.effects {
                let target = effect.target();
                match effect {
                    Effect::SetValue { .. } | Effect::ClearValue { .. } => {
                        if matches!(effect, Effect::SetValue { .. }) {
                            push_unique(set.value_targets.entry(target).or_default(), rule.id);
                        }
                        if rule.forced {
                            push_unique(set.forced_targets.entry(target).or_default(), rule.id);
                        }
                    }
                    _ => push_unique(
                        set.presentation_targets.entry(target).or_default(),
                        rule.id,
                    ),
                }
            }
        }
        set
    }

    /// Rule by ID
    #[inline]
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.index())
    }

    /// All rules in pre-order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of compiled rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule compiled
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose scope or conditions read `slot`
    #[must_use]
    pub fn triggered_by(&self, slot: Slot) -> &[RuleId] {
        self.by_slot.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Forced rules that write or clear `target`
    #[must_use]
    pub fn forced_targeting(&self, target: PropertyId) -> &[RuleId] {
        self.forced_targets.get(&target).map_or(&[], Vec::as_slice)
    }

    /// Rules with a `SetValue` effect on `target`
    #[must_use]
    pub fn setting_value_of(&self, target: PropertyId) -> &[RuleId] {
        self.value_targets.get(&target).map_or(&[], Vec::as_slice)
    }

    /// Rules with label, visibility, required or description effects on `target`
    #[must_use]
    pub fn presenting(&self, target: PropertyId) -> &[RuleId] {
        self.presentation_targets
            .get(&target)
            .map_or(&[], Vec::as_slice)
    }

    /// Every property that some rule presents
    pub fn presented_properties(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.presentation_targets.keys().copied()
    }
}

fn push_unique(ids: &mut Vec<RuleId>, id: RuleId) {
    if ids.last() != Some(&id) {
        ids.push(id);
    }
}

fn display_name(entry: &RuleEntry, index: usize, parent: Option<&str>) -> String {
    let own = if entry.name.is_empty() {
        format!("#{index}")
    } else {
        entry.name.clone()
    };
    match parent {
        Some(parent) => format!("{parent} > {own}"),
        None => own,
    }
}

struct Compiler<'a> {
    vocabulary: &'a Vocabulary,
    rules: Vec<Rule>,
    report: LoadReport,
}

impl Compiler<'_> {
    fn compile_entry(
        &mut self,
        entry: &RuleEntry,
        parent: Option<(RuleId, usize)>,
        inherited: &Inherited,
        name: &str,
    ) {
        let mut diagnostics = Vec::new();
        let rule = self.build(entry, parent, inherited, name, &mut diagnostics);

        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(rule_name = name, "rule skipped");
            self.report.diagnostics.append(&mut diagnostics);
            self.report.skipped += 1;
            self.skip_children(entry, name);
            return;
        }

        for diagnostic in &mut diagnostics {
            diagnostic.rule = Some(rule.id);
        }
        self.report.diagnostics.append(&mut diagnostics);
        debug!(rule = %rule.id, rule_name = name, depth = rule.depth, "rule compiled");

        let id = rule.id;
        let depth = rule.depth;
        let child_settings = Inherited {
            forced: rule.forced,
            priority: rule.priority,
            delimiter: rule.delimiter.clone(),
        };
        self.rules.push(rule);

        for (index, child) in entry.rules.iter().enumerate() {
            let child_name = display_name(child, index, Some(name));
            self.compile_entry(child, Some((id, depth + 1)), &child_settings, &child_name);
        }
        self.rules[id.index()].subtree_end = RuleId(self.rules_len());
    }

    fn rules_len(&self) -> u32 {
        u32::try_from(self.rules.len()).unwrap_or(u32::MAX)
    }

    fn skip_children(&mut self, entry: &RuleEntry, name: &str) {
        for (index, child) in entry.rules.iter().enumerate() {
            let child_name = display_name(child, index, Some(name));
            self.report.diagnostics.push(Diagnostic::error(
                &child_name,
                DiagnosticKind::ParentSkipped,
                "parent rule was skipped",
            ));
            self.report.skipped += 1;
            self.skip_children(child, &child_name);
        }
    }

    fn build(
        &self,
        entry: &RuleEntry,
        parent: Option<(RuleId, usize)>,
        inherited: &Inherited,
        name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Rule {
        let vocabulary = self.vocabulary;
        let unknown = |e: metacard_model::ModelError| {
            Diagnostic::error(name, DiagnosticKind::UnknownSelector, e.to_string())
        };

        let mut scope = Scope::default();
        for selector in entry.scope.object_type.clone().into_vec() {
            match vocabulary.resolve_object_type(&selector) {
                Ok(id) => scope.object_types.push(id),
                Err(e) => diagnostics.push(unknown(e)),
            }
        }
        for selector in entry.scope.class.clone().into_vec() {
            match vocabulary.resolve_class(&selector) {
                Ok(id) => scope.classes.push(id),
                Err(e) => diagnostics.push(unknown(e)),
            }
        }

        let mut conditions = Vec::with_capacity(entry.when.len());
        for written in &entry.when {
            let property = match vocabulary.resolve_property(&written.property) {
                Ok(id) => id,
                Err(e) => {
                    diagnostics.push(unknown(e));
                    continue;
                }
            };
            let mut values = written.values.clone().into_vec();

            if written.operator.takes_values() {
                if values.is_empty() {
                    diagnostics.push(Diagnostic::error(
                        name,
                        DiagnosticKind::EmptyCondition,
                        format!("condition on {} lists no values", written.property),
                    ));
                    continue;
                }
                for value in &values {
                    if !vocabulary.is_valid_value(property, value) {
                        diagnostics.push(Diagnostic::error(
                            name,
                            DiagnosticKind::UnknownLookupValue,
                            format!("'{value}' is not a valid value of {}", written.property),
                        ));
                    }
                }
            } else if !values.is_empty() {
                diagnostics.push(Diagnostic::warning(
                    name,
                    DiagnosticKind::IgnoredValues,
                    format!("{:?} takes no values; ignored", written.operator),
                ));
                values.clear();
            }

            conditions.push(Condition {
                property,
                operator: written.operator,
                values,
            });
        }

        let mut effects = Vec::with_capacity(entry.effects.len());
        for written in &entry.effects {
            if let Some(effect) = self.build_effect(written, name, diagnostics) {
                effects.push(effect);
            }
        }

        let rule_id = RuleId(self.rules_len());
        Rule {
            id: rule_id,
            name: name.to_string(),
            parent: parent.map(|(id, _)| id),
            depth: parent.map_or(0, |(_, depth)| depth),
            scope,
            conditions,
            effects,
            forced: entry.forced.unwrap_or(inherited.forced),
            priority: entry.priority.unwrap_or(inherited.priority),
            delimiter: entry
                .delimiter
                .clone()
                .or_else(|| inherited.delimiter.clone()),
            subtree_end: RuleId(rule_id.0 + 1),
        }
    }

    fn build_effect(
        &self,
        written: &EffectEntry,
        name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Effect> {
        let vocabulary = self.vocabulary;
        let target = match vocabulary.resolve_property(written.property()) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    name,
                    DiagnosticKind::UnknownSelector,
                    e.to_string(),
                ));
                return None;
            }
        };

        let template = |text: &str, diagnostics: &mut Vec<Diagnostic>| {
            let raw = match RawTemplate::parse(text) {
                Ok(raw) => raw,
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        name,
                        DiagnosticKind::MalformedTemplate,
                        format!("'{text}': {e}"),
                    ));
                    return None;
                }
            };
            match raw.resolve(vocabulary) {
                Ok(template) => Some(template),
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        name,
                        DiagnosticKind::UnknownSelector,
                        format!("'{text}': {e}"),
                    ));
                    None
                }
            }
        };

        let effect = match written {
            EffectEntry::SetValue {
                template: text,
                value,
                ..
            } => {
                let payload = match (text, value) {
                    (Some(text), other) => {
                        if other.is_some() {
                            diagnostics.push(Diagnostic::warning(
                                name,
                                DiagnosticKind::IgnoredValues,
                                "set_value has both template and value; value ignored",
                            ));
                        }
                        Payload::Template(template(text, diagnostics)?)
                    }
                    (None, Some(value)) => Payload::Literal(value.clone().normalized()),
                    (None, None) => {
                        diagnostics.push(Diagnostic::error(
                            name,
                            DiagnosticKind::MissingPayload,
                            format!("set_value on {} has neither template nor value", written.property()),
                        ));
                        return None;
                    }
                };
                Effect::SetValue { target, payload }
            }
            EffectEntry::SetLabel { label, .. } => Effect::SetLabel {
                target,
                label: template(label, diagnostics)?,
            },
            EffectEntry::AddProperty { .. } => Effect::AddProperty { target },
            EffectEntry::RemoveProperty { .. } => Effect::RemoveProperty { target },
            EffectEntry::ClearValue { .. } => Effect::ClearValue { target },
            EffectEntry::SetRequired { required, .. } => Effect::SetRequired {
                target,
                required: *required,
            },
            EffectEntry::SetDescription { text, .. } => Effect::SetDescription {
                target,
                text: template(text, diagnostics)?,
            },
        };
        Some(effect)
    }
}
