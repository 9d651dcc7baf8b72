//! Effect applier
//!
//! Executes rule effects against a [`CardState`]. Value effects
//! (`SetValue`, `ClearValue`) are events applied when a rule fires, or on
//! every evaluation for forced rules. Visibility and presentation effects
//! are declarative: they are recomputed from the set of matching rules, so
//! a label or a shown property disappears as soon as its rule stops
//! matching.
//!
//! Where several matching rules compete for one property the winner is the
//! rule with the highest priority, then the most recent activation, then
//! the latest definition.

use crate::card::{CardState, PropertySlot};
use crate::config::EngineConfig;
use crate::resolver::PlaceholderResolver;
use crate::tracker::{Binding, BindingGraph, OverrideState};
use indexmap::{IndexMap, IndexSet};
use metacard_model::{PropertyId, PropertyValue, Vocabulary};
use metacard_rules::{Diagnostic, DiagnosticKind, Effect, Rule, RuleId, RuleSet, Slot};
use tracing::{debug, warn};

/// Changes made during one settle iteration
#[derive(Debug, Default)]
pub(crate) struct Tick {
    before: IndexMap<PropertyId, Option<PropertyValue>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Tick {
    /// Remember the value `property` had before this iteration touched it
    fn touch(&mut self, card: &CardState, property: PropertyId) {
        self.before
            .entry(property)
            .or_insert_with(|| card.value(property).cloned());
    }

    /// Net changes: (value changed, added, removed)
    pub(crate) fn outcome(
        &self,
        card: &CardState,
    ) -> (Vec<PropertyId>, Vec<PropertyId>, Vec<PropertyId>) {
        let mut changed = Vec::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for (property, before) in &self.before {
            match (before, card.value(*property)) {
                (None, Some(_)) => added.push(*property),
                (Some(_), None) => removed.push(*property),
                (Some(old), Some(new)) if old != new => changed.push(*property),
                _ => {}
            }
        }
        (changed, added, removed)
    }

    /// Slots whose value or presence changed
    pub(crate) fn dirty_slots(&self, card: &CardState) -> IndexSet<Slot> {
        self.before
            .iter()
            .filter(|(property, before)| before.as_ref() != card.value(**property))
            .map(|(property, _)| Slot::Property(*property))
            .collect()
    }
}

/// Ordering key for competing rules; the greatest key wins
fn precedence(card: &CardState, rule: &Rule) -> (i32, u64, RuleId) {
    (
        rule.priority,
        card.activation_of(rule.id).unwrap_or(0),
        rule.id,
    )
}

/// Effect applier bound to one engine
#[derive(Debug, Clone, Copy)]
pub(crate) struct EffectApplier<'e> {
    vocabulary: &'e Vocabulary,
    rules: &'e RuleSet,
    config: &'e EngineConfig,
}

impl<'e> EffectApplier<'e> {
    pub(crate) fn new(vocabulary: &'e Vocabulary, rules: &'e RuleSet, config: &'e EngineConfig) -> Self {
        Self {
            vocabulary,
            rules,
            config,
        }
    }

    fn resolver(&self, rule: &'e Rule) -> PlaceholderResolver<'e> {
        PlaceholderResolver::new(
            rule.delimiter
                .as_deref()
                .unwrap_or(self.config.default_delimiter.as_str()),
        )
    }

    /// Highest-precedence matching rule with an effect on `target` selected
    /// by `pick`, and the effect it picked
    fn winner<T>(
        &self,
        card: &CardState,
        target: PropertyId,
        pick: impl Fn(&'e Effect) -> Option<T>,
    ) -> Option<(&'e Rule, T)> {
        self.rules
            .presenting(target)
            .iter()
            .filter(|id| card.is_active(**id))
            .filter_map(|id| self.rules.get(*id))
            .filter_map(|rule| {
                rule.effects
                    .iter()
                    .filter(|effect| effect.target() == target)
                    .filter_map(&pick)
                    .last()
                    .map(|picked| (rule, picked))
            })
            .max_by_key(|(rule, _)| precedence(card, rule))
    }

    /// Value effects of `rule`, as bindings
    pub(crate) fn value_effects(rule: &Rule) -> impl Iterator<Item = Binding> + '_ {
        rule.effects
            .iter()
            .enumerate()
            .filter(|(_, effect)| !effect.is_declarative())
            .map(|(index, _)| Binding::new(rule.id, index))
    }

    /// `SetValue` effects of matching rules on a property that just entered
    /// the card
    pub(crate) fn entering_effects(&self, card: &CardState, target: PropertyId) -> Vec<Binding> {
        self.rules
            .setting_value_of(target)
            .iter()
            .filter(|id| card.is_active(**id))
            .filter_map(|id| self.rules.get(*id))
            .flat_map(|rule| {
                rule.effects
                    .iter()
                    .enumerate()
                    .filter(move |(_, effect)| {
                        matches!(effect, Effect::SetValue { target: t, .. } if *t == target)
                    })
                    .map(move |(index, _)| Binding::new(rule.id, index))
            })
            .collect()
    }

    /// Add and remove properties so the card matches class, user additions
    /// and visibility rules
    ///
    /// Returns the properties that entered the card.
    pub(crate) fn apply_visibility(
        &self,
        card: &mut CardState,
        graph: &mut BindingGraph,
        tick: &mut Tick,
    ) -> Vec<PropertyId> {
        let class_properties: &[PropertyId] = card
            .class
            .map_or(&[], |class| self.vocabulary.class_properties(class));

        let mut candidates: IndexSet<PropertyId> = class_properties.iter().copied().collect();
        candidates.extend(card.user_added.iter().copied());
        candidates.extend(card.properties.keys().copied());
        candidates.extend(self.rules.presented_properties());

        let mut entering = Vec::new();
        for property in candidates {
            let shown = self.winner(card, property, |effect| match effect {
                Effect::AddProperty { .. } => Some(true),
                Effect::RemoveProperty { .. } => Some(false),
                _ => None,
            });
            let forced_off = matches!(shown, Some((_, false)));
            let in_scope = !forced_off
                && (class_properties.contains(&property)
                    || card.user_added.contains(&property)
                    || matches!(shown, Some((_, true))));

            let present = card.contains(property);
            if in_scope {
                if present {
                    if let Some(slot) = card.properties.get_mut(&property) {
                        slot.in_scope = true;
                    }
                } else {
                    tick.touch(card, property);
                    card.properties.insert(
                        property,
                        PropertySlot::new(self.vocabulary.default_label(property)),
                    );
                    debug!(%property, "property entered card");
                    entering.push(property);
                }
                continue;
            }

            let Some(slot) = card.properties.get_mut(&property) else {
                continue;
            };
            // Only a value still bound to a rule keeps an out-of-scope property.
            let retained = !forced_off && matches!(slot.state, OverrideState::RuleDerived(_));
            if !retained {
                tick.touch(card, property);
                card.properties.shift_remove(&property);
                graph.unbind(property);
                if card.editing == Some(property) {
                    card.editing = None;
                }
                debug!(%property, "property left card");
            } else if slot.in_scope {
                slot.in_scope = false;
                debug!(%property, "out-of-scope property retained as placeholder target");
            }
        }
        entering
    }

    /// Apply value effects, lowest precedence first so the winner holds
    /// the value
    pub(crate) fn apply_values(
        &self,
        card: &mut CardState,
        mut applications: Vec<Binding>,
        graph: &mut BindingGraph,
        tick: &mut Tick,
    ) {
        applications.sort_by_key(|binding| {
            (
                self.rules
                    .get(binding.rule)
                    .map(|rule| precedence(card, rule)),
                binding.effect,
            )
        });
        applications.dedup();
        for binding in applications {
            self.apply_value(card, binding, graph, tick);
        }
    }

    fn apply_value(
        &self,
        card: &mut CardState,
        binding: Binding,
        graph: &mut BindingGraph,
        tick: &mut Tick,
    ) {
        let Some(rule) = self.rules.get(binding.rule) else {
            return;
        };
        let Some(effect) = rule.effects.get(binding.effect) else {
            return;
        };

        match effect {
            Effect::SetValue { target, payload } => {
                let target = *target;
                let Some(slot) = card.properties.get(&target) else {
                    warn!(rule = %rule.id, %target, "set_value target not on card");
                    tick.diagnostics.push(
                        Diagnostic::warning(
                            &rule.name,
                            DiagnosticKind::AbsentTarget,
                            format!("{target} is not on the card"),
                        )
                        .for_rule(rule.id),
                    );
                    return;
                };
                if !slot.state.accepts(&slot.value, rule.forced, rule.id, slot.overrode) {
                    debug!(rule = %rule.id, %target, "user owns value; set_value skipped");
                    return;
                }

                let (value, sources) = self.resolver(rule).value_of(
                    payload,
                    card,
                    self.vocabulary.is_multi_value(target),
                );
                if graph.would_cycle(target, &sources) {
                    warn!(rule = %rule.id, %target, "placeholder cycle; set_value skipped");
                    tick.diagnostics.push(
                        Diagnostic::error(
                            &rule.name,
                            DiagnosticKind::BindingCycle,
                            format!("binding {target} would make its placeholders cyclic"),
                        )
                        .for_rule(rule.id),
                    );
                    return;
                }
                graph.rebind(target, &sources);
                tick.touch(card, target);
                if let Some(slot) = card.properties.get_mut(&target) {
                    slot.state = OverrideState::RuleDerived(binding);
                    slot.overrode = None;
                    slot.value = value;
                }
                debug!(rule = %rule.id, %target, forced = rule.forced, "value derived");
            }
            Effect::ClearValue { target } => {
                let target = *target;
                if !card.contains(target) {
                    return;
                }
                tick.touch(card, target);
                graph.unbind(target);
                if let Some(slot) = card.properties.get_mut(&target) {
                    slot.state = OverrideState::Unset;
                    slot.overrode = None;
                    slot.value = PropertyValue::Empty;
                }
                debug!(rule = %rule.id, %target, "value cleared");
            }
            _ => {}
        }
    }

    /// Re-resolve every bound value from current sources, sources first
    pub(crate) fn resolve_bindings(&self, card: &mut CardState, graph: &BindingGraph, tick: &mut Tick) {
        for target in graph.resolution_order() {
            let Some(binding) = card.property(target).and_then(|slot| slot.state.binding()) else {
                continue;
            };
            let (Some(rule), Some(payload)) =
                (self.rules.get(binding.rule), binding.payload(self.rules))
            else {
                continue;
            };
            let (value, _) = self.resolver(rule).value_of(
                payload,
                card,
                self.vocabulary.is_multi_value(target),
            );
            if card.value(target) != Some(&value) {
                tick.touch(card, target);
                if let Some(slot) = card.properties.get_mut(&target) {
                    slot.value = value;
                }
            }
        }
    }

    /// Recompute labels, required flags and descriptions
    pub(crate) fn apply_presentation(&self, card: &mut CardState) {
        let properties: Vec<PropertyId> = card.properties.keys().copied().collect();
        for property in properties {
            let view: &CardState = card;
            let label = self
                .winner(view, property, |effect| match effect {
                    Effect::SetLabel { label, .. } => Some(label),
                    _ => None,
                })
                .map(|(rule, template)| self.resolver(rule).resolve(template, view).text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| self.vocabulary.default_label(property).to_string());

            let required = self
                .winner(view, property, |effect| match effect {
                    Effect::SetRequired { required, .. } => Some(*required),
                    _ => None,
                })
                .is_some_and(|(_, required)| required);

            let description = self
                .winner(view, property, |effect| match effect {
                    Effect::SetDescription { text, .. } => Some(text),
                    _ => None,
                })
                .map(|(rule, template)| self.resolver(rule).resolve(template, view).text);

            if let Some(slot) = card.properties.get_mut(&property) {
                slot.label = label;
                slot.required = required;
                slot.description = description;
            }
        }
    }
}
