//! Override tracker
//!
//! Per property, records who owns the current value:
//!
//! ```text
//!            rule applies                 user writes
//!   Unset ───────────────▶ RuleDerived ───────────────▶ UserOverridden
//!     ▲                      │    ▲                          │
//!     │      clear_value     │    └── forced rule, another ──┘
//!     └──────────────────────┘        rule, or value empty again
//! ```
//!
//! A rule-derived property keeps a [`Binding`] to the effect that supplies
//! it, so its value follows the template's placeholders until the user
//! takes it over. Bindings form a graph (source property to target
//! property) that must stay acyclic; [`BindingGraph`] checks new bindings
//! and yields the order in which bound values are re-resolved.

use metacard_model::{PropertyId, PropertyValue};
use metacard_rules::{Effect, Payload, RuleId, RuleSet};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

/// Effect that currently supplies a property's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    /// Rule owning the effect
    pub rule: RuleId,
    /// Index into the rule's effects
    pub effect: usize,
}

impl Binding {
    /// Create binding
    #[inline]
    #[must_use]
    pub fn new(rule: RuleId, effect: usize) -> Self {
        Self { rule, effect }
    }

    /// Payload of the bound effect, if the binding still points at a `SetValue`
    #[must_use]
    pub fn payload<'r>(&self, rules: &'r RuleSet) -> Option<&'r Payload> {
        match rules.get(self.rule)?.effects.get(self.effect)? {
            Effect::SetValue { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Ownership state of one property's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverrideState {
    /// No value owner
    #[default]
    Unset,
    /// Value supplied by a rule effect
    RuleDerived(Binding),
    /// Value last written by the user
    UserOverridden,
}

impl OverrideState {
    /// Binding, when rule-derived
    #[inline]
    #[must_use]
    pub fn binding(&self) -> Option<Binding> {
        match self {
            Self::RuleDerived(binding) => Some(*binding),
            _ => None,
        }
    }

    /// True when the user owns the value
    #[inline]
    #[must_use]
    pub fn is_user_overridden(&self) -> bool {
        matches!(self, Self::UserOverridden)
    }

    /// Whether `claimant` may write a property in this state
    ///
    /// Forced effects always may. Others may unless the user owns a
    /// non-empty value. A user-owned value can still be claimed by any rule
    /// other than `overrode`, the rule whose value the user replaced.
    #[must_use]
    pub fn accepts(
        &self,
        current: &PropertyValue,
        forced: bool,
        claimant: RuleId,
        overrode: Option<RuleId>,
    ) -> bool {
        forced
            || !self.is_user_overridden()
            || current.is_empty()
            || overrode.is_some_and(|rule| rule != claimant)
    }
}

/// Placeholder dependency graph between bound properties
///
/// An edge `a -> b` means `b`'s bound template reads `a`.
#[derive(Debug, Clone, Default)]
pub struct BindingGraph {
    graph: DiGraphMap<PropertyId, ()>,
}

impl BindingGraph {
    /// Create empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the current bindings
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = (PropertyId, Binding)>,
        rules: &RuleSet,
    ) -> Self {
        let mut graph = Self::new();
        for (target, binding) in bindings {
            graph.graph.add_node(target);
            if let Some(Payload::Template(template)) = binding.payload(rules) {
                for source in template.sources() {
                    graph.graph.add_edge(source, target, ());
                }
            }
        }
        graph
    }

    /// True when binding `target` to a template reading `sources` would
    /// close a cycle
    #[must_use]
    pub fn would_cycle(&self, target: PropertyId, sources: &[PropertyId]) -> bool {
        sources.iter().any(|&source| {
            source == target
                || (self.graph.contains_node(target)
                    && self.graph.contains_node(source)
                    && has_path_connecting(&self.graph, target, source, None))
        })
    }

    /// Replace the incoming edges of `target`
    pub fn rebind(&mut self, target: PropertyId, sources: &[PropertyId]) {
        self.unbind(target);
        self.graph.add_node(target);
        for &source in sources {
            self.graph.add_edge(source, target, ());
        }
    }

    /// Drop the incoming edges of `target`
    pub fn unbind(&mut self, target: PropertyId) {
        if !self.graph.contains_node(target) {
            return;
        }
        let incoming: Vec<PropertyId> = self
            .graph
            .neighbors_directed(target, petgraph::Direction::Incoming)
            .collect();
        for source in incoming {
            self.graph.remove_edge(source, target);
        }
    }

    /// Properties in dependency order (sources before targets)
    ///
    /// Falls back to insertion order if the graph is cyclic.
    #[must_use]
    pub fn resolution_order(&self) -> Vec<PropertyId> {
        toposort(&self.graph, None).unwrap_or_else(|_| self.graph.nodes().collect())
    }
}
