//! Compiled rules
//!
//! A [`Rule`] is the resolved, immutable form of one entry of a rule
//! document: every selector mapped to a typed identifier, every template
//! parsed, inherited settings filled in from the parent.

use crate::template::Template;
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Rule identifier
///
/// Assigned in depth-first pre-order, so a parent always has a smaller ID
/// than its descendants and a subtree occupies a contiguous ID range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl RuleId {
    /// Position in the rule set
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// Something a rule can depend on
///
/// The class is modelled as a pseudo-property so that a class change flows
/// through the same dependency index as a property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Slot {
    /// The card's class
    Class,
    /// A property value (or its presence on the card)
    Property(PropertyId),
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => f.write_str("class"),
            Self::Property(id) => write!(f, "{id}"),
        }
    }
}

/// Object type and class scoping
///
/// Empty lists mean "any". A rule scoped to classes never matches a card
/// without a class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Accepted object types
    pub object_types: Vec<ObjectTypeId>,
    /// Accepted classes
    pub classes: Vec<ClassId>,
}

impl Scope {
    /// True when matching depends on the card's class
    #[inline]
    #[must_use]
    pub fn depends_on_class(&self) -> bool {
        !self.classes.is_empty()
    }
}

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Any listed value is present (scalar: equals one of them)
    #[default]
    #[serde(alias = "in", alias = "intersects")]
    Equals,
    /// None of the listed values is present
    NotEquals,
    /// Every listed value is present
    ContainsAll,
    /// Property has no value
    IsEmpty,
    /// Property has a value
    IsNotEmpty,
}

impl Operator {
    /// True when the operator compares against listed values
    #[inline]
    #[must_use]
    pub fn takes_values(self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

/// One trigger condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Property tested
    pub property: PropertyId,
    /// Operator
    pub operator: Operator,
    /// Values compared against (OR within one condition)
    pub values: Vec<String>,
}

/// Value payload of a `SetValue` effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Fixed value
    Literal(PropertyValue),
    /// Template re-resolved against current values
    Template(Template),
}

/// Effect of a matched rule on one target property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Derive the target's value
    SetValue {
        /// Target property
        target: PropertyId,
        /// Value or template
        payload: Payload,
    },
    /// Replace the target's label while the rule matches
    SetLabel {
        /// Target property
        target: PropertyId,
        /// Label template
        label: Template,
    },
    /// Show the target on the card while the rule matches
    AddProperty {
        /// Target property
        target: PropertyId,
    },
    /// Take the target off the card while the rule matches
    RemoveProperty {
        /// Target property
        target: PropertyId,
    },
    /// Empty the target and reset its override state
    ClearValue {
        /// Target property
        target: PropertyId,
    },
    /// Mark the target required (or not) while the rule matches
    SetRequired {
        /// Target property
        target: PropertyId,
        /// Required flag
        required: bool,
    },
    /// Replace the target's description while the rule matches
    SetDescription {
        /// Target property
        target: PropertyId,
        /// Description template
        text: Template,
    },
}

impl Effect {
    /// Target property
    #[must_use]
    pub fn target(&self) -> PropertyId {
        match self {
            Self::SetValue { target, .. }
            | Self::SetLabel { target, .. }
            | Self::AddProperty { target }
            | Self::RemoveProperty { target }
            | Self::ClearValue { target }
            | Self::SetRequired { target, .. }
            | Self::SetDescription { target, .. } => *target,
        }
    }

    /// True for effects that hold only while the rule matches
    ///
    /// Labels, visibility, required flags and descriptions are recomputed
    /// from the set of matching rules; values and clears are applied as
    /// events.
    #[inline]
    #[must_use]
    pub fn is_declarative(&self) -> bool {
        !matches!(self, Self::SetValue { .. } | Self::ClearValue { .. })
    }
}

/// Compiled rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Identifier (pre-order position)
    pub id: RuleId,
    /// Name as written
    pub name: String,
    /// Parent rule, for nested rules
    pub parent: Option<RuleId>,
    /// Nesting depth (0 = top level)
    pub depth: usize,
    /// Scope
    pub scope: Scope,
    /// Conditions, all of which must hold
    pub conditions: Vec<Condition>,
    /// Effects, in document order
    pub effects: Vec<Effect>,
    /// Forced rules overwrite user edits while they match
    pub forced: bool,
    /// Higher wins when rules compete for one property
    pub priority: i32,
    /// Delimiter for multi-value placeholders (`None` = engine default)
    pub delimiter: Option<String>,
    /// One past the last descendant's ID
    pub subtree_end: RuleId,
}

impl Rule {
    /// Descendant IDs (children, grandchildren, ...) in pre-order
    pub fn descendants(&self) -> impl Iterator<Item = RuleId> {
        (self.id.0 + 1..self.subtree_end.0).map(RuleId)
    }

    /// Slots this rule's match status depends on
    pub fn trigger_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.scope
            .depends_on_class()
            .then_some(Slot::Class)
            .into_iter()
            .chain(self.conditions.iter().map(|c| Slot::Property(c.property)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(conditions: Vec<Condition>, scope: Scope) -> Rule {
        Rule {
            id: RuleId(2),
            name: "r".into(),
            parent: None,
            depth: 0,
            scope,
            conditions,
            effects: vec![Effect::ClearValue {
                target: PropertyId(5),
            }],
            forced: false,
            priority: 0,
            delimiter: None,
            subtree_end: RuleId(5),
        }
    }

    #[test]
    fn descendants_are_contiguous() {
        let r = rule(Vec::new(), Scope::default());
        let ids: Vec<_> = r.descendants().collect();
        assert_eq!(ids, vec![RuleId(3), RuleId(4)]);
    }

    #[test]
    fn trigger_slots_include_class_when_scoped() {
        let r = rule(
            vec![Condition {
                property: PropertyId(1),
                operator: Operator::Equals,
                values: vec!["x".into()],
            }],
            Scope {
                object_types: Vec::new(),
                classes: vec![ClassId(3)],
            },
        );
        let slots: Vec<_> = r.trigger_slots().collect();
        assert_eq!(slots, vec![Slot::Class, Slot::Property(PropertyId(1))]);
    }

    #[test]
    fn effect_classification() {
        let clear = Effect::ClearValue {
            target: PropertyId(5),
        };
        assert!(!clear.is_declarative());
        assert_eq!(clear.target(), PropertyId(5));

        let label = Effect::SetLabel {
            target: PropertyId(5),
            label: Template::literal("Town"),
        };
        assert!(label.is_declarative());
    }

    #[test]
    fn operator_aliases_deserialize() {
        let op: Operator = serde_json::from_str("\"intersects\"").unwrap();
        assert_eq!(op, Operator::Equals);
        assert!(!Operator::IsEmpty.takes_values());
    }
}
