//! Condition matcher
//!
//! Evaluates a rule's own scope and conditions against a read-only view of
//! the card. Whether the parent of a nested rule matches is the caller's
//! concern; [`ConditionMatcher::matches`] only answers for the rule itself.

use crate::rule::{Condition, Operator, Rule, Scope};
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue};

/// Read-only view of the card state the matcher needs
pub trait CardView {
    /// Object type of the card
    fn object_type(&self) -> ObjectTypeId;

    /// Current class, if one is chosen
    fn class(&self) -> Option<ClassId>;

    /// Current value of a property; `None` when the property is not on the card
    fn value(&self, property: PropertyId) -> Option<&PropertyValue>;
}

/// Stateless condition evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionMatcher;

impl ConditionMatcher {
    /// Create matcher
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scope check; evaluated first and short-circuits the conditions
    #[must_use]
    pub fn scope_matches(&self, scope: &Scope, view: &impl CardView) -> bool {
        if !scope.object_types.is_empty() && !scope.object_types.contains(&view.object_type()) {
            return false;
        }
        if scope.classes.is_empty() {
            return true;
        }
        view.class().is_some_and(|class| scope.classes.contains(&class))
    }

    /// Single condition check
    ///
    /// Absent properties compare as empty.
    #[must_use]
    pub fn condition_matches(&self, condition: &Condition, view: &impl CardView) -> bool {
        let empty = PropertyValue::Empty;
        let value = view.value(condition.property).unwrap_or(&empty);
        let mut listed = condition.values.iter();

        match condition.operator {
            Operator::Equals => listed.any(|v| value.contains(v)),
            Operator::NotEquals => !listed.any(|v| value.contains(v)),
            Operator::ContainsAll => {
                !condition.values.is_empty() && listed.all(|v| value.contains(v))
            }
            Operator::IsEmpty => value.is_empty(),
            Operator::IsNotEmpty => !value.is_empty(),
        }
    }

    /// Rule's own scope and all its conditions
    #[must_use]
    pub fn matches(&self, rule: &Rule, view: &impl CardView) -> bool {
        self.scope_matches(&rule.scope, view)
            && rule
                .conditions
                .iter()
                .all(|condition| self.condition_matches(condition, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleId, Scope};
    use std::collections::HashMap;

    struct View {
        object_type: ObjectTypeId,
        class: Option<ClassId>,
        values: HashMap<PropertyId, PropertyValue>,
    }

    impl CardView for View {
        fn object_type(&self) -> ObjectTypeId {
            self.object_type
        }

        fn class(&self) -> Option<ClassId> {
            self.class
        }

        fn value(&self, property: PropertyId) -> Option<&PropertyValue> {
            self.values.get(&property)
        }
    }

    const COUNTRY: PropertyId = PropertyId(1);
    const TAGS: PropertyId = PropertyId(2);

    fn view() -> View {
        View {
            object_type: ObjectTypeId(0),
            class: Some(ClassId(10)),
            values: HashMap::from([
                (COUNTRY, PropertyValue::text("USA")),
                (TAGS, PropertyValue::multi(["A", "B", "C"])),
            ]),
        }
    }

    fn cond(property: PropertyId, operator: Operator, values: &[&str]) -> Condition {
        Condition {
            property,
            operator,
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    fn rule(scope: Scope, conditions: Vec<Condition>) -> Rule {
        Rule {
            id: RuleId(0),
            name: "r".into(),
            parent: None,
            depth: 0,
            scope,
            conditions,
            effects: Vec::new(),
            forced: false,
            priority: 0,
            delimiter: None,
            subtree_end: RuleId(1),
        }
    }

    #[test]
    fn equals_any_listed_value() {
        let m = ConditionMatcher::new();
        let v = view();
        assert!(m.condition_matches(&cond(COUNTRY, Operator::Equals, &["Canada", "USA"]), &v));
        assert!(!m.condition_matches(&cond(COUNTRY, Operator::Equals, &["Canada"]), &v));
    }

    #[test]
    fn multi_value_membership() {
        let m = ConditionMatcher::new();
        let v = view();
        assert!(m.condition_matches(&cond(TAGS, Operator::Equals, &["B"]), &v));
        assert!(m.condition_matches(&cond(TAGS, Operator::ContainsAll, &["A", "C"]), &v));
        assert!(!m.condition_matches(&cond(TAGS, Operator::ContainsAll, &["A", "D"]), &v));
        assert!(m.condition_matches(&cond(TAGS, Operator::NotEquals, &["D"]), &v));
        assert!(!m.condition_matches(&cond(TAGS, Operator::NotEquals, &["D", "A"]), &v));
    }

    #[test]
    fn absent_property_is_empty() {
        let m = ConditionMatcher::new();
        let v = view();
        let missing = PropertyId(99);
        assert!(m.condition_matches(&cond(missing, Operator::IsEmpty, &[]), &v));
        assert!(!m.condition_matches(&cond(missing, Operator::Equals, &["x"]), &v));
        assert!(m.condition_matches(&cond(missing, Operator::NotEquals, &["x"]), &v));
    }

    #[test]
    fn scope_short_circuits() {
        let m = ConditionMatcher::new();
        let mut v = view();
        let scoped = rule(
            Scope {
                object_types: vec![ObjectTypeId(0)],
                classes: vec![ClassId(10)],
            },
            vec![cond(COUNTRY, Operator::Equals, &["USA"])],
        );
        assert!(m.matches(&scoped, &v));

        v.class = Some(ClassId(11));
        assert!(!m.matches(&scoped, &v));

        v.class = None;
        assert!(!m.matches(&scoped, &v));
    }

    #[test]
    fn global_rule_without_conditions_matches() {
        let m = ConditionMatcher::new();
        assert!(m.matches(&rule(Scope::default(), Vec::new()), &view()));
    }
}
