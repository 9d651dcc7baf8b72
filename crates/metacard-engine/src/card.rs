//! Card state
//!
//! One [`CardState`] per open metadata card. It owns every value, label
//! and override state of the card plus the set of currently matching rules,
//! and is mutated only through [`RuleEngine`](crate::RuleEngine) calls.

use crate::error::{EngineError, EngineResult};
use crate::tracker::{Binding, OverrideState};
use indexmap::{IndexMap, IndexSet};
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue};
use metacard_rules::{CardView, RuleId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Card session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Ulid);

impl SessionId {
    /// Fresh session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One property on the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySlot {
    pub(crate) value: PropertyValue,
    pub(crate) state: OverrideState,
    pub(crate) label: String,
    pub(crate) required: bool,
    pub(crate) description: Option<String>,
    pub(crate) in_scope: bool,
    /// Rule whose derived value the user replaced
    pub(crate) overrode: Option<RuleId>,
}

impl PropertySlot {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            value: PropertyValue::Empty,
            state: OverrideState::Unset,
            label: label.into(),
            required: false,
            description: None,
            in_scope: true,
            overrode: None,
        }
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Override state
    #[inline]
    #[must_use]
    pub fn state(&self) -> OverrideState {
        self.state
    }

    /// Active label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Required flag
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Description text, when a rule sets one
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True while the user has written this property
    #[inline]
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.state.is_user_overridden()
    }

    /// Rule currently supplying the value
    #[inline]
    #[must_use]
    pub fn derived_by(&self) -> Option<RuleId> {
        self.state.binding().map(|binding| binding.rule)
    }
}

/// Mutable state of one open card
#[derive(Debug, Clone)]
pub struct CardState {
    pub(crate) session: SessionId,
    pub(crate) origin: Option<SessionId>,
    pub(crate) object_type: ObjectTypeId,
    pub(crate) class: Option<ClassId>,
    pub(crate) properties: IndexMap<PropertyId, PropertySlot>,
    pub(crate) user_added: IndexSet<PropertyId>,
    pub(crate) active: IndexMap<RuleId, u64>,
    pub(crate) next_activation: u64,
    pub(crate) editing: Option<PropertyId>,
}

impl CardState {
    pub(crate) fn new(object_type: ObjectTypeId, class: Option<ClassId>) -> Self {
        Self {
            session: SessionId::new(),
            origin: None,
            object_type,
            class,
            properties: IndexMap::new(),
            user_added: IndexSet::new(),
            active: IndexMap::new(),
            next_activation: 0,
            editing: None,
        }
    }

    /// Session identifier
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Session this card was popped out of
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<SessionId> {
        self.origin
    }

    /// Current class
    #[inline]
    #[must_use]
    pub fn class(&self) -> Option<ClassId> {
        self.class
    }

    /// Object type
    #[inline]
    #[must_use]
    pub fn object_type(&self) -> ObjectTypeId {
        self.object_type
    }

    /// Property slot, if the property is on the card
    #[inline]
    #[must_use]
    pub fn property(&self, id: PropertyId) -> Option<&PropertySlot> {
        self.properties.get(&id)
    }

    /// Current value, if the property is on the card
    #[inline]
    #[must_use]
    pub fn value(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.properties.get(&id).map(PropertySlot::value)
    }

    /// Active label, if the property is on the card
    #[inline]
    #[must_use]
    pub fn label(&self, id: PropertyId) -> Option<&str> {
        self.properties.get(&id).map(PropertySlot::label)
    }

    /// True when the property is on the card
    #[inline]
    #[must_use]
    pub fn contains(&self, id: PropertyId) -> bool {
        self.properties.contains_key(&id)
    }

    /// Properties on the card, in card order
    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &PropertySlot)> {
        self.properties.iter().map(|(id, slot)| (*id, slot))
    }

    /// Properties the user added
    pub fn user_added(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.user_added.iter().copied()
    }

    /// Rules currently matching, in activation order
    pub fn active_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.active.keys().copied()
    }

    /// True when the rule currently matches
    #[inline]
    #[must_use]
    pub fn is_active(&self, rule: RuleId) -> bool {
        self.active.contains_key(&rule)
    }

    /// Property in edit mode
    #[inline]
    #[must_use]
    pub fn editing(&self) -> Option<PropertyId> {
        self.editing
    }

    /// Clone into an independent session
    ///
    /// Edits on either copy do not affect the other.
    #[must_use]
    pub fn pop_out(&self) -> Self {
        Self {
            session: SessionId::new(),
            origin: Some(self.session),
            ..self.clone()
        }
    }

    /// Adopt the state of a card popped out of this session
    ///
    /// # Errors
    /// [`EngineError::ForeignSession`] if `popped` came from another session.
    pub fn pop_in(&mut self, popped: Self) -> EngineResult<()> {
        if popped.origin != Some(self.session) {
            return Err(EngineError::ForeignSession {
                session: self.session.to_string(),
                popped: popped.session.to_string(),
            });
        }
        let session = self.session;
        let origin = self.origin;
        *self = Self {
            session,
            origin,
            ..popped
        };
        Ok(())
    }

    /// Serializable view of the card
    #[must_use]
    pub fn snapshot(&self) -> CardSnapshot {
        CardSnapshot {
            session: self.session,
            object_type: self.object_type,
            class: self.class,
            properties: self
                .properties
                .iter()
                .map(|(id, slot)| PropertySnapshot {
                    id: *id,
                    label: slot.label.clone(),
                    value: slot.value.clone(),
                    required: slot.required,
                    description: slot.description.clone(),
                    state: slot.state,
                })
                .collect(),
        }
    }

    pub(crate) fn activation_of(&self, rule: RuleId) -> Option<u64> {
        self.active.get(&rule).copied()
    }

    pub(crate) fn activate(&mut self, rule: RuleId) {
        let seq = self.next_activation;
        self.next_activation += 1;
        self.active.insert(rule, seq);
    }

    pub(crate) fn deactivate(&mut self, rule: RuleId) {
        self.active.shift_remove(&rule);
    }

    pub(crate) fn bindings(&self) -> impl Iterator<Item = (PropertyId, Binding)> + '_ {
        self.properties
            .iter()
            .filter_map(|(id, slot)| slot.state.binding().map(|binding| (*id, binding)))
    }
}

impl CardView for CardState {
    fn object_type(&self) -> ObjectTypeId {
        self.object_type
    }

    fn class(&self) -> Option<ClassId> {
        self.class
    }

    fn value(&self, property: PropertyId) -> Option<&PropertyValue> {
        self.properties.get(&property).map(PropertySlot::value)
    }
}

/// Rendered card, for the UI and for saving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnapshot {
    /// Session
    pub session: SessionId,
    /// Object type
    pub object_type: ObjectTypeId,
    /// Class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassId>,
    /// Visible properties, in card order
    pub properties: Vec<PropertySnapshot>,
}

impl CardSnapshot {
    /// Property by ID
    #[must_use]
    pub fn property(&self, id: PropertyId) -> Option<&PropertySnapshot> {
        self.properties.iter().find(|p| p.id == id)
    }
}

/// One rendered property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    /// Property
    pub id: PropertyId,
    /// Active label
    pub label: String,
    /// Value
    pub value: PropertyValue,
    /// Required flag
    #[serde(default)]
    pub required: bool,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Override state
    #[serde(flatten)]
    pub state: OverrideState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardState {
        let mut card = CardState::new(ObjectTypeId(0), Some(ClassId(1)));
        let mut slot = PropertySlot::new("Country");
        slot.value = PropertyValue::text("USA");
        card.properties.insert(PropertyId(10), slot);
        card
    }

    #[test]
    fn pop_out_is_independent() {
        let original = card();
        let mut popped = original.pop_out();
        assert_ne!(popped.session(), original.session());
        assert_eq!(popped.origin(), Some(original.session()));

        popped.properties.get_mut(&PropertyId(10)).unwrap().value = PropertyValue::text("Canada");
        assert_eq!(original.value(PropertyId(10)), Some(&PropertyValue::text("USA")));
    }

    #[test]
    fn pop_in_keeps_session() {
        let mut original = card();
        let session = original.session();
        let mut popped = original.pop_out();
        popped.properties.get_mut(&PropertyId(10)).unwrap().value = PropertyValue::text("Canada");

        original.pop_in(popped).unwrap();
        assert_eq!(original.session(), session);
        assert_eq!(original.origin(), None);
        assert_eq!(original.value(PropertyId(10)), Some(&PropertyValue::text("Canada")));
    }

    #[test]
    fn pop_in_rejects_foreign_card() {
        let mut original = card();
        let stranger = card().pop_out();
        assert!(matches!(
            original.pop_in(stranger),
            Err(EngineError::ForeignSession { .. })
        ));
    }

    #[test]
    fn activation_order() {
        let mut card = card();
        card.activate(RuleId(3));
        card.activate(RuleId(1));
        assert_eq!(card.activation_of(RuleId(3)), Some(0));
        assert_eq!(card.activation_of(RuleId(1)), Some(1));
        card.deactivate(RuleId(3));
        assert!(!card.is_active(RuleId(3)));
        assert_eq!(card.active_rules().collect::<Vec<_>>(), vec![RuleId(1)]);
    }

    #[test]
    fn snapshot_serializes_state() {
        let json = serde_json::to_value(card().snapshot()).unwrap();
        assert_eq!(json["properties"][0]["value"], "USA");
        assert_eq!(json["properties"][0]["state"], "unset");
    }
}
