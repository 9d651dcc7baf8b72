//! Rule engine orchestrator
//!
//! Every operation feeds one external change into the card and settles it
//! to a fixed point before returning. A settle iteration:
//!
//! 1. evaluates the rules affected by the dirty slots, parents before
//!    children, and records which rules started or stopped matching
//! 2. adds and removes properties (class scope, user additions, visibility
//!    rules)
//! 3. applies value effects of rules that fired, and of forced rules that
//!    still match
//! 4. re-resolves every bound value in placeholder dependency order
//!
//! Properties whose value or presence changed become the dirty slots of
//! the next iteration. Labels, required flags and descriptions are
//! recomputed once the loop settles.
//!
//! If an operation fails the card is left exactly as it was before the
//! call.

use crate::applier::{EffectApplier, Tick};
use crate::card::{CardSnapshot, CardState, PropertySlot};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::repository::MetadataRepository;
use crate::tracker::{BindingGraph, OverrideState};
use indexmap::IndexSet;
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue, Vocabulary};
use metacard_rules::{ConditionMatcher, Diagnostic, LoadReport, RuleId, RuleSet, Slot};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one settled operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettleReport {
    /// Iterations run
    pub iterations: usize,
    /// Rules that started matching, in evaluation order
    pub fired: Vec<RuleId>,
    /// Rules that stopped matching
    pub deactivated: Vec<RuleId>,
    /// Properties whose value changed
    pub changed: Vec<PropertyId>,
    /// Properties that entered the card
    pub added: Vec<PropertyId>,
    /// Properties that left the card
    pub removed: Vec<PropertyId>,
    /// Effects skipped at runtime
    pub diagnostics: Vec<Diagnostic>,
}

impl SettleReport {
    /// True when the operation changed nothing observable
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.fired.is_empty()
            && self.deactivated.is_empty()
            && self.changed.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }

    fn absorb(&mut self, tick: Tick, card: &CardState) {
        let (changed, added, removed) = tick.outcome(card);
        for (list, items) in [
            (&mut self.changed, changed),
            (&mut self.added, added),
            (&mut self.removed, removed),
        ] {
            for item in items {
                if !list.contains(&item) {
                    list.push(item);
                }
            }
        }
        self.diagnostics.extend(tick.diagnostics);
    }
}

/// Where a settle pass starts
enum Start {
    /// Evaluate every rule
    Full,
    /// Evaluate rules affected by these slots
    Dirty(IndexSet<Slot>),
}

/// Derivation engine for one vault
#[derive(Debug, Clone)]
pub struct RuleEngine {
    vocabulary: Arc<Vocabulary>,
    rules: Arc<RuleSet>,
    config: EngineConfig,
    matcher: ConditionMatcher,
}

impl RuleEngine {
    /// Create engine over a loaded vocabulary and rule set
    ///
    /// # Errors
    /// [`EngineError::Config`] for an invalid configuration.
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        rules: Arc<RuleSet>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        info!(rules = rules.len(), "rule engine ready");
        Ok(Self {
            vocabulary,
            rules,
            config,
            matcher: ConditionMatcher::new(),
        })
    }

    /// Load a rule file and create the engine
    ///
    /// Uses `config.strict_rules` to decide whether invalid rules are
    /// skipped or reject the file.
    ///
    /// # Errors
    /// Invalid configuration, or a rule file that cannot be read, parsed
    /// or (in strict mode) fully compiled.
    pub fn load(
        vocabulary: Arc<Vocabulary>,
        rules_path: impl AsRef<Path>,
        config: EngineConfig,
    ) -> EngineResult<(Self, LoadReport)> {
        config.validate()?;
        let (rules, report) = RuleSet::load(&vocabulary, rules_path, config.strict_rules)?;
        Ok((Self::new(vocabulary, Arc::new(rules), config)?, report))
    }

    /// Vocabulary
    #[inline]
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Rule set
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a card for a new or existing object
    ///
    /// The class's properties are put on the card, then `initial` values
    /// are loaded. Non-empty initial values count as user-owned, so
    /// advisory rules do not overwrite stored data. Properties outside the
    /// class count as user-added.
    ///
    /// # Errors
    /// Unknown object type, class or property, or rules that do not settle.
    pub fn open_card(
        &self,
        object_type: ObjectTypeId,
        class: Option<ClassId>,
        initial: impl IntoIterator<Item = (PropertyId, PropertyValue)>,
    ) -> EngineResult<(CardState, SettleReport)> {
        if self.vocabulary.object_type(object_type).is_none() {
            return Err(EngineError::UnknownObjectType(object_type));
        }
        if let Some(class) = class {
            self.check_class(object_type, class)?;
        }

        let mut card = CardState::new(object_type, class);
        if let Some(class) = class {
            for &property in self.vocabulary.class_properties(class) {
                card.properties.insert(
                    property,
                    PropertySlot::new(self.vocabulary.default_label(property)),
                );
            }
        }
        for (property, value) in initial {
            self.check_property(property)?;
            let value = self.shape(property, value);
            let slot = card.properties.entry(property).or_insert_with(|| {
                PropertySlot::new(self.vocabulary.default_label(property))
            });
            if !value.is_empty() {
                slot.state = OverrideState::UserOverridden;
            }
            slot.value = value;
            if !class.is_some_and(|c| self.vocabulary.class_properties(c).contains(&property)) {
                card.user_added.insert(property);
            }
        }

        info!(session = %card.session(), %object_type, ?class, "card opened");
        let report = self.run(&mut card, Start::Full)?;
        Ok((card, report))
    }

    /// Feed a user write into the card
    ///
    /// The property becomes user-owned and drops any rule binding. Writing
    /// the current value again is ignored unless
    /// `treat_unchanged_write_as_edit` is set.
    ///
    /// # Errors
    /// Unknown property, property not on the card, or rules that do not
    /// settle.
    pub fn user_edit(
        &self,
        card: &mut CardState,
        property: PropertyId,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<SettleReport> {
        self.check_property(property)?;
        let value = self.shape(property, value.into());
        let slot = card
            .properties
            .get(&property)
            .ok_or(EngineError::PropertyNotOnCard(property))?;

        if slot.value == value && !self.config.treat_unchanged_write_as_edit {
            debug!(%property, "unchanged write ignored");
            return Ok(SettleReport::default());
        }

        self.atomically(card, |card| {
            let before = card.value(property).cloned();
            if let Some(slot) = card.properties.get_mut(&property) {
                slot.overrode = slot.derived_by().or(slot.overrode);
                slot.value = value;
                slot.state = OverrideState::UserOverridden;
            }
            debug!(%property, "user edit");
            let mut report = self.run(card, Start::Dirty(IndexSet::from([Slot::Property(property)])))?;
            if card.contains(property)
                && before.as_ref() != card.value(property)
                && !report.changed.contains(&property)
            {
                report.changed.insert(0, property);
            }
            Ok(report)
        })
    }

    /// Put a property into edit mode
    ///
    /// Does not change ownership: placeholders keep following afterwards.
    ///
    /// # Errors
    /// [`EngineError::PropertyNotOnCard`] if the property is not shown.
    pub fn activate_edit(&self, card: &mut CardState, property: PropertyId) -> EngineResult<()> {
        if !card.contains(property) {
            return Err(EngineError::PropertyNotOnCard(property));
        }
        card.editing = Some(property);
        debug!(%property, "edit mode activated");
        Ok(())
    }

    /// Change (or clear) the card's class
    ///
    /// # Errors
    /// Class unknown or of another object type, or rules that do not settle.
    pub fn set_class(&self, card: &mut CardState, class: Option<ClassId>) -> EngineResult<SettleReport> {
        if let Some(class) = class {
            self.check_class(card.object_type, class)?;
        }
        if card.class == class {
            return Ok(SettleReport::default());
        }

        self.atomically(card, |card| {
            info!(from = ?card.class, to = ?class, "class changed");
            card.class = class;
            self.run(card, Start::Dirty(IndexSet::from([Slot::Class])))
        })
    }

    /// Add a property to the card on the user's request
    ///
    /// # Errors
    /// Unknown property, or rules that do not settle.
    pub fn add_property(&self, card: &mut CardState, property: PropertyId) -> EngineResult<SettleReport> {
        self.check_property(property)?;
        if card.user_added.contains(&property) && card.contains(property) {
            return Ok(SettleReport::default());
        }

        self.atomically(card, |card| {
            card.user_added.insert(property);
            self.run(card, Start::Dirty(IndexSet::from([Slot::Property(property)])))
        })
    }

    /// Remove a property the user added
    ///
    /// # Errors
    /// [`EngineError::NotUserAdded`] for class or rule-shown properties,
    /// or rules that do not settle.
    pub fn remove_property(
        &self,
        card: &mut CardState,
        property: PropertyId,
    ) -> EngineResult<SettleReport> {
        if !card.user_added.contains(&property) {
            return Err(EngineError::NotUserAdded(property));
        }

        self.atomically(card, |card| {
            card.user_added.shift_remove(&property);
            let was_present = card.properties.shift_remove(&property).is_some();
            if card.editing == Some(property) {
                card.editing = None;
            }
            let mut report = self.run(card, Start::Dirty(IndexSet::from([Slot::Property(property)])))?;
            if was_present && !card.contains(property) {
                report.removed.insert(0, property);
            }
            Ok(report)
        })
    }

    /// Evaluate every rule again
    ///
    /// At a fixed point this changes nothing.
    ///
    /// # Errors
    /// Rules that do not settle.
    pub fn reevaluate(&self, card: &mut CardState) -> EngineResult<SettleReport> {
        self.atomically(card, |card| self.run(card, Start::Full))
    }

    /// Persist the card through the repository
    ///
    /// # Errors
    /// The repository's error, unchanged.
    pub fn save<R: MetadataRepository>(
        &self,
        card: &CardState,
        repository: &mut R,
    ) -> Result<CardSnapshot, R::Error> {
        let snapshot = card.snapshot();
        repository.save(&snapshot)?;
        info!(session = %card.session(), properties = snapshot.properties.len(), "card saved");
        Ok(snapshot)
    }

    /// Close a card without saving
    pub fn discard(&self, card: CardState) {
        info!(session = %card.session(), "card discarded");
    }

    fn check_property(&self, property: PropertyId) -> EngineResult<()> {
        if self.vocabulary.property(property).is_none() {
            return Err(EngineError::UnknownProperty(property));
        }
        Ok(())
    }

    fn check_class(&self, object_type: ObjectTypeId, class: ClassId) -> EngineResult<()> {
        match self.vocabulary.class(class) {
            Some(def) if def.object_type == object_type => Ok(()),
            _ => Err(EngineError::InvalidClass { class, object_type }),
        }
    }

    /// Fit a value to the property's cardinality
    fn shape(&self, property: PropertyId, value: PropertyValue) -> PropertyValue {
        value.fitted(
            self.vocabulary.is_multi_value(property),
            &self.config.default_delimiter,
        )
    }

    fn atomically(
        &self,
        card: &mut CardState,
        operation: impl FnOnce(&mut CardState) -> EngineResult<SettleReport>,
    ) -> EngineResult<SettleReport> {
        let backup = card.clone();
        match operation(card) {
            Ok(report) => Ok(report),
            Err(e) => {
                *card = backup;
                Err(e)
            }
        }
    }

    /// Settle loop
    fn run(&self, card: &mut CardState, start: Start) -> EngineResult<SettleReport> {
        let applier = EffectApplier::new(&self.vocabulary, &self.rules, &self.config);
        let mut graph = BindingGraph::from_bindings(card.bindings(), &self.rules);
        let mut report = SettleReport::default();

        let (mut full, mut dirty) = match start {
            Start::Full => (true, IndexSet::new()),
            Start::Dirty(slots) => (false, slots),
        };

        loop {
            if report.iterations >= self.config.max_iterations {
                error!(
                    iterations = report.iterations,
                    dirty = dirty.len(),
                    "rules did not settle"
                );
                return Err(EngineError::NonTerminating {
                    iterations: report.iterations,
                    dirty: dirty.into_iter().collect(),
                });
            }
            report.iterations += 1;

            let mut candidates = if full {
                (0..self.rules.len())
                    .filter_map(|i| u32::try_from(i).ok().map(RuleId))
                    .collect()
            } else {
                self.candidates(&dirty)
            };
            full = false;

            let mut applications = Vec::new();
            while let Some(id) = candidates.pop_first() {
                let Some(rule) = self.rules.get(id) else {
                    continue;
                };
                let parent_matches = rule.parent.map_or(true, |parent| card.is_active(parent));
                let matches = parent_matches && self.matcher.matches(rule, &*card);

                match (card.is_active(id), matches) {
                    (false, true) => {
                        card.activate(id);
                        debug!(rule = %id, rule_name = %rule.name, "rule fired");
                        report.fired.push(id);
                        applications.extend(EffectApplier::value_effects(rule));
                        candidates.extend(rule.descendants());
                    }
                    (true, false) => {
                        card.deactivate(id);
                        debug!(rule = %id, rule_name = %rule.name, "rule deactivated");
                        report.deactivated.push(id);
                        candidates.extend(rule.descendants());
                    }
                    (true, true) if rule.forced => {
                        applications.extend(EffectApplier::value_effects(rule));
                    }
                    _ => {}
                }
            }

            let mut tick = Tick::default();
            for property in applier.apply_visibility(card, &mut graph, &mut tick) {
                applications.extend(applier.entering_effects(card, property));
            }
            applier.apply_values(card, applications, &mut graph, &mut tick);
            applier.resolve_bindings(card, &graph, &mut tick);

            dirty = tick.dirty_slots(card);
            report.absorb(tick, card);
            if dirty.is_empty() {
                break;
            }
        }

        applier.apply_presentation(card);
        debug!(
            iterations = report.iterations,
            fired = report.fired.len(),
            changed = report.changed.len(),
            "card settled"
        );
        Ok(report)
    }

    /// Rules to evaluate for a set of dirty slots
    fn candidates(&self, dirty: &IndexSet<Slot>) -> BTreeSet<RuleId> {
        let mut candidates = BTreeSet::new();
        for slot in dirty {
            candidates.extend(self.rules.triggered_by(*slot).iter().copied());
            if let Slot::Property(property) = slot {
                candidates.extend(self.rules.forced_targeting(*property).iter().copied());
            }
        }
        candidates
    }
}
