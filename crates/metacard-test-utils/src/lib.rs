//! Testing utilities for the metacard workspace
//!
//! Shared vocabulary fixture, engine builders and an in-memory repository.

#![allow(missing_docs)]

use metacard_engine::{CardSnapshot, CardState, EngineConfig, MetadataRepository, RuleEngine};
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue, Vocabulary};
use metacard_rules::{RuleFormat, RuleSet};
use std::sync::Arc;

/// Fixture vocabulary, as a vault administrator would export it
pub const VOCABULARY_YAML: &str = r#"
object_types:
  - { id: 0, name: Document, alias: OT.Document }
properties:
  - { id: 1001, name: Country, alias: PD.Country, data_type: lookup, values: [USA, Canada, Mexico] }
  - { id: 1002, name: City, alias: PD.City, data_type: text }
  - { id: 1003, name: State, alias: PD.State, data_type: text }
  - { id: 1004, name: Tags, alias: PD.Tags, data_type: multi_lookup, values: [A, B, C] }
  - { id: 1005, name: Summary, alias: PD.Summary, data_type: text }
  - { id: 1006, name: Region, alias: PD.Region, data_type: text }
  - { id: 1007, name: Zip, alias: PD.Zip, data_type: text }
  - { id: 1008, name: Department, alias: PD.Department, data_type: lookup, values: [Sales, Legal] }
  - { id: 1009, name: Level 1, alias: PD.Level1, data_type: text }
  - { id: 1010, name: Level 2, alias: PD.Level2, data_type: text }
  - { id: 1011, name: Level 3, alias: PD.Level3, data_type: text }
  - { id: 1012, name: Level 4, alias: PD.Level4, data_type: text }
  - { id: 1013, name: Comment, alias: PD.Comment, data_type: multi_line_text }
classes:
  - id: 1
    name: Customer
    alias: CL.Customer
    guid: 5d0c3c8e-6a43-4b8f-9a55-0d6c3f2b7a11
    object_type: OT.Document
    properties: [PD.Country, PD.City]
  - id: 2
    name: Contract
    alias: CL.Contract
    object_type: 0
    properties: [PD.Department, PD.Summary]
  - id: 3
    name: Invoice
    alias: CL.Invoice
    object_type: OT.Document
    properties: [PD.Country, PD.Zip]
"#;

pub mod props {
    use metacard_model::PropertyId;

    pub const COUNTRY: PropertyId = PropertyId(1001);
    pub const CITY: PropertyId = PropertyId(1002);
    pub const STATE: PropertyId = PropertyId(1003);
    pub const TAGS: PropertyId = PropertyId(1004);
    pub const SUMMARY: PropertyId = PropertyId(1005);
    pub const REGION: PropertyId = PropertyId(1006);
    pub const ZIP: PropertyId = PropertyId(1007);
    pub const DEPARTMENT: PropertyId = PropertyId(1008);
    pub const LEVEL1: PropertyId = PropertyId(1009);
    pub const LEVEL2: PropertyId = PropertyId(1010);
    pub const LEVEL3: PropertyId = PropertyId(1011);
    pub const LEVEL4: PropertyId = PropertyId(1012);
    pub const COMMENT: PropertyId = PropertyId(1013);
}

pub mod classes {
    use metacard_model::ClassId;

    pub const CUSTOMER: ClassId = ClassId(1);
    pub const CONTRACT: ClassId = ClassId(2);
    pub const INVOICE: ClassId = ClassId(3);
}

pub const DOCUMENT: ObjectTypeId = ObjectTypeId(0);

pub fn vocabulary() -> Vocabulary {
    Vocabulary::from_yaml_str(VOCABULARY_YAML).unwrap()
}

/// Engine over the fixture vocabulary; panics unless every rule compiles
pub fn engine(rules_yaml: &str) -> RuleEngine {
    engine_with_config(rules_yaml, EngineConfig::default())
}

pub fn engine_with_config(rules_yaml: &str, config: EngineConfig) -> RuleEngine {
    let vocabulary = vocabulary();
    let (rules, report) = RuleSet::load_str(&vocabulary, rules_yaml, RuleFormat::Yaml, true).unwrap();
    assert!(report.is_clean(), "fixture rules have diagnostics: {:?}", report.diagnostics);
    RuleEngine::new(Arc::new(vocabulary), Arc::new(rules), config).unwrap()
}

/// Open an empty card of the given class
pub fn open(engine: &RuleEngine, class: ClassId) -> CardState {
    engine.open_card(DOCUMENT, Some(class), []).unwrap().0
}

pub fn text(value: &str) -> PropertyValue {
    PropertyValue::text(value)
}

/// Current value rendered as text ("" when absent)
pub fn value_of(card: &CardState, property: PropertyId) -> String {
    card.value(property)
        .map(|value| value.render("; "))
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
#[error("repository refused save: {0}")]
pub struct RepositoryError(pub String);

/// Repository that keeps saved snapshots in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    pub saved: Vec<CardSnapshot>,
    pub refuse_with: Option<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(reason: &str) -> Self {
        Self {
            saved: Vec::new(),
            refuse_with: Some(reason.to_string()),
        }
    }
}

impl MetadataRepository for MemoryRepository {
    type Error = RepositoryError;

    fn save(&mut self, snapshot: &CardSnapshot) -> Result<(), Self::Error> {
        if let Some(reason) = &self.refuse_with {
            return Err(RepositoryError(reason.clone()));
        }
        self.saved.push(snapshot.clone());
        Ok(())
    }
}
