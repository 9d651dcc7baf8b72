//! Metacard Engine
//!
//! Reactive derivation of metadata card values, labels and visibility from
//! configuration rules.
//!
//! # Overview
//!
//! - **Card**: [`CardState`] - one open card session, explicit and owned
//! - **Tracker**: [`OverrideState`] - rule-derived vs user-overridden values
//! - **Resolver**: [`PlaceholderResolver`] - template expansion against live values
//! - **Engine**: [`RuleEngine`] - settles each change to a fixed point
//! - **Repository**: [`MetadataRepository`] - persistence collaborator
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use metacard_engine::{EngineConfig, RuleEngine};
//! use metacard_model::{ClassDocument, ClassId, DataType, ObjectTypeDef, ObjectTypeId, PropertyDef,
//!     PropertyId, PropertyValue, Vocabulary};
//! use metacard_rules::{RuleFormat, RuleSet};
//!
//! let vocabulary = Vocabulary::builder()
//!     .object_type(ObjectTypeDef::new(0, "Document"))
//!     .property(PropertyDef::new(1, "Country", DataType::Text).with_alias("PD.Country"))
//!     .property(PropertyDef::new(2, "City", DataType::Text).with_alias("PD.City"))
//!     .class(ClassDocument::new(1, "Customer", 0u32).with_properties(["PD.Country", "PD.City"]))
//!     .build()
//!     .unwrap();
//!
//! let yaml = r#"
//! rules:
//!   - when: [{ property: PD.Country, value: USA }]
//!     effects:
//!       - { type: set_value, property: PD.City, template: "Famous city of {PD.Country} is Florida" }
//! "#;
//! let (rules, _) = RuleSet::load_str(&vocabulary, yaml, RuleFormat::Yaml, true).unwrap();
//! let engine = RuleEngine::new(Arc::new(vocabulary), Arc::new(rules), EngineConfig::default()).unwrap();
//!
//! let (mut card, _) = engine.open_card(ObjectTypeId(0), Some(ClassId(1)), []).unwrap();
//! engine.user_edit(&mut card, PropertyId(1), "USA").unwrap();
//! assert_eq!(
//!     card.value(PropertyId(2)),
//!     Some(&PropertyValue::text("Famous city of USA is Florida"))
//! );
//! ```

#![warn(missing_docs)]

mod applier;
pub mod card;
pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod tracker;

// Re-exports
pub use card::{CardSnapshot, CardState, PropertySlot, PropertySnapshot, SessionId};
pub use config::EngineConfig;
pub use engine::{RuleEngine, SettleReport};
pub use error::{EngineError, EngineResult};
pub use repository::MetadataRepository;
pub use resolver::{PlaceholderResolver, Resolution};
pub use tracker::{Binding, BindingGraph, OverrideState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        CardSnapshot, CardState, EngineConfig, EngineError, MetadataRepository, OverrideState,
        RuleEngine, SettleReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
