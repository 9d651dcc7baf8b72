//! Metacard Rules
//!
//! Rule definition store and condition matcher.
//!
//! # Overview
//!
//! - **Documents**: [`RuleDocument`] - rules as written (YAML or JSON), nested
//! - **Templates**: [`RawTemplate`] / [`Template`] - literal text with `{property}` placeholders
//! - **Store**: [`RuleSet`] - compiled, immutable rules with a dependency index
//! - **Diagnostics**: [`LoadReport`] - rules skipped at load time and why
//! - **Matching**: [`ConditionMatcher`] over any [`CardView`]
//!
//! # Example
//!
//! ```rust
//! use metacard_model::{DataType, PropertyDef, Vocabulary};
//! use metacard_rules::{RuleFormat, RuleSet};
//!
//! let vocabulary = Vocabulary::builder()
//!     .property(PropertyDef::new(1001, "Country", DataType::Text).with_alias("PD.Country"))
//!     .property(PropertyDef::new(1002, "City", DataType::Text).with_alias("PD.City"))
//!     .build()
//!     .unwrap();
//!
//! let yaml = r#"
//! rules:
//!   - name: USA city
//!     when: [{ property: PD.Country, value: USA }]
//!     effects:
//!       - { type: set_value, property: PD.City, template: "Famous city of {PD.Country} is Florida" }
//! "#;
//!
//! let (rules, report) = RuleSet::load_str(&vocabulary, yaml, RuleFormat::Yaml, true).unwrap();
//! assert_eq!(rules.len(), 1);
//! assert!(report.is_clean());
//! ```

#![warn(missing_docs)]

pub mod diagnostics;
pub mod document;
pub mod error;
pub mod matcher;
pub mod rule;
pub mod store;
pub mod template;

// Re-exports
pub use diagnostics::{Diagnostic, DiagnosticKind, LoadReport, Severity};
pub use document::{
    ConditionEntry, EffectEntry, OneOrMany, RuleDocument, RuleEntry, RuleFormat, ScopeEntry,
};
pub use error::{RuleLoadError, RuleResult, TemplateError};
pub use matcher::{CardView, ConditionMatcher};
pub use rule::{Condition, Effect, Operator, Payload, Rule, RuleId, Scope, Slot};
pub use store::RuleSet;
pub use template::{escape_literal, RawSegment, RawTemplate, Segment, Template};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for rule handling
    pub use crate::{
        CardView, ConditionMatcher, Effect, LoadReport, Rule, RuleFormat, RuleId, RuleSet, Slot,
        Template,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
