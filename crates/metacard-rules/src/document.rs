//! Rule configuration document
//!
//! One document per vault. Rules are written with selectors and template
//! strings; [`RuleSet::compile`](crate::RuleSet::compile) turns them into
//! typed [`Rule`](crate::Rule)s.
//!
//! ```yaml
//! rules:
//!   - name: USA city
//!     scope: { class: CL.Customer }
//!     when:
//!       - { property: PD.Country, values: [USA] }
//!     effects:
//!       - type: set_value
//!         property: PD.City
//!         template: "Famous city of {PD.Country} is Florida"
//!     rules: []
//! ```

use crate::error::{RuleLoadError, RuleResult};
use crate::rule::Operator;
use metacard_model::{PropertyValue, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// YAML
    Yaml,
    /// JSON
    Json,
}

impl RuleFormat {
    /// Pick a format from a file extension; anything but `.json` is YAML
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// One value or a list of values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Single value
    One(T),
    /// List of values
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a vector
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Rule document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    /// Top-level rules
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl RuleDocument {
    /// Parse a document in the given format
    ///
    /// # Errors
    /// [`RuleLoadError::Malformed`] if the text does not fit the schema.
    pub fn parse(content: &str, format: RuleFormat) -> RuleResult<Self> {
        match format {
            RuleFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| RuleLoadError::Malformed(e.to_string())),
            RuleFormat::Json => serde_json::from_str(content)
                .map_err(|e| RuleLoadError::Malformed(e.to_string())),
        }
    }

    /// Read and parse a document file
    ///
    /// # Errors
    /// IO failure or a malformed document.
    pub fn load(path: impl AsRef<Path>) -> RuleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, RuleFormat::from_path(path))
    }

    /// Total number of entries, nested ones included
    #[must_use]
    pub fn entry_count(&self) -> usize {
        fn count(entries: &[RuleEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.rules)).sum()
        }
        count(&self.rules)
    }
}

/// One rule as written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Name, used in diagnostics
    #[serde(default)]
    pub name: String,
    /// Object type / class scoping
    #[serde(default)]
    pub scope: ScopeEntry,
    /// Conditions (AND)
    #[serde(default)]
    pub when: Vec<ConditionEntry>,
    /// Effects
    #[serde(default)]
    pub effects: Vec<EffectEntry>,
    /// Forced flag; inherited from the parent when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced: Option<bool>,
    /// Priority; inherited from the parent when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Multi-value placeholder delimiter; inherited when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Nested rules, active only while this rule matches
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// Scope selectors as written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeEntry {
    /// Object type(s)
    #[serde(default)]
    pub object_type: OneOrMany<Selector>,
    /// Class(es)
    #[serde(default)]
    pub class: OneOrMany<Selector>,
}

/// Condition as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionEntry {
    /// Property tested
    pub property: Selector,
    /// Operator
    #[serde(default)]
    pub operator: Operator,
    /// Value(s) compared against
    #[serde(default, alias = "value")]
    pub values: OneOrMany<String>,
}

/// Effect as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectEntry {
    /// Set value from a template or literal values
    SetValue {
        /// Target
        property: Selector,
        /// Template text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
        /// Literal value(s)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<PropertyValue>,
    },
    /// Set label
    SetLabel {
        /// Target
        property: Selector,
        /// Label template
        label: String,
    },
    /// Add property to the card
    AddProperty {
        /// Target
        property: Selector,
    },
    /// Remove property from the card
    RemoveProperty {
        /// Target
        property: Selector,
    },
    /// Clear value
    ClearValue {
        /// Target
        property: Selector,
    },
    /// Set required flag
    SetRequired {
        /// Target
        property: Selector,
        /// Flag
        #[serde(default = "default_true")]
        required: bool,
    },
    /// Set description
    SetDescription {
        /// Target
        property: Selector,
        /// Description template
        text: String,
    },
}

fn default_true() -> bool {
    true
}

impl EffectEntry {
    /// Target selector
    #[must_use]
    pub fn property(&self) -> &Selector {
        match self {
            Self::SetValue { property, .. }
            | Self::SetLabel { property, .. }
            | Self::AddProperty { property }
            | Self::RemoveProperty { property }
            | Self::ClearValue { property }
            | Self::SetRequired { property, .. }
            | Self::SetDescription { property, .. } => property,
        }
    }
}
