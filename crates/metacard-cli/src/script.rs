//! Replay scripts
//!
//! A replay script opens one card and feeds it a list of user actions:
//!
//! ```yaml
//! class: CL.Customer
//! initial:
//!   - { property: PD.Country, value: Canada }
//! steps:
//!   - edit: { property: PD.Country, value: USA }
//!   - activate: PD.City
//!   - set_class: CL.Invoice
//!   - add: PD.Comment
//!   - remove: PD.Comment
//!   - reevaluate
//! ```

use anyhow::{bail, Context, Result};
use metacard_model::{ClassId, ObjectTypeId, PropertyId, PropertyValue, Selector, Vocabulary};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// One property write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assignment {
    /// Target property
    pub property: Selector,
    /// Value written; `null` clears
    #[serde(default)]
    pub value: PropertyValue,
}

/// One user action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Write a value
    Edit(Assignment),
    /// Enter edit mode on a property
    Activate(Selector),
    /// Change the class; `null` clears it
    SetClass(Option<Selector>),
    /// Add a property to the card
    Add(Selector),
    /// Remove a user-added property
    Remove(Selector),
    /// Evaluate every rule again
    Reevaluate,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit(assignment) => write!(f, "edit {} = {}", assignment.property, assignment.value),
            Self::Activate(property) => write!(f, "activate {property}"),
            Self::SetClass(Some(class)) => write!(f, "set class {class}"),
            Self::SetClass(None) => write!(f, "clear class"),
            Self::Add(property) => write!(f, "add {property}"),
            Self::Remove(property) => write!(f, "remove {property}"),
            Self::Reevaluate => write!(f, "reevaluate"),
        }
    }
}

/// Parsed replay script
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    /// Object type; defaults to the class's object type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<Selector>,
    /// Initial class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<Selector>,
    /// Stored values the card opens with
    #[serde(default)]
    pub initial: Vec<Assignment>,
    /// Actions, in order
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl ReplayScript {
    /// Parse a YAML script
    ///
    /// # Errors
    /// Malformed YAML or unknown keys.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("malformed replay script")
    }

    /// Read a YAML script from disk
    ///
    /// # Errors
    /// Unreadable file or malformed script.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Object type and class the card opens with
    ///
    /// # Errors
    /// Selectors that name nothing, or neither an object type nor a class.
    pub fn resolve_target(&self, vocabulary: &Vocabulary) -> Result<(ObjectTypeId, Option<ClassId>)> {
        let class = self
            .class
            .as_ref()
            .map(|selector| vocabulary.resolve_class(selector))
            .transpose()?;

        let object_type = match (&self.object_type, class) {
            (Some(selector), _) => vocabulary.resolve_object_type(selector)?,
            (None, Some(class)) => match vocabulary.class(class) {
                Some(def) => def.object_type,
                None => bail!("{class} has no definition"),
            },
            (None, None) => bail!("replay script names neither an object type nor a class"),
        };
        Ok((object_type, class))
    }

    /// Initial values with resolved property IDs
    ///
    /// # Errors
    /// A selector that names no property.
    pub fn resolve_initial(&self, vocabulary: &Vocabulary) -> Result<Vec<(PropertyId, PropertyValue)>> {
        self.initial
            .iter()
            .map(|assignment| {
                let property = vocabulary.resolve_property(&assignment.property)?;
                Ok((property, assignment.value.clone()))
            })
            .collect()
    }
}
