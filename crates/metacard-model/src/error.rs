//! Error types for the vocabulary model

use crate::ids::Selector;
use std::path::PathBuf;

/// Kind of definition a selector was resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Object type definition
    ObjectType,
    /// Class definition
    Class,
    /// Property definition
    Property,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ObjectType => "object type",
            Self::Class => "class",
            Self::Property => "property",
        })
    }
}

/// Errors raised while building or querying a vocabulary
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Selector does not name any known definition
    #[error("unknown {kind}: {selector}")]
    UnknownDefinition {
        /// Kind of definition looked up
        kind: DefinitionKind,
        /// Selector as written
        selector: Selector,
    },

    /// Two definitions share an ID, alias or GUID
    #[error("duplicate {kind} key: {key}")]
    DuplicateDefinition {
        /// Kind of definition
        kind: DefinitionKind,
        /// Conflicting key
        key: String,
    },

    /// Class refers to an object type or property that does not exist
    #[error("class {class} is inconsistent: {message}")]
    InconsistentClass {
        /// Class name
        class: String,
        /// What is wrong
        message: String,
    },

    /// Document could not be parsed
    #[error("malformed vocabulary document: {0}")]
    Malformed(String),

    /// IO error while reading a vocabulary document
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Unknown definition for selector
    #[must_use]
    pub fn unknown(kind: DefinitionKind, selector: &Selector) -> Self {
        Self::UnknownDefinition {
            kind,
            selector: selector.clone(),
        }
    }
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_display() {
        let err = ModelError::unknown(DefinitionKind::Property, &Selector::alias("PD.Missing"));
        assert_eq!(err.to_string(), "unknown property: PD.Missing");
    }
}
