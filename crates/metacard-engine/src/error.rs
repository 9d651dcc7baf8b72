//! Error types for the derivation engine

use metacard_model::{ClassId, ModelError, ObjectTypeId, PropertyId};
use metacard_rules::{RuleLoadError, Slot};
use std::path::PathBuf;

/// Errors raised by engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Settle loop hit the iteration ceiling; the rules form a cycle
    #[error("rules did not settle after {iterations} iterations; still changing: {}", join_slots(.dirty))]
    NonTerminating {
        /// Iterations run
        iterations: usize,
        /// Slots still changing when the loop stopped
        dirty: Vec<Slot>,
    },

    /// Property is not in the vocabulary
    #[error("unknown property: {0}")]
    UnknownProperty(PropertyId),

    /// Property exists but is not on the card
    #[error("{0} is not on the card")]
    PropertyNotOnCard(PropertyId),

    /// Only user-added properties can be removed by the user
    #[error("{0} was not added by the user")]
    NotUserAdded(PropertyId),

    /// Object type is not in the vocabulary
    #[error("unknown object type: {0}")]
    UnknownObjectType(ObjectTypeId),

    /// Class is unknown or belongs to another object type
    #[error("{class} is not a class of {object_type}")]
    InvalidClass {
        /// Requested class
        class: ClassId,
        /// Card's object type
        object_type: ObjectTypeId,
    },

    /// Popped-out card did not come from this session
    #[error("session {popped} was not popped out of {session}")]
    ForeignSession {
        /// Receiving session
        session: String,
        /// Session handed back
        popped: String,
    },

    /// Configuration could not be parsed or is out of range
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// IO error while reading configuration
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Rule document error
    #[error(transparent)]
    Rules(#[from] RuleLoadError),

    /// Vocabulary error
    #[error(transparent)]
    Model(#[from] ModelError),
}

fn join_slots(slots: &[Slot]) -> String {
    slots
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_terminating_lists_slots() {
        let err = EngineError::NonTerminating {
            iterations: 64,
            dirty: vec![Slot::Class, Slot::Property(PropertyId(7))],
        };
        assert_eq!(
            err.to_string(),
            "rules did not settle after 64 iterations; still changing: class, property#7"
        );
    }
}
