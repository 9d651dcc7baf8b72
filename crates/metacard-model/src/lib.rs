//! Metacard Model
//!
//! Typed building blocks shared by the rule store and the derivation engine.
//!
//! # Overview
//!
//! - **Identifiers**: [`PropertyId`], [`ClassId`], [`ObjectTypeId`]
//! - **Selectors**: [`Selector`] - ID, alias or GUID as written in configuration
//! - **Values**: [`PropertyValue`] - empty, scalar, or ordered multi-value
//! - **Vocabulary**: [`Vocabulary`] - the vault catalogue, resolved once per session
//!
//! # Example
//!
//! ```rust
//! use metacard_model::{DataType, PropertyDef, Selector, Vocabulary};
//!
//! let vocabulary = Vocabulary::builder()
//!     .property(PropertyDef::new(1001, "Country", DataType::Lookup).with_alias("PD.Country"))
//!     .build()
//!     .unwrap();
//!
//! let id = vocabulary.resolve_property(&Selector::alias("PD.Country")).unwrap();
//! assert_eq!(vocabulary.default_label(id), "Country");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod ids;
pub mod value;
pub mod vocabulary;

// Re-exports
pub use error::{DefinitionKind, ModelError, ModelResult};
pub use ids::{ClassId, ObjectTypeId, PropertyId, Selector};
pub use value::PropertyValue;
pub use vocabulary::{
    ClassDef, ClassDocument, DataType, ObjectTypeDef, PropertyDef, Vocabulary, VocabularyBuilder,
    VocabularyDocument,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for model types
    pub use crate::{
        ClassId, DataType, ObjectTypeId, PropertyDef, PropertyId, PropertyValue, Selector,
        Vocabulary,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
