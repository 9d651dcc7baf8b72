//! Vault vocabulary
//!
//! The repository collaborator owns the authoritative catalogue of object
//! types, classes and property definitions. A [`Vocabulary`] is the
//! in-memory, read-only copy of that catalogue the engine works against:
//! it maps every alias and GUID to a typed identifier once, answers which
//! properties a class defines, and which values a lookup property accepts.

use crate::error::{DefinitionKind, ModelError, ModelResult};
use crate::ids::{ClassId, ObjectTypeId, PropertyId, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Property data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Single-line text
    #[default]
    Text,
    /// Multi-line text
    MultiLineText,
    /// Integer number
    Integer,
    /// Date
    Date,
    /// Yes/no
    Boolean,
    /// Single-select lookup
    Lookup,
    /// Multi-select lookup
    MultiLookup,
}

impl DataType {
    /// True for data types that hold an ordered collection of items
    #[inline]
    #[must_use]
    pub fn is_multi_value(self) -> bool {
        matches!(self, Self::MultiLookup)
    }

    /// True for lookup data types
    #[inline]
    #[must_use]
    pub fn is_lookup(self) -> bool {
        matches!(self, Self::Lookup | Self::MultiLookup)
    }
}

/// Object type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTypeDef {
    /// Numeric identifier
    pub id: ObjectTypeId,
    /// Optional alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Optional GUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
    /// Display name
    pub name: String,
}

impl ObjectTypeDef {
    /// Create object type definition
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: ObjectTypeId(id),
            alias: None,
            guid: None,
            name: name.into(),
        }
    }

    /// With alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// With GUID
    #[must_use]
    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }
}

/// Property definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Numeric identifier
    pub id: PropertyId,
    /// Optional alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Optional GUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
    /// Display name, used as the default label
    pub name: String,
    /// Data type
    #[serde(default)]
    pub data_type: DataType,
    /// Valid values for lookup properties (`None` = unrestricted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl PropertyDef {
    /// Create property definition
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: PropertyId(id),
            alias: None,
            guid: None,
            name: name.into(),
            data_type,
            values: None,
        }
    }

    /// With alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// With GUID
    #[must_use]
    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// With the set of valid lookup values
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// True when this property holds multiple items
    #[inline]
    #[must_use]
    pub fn is_multi_value(&self) -> bool {
        self.data_type.is_multi_value()
    }
}

/// Class definition as written in a vocabulary document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDocument {
    /// Numeric identifier
    pub id: ClassId,
    /// Optional alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Optional GUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
    /// Display name
    pub name: String,
    /// Owning object type
    pub object_type: Selector,
    /// Properties defined by the class, in card order
    #[serde(default)]
    pub properties: Vec<Selector>,
}

impl ClassDocument {
    /// Create class document entry
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, object_type: impl Into<Selector>) -> Self {
        Self {
            id: ClassId(id),
            alias: None,
            guid: None,
            name: name.into(),
            object_type: object_type.into(),
            properties: Vec::new(),
        }
    }

    /// With alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// With GUID
    #[must_use]
    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// With class properties
    #[must_use]
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolved class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Numeric identifier
    pub id: ClassId,
    /// Optional alias
    pub alias: Option<String>,
    /// Optional GUID
    pub guid: Option<Uuid>,
    /// Display name
    pub name: String,
    /// Owning object type
    pub object_type: ObjectTypeId,
    /// Properties defined by the class, in card order
    pub properties: Vec<PropertyId>,
}

/// Serialized vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VocabularyDocument {
    /// Object types
    #[serde(default)]
    pub object_types: Vec<ObjectTypeDef>,
    /// Property definitions
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Classes
    #[serde(default)]
    pub classes: Vec<ClassDocument>,
}

/// Alias and GUID lookup for one definition kind
#[derive(Debug, Clone, Default)]
struct KeyIndex {
    ids: HashMap<u32, usize>,
    aliases: HashMap<String, u32>,
    guids: HashMap<Uuid, u32>,
}

impl KeyIndex {
    fn insert(
        &mut self,
        kind: DefinitionKind,
        id: u32,
        alias: Option<&str>,
        guid: Option<Uuid>,
        position: usize,
    ) -> ModelResult<()> {
        let duplicate = |key: String| ModelError::DuplicateDefinition { kind, key };

        if self.ids.insert(id, position).is_some() {
            return Err(duplicate(id.to_string()));
        }
        if let Some(alias) = alias {
            if self.aliases.insert(alias.to_string(), id).is_some() {
                return Err(duplicate(alias.to_string()));
            }
        }
        if let Some(guid) = guid {
            if self.guids.insert(guid, id).is_some() {
                return Err(duplicate(guid.to_string()));
            }
        }
        Ok(())
    }

    fn resolve(&self, kind: DefinitionKind, selector: &Selector) -> ModelResult<u32> {
        let found = match selector {
            Selector::Id(id) => self.ids.contains_key(id).then_some(*id),
            Selector::Alias(alias) => self.aliases.get(alias).copied(),
            Selector::Guid(guid) => self.guids.get(guid).copied(),
        };
        found.ok_or_else(|| ModelError::unknown(kind, selector))
    }
}

/// Read-only catalogue of vault definitions
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    object_types: IndexMap<ObjectTypeId, ObjectTypeDef>,
    classes: IndexMap<ClassId, ClassDef>,
    properties: IndexMap<PropertyId, PropertyDef>,
    object_type_keys: KeyIndex,
    class_keys: KeyIndex,
    property_keys: KeyIndex,
    property_names: HashMap<String, PropertyId>,
}

impl Vocabulary {
    /// Start building a vocabulary
    #[inline]
    #[must_use]
    pub fn builder() -> VocabularyBuilder {
        VocabularyBuilder::default()
    }

    /// Build from a parsed document
    ///
    /// # Errors
    /// Duplicate keys, or classes referring to unknown object types or
    /// properties.
    pub fn from_document(document: VocabularyDocument) -> ModelResult<Self> {
        let mut vocabulary = Self::default();

        for def in document.object_types {
            vocabulary.object_type_keys.insert(
                DefinitionKind::ObjectType,
                def.id.0,
                def.alias.as_deref(),
                def.guid,
                vocabulary.object_types.len(),
            )?;
            vocabulary.object_types.insert(def.id, def);
        }

        for def in document.properties {
            vocabulary.property_keys.insert(
                DefinitionKind::Property,
                def.id.0,
                def.alias.as_deref(),
                def.guid,
                vocabulary.properties.len(),
            )?;
            vocabulary.property_names.entry(def.name.clone()).or_insert(def.id);
            vocabulary.properties.insert(def.id, def);
        }

        for doc in document.classes {
            let inconsistent = |message: String| ModelError::InconsistentClass {
                class: doc.name.clone(),
                message,
            };
            let object_type = vocabulary
                .resolve_object_type(&doc.object_type)
                .map_err(|e| inconsistent(e.to_string()))?;
            let properties = doc
                .properties
                .iter()
                .map(|selector| vocabulary.resolve_property(selector))
                .collect::<ModelResult<Vec<_>>>()
                .map_err(|e| inconsistent(e.to_string()))?;

            vocabulary.class_keys.insert(
                DefinitionKind::Class,
                doc.id.0,
                doc.alias.as_deref(),
                doc.guid,
                vocabulary.classes.len(),
            )?;
            vocabulary.classes.insert(
                doc.id,
                ClassDef {
                    id: doc.id,
                    alias: doc.alias,
                    guid: doc.guid,
                    name: doc.name,
                    object_type,
                    properties,
                },
            );
        }

        Ok(vocabulary)
    }

    /// Parse a YAML vocabulary document
    ///
    /// # Errors
    /// Malformed YAML or an inconsistent vocabulary.
    pub fn from_yaml_str(content: &str) -> ModelResult<Self> {
        let document: VocabularyDocument =
            serde_yaml::from_str(content).map_err(|e| ModelError::Malformed(e.to_string()))?;
        Self::from_document(document)
    }

    /// Parse a JSON vocabulary document
    ///
    /// # Errors
    /// Malformed JSON or an inconsistent vocabulary.
    pub fn from_json_str(content: &str) -> ModelResult<Self> {
        let document: VocabularyDocument =
            serde_json::from_str(content).map_err(|e| ModelError::Malformed(e.to_string()))?;
        Self::from_document(document)
    }

    /// Load a vocabulary file; `.json` is read as JSON, anything else as YAML
    ///
    /// # Errors
    /// IO failure or an invalid document.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Resolve a property selector
    ///
    /// # Errors
    /// [`ModelError::UnknownDefinition`] if nothing matches.
    pub fn resolve_property(&self, selector: &Selector) -> ModelResult<PropertyId> {
        self.property_keys
            .resolve(DefinitionKind::Property, selector)
            .map(PropertyId)
    }

    /// Resolve a class selector
    ///
    /// # Errors
    /// [`ModelError::UnknownDefinition`] if nothing matches.
    pub fn resolve_class(&self, selector: &Selector) -> ModelResult<ClassId> {
        self.class_keys
            .resolve(DefinitionKind::Class, selector)
            .map(ClassId)
    }

    /// Resolve an object type selector
    ///
    /// # Errors
    /// [`ModelError::UnknownDefinition`] if nothing matches.
    pub fn resolve_object_type(&self, selector: &Selector) -> ModelResult<ObjectTypeId> {
        self.object_type_keys
            .resolve(DefinitionKind::ObjectType, selector)
            .map(ObjectTypeId)
    }

    /// Property definition by ID
    #[inline]
    #[must_use]
    pub fn property(&self, id: PropertyId) -> Option<&PropertyDef> {
        self.properties.get(&id)
    }

    /// Class definition by ID
    #[inline]
    #[must_use]
    pub fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(&id)
    }

    /// Object type definition by ID
    #[inline]
    #[must_use]
    pub fn object_type(&self, id: ObjectTypeId) -> Option<&ObjectTypeDef> {
        self.object_types.get(&id)
    }

    /// Properties a class defines, in card order
    #[must_use]
    pub fn class_properties(&self, id: ClassId) -> &[PropertyId] {
        self.classes
            .get(&id)
            .map_or(&[], |class| class.properties.as_slice())
    }

    /// Default label of a property
    #[must_use]
    pub fn default_label(&self, id: PropertyId) -> &str {
        self.properties.get(&id).map_or("", |def| def.name.as_str())
    }

    /// True when the property holds multiple items
    #[must_use]
    pub fn is_multi_value(&self, id: PropertyId) -> bool {
        self.properties.get(&id).is_some_and(PropertyDef::is_multi_value)
    }

    /// Check a lookup value against the property's valid set
    ///
    /// Properties without a declared value set accept anything.
    #[must_use]
    pub fn is_valid_value(&self, id: PropertyId, value: &str) -> bool {
        match self.properties.get(&id).and_then(|def| def.values.as_ref()) {
            Some(values) => values.iter().any(|v| v == value),
            None => true,
        }
    }

    /// Look a property up by display name
    ///
    /// Only for the UI boundary; rules always address properties by ID,
    /// alias or GUID.
    #[must_use]
    pub fn property_by_name(&self, name: &str) -> Option<PropertyId> {
        self.property_names.get(name).copied()
    }

    /// All property definitions
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.values()
    }

    /// All class definitions
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }
}

/// Builder for [`Vocabulary`]
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
    document: VocabularyDocument,
}

impl VocabularyBuilder {
    /// Add object type
    #[must_use]
    pub fn object_type(mut self, def: ObjectTypeDef) -> Self {
        self.document.object_types.push(def);
        self
    }

    /// Add property
    #[must_use]
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.document.properties.push(def);
        self
    }

    /// Add class
    #[must_use]
    pub fn class(mut self, doc: ClassDocument) -> Self {
        self.document.classes.push(doc);
        self
    }

    /// Finish
    ///
    /// # Errors
    /// Same as [`Vocabulary::from_document`].
    pub fn build(self) -> ModelResult<Vocabulary> {
        Vocabulary::from_document(self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const GUID: &str = "0e1e5d4c-7a0b-4b61-9c1e-3b3e9e4c1d2a";

    fn sample() -> Vocabulary {
        Vocabulary::builder()
            .object_type(ObjectTypeDef::new(0, "Document").with_alias("OT.Document"))
            .property(
                PropertyDef::new(1001, "Country", DataType::Lookup)
                    .with_alias("PD.Country")
                    .with_guid(Uuid::parse_str(GUID).unwrap())
                    .with_values(["USA", "Canada"]),
            )
            .property(PropertyDef::new(1002, "City", DataType::Text).with_alias("PD.City"))
            .class(
                ClassDocument::new(1, "Customer", "OT.Document")
                    .with_alias("CL.Customer")
                    .with_properties(["PD.Country", "1002"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn selectors_resolve_to_same_definition() {
        let vocab = sample();
        let by_id = vocab.resolve_property(&Selector::Id(1001)).unwrap();
        let by_alias = vocab.resolve_property(&Selector::alias("PD.Country")).unwrap();
        let by_guid = vocab
            .resolve_property(&Selector::Guid(Uuid::parse_str(GUID).unwrap()))
            .unwrap();
        assert_eq!(by_id, by_alias);
        assert_eq!(by_alias, by_guid);
    }

    #[test]
    fn unknown_selector_fails() {
        let vocab = sample();
        assert!(matches!(
            vocab.resolve_class(&Selector::alias("CL.Nope")),
            Err(ModelError::UnknownDefinition { kind: DefinitionKind::Class, .. })
        ));
    }

    #[test]
    fn class_properties_in_order() {
        let vocab = sample();
        assert_eq!(
            vocab.class_properties(ClassId(1)),
            &[PropertyId(1001), PropertyId(1002)]
        );
        assert!(vocab.class_properties(ClassId(99)).is_empty());
    }

    #[test]
    fn duplicate_alias_rejected() {
        let result = Vocabulary::builder()
            .property(PropertyDef::new(1, "A", DataType::Text).with_alias("PD.X"))
            .property(PropertyDef::new(2, "B", DataType::Text).with_alias("PD.X"))
            .build();
        assert!(matches!(result, Err(ModelError::DuplicateDefinition { .. })));
    }

    #[test]
    fn class_with_unknown_property_rejected() {
        let result = Vocabulary::builder()
            .object_type(ObjectTypeDef::new(0, "Document"))
            .class(ClassDocument::new(1, "C", 0u32).with_properties(["PD.Missing"]))
            .build();
        assert!(matches!(result, Err(ModelError::InconsistentClass { .. })));
    }

    #[test]
    fn lookup_value_validity() {
        let vocab = sample();
        assert!(vocab.is_valid_value(PropertyId(1001), "USA"));
        assert!(!vocab.is_valid_value(PropertyId(1001), "Mexico"));
        assert!(vocab.is_valid_value(PropertyId(1002), "anything"));
    }

    #[test]
    fn yaml_document_loads_from_file() {
        let yaml = r#"
object_types:
  - { id: 0, name: Document }
properties:
  - { id: 10, alias: PD.Title, name: Title }
  - { id: 11, alias: PD.Tags, name: Tags, data_type: multi_lookup }
classes:
  - id: 2
    name: Memo
    object_type: 0
    properties: [PD.Title, PD.Tags]
"#;
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let vocab = Vocabulary::load(file.path()).unwrap();
        assert!(vocab.is_multi_value(PropertyId(11)));
        assert_eq!(vocab.default_label(PropertyId(10)), "Title");
        assert_eq!(vocab.property_by_name("Tags"), Some(PropertyId(11)));
        assert_eq!(vocab.class(ClassId(2)).unwrap().object_type, ObjectTypeId(0));
    }
}
