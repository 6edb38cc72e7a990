use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Declared data type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    Bool,
    Categorical,
    CategoricalMref,
    Compound,
    Date,
    DateTime,
    Decimal,
    Email,
    Enum,
    File,
    Html,
    Hyperlink,
    Int,
    Long,
    Mref,
    OneToMany,
    Script,
    String,
    Text,
    Xref,
}

impl AttributeType {
    pub const ALL: [AttributeType; 20] = [
        AttributeType::Bool,
        AttributeType::Categorical,
        AttributeType::CategoricalMref,
        AttributeType::Compound,
        AttributeType::Date,
        AttributeType::DateTime,
        AttributeType::Decimal,
        AttributeType::Email,
        AttributeType::Enum,
        AttributeType::File,
        AttributeType::Html,
        AttributeType::Hyperlink,
        AttributeType::Int,
        AttributeType::Long,
        AttributeType::Mref,
        AttributeType::OneToMany,
        AttributeType::Script,
        AttributeType::String,
        AttributeType::Text,
        AttributeType::Xref,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Bool => "BOOL",
            AttributeType::Categorical => "CATEGORICAL",
            AttributeType::CategoricalMref => "CATEGORICAL_MREF",
            AttributeType::Compound => "COMPOUND",
            AttributeType::Date => "DATE",
            AttributeType::DateTime => "DATE_TIME",
            AttributeType::Decimal => "DECIMAL",
            AttributeType::Email => "EMAIL",
            AttributeType::Enum => "ENUM",
            AttributeType::File => "FILE",
            AttributeType::Html => "HTML",
            AttributeType::Hyperlink => "HYPERLINK",
            AttributeType::Int => "INT",
            AttributeType::Long => "LONG",
            AttributeType::Mref => "MREF",
            AttributeType::OneToMany => "ONE_TO_MANY",
            AttributeType::Script => "SCRIPT",
            AttributeType::String => "STRING",
            AttributeType::Text => "TEXT",
            AttributeType::Xref => "XREF",
        }
    }

    /// True for types whose values point at rows of another entity type.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            AttributeType::Categorical
                | AttributeType::CategoricalMref
                | AttributeType::File
                | AttributeType::Mref
                | AttributeType::OneToMany
                | AttributeType::Xref
        )
    }

    pub fn is_multiple_reference(&self) -> bool {
        matches!(
            self,
            AttributeType::CategoricalMref | AttributeType::Mref | AttributeType::OneToMany
        )
    }

    pub fn is_atomic(&self) -> bool {
        !matches!(self, AttributeType::Compound)
    }

    /// Types whose values are stored as free text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            AttributeType::Email
                | AttributeType::Enum
                | AttributeType::Html
                | AttributeType::Hyperlink
                | AttributeType::Script
                | AttributeType::String
                | AttributeType::Text
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = ModelError;

    /// Case-insensitive; accepts `date_time`, `DATE-TIME` and `datetime` alike.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        AttributeType::ALL
            .into_iter()
            .find(|ty| ty.as_str().replace('_', "") == normalized)
            .ok_or_else(|| ModelError::UnknownAttributeType(s.to_string()))
    }
}

fn default_nillable() -> bool {
    true
}

/// A named, typed field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data_type: AttributeType,
    /// Identifier of the referenced entity type, for reference types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_entity: Option<String>,
    #[serde(default = "default_nillable")]
    pub nillable: bool,
    /// Textual default, parsed against `data_type` when a row is constructed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            label: None,
            data_type,
            ref_entity: None,
            nillable: true,
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_ref_entity(mut self, ref_entity: impl Into<String>) -> Self {
        self.ref_entity = Some(ref_entity.into());
        self
    }

    #[must_use]
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    #[must_use]
    pub fn with_default_value(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Referenced entity type id, only when the attribute is a reference type.
    pub fn reference(&self) -> Option<&str> {
        if self.data_type.is_reference() {
            self.ref_entity.as_deref()
        } else {
            None
        }
    }
}

/// Schema of a data collection (an entity type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    /// Attribute holding the row identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_attribute: Option<String>,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

impl EntityType {
    /// Creates an entity type whose label equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            package: None,
            backend: None,
            is_abstract: false,
            id_attribute: None,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    #[must_use]
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    #[must_use]
    pub fn with_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = Some(name.into());
        self
    }

    /// Appends an attribute, replacing any attribute with the same name in place.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Non-compound attributes in declaration order.
    pub fn atomic_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.data_type.is_atomic())
    }

    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<()> {
        if self.has_attribute(&attribute.name) {
            return Err(ModelError::DuplicateAttribute {
                entity_type: self.id.clone(),
                attribute: attribute.name,
            });
        }
        self.attributes.push(attribute);
        Ok(())
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index))
    }

    /// Attributes that reference this entity type itself.
    pub fn direct_self_references(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.reference() == Some(self.id.as_str()))
    }

    pub fn has_direct_self_reference(&self) -> bool {
        self.direct_self_references().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_type_parses_case_insensitively() {
        assert_eq!("int".parse::<AttributeType>(), Ok(AttributeType::Int));
        assert_eq!(
            "categorical_mref".parse::<AttributeType>(),
            Ok(AttributeType::CategoricalMref)
        );
        assert_eq!("DateTime".parse::<AttributeType>(), Ok(AttributeType::DateTime));
        assert_eq!("one-to-many".parse::<AttributeType>(), Ok(AttributeType::OneToMany));
        assert!("integer".parse::<AttributeType>().is_err());
    }

    #[test]
    fn attribute_type_renders_upper_snake() {
        assert_eq!(AttributeType::OneToMany.to_string(), "ONE_TO_MANY");
        assert_eq!(AttributeType::Xref.to_string(), "XREF");
        for ty in AttributeType::ALL {
            assert_eq!(ty.to_string().parse::<AttributeType>(), Ok(ty));
        }
    }

    #[test]
    fn reference_predicates() {
        assert!(AttributeType::Xref.is_reference());
        assert!(!AttributeType::Xref.is_multiple_reference());
        assert!(AttributeType::Mref.is_multiple_reference());
        assert!(AttributeType::File.is_reference());
        assert!(!AttributeType::String.is_reference());
        assert!(!AttributeType::Compound.is_atomic());
    }

    #[test]
    fn reference_ignored_for_non_reference_types() {
        let attr = Attribute::new("name", AttributeType::String).with_ref_entity("Other");
        assert_eq!(attr.reference(), None);
    }

    #[test]
    fn add_attribute_rejects_duplicates() {
        let mut ty = EntityType::new("Gene").with_attribute(Attribute::new("id", AttributeType::String));
        let err = ty
            .add_attribute(Attribute::new("id", AttributeType::Int))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAttribute { .. }));
        assert_eq!(ty.attributes().len(), 1);
    }

    #[test]
    fn atomic_attributes_skip_compounds() {
        let ty = EntityType::new("T")
            .with_attribute(Attribute::new("a", AttributeType::String))
            .with_attribute(Attribute::new("group", AttributeType::Compound))
            .with_attribute(Attribute::new("b", AttributeType::Int));
        let names: Vec<&str> = ty.atomic_attributes().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn detects_direct_self_reference() {
        let ty = EntityType::new("Person")
            .with_attribute(Attribute::new("id", AttributeType::String))
            .with_attribute(Attribute::new("parent", AttributeType::Xref).with_ref_entity("Person"));
        assert!(ty.has_direct_self_reference());
        let other = EntityType::new("Child")
            .with_attribute(Attribute::new("parent", AttributeType::Xref).with_ref_entity("Person"));
        assert!(!other.has_direct_self_reference());
    }
}
