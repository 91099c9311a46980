//! Schema elements of the in-memory model
//!
//! These are deserialized straight from the model document. Type names stay
//! textual until something asks for them; the resolved type is then cached on
//! the element.

use crate::model::types::TypeReference;
use crate::reference_resolution::Memo;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_enum_underlying_type() -> String {
    "Edm.Int32".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredKind {
    #[default]
    Entity,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredType {
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    /// Open types accept dynamic properties
    #[serde(default)]
    pub open: bool,
    #[serde(skip)]
    pub namespace: String,
    #[serde(skip)]
    pub kind: StructuredKind,
}

impl StructuredType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn declared_property(&self, name: &str) -> Option<PropertyRef<'_>> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .map(PropertyRef::Structural)
            .or_else(|| {
                self.navigation_properties
                    .iter()
                    .find(|navigation| navigation.name == name)
                    .map(PropertyRef::Navigation)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Vocabulary terms applied to the property, such as `Core.Computed`
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(skip)]
    pub(crate) resolved: Memo<TypeReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperty {
    pub name: String,
    /// Entity type name, `Collection(...)` for multiplicity many
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(skip)]
    pub(crate) resolved: Memo<TypeReference>,
}

/// A structural or navigation property found on a type
#[derive(Debug, Clone, Copy)]
pub enum PropertyRef<'a> {
    Structural(&'a Property),
    Navigation(&'a NavigationProperty),
}

impl<'a> PropertyRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::Structural(property) => &property.name,
            Self::Navigation(navigation) => &navigation.name,
        }
    }

    pub fn type_name(&self) -> &'a str {
        match self {
            Self::Structural(property) => &property.type_name,
            Self::Navigation(navigation) => &navigation.type_name,
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigation(_))
    }

    pub(crate) fn memo(&self) -> &'a Memo<TypeReference> {
        match self {
            Self::Structural(property) => &property.resolved,
            Self::Navigation(navigation) => &navigation.resolved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub name: String,
    pub members: Vec<EnumMember>,
    #[serde(default)]
    pub is_flags: bool,
    #[serde(default = "default_enum_underlying_type")]
    pub underlying_type: String,
    #[serde(skip)]
    pub namespace: String,
}

impl EnumType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Member by name, or by numeric value written as text
    pub fn member(&self, text: &str) -> Option<&EnumMember> {
        self.members.iter().find(|member| member.name == text).or_else(|| {
            let value: i64 = text.parse().ok()?;
            self.members.iter().find(|member| member.value == value)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub enum SchemaType {
    Structured(StructuredType),
    Enum(EnumType),
}

impl SchemaType {
    pub fn qualified_name(&self) -> String {
        match self {
            Self::Structured(structured) => structured.qualified_name(),
            Self::Enum(enumeration) => enumeration.qualified_name(),
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredType> {
        match self {
            Self::Structured(structured) => Some(structured),
            Self::Enum(_) => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            Self::Enum(enumeration) => Some(enumeration),
            Self::Structured(_) => None,
        }
    }

    pub fn type_reference(&self) -> TypeReference {
        match self {
            Self::Structured(structured) => match structured.kind {
                StructuredKind::Entity => TypeReference::Entity(structured.qualified_name()),
                StructuredKind::Complex => TypeReference::Complex(structured.qualified_name()),
            },
            Self::Enum(enumeration) => TypeReference::Enum(enumeration.qualified_name()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "*")]
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    pub role: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub multiplicity: Multiplicity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub name: String,
    pub end1: AssociationEnd,
    pub end2: AssociationEnd,
    #[serde(skip)]
    pub namespace: String,
}

impl Association {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn ends(&self) -> [&AssociationEnd; 2] {
        [&self.end1, &self.end2]
    }
}

/// One side of an association set; the role may be left for defaulting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSetEnd {
    #[serde(default)]
    pub role: Option<String>,
    pub entity_set: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSet {
    pub name: String,
    /// Qualified association name
    pub association: String,
    #[serde(default)]
    pub end1: Option<AssociationSetEnd>,
    #[serde(default)]
    pub end2: Option<AssociationSetEnd>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    Function,
    Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub kind: OperationKind,
    /// The first parameter is the binding parameter
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    #[serde(skip)]
    pub namespace: String,
}

impl Operation {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Parameters supplied inside the call parentheses
    pub fn call_parameters(&self) -> &[Parameter] {
        if self.is_bound {
            self.parameters.get(1..).unwrap_or_default()
        } else {
            &self.parameters
        }
    }
}

/// One namespace of the model document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<StructuredType>,
    #[serde(default)]
    pub complex_types: Vec<StructuredType>,
    #[serde(default)]
    pub enum_types: Vec<EnumType>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
    #[serde(default)]
    pub associations: Vec<Association>,
    #[serde(default)]
    pub association_sets: Vec<AssociationSet>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    pub schemas: Vec<Schema>,
}
