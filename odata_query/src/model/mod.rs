//! Entity data model collaborator
//!
//! The binder only needs lookups, so the model is a read-only trait. The
//! model is shared by concurrent parses and never mutated by them; the only
//! interior state is the compute-once cache of resolved property types.

pub mod elements;
#[cfg(test)]
pub mod fixtures;
pub mod memory;
pub mod types;
pub mod vocabulary;

pub use elements::{
    Association, AssociationEnd, AssociationSet, AssociationSetEnd, EntitySet, EnumType,
    Multiplicity, Operation, PropertyRef, SchemaType, StructuredKind, StructuredType,
};
pub use memory::InMemoryModel;
pub use types::{EdmPrimitiveKind, TypeReference};
pub use vocabulary::core_vocabulary;

use crate::logging::{codes, Code};
use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
use crate::validation::Location;
use crate::{log_error, log_success};
use std::path::Path;

/// Upper bound on base-type chains, so a cyclic model cannot loop forever
const MAX_BASE_TYPE_CHAIN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Cannot read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate schema element '{name}'")]
    DuplicateElement { name: String },

    #[error("Schema with an empty namespace")]
    EmptyNamespace,
}

impl ModelError {
    pub fn error_code(&self) -> Code {
        codes::system::MODEL_LOAD_FAILURE
    }
}

pub trait EdmModel: Send + Sync {
    fn find_type(&self, qualified_name: &str) -> Option<&SchemaType>;

    /// Overload candidates of a model-declared operation
    fn find_operations(&self, name: &str) -> Vec<&Operation>;

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet>;

    fn find_association(&self, qualified_name: &str) -> Option<&Association>;

    fn association_sets(&self) -> &[AssociationSet];

    fn entity_sets(&self) -> Vec<&EntitySet>;

    fn schema_types(&self) -> Vec<&SchemaType>;

    fn find_structured_type(&self, qualified_name: &str) -> Option<&StructuredType> {
        self.find_type(qualified_name).and_then(SchemaType::as_structured)
    }

    /// Structural or navigation property declared on the type or a base type
    fn find_property(&self, declaring_type: &str, name: &str) -> Option<PropertyRef<'_>> {
        let mut current = self.find_structured_type(declaring_type);
        for _ in 0..MAX_BASE_TYPE_CHAIN {
            let structured = current?;
            if let Some(property) = structured.declared_property(name) {
                return Some(property);
            }
            current = structured
                .base_type
                .as_deref()
                .and_then(|base| self.find_structured_type(base));
        }
        None
    }

    /// The operation whose parameters accept `argument_types`; exact matches win
    fn find_operation(&self, name: &str, argument_types: &[TypeReference]) -> Option<&Operation> {
        let candidates = self.find_operations(name);
        let accepts = |operation: &&Operation, exact: bool| {
            let parameters = operation.call_parameters();
            parameters.len() == argument_types.len()
                && parameters.iter().zip(argument_types).all(|(parameter, argument)| {
                    let expected = resolve_type_name(self, &parameter.type_name, UnresolvedKind::Type, Location::Unknown);
                    if exact {
                        &expected == argument
                    } else {
                        is_assignable(self, argument, &expected)
                    }
                })
        };
        candidates
            .iter()
            .find(|operation| accepts(*operation, true))
            .or_else(|| candidates.iter().find(|operation| accepts(*operation, false)))
            .copied()
    }
}

/// Resolve a textual type name, producing a placeholder of `expected` kind on failure
pub fn resolve_type_name<M: EdmModel + ?Sized>(
    model: &M,
    type_name: &str,
    expected: UnresolvedKind,
    location: Location,
) -> TypeReference {
    if let Some(element) = types::collection_element_name(type_name) {
        return TypeReference::collection_of(resolve_type_name(model, element, expected, location));
    }
    let type_name = type_name.trim();
    if let Some(kind) = core_vocabulary().primitive(type_name) {
        return TypeReference::Primitive(kind);
    }
    match model.find_type(type_name) {
        Some(schema_type) => schema_type.type_reference(),
        None => TypeReference::Unresolved(UnresolvedRef::new(expected, type_name, location)),
    }
}

/// Declared type of a property, resolved on first request and cached on the property
pub fn property_type<M: EdmModel + ?Sized>(
    model: &M,
    declaring_type: &str,
    property: PropertyRef<'_>,
) -> TypeReference {
    property
        .memo()
        .get_or_init(|| {
            let expected = if property.is_navigation() {
                UnresolvedKind::EntityType
            } else {
                UnresolvedKind::Type
            };
            resolve_type_name(
                model,
                property.type_name(),
                expected,
                Location::model(format!("{}/{}", declaring_type, property.name())),
            )
        })
        .clone()
}

/// Whether `derived` is `base` or inherits from it
pub fn is_derived_from<M: EdmModel + ?Sized>(model: &M, derived: &str, base: &str) -> bool {
    let mut current = Some(derived.to_string());
    for _ in 0..MAX_BASE_TYPE_CHAIN {
        match current {
            Some(name) if name == base => return true,
            Some(name) => {
                current = model
                    .find_structured_type(&name)
                    .and_then(|structured| structured.base_type.clone());
            }
            None => return false,
        }
    }
    false
}

/// Whether a value of type `from` can be passed where `to` is expected
///
/// Placeholders are accepted so one failed lookup does not cascade into
/// type errors.
pub fn is_assignable<M: EdmModel + ?Sized>(model: &M, from: &TypeReference, to: &TypeReference) -> bool {
    match (from, to) {
        (TypeReference::Unresolved(_), _)
        | (_, TypeReference::Unresolved(_))
        | (TypeReference::Untyped, _)
        | (_, TypeReference::Untyped) => true,
        (TypeReference::Primitive(from), TypeReference::Primitive(to)) => from.promotes_to(*to),
        (TypeReference::Entity(from), TypeReference::Entity(to))
        | (TypeReference::Complex(from), TypeReference::Complex(to)) => is_derived_from(model, from, to),
        (TypeReference::Collection(from), TypeReference::Collection(to)) => is_assignable(model, from, to),
        _ => from == to,
    }
}

pub fn load_model_from_str(json: &str) -> Result<InMemoryModel, ModelError> {
    let result = InMemoryModel::from_json_str(json);
    match &result {
        Ok(model) => {
            log_success!(codes::success::MODEL_LOADED, "Model loaded",
                "types" => model.type_count(),
                "entity_sets" => model.entity_set_count()
            );
        }
        Err(error) => {
            log_error!(error.error_code(), &error.to_string());
        }
    }
    result
}

pub fn load_model_from_path(path: impl AsRef<Path>) -> Result<InMemoryModel, ModelError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_model_from_str(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{sales_model, SALES_MODEL_JSON};
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_find_property_walks_base_types() {
        let model = sales_model();
        let property = model.find_property("Sales.VipCustomer", "Name").unwrap();
        assert_eq!(property.name(), "Name");
        assert!(model.find_property("Sales.VipCustomer", "Level").is_some());
        assert!(model.find_property("Sales.Customer", "Level").is_none());
    }

    #[test]
    fn test_property_types_resolve_once() {
        let model = sales_model();
        let orders = model.find_property("Sales.Customer", "Orders").unwrap();
        let first = property_type(&model, "Sales.Customer", orders);
        assert_eq!(first.to_string(), "Collection(Sales.Order)");
        assert!(orders.memo().is_computed());
        assert_eq!(property_type(&model, "Sales.Customer", orders), first);
    }

    #[test]
    fn test_unknown_type_name_becomes_placeholder() {
        let model = sales_model();
        let reference = resolve_type_name(
            &model,
            "Sales.Nowhere",
            UnresolvedKind::EntityType,
            Location::Unknown,
        );
        assert!(reference.is_unresolved());
        assert_eq!(reference.errors().len(), 1);
    }

    #[test]
    fn test_assignability() {
        let model = sales_model();
        let int32 = TypeReference::Primitive(EdmPrimitiveKind::Int32);
        let double = TypeReference::Primitive(EdmPrimitiveKind::Double);
        assert!(is_assignable(&model, &int32, &double));
        assert!(!is_assignable(&model, &double, &int32));
        assert!(is_assignable(
            &model,
            &TypeReference::Entity("Sales.VipCustomer".into()),
            &TypeReference::Entity("Sales.Customer".into())
        ));
    }

    #[test]
    fn test_find_operation_by_signature() {
        let model = sales_model();
        let found = model.find_operation(
            "Sales.DiscountedPrice",
            &[TypeReference::Primitive(EdmPrimitiveKind::Int32)],
        );
        assert!(found.is_some());
        assert!(model
            .find_operation("Sales.DiscountedPrice", &[TypeReference::Primitive(EdmPrimitiveKind::String)])
            .is_none());
    }

    #[test]
    fn test_load_model_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SALES_MODEL_JSON.as_bytes()).unwrap();
        let model = load_model_from_path(file.path()).unwrap();
        assert!(model.find_entity_set("Customers").is_some());

        assert_matches!(
            load_model_from_path("/definitely/not/here.json"),
            Err(ModelError::Io { .. })
        );
    }
}
