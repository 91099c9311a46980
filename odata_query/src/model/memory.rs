//! In-memory model built from a JSON model document

use crate::model::elements::*;
use crate::model::{EdmModel, ModelError};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct InMemoryModel {
    types: HashMap<String, SchemaType>,
    entity_sets: BTreeMap<String, EntitySet>,
    associations: HashMap<String, Association>,
    association_sets: Vec<AssociationSet>,
    operations: BTreeMap<String, Vec<Operation>>,
}

impl InMemoryModel {
    pub fn from_document(document: ModelDocument) -> Result<Self, ModelError> {
        let mut model = Self::default();

        for schema in document.schemas {
            if schema.namespace.trim().is_empty() {
                return Err(ModelError::EmptyNamespace);
            }
            let namespace = schema.namespace;

            let structured = schema
                .entity_types
                .into_iter()
                .map(|t| (t, StructuredKind::Entity))
                .chain(schema.complex_types.into_iter().map(|t| (t, StructuredKind::Complex)));
            for (mut structured_type, kind) in structured {
                structured_type.namespace = namespace.clone();
                structured_type.kind = kind;
                model.insert_type(SchemaType::Structured(structured_type))?;
            }

            for mut enum_type in schema.enum_types {
                enum_type.namespace = namespace.clone();
                model.insert_type(SchemaType::Enum(enum_type))?;
            }

            for entity_set in schema.entity_sets {
                if model.entity_sets.contains_key(&entity_set.name) {
                    return Err(ModelError::DuplicateElement {
                        name: entity_set.name,
                    });
                }
                model.entity_sets.insert(entity_set.name.clone(), entity_set);
            }

            for mut association in schema.associations {
                association.namespace = namespace.clone();
                let name = association.qualified_name();
                if model.associations.contains_key(&name) {
                    return Err(ModelError::DuplicateElement { name });
                }
                model.associations.insert(name, association);
            }

            model.association_sets.extend(schema.association_sets);

            for mut operation in schema.operations {
                operation.namespace = namespace.clone();
                model
                    .operations
                    .entry(operation.qualified_name())
                    .or_default()
                    .push(operation);
            }
        }

        Ok(model)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let document: ModelDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    fn insert_type(&mut self, schema_type: SchemaType) -> Result<(), ModelError> {
        let name = schema_type.qualified_name();
        if self.types.contains_key(&name) {
            return Err(ModelError::DuplicateElement { name });
        }
        self.types.insert(name, schema_type);
        Ok(())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn entity_set_count(&self) -> usize {
        self.entity_sets.len()
    }
}

impl EdmModel for InMemoryModel {
    fn find_type(&self, qualified_name: &str) -> Option<&SchemaType> {
        self.types.get(qualified_name)
    }

    fn find_operations(&self, name: &str) -> Vec<&Operation> {
        self.operations
            .get(name)
            .map(|overloads| overloads.iter().collect())
            .unwrap_or_default()
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    fn find_association(&self, qualified_name: &str) -> Option<&Association> {
        self.associations.get(qualified_name)
    }

    fn association_sets(&self) -> &[AssociationSet] {
        &self.association_sets
    }

    fn entity_sets(&self) -> Vec<&EntitySet> {
        self.entity_sets.values().collect()
    }

    fn schema_types(&self) -> Vec<&SchemaType> {
        let mut types: Vec<&SchemaType> = self.types.values().collect();
        types.sort_by_key(|schema_type| schema_type.qualified_name());
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_duplicate_types_are_rejected() {
        let json = r#"{"schemas":[{"namespace":"A","complexTypes":[{"name":"X"},{"name":"X"}]}]}"#;
        assert_matches!(
            InMemoryModel::from_json_str(json),
            Err(ModelError::DuplicateElement { ref name }) if name == "A.X"
        );
    }

    #[test]
    fn test_same_name_in_two_namespaces() {
        let json = r#"{"schemas":[
            {"namespace":"A","complexTypes":[{"name":"X"}]},
            {"namespace":"B","complexTypes":[{"name":"X"}]}
        ]}"#;
        let model = InMemoryModel::from_json_str(json).unwrap();
        assert_eq!(model.type_count(), 2);
        assert!(model.find_type("B.X").is_some());
    }

    #[test]
    fn test_invalid_json() {
        assert_matches!(InMemoryModel::from_json_str("{"), Err(ModelError::Json(_)));
        assert_matches!(
            InMemoryModel::from_json_str(r#"{"schemas":[{"namespace":" "}]}"#),
            Err(ModelError::EmptyNamespace)
        );
    }
}
