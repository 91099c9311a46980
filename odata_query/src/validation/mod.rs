//! Diagnostics and structural model validation
//!
//! Validation walks the whole model and reports every problem it finds.
//! Nothing here aborts; problems are collected as [`Diagnostic`]s.

pub mod diagnostic;
pub mod error;

pub use diagnostic::{collect, Diagnostic, Location};
pub use error::StructuralError;

use crate::logging::codes;
use crate::model::{self, core_vocabulary, EdmModel, PropertyRef, SchemaType, StructuredType};
use crate::reference_resolution::{SemanticAssociationSet, UnresolvedKind};
use crate::{log_debug, log_success, log_warning};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelValidationReport {
    pub diagnostics: Vec<Arc<Diagnostic>>,
    pub types_checked: usize,
    pub entity_sets_checked: usize,
    pub association_sets_checked: usize,
    pub duration_ms: f64,
}

impl ModelValidationReport {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Check every type, entity set and association set of `model`
pub fn validate_model(model: &dyn EdmModel) -> ModelValidationReport {
    let start = Instant::now();
    let mut report = ModelValidationReport::default();
    let mut partials: Vec<Vec<Arc<Diagnostic>>> = Vec::new();

    log_debug!("Starting model validation");

    for schema_type in model.schema_types() {
        report.types_checked += 1;
        if let SchemaType::Structured(structured) = schema_type {
            partials.push(validate_structured_type(model, structured));
        }
    }

    for entity_set in model.entity_sets() {
        report.entity_sets_checked += 1;
        let entity_type = model::resolve_type_name(
            model,
            &entity_set.entity_type,
            UnresolvedKind::EntityType,
            Location::model(entity_set.name.as_str()),
        );
        partials.push(entity_type.errors().to_vec());
    }

    for set in model.association_sets() {
        report.association_sets_checked += 1;
        partials.push(SemanticAssociationSet::new(model, set).errors().to_vec());
    }

    report.diagnostics = collect(partials.iter().map(Vec::as_slice));
    report.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    if report.is_valid() {
        log_success!(codes::success::MODEL_VALIDATION_COMPLETE, "Model validation passed",
            "types" => report.types_checked,
            "entity_sets" => report.entity_sets_checked,
            "association_sets" => report.association_sets_checked
        );
    } else {
        log_warning!(code = codes::success::MODEL_VALIDATION_COMPLETE,
            "Model validation found problems",
            "diagnostics" => report.diagnostics.len()
        );
    }

    report
}

fn validate_structured_type(model: &dyn EdmModel, structured: &StructuredType) -> Vec<Arc<Diagnostic>> {
    let type_name = structured.qualified_name();
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();

    let members = structured
        .properties
        .iter()
        .map(|property| property.name.as_str())
        .chain(structured.navigation_properties.iter().map(|navigation| navigation.name.as_str()));
    for name in members {
        let location = Location::model(format!("{}/{}", type_name, name));
        if !is_simple_identifier(name) {
            diagnostics.push(Arc::new(Diagnostic::from(StructuralError::invalid_name(
                name,
                "not a valid identifier",
                location,
            ))));
        } else if !seen.insert(name) {
            diagnostics.push(Arc::new(Diagnostic::from(StructuralError::invalid_name(
                name,
                "declared more than once",
                location,
            ))));
        }
    }

    if let Some(base) = &structured.base_type {
        let base_type = model::resolve_type_name(
            model,
            base,
            UnresolvedKind::EntityType,
            Location::model(type_name.as_str()),
        );
        diagnostics.extend(base_type.errors().iter().cloned());
    }

    for key in &structured.key {
        if model.find_property(&type_name, key).is_none() {
            diagnostics.push(Arc::new(Diagnostic::from(StructuralError::invalid_name(
                key,
                "key property is not declared",
                Location::model(type_name.as_str()),
            ))));
        }
    }

    for property in &structured.properties {
        for term in &property.annotations {
            if core_vocabulary().term(term).is_none() {
                diagnostics.push(Arc::new(Diagnostic::from(StructuralError::invalid_name(
                    term,
                    "unknown vocabulary term",
                    Location::model(format!("{}/{}", type_name, property.name)),
                ))));
            }
        }
    }

    let declared = structured
        .properties
        .iter()
        .map(PropertyRef::Structural)
        .chain(structured.navigation_properties.iter().map(PropertyRef::Navigation));
    for property in declared {
        let resolved = model::property_type(model, &type_name, property);
        diagnostics.extend(resolved.errors().iter().cloned());
    }

    diagnostics
}

fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sales_model;
    use crate::model::InMemoryModel;

    #[test]
    fn test_fixture_model_is_valid() {
        let model = sales_model();
        let report = validate_model(&model);
        assert!(report.is_valid(), "{:?}", report.diagnostics);
        assert_eq!(report.entity_sets_checked, 4);
        assert_eq!(report.association_sets_checked, 1);
    }

    #[test]
    fn test_reports_every_problem_in_one_pass() {
        let json = r#"{"schemas":[{"namespace":"T",
            "entityTypes":[{"name":"E","key":["Id"],"properties":[
                {"name":"Name","type":"Edm.String","annotations":["Core.Bogus"]},
                {"name":"Name","type":"T.Missing"}
            ]}],
            "entitySets":[{"name":"Es","entityType":"T.Gone"}],
            "associationSets":[{"name":"S","association":"T.None"}]
        }]}"#;
        let model = InMemoryModel::from_json_str(json).unwrap();
        let report = validate_model(&model);

        let codes_found: Vec<_> = report.diagnostics.iter().map(|d| d.code).collect();
        assert!(codes_found.contains(&codes::structural::INVALID_NAME));
        assert!(codes_found.contains(&codes::binding::UNRESOLVED_ENTITY_TYPE));
        assert!(codes_found.contains(&codes::structural::UNRESOLVED_ASSOCIATION));
        assert!(codes_found.contains(&codes::binding::UNRESOLVED_TYPE));
        // duplicate member, missing key, unknown term, property type, entity set type, association
        assert_eq!(report.diagnostics.len(), 6);
    }

    #[test]
    fn test_validation_is_repeatable() {
        let json = r#"{"schemas":[{"namespace":"T",
            "entityTypes":[{"name":"E","properties":[{"name":"P","type":"T.Missing"}]}]}]}"#;
        let model = InMemoryModel::from_json_str(json).unwrap();
        let first = validate_model(&model);
        let second = validate_model(&model);
        assert_eq!(first.diagnostics.len(), 1);
        assert!(Arc::ptr_eq(&first.diagnostics[0], &second.diagnostics[0]));
    }
}
