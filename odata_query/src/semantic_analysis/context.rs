//! Binding context: the range variables in scope
//!
//! `$it` is always present. Lambda parameters are pushed when an any/all
//! body is entered and popped when it is left, so sibling lambdas never see
//! each other's parameters.

use crate::config::compile_time::binding::MAX_RANGE_VARIABLE_DEPTH;
use crate::grammar::keywords::{IMPLICIT_RANGE_VARIABLE, THIS_RANGE_VARIABLE};
use crate::model::{self, EdmModel, TypeReference};
use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
use crate::semantic_analysis::error::{BindingError, BindingResult};
use crate::utils::Span;
use crate::validation::Location;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeVariable {
    pub name: String,
    /// Element type the variable ranges over
    pub type_ref: TypeReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
}

impl RangeVariable {
    pub fn new(name: impl Into<String>, type_ref: TypeReference) -> Self {
        Self {
            name: name.into(),
            type_ref,
            entity_set: None,
        }
    }

    pub fn implicit(type_ref: TypeReference, entity_set: Option<String>) -> Self {
        Self {
            name: IMPLICIT_RANGE_VARIABLE.to_string(),
            type_ref,
            entity_set,
        }
    }

    /// Ranges over entities or complex values rather than primitives
    pub fn is_resource(&self) -> bool {
        self.type_ref.is_structured() || self.type_ref.is_unresolved()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingContext {
    implicit: RangeVariable,
    lambdas: Vec<RangeVariable>,
    /// Properties introduced by `$apply` aliases, visible on `$it`
    dynamic_properties: BTreeMap<String, TypeReference>,
}

impl BindingContext {
    pub fn new(implicit: RangeVariable) -> Self {
        Self {
            implicit,
            lambdas: Vec::new(),
            dynamic_properties: BTreeMap::new(),
        }
    }

    pub fn for_type(type_ref: TypeReference) -> Self {
        Self::new(RangeVariable::implicit(type_ref, None))
    }

    /// Context whose `$it` ranges over the entity type of `entity_set`
    ///
    /// An unknown entity set still yields a context; its `$it` has a
    /// placeholder type, so everything bound against it reports the failure.
    pub fn for_entity_set(model: &dyn EdmModel, entity_set: &str) -> Self {
        let type_ref = match model.find_entity_set(entity_set) {
            Some(set) => model::resolve_type_name(
                model,
                &set.entity_type,
                UnresolvedKind::EntityType,
                Location::model(entity_set),
            ),
            None => TypeReference::Unresolved(UnresolvedRef::new(
                UnresolvedKind::EntitySet,
                entity_set,
                Location::Unknown,
            )),
        };
        Self::new(RangeVariable::implicit(type_ref, Some(entity_set.to_string())))
    }

    pub fn implicit(&self) -> &RangeVariable {
        &self.implicit
    }

    pub fn lookup(&self, name: &str) -> Option<&RangeVariable> {
        match name {
            IMPLICIT_RANGE_VARIABLE => Some(&self.implicit),
            THIS_RANGE_VARIABLE => Some(self.lambdas.last().unwrap_or(&self.implicit)),
            _ => self.lambdas.iter().rev().find(|variable| variable.name == name),
        }
    }

    pub fn push_lambda(&mut self, variable: RangeVariable, span: Span) -> BindingResult<()> {
        if self.lambdas.len() >= MAX_RANGE_VARIABLE_DEPTH {
            return Err(BindingError::MaxBindingDepth {
                limit: MAX_RANGE_VARIABLE_DEPTH,
                span,
            });
        }
        self.lambdas.push(variable);
        Ok(())
    }

    pub fn pop_lambda(&mut self) -> Option<RangeVariable> {
        self.lambdas.pop()
    }

    pub fn lambda_depth(&self) -> usize {
        self.lambdas.len()
    }

    pub fn add_dynamic_property(&mut self, name: impl Into<String>, type_ref: TypeReference) {
        self.dynamic_properties.insert(name.into(), type_ref);
    }

    pub fn dynamic_property(&self, name: &str) -> Option<&TypeReference> {
        self.dynamic_properties.get(name)
    }

    pub fn dynamic_property_names(&self) -> impl Iterator<Item = &str> {
        self.dynamic_properties.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sales_model;
    use crate::model::EdmPrimitiveKind;
    use assert_matches::assert_matches;

    #[test]
    fn test_scopes_are_a_stack() {
        let mut context = BindingContext::for_type(TypeReference::Entity("Sales.Customer".into()));
        let order = TypeReference::Entity("Sales.Order".into());
        context.push_lambda(RangeVariable::new("o", order.clone()), Span::dummy()).unwrap();
        assert_eq!(context.lookup("o").map(|v| &v.type_ref), Some(&order));
        assert_eq!(context.lookup("$this").map(|v| v.name.as_str()), Some("o"));
        assert_eq!(context.lookup("$it").map(|v| v.name.as_str()), Some("$it"));

        context.pop_lambda();
        assert!(context.lookup("o").is_none());
        assert_eq!(context.lookup("$this").map(|v| v.name.as_str()), Some("$it"));
    }

    #[test]
    fn test_inner_lambda_shadows_outer() {
        let mut context = BindingContext::for_type(TypeReference::Untyped);
        let string = TypeReference::Primitive(EdmPrimitiveKind::String);
        context.push_lambda(RangeVariable::new("x", TypeReference::Untyped), Span::dummy()).unwrap();
        context.push_lambda(RangeVariable::new("x", string.clone()), Span::dummy()).unwrap();
        assert_eq!(context.lookup("x").map(|v| &v.type_ref), Some(&string));
    }

    #[test]
    fn test_depth_limit() {
        let mut context = BindingContext::for_type(TypeReference::Untyped);
        for i in 0..MAX_RANGE_VARIABLE_DEPTH {
            context
                .push_lambda(RangeVariable::new(format!("v{}", i), TypeReference::Untyped), Span::dummy())
                .unwrap();
        }
        assert_matches!(
            context.push_lambda(RangeVariable::new("over", TypeReference::Untyped), Span::dummy()),
            Err(BindingError::MaxBindingDepth { .. })
        );
    }

    #[test]
    fn test_for_entity_set() {
        let model = sales_model();
        let context = BindingContext::for_entity_set(&model, "Customers");
        assert_eq!(context.implicit().type_ref, TypeReference::Entity("Sales.Customer".into()));
        assert_eq!(context.implicit().entity_set.as_deref(), Some("Customers"));

        let missing = BindingContext::for_entity_set(&model, "Nowhere");
        assert!(missing.implicit().type_ref.is_unresolved());
        assert_eq!(missing.implicit().type_ref.errors().len(), 1);
    }
}
