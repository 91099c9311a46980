//! Association set end resolution
//!
//! An association set names up to two ends. An end with an explicit role is
//! matched by role against the association's declared ends. An end without a
//! role takes whichever declared end the other side did not claim; with no
//! roles at all the ends follow declaration order.

use crate::model::{Association, AssociationEnd, AssociationSet, AssociationSetEnd, EdmModel};
use crate::reference_resolution::memo::Memo;
use crate::reference_resolution::unresolved::{UnresolvedKind, UnresolvedRef};
use crate::reference_resolution::Resolution;
use crate::validation::{collect, Diagnostic, Location, StructuralError};
use serde::Serialize;
use std::sync::Arc;

/// A set end bound to one of the association's declared ends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSetEnd {
    pub role: String,
    pub declared: AssociationEnd,
    /// Entity set named by the association set, when given
    pub entity_set: Option<String>,
    pub location: Location,
}

pub struct SemanticAssociationSet<'m> {
    model: &'m dyn EdmModel,
    set: &'m AssociationSet,
    association: Memo<Resolution<Association>>,
    ends: Memo<[Resolution<ResolvedSetEnd>; 2]>,
    errors: Memo<Vec<Arc<Diagnostic>>>,
}

impl<'m> SemanticAssociationSet<'m> {
    pub fn new(model: &'m dyn EdmModel, set: &'m AssociationSet) -> Self {
        Self {
            model,
            set,
            association: Memo::new(),
            ends: Memo::new(),
            errors: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.set.name
    }

    pub fn association(&self) -> &Resolution<Association> {
        self.association.get_or_init(|| match self.model.find_association(&self.set.association) {
            Some(association) => Resolution::Resolved(association.clone()),
            None => Resolution::Unresolved(UnresolvedRef::new(
                UnresolvedKind::Association,
                self.set.association.as_str(),
                Location::model(self.set.name.as_str()),
            )),
        })
    }

    pub fn end1(&self) -> &Resolution<ResolvedSetEnd> {
        &self.ends()[0]
    }

    pub fn end2(&self) -> &Resolution<ResolvedSetEnd> {
        &self.ends()[1]
    }

    fn ends(&self) -> &[Resolution<ResolvedSetEnd>; 2] {
        self.ends.get_or_init(|| self.resolve_ends())
    }

    fn end_location(&self, index: usize) -> Location {
        Location::model(format!("{}/End{}", self.set.name, index + 1))
    }

    fn resolve_ends(&self) -> [Resolution<ResolvedSetEnd>; 2] {
        let specified: [Option<&AssociationSetEnd>; 2] = [self.set.end1.as_ref(), self.set.end2.as_ref()];

        let association = match self.association() {
            Resolution::Resolved(association) => association,
            Resolution::Unresolved(cause) => {
                return [0, 1].map(|index| {
                    let role = specified[index]
                        .and_then(|end| end.role.clone())
                        .unwrap_or_else(|| format!("End{}", index + 1));
                    Resolution::Unresolved(UnresolvedRef::derived(
                        UnresolvedKind::AssociationEnd,
                        role,
                        self.end_location(index),
                        cause,
                    ))
                });
            }
        };

        let declared = association.ends();
        // Some(Ok(i)): role matched declared end i; Some(Err(role)): no such role
        let explicit: [Option<Result<usize, String>>; 2] = specified.map(|end| {
            end.and_then(|end| end.role.as_ref()).map(|role| {
                declared
                    .iter()
                    .position(|declared_end| &declared_end.role == role)
                    .ok_or_else(|| role.clone())
            })
        });

        [0, 1].map(|index| {
            let chosen = match &explicit[index] {
                Some(Ok(chosen)) => *chosen,
                Some(Err(role)) => {
                    return Resolution::Unresolved(UnresolvedRef::new(
                        UnresolvedKind::AssociationEnd,
                        role.as_str(),
                        self.end_location(index),
                    ))
                }
                None => match &explicit[1 - index] {
                    Some(Ok(other)) => 1 - *other,
                    _ => index,
                },
            };
            let declared_end = declared[chosen];
            Resolution::Resolved(ResolvedSetEnd {
                role: declared_end.role.clone(),
                declared: declared_end.clone(),
                entity_set: specified[index].map(|end| end.entity_set.clone()),
                location: self.end_location(index),
            })
        })
    }

    /// Structural problems of this set, computed once
    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_init(|| {
            let mut own = Vec::new();

            if let (Resolution::Resolved(end1), Resolution::Resolved(end2)) = (self.end1(), self.end2()) {
                if end1.role == end2.role {
                    own.push(Arc::new(Diagnostic::from(StructuralError::DuplicateEndName {
                        name: end2.role.clone(),
                        location: end2.location.clone(),
                    })));
                }
            }

            for (index, end) in self.set.end1.iter().chain(self.set.end2.iter()).enumerate() {
                if self.model.find_entity_set(&end.entity_set).is_none() {
                    own.push(Arc::new(Diagnostic::from(StructuralError::UnresolvedEntitySet {
                        name: end.entity_set.clone(),
                        location: self.end_location(index),
                    })));
                }
            }

            collect([
                self.association().errors(),
                self.end1().errors(),
                self.end2().errors(),
                own.as_slice(),
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;
    use crate::model::fixtures::sales_model;
    use crate::model::InMemoryModel;

    fn model_with_set(end1: Option<(&str, &str)>, end2: Option<(&str, &str)>) -> InMemoryModel {
        let end = |end: Option<(&str, &str)>| match end {
            Some((role, set)) if role.is_empty() => format!(r#"{{"entitySet":"{}"}}"#, set),
            Some((role, set)) => format!(r#"{{"role":"{}","entitySet":"{}"}}"#, role, set),
            None => "null".to_string(),
        };
        let json = format!(
            r#"{{"schemas":[{{"namespace":"T",
                "entityTypes":[{{"name":"E"}}],
                "entitySets":[{{"name":"Xs","entityType":"T.E"}},{{"name":"Ys","entityType":"T.E"}}],
                "associations":[{{"name":"AB",
                    "end1":{{"role":"A","type":"T.E","multiplicity":"1"}},
                    "end2":{{"role":"B","type":"T.E","multiplicity":"*"}}}}],
                "associationSets":[{{"name":"Set","association":"T.AB","end1":{},"end2":{}}}]
            }}]}}"#,
            end(end1),
            end(end2)
        );
        InMemoryModel::from_json_str(&json).unwrap()
    }

    #[test]
    fn test_omitted_end_takes_the_other_role() {
        let model = model_with_set(Some(("B", "Xs")), None);
        let set = SemanticAssociationSet::new(&model, &model.association_sets()[0]);
        assert_eq!(set.end1().resolved().unwrap().role, "B");
        assert_eq!(set.end2().resolved().unwrap().role, "A");
        assert!(set.errors().is_empty());
    }

    #[test]
    fn test_both_omitted_follow_declaration_order() {
        let model = model_with_set(None, None);
        let set = SemanticAssociationSet::new(&model, &model.association_sets()[0]);
        assert_eq!(set.end1().resolved().unwrap().role, "A");
        assert_eq!(set.end2().resolved().unwrap().role, "B");
    }

    #[test]
    fn test_duplicate_end_name_points_at_end2() {
        let model = model_with_set(Some(("A", "Xs")), Some(("A", "Ys")));
        let set = SemanticAssociationSet::new(&model, &model.association_sets()[0]);
        let errors = set.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::structural::DUPLICATE_END_NAME);
        assert_eq!(errors[0].location, Location::model("Set/End2"));
    }

    #[test]
    fn test_unknown_role_is_unresolved_end() {
        let model = model_with_set(Some(("C", "Xs")), Some(("", "Ys")));
        let set = SemanticAssociationSet::new(&model, &model.association_sets()[0]);
        assert!(set.end1().unresolved().is_some());
        // The other end falls back to its own position
        assert_eq!(set.end2().resolved().unwrap().role, "B");
        assert_eq!(set.errors()[0].code, codes::structural::UNRESOLVED_ASSOCIATION_END);
    }

    #[test]
    fn test_unresolved_association_propagates_to_ends() {
        let model = sales_model();
        let orphan = AssociationSet {
            name: "Orphan".to_string(),
            association: "Sales.Missing".to_string(),
            end1: None,
            end2: None,
        };
        let set = SemanticAssociationSet::new(&model, &orphan);
        assert!(set.association().unresolved().is_some());
        assert!(set.end1().unresolved().is_some());
        // One diagnostic, reached through the association and both ends
        assert_eq!(set.errors().len(), 1);
        assert_eq!(set.errors()[0].code, codes::structural::UNRESOLVED_ASSOCIATION);
    }

    #[test]
    fn test_fixture_set_resolves() {
        let model = sales_model();
        let set = SemanticAssociationSet::new(&model, &model.association_sets()[0]);
        assert_eq!(set.end2().resolved().unwrap().role, "Orders");
        assert!(set.errors().is_empty());
    }
}
