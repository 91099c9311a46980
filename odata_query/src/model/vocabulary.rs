//! Built-in primitive types and core vocabulary terms
//!
//! Both tables are built once per process on first use and are read-only
//! afterwards.

use crate::model::types::EdmPrimitiveKind;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermTarget {
    Property,
    EntityType,
    Any,
}

#[derive(Debug, Clone)]
pub struct VocabularyTerm {
    pub qualified_name: &'static str,
    pub type_name: &'static str,
    pub applies_to: TermTarget,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct CoreVocabulary {
    primitives: HashMap<String, EdmPrimitiveKind>,
    terms: HashMap<&'static str, VocabularyTerm>,
}

impl CoreVocabulary {
    fn build() -> Self {
        let primitives = EdmPrimitiveKind::ALL
            .iter()
            .map(|kind| (kind.qualified_name(), *kind))
            .collect();

        let terms = [
            ("Org.OData.Core.V1.Description", "Edm.String", TermTarget::Any, "A brief description of a model element"),
            ("Org.OData.Core.V1.LongDescription", "Edm.String", TermTarget::Any, "A lengthy description of a model element"),
            ("Org.OData.Core.V1.Computed", "Core.Tag", TermTarget::Property, "A value for this property is generated on both insert and update"),
            ("Org.OData.Core.V1.Immutable", "Core.Tag", TermTarget::Property, "A value for this property can be provided on insert and remains unchanged on update"),
            ("Org.OData.Core.V1.Permissions", "Core.Permission", TermTarget::Property, "Permissions for accessing a resource"),
            ("Org.OData.Core.V1.IsURL", "Core.Tag", TermTarget::Property, "Properties and terms annotated with this term MUST contain a valid URL"),
            ("Org.OData.Core.V1.OptimisticConcurrency", "Collection(Edm.PropertyPath)", TermTarget::EntityType, "Data modification requires the use of ETags"),
        ]
        .into_iter()
        .map(|(qualified_name, type_name, applies_to, description)| {
            (
                qualified_name,
                VocabularyTerm {
                    qualified_name,
                    type_name,
                    applies_to,
                    description,
                },
            )
        })
        .collect();

        Self { primitives, terms }
    }

    /// `Edm.Int32` → `Int32`
    pub fn primitive(&self, qualified_name: &str) -> Option<EdmPrimitiveKind> {
        self.primitives.get(qualified_name).copied()
    }

    /// Accepts the `Core.` alias as well as the full namespace
    pub fn term(&self, name: &str) -> Option<&VocabularyTerm> {
        match name.strip_prefix("Core.") {
            Some(short) => self.terms.get(format!("Org.OData.Core.V1.{}", short).as_str()),
            None => self.terms.get(name),
        }
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

static CORE_VOCABULARY: OnceLock<CoreVocabulary> = OnceLock::new();

pub fn core_vocabulary() -> &'static CoreVocabulary {
    CORE_VOCABULARY.get_or_init(CoreVocabulary::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_lookup() {
        let vocabulary = core_vocabulary();
        assert_eq!(vocabulary.primitive("Edm.Int32"), Some(EdmPrimitiveKind::Int32));
        assert_eq!(vocabulary.primitive("Edm.Stream"), Some(EdmPrimitiveKind::Stream));
        assert_eq!(vocabulary.primitive("Edm.Nothing"), None);
        assert_eq!(vocabulary.primitive("Int32"), None);
    }

    #[test]
    fn test_term_aliases() {
        let vocabulary = core_vocabulary();
        let computed = vocabulary.term("Core.Computed").unwrap();
        assert_eq!(computed.applies_to, TermTarget::Property);
        assert!(vocabulary.term("Org.OData.Core.V1.Description").is_some());
        assert!(vocabulary.term("Core.Unknown").is_none());
    }

    #[test]
    fn test_singleton_is_shared() {
        assert!(std::ptr::eq(core_vocabulary(), core_vocabulary()));
    }
}
