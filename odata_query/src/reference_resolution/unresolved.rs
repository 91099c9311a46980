//! Placeholders for references that failed to resolve
//!
//! An [`UnresolvedRef`] stands where a model element should be. It carries
//! its diagnostics instead of failing, so binding and validation can keep
//! walking and report every problem in one pass.

use crate::logging::{codes, Code};
use crate::reference_resolution::memo::Memo;
use crate::validation::{Diagnostic, Location};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedKind {
    EntityType,
    ComplexType,
    Type,
    Property,
    NavigationProperty,
    EntitySet,
    Function,
    ParameterAlias,
    Association,
    AssociationEnd,
}

impl UnresolvedKind {
    pub fn code(self) -> Code {
        match self {
            Self::EntityType => codes::binding::UNRESOLVED_ENTITY_TYPE,
            Self::ComplexType => codes::binding::UNRESOLVED_COMPLEX_TYPE,
            Self::Type | Self::ParameterAlias => codes::binding::UNRESOLVED_TYPE,
            Self::Property => codes::binding::UNRESOLVED_PROPERTY,
            Self::NavigationProperty => codes::binding::UNRESOLVED_NAVIGATION,
            Self::EntitySet => codes::binding::UNRESOLVED_ENTITY_SET,
            Self::Function => codes::binding::UNRESOLVED_FUNCTION,
            Self::Association => codes::structural::UNRESOLVED_ASSOCIATION,
            Self::AssociationEnd => codes::structural::UNRESOLVED_ASSOCIATION_END,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityType => "entity type",
            Self::ComplexType => "complex type",
            Self::Type => "type",
            Self::Property => "property",
            Self::NavigationProperty => "navigation property",
            Self::EntitySet => "entity set",
            Self::Function => "function",
            Self::ParameterAlias => "parameter alias",
            Self::Association => "association",
            Self::AssociationEnd => "association end",
        }
    }
}

impl fmt::Display for UnresolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct UnresolvedInner {
    kind: UnresolvedKind,
    name: String,
    location: Location,
    /// Set when this placeholder only exists because `cause` failed
    cause: Option<UnresolvedRef>,
    errors: Memo<Vec<Arc<Diagnostic>>>,
}

/// Shared handle to an unresolved element; clones share the cached errors
#[derive(Debug, Clone)]
pub struct UnresolvedRef(Arc<UnresolvedInner>);

impl UnresolvedRef {
    pub fn new(kind: UnresolvedKind, name: impl Into<String>, location: Location) -> Self {
        Self(Arc::new(UnresolvedInner {
            kind,
            name: name.into(),
            location,
            cause: None,
            errors: Memo::new(),
        }))
    }

    /// Placeholder for an element that depends on `cause`
    ///
    /// It reports `cause`'s diagnostics and none of its own.
    pub fn derived(
        kind: UnresolvedKind,
        name: impl Into<String>,
        location: Location,
        cause: &UnresolvedRef,
    ) -> Self {
        Self(Arc::new(UnresolvedInner {
            kind,
            name: name.into(),
            location,
            cause: Some(cause.clone()),
            errors: Memo::new(),
        }))
    }

    pub fn kind(&self) -> UnresolvedKind {
        self.0.kind
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn location(&self) -> &Location {
        &self.0.location
    }

    pub fn cause(&self) -> Option<&UnresolvedRef> {
        self.0.cause.as_ref()
    }

    /// Diagnostics explaining the failure, computed on first access
    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.0.errors.get_or_init(|| match &self.0.cause {
            Some(cause) => cause.errors().to_vec(),
            None => vec![Diagnostic::new(
                self.0.kind.code(),
                format!("Cannot resolve {} '{}'", self.0.kind, self.0.name),
                self.0.location.clone(),
            )
            .shared()],
        })
    }

    pub fn same_placeholder(&self, other: &UnresolvedRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Two placeholders are equal when they describe the same failure
impl PartialEq for UnresolvedRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_placeholder(other)
            || (self.0.kind == other.0.kind
                && self.0.name == other.0.name
                && self.0.location == other.0.location
                && self.0.cause == other.0.cause)
    }
}

impl fmt::Display for UnresolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved {} '{}'", self.0.kind, self.0.name)
    }
}

impl Serialize for UnresolvedRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            kind: UnresolvedKind,
            name: &'a str,
            location: &'a Location,
        }
        View {
            kind: self.0.kind,
            name: &self.0.name,
            location: &self.0.location,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;

    #[test]
    fn test_errors_are_cached() {
        let placeholder = UnresolvedRef::new(
            UnresolvedKind::EntityType,
            "NoSuchEntity",
            Location::Query(Span::from_offsets(0, 12)),
        );
        let first = placeholder.errors();
        let second = placeholder.errors();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(first[0].code, codes::binding::UNRESOLVED_ENTITY_TYPE);
        assert_eq!(first[0].message, "Cannot resolve entity type 'NoSuchEntity'");
    }

    #[test]
    fn test_derived_placeholder_reports_cause_only() {
        let cause = UnresolvedRef::new(
            UnresolvedKind::Association,
            "Sales.Missing",
            Location::model("CustomerOrders"),
        );
        let end = UnresolvedRef::derived(
            UnresolvedKind::AssociationEnd,
            "End1",
            Location::model("CustomerOrders/End1"),
            &cause,
        );
        assert_eq!(end.errors().len(), 1);
        assert!(Arc::ptr_eq(&end.errors()[0], &cause.errors()[0]));
    }

    #[test]
    fn test_equal_failures_compare_equal() {
        let location = Location::Query(Span::from_offsets(0, 3));
        let a = UnresolvedRef::new(UnresolvedKind::Property, "Foo", location.clone());
        let b = UnresolvedRef::new(UnresolvedKind::Property, "Foo", location);
        assert_eq!(a, b);
        assert!(!a.same_placeholder(&b));
        assert_eq!(a.errors()[0].message, b.errors()[0].message);
    }
}
