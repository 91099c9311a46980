//! Type references used by the binder

use crate::reference_resolution::UnresolvedRef;
use crate::validation::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const COLLECTION_PREFIX: &str = "Collection(";
pub const EDM_NAMESPACE: &str = "Edm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdmPrimitiveKind {
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    Date,
    TimeOfDay,
    DateTimeOffset,
    Duration,
    Binary,
    Stream,
}

impl EdmPrimitiveKind {
    pub const ALL: [EdmPrimitiveKind; 17] = [
        Self::Boolean,
        Self::Byte,
        Self::SByte,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Single,
        Self::Double,
        Self::Decimal,
        Self::String,
        Self::Guid,
        Self::Date,
        Self::TimeOfDay,
        Self::DateTimeOffset,
        Self::Duration,
        Self::Binary,
        Self::Stream,
    ];

    pub const fn simple_name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::SByte => "SByte",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::Decimal => "Decimal",
            Self::String => "String",
            Self::Guid => "Guid",
            Self::Date => "Date",
            Self::TimeOfDay => "TimeOfDay",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Duration => "Duration",
            Self::Binary => "Binary",
            Self::Stream => "Stream",
        }
    }

    pub fn qualified_name(self) -> String {
        format!("{}.{}", EDM_NAMESPACE, self.simple_name())
    }

    /// Position in the numeric widening order; `None` for non-numeric kinds
    pub const fn numeric_rank(self) -> Option<u8> {
        match self {
            Self::Byte | Self::SByte => Some(0),
            Self::Int16 => Some(1),
            Self::Int32 => Some(2),
            Self::Int64 => Some(3),
            Self::Single => Some(4),
            Self::Double => Some(5),
            Self::Decimal => Some(6),
            _ => None,
        }
    }

    pub const fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::TimeOfDay | Self::DateTimeOffset | Self::Duration
        )
    }

    /// Whether a value of `self` widens to `target` without loss of kind
    pub fn promotes_to(self, target: EdmPrimitiveKind) -> bool {
        if self == target {
            return true;
        }
        // Same rank, disjoint ranges
        if matches!((self, target), (Self::Byte, Self::SByte) | (Self::SByte, Self::Byte)) {
            return false;
        }
        match (self.numeric_rank(), target.numeric_rank()) {
            (Some(from), Some(to)) => from <= to,
            _ => false,
        }
    }

    /// Narrowest kind both operands widen to
    pub fn common_numeric(left: EdmPrimitiveKind, right: EdmPrimitiveKind) -> Option<EdmPrimitiveKind> {
        let (l, r) = (left.numeric_rank()?, right.numeric_rank()?);
        if l == r && left != right {
            return Some(Self::Int16);
        }
        Some(if l >= r { left } else { right })
    }
}

impl fmt::Display for EdmPrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", EDM_NAMESPACE, self.simple_name())
    }
}

/// A resolved (or placeholder) type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum TypeReference {
    Primitive(EdmPrimitiveKind),
    /// Qualified entity type name
    Entity(String),
    Complex(String),
    Enum(String),
    Collection(Box<TypeReference>),
    /// Known only at runtime: `null` and dynamic properties of open types
    Untyped,
    Unresolved(UnresolvedRef),
}

impl TypeReference {
    pub fn collection_of(element: TypeReference) -> Self {
        Self::Collection(Box::new(element))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// Element type of a collection, or the type itself
    pub fn element_type(&self) -> &TypeReference {
        match self {
            Self::Collection(element) => element,
            other => other,
        }
    }

    pub fn primitive(&self) -> Option<EdmPrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self, kind: EdmPrimitiveKind) -> bool {
        self.primitive() == Some(kind)
    }

    pub fn is_boolean(&self) -> bool {
        self.is_primitive(EdmPrimitiveKind::Boolean)
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive().is_some_and(EdmPrimitiveKind::is_numeric)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Entity(_) | Self::Complex(_))
    }

    /// Entity or complex type name
    pub fn structured_name(&self) -> Option<&str> {
        match self {
            Self::Entity(name) | Self::Complex(name) => Some(name),
            _ => None,
        }
    }

    pub fn unresolved(&self) -> Option<&UnresolvedRef> {
        match self {
            Self::Unresolved(placeholder) => Some(placeholder),
            Self::Collection(element) => element.unresolved(),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.unresolved().is_some()
    }

    /// Untyped or unresolved; such types are accepted wherever a type is checked
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Untyped) || self.is_unresolved()
    }

    /// Diagnostics of the placeholder inside this type, if any
    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        match self.unresolved() {
            Some(placeholder) => placeholder.errors(),
            None => &[],
        }
    }

    pub fn qualified_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind),
            Self::Entity(name) | Self::Complex(name) | Self::Enum(name) => f.write_str(name),
            Self::Collection(element) => write!(f, "{}{})", COLLECTION_PREFIX, element),
            Self::Untyped => write!(f, "{}.Untyped", EDM_NAMESPACE),
            Self::Unresolved(placeholder) => f.write_str(placeholder.name()),
        }
    }
}

/// `Collection(X)` → `Some("X")`
pub fn collection_element_name(type_name: &str) -> Option<&str> {
    type_name
        .trim()
        .strip_prefix(COLLECTION_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_and_sbyte_meet_at_int16() {
        use EdmPrimitiveKind::*;
        assert!(!SByte.promotes_to(Byte));
        assert!(!Byte.promotes_to(SByte));
        assert!(SByte.promotes_to(Int16));
        assert!(Byte.promotes_to(Int16));
        assert_eq!(EdmPrimitiveKind::common_numeric(SByte, Byte), Some(Int16));
        assert_eq!(EdmPrimitiveKind::common_numeric(Byte, SByte), Some(Int16));
        assert_eq!(EdmPrimitiveKind::common_numeric(Byte, Byte), Some(Byte));
    }

    #[test]
    fn test_widening_order() {
        use EdmPrimitiveKind::*;
        assert!(Int32.promotes_to(Int64));
        assert!(Int64.promotes_to(Single));
        assert!(Single.promotes_to(Double));
        assert!(Double.promotes_to(Decimal));
        assert!(!Decimal.promotes_to(Double));
        assert!(!String.promotes_to(Int32));
        assert_eq!(EdmPrimitiveKind::common_numeric(Int32, Double), Some(Double));
        assert_eq!(EdmPrimitiveKind::common_numeric(Byte, Int32), Some(Int32));
        assert_eq!(EdmPrimitiveKind::common_numeric(Byte, Int16), Some(Int16));
        assert_eq!(EdmPrimitiveKind::common_numeric(String, Int32), None);
    }

    #[test]
    fn test_collection_names() {
        let reference = TypeReference::collection_of(TypeReference::Complex("Sales.Address".into()));
        assert_eq!(reference.to_string(), "Collection(Sales.Address)");
        assert_eq!(collection_element_name("Collection(Sales.Address)"), Some("Sales.Address"));
        assert_eq!(collection_element_name("Sales.Address"), None);
        assert!(reference.element_type().is_structured());
    }
}
