//! Reference resolution
//!
//! A reference either resolves or becomes a placeholder carrying its own
//! diagnostics. Nothing here fails: failures are values, cached once
//! computed, so repeated validation passes see the same objects.

pub mod association;
pub mod memo;
pub mod unresolved;

pub use association::{ResolvedSetEnd, SemanticAssociationSet};
pub use memo::Memo;
pub use unresolved::{UnresolvedKind, UnresolvedRef};

use crate::validation::Diagnostic;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Resolution<T> {
    Resolved(T),
    Unresolved(UnresolvedRef),
}

impl<T> Resolution<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Unresolved(_) => None,
        }
    }

    pub fn unresolved(&self) -> Option<&UnresolvedRef> {
        match self {
            Self::Resolved(_) => None,
            Self::Unresolved(placeholder) => Some(placeholder),
        }
    }

    /// Empty for resolved values
    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        match self {
            Self::Resolved(_) => &[],
            Self::Unresolved(placeholder) => placeholder.errors(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Resolved(value) => Resolution::Resolved(f(value)),
            Self::Unresolved(placeholder) => Resolution::Unresolved(placeholder),
        }
    }

    pub fn into_result(self) -> Result<T, UnresolvedRef> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Unresolved(placeholder) => Err(placeholder),
        }
    }
}

impl<T> From<Result<T, UnresolvedRef>> for Resolution<T> {
    fn from(result: Result<T, UnresolvedRef>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(placeholder) => Self::Unresolved(placeholder),
        }
    }
}
