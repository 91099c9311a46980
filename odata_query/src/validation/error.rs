//! Structural errors found while walking the model
//!
//! These never abort the walk. Each one is turned into a [`Diagnostic`] and
//! collected with the rest.

use crate::logging::{codes, Code};
use crate::validation::diagnostic::{Diagnostic, Location};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Association set end name '{name}' is already used by the other end")]
    DuplicateEndName { name: String, location: Location },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: String,
        location: Location,
    },

    #[error("Cannot resolve association '{name}'")]
    UnresolvedAssociation { name: String, location: Location },

    #[error("Cannot resolve association end '{role}'")]
    UnresolvedAssociationEnd { role: String, location: Location },

    #[error("Cannot resolve entity set '{name}'")]
    UnresolvedEntitySet { name: String, location: Location },
}

impl StructuralError {
    pub fn invalid_name(name: &str, reason: &str, location: Location) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
            location,
        }
    }

    pub fn error_code(&self) -> Code {
        match self {
            Self::DuplicateEndName { .. } => codes::structural::DUPLICATE_END_NAME,
            Self::InvalidName { .. } => codes::structural::INVALID_NAME,
            Self::UnresolvedAssociation { .. } => codes::structural::UNRESOLVED_ASSOCIATION,
            Self::UnresolvedAssociationEnd { .. } => codes::structural::UNRESOLVED_ASSOCIATION_END,
            Self::UnresolvedEntitySet { .. } => codes::binding::UNRESOLVED_ENTITY_SET,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::DuplicateEndName { location, .. }
            | Self::InvalidName { location, .. }
            | Self::UnresolvedAssociation { location, .. }
            | Self::UnresolvedAssociationEnd { location, .. }
            | Self::UnresolvedEntitySet { location, .. } => location,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.error_code(), self.to_string(), self.location().clone())
    }
}

impl From<StructuralError> for Diagnostic {
    fn from(error: StructuralError) -> Self {
        error.to_diagnostic()
    }
}
