//! Hard binding failures
//!
//! These abort binding of the current query option. References that merely
//! fail to resolve are not errors here: they become placeholders and travel
//! with the bound tree.

use crate::logging::{codes, Code};
use crate::utils::Span;
use crate::validation::{Diagnostic, Location};
use thiserror::Error;

pub type BindingResult<T> = Result<T, BindingError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("No overload of '{name}' accepts ({argument_types}); {candidates} candidate(s) considered")]
    NoMatchingOverload {
        name: String,
        argument_types: String,
        candidates: usize,
        span: Span,
    },

    #[error("Call to '{name}' matches {candidates} overloads equally well")]
    AmbiguousOverload {
        name: String,
        candidates: usize,
        span: Span,
    },

    #[error("Operator '{operator}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
        span: Span,
    },

    #[error("Operator '{operator}' cannot be applied to {operand}")]
    UnaryTypeMismatch {
        operator: String,
        operand: String,
        span: Span,
    },

    #[error("Invalid {type_name} literal '{text}': {reason}")]
    InvalidLiteralValue {
        type_name: String,
        text: String,
        reason: String,
        span: Span,
    },

    #[error("'{expression}' has type {found}; any/all need a collection")]
    InvalidLambdaSource {
        expression: String,
        found: String,
        span: Span,
    },

    #[error("Expected a boolean expression but found {found}")]
    NonBooleanExpression { found: String, span: Span },

    #[error("Cannot cast {from_type} to {to_type}")]
    InvalidCast {
        from_type: String,
        to_type: String,
        span: Span,
    },

    #[error("Cannot access '{name}' on {on}: {reason}")]
    InvalidPropertyAccess {
        name: String,
        on: String,
        reason: String,
        span: Span,
    },

    #[error("Binding nested deeper than {limit} levels")]
    MaxBindingDepth { limit: usize, span: Span },

    #[error("Invalid key for '{target}': {reason}")]
    InvalidKey {
        target: String,
        reason: String,
        span: Span,
    },

    #[error("Cannot expand '{path}': {reason}")]
    InvalidExpand {
        path: String,
        reason: String,
        span: Span,
    },

    #[error("Cannot order by '{expression}': {reason}")]
    InvalidOrderBy {
        expression: String,
        reason: String,
        span: Span,
    },

    #[error("{kind} is not valid here")]
    UnsupportedToken { kind: String, span: Span },
}

impl BindingError {
    pub fn error_code(&self) -> Code {
        match self {
            Self::NoMatchingOverload { .. } => codes::binding::NO_MATCHING_OVERLOAD,
            Self::AmbiguousOverload { .. } => codes::binding::AMBIGUOUS_OVERLOAD,
            Self::TypeMismatch { .. } | Self::UnaryTypeMismatch { .. } => {
                codes::binding::TYPE_MISMATCH
            }
            Self::InvalidLiteralValue { .. } => codes::binding::INVALID_LITERAL_VALUE,
            Self::InvalidLambdaSource { .. } => codes::binding::INVALID_LAMBDA_SOURCE,
            Self::NonBooleanExpression { .. } => codes::binding::NON_BOOLEAN_EXPRESSION,
            Self::InvalidCast { .. } => codes::binding::INVALID_CAST,
            Self::InvalidPropertyAccess { .. } | Self::UnsupportedToken { .. } => {
                codes::binding::INVALID_PROPERTY_ACCESS
            }
            Self::MaxBindingDepth { .. } => codes::binding::MAX_BINDING_DEPTH,
            Self::InvalidKey { .. } => codes::binding::INVALID_KEY,
            Self::InvalidExpand { .. } => codes::binding::INVALID_EXPAND,
            Self::InvalidOrderBy { .. } => codes::binding::INVALID_ORDERBY,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::NoMatchingOverload { span, .. }
            | Self::AmbiguousOverload { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::UnaryTypeMismatch { span, .. }
            | Self::InvalidLiteralValue { span, .. }
            | Self::InvalidLambdaSource { span, .. }
            | Self::NonBooleanExpression { span, .. }
            | Self::InvalidCast { span, .. }
            | Self::InvalidPropertyAccess { span, .. }
            | Self::MaxBindingDepth { span, .. }
            | Self::InvalidKey { span, .. }
            | Self::InvalidExpand { span, .. }
            | Self::InvalidOrderBy { span, .. }
            | Self::UnsupportedToken { span, .. } => *span,
        }
    }

    pub fn requires_halt(&self) -> bool {
        codes::requires_halt(self.error_code().as_str())
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.error_code().as_str())
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.error_code(), self.to_string(), Location::Query(self.span()))
    }

    /// Same error with its span moved right by `delta` bytes
    pub fn shifted(mut self, delta: usize) -> Self {
        match &mut self {
            Self::NoMatchingOverload { span, .. }
            | Self::AmbiguousOverload { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::UnaryTypeMismatch { span, .. }
            | Self::InvalidLiteralValue { span, .. }
            | Self::InvalidLambdaSource { span, .. }
            | Self::NonBooleanExpression { span, .. }
            | Self::InvalidCast { span, .. }
            | Self::InvalidPropertyAccess { span, .. }
            | Self::MaxBindingDepth { span, .. }
            | Self::InvalidKey { span, .. }
            | Self::InvalidExpand { span, .. }
            | Self::InvalidOrderBy { span, .. }
            | Self::UnsupportedToken { span, .. } => *span = span.shifted(delta),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overload_error_names_candidate_count() {
        let error = BindingError::NoMatchingOverload {
            name: "substring".to_string(),
            argument_types: "Edm.String".to_string(),
            candidates: 2,
            span: Span::from_offsets(0, 20),
        };
        assert_eq!(error.error_code(), codes::binding::NO_MATCHING_OVERLOAD);
        assert!(error.to_string().contains("2 candidate(s)"));
    }

    #[test]
    fn test_diagnostic_points_into_query() {
        let error = BindingError::NonBooleanExpression {
            found: "Edm.Int32".to_string(),
            span: Span::from_offsets(3, 9),
        };
        let diagnostic = error.clone().shifted(2).to_diagnostic();
        assert_eq!(diagnostic.location, Location::Query(Span::from_offsets(5, 11)));
        assert_eq!(diagnostic.code, codes::binding::NON_BOOLEAN_EXPRESSION);
    }
}
