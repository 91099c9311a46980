//! `$apply` errors
//!
//! Splitting and clause parsing fail fast like the parser does. Every span is
//! relative to the start of the whole `$apply` value.

use crate::lexical::LexError;
use crate::logging::{codes, Code};
use crate::syntax::SyntaxError;
use crate::utils::Span;

pub type ApplyResult<T> = Result<T, ApplyError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplyError {
    #[error("no 'with' statement in aggregate expression '{text}'")]
    MissingWithStatement { text: String, span: Span },

    #[error("Aggregate expression '{text}' has no alias")]
    MissingAlias { text: String, span: Span },

    #[error("Unknown transformation '{name}' at {span}")]
    UnknownTransformation { name: String, span: Span },

    #[error("Unknown aggregation method '{method}' at {span}")]
    UnknownAggregationMethod { method: String, span: Span },

    #[error("Unbalanced parentheses at {span}")]
    UnbalancedParentheses { span: Span },

    #[error("Unterminated string literal at {span}")]
    UnterminatedString { span: Span },

    #[error("Malformed transformation '{text}': {reason}")]
    MalformedTransformation {
        text: String,
        reason: String,
        span: Span,
    },

    #[error("Too many transformations: {count} (limit {limit})")]
    TooManyTransformations { count: usize, limit: usize },

    #[error(transparent)]
    Lexical(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ApplyError {
    pub fn malformed(text: &str, reason: &str, span: Span) -> Self {
        Self::MalformedTransformation {
            text: text.to_string(),
            reason: reason.to_string(),
            span,
        }
    }

    pub fn error_code(&self) -> Code {
        match self {
            Self::MissingWithStatement { .. } => codes::apply::MISSING_WITH_STATEMENT,
            Self::MissingAlias { .. } => codes::apply::MISSING_ALIAS,
            Self::UnknownTransformation { .. } => codes::apply::UNKNOWN_TRANSFORMATION,
            Self::UnknownAggregationMethod { .. } => codes::apply::UNKNOWN_AGGREGATION_METHOD,
            Self::UnbalancedParentheses { .. } => codes::apply::UNBALANCED_PARENTHESES,
            Self::UnterminatedString { .. } => codes::apply::UNTERMINATED_STRING,
            Self::MalformedTransformation { .. } => codes::apply::MALFORMED_TRANSFORMATION,
            Self::TooManyTransformations { .. } => codes::apply::TOO_MANY_TRANSFORMATIONS,
            Self::Lexical(error) => error.error_code(),
            Self::Syntax(error) => error.error_code(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::MissingWithStatement { span, .. }
            | Self::MissingAlias { span, .. }
            | Self::UnknownTransformation { span, .. }
            | Self::UnknownAggregationMethod { span, .. }
            | Self::UnbalancedParentheses { span }
            | Self::UnterminatedString { span }
            | Self::MalformedTransformation { span, .. } => Some(*span),
            Self::TooManyTransformations { .. } => None,
            Self::Lexical(error) => Some(error.span()),
            Self::Syntax(error) => error.span(),
        }
    }
}

/// Lift a lexer or parser error found in a substring starting at `offset`
pub(crate) fn at_offset<E: Into<ApplyError>>(offset: usize) -> impl Fn(E) -> ApplyError {
    move |error| match error.into() {
        ApplyError::Lexical(error) => ApplyError::Lexical(error.shifted(offset)),
        ApplyError::Syntax(error) => ApplyError::Syntax(error.shifted(offset)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Position;

    #[test]
    fn test_missing_with_message() {
        let error = ApplyError::MissingWithStatement {
            text: "Amount sum as Total".to_string(),
            span: Span::from_offsets(0, 19),
        };
        assert!(error.to_string().contains("no 'with' statement"));
        assert_eq!(error.error_code(), codes::apply::MISSING_WITH_STATEMENT);
    }

    #[test]
    fn test_wrapped_errors_are_shifted() {
        let syntax = SyntaxError::unexpected_end_of_input("expression", Position::new(3, 1, 4));
        let lifted = at_offset(10)(syntax);
        assert_eq!(lifted.span().map(|span| span.start.offset), Some(13));
        assert_eq!(lifted.error_code(), codes::syntax::UNEXPECTED_END_OF_INPUT);
    }
}
