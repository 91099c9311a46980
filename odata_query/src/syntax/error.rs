//! Syntax errors
//!
//! Grammar violations are fatal: the parser stops at the first one and
//! reports what it expected, what it found, and where.

use crate::logging::{codes, Code};
use crate::utils::{Position, Span};

pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Unexpected token: expected {expected}, found '{found}' at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of input: expected {expected} at {position}")]
    UnexpectedEndOfInput { expected: String, position: Position },

    #[error("Empty expression at {span}")]
    EmptyExpression { span: Span },

    #[error("Maximum recursion depth exceeded at {span}")]
    MaxRecursionDepth { span: Span },

    #[error("Unknown query option '{name}' at {span}")]
    UnknownQueryOption { name: String, span: Span },

    #[error("Invalid value '{value}' for {option}: {reason}")]
    InvalidQueryOptionValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("Too many arguments: {count} at {span}")]
    TooManyArguments { count: usize, span: Span },
}

impl SyntaxError {
    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        Self::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            span,
        }
    }

    pub fn unexpected_end_of_input(expected: &str, position: Position) -> Self {
        Self::UnexpectedEndOfInput {
            expected: expected.to_string(),
            position,
        }
    }

    pub fn invalid_option_value(option: &str, value: &str, reason: &str) -> Self {
        Self::InvalidQueryOptionValue {
            option: option.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> Code {
        match self {
            Self::UnexpectedToken { .. } => codes::syntax::UNEXPECTED_TOKEN,
            Self::UnexpectedEndOfInput { .. } => codes::syntax::UNEXPECTED_END_OF_INPUT,
            Self::EmptyExpression { .. } => codes::syntax::EMPTY_EXPRESSION,
            Self::MaxRecursionDepth { .. } => codes::syntax::MAX_RECURSION_DEPTH,
            Self::UnknownQueryOption { .. } => codes::syntax::UNKNOWN_QUERY_OPTION,
            Self::InvalidQueryOptionValue { .. } => codes::syntax::INVALID_QUERY_OPTION_VALUE,
            Self::TooManyArguments { .. } => codes::syntax::TOO_MANY_ARGUMENTS,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. }
            | Self::EmptyExpression { span }
            | Self::MaxRecursionDepth { span }
            | Self::UnknownQueryOption { span, .. }
            | Self::TooManyArguments { span, .. } => Some(*span),
            Self::UnexpectedEndOfInput { position, .. } => Some(Span::at(*position)),
            Self::InvalidQueryOptionValue { .. } => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.span().map(|span| span.start)
    }

    /// Same error, moved right by `delta` bytes
    pub fn shifted(self, delta: usize) -> Self {
        match self {
            Self::UnexpectedToken {
                expected,
                found,
                span,
            } => Self::UnexpectedToken {
                expected,
                found,
                span: span.shifted(delta),
            },
            Self::UnexpectedEndOfInput { expected, position } => Self::UnexpectedEndOfInput {
                expected,
                position: position.shifted(delta),
            },
            Self::EmptyExpression { span } => Self::EmptyExpression {
                span: span.shifted(delta),
            },
            Self::MaxRecursionDepth { span } => Self::MaxRecursionDepth {
                span: span.shifted(delta),
            },
            Self::UnknownQueryOption { name, span } => Self::UnknownQueryOption {
                name,
                span: span.shifted(delta),
            },
            Self::TooManyArguments { count, span } => Self::TooManyArguments {
                count,
                span: span.shifted(delta),
            },
            other @ Self::InvalidQueryOptionValue { .. } => other,
        }
    }

    pub fn requires_halt(&self) -> bool {
        matches!(self, Self::MaxRecursionDepth { .. })
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.error_code().as_str())
    }

    pub fn recommended_action(&self) -> &'static str {
        codes::get_action(self.error_code().as_str())
    }

    /// Message with the recommended action appended
    pub fn enhanced_message(&self) -> String {
        match self {
            Self::UnexpectedToken {
                expected, found, ..
            } => format!(
                "Expected {} but found '{}'. {}",
                expected,
                found,
                self.recommended_action()
            ),
            Self::UnexpectedEndOfInput { expected, .. } => format!(
                "Unexpected end of input while expecting {}. {}",
                expected,
                self.recommended_action()
            ),
            _ => format!("{}. {}", self, self.recommended_action()),
        }
    }
}
