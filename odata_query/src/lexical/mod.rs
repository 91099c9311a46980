//! Lexical analysis of OData query option text
//!
//! Expression-grammar options (`$filter`, `$orderby`, `$select`, `$expand`,
//! `$apply` fragments and resource paths) share one tokenizer. `$search`
//! has its own word rules and its own entry point.

pub mod analyzer;
pub(crate) mod literals;
pub mod search;

use crate::config::compile_time::lexical::*;
use crate::config::runtime::LexicalPreferences;
use crate::tokens::{Token, TokenStream};

pub use analyzer::{LexError, LexicalAnalyzer, LexicalMetrics};
pub use search::tokenize_search;

/// Tokenize with default preferences
pub fn tokenize(text: &str) -> Result<TokenStream, LexError> {
    LexicalAnalyzer::new().tokenize(text)
}

pub fn tokenize_with_preferences(
    text: &str,
    preferences: LexicalPreferences,
) -> Result<TokenStream, LexError> {
    LexicalAnalyzer::with_preferences(preferences).tokenize(text)
}

/// Reject a limit set that would make every query fail
pub fn validate_tokenization() -> Result<(), String> {
    let codes = [
        crate::logging::codes::lexical::INVALID_CHARACTER,
        crate::logging::codes::lexical::UNTERMINATED_LITERAL,
        crate::logging::codes::lexical::INVALID_LITERAL,
        crate::logging::codes::lexical::NUMBER_OUT_OF_RANGE,
        crate::logging::codes::lexical::IDENTIFIER_TOO_LONG,
        crate::logging::codes::lexical::STRING_TOO_LARGE,
        crate::logging::codes::lexical::QUERY_TOO_LONG,
        crate::logging::codes::lexical::TOO_MANY_TOKENS,
    ];

    for code in &codes {
        if crate::logging::codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!(
                "Lexical error code {} not found in metadata registry",
                code.as_str()
            ));
        }
    }

    if MAX_QUERY_LENGTH == 0 || MAX_IDENTIFIER_LENGTH == 0 || MAX_TOKEN_COUNT == 0 {
        return Err("Lexical limits cannot be zero".to_string());
    }
    if MAX_STRING_LITERAL_SIZE > MAX_QUERY_LENGTH {
        return Err("MAX_STRING_LITERAL_SIZE exceeds MAX_QUERY_LENGTH".to_string());
    }

    Ok(())
}

/// Token distribution of a stream
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TokenCounts {
    pub total: usize,
    pub identifiers: usize,
    pub literals: usize,
    pub punctuation: usize,
    pub whitespace: usize,
}

impl TokenCounts {
    pub fn significant_tokens(&self) -> usize {
        self.total - self.whitespace
    }
}

pub fn get_token_counts(token_stream: &TokenStream) -> TokenCounts {
    let mut counts = TokenCounts::default();

    for token in token_stream.all_tokens() {
        match &token.value {
            Token::Eof => continue,
            Token::Identifier(_) | Token::ParameterAlias(_) => counts.identifiers += 1,
            Token::Literal { .. } => counts.literals += 1,
            Token::Whitespace => counts.whitespace += 1,
            _ => counts.punctuation += 1,
        }
        counts.total += 1;
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tokenization() {
        assert!(validate_tokenization().is_ok());
    }

    #[test]
    fn test_token_counts() {
        let stream = tokenize("contains(Name, 'ab') and Price lt 10.5").unwrap();
        let counts = get_token_counts(&stream);
        assert_eq!(counts.identifiers, 5);
        assert_eq!(counts.literals, 2);
        assert_eq!(counts.punctuation, 3);
        assert_eq!(counts.significant_tokens(), 10);
    }

    #[test]
    fn test_preferences_are_kept() {
        let preferences = LexicalPreferences {
            collect_detailed_metrics: true,
            ..Default::default()
        };
        let analyzer = LexicalAnalyzer::with_preferences(preferences);
        assert!(analyzer.preferences().collect_detailed_metrics);
    }
}
