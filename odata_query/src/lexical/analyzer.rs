//! Core lexical analyzer
//!
//! Scans a whole query option string in one pass into a [`TokenStream`].
//! Any lexical error aborts the scan: there is no partial token stream.

use super::literals::{self, ScanFailure, Scanned};
use crate::config::compile_time::lexical::*;
use crate::config::runtime::LexicalPreferences;
use crate::logging::codes;
use crate::tokens::{classify_punctuation, LiteralValue, Token, TokenStream};
use crate::utils::{Position, Span, Spanned};
use crate::{log_debug, log_error, log_success};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated {kind} literal starting at {position}")]
    UnterminatedLiteral { kind: String, position: Position },

    #[error("Invalid character '{character}' at {position}")]
    InvalidCharacter { character: char, position: Position },

    #[error("Invalid {kind} literal '{text}' at {position}")]
    InvalidLiteral {
        kind: String,
        text: String,
        position: Position,
    },

    #[error("Numeric literal '{text}' is out of range at {position}")]
    NumberOutOfRange { text: String, position: Position },

    #[error("Query text too long: {length} bytes (max {MAX_QUERY_LENGTH})")]
    QueryTooLong { length: usize, position: Position },

    #[error("Identifier too long: {length} characters (max {MAX_IDENTIFIER_LENGTH}) at {position}")]
    IdentifierTooLong { length: usize, position: Position },

    #[error("String literal too large: {size} bytes (max {MAX_STRING_LITERAL_SIZE}) at {position}")]
    StringTooLarge { size: usize, position: Position },

    #[error("Too many tokens: {count} (max {MAX_TOKEN_COUNT})")]
    TooManyTokens { count: usize, position: Position },
}

impl LexError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LexError::UnterminatedLiteral { .. } => codes::lexical::UNTERMINATED_LITERAL,
            LexError::InvalidCharacter { .. } => codes::lexical::INVALID_CHARACTER,
            LexError::InvalidLiteral { .. } => codes::lexical::INVALID_LITERAL,
            LexError::NumberOutOfRange { .. } => codes::lexical::NUMBER_OUT_OF_RANGE,
            LexError::QueryTooLong { .. } => codes::lexical::QUERY_TOO_LONG,
            LexError::IdentifierTooLong { .. } => codes::lexical::IDENTIFIER_TOO_LONG,
            LexError::StringTooLarge { .. } => codes::lexical::STRING_TOO_LARGE,
            LexError::TooManyTokens { .. } => codes::lexical::TOO_MANY_TOKENS,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedLiteral { position, .. }
            | LexError::InvalidCharacter { position, .. }
            | LexError::InvalidLiteral { position, .. }
            | LexError::NumberOutOfRange { position, .. }
            | LexError::QueryTooLong { position, .. }
            | LexError::IdentifierTooLong { position, .. }
            | LexError::StringTooLarge { position, .. }
            | LexError::TooManyTokens { position, .. } => *position,
        }
    }

    pub fn span(&self) -> Span {
        Span::at(self.position())
    }

    /// Same error, moved right by `delta` bytes. Used when a fragment of a
    /// larger option string (an `$apply` segment) is lexed on its own.
    pub fn shifted(self, delta: usize) -> Self {
        match self {
            LexError::UnterminatedLiteral { kind, position } => LexError::UnterminatedLiteral {
                kind,
                position: position.shifted(delta),
            },
            LexError::InvalidCharacter {
                character,
                position,
            } => LexError::InvalidCharacter {
                character,
                position: position.shifted(delta),
            },
            LexError::InvalidLiteral {
                kind,
                text,
                position,
            } => LexError::InvalidLiteral {
                kind,
                text,
                position: position.shifted(delta),
            },
            LexError::NumberOutOfRange { text, position } => LexError::NumberOutOfRange {
                text,
                position: position.shifted(delta),
            },
            LexError::QueryTooLong { length, position } => LexError::QueryTooLong {
                length,
                position: position.shifted(delta),
            },
            LexError::IdentifierTooLong { length, position } => LexError::IdentifierTooLong {
                length,
                position: position.shifted(delta),
            },
            LexError::StringTooLarge { size, position } => LexError::StringTooLarge {
                size,
                position: position.shifted(delta),
            },
            LexError::TooManyTokens { count, position } => LexError::TooManyTokens {
                count,
                position: position.shifted(delta),
            },
        }
    }

    fn from_scan(failure: ScanFailure, position: Position) -> Self {
        match failure {
            ScanFailure::Unterminated { kind } => LexError::UnterminatedLiteral {
                kind: kind.to_string(),
                position,
            },
            ScanFailure::Invalid { kind, text } => LexError::InvalidLiteral {
                kind: kind.to_string(),
                text,
                position,
            },
            ScanFailure::OutOfRange { text } => LexError::NumberOutOfRange { text, position },
            ScanFailure::TooLarge { size } => LexError::StringTooLarge { size, position },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LexicalMetrics {
    pub total_tokens: usize,
    pub identifier_tokens: usize,
    pub literal_tokens: usize,
    pub punctuation_tokens: usize,
    pub whitespace_tokens: usize,
    pub max_string_length: usize,
    /// Literal counts keyed by Edm type name, filled when detailed metrics are on
    pub literal_kinds: std::collections::BTreeMap<String, usize>,
}

impl LexicalMetrics {
    pub(crate) fn record_token(&mut self, token: &Token, preferences: &LexicalPreferences) {
        match token {
            Token::Whitespace => {
                if preferences.include_whitespace_in_counts {
                    self.whitespace_tokens += 1;
                    self.total_tokens += 1;
                }
                return;
            }
            Token::Identifier(_) | Token::ParameterAlias(_) => self.identifier_tokens += 1,
            Token::Literal { value, .. } => {
                self.literal_tokens += 1;
                if let LiteralValue::String(content) = value {
                    self.max_string_length = self.max_string_length.max(content.len());
                }
                if preferences.collect_detailed_metrics {
                    let kind = value.edm_type_name().unwrap_or("null").to_string();
                    *self.literal_kinds.entry(kind).or_insert(0) += 1;
                }
            }
            Token::Eof => return,
            _ => self.punctuation_tokens += 1,
        }
        self.total_tokens += 1;
    }
}

/// Byte cursor that keeps a line/column position in step
struct Scanner<'a> {
    text: &'a str,
    offset: usize,
    position: Position,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            offset: 0,
            position: Position::start(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self, len: usize) -> &'a str {
        let end = (self.offset + len).min(self.text.len());
        let consumed = &self.text[self.offset..end];
        self.position = self.position.advance_str(consumed);
        self.offset = end;
        consumed
    }

    fn word_len(&self) -> usize {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, ch)) if is_identifier_start(ch) => {}
            _ => return 0,
        }
        chars
            .find(|(_, ch)| !is_identifier_part(*ch))
            .map(|(i, _)| i)
            .unwrap_or(rest.len())
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

pub struct LexicalAnalyzer {
    metrics: LexicalMetrics,
    preferences: LexicalPreferences,
}

impl LexicalAnalyzer {
    pub fn new() -> Self {
        Self::with_preferences(LexicalPreferences::default())
    }

    pub fn with_preferences(preferences: LexicalPreferences) -> Self {
        Self {
            metrics: LexicalMetrics::default(),
            preferences,
        }
    }

    pub fn preferences(&self) -> &LexicalPreferences {
        &self.preferences
    }

    pub fn metrics(&self) -> &LexicalMetrics {
        &self.metrics
    }

    /// Tokenize an expression-grammar query option
    pub fn tokenize(&mut self, text: &str) -> Result<TokenStream, LexError> {
        self.metrics = LexicalMetrics::default();

        log_debug!("Starting lexical analysis",
            "length" => text.len(),
            "max_tokens_allowed" => MAX_TOKEN_COUNT
        );

        if text.len() > MAX_QUERY_LENGTH {
            let error = LexError::QueryTooLong {
                length: text.len(),
                position: Position::start(),
            };
            log_error!(error.error_code(), "Query text exceeds limit",
                "length" => text.len(),
                "limit" => MAX_QUERY_LENGTH
            );
            return Err(error);
        }

        let mut scanner = Scanner::new(text);
        let mut tokens = Vec::new();

        while let Some(ch) = scanner.peek() {
            if tokens.len() >= MAX_TOKEN_COUNT {
                let error = LexError::TooManyTokens {
                    count: tokens.len(),
                    position: scanner.position,
                };
                self.log_failure(&error);
                return Err(error);
            }

            let start = scanner.position;
            let token = match self.scan_token(&mut scanner, ch) {
                Ok(token) => token,
                Err(error) => {
                    self.log_failure(&error);
                    return Err(error);
                }
            };

            self.metrics.record_token(&token, &self.preferences);
            tokens.push(Spanned::new(token, Span::new(start, scanner.position)));
        }

        tokens.push(Spanned::new(Token::Eof, Span::at(scanner.position)));

        log_success!(codes::success::TOKENIZATION_COMPLETE, "Tokenization completed",
            "tokens" => self.metrics.total_tokens,
            "literals" => self.metrics.literal_tokens
        );

        Ok(TokenStream::new(tokens))
    }

    fn log_failure(&self, error: &LexError) {
        let message = self.failure_message(error);
        if self.preferences.include_position_in_errors {
            log_error!(error.error_code(), &message, span = error.span());
        } else {
            log_error!(error.error_code(), &message);
        }
    }

    /// Log text for a failure, without line and column unless the
    /// preferences ask for them
    pub(crate) fn failure_message(&self, error: &LexError) -> String {
        if self.preferences.include_position_in_errors {
            error.to_string()
        } else {
            format!(
                "Lexical analysis failed: {}",
                codes::get_description(error.error_code().as_str())
            )
        }
    }

    fn scan_token(&mut self, scanner: &mut Scanner<'_>, ch: char) -> Result<Token, LexError> {
        let start = scanner.position;

        if is_whitespace(ch) {
            let len = scanner
                .rest()
                .find(|c: char| !is_whitespace(c))
                .unwrap_or(scanner.rest().len());
            scanner.bump(len);
            return Ok(Token::Whitespace);
        }

        if ch == '\'' {
            return self.literal_token(scanner, literals::scan_string(scanner.rest()), start);
        }

        if ch.is_ascii_digit()
            || (ch == '-' && scanner.peek_second().is_some_and(|c| c.is_ascii_digit()))
        {
            return self.literal_token(
                scanner,
                literals::scan_digit_literal(scanner.rest()),
                start,
            );
        }

        if ch == '-' && scanner.rest().starts_with("-INF") {
            let after = scanner.rest()[4..].chars().next();
            if !after.is_some_and(is_identifier_part) {
                let text = scanner.bump(4).to_string();
                return Ok(Token::Literal {
                    value: LiteralValue::Double(f64::NEG_INFINITY),
                    text,
                });
            }
        }

        if ch == '@' {
            scanner.bump(1);
            let len = scanner.word_len();
            if len == 0 {
                return Err(LexError::InvalidCharacter {
                    character: '@',
                    position: start,
                });
            }
            let name = scanner.bump(len).to_string();
            return Ok(Token::ParameterAlias(name));
        }

        if is_identifier_start(ch) {
            if ch.is_ascii_hexdigit() {
                if let Some(found) = literals::scan_guid(scanner.rest()) {
                    return self.literal_token(scanner, Ok(found), start);
                }
            }

            let len = scanner.word_len();
            if len > MAX_IDENTIFIER_LENGTH {
                return Err(LexError::IdentifierTooLong {
                    length: len,
                    position: start,
                });
            }

            if let Some(scanned) = literals::scan_word_literal(scanner.rest(), len) {
                return self.literal_token(scanner, scanned, start);
            }

            let word = scanner.bump(len).to_string();
            return Ok(Token::Identifier(word));
        }

        match classify_punctuation(ch) {
            Some(token) => {
                scanner.bump(ch.len_utf8());
                Ok(token)
            }
            None => Err(LexError::InvalidCharacter {
                character: ch,
                position: start,
            }),
        }
    }

    fn literal_token(
        &mut self,
        scanner: &mut Scanner<'_>,
        scanned: Scanned,
        start: Position,
    ) -> Result<Token, LexError> {
        let (value, len) = scanned.map_err(|failure| LexError::from_scan(failure, start))?;
        let text = scanner.bump(len).to_string();
        Ok(Token::Literal { value, text })
    }
}

impl Default for LexicalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
