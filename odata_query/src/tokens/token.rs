//! Lexical tokens for OData query option text
//!
//! Operator keywords (`eq`, `and`, `has`, ...) are not separate tokens: they
//! lex as identifiers and the parser decides from position whether a word is
//! an operator or a property name. Literals are fully typed at lex time.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed literal value as written in the query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    /// Kept as text; precision is the caller's concern
    Decimal(String),
    String(String),
    Guid(String),
    /// `YYYY-MM-DD`, shape-checked only
    Date(String),
    /// `HH:MM[:SS[.fraction]]`, shape-checked only
    TimeOfDay(String),
    DateTimeOffset(String),
    /// ISO 8601 duration body, without the `duration'...'` wrapper
    Duration(String),
    Binary(Vec<u8>),
    /// `Namespace.EnumType'Member'`
    Enum { type_name: String, value: String },
}

impl LiteralValue {
    /// Edm type name of the literal, `None` for `null`
    pub fn edm_type_name(&self) -> Option<&str> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some("Edm.Boolean"),
            Self::Int32(_) => Some("Edm.Int32"),
            Self::Int64(_) => Some("Edm.Int64"),
            Self::Single(_) => Some("Edm.Single"),
            Self::Double(_) => Some("Edm.Double"),
            Self::Decimal(_) => Some("Edm.Decimal"),
            Self::String(_) => Some("Edm.String"),
            Self::Guid(_) => Some("Edm.Guid"),
            Self::Date(_) => Some("Edm.Date"),
            Self::TimeOfDay(_) => Some("Edm.TimeOfDay"),
            Self::DateTimeOffset(_) => Some("Edm.DateTimeOffset"),
            Self::Duration(_) => Some("Edm.Duration"),
            Self::Binary(_) => Some("Edm.Binary"),
            Self::Enum { type_name, .. } => Some(type_name),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int32(_) | Self::Int64(_) | Self::Single(_) | Self::Double(_) | Self::Decimal(_)
        )
    }

    /// Negate a numeric literal, used when folding `-` into the literal
    pub fn negated(&self) -> Option<Self> {
        match self {
            Self::Int32(v) => v.checked_neg().map(Self::Int32),
            Self::Int64(v) => v.checked_neg().map(Self::Int64),
            Self::Single(v) => Some(Self::Single(-v)),
            Self::Double(v) => Some(Self::Double(-v)),
            Self::Decimal(v) => Some(Self::Decimal(match v.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{}", v),
            })),
            Self::Duration(v) => Some(Self::Duration(match v.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{}", v),
            })),
            _ => None,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}L", v),
            Self::Single(v) => write!(f, "{}f", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}M", v),
            Self::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Self::Guid(v) | Self::Date(v) | Self::TimeOfDay(v) | Self::DateTimeOffset(v) => {
                write!(f, "{}", v)
            }
            Self::Duration(v) => write!(f, "duration'{}'", v),
            Self::Binary(bytes) => {
                write!(f, "X'")?;
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'")
            }
            Self::Enum { type_name, value } => write!(f, "{}'{}'", type_name, value),
        }
    }
}

/// Token classification used by metrics and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Identifier,
    Literal,
    Punctuation,
    Whitespace,
    Special,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// Simple identifier, including `$`-prefixed system names and operator words
    Identifier(String),
    /// `@name` parameter alias
    ParameterAlias(String),
    Literal { value: LiteralValue, text: String },

    OpenParen,
    CloseParen,
    Comma,
    Colon,
    Minus,
    Slash,
    Question,
    Dot,
    Star,
    Semicolon,
    Equals,

    Whitespace,
    Eof,
}

impl Token {
    pub fn class(&self) -> TokenClass {
        match self {
            Self::Identifier(_) | Self::ParameterAlias(_) => TokenClass::Identifier,
            Self::Literal { .. } => TokenClass::Literal,
            Self::Whitespace => TokenClass::Whitespace,
            Self::Eof => TokenClass::Special,
            _ => TokenClass::Punctuation,
        }
    }

    /// Whitespace is kept in the stream for span accuracy but skipped by the parser
    pub fn is_significant(&self) -> bool {
        !matches!(self, Self::Whitespace)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// True when this is the identifier `word`, optionally ignoring ASCII case
    pub fn is_word(&self, word: &str, case_insensitive: bool) -> bool {
        match self {
            Self::Identifier(name) if case_insensitive => name.eq_ignore_ascii_case(word),
            Self::Identifier(name) => name == word,
            _ => false,
        }
    }

    /// Source-like rendering for error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => name.clone(),
            Self::ParameterAlias(name) => format!("@{}", name),
            Self::Literal { text, .. } => text.clone(),
            Self::OpenParen => "(".to_string(),
            Self::CloseParen => ")".to_string(),
            Self::Comma => ",".to_string(),
            Self::Colon => ":".to_string(),
            Self::Minus => "-".to_string(),
            Self::Slash => "/".to_string(),
            Self::Question => "?".to_string(),
            Self::Dot => ".".to_string(),
            Self::Star => "*".to_string(),
            Self::Semicolon => ";".to_string(),
            Self::Equals => "=".to_string(),
            Self::Whitespace => "whitespace".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Map a single punctuation character to its token
pub fn classify_punctuation(ch: char) -> Option<Token> {
    match ch {
        '(' => Some(Token::OpenParen),
        ')' => Some(Token::CloseParen),
        ',' => Some(Token::Comma),
        ':' => Some(Token::Colon),
        '-' => Some(Token::Minus),
        '/' => Some(Token::Slash),
        '?' => Some(Token::Question),
        '.' => Some(Token::Dot),
        '*' => Some(Token::Star),
        ';' => Some(Token::Semicolon),
        '=' => Some(Token::Equals),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_type_names() {
        assert_eq!(LiteralValue::Int32(1).edm_type_name(), Some("Edm.Int32"));
        assert_eq!(LiteralValue::Null.edm_type_name(), None);
        let color = LiteralValue::Enum {
            type_name: "Sales.Color".to_string(),
            value: "Red".to_string(),
        };
        assert_eq!(color.edm_type_name(), Some("Sales.Color"));
    }

    #[test]
    fn test_literal_display_escapes_quotes() {
        let literal = LiteralValue::String("O'Neil".to_string());
        assert_eq!(literal.to_string(), "'O''Neil'");
        assert_eq!(LiteralValue::Binary(vec![0x0a, 0xff]).to_string(), "X'0AFF'");
    }

    #[test]
    fn test_negation() {
        assert_eq!(LiteralValue::Int32(5).negated(), Some(LiteralValue::Int32(-5)));
        assert_eq!(LiteralValue::Int32(i32::MIN).negated(), None);
        assert_eq!(
            LiteralValue::Decimal("-1.5".to_string()).negated(),
            Some(LiteralValue::Decimal("1.5".to_string()))
        );
        assert_eq!(LiteralValue::Boolean(true).negated(), None);
    }

    #[test]
    fn test_word_matching() {
        let token = Token::Identifier("EQ".to_string());
        assert!(token.is_word("eq", true));
        assert!(!token.is_word("eq", false));
        assert!(!Token::Comma.is_word(",", true));
    }

    #[test]
    fn test_punctuation_table() {
        for ch in ['(', ')', ',', ':', '-', '/', '?', '.', '*', ';', '='] {
            let token = classify_punctuation(ch).unwrap();
            assert_eq!(token.describe(), ch.to_string());
            assert_eq!(token.class(), TokenClass::Punctuation);
        }
        assert!(classify_punctuation('#').is_none());
    }
}
