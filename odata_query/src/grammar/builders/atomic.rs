//! Parser trait and the smallest productions
//!
//! Builders only see the [`Parser`] trait, so they can be driven by any
//! cursor that provides span tracking, nesting limits and lambda scopes.

use crate::grammar::ast::nodes::*;
use crate::grammar::builders::helpers::{expect_identifier, unexpected_token_error};
use crate::grammar::keywords::BinaryOperatorKind;
use crate::syntax::{SyntaxError, SyntaxResult};
use crate::tokens::{LiteralValue, Token};
use crate::utils::{Position, Span};

pub trait Parser {
    // === NAVIGATION ===
    fn current_token(&self) -> Option<&Token>;
    /// Significant token `n` places after the current one
    fn peek_token(&self, n: usize) -> Option<&Token>;
    fn advance(&mut self);
    fn position(&self) -> usize;

    // === SPAN REPORTING ===
    fn current_span(&self) -> Span;
    /// From the token at `start` through the last consumed token
    fn span_from(&self, start: usize) -> Span;

    // === NESTING ===
    /// Fails once the configured depth is exceeded
    fn enter_nested(&mut self) -> SyntaxResult<()>;
    fn exit_nested(&mut self);

    // === LAMBDA SCOPES ===
    fn push_range_variable(&mut self, name: String);
    fn pop_range_variable(&mut self);
    fn is_range_variable(&self, name: &str) -> bool;

    fn case_insensitive_keywords(&self) -> bool;

    fn current_position(&self) -> Position {
        self.current_span().start
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), None | Some(Token::Eof))
    }
}

/// Binary operator at the cursor, without consuming it
pub fn peek_binary_operator(parser: &dyn Parser) -> Option<BinaryOperatorKind> {
    match parser.current_token() {
        Some(Token::Identifier(word)) => {
            BinaryOperatorKind::from_word(word, parser.case_insensitive_keywords())
        }
        _ => None,
    }
}

/// True when the cursor is on the word `word`, honoring keyword case preferences
pub fn at_word(parser: &dyn Parser, word: &str) -> bool {
    parser
        .current_token()
        .is_some_and(|token| token.is_word(word, parser.case_insensitive_keywords()))
}

/// literal ::= any typed literal token
pub fn parse_literal(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    match parser.current_token() {
        Some(Token::Literal { value, text }) => {
            let token = QueryToken::Literal {
                value: value.clone(),
                text: text.clone(),
                span: parser.current_span(),
            };
            parser.advance();
            Ok(token)
        }
        _ => Err(unexpected_token_error(parser, "literal")),
    }
}

/// qualified_name ::= identifier ("." identifier)*
pub fn parse_qualified_name(parser: &mut dyn Parser) -> SyntaxResult<(String, Span)> {
    let start = parser.position();
    let (mut name, _) = expect_identifier(parser, "identifier")?;

    while matches!(parser.current_token(), Some(Token::Dot))
        && matches!(parser.peek_token(1), Some(Token::Identifier(_)))
    {
        parser.advance();
        let (part, _) = expect_identifier(parser, "identifier after '.'")?;
        name.push('.');
        name.push_str(&part);
    }

    Ok((name, parser.span_from(start)))
}

/// Non-negative integer literal, as used by `$top`, `$skip` and `$levels`
pub fn parse_non_negative_integer(parser: &mut dyn Parser, option: &str) -> SyntaxResult<i64> {
    let value = match parser.current_token() {
        Some(Token::Literal {
            value: LiteralValue::Int32(v),
            ..
        }) => i64::from(*v),
        Some(Token::Literal {
            value: LiteralValue::Int64(v),
            ..
        }) => *v,
        Some(Token::Literal { text, .. }) => {
            return Err(SyntaxError::invalid_option_value(
                option,
                text,
                "expected a non-negative integer",
            ))
        }
        _ => return Err(unexpected_token_error(parser, "integer")),
    };

    if value < 0 {
        return Err(SyntaxError::invalid_option_value(
            option,
            &value.to_string(),
            "must be non-negative",
        ));
    }

    parser.advance();
    Ok(value)
}

pub fn parse_boolean(parser: &mut dyn Parser, option: &str) -> SyntaxResult<bool> {
    match parser.current_token() {
        Some(Token::Literal {
            value: LiteralValue::Boolean(v),
            ..
        }) => {
            let value = *v;
            parser.advance();
            Ok(value)
        }
        Some(Token::Literal { text, .. }) => Err(SyntaxError::invalid_option_value(
            option,
            text,
            "expected true or false",
        )),
        _ => Err(unexpected_token_error(parser, "true or false")),
    }
}
