//! Shared parsing helpers

use crate::grammar::builders::atomic::Parser;
use crate::syntax::{SyntaxError, SyntaxResult};
use crate::tokens::Token;
use crate::utils::Span;

/// Error for the token at the cursor, or end-of-input when there is none
pub fn unexpected_token_error(parser: &dyn Parser, expected: &str) -> SyntaxError {
    match parser.current_token() {
        None | Some(Token::Eof) => {
            SyntaxError::unexpected_end_of_input(expected, parser.current_position())
        }
        Some(token) => SyntaxError::unexpected_token(expected, &token.describe(), parser.current_span()),
    }
}

/// Consume `expected` or fail naming `description`
pub fn expect_token(
    parser: &mut dyn Parser,
    expected: &Token,
    description: &str,
) -> SyntaxResult<Span> {
    match parser.current_token() {
        Some(token) if token == expected => {
            let span = parser.current_span();
            parser.advance();
            Ok(span)
        }
        _ => Err(unexpected_token_error(parser, description)),
    }
}

pub fn expect_identifier(parser: &mut dyn Parser, description: &str) -> SyntaxResult<(String, Span)> {
    match parser.current_token() {
        Some(Token::Identifier(name)) => {
            let name = name.clone();
            let span = parser.current_span();
            parser.advance();
            Ok((name, span))
        }
        _ => Err(unexpected_token_error(parser, description)),
    }
}

/// Consume `expected` when present
pub fn consume_if(parser: &mut dyn Parser, expected: &Token) -> bool {
    if parser.current_token() == Some(expected) {
        parser.advance();
        true
    } else {
        false
    }
}

pub fn check_token(parser: &dyn Parser, expected: &Token) -> bool {
    parser.current_token() == Some(expected)
}

/// item ("," item)*
pub fn parse_comma_separated<T>(
    parser: &mut dyn Parser,
    mut parse_item: impl FnMut(&mut dyn Parser) -> SyntaxResult<T>,
) -> SyntaxResult<Vec<T>> {
    let mut items = vec![parse_item(parser)?];
    while consume_if(parser, &Token::Comma) {
        items.push(parse_item(parser)?);
    }
    Ok(items)
}

/// Fail unless every token has been consumed
pub fn expect_end(parser: &dyn Parser) -> SyntaxResult<()> {
    if parser.is_at_end() {
        Ok(())
    } else {
        Err(unexpected_token_error(parser, "end of input"))
    }
}

/// Run `f` one nesting level deeper
pub fn nested<T>(
    parser: &mut dyn Parser,
    f: impl FnOnce(&mut dyn Parser) -> SyntaxResult<T>,
) -> SyntaxResult<T> {
    parser.enter_nested()?;
    let result = f(parser);
    parser.exit_nested();
    result
}
