//! Builders for the list-shaped query options and resource paths
//!
//! ```text
//! orderby   ::= orderby_item ("," orderby_item)*
//! select    ::= select_item ("," select_item)*
//! expand    ::= expand_term ("," expand_term)*
//! expand_term ::= (path | "*") [ "(" nested_option (";" nested_option)* ")" ]
//! search    ::= search_or
//! path      ::= ["/"] segment ("/" segment)*
//! ```

use crate::config::compile_time::expand::{MAX_EXPAND_DEPTH, MAX_SELECT_ITEMS};
use crate::grammar::ast::nodes::*;
use crate::grammar::builders::atomic::{
    parse_boolean, parse_non_negative_integer, parse_qualified_name, Parser,
};
use crate::grammar::builders::expressions::{
    parse_expression, parse_path_continuation, parse_segment,
};
use crate::grammar::builders::helpers::{
    check_token, consume_if, expect_token, nested, parse_comma_separated, unexpected_token_error,
};
use crate::grammar::keywords::{
    search, BinaryOperatorKind, OrderDirection, QueryOptionKind, UnaryOperatorKind,
};
use crate::syntax::{SyntaxError, SyntaxResult};
use crate::tokens::{LiteralValue, Token};

// === $orderby ===

pub fn parse_orderby(parser: &mut dyn Parser) -> SyntaxResult<OrderByToken> {
    let start = parser.position();
    let items = parse_comma_separated(parser, parse_orderby_item)?;
    Ok(OrderByToken {
        items,
        span: parser.span_from(start),
    })
}

fn parse_orderby_item(parser: &mut dyn Parser) -> SyntaxResult<OrderByItem> {
    let start = parser.position();
    let expression = parse_expression(parser)?;

    let direction = match parser.current_token() {
        Some(Token::Identifier(word)) => {
            match OrderDirection::from_word(word, parser.case_insensitive_keywords()) {
                Some(direction) => {
                    parser.advance();
                    direction
                }
                None => return Err(unexpected_token_error(parser, "'asc', 'desc', ',' or end")),
            }
        }
        _ => OrderDirection::Ascending,
    };

    Ok(OrderByItem {
        expression,
        direction,
        span: parser.span_from(start),
    })
}

// === $select ===

pub fn parse_select(parser: &mut dyn Parser) -> SyntaxResult<SelectToken> {
    let start = parser.position();
    let items = parse_comma_separated(parser, parse_select_item)?;

    if items.len() > MAX_SELECT_ITEMS {
        return Err(SyntaxError::invalid_option_value(
            QueryOptionKind::Select.as_str(),
            &format!("{} items", items.len()),
            &format!("at most {} items are allowed", MAX_SELECT_ITEMS),
        ));
    }

    Ok(SelectToken {
        items,
        span: parser.span_from(start),
    })
}

/// select_item ::= "*" | qualified_name "." "*" | segment ("/" segment)*
fn parse_select_item(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    if check_token(parser, &Token::Star) {
        let span = parser.current_span();
        parser.advance();
        return Ok(QueryToken::Star {
            namespace: None,
            span,
        });
    }

    let mut current: Option<QueryToken> = None;
    loop {
        let start = parser.position();
        let (name, name_span) = parse_qualified_name(parser)?;

        if check_token(parser, &Token::Dot) && matches!(parser.peek_token(1), Some(Token::Star)) {
            parser.advance();
            parser.advance();
            if current.is_some() {
                return Err(SyntaxError::unexpected_token(
                    "property path",
                    &format!("{}.*", name),
                    parser.span_from(start),
                ));
            }
            return Ok(QueryToken::Star {
                namespace: Some(name),
                span: parser.span_from(start),
            });
        }

        let next = current.take().map(Box::new);
        current = Some(if name.contains('.') {
            QueryToken::DottedIdentifier {
                identifier: name,
                next,
                span: name_span,
            }
        } else {
            QueryToken::EndPath {
                identifier: name,
                next,
                span: name_span,
            }
        });

        if !consume_if(parser, &Token::Slash) {
            break;
        }
    }

    current.ok_or_else(|| unexpected_token_error(parser, "select item"))
}

// === $expand ===

pub fn parse_expand(parser: &mut dyn Parser) -> SyntaxResult<ExpandToken> {
    parse_expand_at_depth(parser, 1)
}

fn parse_expand_at_depth(parser: &mut dyn Parser, depth: usize) -> SyntaxResult<ExpandToken> {
    if depth > MAX_EXPAND_DEPTH {
        return Err(SyntaxError::MaxRecursionDepth {
            span: parser.current_span(),
        });
    }

    let start = parser.position();
    let terms = parse_comma_separated(parser, |parser| parse_expand_term(parser, depth))?;
    Ok(ExpandToken {
        terms,
        span: parser.span_from(start),
    })
}

fn parse_expand_term(parser: &mut dyn Parser, depth: usize) -> SyntaxResult<QueryToken> {
    let start = parser.position();

    let path = if check_token(parser, &Token::Star) {
        let span = parser.current_span();
        parser.advance();
        QueryToken::Star {
            namespace: None,
            span,
        }
    } else {
        let first = parse_navigation_segment(parser, None)?;
        let mut current = first;
        while consume_if(parser, &Token::Slash) {
            current = parse_navigation_segment(parser, Some(current))?;
        }
        current
    };

    let mut options = ExpandOptions::default();
    if consume_if(parser, &Token::OpenParen) {
        loop {
            parse_expand_option(parser, &mut options, depth)?;
            if !consume_if(parser, &Token::Semicolon) {
                break;
            }
        }
        expect_token(parser, &Token::CloseParen, "';' or ')'")?;
    }

    Ok(QueryToken::ExpandTerm(ExpandTermToken {
        path: Box::new(path),
        options,
        span: parser.span_from(start),
    }))
}

/// Expand paths carry no key lookups or function calls
fn parse_navigation_segment(
    parser: &mut dyn Parser,
    parent: Option<QueryToken>,
) -> SyntaxResult<QueryToken> {
    let (name, span) = parse_qualified_name(parser)?;
    let next = parent.map(Box::new);
    Ok(if name.contains('.') {
        QueryToken::DottedIdentifier {
            identifier: name,
            next,
            span,
        }
    } else {
        QueryToken::EndPath {
            identifier: name,
            next,
            span,
        }
    })
}

fn parse_expand_option(
    parser: &mut dyn Parser,
    options: &mut ExpandOptions,
    depth: usize,
) -> SyntaxResult<()> {
    let (name, span) = match parser.current_token() {
        Some(Token::Identifier(name)) => (name.clone(), parser.current_span()),
        _ => return Err(unexpected_token_error(parser, "nested query option")),
    };

    let kind = QueryOptionKind::from_name(&name)
        .filter(|kind| kind.allowed_in_expand())
        .ok_or_else(|| SyntaxError::UnknownQueryOption {
            name: name.clone(),
            span,
        })?;
    parser.advance();
    expect_token(parser, &Token::Equals, "'='")?;

    let duplicate = || {
        SyntaxError::invalid_option_value(kind.as_str(), &name, "specified more than once")
    };

    match kind {
        QueryOptionKind::Filter => {
            if options.filter.is_some() {
                return Err(duplicate());
            }
            options.filter = Some(Box::new(parse_expression(parser)?));
        }
        QueryOptionKind::OrderBy => {
            if options.orderby.is_some() {
                return Err(duplicate());
            }
            options.orderby = Some(parse_orderby(parser)?);
        }
        QueryOptionKind::Select => {
            if options.select.is_some() {
                return Err(duplicate());
            }
            options.select = Some(parse_select(parser)?);
        }
        QueryOptionKind::Expand => {
            if options.expand.is_some() {
                return Err(duplicate());
            }
            options.expand = Some(nested(parser, |parser| {
                parse_expand_at_depth(parser, depth + 1)
            })?);
        }
        QueryOptionKind::Top => {
            if options.top.is_some() {
                return Err(duplicate());
            }
            options.top = Some(parse_non_negative_integer(parser, kind.as_str())?);
        }
        QueryOptionKind::Skip => {
            if options.skip.is_some() {
                return Err(duplicate());
            }
            options.skip = Some(parse_non_negative_integer(parser, kind.as_str())?);
        }
        QueryOptionKind::Count => {
            if options.count.is_some() {
                return Err(duplicate());
            }
            options.count = Some(parse_boolean(parser, kind.as_str())?);
        }
        QueryOptionKind::Levels => {
            if options.levels.is_some() {
                return Err(duplicate());
            }
            if matches!(parser.current_token(), Some(Token::Identifier(word)) if word == "max") {
                parser.advance();
                options.levels = Some(None);
            } else {
                options.levels = Some(Some(parse_non_negative_integer(parser, kind.as_str())?));
            }
        }
        QueryOptionKind::Apply | QueryOptionKind::Search => {
            return Err(SyntaxError::UnknownQueryOption { name, span });
        }
    }

    Ok(())
}

// === $search ===

pub fn parse_search(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    nested(parser, parse_search_or)
}

fn parse_search_or(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    let mut left = parse_search_and(parser)?;
    while at_search_word(parser, search::OR) {
        parser.advance();
        let right = parse_search_and(parser)?;
        left = search_binary(BinaryOperatorKind::Or, left, right);
    }
    Ok(left)
}

/// Adjacent terms without an operator are joined by AND
fn parse_search_and(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    let mut left = parse_search_not(parser)?;
    loop {
        if at_search_word(parser, search::AND) {
            parser.advance();
        } else if !starts_search_term(parser) {
            break;
        }
        let right = parse_search_not(parser)?;
        left = search_binary(BinaryOperatorKind::And, left, right);
    }
    Ok(left)
}

fn parse_search_not(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    if at_search_word(parser, search::NOT) {
        let start = parser.current_span();
        parser.advance();
        let operand = nested(parser, parse_search_not)?;
        let span = start.merge(operand.span());
        return Ok(QueryToken::UnaryOperator {
            kind: UnaryOperatorKind::Not,
            operand: Box::new(operand),
            span,
        });
    }
    parse_search_primary(parser)
}

fn parse_search_primary(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    let span = parser.current_span();
    match parser.current_token() {
        Some(Token::OpenParen) => {
            parser.advance();
            let inner = nested(parser, parse_search_or)?;
            expect_token(parser, &Token::CloseParen, "')'")?;
            Ok(inner)
        }
        Some(Token::Identifier(word))
            if word != search::AND && word != search::OR && word != search::NOT =>
        {
            let text = word.clone();
            parser.advance();
            Ok(QueryToken::StringLiteral { text, span })
        }
        Some(Token::Literal {
            value: LiteralValue::String(phrase),
            ..
        }) => {
            let text = phrase.clone();
            parser.advance();
            Ok(QueryToken::StringLiteral { text, span })
        }
        _ => Err(unexpected_token_error(parser, "search term")),
    }
}

fn at_search_word(parser: &dyn Parser, word: &str) -> bool {
    matches!(parser.current_token(), Some(Token::Identifier(current)) if current == word)
}

fn starts_search_term(parser: &dyn Parser) -> bool {
    match parser.current_token() {
        Some(Token::OpenParen) | Some(Token::Literal { .. }) => true,
        Some(Token::Identifier(word)) => word != search::OR,
        _ => false,
    }
}

fn search_binary(kind: BinaryOperatorKind, left: QueryToken, right: QueryToken) -> QueryToken {
    let span = left.span().merge(right.span());
    QueryToken::BinaryOperator {
        kind,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

// === resource path ===

/// `Customers(1)/Orders`, `Products/Sales.Special/$count`, ...
pub fn parse_resource_path(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    consume_if(parser, &Token::Slash);
    let first = parse_segment(parser, None, false)?;
    parse_path_continuation(parser, first, false)
}
