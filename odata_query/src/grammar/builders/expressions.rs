//! Expression builders
//!
//! Precedence climbing over the operator table in
//! [`BinaryOperatorKind::precedence`]; every level is left-associative.
//!
//! ```text
//! expression ::= unary (binary_op unary)*
//! unary      ::= ("not" | "-") unary | primary
//! primary    ::= literal | "@" alias | "(" expression ")" | member_path
//! member     ::= segment ("/" segment)*
//! segment    ::= qualified_name [ "(" arguments ")" ] | ("any" | "all") lambda
//! ```

use crate::config::compile_time::syntax::MAX_FUNCTION_ARGUMENTS;
use crate::grammar::ast::nodes::*;
use crate::grammar::builders::atomic::{
    at_word, parse_literal, parse_qualified_name, peek_binary_operator, Parser,
};
use crate::grammar::builders::helpers::{
    check_token, consume_if, expect_identifier, expect_token, nested, unexpected_token_error,
};
use crate::grammar::keywords::{
    LambdaKind, UnaryOperatorKind, IMPLICIT_RANGE_VARIABLE, THIS_RANGE_VARIABLE,
};
use crate::syntax::{SyntaxError, SyntaxResult};
use crate::tokens::Token;

pub fn parse_expression(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    nested(parser, |parser| parse_binary(parser, 1))
}

fn parse_binary(parser: &mut dyn Parser, min_precedence: u8) -> SyntaxResult<QueryToken> {
    let mut left = parse_unary(parser)?;

    while let Some(kind) = peek_binary_operator(parser) {
        let precedence = kind.precedence();
        if precedence < min_precedence {
            break;
        }
        parser.advance();

        let right = nested(parser, |parser| parse_binary(parser, precedence + 1))?;
        let span = left.span().merge(right.span());
        left = QueryToken::BinaryOperator {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }

    Ok(left)
}

fn parse_unary(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    let start = parser.current_span();

    let kind = if check_token(parser, &Token::Minus) {
        UnaryOperatorKind::Negate
    } else if at_word(parser, "not") && !matches!(parser.peek_token(1), Some(Token::Slash)) {
        UnaryOperatorKind::Not
    } else {
        return parse_primary(parser);
    };

    parser.advance();
    let operand = nested(parser, parse_unary)?;
    let span = start.merge(operand.span());

    // `- 5` folds into the literal the same way `-5` lexes
    if kind == UnaryOperatorKind::Negate {
        if let QueryToken::Literal { value, text, .. } = &operand {
            if let Some(negated) = value.negated() {
                return Ok(QueryToken::Literal {
                    value: negated,
                    text: format!("-{}", text),
                    span,
                });
            }
        }
    }

    Ok(QueryToken::UnaryOperator {
        kind,
        operand: Box::new(operand),
        span,
    })
}

fn parse_primary(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    match parser.current_token() {
        Some(Token::Literal { .. }) => parse_literal(parser),
        Some(Token::ParameterAlias(alias)) => {
            let token = QueryToken::FunctionParameterAlias {
                alias: alias.clone(),
                span: parser.current_span(),
            };
            parser.advance();
            Ok(token)
        }
        Some(Token::OpenParen) => {
            parser.advance();
            let inner = parse_expression(parser)?;
            expect_token(parser, &Token::CloseParen, "')'")?;
            Ok(inner)
        }
        Some(Token::Identifier(_)) => parse_member_path(parser),
        _ => Err(unexpected_token_error(parser, "expression")),
    }
}

/// member ::= (range_variable | segment) ("/" segment)*
pub fn parse_member_path(parser: &mut dyn Parser) -> SyntaxResult<QueryToken> {
    let first = match parser.current_token() {
        Some(Token::Identifier(name))
            if name == IMPLICIT_RANGE_VARIABLE
                || name == THIS_RANGE_VARIABLE
                || parser.is_range_variable(name) =>
        {
            let token = QueryToken::RangeVariable {
                name: name.clone(),
                span: parser.current_span(),
            };
            parser.advance();
            token
        }
        _ => parse_segment(parser, None, true)?,
    };

    parse_path_continuation(parser, first, true)
}

/// ("/" segment)* appended to `current`
pub fn parse_path_continuation(
    parser: &mut dyn Parser,
    mut current: QueryToken,
    allow_lambda: bool,
) -> SyntaxResult<QueryToken> {
    while consume_if(parser, &Token::Slash) {
        current = parse_segment(parser, Some(current), allow_lambda)?;
    }
    Ok(current)
}

/// One path segment. A segment followed by `(` is a function call (or a key
/// lookup, which the binder tells apart); a dotted name is a type segment.
pub fn parse_segment(
    parser: &mut dyn Parser,
    parent: Option<QueryToken>,
    allow_lambda: bool,
) -> SyntaxResult<QueryToken> {
    let start = parser.position();
    let (name, name_span) = parse_qualified_name(parser)?;
    let next = parent.map(Box::new);

    if check_token(parser, &Token::OpenParen) {
        let lambda = LambdaKind::from_word(&name).filter(|_| allow_lambda);
        return match (lambda, next) {
            (Some(kind), Some(parent)) => parse_lambda(parser, kind, parent, start),
            (_, next) => {
                let arguments = parse_arguments(parser)?;
                Ok(QueryToken::FunctionCall(FunctionCallToken {
                    name,
                    arguments,
                    source: next,
                    span: parser.span_from(start),
                }))
            }
        };
    }

    if name.contains('.') {
        Ok(QueryToken::DottedIdentifier {
            identifier: name,
            next,
            span: name_span,
        })
    } else {
        Ok(QueryToken::EndPath {
            identifier: name,
            next,
            span: name_span,
        })
    }
}

/// "(" [ argument ("," argument)* ] ")"
pub fn parse_arguments(parser: &mut dyn Parser) -> SyntaxResult<Vec<FunctionParameterToken>> {
    let open = expect_token(parser, &Token::OpenParen, "'('")?;
    let mut arguments = Vec::new();

    if consume_if(parser, &Token::CloseParen) {
        return Ok(arguments);
    }

    loop {
        arguments.push(parse_argument(parser)?);
        if arguments.len() > MAX_FUNCTION_ARGUMENTS {
            return Err(SyntaxError::TooManyArguments {
                count: arguments.len(),
                span: open.merge(parser.current_span()),
            });
        }
        if !consume_if(parser, &Token::Comma) {
            break;
        }
    }

    expect_token(parser, &Token::CloseParen, "',' or ')'")?;
    Ok(arguments)
}

/// argument ::= [identifier "="] expression
fn parse_argument(parser: &mut dyn Parser) -> SyntaxResult<FunctionParameterToken> {
    let start = parser.position();

    let name = match (parser.current_token(), parser.peek_token(1)) {
        (Some(Token::Identifier(name)), Some(Token::Equals)) => {
            let name = name.clone();
            parser.advance();
            parser.advance();
            Some(name)
        }
        _ => None,
    };

    let value = parse_expression(parser)?;
    Ok(FunctionParameterToken {
        name,
        value: Box::new(value),
        span: parser.span_from(start),
    })
}

/// lambda ::= "(" [ identifier ":" expression ] ")"
fn parse_lambda(
    parser: &mut dyn Parser,
    kind: LambdaKind,
    parent: Box<QueryToken>,
    start: usize,
) -> SyntaxResult<QueryToken> {
    expect_token(parser, &Token::OpenParen, "'('")?;

    let empty_any = kind == LambdaKind::Any && consume_if(parser, &Token::CloseParen);
    let (parameter, expression) = if empty_any {
        (None, None)
    } else {
        let (parameter, _) = expect_identifier(parser, "lambda parameter")?;
        expect_token(parser, &Token::Colon, "':'")?;

        parser.push_range_variable(parameter.clone());
        let body = parse_expression(parser);
        parser.pop_range_variable();

        let body = body?;
        expect_token(parser, &Token::CloseParen, "')'")?;
        (Some(parameter), Some(Box::new(body)))
    };

    let lambda = LambdaToken {
        parent,
        parameter,
        expression,
        span: parser.span_from(start),
    };

    Ok(match kind {
        LambdaKind::Any => QueryToken::Any(lambda),
        LambdaKind::All => QueryToken::All(lambda),
    })
}
