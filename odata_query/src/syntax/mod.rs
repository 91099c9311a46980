//! Syntax analysis - token stream to query token tree
//!
//! The parser knows nothing about the data model. It produces a
//! [`QueryToken`] tree for one query option, or the first grammar violation.

mod error;
mod parser;

pub use crate::grammar::ast::nodes::QueryToken;
pub use error::{SyntaxError, SyntaxResult};
pub use parser::{create_parser, GrammarEntry, QueryParser};

use crate::config::runtime::ParserPreferences;
use crate::logging::codes;
use crate::tokens::TokenStream;
use crate::log_debug;

/// Parse `tokens` as the production named by `entry`
pub fn parse(tokens: TokenStream, entry: GrammarEntry) -> SyntaxResult<QueryToken> {
    log_debug!("Starting syntax analysis",
        "tokens" => tokens.len(),
        "entry" => entry.as_str()
    );
    QueryParser::new(tokens).parse(entry)
}

pub fn parse_with_preferences(
    tokens: TokenStream,
    entry: GrammarEntry,
    preferences: ParserPreferences,
) -> SyntaxResult<QueryToken> {
    QueryParser::with_preferences(tokens, preferences).parse(entry)
}

/// `$top` / `$skip` value
pub fn parse_non_negative_integer(option: &str, text: &str) -> SyntaxResult<i64> {
    let trimmed = text.trim();
    match trimmed.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        Ok(_) => Err(SyntaxError::invalid_option_value(
            option,
            trimmed,
            "must be non-negative",
        )),
        Err(_) => Err(SyntaxError::invalid_option_value(
            option,
            trimmed,
            "expected a non-negative integer",
        )),
    }
}

/// `$count` value; only lowercase `true` and `false` are accepted
pub fn parse_boolean_option(option: &str, text: &str) -> SyntaxResult<bool> {
    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SyntaxError::invalid_option_value(
            option,
            other,
            "expected true or false",
        )),
    }
}

/// Check that every syntax code has registry metadata
pub fn init_syntax_logging() -> Result<(), String> {
    let syntax_codes = [
        codes::syntax::UNEXPECTED_TOKEN,
        codes::syntax::UNEXPECTED_END_OF_INPUT,
        codes::syntax::EMPTY_EXPRESSION,
        codes::syntax::MAX_RECURSION_DEPTH,
        codes::syntax::UNKNOWN_QUERY_OPTION,
        codes::syntax::INVALID_QUERY_OPTION_VALUE,
        codes::syntax::TOO_MANY_ARGUMENTS,
    ];

    for code in &syntax_codes {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!(
                "Syntax error code {} not found in metadata registry",
                code.as_str()
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::keywords::{BinaryOperatorKind, OrderDirection, UnaryOperatorKind};
    use crate::grammar::{ExpandToken, QueryTokenKind, SelectToken};
    use crate::lexical::{tokenize, tokenize_search};
    use crate::tokens::LiteralValue;
    use assert_matches::assert_matches;

    fn parse_text(text: &str, entry: GrammarEntry) -> SyntaxResult<QueryToken> {
        parse(tokenize(text).unwrap(), entry)
    }

    fn expression(text: &str) -> QueryToken {
        parse_text(text, GrammarEntry::Expression).unwrap()
    }

    fn binary(token: &QueryToken) -> (BinaryOperatorKind, &QueryToken, &QueryToken) {
        match token {
            QueryToken::BinaryOperator {
                kind, left, right, ..
            } => (*kind, left, right),
            other => panic!("expected binary operator, got {:?}", other),
        }
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let token = expression("A or B and C");
        let (kind, left, right) = binary(&token);
        assert_eq!(kind, BinaryOperatorKind::Or);
        assert_eq!(left.to_string(), "A");
        let (inner, _, _) = binary(right);
        assert_eq!(inner, BinaryOperatorKind::And);
    }

    #[test]
    fn test_add_binds_looser_than_mul() {
        let token = expression("A add B mul C");
        let (kind, _, right) = binary(&token);
        assert_eq!(kind, BinaryOperatorKind::Add);
        assert_eq!(binary(right).0, BinaryOperatorKind::Multiply);
        assert_eq!(token.to_string(), "(A add (B mul C))");
    }

    #[test]
    fn test_left_associative_levels() {
        let token = expression("A sub B sub C");
        assert_eq!(token.to_string(), "((A sub B) sub C)");
        let token = expression("Price gt 5 eq true");
        assert_eq!(token.to_string(), "((Price gt 5) eq true)");
    }

    #[test]
    fn test_unary_binds_tightest() {
        let token = expression("not A and B");
        let (kind, left, _) = binary(&token);
        assert_eq!(kind, BinaryOperatorKind::And);
        assert_matches!(
            left,
            QueryToken::UnaryOperator {
                kind: UnaryOperatorKind::Not,
                ..
            }
        );

        let token = expression("- Price");
        assert_matches!(token, QueryToken::UnaryOperator { kind: UnaryOperatorKind::Negate, .. });
    }

    #[test]
    fn test_spaced_minus_folds_into_literal() {
        let token = expression("- 5");
        assert_matches!(token, QueryToken::Literal { value: LiteralValue::Int32(-5), .. });
    }

    #[test]
    fn test_paths_and_functions() {
        let token = expression("startswith(Customer/Name, 'A')");
        match &token {
            QueryToken::FunctionCall(call) => {
                assert_eq!(call.name, "startswith");
                assert_eq!(call.arguments.len(), 2);
                let segments = call.arguments[0].value.path_segments().unwrap();
                assert_eq!(segments.len(), 2);
                assert_eq!(segments[0].identifier, "Customer");
            }
            other => panic!("expected function call, got {:?}", other),
        }
    }

    #[test]
    fn test_type_segment_and_bound_function() {
        let token = expression("Customer/Sales.VipCustomer/Level");
        let segments = token.path_segments().unwrap();
        assert!(segments[1].is_type_segment);

        let token = expression("Orders/Sales.TotalAmount() gt 5");
        let (_, left, _) = binary(&token);
        assert_matches!(left, QueryToken::FunctionCall(call) if call.source.is_some());
    }

    #[test]
    fn test_lambda_scopes_range_variable() {
        let token = expression("Orders/any(o: o/Amount gt 100)");
        match token {
            QueryToken::Any(lambda) => {
                assert_eq!(lambda.parameter.as_deref(), Some("o"));
                let body = lambda.expression.unwrap();
                let (_, left, _) = binary(&body);
                match left {
                    QueryToken::EndPath { next: Some(next), .. } => {
                        assert_matches!(next.as_ref(), QueryToken::RangeVariable { name, .. } if name == "o");
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("expected any, got {:?}", other),
        }

        // Outside the lambda `o` is an ordinary property
        let token = expression("Orders/any(o: true) and o eq 1");
        let (_, _, right) = binary(&token);
        let (_, left, _) = binary(right);
        assert_eq!(left.kind(), QueryTokenKind::EndPath);
    }

    #[test]
    fn test_parameterless_any() {
        let token = expression("Orders/any()");
        assert_matches!(token, QueryToken::Any(lambda) if lambda.parameter.is_none());
        assert!(parse_text("Orders/all()", GrammarEntry::Expression).is_err());
    }

    #[test]
    fn test_parameter_alias_and_named_arguments() {
        let token = expression("Price lt @max");
        let (_, _, right) = binary(&token);
        assert_matches!(right, QueryToken::FunctionParameterAlias { alias, .. } if alias == "max");

        let token = expression("Sales.Discount(percent=10)");
        assert_matches!(token, QueryToken::FunctionCall(call)
            if call.arguments[0].name.as_deref() == Some("percent"));
    }

    #[test]
    fn test_syntax_errors_report_position() {
        let error = parse_text("Price gt", GrammarEntry::Expression).unwrap_err();
        assert_matches!(error, SyntaxError::UnexpectedEndOfInput { ref expected, .. } if expected == "expression");

        let error = parse_text("(Price gt 5", GrammarEntry::Expression).unwrap_err();
        assert_matches!(error, SyntaxError::UnexpectedEndOfInput { .. });

        let error = parse_text("Price gt 5 )", GrammarEntry::Expression).unwrap_err();
        assert_matches!(
            error,
            SyntaxError::UnexpectedToken { ref found, span, .. } if found == ")" && span.start.offset == 11
        );

        let error = parse_text("", GrammarEntry::Expression).unwrap_err();
        assert_matches!(error, SyntaxError::EmptyExpression { .. });
    }

    #[test]
    fn test_recursion_limit() {
        let text = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let error = parse_text(&text, GrammarEntry::Expression).unwrap_err();
        assert_matches!(error, SyntaxError::MaxRecursionDepth { .. });
    }

    #[test]
    fn test_orderby() {
        let token = parse_text("Name desc, Price", GrammarEntry::OrderBy).unwrap();
        match token {
            QueryToken::OrderBy(orderby) => {
                assert_eq!(orderby.items.len(), 2);
                assert_eq!(orderby.items[0].direction, OrderDirection::Descending);
                assert_eq!(orderby.items[1].direction, OrderDirection::Ascending);
            }
            other => panic!("expected orderby, got {:?}", other),
        }
        assert!(parse_text("Name sideways", GrammarEntry::OrderBy).is_err());
    }

    #[test]
    fn test_select_items() {
        let token = parse_text("Name,Address/City,Sales.*,*", GrammarEntry::Select).unwrap();
        let QueryToken::Select(SelectToken { items, .. }) = token else {
            panic!("expected select");
        };
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].path_segments().unwrap().len(), 2);
        assert_matches!(&items[2], QueryToken::Star { namespace: Some(ns), .. } if ns == "Sales");
        assert_matches!(&items[3], QueryToken::Star { namespace: None, .. });
    }

    #[test]
    fn test_expand_with_nested_options() {
        let token = parse_text(
            "Orders($filter=Amount gt 5;$orderby=Amount desc;$top=2;$expand=Items($levels=max)),Customer",
            GrammarEntry::Expand,
        )
        .unwrap();
        let QueryToken::Expand(expand) = token else {
            panic!("expected expand");
        };
        let terms: Vec<_> = expand.terms().collect();
        assert_eq!(terms.len(), 2);
        let options = &terms[0].options;
        assert!(options.filter.is_some());
        assert_eq!(options.top, Some(2));
        let nested: &ExpandToken = options.expand.as_ref().unwrap();
        let inner: Vec<_> = nested.terms().collect();
        assert_eq!(inner[0].options.levels, Some(None));
        assert!(terms[1].options.is_empty());
    }

    #[test]
    fn test_expand_rejects_unknown_option() {
        let error = parse_text("Orders($bogus=1)", GrammarEntry::Expand).unwrap_err();
        assert_matches!(error, SyntaxError::UnknownQueryOption { ref name, .. } if name == "$bogus");

        let error = parse_text("Orders($top=1;$top=2)", GrammarEntry::Expand).unwrap_err();
        assert_matches!(error, SyntaxError::InvalidQueryOptionValue { .. });
    }

    #[test]
    fn test_search_grammar() {
        let token = parse(
            tokenize_search("red OR blue green NOT \"dark grey\"").unwrap(),
            GrammarEntry::Search,
        )
        .unwrap();
        // red OR ((blue AND green) AND NOT "dark grey")
        let (kind, left, right) = binary(&token);
        assert_eq!(kind, BinaryOperatorKind::Or);
        assert_matches!(left, QueryToken::StringLiteral { text, .. } if text == "red");
        let (kind, _, not) = binary(right);
        assert_eq!(kind, BinaryOperatorKind::And);
        assert_matches!(not, QueryToken::UnaryOperator { kind: UnaryOperatorKind::Not, .. });
    }

    #[test]
    fn test_resource_path_key_lookup() {
        let token = parse_text("/Customers(1)/Orders/$count", GrammarEntry::ResourcePath).unwrap();
        let QueryToken::EndPath { identifier, next, .. } = &token else {
            panic!("expected end path");
        };
        assert_eq!(identifier, "$count");
        let orders = next.as_deref().unwrap();
        assert_matches!(orders, QueryToken::EndPath { next: Some(source), .. }
            if matches!(source.as_ref(), QueryToken::FunctionCall(call) if call.name == "Customers"));
    }

    #[test]
    fn test_value_options() {
        assert_eq!(parse_non_negative_integer("$top", " 10 ").unwrap(), 10);
        assert!(parse_non_negative_integer("$top", "-1").is_err());
        assert!(parse_non_negative_integer("$skip", "ten").is_err());
        assert!(parse_boolean_option("$count", "true").unwrap());
        assert!(parse_boolean_option("$count", "TRUE").is_err());
    }

    #[test]
    fn test_init_syntax_logging() {
        assert!(init_syntax_logging().is_ok());
    }
}
