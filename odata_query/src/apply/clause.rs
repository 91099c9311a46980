//! Transformation clause parsers
//!
//! Each raw segment is dispatched on its transformation name. Property
//! expressions inside a clause are handed to the ordinary expression parser
//! and their spans moved back into `$apply` coordinates.

use crate::apply::error::{at_offset, ApplyError, ApplyResult};
use crate::apply::splitter::{matching_paren, split_top_level, trim_with_offset, words, RawTransformation};
use crate::config::compile_time::apply::{MAX_AGGREGATE_STATEMENTS, MAX_GROUPBY_PROPERTIES};
use crate::grammar::ast::nodes::{AggregateStatementToken, AggregateToken, GroupByToken, QueryToken};
use crate::grammar::keywords::{AggregationMethod, TransformationKind};
use crate::lexical::{self, LexError};
use crate::syntax::{self, GrammarEntry, SyntaxError};
use crate::utils::Span;
use serde::{Deserialize, Serialize};

const WITH_KEYWORD: &str = "with";
const AS_KEYWORD: &str = "as";
const AGGREGATE_CALL: &str = "aggregate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformationClauseToken {
    Aggregate(AggregateToken),
    GroupBy(GroupByToken),
    Filter(Box<QueryToken>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationToken {
    /// Navigation path qualifying the transformation, parent first
    pub navigation: Vec<String>,
    pub clause: TransformationClauseToken,
    pub span: Span,
}

impl TransformationToken {
    pub fn kind(&self) -> TransformationKind {
        match self.clause {
            TransformationClauseToken::Aggregate(_) => TransformationKind::Aggregate,
            TransformationClauseToken::GroupBy(_) => TransformationKind::GroupBy,
            TransformationClauseToken::Filter(_) => TransformationKind::Filter,
        }
    }
}

/// Parsed `$apply` value; transformations keep their source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyToken {
    pub transformations: Vec<TransformationToken>,
    pub span: Span,
}

pub fn parse_transformation(
    raw: &RawTransformation,
    validate: bool,
) -> ApplyResult<TransformationToken> {
    let clause = match raw.kind {
        TransformationKind::Aggregate => TransformationClauseToken::Aggregate(parse_aggregate(
            &raw.arguments,
            raw.arguments_offset,
            validate,
        )?),
        TransformationKind::GroupBy => TransformationClauseToken::GroupBy(parse_groupby(
            &raw.arguments,
            raw.arguments_offset,
            validate,
        )?),
        TransformationKind::Filter => TransformationClauseToken::Filter(Box::new(
            parse_expression_at(&raw.arguments, raw.arguments_offset)?,
        )),
    };

    Ok(TransformationToken {
        navigation: raw.navigation.clone(),
        clause,
        span: raw.span(),
    })
}

/// Comma-separated aggregate statements
pub fn parse_aggregate(arguments: &str, offset: usize, validate: bool) -> ApplyResult<AggregateToken> {
    let span = Span::from_offsets(offset, offset + arguments.len());
    let pieces = split_top_level(arguments, ',');
    if pieces.len() > MAX_AGGREGATE_STATEMENTS {
        return Err(ApplyError::malformed(
            arguments,
            &format!("more than {} aggregate statements", MAX_AGGREGATE_STATEMENTS),
            span,
        ));
    }

    let mut statements = Vec::with_capacity(pieces.len());
    for (relative, piece) in pieces {
        let (statement_offset, text) = trim_with_offset(piece, offset + relative);
        if text.is_empty() {
            return Err(ApplyError::malformed(arguments, "empty aggregate statement", span));
        }
        let statement = parse_aggregatable_property(text, statement_offset, validate)?;
        statements.push(QueryToken::AggregateStatement(statement));
    }

    Ok(AggregateToken { statements, span })
}

/// `<expression> with <method> as <alias>`
///
/// Everything before `with` is the aggregated expression. When `validate` is
/// false a missing `as <alias>` is tolerated and the expression text becomes
/// the alias.
pub fn parse_aggregatable_property(
    text: &str,
    offset: usize,
    validate: bool,
) -> ApplyResult<AggregateStatementToken> {
    let span = Span::from_offsets(offset, offset + text.len());
    let words = words(text);

    let with_index = match words.iter().position(|(_, word)| *word == WITH_KEYWORD) {
        Some(index) if index > 0 => index,
        _ => {
            return Err(ApplyError::MissingWithStatement {
                text: text.to_string(),
                span,
            })
        }
    };

    let (last_start, last_word) = words[with_index - 1];
    let expression_text = &text[..last_start + last_word.len()];

    let (method_start, method_word) = words.get(with_index + 1).copied().ok_or_else(|| {
        ApplyError::malformed(text, "expected aggregation method after 'with'", span)
    })?;
    let method = AggregationMethod::from_name(method_word).ok_or_else(|| {
        ApplyError::UnknownAggregationMethod {
            method: method_word.to_string(),
            span: Span::from_offsets(offset + method_start, offset + method_start + method_word.len()),
        }
    })?;

    let alias = match &words[with_index + 2..] {
        [(_, keyword), (_, alias)] if *keyword == AS_KEYWORD && is_valid_alias(alias) => {
            alias.to_string()
        }
        [(_, keyword), (alias_start, alias)] if *keyword == AS_KEYWORD => {
            return Err(ApplyError::malformed(
                text,
                &format!("'{}' is not a valid alias", alias),
                Span::from_offsets(offset + alias_start, offset + alias_start + alias.len()),
            ))
        }
        [] | [(_, _)] if !validate => expression_text.to_string(),
        [] | [(_, _)] => {
            return Err(ApplyError::MissingAlias {
                text: text.to_string(),
                span,
            })
        }
        _ => return Err(ApplyError::malformed(text, "unexpected text after alias", span)),
    };

    let expression = parse_expression_at(expression_text, offset)?;

    Ok(AggregateStatementToken {
        expression: Box::new(expression),
        expression_text: expression_text.to_string(),
        method,
        alias,
        span,
    })
}

/// `(<property>, ...)[, aggregate(...)]`
pub fn parse_groupby(arguments: &str, offset: usize, validate: bool) -> ApplyResult<GroupByToken> {
    let span = Span::from_offsets(offset, offset + arguments.len());
    let pieces = split_top_level(arguments, ',');

    let (list_offset, list) = match pieces.first() {
        Some(&(relative, piece)) => trim_with_offset(piece, offset + relative),
        None => return Err(ApplyError::malformed(arguments, "missing grouping properties", span)),
    };
    let inner = strip_parens(list)
        .ok_or_else(|| ApplyError::malformed(list, "expected parenthesized grouping properties", span))?;
    let inner_offset = list_offset + 1;

    let mut properties = Vec::new();
    for (relative, piece) in split_top_level(inner, ',') {
        let (property_offset, property) = trim_with_offset(piece, inner_offset + relative);
        if property.is_empty() {
            return Err(ApplyError::malformed(list, "empty grouping property", span));
        }
        properties.push(parse_expression_at(property, property_offset)?);
    }
    if properties.len() > MAX_GROUPBY_PROPERTIES {
        return Err(ApplyError::malformed(
            list,
            &format!("more than {} grouping properties", MAX_GROUPBY_PROPERTIES),
            span,
        ));
    }

    let aggregate = match &pieces[1..] {
        [] => None,
        [(relative, piece)] => {
            let (call_offset, call) = trim_with_offset(piece, offset + relative);
            let arguments = call
                .strip_prefix(AGGREGATE_CALL)
                .map(str::trim_start)
                .and_then(strip_parens)
                .ok_or_else(|| ApplyError::malformed(call, "expected aggregate(...)", span))?;
            let arguments_offset = call_offset + call.find('(').map_or(0, |open| open + 1);
            Some(parse_aggregate(arguments, arguments_offset, validate)?)
        }
        _ => {
            return Err(ApplyError::malformed(
                arguments,
                "groupby takes a property list and at most one aggregate",
                span,
            ))
        }
    };

    Ok(GroupByToken {
        properties,
        aggregate,
        span,
    })
}

/// Inner text of `( ... )` when the parentheses enclose all of `text`
fn strip_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') {
        return None;
    }
    match matching_paren(text, 0) {
        Some(close) if close + 1 == text.len() => Some(&text[1..close]),
        _ => None,
    }
}

fn is_valid_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse an expression found at `offset` in the `$apply` value
fn parse_expression_at(text: &str, offset: usize) -> ApplyResult<QueryToken> {
    let tokens = lexical::tokenize(text).map_err(at_offset::<LexError>(offset))?;
    let token = syntax::parse(tokens, GrammarEntry::Expression).map_err(at_offset::<SyntaxError>(offset))?;
    Ok(token.shifted(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::splitter::segment;
    use assert_matches::assert_matches;

    #[test]
    fn test_aggregatable_property() {
        let statement = parse_aggregatable_property("Amount with sum as Total", 0, true).unwrap();
        assert_eq!(statement.expression_text, "Amount");
        assert_eq!(statement.method, AggregationMethod::Sum);
        assert_eq!(statement.alias, "Total");
        assert_matches!(*statement.expression, QueryToken::EndPath { ref identifier, .. } if identifier == "Amount");
    }

    #[test]
    fn test_missing_with_statement() {
        let error = parse_aggregatable_property("Amount sum as Total", 0, true).unwrap_err();
        assert_matches!(error, ApplyError::MissingWithStatement { .. });
        assert!(error.to_string().contains("no 'with' statement"));

        let error = parse_aggregatable_property("with sum as Total", 0, true).unwrap_err();
        assert_matches!(error, ApplyError::MissingWithStatement { .. });
    }

    #[test]
    fn test_expression_before_with_keeps_spacing_and_offsets() {
        let statement =
            parse_aggregatable_property("Price mul Quantity with sum as Revenue", 10, true).unwrap();
        assert_eq!(statement.expression_text, "Price mul Quantity");
        assert_eq!(statement.expression.span().start.offset, 10);
        assert_eq!(statement.span.end.offset, 48);
    }

    #[test]
    fn test_alias_rules() {
        assert_matches!(
            parse_aggregatable_property("Amount with sum", 0, true),
            Err(ApplyError::MissingAlias { .. })
        );
        let lenient = parse_aggregatable_property("Amount with sum", 0, false).unwrap();
        assert_eq!(lenient.alias, "Amount");
        assert_matches!(
            parse_aggregatable_property("Amount with sum as 1x", 0, true),
            Err(ApplyError::MalformedTransformation { .. })
        );
        assert_matches!(
            parse_aggregatable_property("Amount with median as M", 0, true),
            Err(ApplyError::UnknownAggregationMethod { ref method, .. }) if method == "median"
        );
    }

    #[test]
    fn test_groupby_with_nested_aggregate() {
        let apply = "groupby((Category, Customer/Country),aggregate(Amount with sum as Total))";
        let raw = &segment(apply).unwrap()[0];
        let token = parse_transformation(raw, true).unwrap();
        let TransformationClauseToken::GroupBy(groupby) = token.clause else {
            panic!("expected groupby");
        };
        assert_eq!(groupby.properties.len(), 2);
        let second = groupby.properties[1].span();
        assert_eq!(second.slice(apply), "Customer/Country");
        let aggregate = groupby.aggregate.unwrap();
        let statement = aggregate.statements().next().unwrap();
        assert_eq!(statement.alias, "Total");
        assert_eq!(statement.expression.span().slice(apply), "Amount");
    }

    #[test]
    fn test_groupby_reports_bad_properties() {
        let raw = &segment("groupby((Category eq))").unwrap()[0];
        assert_matches!(parse_transformation(raw, true), Err(ApplyError::Syntax(_)));

        let raw = &segment("groupby(Category)").unwrap()[0];
        assert_matches!(
            parse_transformation(raw, true),
            Err(ApplyError::MalformedTransformation { .. })
        );
    }

    #[test]
    fn test_filter_errors_point_into_apply_text() {
        let apply = "filter(true)/filter(Amount gt)";
        let raw = &segment(apply).unwrap()[1];
        let error = parse_transformation(raw, true).unwrap_err();
        assert_eq!(error.span().map(|span| span.start.offset), Some(29));
    }
}
