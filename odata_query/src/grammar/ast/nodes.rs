//! Syntactic query tokens
//!
//! The parser's output. Nothing here knows about the data model: a token
//! carries child tokens, raw text and a span, never a resolved type.
//!
//! Paths are child-first chains: in `Customer/Address/City` the outermost
//! token is `City`, whose `next` is `Address`, whose `next` is `Customer`.
//! [`QueryToken::path_segments`] turns such a chain into a parent-first list.

use crate::grammar::keywords::{
    AggregationMethod, BinaryOperatorKind, LambdaKind, OrderDirection, UnaryOperatorKind,
};
use crate::tokens::LiteralValue;
use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryToken {
    BinaryOperator {
        kind: BinaryOperatorKind,
        left: Box<QueryToken>,
        right: Box<QueryToken>,
        span: Span,
    },
    UnaryOperator {
        kind: UnaryOperatorKind,
        operand: Box<QueryToken>,
        span: Span,
    },
    Literal {
        value: LiteralValue,
        text: String,
        span: Span,
    },
    /// A `$search` term or phrase
    StringLiteral { text: String, span: Span },
    FunctionCall(FunctionCallToken),
    /// Property, navigation or system segment; `next` is the segment before it
    EndPath {
        identifier: String,
        next: Option<Box<QueryToken>>,
        span: Span,
    },
    /// Namespace-qualified type segment, a cast when it follows a path
    DottedIdentifier {
        identifier: String,
        next: Option<Box<QueryToken>>,
        span: Span,
    },
    RangeVariable { name: String, span: Span },
    Any(LambdaToken),
    All(LambdaToken),
    FunctionParameter(FunctionParameterToken),
    /// `@name`
    FunctionParameterAlias { alias: String, span: Span },
    /// `*` or `Namespace.*` in `$select`
    Star {
        namespace: Option<String>,
        span: Span,
    },
    OrderBy(OrderByToken),
    Select(SelectToken),
    Expand(ExpandToken),
    ExpandTerm(ExpandTermToken),
    Aggregate(AggregateToken),
    AggregateStatement(AggregateStatementToken),
    AggregateGroupBy(GroupByToken),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallToken {
    pub name: String,
    pub arguments: Vec<FunctionParameterToken>,
    /// Bound-function source or the segment before a key lookup
    pub source: Option<Box<QueryToken>>,
    pub span: Span,
}

/// A positional or `name=value` argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameterToken {
    pub name: Option<String>,
    pub value: Box<QueryToken>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaToken {
    pub parent: Box<QueryToken>,
    /// `None` for the parameterless `any()`
    pub parameter: Option<String>,
    pub expression: Option<Box<QueryToken>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expression: QueryToken,
    pub direction: OrderDirection,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByToken {
    pub items: Vec<OrderByItem>,
    pub span: Span,
}

/// Items are `Star` tokens or path chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectToken {
    pub items: Vec<QueryToken>,
    pub span: Span,
}

/// Terms are `ExpandTerm` tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandToken {
    pub terms: Vec<QueryToken>,
    pub span: Span,
}

impl ExpandToken {
    pub fn terms(&self) -> impl Iterator<Item = &ExpandTermToken> {
        self.terms.iter().filter_map(|term| match term {
            QueryToken::ExpandTerm(term) => Some(term),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandOptions {
    pub filter: Option<Box<QueryToken>>,
    pub orderby: Option<OrderByToken>,
    pub select: Option<SelectToken>,
    pub expand: Option<ExpandToken>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    /// `None` when absent, `Some(None)` for `$levels=max`
    pub levels: Option<Option<i64>>,
}

impl ExpandOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandTermToken {
    /// Navigation path chain, or `Star` for `$expand=*`
    pub path: Box<QueryToken>,
    pub options: ExpandOptions,
    pub span: Span,
}

/// Statements are `AggregateStatement` tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateToken {
    pub statements: Vec<QueryToken>,
    pub span: Span,
}

impl AggregateToken {
    pub fn statements(&self) -> impl Iterator<Item = &AggregateStatementToken> {
        self.statements.iter().filter_map(|statement| match statement {
            QueryToken::AggregateStatement(statement) => Some(statement),
            _ => None,
        })
    }
}

/// `<expression> with <method> as <alias>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatementToken {
    pub expression: Box<QueryToken>,
    /// Raw expression text as it appeared before `with`
    pub expression_text: String,
    pub method: AggregationMethod,
    pub alias: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByToken {
    pub properties: Vec<QueryToken>,
    pub aggregate: Option<AggregateToken>,
    pub span: Span,
}

/// One segment of a normalized, parent-first path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegmentToken {
    pub identifier: String,
    /// Namespace-qualified type segment
    pub is_type_segment: bool,
    pub span: Span,
}

/// Discriminant of [`QueryToken`], used in messages and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryTokenKind {
    BinaryOperator,
    UnaryOperator,
    Literal,
    StringLiteral,
    FunctionCall,
    EndPath,
    DottedIdentifier,
    RangeVariable,
    Any,
    All,
    FunctionParameter,
    FunctionParameterAlias,
    Star,
    OrderBy,
    Select,
    Expand,
    ExpandTerm,
    Aggregate,
    AggregateStatement,
    AggregateGroupBy,
}

impl QueryToken {
    pub fn kind(&self) -> QueryTokenKind {
        match self {
            Self::BinaryOperator { .. } => QueryTokenKind::BinaryOperator,
            Self::UnaryOperator { .. } => QueryTokenKind::UnaryOperator,
            Self::Literal { .. } => QueryTokenKind::Literal,
            Self::StringLiteral { .. } => QueryTokenKind::StringLiteral,
            Self::FunctionCall(_) => QueryTokenKind::FunctionCall,
            Self::EndPath { .. } => QueryTokenKind::EndPath,
            Self::DottedIdentifier { .. } => QueryTokenKind::DottedIdentifier,
            Self::RangeVariable { .. } => QueryTokenKind::RangeVariable,
            Self::Any(_) => QueryTokenKind::Any,
            Self::All(_) => QueryTokenKind::All,
            Self::FunctionParameter(_) => QueryTokenKind::FunctionParameter,
            Self::FunctionParameterAlias { .. } => QueryTokenKind::FunctionParameterAlias,
            Self::Star { .. } => QueryTokenKind::Star,
            Self::OrderBy(_) => QueryTokenKind::OrderBy,
            Self::Select(_) => QueryTokenKind::Select,
            Self::Expand(_) => QueryTokenKind::Expand,
            Self::ExpandTerm(_) => QueryTokenKind::ExpandTerm,
            Self::Aggregate(_) => QueryTokenKind::Aggregate,
            Self::AggregateStatement(_) => QueryTokenKind::AggregateStatement,
            Self::AggregateGroupBy(_) => QueryTokenKind::AggregateGroupBy,
        }
    }

    /// Span of the whole token. For path links this covers the full chain,
    /// while the `span` field of a link covers only that segment.
    pub fn span(&self) -> Span {
        match self {
            Self::BinaryOperator { span, .. }
            | Self::UnaryOperator { span, .. }
            | Self::Literal { span, .. }
            | Self::StringLiteral { span, .. }
            | Self::RangeVariable { span, .. }
            | Self::FunctionParameterAlias { span, .. }
            | Self::Star { span, .. } => *span,
            Self::EndPath { next, span, .. } | Self::DottedIdentifier { next, span, .. } => {
                match next {
                    Some(next) => next.span().merge(*span),
                    None => *span,
                }
            }
            Self::FunctionCall(call) => match &call.source {
                Some(source) => source.span().merge(call.span),
                None => call.span,
            },
            Self::Any(lambda) | Self::All(lambda) => lambda.parent.span().merge(lambda.span),
            Self::FunctionParameter(parameter) => parameter.span,
            Self::OrderBy(orderby) => orderby.span,
            Self::Select(select) => select.span,
            Self::Expand(expand) => expand.span,
            Self::ExpandTerm(term) => term.span,
            Self::Aggregate(aggregate) => aggregate.span,
            Self::AggregateStatement(statement) => statement.span,
            Self::AggregateGroupBy(groupby) => groupby.span,
        }
    }

    /// Same tree with every span moved right by `delta` bytes
    pub fn shifted(mut self, delta: usize) -> Self {
        self.shift_spans(delta);
        self
    }

    fn shift_spans(&mut self, delta: usize) {
        fn shift_box(token: &mut QueryToken, delta: usize) {
            token.shift_spans(delta);
        }
        fn shift_params(params: &mut [FunctionParameterToken], delta: usize) {
            for param in params {
                param.span = param.span.shifted(delta);
                param.value.shift_spans(delta);
            }
        }
        fn shift_orderby(orderby: &mut OrderByToken, delta: usize) {
            orderby.span = orderby.span.shifted(delta);
            for item in &mut orderby.items {
                item.span = item.span.shifted(delta);
                item.expression.shift_spans(delta);
            }
        }
        fn shift_aggregate(aggregate: &mut AggregateToken, delta: usize) {
            aggregate.span = aggregate.span.shifted(delta);
            for statement in &mut aggregate.statements {
                statement.shift_spans(delta);
            }
        }

        match self {
            Self::BinaryOperator {
                left, right, span, ..
            } => {
                *span = span.shifted(delta);
                shift_box(left, delta);
                shift_box(right, delta);
            }
            Self::UnaryOperator { operand, span, .. } => {
                *span = span.shifted(delta);
                shift_box(operand, delta);
            }
            Self::Literal { span, .. }
            | Self::StringLiteral { span, .. }
            | Self::RangeVariable { span, .. }
            | Self::FunctionParameterAlias { span, .. }
            | Self::Star { span, .. } => *span = span.shifted(delta),
            Self::EndPath { next, span, .. } | Self::DottedIdentifier { next, span, .. } => {
                *span = span.shifted(delta);
                if let Some(next) = next {
                    shift_box(next, delta);
                }
            }
            Self::FunctionCall(call) => {
                call.span = call.span.shifted(delta);
                shift_params(&mut call.arguments, delta);
                if let Some(source) = &mut call.source {
                    shift_box(source, delta);
                }
            }
            Self::Any(lambda) | Self::All(lambda) => {
                lambda.span = lambda.span.shifted(delta);
                shift_box(&mut lambda.parent, delta);
                if let Some(expression) = &mut lambda.expression {
                    shift_box(expression, delta);
                }
            }
            Self::FunctionParameter(parameter) => {
                shift_params(std::slice::from_mut(parameter), delta);
            }
            Self::OrderBy(orderby) => shift_orderby(orderby, delta),
            Self::Select(select) => {
                select.span = select.span.shifted(delta);
                for item in &mut select.items {
                    item.shift_spans(delta);
                }
            }
            Self::Expand(expand) => {
                expand.span = expand.span.shifted(delta);
                for term in &mut expand.terms {
                    term.shift_spans(delta);
                }
            }
            Self::ExpandTerm(term) => {
                term.span = term.span.shifted(delta);
                shift_box(&mut term.path, delta);
                let options = &mut term.options;
                if let Some(filter) = &mut options.filter {
                    shift_box(filter, delta);
                }
                if let Some(orderby) = &mut options.orderby {
                    shift_orderby(orderby, delta);
                }
                if let Some(select) = options.select.take() {
                    let shifted = QueryToken::Select(select).shifted(delta);
                    if let QueryToken::Select(select) = shifted {
                        options.select = Some(select);
                    }
                }
                if let Some(expand) = options.expand.take() {
                    let shifted = QueryToken::Expand(expand).shifted(delta);
                    if let QueryToken::Expand(expand) = shifted {
                        options.expand = Some(expand);
                    }
                }
            }
            Self::Aggregate(aggregate) => shift_aggregate(aggregate, delta),
            Self::AggregateStatement(statement) => {
                statement.span = statement.span.shifted(delta);
                shift_box(&mut statement.expression, delta);
            }
            Self::AggregateGroupBy(groupby) => {
                groupby.span = groupby.span.shifted(delta);
                for property in &mut groupby.properties {
                    property.shift_spans(delta);
                }
                if let Some(aggregate) = &mut groupby.aggregate {
                    shift_aggregate(aggregate, delta);
                }
            }
        }
    }

    /// Parent-first segments of a pure path chain (`EndPath`/`DottedIdentifier`
    /// links only). `None` when the chain contains anything else.
    pub fn path_segments(&self) -> Option<Vec<PathSegmentToken>> {
        let mut segments = Vec::new();
        let mut current = Some(self);

        while let Some(token) = current {
            match token {
                Self::EndPath {
                    identifier,
                    next,
                    span,
                } => {
                    segments.push(PathSegmentToken {
                        identifier: identifier.clone(),
                        is_type_segment: false,
                        span: *span,
                    });
                    current = next.as_deref();
                }
                Self::DottedIdentifier {
                    identifier,
                    next,
                    span,
                } => {
                    segments.push(PathSegmentToken {
                        identifier: identifier.clone(),
                        is_type_segment: true,
                        span: *span,
                    });
                    current = next.as_deref();
                }
                _ => return None,
            }
        }

        segments.reverse();
        Some(segments)
    }

    pub fn is_boolean_literal(&self) -> bool {
        matches!(
            self,
            Self::Literal {
                value: LiteralValue::Boolean(_),
                ..
            }
        )
    }
}

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryOperator {
                kind, left, right, ..
            } => write!(f, "({} {} {})", left, kind, right),
            Self::UnaryOperator {
                kind: UnaryOperatorKind::Not,
                operand,
                ..
            } => write!(f, "not {}", operand),
            Self::UnaryOperator { kind, operand, .. } => write!(f, "{}{}", kind, operand),
            Self::Literal { text, .. } => f.write_str(text),
            Self::StringLiteral { text, .. } => write!(f, "\"{}\"", text),
            Self::FunctionCall(call) => {
                if let Some(source) = &call.source {
                    write!(f, "{}/", source)?;
                }
                write!(f, "{}(", call.name)?;
                for (i, argument) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", argument)?;
                }
                f.write_str(")")
            }
            Self::EndPath {
                identifier, next, ..
            }
            | Self::DottedIdentifier {
                identifier, next, ..
            } => match next {
                Some(next) => write!(f, "{}/{}", next, identifier),
                None => f.write_str(identifier),
            },
            Self::RangeVariable { name, .. } => f.write_str(name),
            Self::Any(lambda) => write_lambda(f, LambdaKind::Any, lambda),
            Self::All(lambda) => write_lambda(f, LambdaKind::All, lambda),
            Self::FunctionParameter(parameter) => write!(f, "{}", parameter),
            Self::FunctionParameterAlias { alias, .. } => write!(f, "@{}", alias),
            Self::Star {
                namespace: Some(namespace),
                ..
            } => write!(f, "{}.*", namespace),
            Self::Star { namespace: None, .. } => f.write_str("*"),
            Self::OrderBy(orderby) => write!(f, "{}", orderby),
            Self::Select(select) => write_list(f, &select.items),
            Self::Expand(expand) => write_list(f, &expand.terms),
            Self::ExpandTerm(term) => write!(f, "{}", term.path),
            Self::Aggregate(aggregate) => {
                f.write_str("aggregate(")?;
                write_list(f, &aggregate.statements)?;
                f.write_str(")")
            }
            Self::AggregateStatement(statement) => write!(
                f,
                "{} with {} as {}",
                statement.expression_text, statement.method, statement.alias
            ),
            Self::AggregateGroupBy(groupby) => {
                f.write_str("groupby((")?;
                write_list(f, &groupby.properties)?;
                f.write_str(")")?;
                if let Some(aggregate) = &groupby.aggregate {
                    f.write_str(",aggregate(")?;
                    write_list(f, &aggregate.statements)?;
                    f.write_str(")")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, tokens: &[QueryToken]) -> fmt::Result {
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", token)?;
    }
    Ok(())
}

fn write_lambda(f: &mut fmt::Formatter<'_>, kind: LambdaKind, lambda: &LambdaToken) -> fmt::Result {
    write!(f, "{}/{}(", lambda.parent, kind.as_str())?;
    if let (Some(parameter), Some(expression)) = (&lambda.parameter, &lambda.expression) {
        write!(f, "{}:{}", parameter, expression)?;
    }
    f.write_str(")")
}

impl fmt::Display for FunctionParameterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}={}", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

impl fmt::Display for OrderByToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{} {}", item.expression, item.direction.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_path(identifier: &str, next: Option<QueryToken>, start: usize) -> QueryToken {
        QueryToken::EndPath {
            identifier: identifier.to_string(),
            next: next.map(Box::new),
            span: Span::from_offsets(start, start + identifier.len()),
        }
    }

    #[test]
    fn test_path_segments_are_parent_first() {
        let chain = end_path(
            "City",
            Some(QueryToken::DottedIdentifier {
                identifier: "Sales.Address".to_string(),
                next: Some(Box::new(end_path("Customer", None, 0))),
                span: Span::from_offsets(9, 22),
            }),
            23,
        );

        let segments = chain.path_segments().unwrap();
        let names: Vec<_> = segments.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(names, ["Customer", "Sales.Address", "City"]);
        assert!(segments[1].is_type_segment);
        assert_eq!(chain.to_string(), "Customer/Sales.Address/City");
    }

    #[test]
    fn test_path_segments_reject_non_path_links() {
        let chain = end_path(
            "Name",
            Some(QueryToken::RangeVariable {
                name: "o".to_string(),
                span: Span::from_offsets(0, 1),
            }),
            2,
        );
        assert!(chain.path_segments().is_none());
    }

    #[test]
    fn test_shifted_moves_nested_spans() {
        let token = QueryToken::BinaryOperator {
            kind: BinaryOperatorKind::Equal,
            left: Box::new(end_path("A", None, 0)),
            right: Box::new(QueryToken::Literal {
                value: LiteralValue::Int32(1),
                text: "1".to_string(),
                span: Span::from_offsets(5, 6),
            }),
            span: Span::from_offsets(0, 6),
        }
        .shifted(10);

        assert_eq!(token.span(), Span::from_offsets(10, 16));
        match token {
            QueryToken::BinaryOperator { right, .. } => {
                assert_eq!(right.span(), Span::from_offsets(15, 16));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }
}
