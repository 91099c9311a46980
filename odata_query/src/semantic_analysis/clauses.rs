//! Bound query option clauses
//!
//! Each clause owns its bound nodes and caches the merged diagnostics of
//! everything beneath it on first request.

use crate::grammar::ast::nodes::PathSegmentToken;
use crate::grammar::keywords::{AggregationMethod, OrderDirection, TransformationKind};
use crate::model::TypeReference;
use crate::reference_resolution::Memo;
use crate::semantic_analysis::context::RangeVariable;
use crate::semantic_analysis::nodes::QueryNode;
use crate::validation::{collect, Diagnostic};
use serde::Serialize;
use std::sync::Arc;

/// Merged diagnostics of a clause, computed once
///
/// Ignored by equality and serialization: it is derived from the nodes.
#[derive(Debug, Clone, Default)]
pub struct ErrorCache(Memo<Vec<Arc<Diagnostic>>>);

impl ErrorCache {
    fn get_or_collect(&self, gather: impl FnOnce() -> Vec<Arc<Diagnostic>>) -> &[Arc<Diagnostic>] {
        self.0.get_or_init(gather)
    }

    pub fn is_computed(&self) -> bool {
        self.0.is_computed()
    }
}

impl PartialEq for ErrorCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

fn merge<'a>(lists: impl IntoIterator<Item = &'a [Arc<Diagnostic>]>) -> Vec<Arc<Diagnostic>> {
    collect(lists)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub expression: QueryNode,
    pub range_variable: RangeVariable,
    #[serde(skip)]
    errors: ErrorCache,
}

impl FilterClause {
    pub fn new(expression: QueryNode, range_variable: RangeVariable) -> Self {
        Self {
            expression,
            range_variable,
            errors: ErrorCache::default(),
        }
    }

    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_collect(|| self.expression.errors())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByClauseItem {
    pub expression: QueryNode,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByClause {
    pub items: Vec<OrderByClauseItem>,
    pub range_variable: RangeVariable,
    #[serde(skip)]
    errors: ErrorCache,
}

impl OrderByClause {
    pub fn new(items: Vec<OrderByClauseItem>, range_variable: RangeVariable) -> Self {
        Self {
            items,
            range_variable,
            errors: ErrorCache::default(),
        }
    }

    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_collect(|| {
            let per_item: Vec<Vec<Arc<Diagnostic>>> =
                self.items.iter().map(|item| item.expression.errors()).collect();
            merge(per_item.iter().map(Vec::as_slice))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchClause {
    pub expression: QueryNode,
    #[serde(skip)]
    errors: ErrorCache,
}

impl SearchClause {
    pub fn new(expression: QueryNode) -> Self {
        Self {
            expression,
            errors: ErrorCache::default(),
        }
    }

    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_collect(|| self.expression.errors())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectItem {
    /// `*` or `Namespace.*`
    Wildcard {
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    Path {
        segments: Vec<PathSegmentToken>,
        node: QueryNode,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedItem {
    pub segments: Vec<PathSegmentToken>,
    pub navigation: QueryNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<OrderByClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_expand: Option<Box<SelectExpandClause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
    /// `Some(None)` stands for `$levels=max`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Option<i64>>,
}

impl ExpandedItem {
    fn gather_errors(&self) -> Vec<Arc<Diagnostic>> {
        let navigation = self.navigation.errors();
        let filter = self.filter.as_ref().map(FilterClause::errors).unwrap_or_default();
        let orderby = self.orderby.as_ref().map(OrderByClause::errors).unwrap_or_default();
        let nested = self
            .select_expand
            .as_ref()
            .map(|nested| nested.errors())
            .unwrap_or_default();
        merge([navigation.as_slice(), filter, orderby, nested])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectExpandClause {
    /// No `$select`, or one that contains `*`
    pub all_selected: bool,
    pub selected: Vec<SelectItem>,
    pub expanded: Vec<ExpandedItem>,
    #[serde(skip)]
    errors: ErrorCache,
}

impl SelectExpandClause {
    pub fn new(all_selected: bool, selected: Vec<SelectItem>, expanded: Vec<ExpandedItem>) -> Self {
        Self {
            all_selected,
            selected,
            expanded,
            errors: ErrorCache::default(),
        }
    }

    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_collect(|| {
            let mut lists: Vec<Vec<Arc<Diagnostic>>> = self
                .selected
                .iter()
                .filter_map(|item| match item {
                    SelectItem::Path { node, .. } => Some(node.errors()),
                    SelectItem::Wildcard { .. } => None,
                })
                .collect();
            lists.extend(self.expanded.iter().map(ExpandedItem::gather_errors));
            merge(lists.iter().map(Vec::as_slice))
        })
    }
}

/// `<expression> with <method> as <alias>`, bound
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateExpression {
    pub expression: QueryNode,
    pub expression_text: String,
    pub method: AggregationMethod,
    pub alias: String,
    /// Type of the aggregated value exposed under `alias`
    pub type_ref: TypeReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateClause {
    pub expressions: Vec<AggregateExpression>,
}

impl AggregateClause {
    fn gather_errors(&self) -> Vec<Arc<Diagnostic>> {
        let per_expression: Vec<Vec<Arc<Diagnostic>>> = self
            .expressions
            .iter()
            .map(|expression| {
                let mut errors = expression.expression.errors();
                errors.extend(expression.type_ref.errors().iter().cloned());
                errors
            })
            .collect();
        merge(per_expression.iter().map(Vec::as_slice))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByClause {
    pub properties: Vec<QueryNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateClause>,
}

impl GroupByClause {
    fn gather_errors(&self) -> Vec<Arc<Diagnostic>> {
        let mut lists: Vec<Vec<Arc<Diagnostic>>> =
            self.properties.iter().map(QueryNode::errors).collect();
        if let Some(aggregate) = &self.aggregate {
            lists.push(aggregate.gather_errors());
        }
        merge(lists.iter().map(Vec::as_slice))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationClause {
    Aggregate(AggregateClause),
    #[serde(rename = "groupby")]
    GroupBy(GroupByClause),
    Filter(FilterClause),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationNode {
    /// Navigation path the transformation applies to, parent first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub navigation: Vec<String>,
    pub clause: TransformationClause,
}

impl TransformationNode {
    pub fn kind(&self) -> TransformationKind {
        match self.clause {
            TransformationClause::Aggregate(_) => TransformationKind::Aggregate,
            TransformationClause::GroupBy(_) => TransformationKind::GroupBy,
            TransformationClause::Filter(_) => TransformationKind::Filter,
        }
    }

    fn gather_errors(&self) -> Vec<Arc<Diagnostic>> {
        match &self.clause {
            TransformationClause::Aggregate(aggregate) => aggregate.gather_errors(),
            TransformationClause::GroupBy(group_by) => group_by.gather_errors(),
            TransformationClause::Filter(filter) => filter.errors().to_vec(),
        }
    }
}

/// Bound `$apply`; transformations keep their order in the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyClause {
    pub transformations: Vec<TransformationNode>,
    #[serde(skip)]
    errors: ErrorCache,
}

impl ApplyClause {
    pub fn new(transformations: Vec<TransformationNode>) -> Self {
        Self {
            transformations,
            errors: ErrorCache::default(),
        }
    }

    pub fn errors(&self) -> &[Arc<Diagnostic>] {
        self.errors.get_or_collect(|| {
            let lists: Vec<Vec<Arc<Diagnostic>>> = self
                .transformations
                .iter()
                .map(TransformationNode::gather_errors)
                .collect();
            merge(lists.iter().map(Vec::as_slice))
        })
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdmPrimitiveKind;
    use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
    use crate::tokens::LiteralValue;
    use crate::utils::Span;
    use crate::validation::Location;

    fn unresolved_property(name: &str) -> QueryNode {
        let placeholder = UnresolvedRef::new(UnresolvedKind::Property, name, Location::Unknown);
        QueryNode::property_access(
            QueryNode::range_variable(
                &RangeVariable::implicit(TypeReference::Entity("Sales.Customer".into()), None),
                Span::dummy(),
            ),
            name,
            TypeReference::Unresolved(placeholder),
            Span::dummy(),
            false,
        )
    }

    fn it() -> RangeVariable {
        RangeVariable::implicit(TypeReference::Entity("Sales.Customer".into()), None)
    }

    #[test]
    fn test_errors_are_cached() {
        let clause = FilterClause::new(unresolved_property("Missing"), it());
        let first = clause.errors().as_ptr();
        assert_eq!(clause.errors().len(), 1);
        assert_eq!(clause.errors().as_ptr(), first);
    }

    #[test]
    fn test_clean_clause_has_empty_errors() {
        let constant = QueryNode::constant(
            LiteralValue::Boolean(true),
            "true",
            TypeReference::Primitive(EdmPrimitiveKind::Boolean),
            Span::dummy(),
        );
        let clause = FilterClause::new(constant, it());
        assert!(clause.errors().is_empty());
    }

    #[test]
    fn test_apply_errors_follow_transformations() {
        let shared = unresolved_property("Region");
        let group_by = TransformationNode {
            navigation: Vec::new(),
            clause: TransformationClause::GroupBy(GroupByClause {
                properties: vec![shared.clone(), unresolved_property("Country")],
                aggregate: None,
            }),
        };
        let filter = TransformationNode {
            navigation: Vec::new(),
            clause: TransformationClause::Filter(FilterClause::new(shared, it())),
        };
        let clause = ApplyClause::new(vec![group_by, filter]);
        assert_eq!(clause.errors().len(), 2);
        assert_eq!(clause.transformations[0].kind(), TransformationKind::GroupBy);

        let json = serde_json::to_value(&clause).unwrap();
        assert_eq!(json["transformations"][0]["clause"]["kind"], "groupby");
    }
}
