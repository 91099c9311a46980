//! Binding of whole query options
//!
//! Each function binds one parsed option against the binder's current
//! context and wraps the result in its clause type. Nested `$expand` options
//! and navigation-qualified `$apply` transformations bind in the context of
//! their target type; the outer context is restored afterwards.

use crate::apply::{ApplyToken, TransformationClauseToken, TransformationToken};
use crate::config::compile_time::expand::MAX_EXPAND_DEPTH;
use crate::grammar::ast::nodes::{
    AggregateToken, ExpandTermToken, ExpandToken, GroupByToken, OrderByToken, PathSegmentToken,
    QueryToken, SelectToken,
};
use crate::grammar::keywords::AggregationMethod;
use crate::log_debug;
use crate::model::{self, EdmPrimitiveKind, TypeReference};
use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
use crate::semantic_analysis::binder::MetadataBinder;
use crate::semantic_analysis::clauses::{
    AggregateClause, AggregateExpression, ApplyClause, ExpandedItem, FilterClause, GroupByClause,
    OrderByClause, OrderByClauseItem, SearchClause, SelectExpandClause, SelectItem,
    TransformationClause, TransformationNode,
};
use crate::semantic_analysis::context::BindingContext;
use crate::semantic_analysis::error::{BindingError, BindingResult};
use crate::semantic_analysis::nodes::QueryNode;
use crate::utils::Span;
use crate::validation::Location;

const MAX_BASE_TYPE_CHAIN: usize = 64;

/// `$filter`: the expression must be boolean (or of unknown type)
pub fn bind_filter(binder: &mut MetadataBinder<'_>, token: &QueryToken) -> BindingResult<FilterClause> {
    let expression = binder.bind(token)?;
    require_boolean(&expression)?;
    Ok(FilterClause::new(expression, binder.context().implicit().clone()))
}

pub fn bind_orderby(binder: &mut MetadataBinder<'_>, token: &OrderByToken) -> BindingResult<OrderByClause> {
    let mut items = Vec::with_capacity(token.items.len());
    for item in &token.items {
        let expression = binder.bind(&item.expression)?;
        let type_ref = expression.type_ref();
        let reason = if type_ref.is_collection() {
            Some("collections cannot be ordered")
        } else if type_ref.is_structured() {
            Some("only primitive values can be ordered")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(BindingError::InvalidOrderBy {
                expression: item.expression.to_string(),
                reason: reason.to_string(),
                span: item.span,
            });
        }
        items.push(OrderByClauseItem {
            expression,
            direction: item.direction,
        });
    }
    Ok(OrderByClause::new(items, binder.context().implicit().clone()))
}

pub fn bind_search(binder: &mut MetadataBinder<'_>, token: &QueryToken) -> BindingResult<SearchClause> {
    let expression = binder.bind(token)?;
    require_boolean(&expression)?;
    Ok(SearchClause::new(expression))
}

pub fn bind_select_expand(
    binder: &mut MetadataBinder<'_>,
    select: Option<&SelectToken>,
    expand: Option<&ExpandToken>,
) -> BindingResult<SelectExpandClause> {
    bind_select_expand_at(binder, select, expand, 0)
}

fn bind_select_expand_at(
    binder: &mut MetadataBinder<'_>,
    select: Option<&SelectToken>,
    expand: Option<&ExpandToken>,
    depth: usize,
) -> BindingResult<SelectExpandClause> {
    let mut all_selected = select.is_none();
    let mut selected = Vec::new();
    for item in select.map(|select| select.items.as_slice()).unwrap_or_default() {
        match item {
            QueryToken::Star { namespace, .. } => {
                all_selected |= namespace.is_none();
                selected.push(SelectItem::Wildcard {
                    namespace: namespace.clone(),
                });
            }
            path => {
                let segments = path_segments(path)?;
                let node = binder.bind(path)?;
                selected.push(SelectItem::Path { segments, node });
            }
        }
    }

    let mut expanded = Vec::new();
    for term in expand.map(|expand| expand.terms().collect::<Vec<_>>()).unwrap_or_default() {
        match term.path.as_ref() {
            QueryToken::Star { .. } => {
                for name in navigation_property_names(binder) {
                    let token = QueryToken::EndPath {
                        identifier: name,
                        next: None,
                        span: term.span,
                    };
                    expanded.push(bind_expand_term(binder, &token, term, depth)?);
                }
            }
            path => expanded.push(bind_expand_term(binder, path, term, depth)?),
        }
    }

    log_debug!("Bound $select/$expand",
        "selected" => selected.len(),
        "expanded" => expanded.len(),
        "depth" => depth
    );
    Ok(SelectExpandClause::new(all_selected, selected, expanded))
}

fn bind_expand_term(
    binder: &mut MetadataBinder<'_>,
    path: &QueryToken,
    term: &ExpandTermToken,
    depth: usize,
) -> BindingResult<ExpandedItem> {
    let segments = path_segments(path)?;
    let path_text = join_segments(&segments);
    if depth >= MAX_EXPAND_DEPTH {
        return Err(BindingError::InvalidExpand {
            path: path_text,
            reason: format!("expansions nest deeper than {} levels", MAX_EXPAND_DEPTH),
            span: term.span,
        });
    }

    let navigation = binder.bind(path)?;
    if !is_navigation_target(&navigation) {
        return Err(BindingError::InvalidExpand {
            path: path_text,
            reason: "not a navigation property".to_string(),
            span: path.span(),
        });
    }

    let options = &term.options;
    let target = BindingContext::for_type(navigation.type_ref().element_type().clone());
    let nested = with_context(binder, target, |binder| {
        let filter = options
            .filter
            .as_deref()
            .map(|filter| bind_filter(binder, filter))
            .transpose()?;
        let orderby = options
            .orderby
            .as_ref()
            .map(|orderby| bind_orderby(binder, orderby))
            .transpose()?;
        let select_expand = if options.select.is_some() || options.expand.is_some() {
            Some(Box::new(bind_select_expand_at(
                binder,
                options.select.as_ref(),
                options.expand.as_ref(),
                depth + 1,
            )?))
        } else {
            None
        };
        Ok((filter, orderby, select_expand))
    });
    let (filter, orderby, select_expand) = nested?;

    Ok(ExpandedItem {
        segments,
        navigation,
        filter,
        orderby,
        select_expand,
        top: options.top,
        skip: options.skip,
        count: options.count,
        levels: options.levels,
    })
}

/// Navigation nodes, casts of them, and paths whose type is not known
fn is_navigation_target(node: &QueryNode) -> bool {
    match node {
        QueryNode::SingleNavigationNode(_) | QueryNode::CollectionNavigationNode(_) => true,
        QueryNode::SingleResourceCast(cast) | QueryNode::CollectionResourceCast(cast) => {
            is_navigation_target(&cast.source)
        }
        other => other.type_ref().is_open(),
    }
}

fn navigation_property_names(binder: &MetadataBinder<'_>) -> Vec<String> {
    let model = binder.model();
    let mut names = Vec::new();
    let mut current = binder
        .context()
        .implicit()
        .type_ref
        .structured_name()
        .and_then(|name| model.find_structured_type(name));
    for _ in 0..MAX_BASE_TYPE_CHAIN {
        let Some(structured) = current else {
            break;
        };
        for navigation in &structured.navigation_properties {
            if !names.contains(&navigation.name) {
                names.push(navigation.name.clone());
            }
        }
        current = structured
            .base_type
            .as_deref()
            .and_then(|base| model.find_structured_type(base));
    }
    names
}

/// `$apply`: transformations bind in order, each seeing the aliases the
/// earlier ones introduced
pub fn bind_apply(binder: &mut MetadataBinder<'_>, token: &ApplyToken) -> BindingResult<ApplyClause> {
    let mut transformations = Vec::with_capacity(token.transformations.len());
    for transformation in &token.transformations {
        let node = bind_transformation(binder, transformation)?;
        for (alias, type_ref) in top_level_aliases(&node) {
            binder.context_mut().add_dynamic_property(alias, type_ref);
        }
        transformations.push(node);
    }

    log_debug!("Bound $apply", "transformations" => transformations.len());
    Ok(ApplyClause::new(transformations))
}

type AliasList = Vec<(String, TypeReference)>;

/// Aliases a bound `$apply` leaves visible at the top level
pub fn apply_aliases(clause: &ApplyClause) -> AliasList {
    clause.transformations.iter().flat_map(top_level_aliases).collect()
}

/// Aliases of a navigation-qualified transformation belong to the
/// navigation target, not to `$it`
fn top_level_aliases(transformation: &TransformationNode) -> AliasList {
    if !transformation.navigation.is_empty() {
        return Vec::new();
    }
    match &transformation.clause {
        TransformationClause::Aggregate(aggregate) => aggregate_aliases(aggregate),
        TransformationClause::GroupBy(group_by) => {
            group_by.aggregate.as_ref().map(aggregate_aliases).unwrap_or_default()
        }
        TransformationClause::Filter(_) => Vec::new(),
    }
}

fn bind_transformation(
    binder: &mut MetadataBinder<'_>,
    transformation: &TransformationToken,
) -> BindingResult<TransformationNode> {
    let bind_clause = |binder: &mut MetadataBinder<'_>| -> BindingResult<TransformationClause> {
        match &transformation.clause {
            TransformationClauseToken::Aggregate(aggregate) => {
                Ok(TransformationClause::Aggregate(bind_aggregate(binder, aggregate)?))
            }
            TransformationClauseToken::GroupBy(group_by) => {
                Ok(TransformationClause::GroupBy(bind_group_by(binder, group_by)?))
            }
            TransformationClauseToken::Filter(filter) => {
                Ok(TransformationClause::Filter(bind_filter(binder, filter)?))
            }
        }
    };

    let clause = if transformation.navigation.is_empty() {
        bind_clause(binder)?
    } else {
        let target = navigation_context(binder, &transformation.navigation, transformation.span);
        with_context(binder, target, bind_clause)?
    };

    Ok(TransformationNode {
        navigation: transformation.navigation.clone(),
        clause,
    })
}

fn aggregate_aliases(clause: &AggregateClause) -> AliasList {
    clause
        .expressions
        .iter()
        .map(|expression| (expression.alias.clone(), expression.type_ref.clone()))
        .collect()
}

fn bind_aggregate(binder: &mut MetadataBinder<'_>, token: &AggregateToken) -> BindingResult<AggregateClause> {
    let mut expressions = Vec::new();
    for statement in token.statements() {
        let expression = binder.bind(&statement.expression)?;
        let source_type = expression.type_ref();
        if statement.method.requires_numeric() && !source_type.is_numeric() && !source_type.is_open() {
            return Err(BindingError::UnaryTypeMismatch {
                operator: statement.method.as_str().to_string(),
                operand: source_type.to_string(),
                span: statement.span,
            });
        }
        let type_ref = aggregate_type(statement.method, source_type);
        expressions.push(AggregateExpression {
            expression,
            expression_text: statement.expression_text.clone(),
            method: statement.method,
            alias: statement.alias.clone(),
            type_ref,
        });
    }
    Ok(AggregateClause { expressions })
}

fn aggregate_type(method: AggregationMethod, source: &TypeReference) -> TypeReference {
    match method {
        AggregationMethod::CountDistinct => TypeReference::Primitive(EdmPrimitiveKind::Int64),
        AggregationMethod::Average if source.is_primitive(EdmPrimitiveKind::Decimal) => source.clone(),
        AggregationMethod::Average if !source.is_open() => TypeReference::Primitive(EdmPrimitiveKind::Double),
        _ => source.clone(),
    }
}

/// Grouping properties that fail to resolve stay in the clause as
/// placeholders, so their diagnostics reach the caller
fn bind_group_by(binder: &mut MetadataBinder<'_>, token: &GroupByToken) -> BindingResult<GroupByClause> {
    let properties = token
        .properties
        .iter()
        .map(|property| binder.bind(property))
        .collect::<BindingResult<Vec<_>>>()?;
    if let Some(collection) = properties.iter().find(|property| property.is_collection()) {
        return Err(BindingError::InvalidPropertyAccess {
            name: collection.kind_name().to_string(),
            on: collection.type_ref().to_string(),
            reason: "groupby needs single-valued properties".to_string(),
            span: collection.span(),
        });
    }
    let aggregate = token
        .aggregate
        .as_ref()
        .map(|aggregate| bind_aggregate(binder, aggregate))
        .transpose()?;
    Ok(GroupByClause { properties, aggregate })
}

/// Context whose `$it` is the element type reached by `navigation` from the
/// current `$it`
fn navigation_context(binder: &MetadataBinder<'_>, navigation: &[String], span: Span) -> BindingContext {
    let model = binder.model();
    let mut current = binder.context().implicit().type_ref.clone();
    for segment in navigation {
        current = match &current {
            TypeReference::Entity(name) | TypeReference::Complex(name) => {
                match model.find_property(name, segment) {
                    Some(property) => model::property_type(model, name, property).element_type().clone(),
                    None => TypeReference::Unresolved(UnresolvedRef::new(
                        UnresolvedKind::NavigationProperty,
                        segment.as_str(),
                        Location::Query(span),
                    )),
                }
            }
            TypeReference::Unresolved(cause) => TypeReference::Unresolved(UnresolvedRef::derived(
                UnresolvedKind::NavigationProperty,
                segment.as_str(),
                Location::Query(span),
                cause,
            )),
            _ => TypeReference::Untyped,
        };
    }
    BindingContext::for_type(current)
}

/// Run `bind` with `context` in place of the binder's own
fn with_context<T>(
    binder: &mut MetadataBinder<'_>,
    context: BindingContext,
    bind: impl FnOnce(&mut MetadataBinder<'_>) -> BindingResult<T>,
) -> BindingResult<T> {
    let outer = std::mem::replace(binder.context_mut(), context);
    let result = bind(binder);
    *binder.context_mut() = outer;
    result
}

fn require_boolean(expression: &QueryNode) -> BindingResult<()> {
    let type_ref = expression.type_ref();
    if type_ref.is_boolean() || type_ref.is_open() {
        Ok(())
    } else {
        Err(BindingError::NonBooleanExpression {
            found: type_ref.to_string(),
            span: expression.span(),
        })
    }
}

fn path_segments(path: &QueryToken) -> BindingResult<Vec<PathSegmentToken>> {
    path.path_segments().ok_or_else(|| BindingError::UnsupportedToken {
        kind: format!("{:?}", path.kind()),
        span: path.span(),
    })
}

fn join_segments(segments: &[PathSegmentToken]) -> String {
    segments
        .iter()
        .map(|segment| segment.identifier.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyParser;
    use crate::lexical;
    use crate::model::fixtures::sales_model;
    use crate::model::InMemoryModel;
    use crate::syntax::{self, GrammarEntry};
    use assert_matches::assert_matches;

    fn parse(text: &str, entry: GrammarEntry) -> QueryToken {
        let tokens = lexical::tokenize(text).unwrap();
        syntax::parse(tokens, entry).unwrap()
    }

    fn binder<'m>(model: &'m InMemoryModel, entity_set: &str) -> MetadataBinder<'m> {
        MetadataBinder::new(model, BindingContext::for_entity_set(model, entity_set))
    }

    #[test]
    fn test_filter_must_be_boolean() {
        let model = sales_model();
        let mut binder = binder(&model, "Customers");
        let clause = bind_filter(&mut binder, &parse("Name eq 'x'", GrammarEntry::Expression)).unwrap();
        assert!(clause.errors().is_empty());
        assert_eq!(clause.range_variable.name, "$it");

        assert_matches!(
            bind_filter(&mut binder, &parse("Name", GrammarEntry::Expression)),
            Err(BindingError::NonBooleanExpression { .. })
        );
    }

    #[test]
    fn test_orderby_items() {
        let model = sales_model();
        let mut binder = binder(&model, "Orders");
        let QueryToken::OrderBy(token) = parse("Amount desc, Customer/Name", GrammarEntry::OrderBy) else {
            panic!("expected an orderby token");
        };
        let clause = bind_orderby(&mut binder, &token).unwrap();
        assert_eq!(clause.items.len(), 2);

        let QueryToken::OrderBy(token) = parse("Customer", GrammarEntry::OrderBy) else {
            panic!("expected an orderby token");
        };
        assert_matches!(bind_orderby(&mut binder, &token), Err(BindingError::InvalidOrderBy { .. }));
    }

    fn select_expand(
        binder: &mut MetadataBinder<'_>,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> BindingResult<SelectExpandClause> {
        let select = select.map(|text| match parse(text, GrammarEntry::Select) {
            QueryToken::Select(token) => token,
            other => panic!("unexpected token {:?}", other),
        });
        let expand = expand.map(|text| match parse(text, GrammarEntry::Expand) {
            QueryToken::Expand(token) => token,
            other => panic!("unexpected token {:?}", other),
        });
        bind_select_expand(binder, select.as_ref(), expand.as_ref())
    }

    #[test]
    fn test_select_and_nested_expand() {
        let model = sales_model();
        let mut binder = binder(&model, "Customers");
        let clause = select_expand(
            &mut binder,
            Some("Name,Address/City"),
            Some("Orders($filter=Amount gt 10;$select=ID;$expand=Product;$top=5)"),
        )
        .unwrap();

        assert!(!clause.all_selected);
        assert_eq!(clause.selected.len(), 2);
        let orders = &clause.expanded[0];
        assert_eq!(orders.segments[0].identifier, "Orders");
        assert_eq!(orders.top, Some(5));
        assert!(orders.filter.is_some());
        let nested = orders.select_expand.as_ref().unwrap();
        assert_eq!(nested.expanded[0].segments[0].identifier, "Product");
        assert!(clause.errors().is_empty());

        // the outer context is restored
        assert_eq!(binder.context().implicit().type_ref, TypeReference::Entity("Sales.Customer".into()));
    }

    #[test]
    fn test_expand_star_and_errors() {
        let model = sales_model();
        let mut binder = binder(&model, "Customers");
        let clause = select_expand(&mut binder, None, Some("*")).unwrap();
        assert!(clause.all_selected);
        assert_eq!(clause.expanded.len(), 2);

        assert_matches!(
            select_expand(&mut binder, None, Some("Name")),
            Err(BindingError::InvalidExpand { .. })
        );
        let clause = select_expand(&mut binder, Some("Nope"), None).unwrap();
        assert_eq!(clause.errors().len(), 1);
    }

    fn apply(binder: &mut MetadataBinder<'_>, text: &str) -> BindingResult<ApplyClause> {
        let token = ApplyParser::new().parse(text).unwrap();
        bind_apply(binder, &token)
    }

    #[test]
    fn test_apply_aliases_flow_forward() {
        let model = sales_model();
        let mut binder = binder(&model, "Orders");
        let clause = apply(
            &mut binder,
            "groupby((Customer/Name),aggregate(Amount with sum as Total))/filter(Total gt 100)",
        )
        .unwrap();
        assert_eq!(clause.transformations.len(), 2);
        assert!(clause.errors().is_empty());

        let TransformationClause::GroupBy(group_by) = &clause.transformations[0].clause else {
            panic!("expected groupby");
        };
        let aggregate = group_by.aggregate.as_ref().unwrap();
        assert_eq!(
            aggregate.expressions[0].type_ref,
            TypeReference::Primitive(EdmPrimitiveKind::Decimal)
        );
    }

    #[test]
    fn test_navigation_qualified_aliases_stay_off_it() {
        let model = sales_model();
        let mut binder = binder(&model, "Customers");
        let clause = apply(
            &mut binder,
            "Orders/aggregate(Amount with sum as Total)/filter(Total gt 100)",
        )
        .unwrap();
        assert_eq!(clause.transformations[0].navigation, vec!["Orders".to_string()]);
        assert!(apply_aliases(&clause).is_empty());
        assert!(binder.context().dynamic_property("Total").is_none());
        // `Total` is not a property of Customer
        assert_eq!(clause.errors().len(), 1);
    }

    #[test]
    fn test_apply_groupby_failures_are_reported() {
        let model = sales_model();
        let mut binder = binder(&model, "Orders");
        let clause = apply(&mut binder, "groupby((Nowhere,Quantity))").unwrap();
        let TransformationClause::GroupBy(group_by) = &clause.transformations[0].clause else {
            panic!("expected groupby");
        };
        assert_eq!(group_by.properties.len(), 2);
        assert_eq!(clause.errors().len(), 1);
    }

    #[test]
    fn test_apply_aggregate_type_checks() {
        let model = sales_model();
        let mut binder = binder(&model, "Customers");
        assert_matches!(
            apply(&mut binder, "aggregate(Name with sum as Total)"),
            Err(BindingError::UnaryTypeMismatch { .. })
        );
        let clause = apply(&mut binder, "aggregate(Name with countdistinct as Names)").unwrap();
        let TransformationClause::Aggregate(aggregate) = &clause.transformations[0].clause else {
            panic!("expected aggregate");
        };
        assert_eq!(aggregate.expressions[0].type_ref, TypeReference::Primitive(EdmPrimitiveKind::Int64));
    }
}
