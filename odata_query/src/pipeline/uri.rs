//! Relative request URIs: `Path?$option=value&@alias=value&custom=value`
//!
//! Values are taken verbatim; percent-decoding belongs to the transport.
//! Spans of errors raised while splitting the query string are relative to
//! the text after `?`; spans inside an option value are relative to that value.

use crate::config::RuntimeConfig;
use crate::grammar::keywords::QueryOptionKind;
use crate::lexical;
use crate::logging::codes;
use crate::model::{EdmModel, TypeReference};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::options::QueryOptionParser;
use crate::semantic_analysis::{
    ApplyClause, BindingContext, FilterClause, MetadataBinder, OrderByClause, QueryNode,
    RangeVariable, SearchClause, SelectExpandClause,
};
use crate::syntax::{self, GrammarEntry, SyntaxError};
use crate::utils::Span;
use crate::validation::{self, Diagnostic};
use crate::{log_debug, log_success};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedUri {
    pub path: Option<QueryNode>,
    pub filter: Option<FilterClause>,
    pub orderby: Option<OrderByClause>,
    pub select_expand: Option<SelectExpandClause>,
    pub apply: Option<ApplyClause>,
    pub search: Option<SearchClause>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    /// Options without a `$` or `@` prefix, passed through untouched
    pub custom_options: BTreeMap<String, String>,
    /// Every binding failure in the path and options, in that order
    pub diagnostics: Vec<Arc<Diagnostic>>,
}

impl ParsedUri {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

pub fn parse_uri(model: &dyn EdmModel, uri: &str) -> PipelineResult<ParsedUri> {
    parse_uri_with_config(model, uri, RuntimeConfig::default())
}

pub fn parse_uri_with_config(
    model: &dyn EdmModel,
    uri: &str,
    config: RuntimeConfig,
) -> PipelineResult<ParsedUri> {
    let (path_text, query) = uri.split_once('?').unwrap_or((uri, ""));
    let options = split_query(query)?;
    log_debug!("Split request URI",
        "options" => options.system.len(),
        "aliases" => options.aliases.len(),
        "custom" => options.custom.len()
    );

    let path = bind_path(model, path_text, &config)?;
    let context = match &path {
        Some(node) => context_for(node),
        None => BindingContext::for_type(TypeReference::Untyped),
    };

    let mut parser = QueryOptionParser::for_context(model, context).with_config(config);
    for (name, value) in &options.aliases {
        parser.add_alias(name, value)?;
    }
    let mut parsed = parse_query_options(&mut parser, &options.system)?;

    if let Some(path) = &path {
        let path_errors = path.errors();
        let option_errors = std::mem::take(&mut parsed.diagnostics);
        parsed.diagnostics = validation::collect([path_errors.as_slice(), option_errors.as_slice()]);
    }
    parsed.path = path;
    parsed.custom_options = options.custom;

    log_success!(codes::success::URI_PARSED, "Request URI parsed",
        "options" => options.system.len(),
        "diagnostics" => parsed.diagnostics.len()
    );
    Ok(parsed)
}

/// Bind a set of system query options with `parser`
///
/// `$apply` goes first so its aliases are visible to the other options.
/// The result carries no path and no custom options.
pub fn parse_query_options(
    parser: &mut QueryOptionParser<'_>,
    options: &HashMap<QueryOptionKind, String>,
) -> PipelineResult<ParsedUri> {
    let value = |kind: QueryOptionKind| options.get(&kind).map(String::as_str);

    let apply = value(QueryOptionKind::Apply)
        .map(|text| parser.parse_apply(text))
        .transpose()?;
    if let Some(apply) = &apply {
        parser.register_apply_aliases(apply);
    }

    let filter = value(QueryOptionKind::Filter)
        .map(|text| parser.parse_filter(text))
        .transpose()?;
    let search = value(QueryOptionKind::Search)
        .map(|text| parser.parse_search(text))
        .transpose()?;
    let orderby = value(QueryOptionKind::OrderBy)
        .map(|text| parser.parse_orderby(text))
        .transpose()?;
    let select_expand = match (value(QueryOptionKind::Select), value(QueryOptionKind::Expand)) {
        (None, None) => None,
        (select, expand) => Some(parser.parse_select_and_expand(select, expand)?),
    };
    let top = value(QueryOptionKind::Top).map(|text| parser.parse_top(text)).transpose()?;
    let skip = value(QueryOptionKind::Skip).map(|text| parser.parse_skip(text)).transpose()?;
    let count = value(QueryOptionKind::Count).map(|text| parser.parse_count(text)).transpose()?;

    let mut partials: Vec<&[Arc<Diagnostic>]> = Vec::new();
    partials.extend(apply.as_ref().map(ApplyClause::errors));
    partials.extend(filter.as_ref().map(FilterClause::errors));
    partials.extend(search.as_ref().map(SearchClause::errors));
    partials.extend(orderby.as_ref().map(OrderByClause::errors));
    partials.extend(select_expand.as_ref().map(SelectExpandClause::errors));
    let diagnostics = validation::collect(partials);

    Ok(ParsedUri {
        path: None,
        filter,
        orderby,
        select_expand,
        apply,
        search,
        top,
        skip,
        count,
        custom_options: BTreeMap::new(),
        diagnostics,
    })
}

#[derive(Debug, Default)]
struct QueryOptions {
    system: HashMap<QueryOptionKind, String>,
    aliases: Vec<(String, String)>,
    custom: BTreeMap<String, String>,
}

fn split_query(query: &str) -> PipelineResult<QueryOptions> {
    let mut options = QueryOptions::default();
    let mut start = 0;

    for pair in query.split('&') {
        let span = Span::from_offsets(start, start + pair.len());
        start += pair.len() + 1;
        if pair.is_empty() {
            continue;
        }

        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if name.starts_with('@') {
            options.aliases.push((name.to_string(), value.to_string()));
        } else if name.starts_with('$') {
            let kind = QueryOptionKind::from_name(name).ok_or_else(|| {
                SyntaxError::UnknownQueryOption {
                    name: name.to_string(),
                    span,
                }
            })?;
            if kind == QueryOptionKind::Levels {
                return Err(SyntaxError::invalid_option_value(
                    name,
                    value,
                    "$levels is only allowed inside $expand",
                )
                .into());
            }
            if options.system.insert(kind, value.to_string()).is_some() {
                return Err(SyntaxError::invalid_option_value(
                    name,
                    value,
                    "the option is given more than once",
                )
                .into());
            }
        } else {
            options.custom.insert(name.to_string(), value.to_string());
        }
    }

    Ok(options)
}

/// Bind the path in resource mode; an empty path yields `None`
fn bind_path(
    model: &dyn EdmModel,
    text: &str,
    config: &RuntimeConfig,
) -> PipelineResult<Option<QueryNode>> {
    if text.trim_matches('/').is_empty() {
        return Ok(None);
    }

    let tokens = lexical::tokenize_with_preferences(text, config.lexical.clone())?;
    let token = syntax::parse_with_preferences(tokens, GrammarEntry::ResourcePath, config.parser.clone())?;
    let mut binder = MetadataBinder::new(model, BindingContext::for_type(TypeReference::Untyped))
        .with_preferences(config.binding.clone());
    Ok(Some(binder.bind_resource_path(&token)?))
}

/// Options range over the elements the path addresses
fn context_for(path: &QueryNode) -> BindingContext {
    let element = path.type_ref().element_type().clone();
    let entity_set = match path {
        QueryNode::EntitySet(node) => Some(node.name.clone()),
        _ => None,
    };
    BindingContext::new(RangeVariable::implicit(element, entity_set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sales_model;
    use crate::pipeline::PipelineError;
    use assert_matches::assert_matches;

    #[test]
    fn test_full_uri() {
        let model = sales_model();
        let parsed = parse_uri(
            &model,
            "Customers?$filter=Name eq @who&@who='Ann'&$orderby=Name desc&$select=Name&$expand=Orders($top=1)&$top=5&$count=true&trace=on",
        )
        .unwrap();

        assert_eq!(parsed.path.as_ref().map(QueryNode::kind_name), Some("EntitySet"));
        assert!(parsed.filter.is_some());
        assert_eq!(parsed.orderby.as_ref().map(|o| o.items.len()), Some(1));
        assert_eq!(parsed.select_expand.as_ref().map(|s| s.expanded.len()), Some(1));
        assert_eq!(parsed.top, Some(5));
        assert_eq!(parsed.count, Some(true));
        assert_eq!(parsed.custom_options.get("trace").map(String::as_str), Some("on"));
        assert!(!parsed.has_diagnostics());
    }

    #[test]
    fn test_options_follow_the_path() {
        let model = sales_model();
        let parsed = parse_uri(&model, "Customers(1)/Orders?$filter=Amount gt 100").unwrap();
        assert!(parsed.filter.unwrap().errors().is_empty());

        let parsed = parse_uri(&model, "Customers(1)/Orders?$filter=Nickname eq 'x'").unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_derived_type_key_lookup() {
        let model = sales_model();
        let parsed = parse_uri(&model, "Customers/Sales.VipCustomer(1)?$filter=Level gt 2").unwrap();
        assert!(!parsed.has_diagnostics());

        let Some(QueryNode::KeyLookup(lookup)) = &parsed.path else {
            panic!("expected a key lookup, got {:?}", parsed.path);
        };
        assert_eq!(lookup.source.kind_name(), "CollectionResourceCast");
        assert_eq!(lookup.type_ref, TypeReference::Entity("Sales.VipCustomer".into()));
        assert_eq!(lookup.keys[0].name, "ID");

        let parsed = parse_uri(&model, "Customers(1)/Sales.VipCustomer").unwrap();
        assert_eq!(parsed.path.as_ref().map(QueryNode::kind_name), Some("SingleResourceCast"));
        assert!(!parsed.has_diagnostics());
    }

    #[test]
    fn test_apply_aliases_reach_orderby() {
        let model = sales_model();
        let parsed = parse_uri(
            &model,
            "Orders?$apply=groupby((Product/Category),aggregate(Amount with sum as Total))&$orderby=Total desc",
        )
        .unwrap();
        assert!(parsed.apply.is_some());
        assert!(!parsed.has_diagnostics());
    }

    #[test]
    fn test_query_string_errors() {
        let model = sales_model();
        assert_matches!(
            parse_uri(&model, "Customers?$top=1&$bogus=2"),
            Err(PipelineError::Syntax(SyntaxError::UnknownQueryOption { ref name, span }))
                if name == "$bogus" && span.start.offset == 7
        );
        assert_matches!(
            parse_uri(&model, "Customers?$top=1&$top=2"),
            Err(PipelineError::Syntax(SyntaxError::InvalidQueryOptionValue { .. }))
        );
        assert_matches!(
            parse_uri(&model, "Customers?$levels=2"),
            Err(PipelineError::Syntax(SyntaxError::InvalidQueryOptionValue { .. }))
        );
    }

    #[test]
    fn test_unknown_entity_set_is_a_diagnostic() {
        let model = sales_model();
        let parsed = parse_uri(&model, "Clients?$filter=Name eq 'x'").unwrap();
        assert!(parsed.has_diagnostics());
        assert!(parsed.path.is_some());
        assert!(parse_uri(&model, "").unwrap().path.is_none());
    }
}
