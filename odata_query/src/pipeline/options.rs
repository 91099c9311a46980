//! Per-option entry points
//!
//! Every option runs the same stages: tokenize, parse against the option's
//! grammar entry, bind against the parser's context. Failures are logged
//! under the option's name before they are returned.

use crate::apply::ApplyParser;
use crate::config::RuntimeConfig;
use crate::grammar::ast::nodes::QueryToken;
use crate::grammar::keywords::QueryOptionKind;
use crate::lexical;
use crate::logging::{self, codes};
use crate::model::EdmModel;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::semantic_analysis::options::{
    apply_aliases, bind_apply, bind_filter, bind_orderby, bind_search, bind_select_expand,
};
use crate::semantic_analysis::{
    ApplyClause, BindingContext, FilterClause, MetadataBinder, OrderByClause, SearchClause,
    SelectExpandClause,
};
use crate::syntax::{self, GrammarEntry};
use crate::{log_debug, log_error, log_success};
use std::collections::HashMap;

pub struct QueryOptionParser<'m> {
    model: &'m dyn EdmModel,
    context: BindingContext,
    config: RuntimeConfig,
    /// Parsed `@alias` values, keyed without the `@`
    aliases: HashMap<String, QueryToken>,
}

impl<'m> QueryOptionParser<'m> {
    /// Parser whose `$it` ranges over `entity_set`
    pub fn new(model: &'m dyn EdmModel, entity_set: &str) -> Self {
        Self::for_context(model, BindingContext::for_entity_set(model, entity_set))
    }

    pub fn for_context(model: &'m dyn EdmModel, context: BindingContext) -> Self {
        Self {
            model,
            context,
            config: RuntimeConfig::default(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    /// Register `@name=value`; the value is parsed now and bound wherever
    /// the alias is used
    pub fn add_alias(&mut self, name: &str, value: &str) -> PipelineResult<()> {
        let name = name.strip_prefix('@').unwrap_or(name);
        let token = self.parse_text(value, GrammarEntry::Expression)?;
        self.aliases.insert(name.to_string(), token);
        Ok(())
    }

    /// Make the aliases introduced by `$apply` visible to later options
    pub fn register_apply_aliases(&mut self, clause: &ApplyClause) {
        for (alias, type_ref) in apply_aliases(clause) {
            self.context.add_dynamic_property(alias, type_ref);
        }
    }

    pub fn parse_filter(&self, text: &str) -> PipelineResult<FilterClause> {
        self.run(QueryOptionKind::Filter, text, || {
            let token = self.parse_text(text, GrammarEntry::Expression)?;
            Ok(bind_filter(&mut self.binder(), &token)?)
        })
    }

    pub fn parse_orderby(&self, text: &str) -> PipelineResult<OrderByClause> {
        self.run(QueryOptionKind::OrderBy, text, || {
            match self.parse_text(text, GrammarEntry::OrderBy)? {
                QueryToken::OrderBy(token) => Ok(bind_orderby(&mut self.binder(), &token)?),
                other => Err(unexpected_shape(QueryOptionKind::OrderBy, &other)),
            }
        })
    }

    pub fn parse_select_and_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> PipelineResult<SelectExpandClause> {
        let shown = [select, expand].iter().flatten().copied().collect::<Vec<_>>().join(" ");
        self.run(QueryOptionKind::Expand, &shown, || {
            let select = select
                .map(|text| match self.parse_text(text, GrammarEntry::Select)? {
                    QueryToken::Select(token) => Ok(token),
                    other => Err(unexpected_shape(QueryOptionKind::Select, &other)),
                })
                .transpose()?;
            let expand = expand
                .map(|text| match self.parse_text(text, GrammarEntry::Expand)? {
                    QueryToken::Expand(token) => Ok(token),
                    other => Err(unexpected_shape(QueryOptionKind::Expand, &other)),
                })
                .transpose()?;
            Ok(bind_select_expand(
                &mut self.binder(),
                select.as_ref(),
                expand.as_ref(),
            )?)
        })
    }

    pub fn parse_apply(&self, text: &str) -> PipelineResult<ApplyClause> {
        self.run(QueryOptionKind::Apply, text, || {
            let token = ApplyParser::with_preferences(self.config.apply.clone()).parse(text)?;
            Ok(bind_apply(&mut self.binder(), &token)?)
        })
    }

    pub fn parse_search(&self, text: &str) -> PipelineResult<SearchClause> {
        self.run(QueryOptionKind::Search, text, || {
            let tokens = lexical::tokenize_search(text)?;
            let token = syntax::parse_with_preferences(tokens, GrammarEntry::Search, self.config.parser.clone())?;
            Ok(bind_search(&mut self.binder(), &token)?)
        })
    }

    pub fn parse_top(&self, text: &str) -> PipelineResult<i64> {
        let option = QueryOptionKind::Top;
        self.run(option, text, || Ok(syntax::parse_non_negative_integer(option.as_str(), text)?))
    }

    pub fn parse_skip(&self, text: &str) -> PipelineResult<i64> {
        let option = QueryOptionKind::Skip;
        self.run(option, text, || Ok(syntax::parse_non_negative_integer(option.as_str(), text)?))
    }

    pub fn parse_count(&self, text: &str) -> PipelineResult<bool> {
        let option = QueryOptionKind::Count;
        self.run(option, text, || Ok(syntax::parse_boolean_option(option.as_str(), text)?))
    }

    fn parse_text(&self, text: &str, entry: GrammarEntry) -> PipelineResult<QueryToken> {
        let tokens = lexical::tokenize_with_preferences(text, self.config.lexical.clone())?;
        Ok(syntax::parse_with_preferences(tokens, entry, self.config.parser.clone())?)
    }

    fn binder(&self) -> MetadataBinder<'m> {
        MetadataBinder::new(self.model, self.context.clone())
            .with_preferences(self.config.binding.clone())
            .with_aliases(self.aliases.clone())
    }

    fn run<T>(
        &self,
        option: QueryOptionKind,
        text: &str,
        stage: impl FnOnce() -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        logging::with_query_context(option.as_str(), logging::next_query_id(), || {
            log_debug!("Processing query option", "option" => option, "length" => text.len());
            let result = stage();
            match &result {
                Ok(_) => log_success!(codes::success::QUERY_OPTION_PROCESSED, "Query option processed",
                    "option" => option
                ),
                Err(error) => match error.span() {
                    Some(span) => log_error!(error.error_code(), &error.to_string(), span = span,
                        "option" => option
                    ),
                    None => log_error!(error.error_code(), &error.to_string(), "option" => option),
                },
            }
            result
        })
    }
}

fn unexpected_shape(option: QueryOptionKind, token: &QueryToken) -> PipelineError {
    PipelineError::pipeline_error(&format!(
        "{} produced a {:?} token",
        option,
        token.kind()
    ))
}
