//! Token-stream parser driving the grammar builders
//!
//! Owns the cursor, the nesting depth and the lambda scope stack. The
//! builders in [`crate::grammar::builders`] see it only through the
//! [`Parser`] trait.

use crate::config::compile_time::syntax::*;
use crate::config::runtime::ParserPreferences;
use crate::grammar::ast::nodes::QueryToken;
use crate::grammar::builders::{
    expect_end, parse_expand, parse_expression, parse_orderby, parse_resource_path, parse_search,
    parse_select, Parser,
};
use crate::logging::codes;
use crate::syntax::error::{SyntaxError, SyntaxResult};
use crate::tokens::{Token, TokenStream};
use crate::utils::Span;
use crate::{log_debug, log_error, log_success};
use serde::{Deserialize, Serialize};

/// Which production a token stream is parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrammarEntry {
    /// `$filter` and any other boolean or value expression
    Expression,
    OrderBy,
    Select,
    Expand,
    /// Expects a stream from [`crate::lexical::tokenize_search`]
    Search,
    ResourcePath,
}

impl GrammarEntry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expression => "expression",
            Self::OrderBy => "orderby",
            Self::Select => "select",
            Self::Expand => "expand",
            Self::Search => "search",
            Self::ResourcePath => "resource path",
        }
    }
}

pub struct QueryParser {
    tokens: TokenStream,
    preferences: ParserPreferences,
    depth: usize,
    range_variables: Vec<String>,
}

impl QueryParser {
    pub fn new(tokens: TokenStream) -> Self {
        Self::with_preferences(tokens, ParserPreferences::default())
    }

    pub fn with_preferences(tokens: TokenStream, preferences: ParserPreferences) -> Self {
        log_debug!("Creating query parser", "tokens" => tokens.len());
        Self {
            tokens,
            preferences,
            depth: 0,
            range_variables: Vec::new(),
        }
    }

    /// Parse the whole stream as `entry`; trailing tokens are an error
    pub fn parse(&mut self, entry: GrammarEntry) -> SyntaxResult<QueryToken> {
        if self.tokens.is_at_end() {
            let error = SyntaxError::EmptyExpression {
                span: self.current_span(),
            };
            log_error!(error.error_code(), "Nothing to parse",
                span = self.current_span(),
                "entry" => entry.as_str()
            );
            return Err(error);
        }

        let result = match self.parse_entry(entry) {
            Ok(token) => expect_end(&*self).map(|_| token),
            Err(error) => Err(error),
        };

        match &result {
            Ok(token) => {
                log_success!(codes::success::PARSE_COMPLETE, "Parsing completed",
                    "entry" => entry.as_str(),
                    "root" => format!("{:?}", token.kind())
                );
            }
            Err(error) => {
                log_error!(error.error_code(), &error.to_string(),
                    span = error.span().unwrap_or_else(|| self.current_span()),
                    "entry" => entry.as_str(),
                    "position" => self.tokens.position()
                );
            }
        }

        result
    }

    fn parse_entry(&mut self, entry: GrammarEntry) -> SyntaxResult<QueryToken> {
        match entry {
            GrammarEntry::Expression => parse_expression(self),
            GrammarEntry::OrderBy => parse_orderby(self).map(QueryToken::OrderBy),
            GrammarEntry::Select => parse_select(self).map(QueryToken::Select),
            GrammarEntry::Expand => parse_expand(self).map(QueryToken::Expand),
            GrammarEntry::Search => parse_search(self),
            GrammarEntry::ResourcePath => parse_resource_path(self),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn tokens(&self) -> &TokenStream {
        &self.tokens
    }
}

impl Parser for QueryParser {
    fn current_token(&self) -> Option<&Token> {
        self.tokens.current_token()
    }

    fn peek_token(&self, n: usize) -> Option<&Token> {
        self.tokens.peek_ahead(n).map(|spanned| &spanned.value)
    }

    fn advance(&mut self) {
        self.tokens.advance();
    }

    fn position(&self) -> usize {
        self.tokens.position()
    }

    fn current_span(&self) -> Span {
        self.tokens
            .current_span()
            .or_else(|| self.tokens.previous_span())
            .unwrap_or_else(Span::dummy)
    }

    fn span_from(&self, start: usize) -> Span {
        self.tokens.span_from(start)
    }

    fn enter_nested(&mut self) -> SyntaxResult<()> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(SyntaxError::MaxRecursionDepth {
                span: self.current_span(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn push_range_variable(&mut self, name: String) {
        self.range_variables.push(name);
    }

    fn pop_range_variable(&mut self) {
        self.range_variables.pop();
    }

    fn is_range_variable(&self, name: &str) -> bool {
        self.range_variables.iter().any(|variable| variable == name)
    }

    fn case_insensitive_keywords(&self) -> bool {
        self.preferences.case_insensitive_keywords
    }
}

pub fn create_parser(tokens: TokenStream) -> QueryParser {
    QueryParser::new(tokens)
}
