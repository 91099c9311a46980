//! Metadata binder
//!
//! Walks a syntactic token tree against the model and produces typed
//! [`QueryNode`]s. Hard failures (no overload, operator type mismatch, bad
//! literal) abort with a [`BindingError`]. References that do not resolve
//! become placeholders inside the node, so one pass reports all of them.
//!
//! Paths arrive child-first (`Name`'s `next` is `Customer`), so a segment
//! binds its `next` first and then looks itself up on the resulting type.

use crate::config::compile_time::binding::MAX_BINDING_DEPTH;
use crate::config::runtime::BindingPreferences;
use crate::grammar::ast::nodes::{FunctionCallToken, FunctionParameterToken, LambdaToken, QueryToken};
use crate::grammar::keywords::{
    BinaryOperatorKind, UnaryOperatorKind, COUNT_SEGMENT, IMPLICIT_RANGE_VARIABLE,
};
use crate::log_debug;
use crate::model::{self, EdmModel, EdmPrimitiveKind, Operation, StructuredKind, TypeReference};
use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
use crate::semantic_analysis::context::{BindingContext, RangeVariable};
use crate::semantic_analysis::error::{BindingError, BindingResult};
use crate::semantic_analysis::functions::{
    built_in_functions, resolve_overload, BuiltInFunction, OverloadResolution, CAST_FUNCTION,
};
use crate::semantic_analysis::literals;
use crate::semantic_analysis::nodes::{
    EntitySetNode, FunctionCallNode, KeyLookupNode, KeyValue, ParameterAliasNode, QueryNode,
};
use crate::tokens::LiteralValue;
use crate::utils::Span;
use crate::validation::Location;
use std::collections::HashMap;

const MAX_BASE_TYPE_CHAIN: usize = 64;

pub struct MetadataBinder<'m> {
    model: &'m dyn EdmModel,
    context: BindingContext,
    preferences: BindingPreferences,
    /// Caller-supplied `@alias` values, keyed without the `@`
    aliases: HashMap<String, QueryToken>,
    alias_stack: Vec<String>,
    /// Set while binding a resource path, where a leading segment names an
    /// entity set rather than a property of `$it`
    resource_path: bool,
    depth: usize,
}

impl<'m> MetadataBinder<'m> {
    pub fn new(model: &'m dyn EdmModel, context: BindingContext) -> Self {
        Self {
            model,
            context,
            preferences: BindingPreferences::default(),
            aliases: HashMap::new(),
            alias_stack: Vec::new(),
            resource_path: false,
            depth: 0,
        }
    }

    pub fn with_preferences(mut self, preferences: BindingPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, QueryToken>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn model(&self) -> &'m dyn EdmModel {
        self.model
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut BindingContext {
        &mut self.context
    }

    pub fn preferences(&self) -> &BindingPreferences {
        &self.preferences
    }

    /// Bind an expression token against the current context
    pub fn bind(&mut self, token: &QueryToken) -> BindingResult<QueryNode> {
        self.enter(token.span(), |binder| binder.bind_token(token))
    }

    /// Bind a resource path such as `Customers(1)/Orders/$count`
    pub fn bind_resource_path(&mut self, token: &QueryToken) -> BindingResult<QueryNode> {
        let previous = std::mem::replace(&mut self.resource_path, true);
        let result = self.bind(token);
        self.resource_path = previous;
        result
    }

    fn enter<T>(
        &mut self,
        span: Span,
        bind: impl FnOnce(&mut Self) -> BindingResult<T>,
    ) -> BindingResult<T> {
        if self.depth >= MAX_BINDING_DEPTH {
            return Err(BindingError::MaxBindingDepth {
                limit: MAX_BINDING_DEPTH,
                span,
            });
        }
        self.depth += 1;
        let result = bind(self);
        self.depth -= 1;
        result
    }

    fn bind_token(&mut self, token: &QueryToken) -> BindingResult<QueryNode> {
        let node = match token {
            QueryToken::Literal { value, text, span } => {
                literals::bind_literal(self.model, value, text, *span)?
            }
            QueryToken::StringLiteral { text, span } => QueryNode::search_term(text.as_str(), *span),
            QueryToken::BinaryOperator {
                kind,
                left,
                right,
                span,
            } => self.bind_binary(*kind, left, right, *span)?,
            QueryToken::UnaryOperator {
                kind,
                operand,
                span,
            } => self.bind_unary(*kind, operand, *span)?,
            QueryToken::RangeVariable { name, span } => self.bind_range_variable(name, *span)?,
            QueryToken::EndPath {
                identifier,
                next,
                span,
            } => self.bind_end_path(identifier, next.as_deref(), *span, false)?,
            QueryToken::DottedIdentifier {
                identifier,
                next,
                span,
            } => self.bind_type_segment(identifier, next.as_deref(), *span)?,
            QueryToken::FunctionCall(call) => self.bind_function_call(call)?,
            QueryToken::Any(lambda) => self.bind_lambda(false, lambda)?,
            QueryToken::All(lambda) => self.bind_lambda(true, lambda)?,
            QueryToken::FunctionParameter(parameter) => self.bind(&parameter.value)?,
            QueryToken::FunctionParameterAlias { alias, span } => self.bind_alias(alias, *span)?,
            other => {
                return Err(BindingError::UnsupportedToken {
                    kind: format!("{:?}", other.kind()),
                    span: other.span(),
                })
            }
        };

        if self.preferences.log_binding_details {
            log_debug!("Bound token",
                "token" => format!("{:?}", token.kind()),
                "node" => node.kind_name(),
                "type" => node.type_ref()
            );
        }
        Ok(node)
    }

    // === paths ===

    /// Bind a token that precedes another path segment
    fn bind_parent(&mut self, token: &QueryToken) -> BindingResult<QueryNode> {
        match token {
            QueryToken::EndPath {
                identifier,
                next,
                span,
            } => self.enter(token.span(), |binder| {
                binder.bind_end_path(identifier, next.as_deref(), *span, true)
            }),
            other => self.bind(other),
        }
    }

    fn bind_source(&mut self, next: Option<&QueryToken>, span: Span) -> BindingResult<QueryNode> {
        match next {
            Some(parent) => self.bind_parent(parent),
            None => Ok(QueryNode::range_variable(
                self.context.implicit(),
                Span::at(span.start()),
            )),
        }
    }

    fn bind_end_path(
        &mut self,
        identifier: &str,
        next: Option<&QueryToken>,
        span: Span,
        intermediate: bool,
    ) -> BindingResult<QueryNode> {
        if next.is_none() && self.resource_path {
            return Ok(self.bind_entity_set(identifier, span));
        }

        let source = self.bind_source(next, span)?;
        let full_span = next.map_or(span, |parent| parent.span().merge(span));

        if identifier == COUNT_SEGMENT {
            return self.bind_count(source, full_span);
        }
        self.access_member(source, identifier, span, full_span, intermediate)
    }

    /// Look `name` up on the type of `source`
    ///
    /// A segment that is followed by more segments and does not resolve is
    /// treated as a navigation to an unknown entity type; a final one as an
    /// unknown property.
    fn access_member(
        &mut self,
        source: QueryNode,
        name: &str,
        segment_span: Span,
        full_span: Span,
        intermediate: bool,
    ) -> BindingResult<QueryNode> {
        let missing_kind = if intermediate {
            UnresolvedKind::EntityType
        } else {
            UnresolvedKind::Property
        };
        let placeholder_node = |source: QueryNode, placeholder: UnresolvedRef| {
            let type_ref = TypeReference::Unresolved(placeholder);
            if intermediate {
                QueryNode::navigation(source, name, type_ref, full_span)
            } else {
                QueryNode::property_access(source, name, type_ref, full_span, false)
            }
        };

        if is_implicit_variable(&source) {
            if let Some(type_ref) = self.context.dynamic_property(name) {
                let type_ref = type_ref.clone();
                return Ok(QueryNode::property_access(source, name, type_ref, full_span, false));
            }
        }

        let source_type = source.type_ref().clone();
        let type_name = match &source_type {
            TypeReference::Unresolved(cause) => {
                let placeholder = UnresolvedRef::derived(
                    missing_kind,
                    name,
                    Location::Query(segment_span),
                    cause,
                );
                return Ok(placeholder_node(source, placeholder));
            }
            TypeReference::Untyped => {
                return Ok(QueryNode::property_access(
                    source,
                    name,
                    TypeReference::Untyped,
                    full_span,
                    true,
                ));
            }
            TypeReference::Entity(type_name) | TypeReference::Complex(type_name) => type_name.clone(),
            TypeReference::Collection(_) => {
                return Err(BindingError::InvalidPropertyAccess {
                    name: name.to_string(),
                    on: source_type.to_string(),
                    reason: "members of a collection are reached through any/all".to_string(),
                    span: segment_span,
                });
            }
            TypeReference::Primitive(_) | TypeReference::Enum(_) => {
                return Err(BindingError::InvalidPropertyAccess {
                    name: name.to_string(),
                    on: source_type.to_string(),
                    reason: "primitive values have no properties".to_string(),
                    span: segment_span,
                });
            }
        };

        match self.model.find_property(&type_name, name) {
            Some(property) => {
                let type_ref = model::property_type(self.model, &type_name, property);
                Ok(if property.is_navigation() {
                    QueryNode::navigation(source, name, type_ref, full_span)
                } else {
                    QueryNode::property_access(source, name, type_ref, full_span, false)
                })
            }
            None if self.preferences.allow_open_properties && self.is_open_type(&type_name) => {
                Ok(QueryNode::property_access(
                    source,
                    name,
                    TypeReference::Untyped,
                    full_span,
                    true,
                ))
            }
            None => {
                let placeholder = UnresolvedRef::new(missing_kind, name, Location::Query(segment_span));
                Ok(placeholder_node(source, placeholder))
            }
        }
    }

    fn is_open_type(&self, type_name: &str) -> bool {
        let mut current = self.model.find_structured_type(type_name);
        for _ in 0..MAX_BASE_TYPE_CHAIN {
            let Some(structured) = current else {
                return false;
            };
            if structured.open {
                return true;
            }
            current = structured
                .base_type
                .as_deref()
                .and_then(|base| self.model.find_structured_type(base));
        }
        false
    }

    fn bind_count(&mut self, source: QueryNode, span: Span) -> BindingResult<QueryNode> {
        if source.is_collection() || source.type_ref().is_open() {
            Ok(QueryNode::count(source, span))
        } else {
            Err(BindingError::InvalidPropertyAccess {
                name: COUNT_SEGMENT.to_string(),
                on: source.type_ref().to_string(),
                reason: "only collections can be counted".to_string(),
                span,
            })
        }
    }

    fn bind_entity_set(&self, name: &str, span: Span) -> QueryNode {
        let type_ref = match self.model.find_entity_set(name) {
            Some(entity_set) => TypeReference::collection_of(model::resolve_type_name(
                self.model,
                &entity_set.entity_type,
                UnresolvedKind::EntityType,
                Location::model(entity_set.name.as_str()),
            )),
            None => TypeReference::collection_of(TypeReference::Unresolved(UnresolvedRef::new(
                UnresolvedKind::EntitySet,
                name,
                Location::Query(span),
            ))),
        };
        QueryNode::EntitySet(EntitySetNode {
            name: name.to_string(),
            type_ref,
            span,
        })
    }

    /// `Namespace.Type` segment: a cast of whatever precedes it
    fn bind_type_segment(
        &mut self,
        identifier: &str,
        next: Option<&QueryToken>,
        span: Span,
    ) -> BindingResult<QueryNode> {
        let source = self.bind_source(next, span)?;
        let full_span = next.map_or(span, |parent| parent.span().merge(span));
        self.cast_to(source, identifier, span, full_span)
    }

    fn cast_to(
        &self,
        source: QueryNode,
        identifier: &str,
        span: Span,
        full_span: Span,
    ) -> BindingResult<QueryNode> {
        let target = model::resolve_type_name(
            self.model,
            identifier,
            UnresolvedKind::Type,
            Location::Query(span),
        );

        let source_type = source.type_ref().clone();
        let element = source_type.element_type();
        let castable = match (element, &target) {
            (_, TypeReference::Unresolved(_)) => true,
            (source_element, _) if source_element.is_open() => true,
            (TypeReference::Entity(from), TypeReference::Entity(to))
            | (TypeReference::Complex(from), TypeReference::Complex(to)) => {
                model::is_derived_from(self.model, to, from)
            }
            _ => false,
        };
        if !castable {
            return Err(BindingError::InvalidCast {
                from_type: source_type.to_string(),
                to_type: target.to_string(),
                span,
            });
        }

        let type_ref = if source_type.is_collection() {
            TypeReference::collection_of(target)
        } else {
            target
        };
        Ok(QueryNode::cast(source, type_ref, full_span))
    }

    fn bind_range_variable(&self, name: &str, span: Span) -> BindingResult<QueryNode> {
        match self.context.lookup(name) {
            Some(variable) => Ok(QueryNode::range_variable(variable, span)),
            None => Err(BindingError::InvalidPropertyAccess {
                name: name.to_string(),
                on: "the current scope".to_string(),
                reason: "range variable is not in scope".to_string(),
                span,
            }),
        }
    }

    // === lambdas ===

    fn bind_lambda(&mut self, all: bool, lambda: &LambdaToken) -> BindingResult<QueryNode> {
        let source = self.bind(&lambda.parent)?;
        let source_type = source.type_ref();
        let element = match source_type {
            TypeReference::Collection(element) => element.as_ref().clone(),
            open if open.is_open() => open.clone(),
            other => {
                return Err(BindingError::InvalidLambdaSource {
                    expression: lambda.parent.to_string(),
                    found: other.to_string(),
                    span: lambda.parent.span(),
                });
            }
        };
        let span = lambda.parent.span().merge(lambda.span);

        let (Some(parameter), Some(expression)) = (&lambda.parameter, &lambda.expression) else {
            return Ok(QueryNode::lambda(all, source, None, None, span));
        };

        let variable = RangeVariable::new(parameter.as_str(), element);
        self.context.push_lambda(variable.clone(), lambda.span)?;
        let body = self.bind(expression);
        self.context.pop_lambda();
        let body = body?;

        if !body.type_ref().is_boolean() && !body.type_ref().is_open() {
            return Err(BindingError::NonBooleanExpression {
                found: body.type_ref().to_string(),
                span: expression.span(),
            });
        }
        Ok(QueryNode::lambda(all, source, Some(variable), Some(body), span))
    }

    // === operators ===

    fn bind_binary(
        &mut self,
        operator: BinaryOperatorKind,
        left: &QueryToken,
        right: &QueryToken,
        span: Span,
    ) -> BindingResult<QueryNode> {
        let left = self.bind(left)?;
        let right = self.bind(right)?;
        let (left_type, right_type) = (left.type_ref().clone(), right.type_ref().clone());
        let mismatch = || BindingError::TypeMismatch {
            operator: operator.as_str().to_string(),
            left: left_type.to_string(),
            right: right_type.to_string(),
            span,
        };
        let boolean = TypeReference::Primitive(EdmPrimitiveKind::Boolean);

        if operator.is_logical() {
            let accepts = |t: &TypeReference| t.is_boolean() || t.is_open();
            if !accepts(&left_type) || !accepts(&right_type) {
                return Err(mismatch());
            }
            return Ok(QueryNode::binary(operator, left, right, boolean, span));
        }

        if operator == BinaryOperatorKind::Has {
            let left_ok = matches!(left_type, TypeReference::Enum(_)) || left_type.is_open();
            let right_ok = match (&left_type, &right_type) {
                (_, open) if open.is_open() => true,
                (TypeReference::Enum(l), TypeReference::Enum(r)) => l == r,
                (l, TypeReference::Enum(_)) => l.is_open(),
                _ => false,
            };
            if !left_ok || !right_ok {
                return Err(mismatch());
            }
            return Ok(QueryNode::binary(operator, left, right, boolean, span));
        }

        if left_type.is_open() || right_type.is_open() {
            let type_ref = if operator.is_comparison() {
                boolean
            } else if left_type.is_open() {
                right_type.clone()
            } else {
                left_type.clone()
            };
            return Ok(QueryNode::binary(operator, left, right, type_ref, span));
        }

        if let (Some(l), Some(r)) = (left_type.primitive(), right_type.primitive()) {
            if let Some(common) = EdmPrimitiveKind::common_numeric(l, r) {
                let common = TypeReference::Primitive(common);
                let type_ref = if operator.is_comparison() {
                    boolean
                } else {
                    common.clone()
                };
                return Ok(QueryNode::binary(
                    operator,
                    left.converted_to(&common),
                    right.converted_to(&common),
                    type_ref,
                    span,
                ));
            }
        }

        if operator.is_comparison() {
            let comparable = left_type == right_type
                && (operator.is_equality()
                    || left_type.primitive().is_some()
                    || matches!(left_type, TypeReference::Enum(_)));
            if !comparable {
                return Err(mismatch());
            }
            return Ok(QueryNode::binary(operator, left, right, boolean, span));
        }

        match temporal_arithmetic(operator, left_type.primitive(), right_type.primitive()) {
            Some(result) => Ok(QueryNode::binary(
                operator,
                left,
                right,
                TypeReference::Primitive(result),
                span,
            )),
            None => Err(mismatch()),
        }
    }

    fn bind_unary(
        &mut self,
        operator: UnaryOperatorKind,
        operand: &QueryToken,
        span: Span,
    ) -> BindingResult<QueryNode> {
        let operand = self.bind(operand)?;
        let operand_type = operand.type_ref().clone();
        let accepted = operand_type.is_open()
            || match operator {
                UnaryOperatorKind::Not => operand_type.is_boolean(),
                UnaryOperatorKind::Negate => {
                    operand_type.is_numeric() || operand_type.is_primitive(EdmPrimitiveKind::Duration)
                }
            };
        if !accepted {
            return Err(BindingError::UnaryTypeMismatch {
                operator: operator.as_str().to_string(),
                operand: operand_type.to_string(),
                span,
            });
        }
        Ok(QueryNode::unary(operator, operand, operand_type, span))
    }

    // === functions and key lookups ===

    fn bind_function_call(&mut self, call: &FunctionCallToken) -> BindingResult<QueryNode> {
        let qualified = call.name.contains('.');
        match &call.source {
            Some(parent) if !qualified => {
                let source = self.bind_parent(parent)?;
                let full_span = parent.span().merge(call.span);
                let name_span = Span::from_offsets(
                    call.span.start().offset,
                    call.span.start().offset + call.name.len(),
                );
                let collection = self.access_member(source, &call.name, name_span, full_span, false)?;
                self.bind_key_lookup(collection, call, full_span)
            }
            Some(parent) => {
                let source = self.bind_parent(parent)?;
                if self.is_derived_entity_of(&source, &call.name) {
                    // `Customers/Sales.VipCustomer(1)`: cast, then key
                    let full_span = parent.span().merge(call.span);
                    let name_span = Span::from_offsets(
                        call.span.start().offset,
                        call.span.start().offset + call.name.len(),
                    );
                    let cast = self.cast_to(source, &call.name, name_span, full_span)?;
                    return self.bind_key_lookup(cast, call, full_span);
                }
                self.bind_operation(call, Some(source))
            }
            None if qualified => self.bind_operation(call, None),
            None if self.resource_path => {
                let entity_set = self.bind_entity_set(&call.name, call.span);
                self.bind_key_lookup(entity_set, call, call.span)
            }
            None => self.bind_built_in_or_unknown(call),
        }
    }

    /// `name` is no operation but an entity type derived from the element
    /// type of the collection `source`
    fn is_derived_entity_of(&self, source: &QueryNode, name: &str) -> bool {
        let TypeReference::Collection(element) = source.type_ref() else {
            return false;
        };
        let TypeReference::Entity(from) = element.as_ref() else {
            return false;
        };
        if !self.model.find_operations(name).is_empty() {
            return false;
        }
        let is_entity = matches!(
            self.model.find_structured_type(name),
            Some(structured) if structured.kind == StructuredKind::Entity
        );
        is_entity && model::is_derived_from(self.model, name, from)
    }

    fn bind_arguments(&mut self, arguments: &[FunctionParameterToken]) -> BindingResult<Vec<QueryNode>> {
        arguments.iter().map(|argument| self.bind(&argument.value)).collect()
    }

    fn bind_built_in_or_unknown(&mut self, call: &FunctionCallToken) -> BindingResult<QueryNode> {
        let case_insensitive = self.preferences.case_insensitive_functions;
        match built_in_functions().lookup(&call.name, case_insensitive) {
            Some(function) if function.is_type_function() => self.bind_type_function(function, call),
            Some(function) => self.bind_built_in(function, call),
            None => {
                let arguments = self.bind_arguments(&call.arguments)?;
                Ok(QueryNode::function_call(FunctionCallNode {
                    name: call.name.clone(),
                    arguments,
                    source: None,
                    type_argument: None,
                    type_ref: TypeReference::Unresolved(UnresolvedRef::new(
                        UnresolvedKind::Function,
                        call.name.as_str(),
                        Location::Query(call.span),
                    )),
                    span: call.span,
                }))
            }
        }
    }

    fn bind_built_in(
        &mut self,
        function: &'static BuiltInFunction,
        call: &FunctionCallToken,
    ) -> BindingResult<QueryNode> {
        let arguments = self.bind_arguments(&call.arguments)?;
        let argument_types: Vec<TypeReference> =
            arguments.iter().map(|argument| argument.type_ref().clone()).collect();

        let signature = match resolve_overload(&function.signatures, &argument_types) {
            OverloadResolution::Matched(signature) => signature,
            OverloadResolution::NoMatch { candidates } => {
                return Err(BindingError::NoMatchingOverload {
                    name: function.name.to_string(),
                    argument_types: join_types(&argument_types),
                    candidates,
                    span: call.span,
                });
            }
            OverloadResolution::Ambiguous { candidates } => {
                return Err(BindingError::AmbiguousOverload {
                    name: function.name.to_string(),
                    candidates,
                    span: call.span,
                });
            }
        };

        let arguments = arguments
            .into_iter()
            .zip(&signature.parameters)
            .map(|(argument, parameter)| argument.converted_to(&TypeReference::Primitive(*parameter)))
            .collect();
        Ok(QueryNode::function_call(FunctionCallNode {
            name: function.name.to_string(),
            arguments,
            source: None,
            type_argument: None,
            type_ref: TypeReference::Primitive(signature.return_type),
            span: call.span,
        }))
    }

    /// `cast` and `isof`: the last argument names a type, an optional first
    /// argument is the value (`$it` otherwise)
    fn bind_type_function(
        &mut self,
        function: &'static BuiltInFunction,
        call: &FunctionCallToken,
    ) -> BindingResult<QueryNode> {
        let no_match = |argument_types: String| BindingError::NoMatchingOverload {
            name: function.name.to_string(),
            argument_types,
            candidates: 2,
            span: call.span,
        };

        let (value, type_argument) = match call.arguments.as_slice() {
            [type_argument] => (None, type_argument),
            [value, type_argument] => (Some(value), type_argument),
            other => {
                let shown: Vec<String> = other.iter().map(|argument| argument.to_string()).collect();
                return Err(no_match(shown.join(", ")));
            }
        };
        let Some(type_name) = type_name_argument(&type_argument.value) else {
            return Err(no_match(type_argument.to_string()));
        };

        let source = match value {
            Some(value) => self.bind(&value.value)?,
            None => QueryNode::range_variable(self.context.implicit(), Span::at(call.span.start())),
        };
        let target = model::resolve_type_name(
            self.model,
            &type_name,
            UnresolvedKind::Type,
            Location::Query(type_argument.span),
        );

        let type_ref = if function.name == CAST_FUNCTION {
            let source_type = source.type_ref();
            let castable = match (source_type.element_type(), &target) {
                (_, TypeReference::Unresolved(_)) => true,
                (from, _) if from.is_open() => true,
                (TypeReference::Primitive(_), TypeReference::Primitive(_)) => true,
                (TypeReference::Enum(_), TypeReference::Primitive(EdmPrimitiveKind::String)) => true,
                (TypeReference::Entity(from), TypeReference::Entity(to))
                | (TypeReference::Complex(from), TypeReference::Complex(to)) => {
                    model::is_derived_from(self.model, to, from)
                        || model::is_derived_from(self.model, from, to)
                }
                _ => false,
            };
            if !castable {
                return Err(BindingError::InvalidCast {
                    from_type: source_type.to_string(),
                    to_type: target.to_string(),
                    span: call.span,
                });
            }
            if source_type.is_collection() {
                TypeReference::collection_of(target.clone())
            } else {
                target.clone()
            }
        } else {
            TypeReference::Primitive(EdmPrimitiveKind::Boolean)
        };

        Ok(QueryNode::function_call(FunctionCallNode {
            name: function.name.to_string(),
            arguments: vec![source],
            source: None,
            type_argument: Some(target),
            type_ref,
            span: call.span,
        }))
    }

    /// Model-declared operation, bound to `source` when one is given
    fn bind_operation(
        &mut self,
        call: &FunctionCallToken,
        source: Option<QueryNode>,
    ) -> BindingResult<QueryNode> {
        let span = call
            .source
            .as_ref()
            .map_or(call.span, |parent| parent.span().merge(call.span));
        let candidates = self.model.find_operations(&call.name);
        let arguments = self.bind_arguments(&call.arguments)?;

        if candidates.is_empty() {
            return Ok(QueryNode::function_call(FunctionCallNode {
                name: call.name.clone(),
                arguments,
                source: source.map(Box::new),
                type_argument: None,
                type_ref: TypeReference::Unresolved(UnresolvedRef::new(
                    UnresolvedKind::Function,
                    call.name.as_str(),
                    Location::Query(call.span),
                )),
                span,
            }));
        }

        // A bound operation called without a path binds to `$it`
        let source = match source {
            None if !self.resource_path && candidates.iter().all(|operation| operation.is_bound) => Some(
                QueryNode::range_variable(self.context.implicit(), Span::at(call.span.start())),
            ),
            other => other,
        };

        let names: Vec<Option<&str>> = call
            .arguments
            .iter()
            .map(|argument| argument.name.as_deref())
            .collect();
        let mut best: Vec<(&Operation, Vec<usize>, usize)> = Vec::new();
        for &operation in &candidates {
            let Some((order, exact)) = self.match_operation(operation, source.as_ref(), &names, &arguments) else {
                continue;
            };
            match best.first().map(|(_, _, score)| *score) {
                Some(score) if exact < score => {}
                Some(score) if exact == score => best.push((operation, order, exact)),
                _ => best = vec![(operation, order, exact)],
            }
        }

        let (operation, order) = match best.as_slice() {
            [(operation, order, _)] => (*operation, order.clone()),
            [] => {
                let argument_types: Vec<TypeReference> =
                    arguments.iter().map(|argument| argument.type_ref().clone()).collect();
                return Err(BindingError::NoMatchingOverload {
                    name: call.name.clone(),
                    argument_types: join_types(&argument_types),
                    candidates: candidates.len(),
                    span: call.span,
                });
            }
            matches => {
                return Err(BindingError::AmbiguousOverload {
                    name: call.name.clone(),
                    candidates: matches.len(),
                    span: call.span,
                });
            }
        };

        let parameters = operation.call_parameters();
        let ordered = order
            .iter()
            .zip(parameters)
            .map(|(&index, parameter)| {
                let argument = arguments[index].clone();
                let expected = self.parameter_type(&parameter.type_name);
                if expected.primitive().is_some() {
                    argument.converted_to(&expected)
                } else {
                    argument
                }
            })
            .collect();
        let type_ref = model::resolve_type_name(
            self.model,
            &operation.return_type,
            UnresolvedKind::Type,
            Location::model(operation.qualified_name()),
        );

        Ok(QueryNode::function_call(FunctionCallNode {
            name: operation.qualified_name(),
            arguments: ordered,
            source: source.map(Box::new),
            type_argument: None,
            type_ref,
            span,
        }))
    }

    fn parameter_type(&self, type_name: &str) -> TypeReference {
        model::resolve_type_name(self.model, type_name, UnresolvedKind::Type, Location::Unknown)
    }

    /// Argument order matching `operation`'s parameters, with the number of
    /// exactly typed arguments; `None` when the operation does not accept them
    fn match_operation(
        &self,
        operation: &Operation,
        source: Option<&QueryNode>,
        names: &[Option<&str>],
        arguments: &[QueryNode],
    ) -> Option<(Vec<usize>, usize)> {
        if operation.is_bound != source.is_some() {
            return None;
        }
        if let Some(source) = source {
            let binding = operation.parameters.first()?;
            let expected = self.parameter_type(&binding.type_name);
            if !model::is_assignable(self.model, source.type_ref(), &expected) {
                return None;
            }
        }

        let parameters = operation.call_parameters();
        if parameters.len() != arguments.len() {
            return None;
        }
        let order: Vec<usize> = if names.iter().any(Option::is_some) {
            parameters
                .iter()
                .map(|parameter| names.iter().position(|name| *name == Some(parameter.name.as_str())))
                .collect::<Option<_>>()?
        } else {
            (0..arguments.len()).collect()
        };

        let mut exact = 0;
        for (&index, parameter) in order.iter().zip(parameters) {
            let expected = self.parameter_type(&parameter.type_name);
            let actual = arguments[index].type_ref();
            if !model::is_assignable(self.model, actual, &expected) {
                return None;
            }
            if *actual == expected {
                exact += 1;
            }
        }
        Some((order, exact))
    }

    fn bind_key_lookup(
        &mut self,
        source: QueryNode,
        call: &FunctionCallToken,
        span: Span,
    ) -> BindingResult<QueryNode> {
        let source_type = source.type_ref().clone();
        let element = match &source_type {
            TypeReference::Collection(element) => element.as_ref().clone(),
            open if open.is_open() => open.clone(),
            other => {
                return Err(BindingError::InvalidKey {
                    target: call.name.clone(),
                    reason: format!("{} is not a collection", other),
                    span,
                });
            }
        };

        let key = match element.structured_name() {
            Some(type_name) => self.key_properties(type_name),
            None if element.is_open() => Vec::new(),
            None => {
                return Err(BindingError::InvalidKey {
                    target: call.name.clone(),
                    reason: format!("{} has no key", element),
                    span,
                });
            }
        };

        let mut keys = Vec::with_capacity(call.arguments.len());
        for (position, argument) in call.arguments.iter().enumerate() {
            let name = match (&argument.name, key.as_slice()) {
                (Some(name), _) => name.clone(),
                (None, [single]) if call.arguments.len() == 1 => single.clone(),
                (None, _) if element.is_open() => position.to_string(),
                (None, _) => {
                    return Err(BindingError::InvalidKey {
                        target: call.name.clone(),
                        reason: format!("a key of {} properties needs name=value pairs", key.len()),
                        span,
                    });
                }
            };
            let value = self.bind(&argument.value)?;
            keys.push(KeyValue { name, value });
        }

        if let Some(type_name) = element.structured_name() {
            if keys.len() != key.len() {
                return Err(BindingError::InvalidKey {
                    target: call.name.clone(),
                    reason: format!("expected {} key value(s), found {}", key.len(), keys.len()),
                    span,
                });
            }
            for key_value in &keys {
                let Some(property) = key
                    .contains(&key_value.name)
                    .then(|| self.model.find_property(type_name, &key_value.name))
                    .flatten()
                else {
                    return Err(BindingError::InvalidKey {
                        target: call.name.clone(),
                        reason: format!("'{}' is not a key property", key_value.name),
                        span,
                    });
                };
                let expected = model::property_type(self.model, type_name, property);
                if !model::is_assignable(self.model, key_value.value.type_ref(), &expected) {
                    return Err(BindingError::InvalidKey {
                        target: call.name.clone(),
                        reason: format!(
                            "'{}' expects {}, found {}",
                            key_value.name,
                            expected,
                            key_value.value.type_ref()
                        ),
                        span,
                    });
                }
            }
        }

        Ok(QueryNode::KeyLookup(KeyLookupNode {
            source: Box::new(source),
            keys,
            type_ref: element,
            span,
        }))
    }

    /// Key of the type, inherited from the nearest base that declares one
    fn key_properties(&self, type_name: &str) -> Vec<String> {
        let mut current = self.model.find_structured_type(type_name);
        for _ in 0..MAX_BASE_TYPE_CHAIN {
            let Some(structured) = current else {
                break;
            };
            if !structured.key.is_empty() {
                return structured.key.clone();
            }
            current = structured
                .base_type
                .as_deref()
                .and_then(|base| self.model.find_structured_type(base));
        }
        Vec::new()
    }

    // === aliases ===

    fn bind_alias(&mut self, alias: &str, span: Span) -> BindingResult<QueryNode> {
        let placeholder = |reason: &str| {
            TypeReference::Unresolved(UnresolvedRef::new(
                UnresolvedKind::ParameterAlias,
                format!("@{}{}", alias, reason),
                Location::Query(span),
            ))
        };

        let Some(token) = self.aliases.get(alias).cloned() else {
            return Ok(QueryNode::ParameterAlias(ParameterAliasNode {
                alias: alias.to_string(),
                value: None,
                type_ref: placeholder(""),
                span,
            }));
        };
        if self.alias_stack.iter().any(|active| active == alias) {
            return Ok(QueryNode::ParameterAlias(ParameterAliasNode {
                alias: alias.to_string(),
                value: None,
                type_ref: placeholder(" (refers to itself)"),
                span,
            }));
        }

        self.alias_stack.push(alias.to_string());
        let value = self.bind(&token);
        self.alias_stack.pop();
        let value = value?;

        Ok(QueryNode::ParameterAlias(ParameterAliasNode {
            alias: alias.to_string(),
            type_ref: value.type_ref().clone(),
            value: Some(Box::new(value)),
            span,
        }))
    }
}

fn is_implicit_variable(node: &QueryNode) -> bool {
    matches!(
        node,
        QueryNode::ResourceRangeVariableReference(variable)
            | QueryNode::NonResourceRangeVariableReference(variable)
            if variable.name == IMPLICIT_RANGE_VARIABLE
    )
}

/// Type named by the last argument of `cast`/`isof`
fn type_name_argument(token: &QueryToken) -> Option<String> {
    match token {
        QueryToken::DottedIdentifier {
            identifier,
            next: None,
            ..
        } => Some(identifier.clone()),
        QueryToken::Literal {
            value: LiteralValue::String(name),
            ..
        } => Some(name.clone()),
        _ => None,
    }
}

/// Result type of date/time arithmetic, `None` when not defined
fn temporal_arithmetic(
    operator: BinaryOperatorKind,
    left: Option<EdmPrimitiveKind>,
    right: Option<EdmPrimitiveKind>,
) -> Option<EdmPrimitiveKind> {
    use BinaryOperatorKind::{Add, Subtract};
    use EdmPrimitiveKind::{Date, DateTimeOffset, Duration};

    match (operator, left?, right?) {
        (Add | Subtract, DateTimeOffset, Duration) => Some(DateTimeOffset),
        (Add | Subtract, Date, Duration) => Some(Date),
        (Add | Subtract, Duration, Duration) => Some(Duration),
        (Subtract, DateTimeOffset, DateTimeOffset) => Some(Duration),
        (Subtract, Date, Date) => Some(Duration),
        _ => None,
    }
}

fn join_types(types: &[TypeReference]) -> String {
    types
        .iter()
        .map(TypeReference::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical;
    use crate::logging::codes;
    use crate::model::fixtures::sales_model;
    use crate::model::InMemoryModel;
    use crate::syntax::{self, GrammarEntry};
    use assert_matches::assert_matches;

    fn parse(text: &str) -> QueryToken {
        let tokens = lexical::tokenize(text).unwrap();
        syntax::parse(tokens, GrammarEntry::Expression).unwrap()
    }

    fn bind_on(model: &InMemoryModel, entity_set: &str, text: &str) -> BindingResult<QueryNode> {
        let context = BindingContext::for_entity_set(model, entity_set);
        MetadataBinder::new(model, context).bind(&parse(text))
    }

    fn bind(entity_set: &str, text: &str) -> BindingResult<QueryNode> {
        bind_on(&sales_model(), entity_set, text)
    }

    #[test]
    fn test_property_comparison_converts_to_common_type() {
        let node = bind("Orders", "Quantity gt 5.5").unwrap();
        let QueryNode::BinaryOperator(comparison) = &node else {
            panic!("unexpected node {:?}", node);
        };
        assert!(node.type_ref().is_boolean());
        assert_eq!(comparison.left.kind_name(), "Convert");
        assert_eq!(comparison.left.type_ref(), &TypeReference::Primitive(EdmPrimitiveKind::Double));
        assert!(!node.has_errors());
    }

    #[test]
    fn test_precedence_survives_binding() {
        let node = bind("Customers", "Name eq 'a' or Name eq 'b' and ID gt 1").unwrap();
        let QueryNode::BinaryOperator(or) = &node else {
            panic!("unexpected node {:?}", node);
        };
        assert_eq!(or.operator, BinaryOperatorKind::Or);
        assert_matches!(&*or.right, QueryNode::BinaryOperator(and) if and.operator == BinaryOperatorKind::And);
    }

    #[test]
    fn test_navigation_multiplicity() {
        let single = bind("Orders", "Customer/Name").unwrap();
        let QueryNode::SingleValuePropertyAccess(access) = &single else {
            panic!("unexpected node {:?}", single);
        };
        assert_eq!(access.source.kind_name(), "SingleNavigationNode");

        let collection = bind("Customers", "Orders/$count").unwrap();
        let QueryNode::Count(count) = &collection else {
            panic!("unexpected node {:?}", collection);
        };
        assert_eq!(count.source.kind_name(), "CollectionNavigationNode");
        assert_eq!(collection.type_ref(), &TypeReference::Primitive(EdmPrimitiveKind::Int64));
    }

    #[test]
    fn test_unknown_path_becomes_placeholder() {
        let node = bind("Customers", "NoSuchEntity/Name").unwrap();
        let QueryNode::SingleValuePropertyAccess(access) = &node else {
            panic!("unexpected node {:?}", node);
        };
        let source_type = access.source.type_ref();
        assert_eq!(source_type.unresolved().map(|p| p.kind()), Some(UnresolvedKind::EntityType));

        let errors = node.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::binding::UNRESOLVED_ENTITY_TYPE);
        assert_eq!(errors[0].location, Location::Query(Span::from_offsets(0, 12)));
    }

    #[test]
    fn test_binding_twice_gives_equal_nodes() {
        let model = sales_model();
        let first = bind_on(&model, "Customers", "NoSuchEntity/Name").unwrap();
        let second = bind_on(&model, "Customers", "NoSuchEntity/Name").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.errors()[0].message, second.errors()[0].message);

        let first = bind_on(&model, "Customers", "Orders/any(o: o/Amount gt 100)").unwrap();
        let second = bind_on(&model, "Customers", "Orders/any(o: o/Amount gt 100)").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lambda_scopes() {
        let node = bind("Customers", "Orders/any(o: o/Amount gt 100 and o/Customer/Name eq Name)").unwrap();
        let QueryNode::Any(lambda) = &node else {
            panic!("unexpected node {:?}", node);
        };
        let variable = lambda.range_variable.as_ref().unwrap();
        assert_eq!(variable.name, "o");
        assert_eq!(variable.type_ref, TypeReference::Entity("Sales.Order".into()));
        assert!(!node.has_errors());

        assert!(bind("Customers", "Orders/any()").is_ok());
        assert!(bind("Customers", "Tags/all(t: t ne 'x')").is_ok());
    }

    #[test]
    fn test_lambda_needs_collection() {
        assert_matches!(
            bind("Orders", "Customer/any(c: c/Name eq 'x')"),
            Err(BindingError::InvalidLambdaSource { .. })
        );
        assert_matches!(
            bind("Customers", "Orders/any(o: o/Amount)"),
            Err(BindingError::NonBooleanExpression { .. })
        );
    }

    #[test]
    fn test_operator_type_mismatch() {
        assert_matches!(
            bind("Customers", "Name add 1"),
            Err(BindingError::TypeMismatch { ref operator, .. }) if operator == "add"
        );
        assert_matches!(bind("Customers", "ID and true"), Err(BindingError::TypeMismatch { .. }));
        assert_matches!(bind("Customers", "not ID"), Err(BindingError::UnaryTypeMismatch { .. }));
    }

    #[test]
    fn test_temporal_arithmetic() {
        let node = bind("Orders", "OrderDate add duration'P1D' gt 2014-08-31T12:40Z").unwrap();
        assert!(node.type_ref().is_boolean());
        assert!(bind("Orders", "ShipDate sub ShipDate").is_ok());
        assert!(bind("Orders", "ShipDate mul ShipDate").is_err());
    }

    #[test]
    fn test_built_in_functions() {
        let node = bind("Customers", "startswith(Name, 'A')").unwrap();
        assert_matches!(node, QueryNode::SingleValueFunctionCall(ref call) if call.name == "startswith");
        assert!(node.type_ref().is_boolean());

        let node = bind("Orders", "round(Quantity) eq 3").unwrap();
        assert!(node.type_ref().is_boolean());

        assert_matches!(
            bind("Customers", "substring(Name)"),
            Err(BindingError::NoMatchingOverload { candidates: 2, .. })
        );
        assert_matches!(
            bind("Customers", "year(Name) eq 2000"),
            Err(BindingError::NoMatchingOverload { .. })
        );
    }

    #[test]
    fn test_unknown_function_is_soft() {
        let node = bind("Customers", "frobnicate(Name)").unwrap();
        let errors = node.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::binding::UNRESOLVED_FUNCTION);
    }

    #[test]
    fn test_cast_and_isof() {
        let node = bind("Customers", "isof(Sales.VipCustomer)").unwrap();
        assert!(node.type_ref().is_boolean());

        let node = bind("Customers", "Sales.VipCustomer/Level gt 2").unwrap();
        assert!(!node.has_errors());

        assert_matches!(
            bind("Customers", "Address/Sales.Customer"),
            Err(BindingError::InvalidCast { .. })
        );
        let node = bind("Customers", "cast(ID, Edm.Int64) eq 1").unwrap();
        assert!(node.type_ref().is_boolean());
    }

    #[test]
    fn test_bound_operation() {
        let node = bind("Products", "Sales.DiscountedPrice(percent=10) gt 5").unwrap();
        let QueryNode::BinaryOperator(comparison) = &node else {
            panic!("unexpected node {:?}", node);
        };
        assert_matches!(&*comparison.left, QueryNode::SingleValueFunctionCall(call)
            if call.name == "Sales.DiscountedPrice" && call.source.is_some());

        assert_matches!(
            bind("Products", "Sales.DiscountedPrice(percent='x') gt 5"),
            Err(BindingError::NoMatchingOverload { candidates: 1, .. })
        );
    }

    #[test]
    fn test_open_type_properties() {
        let model = sales_model();
        let context = BindingContext::for_entity_set(&model, "Sales");
        let preferences = BindingPreferences {
            allow_open_properties: true,
            ..BindingPreferences::default()
        };
        let node = MetadataBinder::new(&model, context)
            .with_preferences(preferences)
            .bind(&parse("Discount gt 5"))
            .unwrap();
        let QueryNode::BinaryOperator(comparison) = &node else {
            panic!("unexpected node {:?}", node);
        };
        assert_eq!(comparison.left.kind_name(), "SingleValueOpenPropertyAccess");
        assert!(!node.has_errors());
    }

    #[test]
    fn test_enum_has() {
        assert!(bind("Customers", "FavoriteColor has Sales.Color'Red'").is_ok());
        assert_matches!(
            bind("Customers", "Name has Sales.Color'Red'"),
            Err(BindingError::TypeMismatch { .. })
        );
    }

    #[test]
    fn test_invalid_date_literal_is_rejected() {
        assert_matches!(
            bind("Customers", "BirthDate eq 2014-13-40"),
            Err(BindingError::InvalidLiteralValue { .. })
        );
    }

    #[test]
    fn test_parameter_alias() {
        let model = sales_model();
        let context = BindingContext::for_entity_set(&model, "Customers");
        let mut aliases = HashMap::new();
        aliases.insert("name".to_string(), parse("'Alice'"));
        aliases.insert("loop".to_string(), parse("@loop"));

        let mut binder = MetadataBinder::new(&model, context).with_aliases(aliases);
        let node = binder.bind(&parse("Name eq @name")).unwrap();
        assert!(!node.has_errors());

        let node = binder.bind(&parse("Name eq @loop")).unwrap();
        assert_eq!(node.errors().len(), 1);
        let node = binder.bind(&parse("Name eq @missing")).unwrap();
        assert_eq!(node.errors()[0].code, codes::binding::UNRESOLVED_TYPE);
    }

    #[test]
    fn test_property_on_collection_is_rejected() {
        assert_matches!(
            bind("Customers", "Orders/Amount gt 1"),
            Err(BindingError::InvalidPropertyAccess { .. })
        );
    }

    #[test]
    fn test_resource_path() {
        let model = sales_model();
        let path = |text: &str| {
            let tokens = lexical::tokenize(text).unwrap();
            let token = syntax::parse(tokens, GrammarEntry::ResourcePath).unwrap();
            let context = BindingContext::for_type(TypeReference::Untyped);
            MetadataBinder::new(&model, context).bind_resource_path(&token)
        };

        let node = path("Customers(1)/Orders").unwrap();
        assert_eq!(node.kind_name(), "CollectionNavigationNode");
        let node = path("Customers(ID=1)/Orders(2)/Amount").unwrap();
        assert_eq!(node.type_ref(), &TypeReference::Primitive(EdmPrimitiveKind::Decimal));
        let node = path("Products/$count").unwrap();
        assert_eq!(node.kind_name(), "Count");
        let node = path("Customers/Sales.VipCustomer").unwrap();
        assert_eq!(node.kind_name(), "CollectionResourceCast");

        assert_matches!(path("Customers('x')"), Err(BindingError::InvalidKey { .. }));
        let node = path("Nowhere(1)").unwrap();
        assert_eq!(node.errors()[0].code, codes::binding::UNRESOLVED_ENTITY_SET);
    }

    #[test]
    fn test_depth_limit() {
        let nested = (0..MAX_BINDING_DEPTH + 1).fold(parse("true"), |operand, _| {
            QueryToken::UnaryOperator {
                kind: UnaryOperatorKind::Not,
                operand: Box::new(operand),
                span: Span::dummy(),
            }
        });
        let model = sales_model();
        let context = BindingContext::for_entity_set(&model, "Customers");
        assert_matches!(
            MetadataBinder::new(&model, context).bind(&nested),
            Err(BindingError::MaxBindingDepth { limit: MAX_BINDING_DEPTH, .. })
        );
    }
}
