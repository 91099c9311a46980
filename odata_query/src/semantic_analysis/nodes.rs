//! Bound query nodes
//!
//! The binder's output. Every node carries its resolved type, and the
//! variant is chosen from that type by the constructors below, so a
//! `CollectionPropertyAccess` always has a collection type and a
//! `SingleNavigationNode` never does.
//!
//! Nodes never fail to exist: a reference that did not resolve produces a
//! node whose type is a placeholder, and [`QueryNode::errors`] reports it.

use crate::grammar::keywords::{BinaryOperatorKind, UnaryOperatorKind};
use crate::model::{EdmPrimitiveKind, TypeReference};
use crate::semantic_analysis::context::RangeVariable;
use crate::tokens::LiteralValue;
use crate::utils::Span;
use crate::validation::{collect, Diagnostic};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum QueryNode {
    Constant(ConstantNode),
    Convert(ConvertNode),
    BinaryOperator(BinaryOperatorNode),
    UnaryOperator(UnaryOperatorNode),
    SingleValuePropertyAccess(PropertyAccessNode),
    CollectionPropertyAccess(PropertyAccessNode),
    /// Dynamic property of an open type
    SingleValueOpenPropertyAccess(PropertyAccessNode),
    SingleComplexNode(PropertyAccessNode),
    CollectionComplexNode(PropertyAccessNode),
    SingleValueFunctionCall(FunctionCallNode),
    CollectionFunctionCall(FunctionCallNode),
    Any(LambdaNode),
    All(LambdaNode),
    CollectionNavigationNode(NavigationNode),
    SingleNavigationNode(NavigationNode),
    SingleResourceCast(CastNode),
    CollectionResourceCast(CastNode),
    ResourceRangeVariableReference(RangeVariableNode),
    NonResourceRangeVariableReference(RangeVariableNode),
    EntitySet(EntitySetNode),
    KeyLookup(KeyLookupNode),
    SearchTerm(SearchTermNode),
    Count(CountNode),
    ParameterAlias(ParameterAliasNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantNode {
    pub value: LiteralValue,
    /// Literal as written
    pub text: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

/// Implicit widening inserted by operator and function binding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertNode {
    pub source: Box<QueryNode>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryOperatorNode {
    pub operator: BinaryOperatorKind,
    pub left: Box<QueryNode>,
    pub right: Box<QueryNode>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryOperatorNode {
    pub operator: UnaryOperatorKind,
    pub operand: Box<QueryNode>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyAccessNode {
    pub source: Box<QueryNode>,
    pub property: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCallNode {
    /// Built-in name or qualified operation name
    pub name: String,
    pub arguments: Vec<QueryNode>,
    /// Binding source of a bound operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<QueryNode>>,
    /// Target type of `cast` and `isof`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_argument: Option<TypeReference>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaNode {
    pub source: Box<QueryNode>,
    /// `None` for the parameterless `any()`
    pub range_variable: Option<RangeVariable>,
    pub body: Option<Box<QueryNode>>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationNode {
    pub source: Box<QueryNode>,
    pub navigation_property: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastNode {
    pub source: Box<QueryNode>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeVariableNode {
    pub name: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySetNode {
    pub name: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub name: String,
    pub value: QueryNode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyLookupNode {
    pub source: Box<QueryNode>,
    pub keys: Vec<KeyValue>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchTermNode {
    pub text: String,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountNode {
    pub source: Box<QueryNode>,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterAliasNode {
    pub alias: String,
    /// Bound alias value; `None` when the caller supplied none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<QueryNode>>,
    pub type_ref: TypeReference,
    pub span: Span,
}

fn boolean() -> TypeReference {
    TypeReference::Primitive(EdmPrimitiveKind::Boolean)
}

impl QueryNode {
    pub fn constant(value: LiteralValue, text: impl Into<String>, type_ref: TypeReference, span: Span) -> Self {
        Self::Constant(ConstantNode {
            value,
            text: text.into(),
            type_ref,
            span,
        })
    }

    pub fn convert(source: QueryNode, type_ref: TypeReference) -> Self {
        let span = source.span();
        Self::Convert(ConvertNode {
            source: Box::new(source),
            type_ref,
            span,
        })
    }

    /// Wrap `self` in a conversion unless it already has `target` type
    pub fn converted_to(self, target: &TypeReference) -> Self {
        if self.type_ref() == target || self.type_ref().is_open() {
            self
        } else {
            Self::convert(self, target.clone())
        }
    }

    pub fn binary(
        operator: BinaryOperatorKind,
        left: QueryNode,
        right: QueryNode,
        type_ref: TypeReference,
        span: Span,
    ) -> Self {
        Self::BinaryOperator(BinaryOperatorNode {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            type_ref,
            span,
        })
    }

    pub fn unary(operator: UnaryOperatorKind, operand: QueryNode, type_ref: TypeReference, span: Span) -> Self {
        Self::UnaryOperator(UnaryOperatorNode {
            operator,
            operand: Box::new(operand),
            type_ref,
            span,
        })
    }

    /// Structural property access; `open` marks a dynamic property
    pub fn property_access(
        source: QueryNode,
        property: impl Into<String>,
        type_ref: TypeReference,
        span: Span,
        open: bool,
    ) -> Self {
        let collection = type_ref.is_collection();
        let complex = matches!(type_ref.element_type(), TypeReference::Complex(_));
        let node = PropertyAccessNode {
            source: Box::new(source),
            property: property.into(),
            type_ref,
            span,
        };
        match (open, collection, complex) {
            (true, _, _) => Self::SingleValueOpenPropertyAccess(node),
            (false, true, true) => Self::CollectionComplexNode(node),
            (false, true, false) => Self::CollectionPropertyAccess(node),
            (false, false, true) => Self::SingleComplexNode(node),
            (false, false, false) => Self::SingleValuePropertyAccess(node),
        }
    }

    pub fn navigation(
        source: QueryNode,
        navigation_property: impl Into<String>,
        type_ref: TypeReference,
        span: Span,
    ) -> Self {
        let collection = type_ref.is_collection();
        let node = NavigationNode {
            source: Box::new(source),
            navigation_property: navigation_property.into(),
            type_ref,
            span,
        };
        if collection {
            Self::CollectionNavigationNode(node)
        } else {
            Self::SingleNavigationNode(node)
        }
    }

    pub fn cast(source: QueryNode, type_ref: TypeReference, span: Span) -> Self {
        let collection = type_ref.is_collection();
        let node = CastNode {
            source: Box::new(source),
            type_ref,
            span,
        };
        if collection {
            Self::CollectionResourceCast(node)
        } else {
            Self::SingleResourceCast(node)
        }
    }

    pub fn function_call(node: FunctionCallNode) -> Self {
        if node.type_ref.is_collection() {
            Self::CollectionFunctionCall(node)
        } else {
            Self::SingleValueFunctionCall(node)
        }
    }

    pub fn range_variable(variable: &RangeVariable, span: Span) -> Self {
        let node = RangeVariableNode {
            name: variable.name.clone(),
            type_ref: variable.type_ref.clone(),
            span,
        };
        if variable.is_resource() {
            Self::ResourceRangeVariableReference(node)
        } else {
            Self::NonResourceRangeVariableReference(node)
        }
    }

    pub fn lambda(
        all: bool,
        source: QueryNode,
        range_variable: Option<RangeVariable>,
        body: Option<QueryNode>,
        span: Span,
    ) -> Self {
        let node = LambdaNode {
            source: Box::new(source),
            range_variable,
            body: body.map(Box::new),
            type_ref: boolean(),
            span,
        };
        if all {
            Self::All(node)
        } else {
            Self::Any(node)
        }
    }

    pub fn search_term(text: impl Into<String>, span: Span) -> Self {
        Self::SearchTerm(SearchTermNode {
            text: text.into(),
            type_ref: boolean(),
            span,
        })
    }

    pub fn count(source: QueryNode, span: Span) -> Self {
        Self::Count(CountNode {
            source: Box::new(source),
            type_ref: TypeReference::Primitive(EdmPrimitiveKind::Int64),
            span,
        })
    }

    pub fn type_ref(&self) -> &TypeReference {
        match self {
            Self::Constant(node) => &node.type_ref,
            Self::Convert(node) => &node.type_ref,
            Self::BinaryOperator(node) => &node.type_ref,
            Self::UnaryOperator(node) => &node.type_ref,
            Self::SingleValuePropertyAccess(node)
            | Self::CollectionPropertyAccess(node)
            | Self::SingleValueOpenPropertyAccess(node)
            | Self::SingleComplexNode(node)
            | Self::CollectionComplexNode(node) => &node.type_ref,
            Self::SingleValueFunctionCall(node) | Self::CollectionFunctionCall(node) => &node.type_ref,
            Self::Any(node) | Self::All(node) => &node.type_ref,
            Self::CollectionNavigationNode(node) | Self::SingleNavigationNode(node) => &node.type_ref,
            Self::SingleResourceCast(node) | Self::CollectionResourceCast(node) => &node.type_ref,
            Self::ResourceRangeVariableReference(node)
            | Self::NonResourceRangeVariableReference(node) => &node.type_ref,
            Self::EntitySet(node) => &node.type_ref,
            Self::KeyLookup(node) => &node.type_ref,
            Self::SearchTerm(node) => &node.type_ref,
            Self::Count(node) => &node.type_ref,
            Self::ParameterAlias(node) => &node.type_ref,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Constant(node) => node.span,
            Self::Convert(node) => node.span,
            Self::BinaryOperator(node) => node.span,
            Self::UnaryOperator(node) => node.span,
            Self::SingleValuePropertyAccess(node)
            | Self::CollectionPropertyAccess(node)
            | Self::SingleValueOpenPropertyAccess(node)
            | Self::SingleComplexNode(node)
            | Self::CollectionComplexNode(node) => node.span,
            Self::SingleValueFunctionCall(node) | Self::CollectionFunctionCall(node) => node.span,
            Self::Any(node) | Self::All(node) => node.span,
            Self::CollectionNavigationNode(node) | Self::SingleNavigationNode(node) => node.span,
            Self::SingleResourceCast(node) | Self::CollectionResourceCast(node) => node.span,
            Self::ResourceRangeVariableReference(node)
            | Self::NonResourceRangeVariableReference(node) => node.span,
            Self::EntitySet(node) => node.span,
            Self::KeyLookup(node) => node.span,
            Self::SearchTerm(node) => node.span,
            Self::Count(node) => node.span,
            Self::ParameterAlias(node) => node.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "Constant",
            Self::Convert(_) => "Convert",
            Self::BinaryOperator(_) => "BinaryOperator",
            Self::UnaryOperator(_) => "UnaryOperator",
            Self::SingleValuePropertyAccess(_) => "SingleValuePropertyAccess",
            Self::CollectionPropertyAccess(_) => "CollectionPropertyAccess",
            Self::SingleValueOpenPropertyAccess(_) => "SingleValueOpenPropertyAccess",
            Self::SingleComplexNode(_) => "SingleComplexNode",
            Self::CollectionComplexNode(_) => "CollectionComplexNode",
            Self::SingleValueFunctionCall(_) => "SingleValueFunctionCall",
            Self::CollectionFunctionCall(_) => "CollectionFunctionCall",
            Self::Any(_) => "Any",
            Self::All(_) => "All",
            Self::CollectionNavigationNode(_) => "CollectionNavigationNode",
            Self::SingleNavigationNode(_) => "SingleNavigationNode",
            Self::SingleResourceCast(_) => "SingleResourceCast",
            Self::CollectionResourceCast(_) => "CollectionResourceCast",
            Self::ResourceRangeVariableReference(_) => "ResourceRangeVariableReference",
            Self::NonResourceRangeVariableReference(_) => "NonResourceRangeVariableReference",
            Self::EntitySet(_) => "EntitySet",
            Self::KeyLookup(_) => "KeyLookup",
            Self::SearchTerm(_) => "SearchTerm",
            Self::Count(_) => "Count",
            Self::ParameterAlias(_) => "ParameterAlias",
        }
    }

    pub fn is_collection(&self) -> bool {
        self.type_ref().is_collection()
    }

    pub fn children(&self) -> Vec<&QueryNode> {
        match self {
            Self::Constant(_)
            | Self::ResourceRangeVariableReference(_)
            | Self::NonResourceRangeVariableReference(_)
            | Self::EntitySet(_)
            | Self::SearchTerm(_) => Vec::new(),
            Self::Convert(node) => vec![&*node.source],
            Self::BinaryOperator(node) => vec![&*node.left, &*node.right],
            Self::UnaryOperator(node) => vec![&*node.operand],
            Self::SingleValuePropertyAccess(node)
            | Self::CollectionPropertyAccess(node)
            | Self::SingleValueOpenPropertyAccess(node)
            | Self::SingleComplexNode(node)
            | Self::CollectionComplexNode(node) => vec![&*node.source],
            Self::SingleValueFunctionCall(node) | Self::CollectionFunctionCall(node) => node
                .source
                .as_deref()
                .into_iter()
                .chain(node.arguments.iter())
                .collect(),
            Self::Any(node) | Self::All(node) => std::iter::once(&*node.source)
                .chain(node.body.as_deref())
                .collect(),
            Self::CollectionNavigationNode(node) | Self::SingleNavigationNode(node) => vec![&*node.source],
            Self::SingleResourceCast(node) | Self::CollectionResourceCast(node) => vec![&*node.source],
            Self::KeyLookup(node) => std::iter::once(&*node.source)
                .chain(node.keys.iter().map(|key| &key.value))
                .collect(),
            Self::Count(node) => vec![&*node.source],
            Self::ParameterAlias(node) => node.value.as_deref().into_iter().collect(),
        }
    }

    /// Diagnostics of every placeholder in this subtree, each reported once
    pub fn errors(&self) -> Vec<Arc<Diagnostic>> {
        let mut partials = Vec::new();
        self.gather_errors(&mut partials);
        collect(partials.into_iter())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    fn gather_errors<'a>(&'a self, partials: &mut Vec<&'a [Arc<Diagnostic>]>) {
        for child in self.children() {
            child.gather_errors(partials);
        }
        if let Self::SingleValueFunctionCall(call) | Self::CollectionFunctionCall(call) = self {
            if let Some(type_argument) = &call.type_argument {
                partials.push(type_argument.errors());
            }
        }
        partials.push(self.type_ref().errors());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
    use crate::validation::Location;

    fn it(type_name: &str) -> QueryNode {
        QueryNode::range_variable(
            &RangeVariable::implicit(TypeReference::Entity(type_name.into()), None),
            Span::dummy(),
        )
    }

    #[test]
    fn test_variant_follows_type() {
        let string = TypeReference::Primitive(EdmPrimitiveKind::String);
        let address = TypeReference::Complex("Sales.Address".into());

        let node = QueryNode::property_access(it("Sales.Customer"), "Tags", TypeReference::collection_of(string.clone()), Span::dummy(), false);
        assert_eq!(node.kind_name(), "CollectionPropertyAccess");
        let node = QueryNode::property_access(it("Sales.Customer"), "Address", address.clone(), Span::dummy(), false);
        assert_eq!(node.kind_name(), "SingleComplexNode");
        let node = QueryNode::property_access(it("Sales.Customer"), "PreviousAddresses", TypeReference::collection_of(address), Span::dummy(), false);
        assert_eq!(node.kind_name(), "CollectionComplexNode");

        let node = QueryNode::navigation(it("Sales.Customer"), "Orders", TypeReference::collection_of(TypeReference::Entity("Sales.Order".into())), Span::dummy());
        assert!(node.is_collection());
        assert_eq!(node.kind_name(), "CollectionNavigationNode");
    }

    #[test]
    fn test_errors_report_shared_cause_once() {
        let cause = UnresolvedRef::new(UnresolvedKind::EntityType, "NoSuchEntity", Location::Query(Span::from_offsets(0, 12)));
        let navigation = QueryNode::navigation(it("Sales.Customer"), "NoSuchEntity", TypeReference::Unresolved(cause.clone()), Span::from_offsets(0, 12));
        let derived = UnresolvedRef::derived(UnresolvedKind::Property, "Name", Location::Query(Span::from_offsets(13, 17)), &cause);
        let node = QueryNode::property_access(navigation, "Name", TypeReference::Unresolved(derived), Span::from_offsets(13, 17), false);

        let errors = node.errors();
        assert_eq!(errors.len(), 1);
        assert!(Arc::ptr_eq(&errors[0], &cause.errors()[0]));
    }

    #[test]
    fn test_converted_to_skips_same_type() {
        let int = TypeReference::Primitive(EdmPrimitiveKind::Int32);
        let double = TypeReference::Primitive(EdmPrimitiveKind::Double);
        let constant = QueryNode::constant(LiteralValue::Int32(1), "1", int.clone(), Span::dummy());
        assert_eq!(constant.clone().converted_to(&int), constant);
        let converted = constant.converted_to(&double);
        assert_eq!(converted.kind_name(), "Convert");
        assert_eq!(converted.type_ref(), &double);
        assert!(!converted.has_errors());
    }
}
