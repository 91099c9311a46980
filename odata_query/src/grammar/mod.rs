//! Grammar of OData query options: keywords, syntax tree and builders

pub mod ast;
pub mod builders;
pub mod keywords;

pub use ast::nodes::*;

pub use keywords::{
    is_reserved_keyword, AggregationMethod, BinaryOperatorKind, LambdaKind, OrderDirection,
    QueryOptionKind, TransformationKind, UnaryOperatorKind,
};

pub use builders::*;
