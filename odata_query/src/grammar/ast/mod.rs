//! Syntax tree produced by the query parser

pub mod nodes;

pub use nodes::*;
