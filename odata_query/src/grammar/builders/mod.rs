//! Builder functions for the query grammar productions
//!
//! Dependency order: atomic -> helpers -> expressions -> options.

pub mod atomic;
pub mod expressions;
pub mod helpers;
pub mod options;

pub use atomic::{
    at_word, parse_boolean, parse_literal, parse_non_negative_integer, parse_qualified_name,
    peek_binary_operator, Parser,
};

pub use expressions::{
    parse_arguments, parse_expression, parse_member_path, parse_path_continuation, parse_segment,
};

pub use helpers::{
    check_token, consume_if, expect_end, expect_identifier, expect_token, nested,
    parse_comma_separated, unexpected_token_error,
};

pub use options::{parse_expand, parse_orderby, parse_resource_path, parse_search, parse_select};
