//! Shared location types used by the lexer, parser, binder and diagnostics.

pub mod span;

pub use span::{Position, Span, Spanned};
