//! Token types produced by the lexer and consumed by the parser
//!
//! Every token carries its span in the query option text. The stream keeps
//! whitespace tokens so those spans stay exact, and hides them from the
//! parser.

pub mod token;
pub mod token_stream;

pub use token::{classify_punctuation, LiteralValue, Token, TokenClass};
pub use token_stream::{SpannedToken, TokenStream};

pub use crate::utils::{Position, Span, Spanned};
