//! End-to-end query processing
//!
//! [`QueryOptionParser`] drives single options through tokenize, parse and
//! bind; [`parse_uri`] splits a relative request URI and feeds each part to
//! one. Lexical and syntax failures abort with a [`PipelineError`]; binding
//! failures that leave placeholders are collected as diagnostics.

mod error;
mod options;
mod uri;
mod validation;

pub use error::{PipelineError, PipelineResult};
pub use options::QueryOptionParser;
pub use uri::{parse_query_options, parse_uri, parse_uri_with_config, ParsedUri};
pub use validation::validate_pipeline;
