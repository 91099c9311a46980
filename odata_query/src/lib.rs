//! OData query option parsing and EDM binding
//!
//! Text flows through the lexer ([`lexical`]), the grammar ([`syntax`],
//! [`apply`] for `$apply`) and the binder ([`semantic_analysis`]) against a
//! read-only [`model::EdmModel`]. [`pipeline`] ties the stages together.

pub mod apply;
pub mod config;
pub mod grammar;
pub mod lexical;
#[macro_use]
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reference_resolution;
pub mod semantic_analysis;
pub mod syntax;
pub mod tokens;
pub mod utils;
pub mod validation;

// Re-export key types for library consumers
pub use model::{load_model_from_path, load_model_from_str, EdmModel, InMemoryModel};
pub use pipeline::{parse_uri, ParsedUri, PipelineError, PipelineResult, QueryOptionParser};
pub use semantic_analysis::QueryNode;
pub use validation::Diagnostic;
