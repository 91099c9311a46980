use crate::apply::ApplyError;
use crate::lexical::LexError;
use crate::logging::{codes, Code};
use crate::model::ModelError;
use crate::semantic_analysis::BindingError;
use crate::syntax::SyntaxError;
use crate::utils::Span;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal failure of one query option or of the whole URI
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Lexical analysis failed: {0}")]
    Lexical(#[from] LexError),

    #[error("Syntax analysis failed: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("$apply parsing failed: {0}")]
    Apply(#[from] ApplyError),

    #[error("Binding failed: {0}")]
    Binding(#[from] BindingError),

    #[error("Model loading failed: {0}")]
    Model(#[from] ModelError),

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },
}

impl PipelineError {
    pub fn pipeline_error(message: &str) -> Self {
        Self::Pipeline {
            message: message.to_string(),
        }
    }

    pub fn error_code(&self) -> Code {
        match self {
            Self::Lexical(error) => error.error_code(),
            Self::Syntax(error) => error.error_code(),
            Self::Apply(error) => error.error_code(),
            Self::Binding(error) => error.error_code(),
            Self::Model(error) => error.error_code(),
            Self::Pipeline { .. } => codes::system::INTERNAL_ERROR,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexical(error) => Some(Span::at(error.position())),
            Self::Syntax(error) => error.span(),
            Self::Apply(error) => error.span(),
            Self::Binding(error) => Some(error.span()),
            Self::Model(_) | Self::Pipeline { .. } => None,
        }
    }
}
