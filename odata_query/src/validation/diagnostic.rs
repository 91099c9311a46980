//! Non-fatal diagnostics and their aggregation

use crate::config::compile_time::binding::MAX_DIAGNOSTICS;
use crate::log_warning;
use crate::logging::{codes, Code};
use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a diagnostic points: into the query text or at a model element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Location {
    Query(Span),
    /// Path of the model element, such as `Sales.Customer/Orders`
    Model(String),
    Unknown,
}

impl Location {
    pub fn model(path: impl Into<String>) -> Self {
        Self::Model(path.into())
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Query(span) => Some(*span),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(span) => write!(f, "{}", span),
            Self::Model(path) => f.write_str(path),
            Self::Unknown => f.write_str("unknown location"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: Code,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn new(code: Code, message: impl Into<String>, location: Location) -> Self {
        Self {
            code,
            message: message.into(),
            location,
        }
    }

    pub fn shared(self) -> Arc<Diagnostic> {
        Arc::new(self)
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.code.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} at {}", self.code, self.message, self.location)
    }
}

/// Merge partial diagnostic lists
///
/// Order is preserved. The same `Arc` reached through two paths is kept once;
/// distinct diagnostics with equal text are all kept. The result is capped at
/// the configured diagnostic limit.
pub fn collect<'a, I>(partials: I) -> Vec<Arc<Diagnostic>>
where
    I: IntoIterator<Item = &'a [Arc<Diagnostic>]>,
{
    let mut merged: Vec<Arc<Diagnostic>> = Vec::new();
    let mut truncated = false;

    for diagnostic in partials.into_iter().flatten() {
        if merged.iter().any(|seen| Arc::ptr_eq(seen, diagnostic)) {
            continue;
        }
        if merged.len() >= MAX_DIAGNOSTICS {
            truncated = true;
            break;
        }
        merged.push(Arc::clone(diagnostic));
    }

    if truncated {
        log_warning!(code = codes::structural::DIAGNOSTIC_LIMIT_REACHED,
            "Diagnostic limit reached, remaining diagnostics dropped",
            "limit" => MAX_DIAGNOSTICS
        );
    }

    merged
}
