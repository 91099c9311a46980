//! Consolidated error codes and classification system
//!
//! Single source of truth for every code the parser emits, together with the
//! metadata (category, severity, recoverability) used by logging and reports.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for both error and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for an error code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const MODEL_LOAD_FAILURE: Code = Code::new("ERR003");
}

/// Lexical analysis error codes
pub mod lexical {
    use super::Code;

    pub const INVALID_CHARACTER: Code = Code::new("E020");
    pub const UNTERMINATED_LITERAL: Code = Code::new("E021");
    pub const INVALID_LITERAL: Code = Code::new("E022");
    pub const NUMBER_OUT_OF_RANGE: Code = Code::new("E023");
    pub const IDENTIFIER_TOO_LONG: Code = Code::new("E024");
    pub const STRING_TOO_LARGE: Code = Code::new("E025");
    pub const QUERY_TOO_LONG: Code = Code::new("E026");
    pub const TOO_MANY_TOKENS: Code = Code::new("E027");
}

/// Syntax error codes
pub mod syntax {
    use super::Code;

    pub const UNEXPECTED_TOKEN: Code = Code::new("E040");
    pub const UNEXPECTED_END_OF_INPUT: Code = Code::new("E041");
    pub const EMPTY_EXPRESSION: Code = Code::new("E042");
    pub const MAX_RECURSION_DEPTH: Code = Code::new("E043");
    pub const UNKNOWN_QUERY_OPTION: Code = Code::new("E044");
    pub const INVALID_QUERY_OPTION_VALUE: Code = Code::new("E045");
    pub const TOO_MANY_ARGUMENTS: Code = Code::new("E046");
}

/// `$apply` transformation error codes
pub mod apply {
    use super::Code;

    pub const MISSING_WITH_STATEMENT: Code = Code::new("E060");
    pub const MISSING_ALIAS: Code = Code::new("E061");
    pub const UNKNOWN_TRANSFORMATION: Code = Code::new("E062");
    pub const UNKNOWN_AGGREGATION_METHOD: Code = Code::new("E063");
    pub const UNBALANCED_PARENTHESES: Code = Code::new("E064");
    pub const UNTERMINATED_STRING: Code = Code::new("E065");
    pub const MALFORMED_TRANSFORMATION: Code = Code::new("E066");
    pub const TOO_MANY_TRANSFORMATIONS: Code = Code::new("E067");
}

/// Semantic binding codes. The UNRESOLVED_* codes are carried by placeholder
/// diagnostics; the rest are hard binding failures.
pub mod binding {
    use super::Code;

    pub const UNRESOLVED_TYPE: Code = Code::new("E080");
    pub const UNRESOLVED_PROPERTY: Code = Code::new("E081");
    pub const UNRESOLVED_NAVIGATION: Code = Code::new("E082");
    pub const UNRESOLVED_ENTITY_SET: Code = Code::new("E083");
    pub const UNRESOLVED_FUNCTION: Code = Code::new("E084");
    pub const TYPE_MISMATCH: Code = Code::new("E085");
    pub const NO_MATCHING_OVERLOAD: Code = Code::new("E086");
    pub const AMBIGUOUS_OVERLOAD: Code = Code::new("E087");
    pub const INVALID_LITERAL_VALUE: Code = Code::new("E088");
    pub const NON_BOOLEAN_EXPRESSION: Code = Code::new("E089");
    pub const INVALID_LAMBDA_SOURCE: Code = Code::new("E090");
    pub const INVALID_CAST: Code = Code::new("E091");
    pub const INVALID_PROPERTY_ACCESS: Code = Code::new("E092");
    pub const MAX_BINDING_DEPTH: Code = Code::new("E093");
    pub const INVALID_KEY: Code = Code::new("E094");
    pub const INVALID_EXPAND: Code = Code::new("E095");
    pub const INVALID_ORDERBY: Code = Code::new("E096");
    pub const UNRESOLVED_ENTITY_TYPE: Code = Code::new("E097");
    pub const UNRESOLVED_COMPLEX_TYPE: Code = Code::new("E098");
}

/// Structural (model-level) error codes
pub mod structural {
    use super::Code;

    pub const DUPLICATE_END_NAME: Code = Code::new("E100");
    pub const INVALID_NAME: Code = Code::new("E101");
    pub const UNRESOLVED_ASSOCIATION: Code = Code::new("E102");
    pub const UNRESOLVED_ASSOCIATION_END: Code = Code::new("E103");
    pub const DIAGNOSTIC_LIMIT_REACHED: Code = Code::new("E104");
}

/// Success codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I001");
    pub const MODEL_LOADED: Code = Code::new("I010");
    pub const TOKENIZATION_COMPLETE: Code = Code::new("I020");
    pub const PARSE_COMPLETE: Code = Code::new("I040");
    pub const APPLY_SPLIT_COMPLETE: Code = Code::new("I060");
    pub const BINDING_COMPLETE: Code = Code::new("I080");
    pub const MODEL_VALIDATION_COMPLETE: Code = Code::new("I100");
    pub const QUERY_OPTION_PROCESSED: Code = Code::new("I120");
    pub const URI_PARSED: Code = Code::new("I121");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

type MetadataRow = (
    &'static str,
    &'static str,
    Severity,
    bool,
    bool,
    &'static str,
    &'static str,
);

// (code, category, severity, recoverable, requires_halt, description, action)
const METADATA_TABLE: &[MetadataRow] = &[
    ("ERR001", "System", Severity::Critical, false, true,
        "Critical internal parser error", "File a bug report with the failing query"),
    ("ERR002", "System", Severity::Critical, false, true,
        "Logging or configuration initialization failure", "Check ODATA_* environment variables"),
    ("ERR003", "System", Severity::High, false, true,
        "The EDM model document could not be loaded", "Check the model JSON document"),
    ("E020", "Lexical", Severity::High, false, true,
        "Unexpected character in query text", "Remove or escape the character"),
    ("E021", "Lexical", Severity::High, false, true,
        "String or typed literal is missing its closing quote", "Close the literal with a single quote"),
    ("E022", "Lexical", Severity::High, false, true,
        "Typed literal does not match its literal grammar", "Check the literal against the OData ABNF"),
    ("E023", "Lexical", Severity::High, false, true,
        "Numeric literal out of range for its type", "Use a wider numeric suffix"),
    ("E024", "Lexical", Severity::High, false, true,
        "Identifier exceeds the configured maximum length", "Shorten the identifier"),
    ("E025", "Lexical", Severity::High, false, true,
        "String literal exceeds the configured maximum size", "Shorten the literal"),
    ("E026", "Lexical", Severity::Critical, false, true,
        "Query text exceeds the configured maximum length", "Split the query"),
    ("E027", "Lexical", Severity::Critical, false, true,
        "Query produced too many tokens", "Simplify the query"),
    ("E040", "Syntax", Severity::High, false, true,
        "Unexpected token", "Check operator and punctuation placement"),
    ("E041", "Syntax", Severity::High, false, true,
        "Query ended before the expression was complete", "Complete the expression"),
    ("E042", "Syntax", Severity::High, false, true,
        "Empty expression", "Provide an expression"),
    ("E043", "Syntax", Severity::Critical, false, true,
        "Expression nesting exceeds the configured depth", "Reduce nesting"),
    ("E044", "Syntax", Severity::High, false, true,
        "Unknown system query option", "Check the $-prefixed option name"),
    ("E045", "Syntax", Severity::High, false, true,
        "Query option value has the wrong shape", "Check the option value"),
    ("E046", "Syntax", Severity::High, false, true,
        "Function call has too many arguments", "Reduce the argument list"),
    ("E060", "Apply", Severity::High, false, true,
        "Aggregate statement has no 'with' statement", "Use '<property> with <method> as <alias>'"),
    ("E061", "Apply", Severity::High, false, true,
        "Aggregate statement has no alias", "Add 'as <alias>'"),
    ("E062", "Apply", Severity::High, false, true,
        "Unknown $apply transformation", "Use aggregate, groupby or filter"),
    ("E063", "Apply", Severity::High, false, true,
        "Unknown aggregation method", "Use sum, min, max, average, countdistinct or a qualified custom method"),
    ("E064", "Apply", Severity::High, false, true,
        "Unbalanced parentheses in $apply", "Balance the parentheses"),
    ("E065", "Apply", Severity::High, false, true,
        "Unterminated string in $apply", "Close the string literal"),
    ("E066", "Apply", Severity::High, false, true,
        "Transformation call is malformed", "Check the transformation argument list"),
    ("E067", "Apply", Severity::High, false, true,
        "Too many $apply transformations", "Reduce the transformation chain"),
    ("E080", "Binding", Severity::Medium, true, false,
        "Type name could not be resolved against the model", "Check the qualified type name"),
    ("E081", "Binding", Severity::Medium, true, false,
        "Property is not declared on the type", "Check the property name"),
    ("E082", "Binding", Severity::Medium, true, false,
        "Navigation property is not declared on the type", "Check the navigation property name"),
    ("E083", "Binding", Severity::Medium, true, false,
        "Entity set is not declared in the container", "Check the entity set name"),
    ("E084", "Binding", Severity::Medium, true, false,
        "Function is neither built in nor declared by the model", "Check the function name"),
    ("E085", "Binding", Severity::High, false, true,
        "Operand types are incompatible", "Cast one operand or compare like types"),
    ("E086", "Binding", Severity::High, false, true,
        "No function overload matches the arguments", "Check argument count and types"),
    ("E087", "Binding", Severity::High, false, true,
        "More than one function overload matches the arguments", "Cast arguments to select an overload"),
    ("E088", "Binding", Severity::High, false, true,
        "Literal has a valid shape but an invalid value", "Check calendar and range of the literal"),
    ("E089", "Binding", Severity::High, false, true,
        "Expression is not boolean", "Use a comparison or boolean function"),
    ("E090", "Binding", Severity::High, false, true,
        "any/all applied to a non-collection", "Apply any/all to a collection path"),
    ("E091", "Binding", Severity::High, false, true,
        "Type cast to an unrelated type", "Cast to a derived type"),
    ("E092", "Binding", Severity::High, false, true,
        "Property access on a value that has no properties", "Navigate from a structured value"),
    ("E093", "Binding", Severity::Critical, false, true,
        "Binding nesting exceeds the configured depth", "Reduce nesting"),
    ("E094", "Binding", Severity::High, false, true,
        "Key values do not match the entity key", "Provide every key property"),
    ("E095", "Binding", Severity::High, false, true,
        "Expand path does not end with a navigation property", "Expand navigation properties only"),
    ("E096", "Binding", Severity::High, false, true,
        "Order-by expression is not a single primitive value", "Order by primitive properties"),
    ("E097", "Binding", Severity::Medium, true, false,
        "Entity type could not be resolved", "Check the entity type name"),
    ("E098", "Binding", Severity::Medium, true, false,
        "Complex type could not be resolved", "Check the complex type name"),
    ("E100", "Structural", Severity::Medium, true, false,
        "Both association set ends resolve to the same role", "Give each end a distinct role"),
    ("E101", "Structural", Severity::Medium, true, false,
        "Element name is invalid", "Use a simple identifier"),
    ("E102", "Structural", Severity::Medium, true, false,
        "Association could not be resolved", "Check the association name"),
    ("E103", "Structural", Severity::Medium, true, false,
        "Association end role could not be resolved", "Use a role declared by the association"),
    ("E104", "Structural", Severity::Low, true, false,
        "Diagnostic limit reached; remaining diagnostics dropped", "Fix reported problems first"),
];

/// Error metadata registry using OnceLock for thread safety
static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        METADATA_TABLE
            .iter()
            .map(
                |&(code, category, severity, recoverable, requires_halt, description, action)| {
                    (
                        code,
                        ErrorMetadata {
                            code,
                            category,
                            severity,
                            recoverable,
                            requires_halt,
                            description,
                            recommended_action: action,
                        },
                    )
                },
            )
            .collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_code_has_metadata() {
        let codes = [
            lexical::UNTERMINATED_LITERAL,
            syntax::UNEXPECTED_TOKEN,
            apply::MISSING_WITH_STATEMENT,
            binding::UNRESOLVED_ENTITY_TYPE,
            binding::NO_MATCHING_OVERLOAD,
            structural::DUPLICATE_END_NAME,
        ];
        for code in codes {
            assert!(get_error_metadata(code.as_str()).is_some(), "{}", code);
        }
    }

    #[test]
    fn test_placeholder_codes_are_recoverable() {
        assert!(is_recoverable(binding::UNRESOLVED_PROPERTY.as_str()));
        assert!(!requires_halt(binding::UNRESOLVED_ENTITY_SET.as_str()));
        assert!(requires_halt(lexical::INVALID_CHARACTER.as_str()));
    }

    #[test]
    fn test_unknown_code_defaults() {
        assert_eq!(get_description("Z999"), "Unknown error");
        assert_eq!(get_category("Z999"), "Unknown");
        assert_eq!(get_severity("Z999"), Severity::Medium);
    }

    #[test]
    fn test_code_serializes_as_string() {
        let json = serde_json::to_string(&structural::DUPLICATE_END_NAME).unwrap();
        assert_eq!(json, "\"E100\"");
    }
}
