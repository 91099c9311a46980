use crate::logging::codes;
use crate::semantic_analysis::built_in_functions;

/// Check that every stage is wired up before the first query runs
pub fn validate_pipeline() -> Result<(), String> {
    crate::log_debug!("Validating query pipeline configuration");

    crate::logging::config::validate_config()?;
    crate::lexical::validate_tokenization()?;
    crate::syntax::init_syntax_logging()?;
    validate_codes("Apply", &APPLY_CODES)?;
    validate_codes("Binding", &BINDING_CODES)?;
    validate_codes("Structural", &STRUCTURAL_CODES)?;

    let functions = built_in_functions();
    if functions.is_empty() {
        return Err("Built-in function table is empty".to_string());
    }

    crate::log_success!(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Query pipeline validation succeeded",
        "stages_validated" => 5,
        "built_in_functions" => functions.len()
    );

    Ok(())
}

const APPLY_CODES: [codes::Code; 8] = [
    codes::apply::MISSING_WITH_STATEMENT,
    codes::apply::MISSING_ALIAS,
    codes::apply::UNKNOWN_TRANSFORMATION,
    codes::apply::UNKNOWN_AGGREGATION_METHOD,
    codes::apply::UNBALANCED_PARENTHESES,
    codes::apply::UNTERMINATED_STRING,
    codes::apply::MALFORMED_TRANSFORMATION,
    codes::apply::TOO_MANY_TRANSFORMATIONS,
];

const BINDING_CODES: [codes::Code; 19] = [
    codes::binding::UNRESOLVED_TYPE,
    codes::binding::UNRESOLVED_PROPERTY,
    codes::binding::UNRESOLVED_NAVIGATION,
    codes::binding::UNRESOLVED_ENTITY_SET,
    codes::binding::UNRESOLVED_FUNCTION,
    codes::binding::TYPE_MISMATCH,
    codes::binding::NO_MATCHING_OVERLOAD,
    codes::binding::AMBIGUOUS_OVERLOAD,
    codes::binding::INVALID_LITERAL_VALUE,
    codes::binding::NON_BOOLEAN_EXPRESSION,
    codes::binding::INVALID_LAMBDA_SOURCE,
    codes::binding::INVALID_CAST,
    codes::binding::INVALID_PROPERTY_ACCESS,
    codes::binding::MAX_BINDING_DEPTH,
    codes::binding::INVALID_KEY,
    codes::binding::INVALID_EXPAND,
    codes::binding::INVALID_ORDERBY,
    codes::binding::UNRESOLVED_ENTITY_TYPE,
    codes::binding::UNRESOLVED_COMPLEX_TYPE,
];

const STRUCTURAL_CODES: [codes::Code; 5] = [
    codes::structural::DUPLICATE_END_NAME,
    codes::structural::INVALID_NAME,
    codes::structural::UNRESOLVED_ASSOCIATION,
    codes::structural::UNRESOLVED_ASSOCIATION_END,
    codes::structural::DIAGNOSTIC_LIMIT_REACHED,
];

fn validate_codes(stage: &str, stage_codes: &[codes::Code]) -> Result<(), String> {
    match stage_codes
        .iter()
        .find(|code| codes::get_error_metadata(code.as_str()).is_none())
    {
        Some(code) => Err(format!(
            "{} error code {} not found in metadata registry",
            stage,
            code.as_str()
        )),
        None => Ok(()),
    }
}
