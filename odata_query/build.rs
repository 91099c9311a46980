// build.rs - TOML-driven limit generation for the query parser
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    lexical: LexicalLimits,
    syntax: SyntaxLimits,
    apply: ApplyLimits,
    binding: BindingLimits,
    expand: ExpandLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct LexicalLimits {
    max_query_length: usize,
    max_identifier_length: usize,
    max_string_literal_size: usize,
    max_token_count: usize,
}

#[derive(serde::Deserialize)]
struct SyntaxLimits {
    max_parse_depth: usize,
    max_function_arguments: usize,
    max_lookahead_tokens: usize,
}

#[derive(serde::Deserialize)]
struct ApplyLimits {
    max_transformations: usize,
    max_aggregate_statements: usize,
    max_groupby_properties: usize,
}

#[derive(serde::Deserialize)]
struct BindingLimits {
    max_binding_depth: usize,
    max_range_variable_depth: usize,
    max_diagnostics: usize,
}

#[derive(serde::Deserialize)]
struct ExpandLimits {
    max_expand_depth: usize,
    max_select_items: usize,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    max_error_collection: usize,
    log_buffer_size: usize,
    max_log_message_length: usize,
    max_log_events_per_query: usize,
    security_min_log_level: u8,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=ODATA_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=ODATA_CONFIG_DIR");

    let profile = env::var("ODATA_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("ODATA_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Workspace root is the parent of the odata_query directory
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nWorkspace root: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_limits(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_limits(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_QUERY_LENGTH: usize = 1_048_576;
    const ABSOLUTE_MAX_PARSE_DEPTH: usize = 1_000;

    if config.lexical.max_query_length > ABSOLUTE_MAX_QUERY_LENGTH {
        panic!("SECURITY: max_query_length exceeds absolute maximum");
    }

    if config.lexical.max_string_literal_size > config.lexical.max_query_length {
        panic!("max_string_literal_size cannot exceed max_query_length");
    }

    if config.syntax.max_parse_depth == 0 || config.syntax.max_parse_depth > ABSOLUTE_MAX_PARSE_DEPTH
    {
        panic!("SECURITY: max_parse_depth must be within 1..={}", ABSOLUTE_MAX_PARSE_DEPTH);
    }

    if config.binding.max_range_variable_depth == 0 {
        panic!("max_range_variable_depth must allow at least one lambda scope");
    }

    if config.logging.security_min_log_level > 2 {
        panic!("SECURITY: security_min_log_level too high (max: 2)");
    }

    if config.logging.max_log_events_per_query > config.logging.log_buffer_size {
        panic!("max_log_events_per_query exceeds log_buffer_size");
    }

    if profile == "production" && config.lexical.max_query_length > 65_536 {
        panic!("PRODUCTION: max_query_length too high for production");
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub const PROFILE: &str = "{}";

    pub mod lexical {{
        pub const MAX_QUERY_LENGTH: usize = {};
        pub const MAX_IDENTIFIER_LENGTH: usize = {};
        pub const MAX_STRING_LITERAL_SIZE: usize = {};
        pub const MAX_TOKEN_COUNT: usize = {};
    }}

    pub mod syntax {{
        pub const MAX_PARSE_DEPTH: usize = {};
        pub const MAX_FUNCTION_ARGUMENTS: usize = {};
        pub const MAX_LOOKAHEAD_TOKENS: usize = {};
    }}

    pub mod apply {{
        pub const MAX_TRANSFORMATIONS: usize = {};
        pub const MAX_AGGREGATE_STATEMENTS: usize = {};
        pub const MAX_GROUPBY_PROPERTIES: usize = {};
    }}

    pub mod binding {{
        pub const MAX_BINDING_DEPTH: usize = {};
        pub const MAX_RANGE_VARIABLE_DEPTH: usize = {};
        pub const MAX_DIAGNOSTICS: usize = {};
    }}

    pub mod expand {{
        pub const MAX_EXPAND_DEPTH: usize = {};
        pub const MAX_SELECT_ITEMS: usize = {};
    }}

    pub mod logging {{
        pub const MAX_ERROR_COLLECTION: usize = {};
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
        pub const MAX_LOG_EVENTS_PER_QUERY: usize = {};
        pub const SECURITY_MIN_LOG_LEVEL: u8 = {};
    }}
}}
"#,
        profile,
        profile,
        // Lexical
        config.lexical.max_query_length,
        config.lexical.max_identifier_length,
        config.lexical.max_string_literal_size,
        config.lexical.max_token_count,
        // Syntax
        config.syntax.max_parse_depth,
        config.syntax.max_function_arguments,
        config.syntax.max_lookahead_tokens,
        // Apply
        config.apply.max_transformations,
        config.apply.max_aggregate_statements,
        config.apply.max_groupby_properties,
        // Binding
        config.binding.max_binding_depth,
        config.binding.max_range_variable_depth,
        config.binding.max_diagnostics,
        // Expand
        config.expand.max_expand_depth,
        config.expand.max_select_items,
        // Logging
        config.logging.max_error_collection,
        config.logging.log_buffer_size,
        config.logging.max_log_message_length,
        config.logging.max_log_events_per_query,
        config.logging.security_min_log_level,
    );

    fs::write(output_path, constants_code).unwrap();
}
