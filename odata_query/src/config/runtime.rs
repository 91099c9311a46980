// RUNTIME PREFERENCES (User Experience)
//
// Limits that protect the parser live in the generated `compile_time` module.
// Everything here is a user preference read from ODATA_* environment variables.

use serde::{Deserialize, Serialize};
use std::env;

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalPreferences {
    /// Whether to collect per-kind literal and operator counts
    pub collect_detailed_metrics: bool,

    /// Whether to count whitespace tokens in metrics
    pub include_whitespace_in_counts: bool,

    /// Whether to show position information in error messages
    pub include_position_in_errors: bool,
}

impl Default for LexicalPreferences {
    fn default() -> Self {
        Self {
            collect_detailed_metrics: env_flag(env_vars::LEXICAL_DETAILED_METRICS, true),
            include_whitespace_in_counts: env_flag(env_vars::LEXICAL_COUNT_WHITESPACE, false),
            include_position_in_errors: env_flag(env_vars::LEXICAL_INCLUDE_POSITIONS, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserPreferences {
    /// Accept operator keywords in any case (`EQ`, `And`)
    pub case_insensitive_keywords: bool,

    /// Match built-in function names in any case (`ToLower`)
    pub case_insensitive_functions: bool,
}

impl Default for ParserPreferences {
    fn default() -> Self {
        Self {
            case_insensitive_keywords: env_flag(env_vars::PARSER_CASE_INSENSITIVE_KEYWORDS, false),
            case_insensitive_functions: env_flag(
                env_vars::PARSER_CASE_INSENSITIVE_FUNCTIONS,
                false,
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingPreferences {
    /// Whether unknown properties on open types bind as open property access
    pub allow_open_properties: bool,

    /// Whether to log each bound segment at debug level
    pub log_binding_details: bool,

    /// Match built-in function names in any case
    pub case_insensitive_functions: bool,
}

impl Default for BindingPreferences {
    fn default() -> Self {
        Self {
            allow_open_properties: env_flag(env_vars::BINDING_ALLOW_OPEN_PROPERTIES, true),
            log_binding_details: env_flag(env_vars::BINDING_LOG_DETAILS, false),
            case_insensitive_functions: env_flag(
                env_vars::PARSER_CASE_INSENSITIVE_FUNCTIONS,
                false,
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPreferences {
    /// Whether to log every transformation segment found by the splitter
    pub log_segments: bool,

    /// Whether aggregate statements must name an alias with `as <alias>`
    pub validate_aggregate_statements: bool,
}

impl Default for ApplyPreferences {
    fn default() -> Self {
        Self {
            log_segments: env_flag(env_vars::APPLY_LOG_SEGMENTS, false),
            validate_aggregate_statements: env_flag(env_vars::APPLY_VALIDATE_AGGREGATES, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging (user preference)
    pub use_structured_logging: bool,

    /// Whether to enable console output (user preference)
    pub enable_console_logging: bool,

    /// User preferred minimum log level (within security constraints)
    pub min_log_level: LogLevel,

    /// Whether to tag events with the query option being processed
    pub include_query_context: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env_flag(env_vars::LOGGING_USE_STRUCTURED, false),
            enable_console_logging: env_flag(env_vars::LOGGING_ENABLE_CONSOLE, false),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
            include_query_context: env_flag(env_vars::LOGGING_INCLUDE_QUERY_CONTEXT, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel for compatibility
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub lexical: LexicalPreferences,
    pub parser: ParserPreferences,
    pub binding: BindingPreferences,
    pub apply: ApplyPreferences,
    pub logging: LoggingPreferences,
}

/// Environment variable names for configuration
pub mod env_vars {
    // Lexical
    pub const LEXICAL_DETAILED_METRICS: &str = "ODATA_LEXICAL_DETAILED_METRICS";
    pub const LEXICAL_COUNT_WHITESPACE: &str = "ODATA_LEXICAL_COUNT_WHITESPACE";
    pub const LEXICAL_INCLUDE_POSITIONS: &str = "ODATA_LEXICAL_INCLUDE_POSITIONS";

    // Parser
    pub const PARSER_CASE_INSENSITIVE_KEYWORDS: &str = "ODATA_PARSER_CASE_INSENSITIVE_KEYWORDS";
    pub const PARSER_CASE_INSENSITIVE_FUNCTIONS: &str = "ODATA_PARSER_CASE_INSENSITIVE_FUNCTIONS";

    // Binding
    pub const BINDING_ALLOW_OPEN_PROPERTIES: &str = "ODATA_BINDING_ALLOW_OPEN_PROPERTIES";
    pub const BINDING_LOG_DETAILS: &str = "ODATA_BINDING_LOG_DETAILS";

    // Apply
    pub const APPLY_LOG_SEGMENTS: &str = "ODATA_APPLY_LOG_SEGMENTS";
    pub const APPLY_VALIDATE_AGGREGATES: &str = "ODATA_APPLY_VALIDATE_AGGREGATES";

    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "ODATA_LOGGING_USE_STRUCTURED";
    pub const LOGGING_ENABLE_CONSOLE: &str = "ODATA_LOGGING_ENABLE_CONSOLE";
    pub const LOGGING_MIN_LEVEL: &str = "ODATA_LOGGING_MIN_LEVEL";
    pub const LOGGING_INCLUDE_QUERY_CONTEXT: &str = "ODATA_LOGGING_INCLUDE_QUERY_CONTEXT";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("ERROR"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("warn"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("1"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("info"), Some(LogLevel::Info));
        assert_eq!(parse_log_level("debug"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn test_env_var_names_use_prefix() {
        for name in [
            env_vars::LEXICAL_DETAILED_METRICS,
            env_vars::PARSER_CASE_INSENSITIVE_KEYWORDS,
            env_vars::BINDING_ALLOW_OPEN_PROPERTIES,
            env_vars::APPLY_LOG_SEGMENTS,
            env_vars::LOGGING_MIN_LEVEL,
        ] {
            assert!(name.starts_with("ODATA_"));
        }
    }

    #[test]
    fn test_runtime_config_serializes() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("allow_open_properties"));
    }
}
