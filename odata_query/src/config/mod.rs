//! Configuration module for the OData query parser
//! Automatically uses generated constants from TOML configuration

// Include generated constants from build.rs
// This file is generated at compile time from config/<profile>.toml
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

pub mod runtime;

pub use runtime::{
    ApplyPreferences, BindingPreferences, LexicalPreferences, LoggingPreferences,
    ParserPreferences, RuntimeConfig,
};

/// Build information and configuration metadata
pub mod build_info {
    /// Returns the configuration profile used during build
    pub fn profile() -> &'static str {
        super::compile_time::PROFILE
    }

    /// Returns the configuration directory used during build
    pub fn config_dir() -> &'static str {
        option_env!("ODATA_CONFIG_DIR").unwrap_or("config")
    }

    /// Returns configuration source information
    pub fn source_info() -> String {
        format!("Generated from {}/{}.toml", config_dir(), profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_limits_are_consistent() {
        assert!(compile_time::lexical::MAX_STRING_LITERAL_SIZE <= compile_time::lexical::MAX_QUERY_LENGTH);
        assert!(compile_time::syntax::MAX_PARSE_DEPTH > 0);
        assert!(compile_time::binding::MAX_RANGE_VARIABLE_DEPTH > 0);
        assert!(
            compile_time::logging::MAX_LOG_EVENTS_PER_QUERY <= compile_time::logging::LOG_BUFFER_SIZE
        );
    }

    #[test]
    fn test_build_info_source() {
        assert!(build_info::source_info().ends_with(".toml"));
    }
}
