//! Global logging for the query parser
//!
//! A process-wide logger and error collector behind `OnceLock`, a
//! thread-local query option context, and the `log_*!` macros.

pub mod codes;
pub mod collector;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use collector::{ErrorCollector, ProcessingSummary, QueryOptionContext};
pub use events::{LogEvent, LogLevel};
pub use service::{ConsoleLogger, Logger, LoggingService, MemoryLogger, StructuredLogger};

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();
static GLOBAL_ERROR_COLLECTOR: OnceLock<Arc<ErrorCollector>> = OnceLock::new();
static NEXT_QUERY_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static QUERY_CONTEXT: RefCell<Option<QueryOptionContext>> = const { RefCell::new(None) };
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize global logging from configuration
pub fn init_global_logging() -> Result<(), String> {
    config::validate_config().map_err(|e| format!("Configuration validation failed: {}", e))?;

    let logging_service = Arc::new(service::create_configured_service());
    install(logging_service.clone())?;

    for code in [
        codes::system::INTERNAL_ERROR,
        codes::lexical::INVALID_CHARACTER,
        codes::syntax::UNEXPECTED_TOKEN,
        codes::apply::MISSING_WITH_STATEMENT,
        codes::binding::UNRESOLVED_PROPERTY,
    ] {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!("Missing metadata for error code: {}", code));
        }
    }

    logging_service.log_event(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Global logging system initialized",
    ));

    Ok(())
}

/// Initialize with a caller-supplied service
pub fn init_global_logging_with_service(service: Arc<LoggingService>) -> Result<(), String> {
    install(service)
}

fn install(service: Arc<LoggingService>) -> Result<(), String> {
    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized")?;

    GLOBAL_ERROR_COLLECTOR
        .set(Arc::new(ErrorCollector::new()))
        .map_err(|_| "Global error collector already initialized")?;

    Ok(())
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER.get().is_some() && GLOBAL_ERROR_COLLECTOR.get().is_some()
}

pub fn try_get_global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get().map(|service| service.as_ref())
}

pub fn try_get_global_error_collector() -> Option<&'static ErrorCollector> {
    GLOBAL_ERROR_COLLECTOR
        .get()
        .map(|collector| collector.as_ref())
}

// ============================================================================
// QUERY OPTION CONTEXT
// ============================================================================

pub fn next_query_id() -> usize {
    NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn set_query_context(option: &str, query_id: usize) {
    if let Some(collector) = try_get_global_error_collector() {
        collector.record_option(option);
    }

    QUERY_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = Some(QueryOptionContext::new(option, query_id));
    });
}

pub fn clear_query_context() {
    QUERY_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = None;
    });
}

/// Run `f` with events tagged by `option`. The previous context, if any,
/// is restored afterwards so contexts nest.
pub fn with_query_context<F, R>(option: &str, query_id: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = get_current_query_context();
    set_query_context(option, query_id);
    let result = f();
    QUERY_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = previous;
    });
    result
}

pub fn get_current_query_context() -> Option<QueryOptionContext> {
    QUERY_CONTEXT.with(|ctx| ctx.borrow().clone())
}

// ============================================================================
// MACRO SUPPORT FUNCTIONS
// ============================================================================

fn decorate(mut event: LogEvent, context: Vec<(&str, &str)>) -> LogEvent {
    event.message = config::truncate_message(&event.message);

    for (key, value) in context {
        event = event.with_context(key, value);
    }

    if config::include_query_context() {
        if let Some(query_ctx) = get_current_query_context() {
            event = event
                .with_query_option(&query_ctx.option)
                .with_context("query_id", &query_ctx.query_id.to_string());
        }
    }

    event
}

fn dispatch(event: LogEvent) {
    if event.is_error() || event.is_warning() {
        if let (Some(query_ctx), Some(collector)) =
            (get_current_query_context(), try_get_global_error_collector())
        {
            collector.record_event(&query_ctx.option, event.clone());
        }
    }

    if let Some(logger) = try_get_global_logger() {
        logger.log_event(event);
    }
}

pub fn log_error_with_context(
    code: Code,
    message: &str,
    span: Option<crate::utils::Span>,
    context: Vec<(&str, &str)>,
) {
    let mut event = LogEvent::error(code, message);
    if let Some(s) = span {
        event = event.with_span(s);
    }
    dispatch(decorate(event, context));
}

pub fn log_success_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    dispatch(decorate(LogEvent::success(code, message), context));
}

pub fn log_info_with_context(message: &str, context: Vec<(&str, &str)>) {
    dispatch(decorate(LogEvent::info(message), context));
}

pub fn log_warning_with_context(code: Option<Code>, message: &str, context: Vec<(&str, &str)>) {
    let event = match code {
        Some(code) => LogEvent::warning_with_code(code, message),
        None => LogEvent::warning(message),
    };
    dispatch(decorate(event, context));
}

pub fn log_debug_with_context(message: &str, context: Vec<(&str, &str)>) {
    dispatch(decorate(LogEvent::debug(message), context));
}

// ============================================================================
// REPORTING
// ============================================================================

pub fn get_processing_summary() -> ProcessingSummary {
    try_get_global_error_collector()
        .map(|collector| collector.get_summary())
        .unwrap_or_default()
}

pub fn get_option_errors(option: &str) -> Vec<LogEvent> {
    try_get_global_error_collector()
        .map(|collector| collector.get_option_errors(option))
        .unwrap_or_default()
}

pub fn format_report() -> String {
    try_get_global_error_collector()
        .map(collector::format_report)
        .unwrap_or_else(|| "No error collector available for summary".to_string())
}

pub fn clear_error_collection() {
    if let Some(collector) = try_get_global_error_collector() {
        collector.clear();
    }
}

/// Logs through the global logger, or stderr when logging is not initialized
pub fn safe_log_error(code: Code, message: &str) {
    if let Some(logger) = try_get_global_logger() {
        logger.log_event(LogEvent::error(code, message));
    } else {
        eprintln!("[ERROR] FALLBACK: [{}] {}", code.as_str(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_context_management() {
        assert!(get_current_query_context().is_none());

        set_query_context("$filter", 7);
        let context = get_current_query_context().unwrap();
        assert_eq!(context.option, "$filter");
        assert_eq!(context.query_id, 7);

        clear_query_context();
        assert!(get_current_query_context().is_none());
    }

    #[test]
    fn test_with_query_context_nests_and_restores() {
        let result = with_query_context("$expand", 1, || {
            let inner = with_query_context("$filter", 1, || {
                get_current_query_context().map(|c| c.option)
            });
            assert_eq!(inner.as_deref(), Some("$filter"));
            get_current_query_context().map(|c| c.option)
        });

        assert_eq!(result.as_deref(), Some("$expand"));
        assert!(get_current_query_context().is_none());
    }

    #[test]
    fn test_query_ids_are_distinct() {
        let first = next_query_id();
        let second = next_query_id();
        assert!(second > first);
    }

    #[test]
    fn test_decorate_adds_option_tag() {
        let event = with_query_context("$apply", 3, || {
            decorate(LogEvent::info("segment"), vec![("index", "0")])
        });
        assert_eq!(event.context.get("index").map(String::as_str), Some("0"));
        if config::include_query_context() {
            assert_eq!(
                event.context.get("query_option").map(String::as_str),
                Some("$apply")
            );
        }
    }

    #[test]
    fn test_safe_logging_without_init() {
        safe_log_error(codes::system::INTERNAL_ERROR, "fallback");
    }
}
