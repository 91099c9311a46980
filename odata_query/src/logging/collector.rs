//! Per-query-option event collection
//!
//! Events raised while a query option is being processed are grouped under
//! that option so that a whole request can be reported in one place.

use super::events::LogEvent;
use crate::config::compile_time::logging::*;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// The query option currently being processed on this thread
#[derive(Debug, Clone)]
pub struct QueryOptionContext {
    /// `$filter`, `$apply`, `$orderby`, ...
    pub option: String,
    pub query_id: usize,
    pub start_time: Instant,
}

impl QueryOptionContext {
    pub fn new(option: impl Into<String>, query_id: usize) -> Self {
        Self {
            option: option.into(),
            query_id,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingSummary {
    pub total_options: usize,
    pub clean_options: usize,
    pub failed_options: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl ProcessingSummary {
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.total_warnings > 0
    }
}

/// Thread-safe store of events keyed by query option
pub struct ErrorCollector {
    option_events: Mutex<BTreeMap<String, Vec<LogEvent>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self {
            option_events: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<LogEvent>>> {
        self.option_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event. Past the per-option limit a single overflow warning
    /// is appended and further events are dropped.
    pub fn record_event(&self, option: &str, event: LogEvent) {
        let mut events = self.lock();
        let total: usize = events.values().map(Vec::len).sum();
        if total >= MAX_ERROR_COLLECTION {
            return;
        }

        let option_events = events.entry(option.to_string()).or_default();
        if option_events.len() < MAX_LOG_EVENTS_PER_QUERY {
            option_events.push(event);
        } else if option_events.len() == MAX_LOG_EVENTS_PER_QUERY {
            option_events.push(LogEvent::warning(&format!(
                "Too many events for {} (limit: {})",
                option, MAX_LOG_EVENTS_PER_QUERY
            )));
        }
    }

    /// Make sure the option shows up in summaries even if it raised nothing
    pub fn record_option(&self, option: &str) {
        self.lock().entry(option.to_string()).or_default();
    }

    pub fn get_option_events(&self, option: &str) -> Vec<LogEvent> {
        self.lock().get(option).cloned().unwrap_or_default()
    }

    pub fn get_option_errors(&self, option: &str) -> Vec<LogEvent> {
        self.lock()
            .get(option)
            .map(|events| events.iter().filter(|e| e.is_error()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_all_events(&self) -> BTreeMap<String, Vec<LogEvent>> {
        self.lock().clone()
    }

    pub fn get_summary(&self) -> ProcessingSummary {
        let events = self.lock();
        let mut summary = ProcessingSummary {
            total_options: events.len(),
            ..ProcessingSummary::default()
        };

        for option_events in events.values() {
            let errors = option_events.iter().filter(|e| e.is_error()).count();
            let warnings = option_events.iter().filter(|e| e.is_warning()).count();
            summary.total_errors += errors;
            summary.total_warnings += warnings;
            if errors > 0 {
                summary.failed_options += 1;
            } else {
                summary.clean_options += 1;
            }
        }

        summary
    }

    pub fn total_event_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiler-style report grouped by query option
pub fn format_report(collector: &ErrorCollector) -> String {
    let mut output = String::new();

    for (option, events) in collector.get_all_events() {
        let issues: Vec<_> = events
            .iter()
            .filter(|e| e.is_error() || e.is_warning())
            .collect();
        if issues.is_empty() {
            continue;
        }

        output.push_str(&format!("Checking {}...\n", option));
        for event in issues {
            let label = if event.is_error() { "error" } else { "warning" };
            output.push_str(&format!("{}[{}]: {}\n", label, event.code, event.message));
            if let Some(span) = &event.span {
                output.push_str(&format!("  --> {} {}\n", option, span));
            }
        }
        output.push('\n');
    }

    let summary = collector.get_summary();
    if summary.has_errors() {
        output.push_str(&format!(
            "error: {} query option(s) failed with {} error(s)\n",
            summary.failed_options, summary.total_errors
        ));
    } else if summary.has_warnings() {
        output.push_str(&format!(
            "warning: {} warning(s) across {} query option(s)\n",
            summary.total_warnings, summary.total_options
        ));
    } else {
        output.push_str(&format!(
            "Finished: {} query option(s) processed\n",
            summary.total_options
        ));
    }

    output
}
