use clap::{ArgGroup, Parser};
use odata_query::config::{LoggingPreferences, RuntimeConfig};
use odata_query::grammar::keywords::QueryOptionKind;
use odata_query::validation::{self, Diagnostic};
use odata_query::{logging, pipeline, ParsedUri, PipelineError, PipelineResult, QueryOptionParser};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Parse and bind OData query options against a JSON model
#[derive(Debug, Parser)]
#[command(name = "odata-query", version, about)]
#[command(group(ArgGroup::new("target").required(true).args(["entity_set", "path"])))]
struct Cli {
    /// Model document (JSON)
    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    /// Entity set the options range over
    #[arg(long)]
    entity_set: Option<String>,

    /// Relative request URI, e.g. `Customers(1)/Orders?$top=2`
    #[arg(long, conflicts_with_all = ["filter", "orderby", "apply", "select", "expand", "search", "top", "skip", "count"])]
    path: Option<String>,

    #[arg(long)]
    filter: Option<String>,

    #[arg(long)]
    orderby: Option<String>,

    #[arg(long)]
    apply: Option<String>,

    #[arg(long)]
    select: Option<String>,

    #[arg(long)]
    expand: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    top: Option<String>,

    #[arg(long)]
    skip: Option<String>,

    #[arg(long)]
    count: Option<String>,

    /// Emit log events as JSON lines on stderr
    #[arg(long)]
    structured_logs: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(flatten)]
    query: ParsedUri,
    /// Problems found in the model itself
    model_diagnostics: Vec<Arc<Diagnostic>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging(cli.structured_logs) {
        eprintln!("error: {}", error);
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(output) => {
            let has_diagnostics =
                output.query.has_diagnostics() || !output.model_diagnostics.is_empty();
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{}", json),
                Err(error) => {
                    eprintln!("error: cannot serialize result: {}", error);
                    return ExitCode::from(1);
                }
            }
            if has_diagnostics {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            eprintln!("error[{}]: {}", error.error_code(), error);
            if let Some(span) = error.span() {
                eprintln!("  --> column {}", span.start.column);
            }
            eprintln!("{}", logging::format_report());
            ExitCode::from(1)
        }
    }
}

fn init_logging(structured: bool) -> Result<(), String> {
    let defaults = LoggingPreferences::default();
    logging::config::init_runtime_preferences(LoggingPreferences {
        use_structured_logging: structured || defaults.use_structured_logging,
        enable_console_logging: structured || defaults.enable_console_logging,
        ..defaults
    })?;
    logging::init_global_logging()?;
    pipeline::validate_pipeline()
}

fn run(cli: &Cli) -> PipelineResult<Output> {
    let model = odata_query::load_model_from_path(&cli.model)?;
    let model_diagnostics = validation::validate_model(&model).diagnostics;
    let config = RuntimeConfig::default();

    let query = match (&cli.path, &cli.entity_set) {
        (Some(uri), _) => pipeline::parse_uri_with_config(&model, uri, config)?,
        (None, Some(entity_set)) => {
            let mut parser = QueryOptionParser::new(&model, entity_set).with_config(config);
            pipeline::parse_query_options(&mut parser, &option_flags(cli))?
        }
        (None, None) => {
            return Err(PipelineError::pipeline_error(
                "either --entity-set or --path is required",
            ))
        }
    };

    Ok(Output {
        query,
        model_diagnostics,
    })
}

/// System query options given as individual flags
fn option_flags(cli: &Cli) -> HashMap<QueryOptionKind, String> {
    [
        (QueryOptionKind::Filter, &cli.filter),
        (QueryOptionKind::OrderBy, &cli.orderby),
        (QueryOptionKind::Apply, &cli.apply),
        (QueryOptionKind::Select, &cli.select),
        (QueryOptionKind::Expand, &cli.expand),
        (QueryOptionKind::Search, &cli.search),
        (QueryOptionKind::Top, &cli.top),
        (QueryOptionKind::Skip, &cli.skip),
        (QueryOptionKind::Count, &cli.count),
    ]
    .into_iter()
    .filter_map(|(kind, value)| value.clone().map(|value| (kind, value)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_target_is_required() {
        assert!(Cli::try_parse_from(["odata-query", "--model", "m.json"]).is_err());
        assert!(Cli::try_parse_from([
            "odata-query",
            "--model",
            "m.json",
            "--path",
            "Customers",
            "--filter",
            "true"
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "odata-query",
            "--model",
            "m.json",
            "--entity-set",
            "Customers",
            "--filter",
            "Name eq 'Ann'",
            "--structured-logs",
        ])
        .unwrap();
        assert_eq!(cli.entity_set.as_deref(), Some("Customers"));
        assert!(cli.structured_logs);

        let flags = option_flags(&cli);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[&QueryOptionKind::Filter], "Name eq 'Ann'");
    }
}
