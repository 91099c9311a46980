//! `$apply` pre-pass
//!
//! The splitter cuts the value into transformation segments; each segment is
//! parsed by its clause parser, and property expressions go through the
//! ordinary lexer and parser.

pub mod clause;
pub mod error;
pub mod splitter;

pub use clause::{
    parse_aggregatable_property, ApplyToken, TransformationClauseToken, TransformationToken,
};
pub use error::{ApplyError, ApplyResult};
pub use splitter::{segment, split, RawTransformation};

use crate::config::runtime::ApplyPreferences;
use crate::logging::codes;
use crate::utils::Span;
use crate::{log_debug, log_error, log_success};

pub struct ApplyParser {
    preferences: ApplyPreferences,
}

impl ApplyParser {
    pub fn new() -> Self {
        Self::with_preferences(ApplyPreferences::default())
    }

    pub fn with_preferences(preferences: ApplyPreferences) -> Self {
        Self { preferences }
    }

    pub fn parse(&self, apply: &str) -> ApplyResult<ApplyToken> {
        log_debug!("Starting $apply parsing", "length" => apply.len());

        let result = self.parse_segments(apply);
        match &result {
            Ok(token) => {
                log_success!(codes::success::APPLY_SPLIT_COMPLETE, "$apply parsed",
                    "transformations" => token.transformations.len()
                );
            }
            Err(error) => match error.span() {
                Some(span) => log_error!(error.error_code(), &error.to_string(), span = span),
                None => log_error!(error.error_code(), &error.to_string()),
            },
        }
        result
    }

    fn parse_segments(&self, apply: &str) -> ApplyResult<ApplyToken> {
        let raw_segments = segment(apply)?;

        let mut transformations = Vec::with_capacity(raw_segments.len());
        for raw in &raw_segments {
            if self.preferences.log_segments {
                log_debug!("Transformation segment",
                    "name" => raw.name(),
                    "start" => raw.start,
                    "text" => raw.text.as_str()
                );
            }
            transformations.push(clause::parse_transformation(
                raw,
                self.preferences.validate_aggregate_statements,
            )?);
        }

        Ok(ApplyToken {
            transformations,
            span: Span::from_offsets(0, apply.len()),
        })
    }
}

impl Default for ApplyParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_apply(apply: &str) -> ApplyResult<ApplyToken> {
    ApplyParser::new().parse(apply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::keywords::TransformationKind;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_pipeline_in_order() {
        let token = parse_apply(
            "filter(Amount gt 10)/groupby((Region),aggregate(Amount with sum as Total))/filter(Total gt 100)",
        )
        .unwrap();
        let kinds: Vec<_> = token.transformations.iter().map(|t| t.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                TransformationKind::Filter,
                TransformationKind::GroupBy,
                TransformationKind::Filter
            ]
        );
    }

    #[test]
    fn test_lenient_aliases_follow_preferences() {
        let lenient = ApplyParser::with_preferences(ApplyPreferences {
            log_segments: true,
            validate_aggregate_statements: false,
        });
        let token = lenient.parse("aggregate(Amount with sum)").unwrap();
        assert_matches!(
            &token.transformations[0].clause,
            TransformationClauseToken::Aggregate(aggregate)
                if aggregate.statements().next().map(|s| s.alias.as_str()) == Some("Amount")
        );

        let strict = ApplyParser::with_preferences(ApplyPreferences {
            log_segments: false,
            validate_aggregate_statements: true,
        });
        assert_matches!(
            strict.parse("aggregate(Amount with sum)"),
            Err(ApplyError::MissingAlias { .. })
        );
    }

    #[test]
    fn test_errors_propagate() {
        assert_matches!(
            parse_apply("aggregate(Amount sum as Total)"),
            Err(ApplyError::MissingWithStatement { .. })
        );
        assert_matches!(parse_apply("filter(Amount gt"), Err(ApplyError::UnbalancedParentheses { .. }));
    }
}
