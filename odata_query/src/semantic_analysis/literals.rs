//! Literal binding
//!
//! The lexer only checks literal shape. Calendar values, GUIDs and enum
//! members are checked here, against chrono, uuid and the model.

use crate::model::{core_vocabulary, EdmModel, TypeReference};
use crate::reference_resolution::{UnresolvedKind, UnresolvedRef};
use crate::semantic_analysis::error::{BindingError, BindingResult};
use crate::semantic_analysis::nodes::QueryNode;
use crate::tokens::LiteralValue;
use crate::utils::Span;
use crate::validation::Location;
use chrono::{DateTime, NaiveDate, NaiveTime};

pub fn bind_literal(
    model: &dyn EdmModel,
    value: &LiteralValue,
    text: &str,
    span: Span,
) -> BindingResult<QueryNode> {
    let invalid = |reason: String| BindingError::InvalidLiteralValue {
        type_name: value.edm_type_name().unwrap_or("null").to_string(),
        text: text.to_string(),
        reason,
        span,
    };

    let type_ref = match value {
        LiteralValue::Null => TypeReference::Untyped,
        LiteralValue::Date(date) => {
            check_date(date).map_err(invalid)?;
            primitive_type(value)
        }
        LiteralValue::TimeOfDay(time) => {
            check_time_of_day(time).map_err(invalid)?;
            primitive_type(value)
        }
        LiteralValue::DateTimeOffset(timestamp) => {
            check_date_time_offset(timestamp).map_err(invalid)?;
            primitive_type(value)
        }
        LiteralValue::Guid(guid) => {
            uuid::Uuid::parse_str(guid).map_err(|error| invalid(error.to_string()))?;
            primitive_type(value)
        }
        LiteralValue::Enum { type_name, value: members } => {
            bind_enum(model, type_name, members, span).map_err(invalid)?
        }
        _ => primitive_type(value),
    };

    Ok(QueryNode::constant(value.clone(), text, type_ref, span))
}

fn primitive_type(value: &LiteralValue) -> TypeReference {
    value
        .edm_type_name()
        .and_then(|name| core_vocabulary().primitive(name))
        .map(TypeReference::Primitive)
        .unwrap_or(TypeReference::Untyped)
}

pub fn check_date(text: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|error| error.to_string())
}

pub fn check_time_of_day(text: &str) -> Result<(), String> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map(|_| ())
        .map_err(|error| error.to_string())
}

/// RFC 3339, also accepting a time without seconds (`2014-08-31T12:40Z`)
pub fn check_date_time_offset(text: &str) -> Result<(), String> {
    let error = match DateTime::parse_from_rfc3339(text) {
        Ok(_) => return Ok(()),
        Err(error) => error.to_string(),
    };

    let with_seconds = text.split_once('T').and_then(|(date, time)| {
        let (hours_minutes, rest) = (time.get(..5)?, time.get(5..)?);
        (!rest.starts_with(':')).then(|| format!("{}T{}:00{}", date, hours_minutes, rest))
    });
    match with_seconds {
        Some(padded) => DateTime::parse_from_rfc3339(&padded)
            .map(|_| ())
            .map_err(|_| error),
        None => Err(error),
    }
}

/// Enum literal type; an unknown enum type becomes a placeholder, an unknown
/// member of a known type is an error
fn bind_enum(
    model: &dyn EdmModel,
    type_name: &str,
    members: &str,
    span: Span,
) -> Result<TypeReference, String> {
    let Some(enum_type) = model.find_type(type_name).and_then(|t| t.as_enum()) else {
        return Ok(TypeReference::Unresolved(UnresolvedRef::new(
            UnresolvedKind::Type,
            type_name,
            Location::Query(span),
        )));
    };

    let parts: Vec<&str> = members.split(',').map(str::trim).collect();
    if parts.len() > 1 && !enum_type.is_flags {
        return Err(format!("{} is not a flags enumeration", type_name));
    }
    if let Some(unknown) = parts.iter().find(|part| enum_type.member(part).is_none()) {
        return Err(format!("'{}' is not a member of {}", unknown, type_name));
    }
    Ok(TypeReference::Enum(enum_type.qualified_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sales_model;
    use crate::model::EdmPrimitiveKind;
    use assert_matches::assert_matches;

    fn bind(value: LiteralValue, text: &str) -> BindingResult<QueryNode> {
        bind_literal(&sales_model(), &value, text, Span::from_offsets(0, text.len()))
    }

    #[test]
    fn test_calendar_values_are_checked() {
        let node = bind(LiteralValue::Date("2014-08-31".into()), "2014-08-31").unwrap();
        assert_eq!(node.type_ref(), &TypeReference::Primitive(EdmPrimitiveKind::Date));

        assert_matches!(
            bind(LiteralValue::Date("2014-13-40".into()), "2014-13-40"),
            Err(BindingError::InvalidLiteralValue { ref type_name, .. }) if type_name == "Edm.Date"
        );
        assert!(bind(LiteralValue::TimeOfDay("12:40:05.050".into()), "12:40:05.050").is_ok());
        assert!(bind(LiteralValue::TimeOfDay("25:00".into()), "25:00").is_err());
    }

    #[test]
    fn test_date_time_offset_forms() {
        assert!(check_date_time_offset("2014-08-31T12:40:05Z").is_ok());
        assert!(check_date_time_offset("2014-08-31T12:40Z").is_ok());
        assert!(check_date_time_offset("2014-08-31T12:40:05.5+02:00").is_ok());
        assert!(check_date_time_offset("2014-02-30T12:40Z").is_err());
    }

    #[test]
    fn test_enum_members() {
        let node = bind(
            LiteralValue::Enum { type_name: "Sales.Color".into(), value: "Red,Blue".into() },
            "Sales.Color'Red,Blue'",
        )
        .unwrap();
        assert_eq!(node.type_ref(), &TypeReference::Enum("Sales.Color".into()));

        assert!(bind(
            LiteralValue::Enum { type_name: "Sales.Color".into(), value: "Purple".into() },
            "Sales.Color'Purple'",
        )
        .is_err());

        let unknown = bind(
            LiteralValue::Enum { type_name: "Sales.Shade".into(), value: "Dark".into() },
            "Sales.Shade'Dark'",
        )
        .unwrap();
        assert!(unknown.type_ref().is_unresolved());
        assert_eq!(unknown.errors().len(), 1);
    }

    #[test]
    fn test_null_is_untyped() {
        let node = bind(LiteralValue::Null, "null").unwrap();
        assert_eq!(node.type_ref(), &TypeReference::Untyped);
        assert!(bind(LiteralValue::Guid("not-a-guid".into()), "not-a-guid").is_err());
    }
}
