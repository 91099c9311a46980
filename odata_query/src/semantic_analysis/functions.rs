//! Built-in function table and overload resolution
//!
//! The table is built once per process and is read-only afterwards. `cast`
//! and `isof` take a type name instead of a value, so the binder handles
//! them itself; they are listed here only so name lookup knows them.

use crate::model::{EdmPrimitiveKind, TypeReference};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const CAST_FUNCTION: &str = "cast";
pub const ISOF_FUNCTION: &str = "isof";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    String,
    DateTime,
    Math,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub parameters: Vec<EdmPrimitiveKind>,
    pub return_type: EdmPrimitiveKind,
}

#[derive(Debug)]
pub struct BuiltInFunction {
    pub name: &'static str,
    pub category: FunctionCategory,
    pub signatures: Vec<FunctionSignature>,
}

impl BuiltInFunction {
    pub fn is_type_function(&self) -> bool {
        self.category == FunctionCategory::Type
    }
}

#[derive(Debug)]
pub struct BuiltInFunctions {
    functions: HashMap<&'static str, BuiltInFunction>,
}

impl BuiltInFunctions {
    fn build() -> Self {
        use EdmPrimitiveKind::*;
        use FunctionCategory as C;

        let table: &[(&'static str, FunctionCategory, &[(&[EdmPrimitiveKind], EdmPrimitiveKind)])] = &[
            ("contains", C::String, &[(&[String, String], Boolean)]),
            ("startswith", C::String, &[(&[String, String], Boolean)]),
            ("endswith", C::String, &[(&[String, String], Boolean)]),
            ("length", C::String, &[(&[String], Int32)]),
            ("indexof", C::String, &[(&[String, String], Int32)]),
            ("substring", C::String, &[(&[String, Int32], String), (&[String, Int32, Int32], String)]),
            ("tolower", C::String, &[(&[String], String)]),
            ("toupper", C::String, &[(&[String], String)]),
            ("trim", C::String, &[(&[String], String)]),
            ("concat", C::String, &[(&[String, String], String)]),
            ("year", C::DateTime, &[(&[Date], Int32), (&[DateTimeOffset], Int32)]),
            ("month", C::DateTime, &[(&[Date], Int32), (&[DateTimeOffset], Int32)]),
            ("day", C::DateTime, &[(&[Date], Int32), (&[DateTimeOffset], Int32)]),
            ("hour", C::DateTime, &[(&[TimeOfDay], Int32), (&[DateTimeOffset], Int32)]),
            ("minute", C::DateTime, &[(&[TimeOfDay], Int32), (&[DateTimeOffset], Int32)]),
            ("second", C::DateTime, &[(&[TimeOfDay], Int32), (&[DateTimeOffset], Int32)]),
            ("fractionalseconds", C::DateTime, &[(&[TimeOfDay], Decimal), (&[DateTimeOffset], Decimal)]),
            ("date", C::DateTime, &[(&[DateTimeOffset], Date)]),
            ("time", C::DateTime, &[(&[DateTimeOffset], TimeOfDay)]),
            ("totaloffsetminutes", C::DateTime, &[(&[DateTimeOffset], Int32)]),
            ("now", C::DateTime, &[(&[], DateTimeOffset)]),
            ("mindatetime", C::DateTime, &[(&[], DateTimeOffset)]),
            ("maxdatetime", C::DateTime, &[(&[], DateTimeOffset)]),
            ("round", C::Math, &[(&[Double], Double), (&[Decimal], Decimal)]),
            ("floor", C::Math, &[(&[Double], Double), (&[Decimal], Decimal)]),
            ("ceiling", C::Math, &[(&[Double], Double), (&[Decimal], Decimal)]),
            (CAST_FUNCTION, C::Type, &[]),
            (ISOF_FUNCTION, C::Type, &[]),
        ];

        let functions = table
            .iter()
            .map(|(name, category, signatures)| {
                let signatures = signatures
                    .iter()
                    .map(|(parameters, return_type)| FunctionSignature {
                        parameters: parameters.to_vec(),
                        return_type: *return_type,
                    })
                    .collect();
                (
                    *name,
                    BuiltInFunction {
                        name: *name,
                        category: *category,
                        signatures,
                    },
                )
            })
            .collect();

        Self { functions }
    }

    pub fn lookup(&self, name: &str, case_insensitive: bool) -> Option<&BuiltInFunction> {
        match self.functions.get(name) {
            Some(function) => Some(function),
            None if case_insensitive => self.functions.get(name.to_ascii_lowercase().as_str()),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

static BUILT_IN_FUNCTIONS: OnceLock<BuiltInFunctions> = OnceLock::new();

pub fn built_in_functions() -> &'static BuiltInFunctions {
    BUILT_IN_FUNCTIONS.get_or_init(BuiltInFunctions::build)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverloadResolution<'a> {
    Matched(&'a FunctionSignature),
    NoMatch { candidates: usize },
    Ambiguous { candidates: usize },
}

/// Cost of passing `argument` where `parameter` is expected; `None` when it
/// cannot be passed at all
fn promotion_cost(argument: &TypeReference, parameter: EdmPrimitiveKind) -> Option<u32> {
    if argument.is_open() {
        return Some(0);
    }
    let kind = argument.primitive()?;
    if kind == parameter {
        return Some(0);
    }
    if !kind.promotes_to(parameter) {
        return None;
    }
    let from = kind.numeric_rank()?;
    let to = parameter.numeric_rank()?;
    Some(u32::from(to - from) + 1)
}

/// Pick the signature needing the fewest numeric promotions
///
/// Ties are ambiguous unless an argument is untyped, in which case the
/// first declared signature wins.
pub fn resolve_overload<'a>(
    signatures: &'a [FunctionSignature],
    arguments: &[TypeReference],
) -> OverloadResolution<'a> {
    let scored: Vec<(&FunctionSignature, u32)> = signatures
        .iter()
        .filter(|signature| signature.parameters.len() == arguments.len())
        .filter_map(|signature| {
            signature
                .parameters
                .iter()
                .zip(arguments)
                .map(|(parameter, argument)| promotion_cost(argument, *parameter))
                .sum::<Option<u32>>()
                .map(|cost| (signature, cost))
        })
        .collect();

    let Some(best) = scored.iter().map(|(_, cost)| *cost).min() else {
        return OverloadResolution::NoMatch {
            candidates: signatures.len(),
        };
    };

    let winners: Vec<&FunctionSignature> = scored
        .iter()
        .filter(|(_, cost)| *cost == best)
        .map(|(signature, _)| *signature)
        .collect();

    match winners.as_slice() {
        [single] => OverloadResolution::Matched(*single),
        [first, ..] if arguments.iter().any(TypeReference::is_open) => {
            OverloadResolution::Matched(*first)
        }
        _ => OverloadResolution::Ambiguous {
            candidates: winners.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn primitive(kind: EdmPrimitiveKind) -> TypeReference {
        TypeReference::Primitive(kind)
    }

    #[test]
    fn test_table_is_built_once() {
        let table = built_in_functions();
        assert!(std::ptr::eq(table, built_in_functions()));
        assert!(table.lookup("substring", false).is_some());
        assert!(table.lookup("SubString", false).is_none());
        assert!(table.lookup("SubString", true).is_some());
        assert!(table.lookup(CAST_FUNCTION, false).unwrap().is_type_function());
    }

    #[test]
    fn test_integer_argument_prefers_double_rounding() {
        let round = built_in_functions().lookup("round", false).unwrap();
        let resolved = resolve_overload(&round.signatures, &[primitive(EdmPrimitiveKind::Int32)]);
        assert_matches!(resolved, OverloadResolution::Matched(signature)
            if signature.return_type == EdmPrimitiveKind::Double);

        let resolved = resolve_overload(&round.signatures, &[primitive(EdmPrimitiveKind::Decimal)]);
        assert_matches!(resolved, OverloadResolution::Matched(signature)
            if signature.return_type == EdmPrimitiveKind::Decimal);
    }

    #[test]
    fn test_substring_arities() {
        let substring = built_in_functions().lookup("substring", false).unwrap();
        let string = primitive(EdmPrimitiveKind::String);
        let int = primitive(EdmPrimitiveKind::Int32);
        assert_matches!(
            resolve_overload(&substring.signatures, &[string.clone(), int.clone(), int.clone()]),
            OverloadResolution::Matched(signature) if signature.parameters.len() == 3
        );
        assert_eq!(
            resolve_overload(&substring.signatures, &[string]),
            OverloadResolution::NoMatch { candidates: 2 }
        );
    }

    #[test]
    fn test_untyped_argument_takes_first_signature() {
        let year = built_in_functions().lookup("year", false).unwrap();
        assert_matches!(
            resolve_overload(&year.signatures, &[TypeReference::Untyped]),
            OverloadResolution::Matched(signature)
                if signature.parameters == [EdmPrimitiveKind::Date]
        );
    }

    #[test]
    fn test_wrong_kind_does_not_match() {
        let year = built_in_functions().lookup("year", false).unwrap();
        assert_eq!(
            resolve_overload(&year.signatures, &[primitive(EdmPrimitiveKind::String)]),
            OverloadResolution::NoMatch { candidates: 2 }
        );
    }
}
