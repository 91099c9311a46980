//! Operator keywords and other reserved words of the query grammar
//!
//! Operators are words, not symbols, so the lexer hands them over as
//! identifiers. Everything here maps those words to closed enums.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators in ascending binding strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperatorKind {
    Or,
    And,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Has,
}

impl BinaryOperatorKind {
    pub const ALL: [BinaryOperatorKind; 14] = [
        Self::Or,
        Self::And,
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Modulo,
        Self::Has,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
            Self::Modulo => "mod",
            Self::Has => "has",
        }
    }

    pub fn from_word(word: &str, case_insensitive: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            if case_insensitive {
                kind.as_str().eq_ignore_ascii_case(word)
            } else {
                kind.as_str() == word
            }
        })
    }

    /// Binding strength; higher binds tighter. Unary operators sit above all of these.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal | Self::NotEqual => 3,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 4,
            Self::Add | Self::Subtract => 5,
            Self::Multiply | Self::Divide | Self::Modulo => 6,
            Self::Has => 7,
        }
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    pub const fn is_relational(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    pub const fn is_comparison(self) -> bool {
        self.is_equality() || self.is_relational()
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

impl fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precedence of `not` and unary `-`
pub const UNARY_PRECEDENCE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperatorKind {
    Negate,
    Not,
}

impl UnaryOperatorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "not",
        }
    }
}

impl fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn from_word(word: &str, case_insensitive: bool) -> Option<Self> {
        let matches = |expected: &str| {
            if case_insensitive {
                word.eq_ignore_ascii_case(expected)
            } else {
                word == expected
            }
        };
        if matches("asc") {
            Some(Self::Ascending)
        } else if matches("desc") {
            Some(Self::Descending)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Lambda operators that follow a collection path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambdaKind {
    Any,
    All,
}

impl LambdaKind {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

/// `$apply` transformations handled by the splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformationKind {
    Aggregate,
    GroupBy,
    Filter,
}

impl TransformationKind {
    pub const ALL: [TransformationKind; 3] = [Self::Aggregate, Self::GroupBy, Self::Filter];

    /// Case-sensitive, as transformation names are in the URL grammar
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aggregate" => Some(Self::Aggregate),
            "groupby" => Some(Self::GroupBy),
            "filter" => Some(Self::Filter),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupby",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
}

impl AggregationMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "average" => Some(Self::Average),
            "countdistinct" => Some(Self::CountDistinct),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Average => "average",
            Self::CountDistinct => "countdistinct",
        }
    }

    /// Whether the method only makes sense over numeric values
    pub const fn requires_numeric(self) -> bool {
        matches!(self, Self::Sum | Self::Average)
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System query options recognized by [`crate::pipeline::QueryOptionParser`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryOptionKind {
    Filter,
    OrderBy,
    Select,
    Expand,
    Apply,
    Search,
    Top,
    Skip,
    Count,
    Levels,
}

impl QueryOptionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "$filter" => Some(Self::Filter),
            "$orderby" => Some(Self::OrderBy),
            "$select" => Some(Self::Select),
            "$expand" => Some(Self::Expand),
            "$apply" => Some(Self::Apply),
            "$search" => Some(Self::Search),
            "$top" => Some(Self::Top),
            "$skip" => Some(Self::Skip),
            "$count" => Some(Self::Count),
            "$levels" => Some(Self::Levels),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "$filter",
            Self::OrderBy => "$orderby",
            Self::Select => "$select",
            Self::Expand => "$expand",
            Self::Apply => "$apply",
            Self::Search => "$search",
            Self::Top => "$top",
            Self::Skip => "$skip",
            Self::Count => "$count",
            Self::Levels => "$levels",
        }
    }

    /// Options allowed inside an `$expand` term's parentheses
    pub const fn allowed_in_expand(self) -> bool {
        !matches!(self, Self::Apply | Self::Search)
    }
}

impl fmt::Display for QueryOptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `$search` operators, matched case-sensitively
pub mod search {
    pub const AND: &str = "AND";
    pub const OR: &str = "OR";
    pub const NOT: &str = "NOT";
}

/// Range variable naming the current resource
pub const IMPLICIT_RANGE_VARIABLE: &str = "$it";
pub const THIS_RANGE_VARIABLE: &str = "$this";
pub const COUNT_SEGMENT: &str = "$count";

/// Words that cannot stand alone as a property name in expression position
pub fn is_reserved_keyword(word: &str, case_insensitive: bool) -> bool {
    BinaryOperatorKind::from_word(word, case_insensitive).is_some()
        || if case_insensitive {
            word.eq_ignore_ascii_case("not")
        } else {
            word == "not"
        }
}
