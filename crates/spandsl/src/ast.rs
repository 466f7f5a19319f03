/// Abstract Syntax Tree (AST) definitions for the Span DSL
///
/// A Span query describes coverage or subscription statistics:
/// HAS fiber AND nedhast >= 100 IN tett COUNT hus BY fylke SORT andel DESC TOP 5
use std::fmt;

/// Root query structure
#[derive(Debug, Clone, PartialEq)]
pub struct SpanQuery {
    /// What counts as covered. Always present after parsing.
    pub has: Option<HasClause>,
    /// Population filters, in source order
    pub filters: Vec<InFilter>,
    pub count: Metric,
    pub by: Grouping,
    pub show: Output,
    pub sort: SortClause,
    pub top: Option<u64>,
    pub for_clause: Option<ForClause>,
}

impl SpanQuery {
    /// Query with the language defaults for every optional clause
    pub fn new(has: Option<HasClause>, count: Metric) -> Self {
        Self {
            has,
            filters: Vec::new(),
            count,
            by: Grouping::default(),
            show: Output::default(),
            sort: SortClause::default(),
            top: None,
            for_clause: None,
        }
    }
}

/// HAS clause: a quantifier over several expressions, or one expression
#[derive(Debug, Clone, PartialEq)]
pub enum HasClause {
    Quantified {
        quantifier: Quantifier,
        expressions: Vec<Expr>,
    },
    Expression(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
    None,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => write!(f, "ANY"),
            Quantifier::All => write!(f, "ALL"),
            Quantifier::None => write!(f, "NONE"),
        }
    }
}

/// Expression types
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare technology predicate (e.g. fiber)
    Flag { flag: TechFlag, negated: bool },
    /// Field comparison (e.g. nedhast >= 100)
    Comparison {
        field: Field,
        op: ComparisonOperator,
        value: Value,
        negated: bool,
    },
    /// Binary operation (e.g. a AND b)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// NOT expr
    Not(Box<Expr>),
}

impl Expr {
    pub fn flag(flag: TechFlag) -> Self {
        Expr::Flag {
            flag,
            negated: false,
        }
    }

    pub fn comparison(field: Field, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        Expr::Comparison {
            field,
            op,
            value: value.into(),
            negated: false,
        }
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::And => write!(f, "AND"),
            BinaryOperator::Or => write!(f, "OR"),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Gte,   // >=
    Lt,    // <
    Lte,   // <=
}

impl ComparisonOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(ComparisonOperator::Eq),
            "!=" => Some(ComparisonOperator::NotEq),
            ">" => Some(ComparisonOperator::Gt),
            ">=" => Some(ComparisonOperator::Gte),
            "<" => Some(ComparisonOperator::Lt),
            "<=" => Some(ComparisonOperator::Lte),
            _ => None,
        }
    }

    /// Evaluate `left <op> right`
    pub fn matches<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            ComparisonOperator::Eq => left == right,
            ComparisonOperator::NotEq => left != right,
            ComparisonOperator::Gt => left > right,
            ComparisonOperator::Gte => left >= right,
            ComparisonOperator::Lt => left < right,
            ComparisonOperator::Lte => left <= right,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Eq => write!(f, "="),
            ComparisonOperator::NotEq => write!(f, "!="),
            ComparisonOperator::Gt => write!(f, ">"),
            ComparisonOperator::Gte => write!(f, ">="),
            ComparisonOperator::Lt => write!(f, "<"),
            ComparisonOperator::Lte => write!(f, "<="),
        }
    }
}

/// Comparison values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Number(i64),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Technology flags usable as bare HAS predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechFlag {
    Fiber,
    Cable,
    Dsl,
    FiveG,
    FourG,
    Fwa,
}

/// Population units (or subscriptions) being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Homes,
    Addresses,
    Buildings,
    Cabins,
    Subscriptions,
}

impl Metric {
    pub fn is_subscriptions(&self) -> bool {
        matches!(self, Metric::Subscriptions)
    }
}

/// Result grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// No grouping, one national row
    #[default]
    National,
    County,
    Municipality,
    Postal,
    Urban,
    Provider,
    Tech,
}

/// Which aggregate columns appear in the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    Count,
    Percent,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Count,
    Percent,
    #[default]
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortClause {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Bare IN-clause flags restricting the counted population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationFlag {
    Urban,
    Rural,
    /// Subscription owned by a private customer
    Private,
    /// Subscription owned by a business customer
    Business,
}

impl PopulationFlag {
    /// Ownership flags only make sense for subscription counts
    pub fn is_ownership(&self) -> bool {
        matches!(self, PopulationFlag::Private | PopulationFlag::Business)
    }
}

/// Fields usable in comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Tech,
    Speed,
    Upload,
    Provider,
    County,
    Municipality,
    BuildingType,
    Postal,
}

impl Field {
    /// Speed fields are written in Mbit/s and stored in kbit/s
    pub fn is_speed(&self) -> bool {
        matches!(self, Field::Speed | Field::Upload)
    }

    /// Fields that narrow the population geographically
    pub fn is_geographic(&self) -> bool {
        matches!(self, Field::County | Field::Municipality | Field::Postal)
    }
}

/// One IN-clause filter
#[derive(Debug, Clone, PartialEq)]
pub enum InFilter {
    Population(PopulationFlag),
    Field {
        field: Field,
        op: ComparisonOperator,
        value: Value,
    },
}

/// FOR clause: explicit years or a comparison against the year column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForClause {
    List(Vec<i32>),
    Comparison { op: ComparisonOperator, year: i32 },
}
