/// SQL code generator for Span queries
///
/// Picks one of four generation strategies for a resolved query and renders
/// a single SQL statement: CTEs followed by one top-level `SELECT`. Every
/// dataset is read through a year-tagged CTE, so single- and multi-year
/// queries share the same shape.
pub mod builder;
pub mod expr;

mod coverage;
mod historical;
mod pivot;
mod subscription;

use crate::ast::*;
use crate::error::CodeGenError;
use crate::mappings::{Dataset, NATIONAL_LABEL};
use crate::resolve::{resolve, ResolvedQuery};
use builder::{union_all, Select, WithQuery};
use std::fmt;
use tracing::debug;

/// Data directory used when the caller does not supply one
pub const DEFAULT_DATA_PATH: &str = "data";

/// Call-site options for SQL generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlOptions {
    /// Year used when the query has no FOR clause
    pub year: Option<i32>,
    /// Prefix for data file paths, `data` when unset
    pub data_path: Option<String>,
}

impl SqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_data_path(mut self, data_path: impl Into<String>) -> Self {
        self.data_path = Some(data_path.into());
        self
    }

    pub fn data_path(&self) -> &str {
        self.data_path.as_deref().unwrap_or(DEFAULT_DATA_PATH)
    }
}

/// Structurally different SQL shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Pre-aggregated percentages for years before the cutoff
    Historical,
    /// Row counts over the subscription dataset
    Subscription,
    /// One column per year
    Pivot,
    /// Population vs. covered population, one row per group (and year)
    Coverage,
}

impl Strategy {
    pub fn select(resolved: &ResolvedQuery<'_>) -> Self {
        if resolved.historical {
            Strategy::Historical
        } else if resolved.query.count.is_subscriptions() {
            Strategy::Subscription
        } else if resolved.is_multi_year() && resolved.query.by != Grouping::National {
            Strategy::Pivot
        } else {
            Strategy::Coverage
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Historical => write!(f, "historical"),
            Strategy::Subscription => write!(f, "subscription"),
            Strategy::Pivot => write!(f, "pivot"),
            Strategy::Coverage => write!(f, "coverage"),
        }
    }
}

/// Generate SQL for a parsed query
pub fn generate_sql(query: &SpanQuery, options: &SqlOptions) -> Result<String, CodeGenError> {
    let resolved = resolve(query, options.year)?;
    let strategy = Strategy::select(&resolved);
    debug!(%strategy, years = ?resolved.years, "generating sql");

    let ctx = Context {
        query,
        years: &resolved.years,
        data_path: options.data_path(),
    };

    match strategy {
        Strategy::Historical => historical::generate(&ctx),
        Strategy::Subscription => subscription::generate(&ctx),
        Strategy::Pivot => pivot::generate(&ctx),
        Strategy::Coverage => coverage::generate(&ctx),
    }
}

/// Inputs shared by every strategy
struct Context<'a> {
    query: &'a SpanQuery,
    years: &'a [i32],
    data_path: &'a str,
}

impl Context<'_> {
    fn is_multi_year(&self) -> bool {
        self.years.len() > 1
    }

    fn is_county(&self) -> bool {
        self.query.by == Grouping::County
    }

    /// Rows of `datasets` for every year, tagged with an `aar` column
    fn source(&self, datasets: &[Dataset]) -> String {
        let mut parts = Vec::with_capacity(self.years.len() * datasets.len());
        for year in self.years {
            for dataset in datasets {
                parts.push(format!(
                    "SELECT *, {} AS aar FROM {}",
                    year,
                    dataset.source(self.data_path, *year)
                ));
            }
        }
        union_all(parts)
    }

    fn year_filter(&self, qualifier: Option<&str>) -> String {
        let column = crate::mappings::qualify(qualifier, "aar");
        match self.years {
            [year] => format!("{} = {}", column, year),
            years => format!(
                "{} IN ({})",
                column,
                years
                    .iter()
                    .map(|y| y.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// ORDER BY keys for row-per-group results
    fn order_keys(&self) -> Vec<String> {
        let column = match self.query.sort.field {
            SortField::Count => "covered",
            SortField::Percent => "percent",
            SortField::Group => "gruppe",
        };
        let mut keys = vec![format!("{} {}", column, self.query.sort.direction)];
        if self.is_multi_year() {
            keys.push("aar ASC".to_string());
        }
        keys
    }

    /// Projection selected by SHOW
    fn output_columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["gruppe"];
        if self.is_multi_year() {
            columns.push("aar");
        }
        match self.query.show {
            Output::Count => columns.extend(["covered", "total"]),
            Output::Percent => columns.push("percent"),
            Output::Both => columns.extend(["covered", "total", "percent"]),
        }
        columns
    }
}

/// Percentage of `covered` in `total`, one decimal
fn percent_expr(covered: &str, total: &str) -> String {
    format!("ROUND(100.0 * {} / {}, 1)", covered, total)
}

/// Sort key placing the national-total row after every group
fn national_last() -> String {
    format!(
        "CASE WHEN gruppe = '{}' THEN 1 ELSE 0 END ASC",
        NATIONAL_LABEL
    )
}

/// Final projection over a `result` CTE with columns
/// `gruppe, [aar,] covered, total, percent`. County groupings get the
/// national-total row appended.
fn finish_result(mut with: WithQuery, ctx: &Context<'_>) -> Result<String, CodeGenError> {
    let columns = ctx.output_columns();
    let order = ctx.order_keys();

    if !ctx.is_county() {
        return with.finish(
            Select::new("result")
                .columns(columns)
                .order_by_all(order)
                .limit(ctx.query.top),
        );
    }

    // TOP limits the groups; the national row still covers all of them
    let groups = match ctx.query.top {
        Some(top) => {
            with.cte(
                "top_groups",
                Select::new("result")
                    .order_by_all(order.clone())
                    .limit(Some(top)),
            );
            "top_groups"
        }
        None => "result",
    };

    let mut national = Select::new("result").column(format!("'{}' AS gruppe", NATIONAL_LABEL));
    if ctx.is_multi_year() {
        national = national.column("aar").group_by("aar");
    }
    national = national
        .column("SUM(covered) AS covered")
        .column("SUM(total) AS total")
        .column(format!(
            "{} AS percent",
            percent_expr("SUM(covered)", "SUM(total)")
        ));

    with.cte("national", national);
    with.cte(
        "combined",
        union_all([
            format!("SELECT * FROM {}", groups),
            "SELECT * FROM national".to_string(),
        ]),
    );

    with.finish(
        Select::new("combined")
            .columns(columns)
            .order_by(national_last())
            .order_by_all(order),
    )
}
