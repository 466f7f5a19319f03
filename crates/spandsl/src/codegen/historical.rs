/// Historical strategy
///
/// Years before the cutoff only exist as pre-aggregated coverage fractions
/// per geography (`Norge`, `Tettsted`, `Spredt`) and indicator. Indicators
/// are either a technology (`tek`, `fiber`) or a speed class (`hast`,
/// `ned>=100` or `ned>=100,opp>=10`).
use super::builder::{Select, WithQuery};
use super::Context;
use crate::ast::*;
use crate::error::CodeGenError;
use crate::mappings::{Dataset, NATIONAL_LABEL};

const URBAN_LABEL: &str = "Tettsted";
const RURAL_LABEL: &str = "Spredt";

/// One `(indikatortype, indikator)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
struct Indicator {
    kind: &'static str,
    value: String,
}

impl Indicator {
    fn tech(value: &str) -> Self {
        Self {
            kind: "tek",
            value: value.to_string(),
        }
    }

    fn speed(download: i64, upload: Option<i64>) -> Self {
        let value = match upload {
            Some(upload) => format!("ned>={},opp>={}", download, upload),
            None => format!("ned>={}", download),
        };
        Self { kind: "hast", value }
    }

    fn predicate(&self) -> String {
        format!(
            "(indikatortype = '{}' AND indikator = '{}')",
            self.kind, self.value
        )
    }
}

fn unsupported(message: &str) -> CodeGenError {
    CodeGenError::new(format!("{} is not supported for historical data", message))
}

pub(super) fn generate(ctx: &Context<'_>) -> Result<String, CodeGenError> {
    let query = ctx.query;
    let has = query
        .has
        .as_ref()
        .ok_or_else(|| CodeGenError::new("Historical queries require a HAS clause"))?;
    let indicators = indicators(has)?;
    let multi_indicator = indicators.len() > 1;

    let mut with = WithQuery::new();
    with.cte("hist", ctx.source(&[Dataset::Historical]));

    let mut select = Select::new("hist").column("geo AS gruppe");
    if ctx.is_multi_year() {
        select = select.column("aar");
    }
    if multi_indicator {
        select = select.column("indikator");
    }
    select = select
        .column("ROUND(100.0 * AVG(dekning), 1) AS percent")
        .filter(ctx.year_filter(None))
        .filter(geography_filter(query))
        .filter(match indicators.as_slice() {
            [single] => single.predicate(),
            many => format!(
                "({})",
                many.iter()
                    .map(Indicator::predicate)
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ),
        })
        .group_by("geo");

    let sort_column = match query.sort.field {
        SortField::Percent => "percent",
        _ => "gruppe",
    };
    select = select.order_by(format!("{} {}", sort_column, query.sort.direction));

    if ctx.is_multi_year() {
        select = select.group_by("aar").order_by("aar ASC");
    }
    if multi_indicator {
        select = select.group_by("indikator").order_by("indikator ASC");
    }

    with.finish(select.limit(query.top))
}

/// Geographies selected by BY and the urban/rural IN flags
fn geography_filter(query: &SpanQuery) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for filter in &query.filters {
        let label = match filter {
            InFilter::Population(PopulationFlag::Urban) => URBAN_LABEL,
            InFilter::Population(PopulationFlag::Rural) => RURAL_LABEL,
            _ => continue,
        };
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    if labels.is_empty() {
        labels = match query.by {
            Grouping::Urban => vec![URBAN_LABEL, RURAL_LABEL],
            _ => vec![NATIONAL_LABEL],
        };
    }

    match labels.as_slice() {
        [single] => format!("geo = '{}'", single),
        many => format!(
            "geo IN ({})",
            many.iter()
                .map(|label| format!("'{}'", label))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Map the HAS clause onto indicators. OR and ANY yield several.
fn indicators(has: &HasClause) -> Result<Vec<Indicator>, CodeGenError> {
    let mut indicators = Vec::new();

    match has {
        HasClause::Quantified { expressions, .. } if expressions.is_empty() => {
            return Err(CodeGenError::new(
                "HAS clause must have either quantified expressions or an expression",
            ));
        }
        HasClause::Quantified {
            quantifier: Quantifier::Any,
            expressions,
        } => {
            for expr in expressions {
                collect_alternatives(expr, &mut indicators)?;
            }
        }
        HasClause::Quantified {
            quantifier: Quantifier::All,
            expressions,
        } => match expressions.as_slice() {
            [single] => collect_alternatives(single, &mut indicators)?,
            _ => return Err(unsupported("ALL with several conditions")),
        },
        HasClause::Quantified {
            quantifier: Quantifier::None,
            ..
        } => return Err(unsupported("NONE")),
        HasClause::Expression(expr) => collect_alternatives(expr, &mut indicators)?,
    }

    Ok(indicators)
}

fn collect_alternatives(expr: &Expr, out: &mut Vec<Indicator>) -> Result<(), CodeGenError> {
    if let Expr::BinaryOp {
        left,
        op: BinaryOperator::Or,
        right,
    } = expr
    {
        collect_alternatives(left, out)?;
        return collect_alternatives(right, out);
    }

    let indicator = leaf_indicator(expr)?;
    if !out.contains(&indicator) {
        out.push(indicator);
    }
    Ok(())
}

fn leaf_indicator(expr: &Expr) -> Result<Indicator, CodeGenError> {
    match expr {
        Expr::Flag {
            flag,
            negated: false,
        } => Ok(Indicator::tech(flag.column_value())),
        Expr::Comparison {
            field: Field::Tech,
            value: Value::String(tech),
            negated: false,
            ..
        } => Ok(Indicator::tech(tech)),
        Expr::Comparison {
            field: Field::Speed,
            value: Value::Number(download),
            negated: false,
            ..
        } => Ok(Indicator::speed(*download, None)),
        Expr::Comparison {
            field: Field::Upload,
            negated: false,
            ..
        } => Err(CodeGenError::new(
            "An upload threshold must be combined with a download threshold (nedhast >= X AND opphast >= Y) for historical data",
        )),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => match (speed_threshold(left), speed_threshold(right)) {
            (Some((Field::Speed, download)), Some((Field::Upload, upload)))
            | (Some((Field::Upload, upload)), Some((Field::Speed, download))) => {
                Ok(Indicator::speed(download, Some(upload)))
            }
            _ => Err(unsupported(
                "AND other than a download threshold combined with an upload threshold",
            )),
        },
        Expr::Flag { negated: true, .. }
        | Expr::Comparison { negated: true, .. }
        | Expr::Not(_) => Err(unsupported("NOT")),
        _ => Err(unsupported("This HAS condition")),
    }
}

fn speed_threshold(expr: &Expr) -> Option<(Field, i64)> {
    match expr {
        Expr::Comparison {
            field,
            op: ComparisonOperator::Gte,
            value: Value::Number(mbps),
            negated: false,
        } if field.is_speed() => Some((*field, *mbps)),
        _ => None,
    }
}
