/// Semantic validation and year resolution
///
/// Runs the cross-clause checks the grammar cannot express and turns the
/// FOR clause (or the caller's fallback year) into a concrete year list.
/// Requests touching any year before the historical cutoff are validated
/// against what the historical dataset can answer.
use crate::ast::*;
use crate::error::CodeGenError;
use crate::mappings::{
    is_historical_year, modern_years, HISTORICAL_CUTOFF, HISTORICAL_DOWNLOAD_THRESHOLDS,
    HISTORICAL_TECHS, HISTORICAL_UPLOAD_THRESHOLDS, KNOWN_YEARS,
};
use tracing::debug;

/// A validated query plus the years it covers
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery<'a> {
    pub query: &'a SpanQuery,
    /// Distinct years in ascending order, never empty
    pub years: Vec<i32>,
    /// Any year predates the cutoff; the whole request uses historical data
    pub historical: bool,
}

impl ResolvedQuery<'_> {
    pub fn is_multi_year(&self) -> bool {
        self.years.len() > 1
    }
}

/// Validate `query` and resolve its years against `fallback_year`
pub fn resolve(
    query: &SpanQuery,
    fallback_year: Option<i32>,
) -> Result<ResolvedQuery<'_>, CodeGenError> {
    validate_filters(query)?;

    let years = resolve_years(query.for_clause.as_ref(), fallback_year)?;
    if years.is_empty() {
        return Err(CodeGenError::new(
            "No year specified. Use FOR clause or provide year in options.",
        ));
    }

    let historical = years.iter().any(|y| is_historical_year(*y));
    if historical {
        validate_historical(query)?;
    }

    debug!(?years, historical, "resolved query years");
    Ok(ResolvedQuery {
        query,
        years,
        historical,
    })
}

/// Ownership flags (private/business) only apply to subscription counts
pub fn validate_filters(query: &SpanQuery) -> Result<(), CodeGenError> {
    if query.count.is_subscriptions() {
        return Ok(());
    }

    let ownership = query
        .filters
        .iter()
        .find_map(|filter| match filter {
            InFilter::Population(flag) if flag.is_ownership() => Some(*flag),
            _ => None,
        });

    match ownership {
        Some(flag) => Err(CodeGenError::new(format!(
            "IN {} requires COUNT ab: the 'private' and 'business' filters only apply to subscriptions, not {}",
            flag, query.count
        ))),
        None => Ok(()),
    }
}

/// Resolve the FOR clause into years. Empty when neither a FOR clause nor a
/// fallback year is available.
pub fn resolve_years(
    for_clause: Option<&ForClause>,
    fallback_year: Option<i32>,
) -> Result<Vec<i32>, CodeGenError> {
    match for_clause {
        Some(ForClause::List(years)) => {
            let mut years = years.clone();
            years.sort_unstable();
            years.dedup();
            Ok(years)
        }
        Some(ForClause::Comparison { op, year }) => {
            let candidates: Vec<i32> =
                if *op == ComparisonOperator::Eq && !is_historical_year(*year) {
                    modern_years().collect()
                } else {
                    KNOWN_YEARS.to_vec()
                };

            let years: Vec<i32> = candidates
                .into_iter()
                .filter(|candidate| op.matches(*candidate, *year))
                .collect();

            if years.is_empty() {
                return Err(CodeGenError::new(format!(
                    "No data available for FOR aar {} {} (known years: {}-{})",
                    op,
                    year,
                    KNOWN_YEARS[0],
                    KNOWN_YEARS[KNOWN_YEARS.len() - 1]
                )));
            }
            Ok(years)
        }
        None => Ok(fallback_year.into_iter().collect()),
    }
}

fn historical_error(message: impl std::fmt::Display) -> CodeGenError {
    CodeGenError::new(format!(
        "Historical data (before {}) {}",
        HISTORICAL_CUTOFF, message
    ))
}

/// Check that the historical dataset can answer `query`
pub fn validate_historical(query: &SpanQuery) -> Result<(), CodeGenError> {
    if !matches!(query.by, Grouping::National | Grouping::Urban) {
        return Err(historical_error(format!(
            "only supports BY total or BY tett, not BY {}",
            query.by
        )));
    }

    if query.count.is_subscriptions() {
        return Err(historical_error("does not include subscriptions (COUNT ab)"));
    }

    for filter in &query.filters {
        match filter {
            InFilter::Population(flag) if flag.is_ownership() => {
                return Err(historical_error(
                    "does not support the 'private' and 'business' filters",
                ));
            }
            InFilter::Population(_) => {}
            InFilter::Field { field, .. } if field.is_geographic() => {
                return Err(historical_error(format!(
                    "does not support geographic filters (IN {})",
                    field
                )));
            }
            InFilter::Field {
                field: Field::Provider,
                ..
            } => {
                return Err(historical_error("does not support provider filters (IN tilb)"));
            }
            InFilter::Field { field, .. } => {
                return Err(historical_error(format!(
                    "does not support IN filters on {}",
                    field
                )));
            }
        }
    }

    if query.show == Output::Count {
        return Err(historical_error(
            "only provides percentages, SHOW count is not supported",
        ));
    }

    if query.sort.field == SortField::Count {
        return Err(historical_error(
            "only provides percentages, SORT count is not supported",
        ));
    }

    match &query.has {
        Some(HasClause::Quantified { expressions, .. }) => {
            expressions.iter().try_for_each(validate_historical_expr)
        }
        Some(HasClause::Expression(expr)) => validate_historical_expr(expr),
        None => Err(historical_error("requires a HAS clause")),
    }
}

/// Check every leaf predicate against the historical indicator sets
fn validate_historical_expr(expr: &Expr) -> Result<(), CodeGenError> {
    match expr {
        Expr::Flag { flag, .. } => validate_historical_tech(*flag),
        Expr::Comparison {
            field: Field::Tech,
            op,
            value,
            ..
        } => {
            if *op != ComparisonOperator::Eq {
                return Err(historical_error(format!(
                    "only supports tek = <technology>, not tek {}",
                    op
                )));
            }
            match value {
                Value::String(name) => match TechFlag::from_column_value(name) {
                    Some(flag) => validate_historical_tech(flag),
                    None => Err(unsupported_tech(name)),
                },
                Value::Number(n) => Err(unsupported_tech(&n.to_string())),
            }
        }
        Expr::Comparison {
            field, op, value, ..
        } if field.is_speed() => {
            if *op != ComparisonOperator::Gte {
                return Err(historical_error(format!(
                    "only supports speed thresholds with >=, not {} {} {}",
                    field, op, value
                )));
            }
            let Value::Number(mbps) = value else {
                return Err(historical_error(format!(
                    "requires a numeric speed threshold, got {} {}",
                    field, value
                )));
            };
            let (supported, direction): (&[i64], &str) = match field {
                Field::Upload => (&HISTORICAL_UPLOAD_THRESHOLDS[..], "upload"),
                _ => (&HISTORICAL_DOWNLOAD_THRESHOLDS[..], "download"),
            };
            if supported.contains(mbps) {
                Ok(())
            } else {
                Err(CodeGenError::new(format!(
                    "Speed threshold {} Mbit/s is not supported for historical data (before {}). Supported {} thresholds: {}",
                    mbps,
                    HISTORICAL_CUTOFF,
                    direction,
                    join_numbers(supported)
                )))
            }
        }
        Expr::Comparison { field, .. } => Err(historical_error(format!(
            "does not support HAS conditions on {}",
            field
        ))),
        Expr::BinaryOp { left, right, .. } => {
            validate_historical_expr(left)?;
            validate_historical_expr(right)
        }
        Expr::Not(inner) => validate_historical_expr(inner),
    }
}

fn validate_historical_tech(flag: TechFlag) -> Result<(), CodeGenError> {
    if HISTORICAL_TECHS.contains(&flag) {
        Ok(())
    } else {
        Err(unsupported_tech(flag.column_value()))
    }
}

fn unsupported_tech(name: &str) -> CodeGenError {
    let supported: Vec<&str> = HISTORICAL_TECHS.iter().map(|t| t.column_value()).collect();
    CodeGenError::new(format!(
        "Technology '{}' is not available in historical data (before {}). Supported: {}",
        name,
        HISTORICAL_CUTOFF,
        supported.join(", ")
    ))
}

fn join_numbers(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
