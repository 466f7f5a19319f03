/// Coverage strategy
///
/// Compares the population matching the IN filters against the part of it
/// whose addresses have qualifying coverage rows.
use super::builder::{Select, WithQuery};
use super::expr::{filter_predicates, Membership};
use super::{finish_result, percent_expr, Context};
use crate::error::CodeGenError;
use crate::mappings::{qualify, Dataset};

const MEMBERSHIP: Membership<'static> = Membership {
    key: "a.adrid",
    source: "dekning d",
    source_key: "d.adrid",
    correlation: Some("d.aar = a.aar"),
};

pub(super) fn generate(ctx: &Context<'_>) -> Result<String, CodeGenError> {
    let mut with = WithQuery::new();
    write_result(&mut with, ctx)?;
    finish_result(with, ctx)
}

/// Add the source, `population`, `coverage` and `result` CTEs. `result` has
/// the columns `gruppe, [aar,] covered, total, percent`.
pub(super) fn write_result(with: &mut WithQuery, ctx: &Context<'_>) -> Result<(), CodeGenError> {
    let query = ctx.query;
    let multi_year = ctx.is_multi_year();
    let metric = query.count.column();

    with.cte("adr", ctx.source(&[Dataset::Addresses]));

    let group = query.by.expr(None);
    let mut population = Select::new("adr").column(format!("{} AS gruppe", group));
    if multi_year {
        population = population.column("aar");
    }
    population = population
        .column(format!("SUM({}) AS total", metric))
        .filter(ctx.year_filter(None))
        .filters(filter_predicates(&query.filters, None)?)
        .group_by(group);
    if multi_year {
        population = population.group_by("aar");
    }

    let Some(has) = &query.has else {
        // Without HAS everything counted is covered
        with.cte("population", population);
        with.cte("result", result_select(ctx, "p.total", false));
        return Ok(());
    };

    with.cte("dekning", ctx.source(&[Dataset::FixedCoverage, Dataset::MobileCoverage]));
    with.cte("population", population);

    let group = query.by.expr(Some("a"));
    let metric = match metric {
        "1" => "1".to_string(),
        column => qualify(Some("a"), column),
    };
    let mut coverage = Select::new("adr a").column(format!("{} AS gruppe", group));
    if multi_year {
        coverage = coverage.column("a.aar");
    }
    coverage = coverage
        .column(format!("SUM({}) AS covered", metric))
        .filter(ctx.year_filter(Some("a")))
        .filter(MEMBERSHIP.predicate(has)?)
        .filters(filter_predicates(&query.filters, Some("a"))?)
        .group_by(group);
    if multi_year {
        coverage = coverage.group_by("a.aar");
    }
    with.cte("coverage", coverage);

    with.cte("result", result_select(ctx, "COALESCE(c.covered, 0)", true));
    Ok(())
}

fn result_select(ctx: &Context<'_>, covered: &str, join_coverage: bool) -> Select {
    let mut result = Select::new("population p").column("p.gruppe");
    if ctx.is_multi_year() {
        result = result.column("p.aar");
    }
    result = result
        .column(format!("{} AS covered", covered))
        .column("p.total")
        .column(format!("{} AS percent", percent_expr(covered, "p.total")));

    if join_coverage {
        let mut join = "LEFT JOIN coverage c ON p.gruppe = c.gruppe".to_string();
        if ctx.is_multi_year() {
            join.push_str(" AND p.aar = c.aar");
        }
        result = result.join(join);
    }
    result
}
