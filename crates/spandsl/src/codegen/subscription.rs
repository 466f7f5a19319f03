/// Subscription strategy
///
/// Counts subscription rows directly. `covered` counts rows matching HAS,
/// `total` all rows matching IN (ownership flags included).
///
/// Subscription rows may carry county names from before the county reform.
/// BY fylke therefore prefers the county of the subscriber's address, then
/// the current county most addresses of the municipality map to, then the
/// county recorded on the subscription.
use super::builder::{Select, WithQuery};
use super::expr::{filter_predicates, has_predicate};
use super::{finish_result, percent_expr, Context};
use crate::error::CodeGenError;
use crate::mappings::Dataset;

const COUNTY_EXPR: &str = "COALESCE(af.fylke, fm.fylke, s.fylke)";

pub(super) fn generate(ctx: &Context<'_>) -> Result<String, CodeGenError> {
    let query = ctx.query;
    let multi_year = ctx.is_multi_year();
    let mut with = WithQuery::new();

    with.cte("ab", ctx.source(&[Dataset::Subscriptions]));

    let group = if ctx.is_county() {
        with.cte("adr", ctx.source(&[Dataset::Addresses]));
        with.cte("fylke_map", county_map());
        COUNTY_EXPR.to_string()
    } else {
        query.by.expr(Some("s"))
    };

    let covered = match &query.has {
        Some(has) => format!(
            "SUM(CASE WHEN {} THEN 1 ELSE 0 END)",
            has_predicate(has, Some("s"))?
        ),
        None => "COUNT(*)".to_string(),
    };

    let mut result = Select::new("ab s").column(format!("{} AS gruppe", group));
    if multi_year {
        result = result.column("s.aar");
    }
    result = result
        .column(format!("{} AS covered", covered))
        .column("COUNT(*) AS total")
        .column(format!("{} AS percent", percent_expr(&covered, "COUNT(*)")));

    if ctx.is_county() {
        result = result
            .join("LEFT JOIN adr af ON af.adrid = s.adrid AND af.aar = s.aar")
            .join(concat!(
                "LEFT JOIN fylke_map fm ON fm.komnr = s.komnr",
                " AND fm.old_fylke = s.fylke AND fm.aar = s.aar"
            ));
    }

    result = result
        .filter(ctx.year_filter(Some("s")))
        .filters(filter_predicates(&query.filters, Some("s"))?)
        .group_by(group);
    if multi_year {
        result = result.group_by("s.aar");
    }

    with.cte("result", result);
    finish_result(with, ctx)
}

/// Per municipality and recorded county, the current county with the most
/// address rows (ties broken by name)
fn county_map() -> Select {
    let ranked = Select::new("(SELECT DISTINCT komnr, fylke AS old_fylke, aar FROM ab) k")
        .columns([
            "k.komnr",
            "k.old_fylke",
            "a.fylke",
            "k.aar",
            "ROW_NUMBER() OVER (PARTITION BY k.komnr, k.old_fylke, k.aar ORDER BY COUNT(*) DESC, a.fylke ASC) AS rank_no",
        ])
        .join("JOIN adr a ON a.komnr = k.komnr AND a.aar = k.aar")
        .group_by("k.komnr")
        .group_by("k.old_fylke")
        .group_by("a.fylke")
        .group_by("k.aar");

    let nested = ranked
        .to_string()
        .lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n");

    Select::new(format!("(\n{}\n) ranked", nested))
        .columns(["komnr", "old_fylke", "fylke", "aar"])
        .filter("rank_no = 1")
}
