/// Pivot strategy: one output column per requested year
use super::builder::{union_all, Select, WithQuery};
use super::{coverage, national_last, percent_expr, Context};
use crate::ast::Output;
use crate::error::CodeGenError;
use crate::mappings::NATIONAL_LABEL;

pub(super) fn generate(ctx: &Context<'_>) -> Result<String, CodeGenError> {
    let mut with = WithQuery::new();
    coverage::write_result(&mut with, ctx)?;

    let columns = year_columns(ctx);
    let group_order = format!("gruppe {}", ctx.query.sort.direction);

    let pivoted = Select::new("result")
        .column("gruppe")
        .columns(columns.iter().cloned())
        .group_by("gruppe");

    if !ctx.is_county() {
        return with.finish(pivoted.order_by(group_order).limit(ctx.query.top));
    }

    // County pivots also get a national row, kept last
    let pivoted = match ctx.query.top {
        Some(top) => pivoted.order_by(group_order.clone()).limit(Some(top)),
        None => pivoted,
    };
    let national = Select::new("result")
        .column(format!("'{}' AS gruppe", NATIONAL_LABEL))
        .columns(columns);

    with.cte("pivoted", pivoted);
    with.cte("national", national);
    with.cte(
        "combined",
        union_all(["SELECT * FROM pivoted", "SELECT * FROM national"]),
    );

    with.finish(
        Select::new("combined")
            .order_by(national_last())
            .order_by(group_order),
    )
}

/// Conditional aggregates per year, in year order
fn year_columns(ctx: &Context<'_>) -> Vec<String> {
    let mut columns = Vec::new();

    for year in ctx.years {
        let covered = format!("SUM(CASE WHEN aar = {} THEN covered END)", year);
        let total = format!("SUM(CASE WHEN aar = {} THEN total END)", year);

        if matches!(ctx.query.show, Output::Count | Output::Both) {
            columns.push(format!("{} AS covered_{}", covered, year));
            columns.push(format!("{} AS total_{}", total, year));
        }
        if matches!(ctx.query.show, Output::Percent | Output::Both) {
            columns.push(format!(
                "{} AS percent_{}",
                percent_expr(&covered, &total),
                year
            ));
        }
    }

    columns
}

#[cfg(test)]
mod tests {
    use crate::codegen::{generate_sql, SqlOptions};
    use crate::parse_str;

    fn sql(input: &str) -> String {
        generate_sql(&parse_str(input).unwrap(), &SqlOptions::new()).unwrap()
    }

    #[test]
    fn test_pivot_columns() {
        let sql = sql("HAS fiber COUNT hus BY kom FOR (2023, 2024)");
        assert!(sql.contains("SUM(CASE WHEN aar = 2023 THEN covered END) AS covered_2023"));
        assert!(sql.contains("SUM(CASE WHEN aar = 2024 THEN total END) AS total_2024"));
        assert!(sql.contains(
            "ROUND(100.0 * SUM(CASE WHEN aar = 2024 THEN covered END) / SUM(CASE WHEN aar = 2024 THEN total END), 1) AS percent_2024"
        ));
        assert!(sql.ends_with("FROM result\nGROUP BY gruppe\nORDER BY gruppe ASC"));
    }

    #[test]
    fn test_pivot_year_columns_ascending_and_distinct() {
        let sql = sql("HAS fiber COUNT hus BY kom FOR (2024, 2022, 2024)");
        assert_eq!(sql.matches("AS covered_2024").count(), 1);
        let first = sql.find("AS covered_2022").unwrap();
        let second = sql.find("AS covered_2024").unwrap();
        assert!(first < second);
        assert_eq!(
            sql.matches("SELECT *, 2024 AS aar FROM 'data/2024/adr.parquet'").count(),
            1
        );
    }

    #[test]
    fn test_pivot_show_percent_only() {
        let sql = sql("HAS fiber COUNT hus BY kom SHOW andel FOR (2022, 2023)");
        assert!(sql.contains("AS percent_2022"));
        assert!(!sql.contains("AS covered_2022"));
        assert!(!sql.contains("AS total_2023"));
    }

    #[test]
    fn test_pivot_sorts_by_group_only() {
        let sql = sql("HAS fiber COUNT hus BY postnr SORT andel DESC TOP 3 FOR (2023, 2024)");
        assert!(sql.ends_with("ORDER BY gruppe DESC\nLIMIT 3"));
        assert!(!sql.contains("ORDER BY percent"));
    }

    #[test]
    fn test_pivot_county_national_row() {
        let sql = sql("HAS fiber COUNT hus BY fylke FOR (2023, 2024)");
        assert!(sql.contains("SELECT 'Norge' AS gruppe, SUM(CASE WHEN aar = 2023"));
        assert!(sql.contains("SELECT * FROM pivoted\n  UNION ALL\n  SELECT * FROM national"));
        assert!(sql.ends_with(
            "FROM combined\nORDER BY CASE WHEN gruppe = 'Norge' THEN 1 ELSE 0 END ASC, gruppe ASC"
        ));
    }
}
