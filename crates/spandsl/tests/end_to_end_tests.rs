use spandsl::ast::{Expr, HasClause, Quantifier, TechFlag};
use spandsl::{compile, parse_str, tokenize, SpanError, SqlOptions, TokenKind};

fn options() -> SqlOptions {
    SqlOptions::new().with_year(2024)
}

fn compile_ok(query: &str) -> String {
    compile(query, &options()).unwrap_or_else(|e| panic!("{}: {}", query, e))
}

fn codegen_error(query: &str) -> String {
    match compile(query, &options()) {
        Err(SpanError::CodeGen(e)) => e.message,
        other => panic!("Expected CodeGenError for {}, got {:?}", query, other),
    }
}

#[test]
fn test_scenario_a_minimal_query() {
    let sql = compile_ok("HAS fiber COUNT hus");

    assert!(sql.contains("tek = 'fiber'"));
    assert!(sql.contains("SUM(hus)"));
    assert!(sql.contains("aar = 2024"));
    assert!(sql.contains("'data/2024/adr.parquet'"));
    assert!(!sql.contains("2023"));
}

#[test]
fn test_scenario_b_county_national_total() {
    let sql = compile_ok("HAS fiber COUNT hus BY fylke");

    assert!(sql.contains("UNION ALL"));
    assert_eq!(sql.matches("'Norge' AS gruppe").count(), 1);
    assert!(sql.ends_with(
        "FROM combined\nORDER BY CASE WHEN gruppe = 'Norge' THEN 1 ELSE 0 END ASC, gruppe ASC"
    ));
}

#[test]
fn test_county_total_sorts_last_for_every_sort() {
    for sort in ["SORT andel DESC", "SORT count ASC", "SORT gruppe DESC", ""] {
        let sql = compile_ok(&format!("HAS fiber COUNT hus BY fylke {} TOP 4", sort));
        let order_by = sql.rsplit("ORDER BY ").next().unwrap();
        assert!(
            order_by.starts_with("CASE WHEN gruppe = 'Norge' THEN 1 ELSE 0 END ASC, "),
            "{}",
            sql
        );
        assert_eq!(sql.matches("SELECT * FROM national").count(), 1);
        // TOP limits the county rows only
        assert!(sql.contains("top_groups AS ("));
        assert!(!sql.ends_with("LIMIT 4"));
    }
}

#[test]
fn test_scenario_c_unsupported_historical_threshold() {
    let message = codegen_error("HAS nedhast >= 75 COUNT hus FOR 2015");
    assert!(message.contains("75"), "{}", message);
    assert!(message.contains("not supported for historical data"), "{}", message);
}

#[test]
fn test_scenario_d_ownership_filter_restriction() {
    let message = codegen_error("HAS fiber IN private COUNT hus");
    assert!(message.contains("'private'"), "{}", message);
    assert!(message.contains("'business'"), "{}", message);

    for metric in ["hus", "adr", "bygg", "fritid"] {
        assert!(matches!(
            compile(&format!("HAS fiber IN bedrift COUNT {}", metric), &options()),
            Err(SpanError::CodeGen(_))
        ));
    }

    assert!(compile("HAS fiber IN private COUNT ab", &options()).is_ok());
    assert!(compile("HAS fiber IN business COUNT subscriptions", &options()).is_ok());
}

#[test]
fn test_quantifier_translation() {
    let any = compile_ok("HAS ANY(fiber, cable) COUNT hus");
    assert!(any.contains("(tek = 'fiber' OR tek = 'cable')"));

    let all = compile_ok("HAS ALL(fiber, 5g) COUNT hus");
    assert!(all.contains("INTERSECT"));
    assert_eq!(all.matches("SELECT d.adrid FROM dekning d").count(), 2);

    let none = compile_ok("HAS NONE(speed >= 30) COUNT hus");
    assert!(none.contains("a.adrid NOT IN (SELECT d.adrid FROM dekning d"));
    assert!(none.contains("ned >= 30000"));
}

#[test]
fn test_mixed_years_route_entirely_through_historical_data() {
    let sql = compile_ok("HAS fiber COUNT hus FOR (2020, 2023, 2024)");

    assert!(sql.contains("'data/2020/dekning.parquet'"));
    assert!(sql.contains("'data/2024/dekning.parquet'"));
    assert!(!sql.contains("adr.parquet"));
    assert!(!sql.contains("fbb.parquet"));
    assert!(sql.contains("AVG(dekning)"));
}

#[test]
fn test_year_comparison_spanning_cutoff_is_historical() {
    let sql = compile_ok("HAS fiber COUNT hus FOR aar >= 2021");
    assert!(sql.contains("aar IN (2021, 2022, 2023, 2024)"));
    assert!(sql.contains("dekning.parquet"));
}

#[test]
fn test_for_clause_overrides_option_year() {
    let sql = compile_ok("HAS fiber COUNT hus FOR 2023");
    assert!(sql.contains("'data/2023/adr.parquet'"));
    assert!(!sql.contains("'data/2024/"));
}

#[test]
fn test_missing_year() {
    let err = compile("HAS fiber COUNT hus", &SqlOptions::new()).unwrap_err();
    assert_eq!(err.name(), "CodeGenError");
    assert_eq!(
        err.to_string(),
        "No year specified. Use FOR clause or provide year in options."
    );
}

#[test]
fn test_speed_overflow_is_codegen_error() {
    let message = codegen_error("HAS nedhast >= 9223372036854775807 COUNT hus");
    assert!(message.contains("out of range"), "{}", message);

    let message = codegen_error("HAS fiber IN opphast > 9223372036854775807 COUNT hus");
    assert!(message.contains("out of range"), "{}", message);

    let message = codegen_error("HAS fiber IN nedhast >= 9300000000000000 COUNT ab");
    assert!(message.contains("9300000000000000 Mbit/s"), "{}", message);
}

#[test]
fn test_duplicate_for_years_read_each_file_once() {
    let sql = compile_ok("HAS fiber COUNT hus FOR (2023, 2023)");
    assert_eq!(
        sql.matches("SELECT *, 2023 AS aar FROM 'data/2023/adr.parquet'").count(),
        1
    );
    assert!(sql.contains("aar = 2023"));
    assert!(!sql.contains("aar IN"));
}

#[test]
fn test_for_list_years_ascending() {
    let sql = compile_ok("HAS fiber COUNT hus FOR (2024, 2022)");
    assert!(sql.contains("aar IN (2022, 2024)"));
    let first = sql.find("'data/2022/adr.parquet'").unwrap();
    let second = sql.find("'data/2024/adr.parquet'").unwrap();
    assert!(first < second);
}

#[test]
fn test_custom_data_path() {
    let sql = compile(
        "HAS fiber COUNT hus",
        &SqlOptions::new().with_year(2024).with_data_path("/custom/path"),
    )
    .unwrap();
    assert!(sql.contains("'/custom/path/2024/adr.parquet'"));
    assert!(sql.contains("'/custom/path/2024/fbb.parquet'"));
}

#[test]
fn test_round_trip_determinism() {
    let query = "HAS ANY(fiber, 5g) IN tett COUNT hus BY fylke SORT andel DESC TOP 3 FOR (2023, 2024)";
    assert_eq!(compile_ok(query), compile_ok(query));
}

#[test]
fn test_whitespace_invariance() {
    let compact = "HAS fiber AND nedhast>=100 COUNT hus BY fylke FOR (2023,2024)";
    let spread = "HAS\n  fiber   AND\tnedhast >= 100\r\nCOUNT hus\n\nBY fylke FOR ( 2023 , 2024 )";

    let values = |q: &str| -> Vec<(TokenKind, String)> {
        tokenize(q)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    };
    assert_eq!(values(compact), values(spread));
    assert_eq!(compile_ok(compact), compile_ok(spread));
}

#[test]
fn test_generation_flags_lex_as_identifiers() {
    for input in ["5g", "5G", "4g", "4G"] {
        let tokens = tokenize(input).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, input.to_ascii_lowercase());
    }
}

#[test]
fn test_defaults_applied() {
    let query = parse_str("HAS ALL(fiber, 5g) COUNT hus").unwrap();
    assert_eq!(
        query.has,
        Some(HasClause::Quantified {
            quantifier: Quantifier::All,
            expressions: vec![Expr::flag(TechFlag::Fiber), Expr::flag(TechFlag::FiveG)],
        })
    );
    assert_eq!(query.top, None);
    assert_eq!(query.for_clause, None);
    assert!(query.filters.is_empty());
}

#[test]
fn test_error_positions() {
    let err = compile("HAS fiber\nCOUNT hus BY planet", &options()).unwrap_err();
    assert_eq!(err.name(), "ParseError");
    assert_eq!(err.position(), Some((23, 2, 14)));

    let err = compile("HAS fiber COUNT hus IN 'oops", &options()).unwrap_err();
    assert_eq!(err.name(), "LexerError");
    assert_eq!(err.position(), Some((23, 1, 24)));
}
