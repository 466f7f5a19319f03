/// Expression-to-SQL translation shared by all strategies
///
/// Quantifiers translate differently per context. In a row-level predicate
/// context ALL is a conjunction. In an address-membership context coverage
/// facts are one row per address and technology, so ALL has to intersect
/// one membership subquery per branch.
use crate::ast::*;
use crate::error::CodeGenError;
use crate::mappings::{convert_speed, qualify, TECH_COLUMN};
use std::fmt::Write;

/// Translate an expression into a SQL predicate
pub fn expr_to_sql(expr: &Expr, qualifier: Option<&str>) -> Result<String, CodeGenError> {
    let mut sql = String::new();
    write_expr(&mut sql, expr, qualifier)?;
    Ok(sql)
}

pub fn write_expr(
    sql: &mut String,
    expr: &Expr,
    qualifier: Option<&str>,
) -> Result<(), CodeGenError> {
    match expr {
        Expr::Flag { flag, negated } => {
            let predicate = format!(
                "{} = '{}'",
                qualify(qualifier, TECH_COLUMN),
                flag.column_value()
            );
            write_negatable(sql, &predicate, *negated)?;
        }
        Expr::Comparison {
            field,
            op,
            value,
            negated,
        } => {
            let predicate = field_predicate(*field, *op, value, qualifier)?;
            write_negatable(sql, &predicate, *negated)?;
        }
        Expr::BinaryOp { left, op, right } => {
            write!(sql, "(")?;
            write_expr(sql, left, qualifier)?;
            write!(sql, " {} ", op)?;
            write_expr(sql, right, qualifier)?;
            write!(sql, ")")?;
        }
        Expr::Not(inner) => {
            write!(sql, "NOT (")?;
            write_expr(sql, inner, qualifier)?;
            write!(sql, ")")?;
        }
    }
    Ok(())
}

fn write_negatable(sql: &mut String, predicate: &str, negated: bool) -> Result<(), CodeGenError> {
    if negated {
        write!(sql, "NOT ({})", predicate)?;
    } else {
        write!(sql, "{}", predicate)?;
    }
    Ok(())
}

/// `column op value`; strings are single-quoted, speeds converted to kbit/s
pub fn field_predicate(
    field: Field,
    op: ComparisonOperator,
    value: &Value,
    qualifier: Option<&str>,
) -> Result<String, CodeGenError> {
    Ok(format!(
        "{} {} {}",
        qualify(qualifier, field.column()),
        op,
        value_to_sql(field, value)?
    ))
}

pub fn value_to_sql(field: Field, value: &Value) -> Result<String, CodeGenError> {
    Ok(match value {
        Value::Number(n) if field.is_speed() => convert_speed(*n)?.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
    })
}

/// IN-clause filters as predicates, in source order
pub fn filter_predicates(
    filters: &[InFilter],
    qualifier: Option<&str>,
) -> Result<Vec<String>, CodeGenError> {
    filters
        .iter()
        .map(|filter| match filter {
            InFilter::Population(flag) => Ok(flag.predicate(qualifier)),
            InFilter::Field { field, op, value } => field_predicate(*field, *op, value, qualifier),
        })
        .collect()
}

fn quantified_branches<'a>(
    has: &'a HasClause,
) -> Result<(Option<Quantifier>, Vec<&'a Expr>), CodeGenError> {
    match has {
        HasClause::Quantified {
            quantifier,
            expressions,
        } => {
            if expressions.is_empty() {
                return Err(CodeGenError::new(
                    "HAS clause must have either quantified expressions or an expression",
                ));
            }
            Ok((Some(*quantifier), expressions.iter().collect()))
        }
        HasClause::Expression(expr) => Ok((None, vec![expr])),
    }
}

fn join_branches(branches: &[String], op: BinaryOperator) -> String {
    if branches.len() == 1 {
        branches[0].clone()
    } else {
        format!("({})", branches.join(&format!(" {} ", op)))
    }
}

/// Row-level predicate: ANY is OR, ALL is AND, NONE is NOT (OR)
pub fn has_predicate(has: &HasClause, qualifier: Option<&str>) -> Result<String, CodeGenError> {
    let (quantifier, exprs) = quantified_branches(has)?;
    let branches = exprs
        .into_iter()
        .map(|expr| expr_to_sql(expr, qualifier))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match quantifier {
        None | Some(Quantifier::Any) => join_branches(&branches, BinaryOperator::Or),
        Some(Quantifier::All) => join_branches(&branches, BinaryOperator::And),
        Some(Quantifier::None) => format!(
            "NOT {}",
            parenthesize(join_branches(&branches, BinaryOperator::Or))
        ),
    })
}

fn parenthesize(sql: String) -> String {
    if sql.starts_with('(') && sql.ends_with(')') {
        sql
    } else {
        format!("({})", sql)
    }
}

/// Source of coverage facts for a membership predicate
#[derive(Debug, Clone, Copy)]
pub struct Membership<'a> {
    /// Qualified identifier column of the outer row, e.g. `a.adrid`
    pub key: &'a str,
    /// Coverage table or CTE with its alias, e.g. `dekning d`
    pub source: &'a str,
    /// Identifier column of the coverage rows, e.g. `d.adrid`
    pub source_key: &'a str,
    /// Correlation between coverage and outer rows, e.g. `d.aar = a.aar`
    pub correlation: Option<&'a str>,
}

impl Membership<'_> {
    fn subquery(&self, condition: &str) -> String {
        let mut sql = format!("SELECT {} FROM {} WHERE ", self.source_key, self.source);
        if let Some(correlation) = self.correlation {
            sql.push_str(correlation);
            sql.push_str(" AND ");
        }
        sql.push_str(condition);
        sql
    }

    /// Address-membership predicate: ANY is one subquery over the OR of all
    /// branches, ALL intersects one subquery per branch, NONE is NOT IN
    pub fn predicate(&self, has: &HasClause) -> Result<String, CodeGenError> {
        let (quantifier, exprs) = quantified_branches(has)?;
        let branches = exprs
            .into_iter()
            .map(|expr| expr_to_sql(expr, None))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match quantifier {
            None | Some(Quantifier::Any) => format!(
                "{} IN ({})",
                self.key,
                self.subquery(&join_branches(&branches, BinaryOperator::Or))
            ),
            Some(Quantifier::All) => {
                let subqueries: Vec<String> =
                    branches.iter().map(|branch| self.subquery(branch)).collect();
                format!(
                    "{} IN (\n  {}\n)",
                    self.key,
                    subqueries.join("\n  INTERSECT\n  ")
                )
            }
            Some(Quantifier::None) => format!(
                "{} NOT IN ({})",
                self.key,
                self.subquery(&join_branches(&branches, BinaryOperator::Or))
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantified(quantifier: Quantifier, expressions: Vec<Expr>) -> HasClause {
        HasClause::Quantified {
            quantifier,
            expressions,
        }
    }

    const MEMBERSHIP: Membership<'static> = Membership {
        key: "a.adrid",
        source: "dekning d",
        source_key: "d.adrid",
        correlation: Some("d.aar = a.aar"),
    };

    #[test]
    fn test_flag() {
        assert_eq!(expr_to_sql(&Expr::flag(TechFlag::Fiber), None).unwrap(), "tek = 'fiber'");
        let negated = Expr::Flag {
            flag: TechFlag::Dsl,
            negated: true,
        };
        assert_eq!(expr_to_sql(&negated, Some("s")).unwrap(), "NOT (s.tek = 'dsl')");
    }

    #[test]
    fn test_speed_conversion() {
        let expr = Expr::comparison(Field::Speed, ComparisonOperator::Gte, 100);
        assert_eq!(expr_to_sql(&expr, None).unwrap(), "ned >= 100000");

        let expr = Expr::comparison(Field::Upload, ComparisonOperator::Gte, 50);
        assert_eq!(expr_to_sql(&expr, None).unwrap(), "opp >= 50000");
    }

    #[test]
    fn test_speed_out_of_range() {
        let expr = Expr::comparison(Field::Speed, ComparisonOperator::Gte, i64::MAX);
        let err = expr_to_sql(&expr, None).unwrap_err();
        assert!(err.message.contains("out of range"), "{}", err.message);

        let filters = vec![InFilter::Field {
            field: Field::Upload,
            op: ComparisonOperator::Lt,
            value: Value::Number(i64::MIN),
        }];
        assert!(filter_predicates(&filters, None).is_err());
    }

    #[test]
    fn test_string_values_are_quoted() {
        let expr = Expr::comparison(Field::Provider, ComparisonOperator::NotEq, "O'Brien Nett");
        assert_eq!(expr_to_sql(&expr, None).unwrap(), "tilb != 'O''Brien Nett'");
    }

    #[test]
    fn test_nested_expression() {
        let expr = Expr::binary(
            Expr::binary(
                Expr::flag(TechFlag::Fiber),
                BinaryOperator::Or,
                Expr::flag(TechFlag::Cable),
            ),
            BinaryOperator::And,
            Expr::not(Expr::comparison(Field::Speed, ComparisonOperator::Lt, 30)),
        );
        assert_eq!(
            expr_to_sql(&expr, None).unwrap(),
            "((tek = 'fiber' OR tek = 'cable') AND NOT (ned < 30000))"
        );
    }

    #[test]
    fn test_filter_predicates() {
        let filters = vec![
            InFilter::Population(PopulationFlag::Urban),
            InFilter::Field {
                field: Field::County,
                op: ComparisonOperator::Eq,
                value: Value::from("Oslo"),
            },
        ];
        assert_eq!(
            filter_predicates(&filters, Some("a")).unwrap(),
            vec!["a.ertett = true", "a.fylke = 'Oslo'"]
        );
    }

    #[test]
    fn test_predicate_context_quantifiers() {
        let branches = vec![Expr::flag(TechFlag::Fiber), Expr::flag(TechFlag::Cable)];

        let any = quantified(Quantifier::Any, branches.clone());
        assert_eq!(has_predicate(&any, None).unwrap(), "(tek = 'fiber' OR tek = 'cable')");

        let all = quantified(Quantifier::All, branches.clone());
        assert_eq!(has_predicate(&all, None).unwrap(), "(tek = 'fiber' AND tek = 'cable')");

        let none = quantified(Quantifier::None, branches);
        assert_eq!(
            has_predicate(&none, Some("s")).unwrap(),
            "NOT (s.tek = 'fiber' OR s.tek = 'cable')"
        );

        let single_none = quantified(Quantifier::None, vec![Expr::flag(TechFlag::Dsl)]);
        assert_eq!(has_predicate(&single_none, None).unwrap(), "NOT (tek = 'dsl')");
    }

    #[test]
    fn test_membership_any() {
        let any = quantified(
            Quantifier::Any,
            vec![Expr::flag(TechFlag::Fiber), Expr::flag(TechFlag::Cable)],
        );
        assert_eq!(
            MEMBERSHIP.predicate(&any).unwrap(),
            "a.adrid IN (SELECT d.adrid FROM dekning d WHERE d.aar = a.aar AND (tek = 'fiber' OR tek = 'cable'))"
        );
    }

    #[test]
    fn test_membership_all_intersects() {
        let all = quantified(
            Quantifier::All,
            vec![Expr::flag(TechFlag::Fiber), Expr::flag(TechFlag::FiveG)],
        );
        let sql = MEMBERSHIP.predicate(&all).unwrap();
        assert_eq!(sql.matches("SELECT d.adrid").count(), 2);
        assert!(sql.contains("tek = 'fiber'\n  INTERSECT\n  SELECT d.adrid"));
        assert!(sql.contains("tek = '5g'"));
    }

    #[test]
    fn test_membership_none() {
        let none = quantified(
            Quantifier::None,
            vec![Expr::comparison(Field::Speed, ComparisonOperator::Gte, 30)],
        );
        assert_eq!(
            MEMBERSHIP.predicate(&none).unwrap(),
            "a.adrid NOT IN (SELECT d.adrid FROM dekning d WHERE d.aar = a.aar AND ned >= 30000)"
        );
    }

    #[test]
    fn test_empty_quantifier_is_rejected() {
        let empty = quantified(Quantifier::Any, Vec::new());
        assert!(has_predicate(&empty, None).is_err());
        assert!(MEMBERSHIP.predicate(&empty).is_err());
    }
}
