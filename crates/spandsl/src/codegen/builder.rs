/// Small SQL text builder
///
/// Statements are assembled from ordered clause fragments so that optional
/// pieces (filters, year columns, the national-total union) compose without
/// string surgery.
use crate::error::CodeGenError;
use std::fmt::{self, Write};

/// One `SELECT` statement
#[derive(Debug, Clone, Default)]
pub struct Select {
    columns: Vec<String>,
    from: String,
    joins: Vec<String>,
    filters: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl Select {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Full join clause, e.g. `LEFT JOIN coverage c ON ...`
    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.joins.push(join.into());
        self
    }

    /// Predicates are AND-ed together
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filters.push(predicate.into());
        self
    }

    pub fn filters<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(predicates.into_iter().map(Into::into));
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn order_by(mut self, key: impl Into<String>) -> Self {
        self.order_by.push(key.into());
        self
    }

    pub fn order_by_all<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            write!(f, "SELECT *")?;
        } else {
            write!(f, "SELECT {}", self.columns.join(", "))?;
        }
        write!(f, "\nFROM {}", self.from)?;
        for join in &self.joins {
            write!(f, "\n{}", join)?;
        }
        if !self.filters.is_empty() {
            write!(f, "\nWHERE {}", self.filters.join(" AND "))?;
        }
        if !self.group_by.is_empty() {
            write!(f, "\nGROUP BY {}", self.group_by.join(", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, "\nORDER BY {}", self.order_by.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, "\nLIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// Join statements with `UNION ALL`
pub fn union_all<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: fmt::Display,
{
    parts
        .into_iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join("\nUNION ALL\n")
}

/// A statement with leading common table expressions
#[derive(Debug, Clone, Default)]
pub struct WithQuery {
    ctes: Vec<(String, String)>,
}

impl WithQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a CTE; later CTEs may refer to earlier ones
    pub fn cte(&mut self, name: &str, body: impl fmt::Display) -> &mut Self {
        self.ctes.push((name.to_string(), body.to_string()));
        self
    }

    /// Render the CTEs followed by the final statement
    pub fn finish(&self, main: impl fmt::Display) -> Result<String, CodeGenError> {
        let mut sql = String::new();

        for (i, (name, body)) in self.ctes.iter().enumerate() {
            if i == 0 {
                write!(&mut sql, "WITH ")?;
            }
            writeln!(&mut sql, "{} AS (", name)?;
            for line in body.lines() {
                writeln!(&mut sql, "  {}", line)?;
            }
            if i + 1 < self.ctes.len() {
                writeln!(&mut sql, "),")?;
            } else {
                writeln!(&mut sql, ")")?;
            }
        }

        write!(&mut sql, "{}", main)?;
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_rendering() {
        let select = Select::new("adr")
            .column("fylke AS gruppe")
            .column("SUM(hus) AS total")
            .filter("aar = 2024")
            .filter("ertett = true")
            .group_by("fylke")
            .order_by("gruppe ASC")
            .limit(Some(3));

        assert_eq!(
            select.to_string(),
            "SELECT fylke AS gruppe, SUM(hus) AS total\nFROM adr\nWHERE aar = 2024 AND ertett = true\nGROUP BY fylke\nORDER BY gruppe ASC\nLIMIT 3"
        );
    }

    #[test]
    fn test_select_without_optional_clauses() {
        assert_eq!(Select::new("result").to_string(), "SELECT *\nFROM result");
    }

    #[test]
    fn test_union_all() {
        assert_eq!(union_all(["SELECT 1", "SELECT 2"]), "SELECT 1\nUNION ALL\nSELECT 2");
        assert_eq!(union_all(["SELECT 1"]), "SELECT 1");
    }

    #[test]
    fn test_with_query() {
        let mut with = WithQuery::new();
        with.cte("a", "SELECT 1\nFROM x").cte("b", Select::new("a"));
        let sql = with.finish("SELECT * FROM b").unwrap();

        assert_eq!(
            sql,
            "WITH a AS (\n  SELECT 1\n  FROM x\n),\nb AS (\n  SELECT *\n  FROM a\n)\nSELECT * FROM b"
        );
    }

    #[test]
    fn test_with_query_without_ctes() {
        let sql = WithQuery::new().finish("SELECT 1").unwrap();
        assert_eq!(sql, "SELECT 1");
    }
}
