/// Parser for the Span DSL
///
/// Converts a stream of tokens into an Abstract Syntax Tree (AST).
///
/// query := HAS has-clause [IN in-clause] COUNT metric [BY grouping]
///          [SHOW output] [SORT sort-spec] [TOP integer] [FOR for-spec] EOF
use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::mappings::YEAR_COLUMN_NAMES;
use std::str::FromStr;

/// Parser for the Span DSL
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser over a token sequence
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (offset, line, column) = tokens
                .last()
                .map(|t| (t.offset + t.text.len(), t.line, t.column + t.text.chars().count()))
                .unwrap_or((0, 1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                offset,
                line,
                column,
            });
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the Span query
    pub fn parse(&mut self) -> Result<SpanQuery, ParseError> {
        let has = self.parse_has_clause()?;
        let filters = self.parse_in_clause()?;
        let count = self.parse_count_clause()?;
        let by = self.parse_by_clause()?;
        let show = self.parse_show_clause()?;
        let sort = self.parse_sort_clause()?;
        let top = self.parse_top_clause()?;
        let for_clause = self.parse_for_clause()?;

        // Ensure we're at EOF
        if self.current_token().kind != TokenKind::Eof {
            return Err(self.error(format!(
                "Expected end of input, got {}",
                self.current_token()
            )));
        }

        Ok(SpanQuery {
            has: Some(has),
            filters,
            count,
            by,
            show,
            sort,
            top,
            for_clause,
        })
    }

    /// Parse HAS clause: `ANY|ALL|NONE ( expr, ... )` or a single expression
    fn parse_has_clause(&mut self) -> Result<HasClause, ParseError> {
        self.expect_keyword("HAS")?;

        let quantifier = match self.current_token() {
            t if t.is_keyword("ANY") => Some(Quantifier::Any),
            t if t.is_keyword("ALL") => Some(Quantifier::All),
            t if t.is_keyword("NONE") => Some(Quantifier::None),
            _ => None,
        };

        let Some(quantifier) = quantifier else {
            return Ok(HasClause::Expression(self.parse_expr()?));
        };
        self.advance(); // consume quantifier

        self.expect_kind(TokenKind::LParen)?;
        let mut expressions = vec![self.parse_expr()?];
        while self.match_kind(TokenKind::Comma) {
            expressions.push(self.parse_expr()?);
        }
        self.expect_kind(TokenKind::RParen)?;

        Ok(HasClause::Quantified {
            quantifier,
            expressions,
        })
    }

    /// Parse an expression (handles binary operations with precedence)
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expr()
    }

    /// Parse OR expression (lowest precedence)
    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.current_token().is_keyword("OR") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::binary(left, BinaryOperator::Or, right);
        }

        Ok(left)
    }

    /// Parse AND expression (higher precedence than OR)
    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;

        while self.current_token().is_keyword("AND") {
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::binary(left, BinaryOperator::And, right);
        }

        Ok(left)
    }

    /// Parse unary expression (NOT)
    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.current_token().is_keyword("NOT") {
            self.advance();
            let expr = self.parse_unary_expr()?;
            Ok(Expr::not(expr))
        } else {
            self.parse_primary_expr()
        }
    }

    /// Parse parenthesized expression, technology flag, or comparison
    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(TokenKind::LParen) {
            let expr = self.parse_expr()?;
            self.expect_kind(TokenKind::RParen)?;
            return Ok(expr);
        }

        if let Some(flag) = self.identifier_as(TechFlag::from_name) {
            self.advance();
            return Ok(Expr::flag(flag));
        }

        if let Some(field) = self.identifier_as(Field::from_name) {
            self.advance();
            let op = self.parse_comparison_op()?;
            let value = self.parse_value()?;
            return Ok(Expr::comparison(field, op, value));
        }

        Err(self.error(format!(
            "Unexpected token in expression: {}",
            self.current_token()
        )))
    }

    /// Parse comparison operator
    fn parse_comparison_op(&mut self) -> Result<ComparisonOperator, ParseError> {
        let token = self.current_token();
        let op = match token.kind {
            TokenKind::Operator => ComparisonOperator::from_symbol(&token.text),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                Ok(op)
            }
            None => Err(self.error(format!(
                "Expected comparison operator, got {}",
                self.current_token()
            ))),
        }
    }

    /// Parse value (number, string, or technology name)
    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let token = self.current_token();
        let value = match token.kind {
            TokenKind::Number => Value::Number(self.number_value::<i64>()?),
            TokenKind::String => Value::String(token.text.clone()),
            TokenKind::Identifier => match TechFlag::from_name(&token.text) {
                Some(flag) => Value::String(flag.column_value().to_string()),
                None => {
                    return Err(self.error(format!(
                        "Expected number or string value, got {}",
                        token
                    )))
                }
            },
            _ => {
                return Err(self.error(format!(
                    "Expected number or string value, got {}",
                    token
                )))
            }
        };
        self.advance();
        Ok(value)
    }

    /// Parse optional IN clause: one or more filters, commas optional
    fn parse_in_clause(&mut self) -> Result<Vec<InFilter>, ParseError> {
        if !self.match_keyword("IN") {
            return Ok(Vec::new());
        }

        let mut filters = vec![self.parse_in_filter()?];

        while !matches!(
            self.current_token().kind,
            TokenKind::Keyword | TokenKind::Eof
        ) {
            self.match_kind(TokenKind::Comma);
            if self.is_in_filter_start() {
                filters.push(self.parse_in_filter()?);
            } else {
                break;
            }
        }

        Ok(filters)
    }

    fn is_in_filter_start(&self) -> bool {
        self.identifier_as(PopulationFlag::from_name).is_some()
            || self.identifier_as(Field::from_name).is_some()
    }

    /// Parse one IN filter: population flag or `field op value`
    fn parse_in_filter(&mut self) -> Result<InFilter, ParseError> {
        if let Some(flag) = self.identifier_as(PopulationFlag::from_name) {
            self.advance();
            return Ok(InFilter::Population(flag));
        }

        if let Some(field) = self.identifier_as(Field::from_name) {
            self.advance();
            let op = self.parse_comparison_op()?;
            let value = self.parse_value()?;
            return Ok(InFilter::Field { field, op, value });
        }

        Err(self.error(format!(
            "Expected population filter or field filter after IN, got {}",
            self.current_token()
        )))
    }

    /// Parse mandatory COUNT clause
    fn parse_count_clause(&mut self) -> Result<Metric, ParseError> {
        self.expect_keyword("COUNT")?;
        self.expect_vocabulary(Metric::from_name, "metric", &Metric::names())
    }

    fn parse_by_clause(&mut self) -> Result<Grouping, ParseError> {
        if !self.match_keyword("BY") {
            return Ok(Grouping::default());
        }
        self.expect_vocabulary(Grouping::from_name, "grouping", &Grouping::names())
    }

    fn parse_show_clause(&mut self) -> Result<Output, ParseError> {
        if !self.match_keyword("SHOW") {
            return Ok(Output::default());
        }

        // "count" lexes as the COUNT keyword
        if self.match_keyword("COUNT") {
            return Ok(Output::Count);
        }
        self.expect_vocabulary(Output::from_name, "output type", &Output::names())
    }

    fn parse_sort_clause(&mut self) -> Result<SortClause, ParseError> {
        if !self.match_keyword("SORT") {
            return Ok(SortClause::default());
        }

        // "count" lexes as the COUNT keyword
        let field = if self.match_keyword("COUNT") {
            SortField::Count
        } else {
            self.expect_vocabulary(SortField::from_name, "sort field", &SortField::names())?
        };

        let direction = match self.identifier_as(|name| match name {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }) {
            Some(direction) => {
                self.advance();
                direction
            }
            None => SortDirection::default(),
        };

        Ok(SortClause { field, direction })
    }

    fn parse_top_clause(&mut self) -> Result<Option<u64>, ParseError> {
        if !self.match_keyword("TOP") {
            return Ok(None);
        }
        self.expect_number::<u64>("Expected number after TOP")
            .map(Some)
    }

    /// Parse optional FOR clause: `2024`, `(2023, 2024)` or `aar >= 2020`
    fn parse_for_clause(&mut self) -> Result<Option<ForClause>, ParseError> {
        if !self.match_keyword("FOR") {
            return Ok(None);
        }

        if self.match_kind(TokenKind::LParen) {
            let mut years = vec![self.expect_number::<i32>("Expected year number after FOR (")?];
            while self.match_kind(TokenKind::Comma) {
                years.push(self.expect_number::<i32>("Expected year number after comma")?);
            }
            self.expect_kind(TokenKind::RParen)?;
            return Ok(Some(ForClause::List(years)));
        }

        if self.current_token().kind == TokenKind::Identifier {
            if !YEAR_COLUMN_NAMES.contains(&self.current_token().text.as_str()) {
                return Err(self.error(format!(
                    "Expected year column ({}) in FOR comparison, got {}",
                    YEAR_COLUMN_NAMES.join(", "),
                    self.current_token()
                )));
            }
            self.advance();
            let op = self.parse_comparison_op()?;
            let year = self.expect_number::<i32>("Expected year number in FOR comparison")?;
            return Ok(Some(ForClause::Comparison { op, year }));
        }

        let year = self.expect_number::<i32>("Expected year number after FOR")?;
        Ok(Some(ForClause::List(vec![year])))
    }

    // Helper methods

    fn current_token(&self) -> &Token {
        // new() guarantees a trailing EOF token
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn error(&self, message: String) -> ParseError {
        let token = self.current_token();
        ParseError::new(message, token.offset, token.line, token.column)
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.current_token().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.current_token().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kind(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if self.match_kind(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {}, got {}",
                expected,
                self.current_token()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected keyword '{}', got {}",
                keyword,
                self.current_token()
            )))
        }
    }

    /// Resolve the current identifier through a vocabulary lookup
    fn identifier_as<T>(&self, lookup: impl Fn(&str) -> Option<T>) -> Option<T> {
        let token = self.current_token();
        if token.kind == TokenKind::Identifier {
            lookup(&token.text)
        } else {
            None
        }
    }

    fn expect_vocabulary<T>(
        &mut self,
        lookup: impl Fn(&str) -> Option<T>,
        what: &str,
        names: &[&str],
    ) -> Result<T, ParseError> {
        match self.identifier_as(lookup) {
            Some(value) => {
                self.advance();
                Ok(value)
            }
            None => Err(self.error(format!(
                "Expected {} ({}), got {}",
                what,
                names.join(", "),
                self.current_token()
            ))),
        }
    }

    fn number_value<T: FromStr>(&self) -> Result<T, ParseError> {
        let token = self.current_token();
        token
            .text
            .parse::<T>()
            .map_err(|_| self.error(format!("Invalid number '{}'", token.text)))
    }

    fn expect_number<T: FromStr>(&mut self, message: &str) -> Result<T, ParseError> {
        if self.current_token().kind != TokenKind::Number {
            return Err(self.error(format!("{}, got {}", message, self.current_token())));
        }
        let value = self.number_value::<T>()?;
        self.advance();
        Ok(value)
    }
}

/// Parse a token sequence into a Span query
pub fn parse(tokens: Vec<Token>) -> Result<SpanQuery, ParseError> {
    Parser::new(tokens).parse()
}
