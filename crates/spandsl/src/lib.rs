/// Span DSL query language support
///
/// Compiles Span queries describing broadband coverage and subscription
/// statistics into a single SQL statement over year-partitioned data files.
///
/// # Architecture
///
/// 1. **Lexer** (`lexer.rs`) - Tokenizes Span query strings
/// 2. **Parser** (`parser.rs`) - Builds an Abstract Syntax Tree (AST) from tokens
/// 3. **AST** (`ast.rs`) - Defines the Span AST structures
/// 4. **Resolver** (`resolve.rs`) - Cross-clause validation and FOR-clause year resolution
/// 5. **Mappings** (`mappings.rs`) - DSL vocabulary to column names and data files
/// 6. **Code generator** (`codegen/`) - Converts a resolved query to SQL
///
/// # Usage
///
/// ```rust
/// use spandsl::{compile, SqlOptions};
///
/// let sql = compile("HAS fiber COUNT hus BY fylke", &SqlOptions::new().with_year(2024))?;
/// assert!(sql.contains("fylke AS gruppe"));
/// # Ok::<(), spandsl::SpanError>(())
/// ```
pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod mappings;
pub mod parser;
pub mod resolve;

pub use ast::SpanQuery;
pub use codegen::{SqlOptions, Strategy};
pub use error::{CodeGenError, LexerError, ParseError, SpanError};
pub use lexer::{Token, TokenKind};

use tracing::debug;

/// Tokenize a Span query string
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    lexer::tokenize(input)
}

/// Parse a token sequence into a Span query
pub fn parse(tokens: Vec<Token>) -> Result<SpanQuery, ParseError> {
    parser::parse(tokens)
}

/// Tokenize and parse a Span query string
pub fn parse_str(input: &str) -> error::Result<SpanQuery> {
    let tokens = lexer::tokenize(input)?;
    Ok(parser::parse(tokens)?)
}

/// Generate SQL for a parsed query
pub fn generate_sql(query: &SpanQuery, options: &SqlOptions) -> Result<String, CodeGenError> {
    codegen::generate_sql(query, options)
}

/// Compile a Span query string to SQL
///
/// This is the main entry point. The same text and options always produce
/// byte-identical SQL.
///
/// # Errors
///
/// Returns the first [`LexerError`], [`ParseError`] or [`CodeGenError`]
/// raised by the pipeline
pub fn compile(input: &str, options: &SqlOptions) -> error::Result<String> {
    let query = parse_str(input)?;
    let sql = codegen::generate_sql(&query, options)?;
    debug!(bytes = sql.len(), "compiled span query");
    Ok(sql)
}

/// Detect if a query string is Span DSL rather than SQL
///
/// Span queries start with the HAS keyword (after optional whitespace)
pub fn is_span_query(query: &str) -> bool {
    let trimmed = query.trim_start();
    trimmed
        .get(..3)
        .is_some_and(|head| head.eq_ignore_ascii_case("HAS"))
        && trimmed[3..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '(')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_span_query() {
        assert!(is_span_query("HAS fiber COUNT hus"));
        assert!(is_span_query("  has ANY(fiber, 5g) COUNT hus"));
        assert!(is_span_query("\nHAS(fiber) COUNT adr"));

        assert!(!is_span_query("SELECT * FROM adr"));
        assert!(!is_span_query("HASH fiber"));
        assert!(!is_span_query(""));
    }

    #[test]
    fn test_end_to_end_simple() {
        let sql = compile("HAS fiber COUNT hus", &SqlOptions::new().with_year(2024)).unwrap();
        assert!(sql.starts_with("WITH adr AS"));
        assert!(sql.contains("tek = 'fiber'"));
        assert!(sql.contains("SUM(hus)"));
    }

    #[test]
    fn test_error_stages() {
        let options = SqlOptions::new().with_year(2024);

        let lex = compile("HAS fiber COUNT hus @", &options).unwrap_err();
        assert_eq!(lex.name(), "LexerError");

        let parse = compile("HAS fiber", &options).unwrap_err();
        assert_eq!(parse.name(), "ParseError");

        let gen = compile("HAS fiber COUNT hus", &SqlOptions::new()).unwrap_err();
        assert_eq!(gen.name(), "CodeGenError");
        assert_eq!(gen.position(), None);
    }

    #[test]
    fn test_parse_str() {
        let query = parse_str("HAS fiber COUNT hus TOP 3").unwrap();
        assert_eq!(query.top, Some(3));
        assert!(matches!(parse_str("HAS"), Err(SpanError::Parse(_))));
    }
}
