/// Error types for the Span DSL pipeline
///
/// Lexer and parser errors carry the position of the offending character or
/// token. Code generation errors describe semantic problems and carry no
/// position.
use thiserror::Error;

/// Tokenization failure (unterminated string, unexpected character)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LexerError {
    pub message: String,
    /// Byte offset into the query text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl LexerError {
    pub fn new(message: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// Grammar violation reported at the offending token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the query text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// Semantic error raised while validating a query or generating SQL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CodeGenError {
    pub message: String,
}

impl CodeGenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::new(format!("Format error: {}", e))
    }
}

/// Any error produced by [`crate::compile`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    CodeGen(#[from] CodeGenError),
}

impl SpanError {
    /// Stable error name used by front ends when reporting failures
    pub fn name(&self) -> &'static str {
        match self {
            SpanError::Lexer(_) => "LexerError",
            SpanError::Parse(_) => "ParseError",
            SpanError::CodeGen(_) => "CodeGenError",
        }
    }

    /// Source position for lexer and parser errors as (offset, line, column)
    pub fn position(&self) -> Option<(usize, usize, usize)> {
        match self {
            SpanError::Lexer(e) => Some((e.offset, e.line, e.column)),
            SpanError::Parse(e) => Some((e.offset, e.line, e.column)),
            SpanError::CodeGen(_) => None,
        }
    }
}

/// Result alias for the full pipeline
pub type Result<T> = std::result::Result<T, SpanError>;
