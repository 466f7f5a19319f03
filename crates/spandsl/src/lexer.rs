/// Lexer/Tokenizer for the Span DSL
///
/// Converts Span DSL query strings into a flat sequence of tokens with
/// position metadata. Keywords are uppercased, identifiers lowercased.
use crate::error::LexerError;
use std::fmt;
use tracing::trace;

/// Clause and boolean keywords, matched case-insensitively
pub const KEYWORDS: [&str; 14] = [
    "HAS", "IN", "COUNT", "BY", "SHOW", "SORT", "TOP", "FOR", "AND", "OR", "NOT", "ANY", "ALL",
    "NONE",
];

/// Token categories in the Span DSL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Operator,
    Number,
    String,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword => write!(f, "keyword"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Operator => write!(f, "operator"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::String => write!(f, "string"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token together with where it starts in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset of the first character
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    /// Check for a keyword token, e.g. `token.is_keyword("HAS")`
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::String => write!(f, "string \"{}\"", self.text),
            kind => write!(f, "{} '{}'", kind, self.text),
        }
    }
}

/// Lexer for the Span DSL
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer from input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input, always ending with exactly one EOF token
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        trace!(count = tokens.len(), "tokenized span query");
        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        let (offset, line, column) = (self.offset, self.line, self.column);
        let token = |kind: TokenKind, text: String| Token {
            kind,
            text,
            offset,
            line,
            column,
        };

        let Some(ch) = self.current_char() else {
            return Ok(token(TokenKind::Eof, String::new()));
        };

        match ch {
            '(' => {
                self.advance();
                Ok(token(TokenKind::LParen, "(".to_string()))
            }
            ')' => {
                self.advance();
                Ok(token(TokenKind::RParen, ")".to_string()))
            }
            ',' => {
                self.advance();
                Ok(token(TokenKind::Comma, ",".to_string()))
            }
            '"' | '\'' => {
                let value = self.read_string(ch)?;
                Ok(token(TokenKind::String, value))
            }
            // 5g/4g must win over number scanning
            '5' | '4' if self.is_generation_flag() => {
                let mut value = String::with_capacity(2);
                value.push(ch);
                value.push('g');
                self.advance();
                self.advance();
                Ok(token(TokenKind::Identifier, value))
            }
            _ if ch.is_ascii_digit() => Ok(token(TokenKind::Number, self.read_number())),
            '!' | '>' | '<' if self.peek() == Some('=') => {
                self.advance();
                self.advance();
                Ok(token(TokenKind::Operator, format!("{}=", ch)))
            }
            '=' | '>' | '<' => {
                self.advance();
                Ok(token(TokenKind::Operator, ch.to_string()))
            }
            _ if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                let upper = ident.to_ascii_uppercase();
                if KEYWORDS.contains(&upper.as_str()) {
                    Ok(token(TokenKind::Keyword, upper))
                } else {
                    Ok(token(TokenKind::Identifier, ident.to_ascii_lowercase()))
                }
            }
            _ => Err(LexerError::new(
                format!("Unexpected character: {}", ch),
                offset,
                line,
                column,
            )),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, distance: usize) -> Option<char> {
        self.input.get(self.position + distance).copied()
    }

    /// Backslash escapes only the closing quote and itself
    fn escapes_next(&self, quote_char: char) -> bool {
        matches!(self.peek(), Some(next) if next == quote_char || next == '\\')
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// `5g`/`4g` not followed by another identifier character
    fn is_generation_flag(&self) -> bool {
        matches!(self.peek(), Some('g' | 'G')) && !self.peek_at(2).is_some_and(is_ident_char)
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, LexerError> {
        let (start_offset, start_line, start_column) = (self.offset, self.line, self.column);
        self.advance(); // skip opening quote

        let mut value = String::new();

        loop {
            match self.current_char() {
                None => {
                    return Err(LexerError::new(
                        "Unterminated string",
                        start_offset,
                        start_line,
                        start_column,
                    ));
                }
                Some(ch) if ch == quote_char => break,
                Some('\\') if self.escapes_next(quote_char) => {
                    self.advance();
                    if let Some(escaped) = self.current_char() {
                        value.push(escaped);
                    }
                    self.advance();
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        self.advance(); // skip closing quote
        Ok(value)
    }

    fn read_number(&mut self) -> String {
        let mut num_str = String::new();
        while let Some(ch) = self.current_char().filter(char::is_ascii_digit) {
            num_str.push(ch);
            self.advance();
        }
        num_str
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.current_char().filter(|c| is_ident_char(*c)) {
            ident.push(ch);
            self.advance();
        }
        ident
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Tokenize a Span DSL query string
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_minimal_query() {
        let tokens = tokenize("HAS fiber COUNT hus").unwrap();
        assert_eq!(tokens.len(), 5);
        assert!(tokens[0].is_keyword("HAS"));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "fiber");
        assert!(tokens[2].is_keyword("COUNT"));
        assert_eq!(tokens[3].text, "hus");
        assert_eq!(tokens[4].kind, TokenKind::Eof);
    }

    #[test]
    fn test_case_folding() {
        let tokens = tokenize("has Fiber count HUS").unwrap();
        assert!(tokens[0].is_keyword("HAS"));
        assert_eq!(tokens[1].text, "fiber");
        assert!(tokens[2].is_keyword("COUNT"));
        assert_eq!(tokens[3].text, "hus");
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("= != >= <= > <").unwrap();
        let ops: Vec<&str> = tokens[..6].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(ops, vec!["=", "!=", ">=", "<=", ">", "<"]);
        assert!(tokens[..6].iter().all(|t| t.kind == TokenKind::Operator));
    }

    #[test]
    fn test_lone_bang_is_rejected() {
        let err = tokenize("HAS ! fiber").unwrap_err();
        assert_eq!(err.message, "Unexpected character: !");
        assert_eq!((err.offset, err.line, err.column), (4, 1, 5));
    }

    #[test]
    fn test_generation_flags() {
        let tokens = tokenize("HAS 5g AND nedhast >= 500 OR 4G COUNT hus").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "5g");
        assert_eq!(tokens[5].kind, TokenKind::Number);
        assert_eq!(tokens[5].text, "500");
        assert_eq!(tokens[7].kind, TokenKind::Identifier);
        assert_eq!(tokens[7].text, "4g");
    }

    #[test]
    fn test_generation_prefix_followed_by_ident_char() {
        // 5gx is not a generation flag: the digit lexes as a number
        assert_eq!(
            kinds("5gx"),
            vec![TokenKind::Number, TokenKind::Identifier, TokenKind::Eof]
        );
        assert_eq!(texts("5gx"), vec!["5", "gx", ""]);
        assert_eq!(kinds("6g"), vec![TokenKind::Number, TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn test_strings_and_escapes() {
        let tokens = tokenize(r#"'Oslo' "Møre og Romsdal" 'it\'s' "a\\b" "c\d""#).unwrap();
        assert_eq!(tokens[0].text, "Oslo");
        assert_eq!(tokens[1].text, "Møre og Romsdal");
        assert_eq!(tokens[2].text, "it's");
        assert_eq!(tokens[3].text, r"a\b");
        assert_eq!(tokens[4].text, r"c\d");
        assert!(tokens[..5].iter().all(|t| t.kind == TokenKind::String));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("HAS fiber IN fylke = \"Oslo COUNT hus").unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.column, 22);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("HAS fiber\nCOUNT hus").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 1));
        assert_eq!(tokens[2].offset, 10);
        assert_eq!((tokens[4].offset, tokens[4].line, tokens[4].column), (19, 2, 10));
    }

    #[test]
    fn test_byte_offsets_after_multibyte_string() {
        let tokens = tokenize("'Tromsø' x").unwrap();
        assert_eq!(tokens[1].offset, "'Tromsø' ".len());
        assert_eq!(tokens[1].column, 10);
    }

    #[test]
    fn test_whitespace_insensitive() {
        let a = texts("HAS fiber COUNT hus FOR (2023,2024)");
        let b = texts("HAS   fiber\n\tCOUNT  hus\r\n FOR ( 2023 , 2024 )");
        assert_eq!(a, b);
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            kinds("ANY(fiber, kabel)"),
            vec![
                TokenKind::Keyword,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }
}
