//! Lexer for Build Descriptions
//!
//! Tokenizes a source buffer into a flat token stream. It handles:
//! - Keywords and punctuation, including compound operators
//! - String literals (single-line, triple-quoted, f-strings)
//! - Number literals in decimal, hex, octal and binary
//! - Newline significance: newlines terminate statements except while
//!   nested inside brackets
//! - Line continuations and comments

use std::collections::HashMap;

use crate::diagnostics::{SourceId, Span};

/// Token types produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Newline,

    // Literals and names
    Identifier,
    Number,
    Str,
    FStr,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Arrow,

    // Keywords
    If,
    Elif,
    Else,
    Endif,
    Foreach,
    Endforeach,
    In,
    And,
    Or,
    Not,
    True,
    False,
    Continue,
    Break,
    Return,
    Func,
    Endfunc,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "end of file",
            Self::Newline => "end of line",
            Self::Identifier => "identifier",
            Self::Number => "number",
            Self::Str => "string",
            Self::FStr => "fstring",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Question => "?",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::PercentAssign => "%=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Arrow => "->",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::Endif => "endif",
            Self::Foreach => "foreach",
            Self::Endforeach => "endforeach",
            Self::In => "in",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::True => "true",
            Self::False => "false",
            Self::Continue => "continue",
            Self::Break => "break",
            Self::Return => "return",
            Self::Func => "func",
            Self::Endfunc => "endfunc",
        }
    }
}

/// A token with its source location. `value` holds the processed payload
/// for identifiers and strings; `number` is set for number literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub number: i64,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, value: String::new(), number: 0, span }
    }

    fn with_value(kind: TokenKind, value: String, span: Span) -> Self {
        Self { kind, value, number: 0, span }
    }
}

/// Error raised when the lexer encounters invalid input.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}

lazy_static::lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("if", TokenKind::If);
        m.insert("elif", TokenKind::Elif);
        m.insert("else", TokenKind::Else);
        m.insert("endif", TokenKind::Endif);
        m.insert("foreach", TokenKind::Foreach);
        m.insert("endforeach", TokenKind::Endforeach);
        m.insert("in", TokenKind::In);
        m.insert("and", TokenKind::And);
        m.insert("or", TokenKind::Or);
        m.insert("not", TokenKind::Not);
        m.insert("true", TokenKind::True);
        m.insert("false", TokenKind::False);
        m.insert("continue", TokenKind::Continue);
        m.insert("break", TokenKind::Break);
        m.insert("return", TokenKind::Return);
        m.insert("func", TokenKind::Func);
        m.insert("endfunc", TokenKind::Endfunc);
        m
    };
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    source: SourceId,
    /// Open-bracket stack; newlines are suppressed while non-empty.
    brackets: Vec<char>,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str, source: SourceId) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            source,
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn span(&self) -> Span {
        Span::new(self.source, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek() {
            let span = self.span();
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    // Line continuation suppresses the newline.
                    self.advance();
                    self.advance();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '\n' => {
                    self.advance();
                    if self.brackets.is_empty() {
                        // Collapse runs of newlines into one token.
                        if !matches!(
                            self.tokens.last().map(|t| t.kind),
                            Some(TokenKind::Newline) | None
                        ) {
                            self.tokens.push(Token::new(TokenKind::Newline, span));
                        }
                    }
                }
                '(' | '[' | '{' => {
                    self.advance();
                    self.brackets.push(c);
                    let kind = match c {
                        '(' => TokenKind::LParen,
                        '[' => TokenKind::LBracket,
                        _ => TokenKind::LBrace,
                    };
                    self.tokens.push(Token::new(kind, span));
                }
                ')' | ']' | '}' => {
                    self.advance();
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match self.brackets.pop() {
                        Some(open) if open == expected => {}
                        _ => {
                            return Err(LexError::new(format!("unmatched '{}'", c), span));
                        }
                    }
                    let kind = match c {
                        ')' => TokenKind::RParen,
                        ']' => TokenKind::RBracket,
                        _ => TokenKind::RBrace,
                    };
                    self.tokens.push(Token::new(kind, span));
                }
                '\'' => {
                    let token = self.lex_string(false)?;
                    self.tokens.push(token);
                }
                'f' if self.peek_at(1) == Some('\'') => {
                    self.advance();
                    let token = self.lex_string(true)?;
                    self.tokens.push(token);
                }
                '0'..='9' => {
                    let token = self.lex_number(span)?;
                    self.tokens.push(token);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    match KEYWORDS.get(ident.as_str()) {
                        Some(&kind) => self.tokens.push(Token::new(kind, span)),
                        None => {
                            self.tokens.push(Token::with_value(TokenKind::Identifier, ident, span))
                        }
                    }
                }
                _ => {
                    let token = self.lex_operator(span)?;
                    self.tokens.push(token);
                }
            }
        }

        let span = self.span();
        if !matches!(self.tokens.last().map(|t| t.kind), Some(TokenKind::Newline) | None) {
            self.tokens.push(Token::new(TokenKind::Newline, span));
        }
        self.tokens.push(Token::new(TokenKind::Eof, span));
        Ok(self.tokens)
    }

    fn lex_operator(&mut self, span: Span) -> Result<Token, LexError> {
        let c = self.advance().unwrap_or('\0');
        let next = self.peek();
        let kind = match (c, next) {
            ('=', Some('=')) => {
                self.advance();
                TokenKind::EqEq
            }
            ('!', Some('=')) => {
                self.advance();
                TokenKind::NotEq
            }
            ('<', Some('=')) => {
                self.advance();
                TokenKind::Le
            }
            ('>', Some('=')) => {
                self.advance();
                TokenKind::Ge
            }
            ('+', Some('=')) => {
                self.advance();
                TokenKind::PlusAssign
            }
            ('-', Some('=')) => {
                self.advance();
                TokenKind::MinusAssign
            }
            ('*', Some('=')) => {
                self.advance();
                TokenKind::StarAssign
            }
            ('/', Some('=')) => {
                self.advance();
                TokenKind::SlashAssign
            }
            ('%', Some('=')) => {
                self.advance();
                TokenKind::PercentAssign
            }
            ('-', Some('>')) => {
                self.advance();
                TokenKind::Arrow
            }
            ('=', _) => TokenKind::Assign,
            ('<', _) => TokenKind::Lt,
            ('>', _) => TokenKind::Gt,
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('%', _) => TokenKind::Percent,
            (',', _) => TokenKind::Comma,
            (':', _) => TokenKind::Colon,
            ('.', _) => TokenKind::Dot,
            ('?', _) => TokenKind::Question,
            _ => {
                return Err(LexError::new(format!("unexpected character '{}'", c), span));
            }
        };
        Ok(Token::new(kind, span))
    }

    fn lex_number(&mut self, span: Span) -> Result<Token, LexError> {
        let mut raw = String::new();
        let (radix, prefix_len) = if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => (16, 2),
                Some('o') | Some('O') => (8, 2),
                Some('b') | Some('B') => (2, 2),
                _ => (10, 0),
            }
        } else {
            (10, 0)
        };
        for _ in 0..prefix_len {
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                raw.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if raw.is_empty() {
            return Err(LexError::new("malformed number literal", span));
        }
        let number = i64::from_str_radix(&raw, radix)
            .map_err(|_| LexError::new(format!("malformed number literal '{}'", raw), span))?;
        let mut token = Token::with_value(TokenKind::Number, raw, span);
        token.number = number;
        Ok(token)
    }

    fn lex_string(&mut self, fstring: bool) -> Result<Token, LexError> {
        let span = self.span();
        self.advance(); // opening quote

        // Triple-quoted: content is taken literally.
        if self.peek() == Some('\'') && self.peek_at(1) == Some('\'') {
            self.advance();
            self.advance();
            let mut value = String::new();
            loop {
                if self.peek() == Some('\'')
                    && self.peek_at(1) == Some('\'')
                    && self.peek_at(2) == Some('\'')
                {
                    self.advance();
                    self.advance();
                    self.advance();
                    let kind = if fstring { TokenKind::FStr } else { TokenKind::Str };
                    return Ok(Token::with_value(kind, value, span));
                }
                match self.advance() {
                    Some(c) => value.push(c),
                    None => return Err(LexError::new("unterminated string", span)),
                }
            }
        }

        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::new("unterminated string", span));
                }
                Some('\'') => {
                    self.advance();
                    let kind = if fstring { TokenKind::FStr } else { TokenKind::Str };
                    return Ok(Token::with_value(kind, value, span));
                }
                Some('\\') => {
                    let esc_span = self.span();
                    self.advance();
                    let esc = self
                        .advance()
                        .ok_or_else(|| LexError::new("unterminated string", span))?;
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        'a' => value.push('\x07'),
                        'b' => value.push('\x08'),
                        'f' => value.push('\x0c'),
                        'v' => value.push('\x0b'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        other => {
                            return Err(LexError::new(
                                format!("invalid escape sequence '\\{}'", other),
                                esc_span,
                            ));
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input, SourceId(0)).tokenize().unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_call() {
        let tokens = lex("project('hello', 'c')");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value, "project");
        assert_eq!(tokens[1].kind, TokenKind::LParen);
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].value, "hello");
        assert_eq!(tokens[3].kind, TokenKind::Comma);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("if elif else endif")[..4],
            [TokenKind::If, TokenKind::Elif, TokenKind::Else, TokenKind::Endif]
        );
    }

    #[test]
    fn test_number_bases() {
        let tokens = lex("10 0x1f 0o17 0b101");
        let nums: Vec<i64> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.number)
            .collect();
        assert_eq!(nums, [10, 31, 15, 5]);
    }

    #[test]
    fn test_newline_suppressed_in_brackets() {
        let ks = kinds("f(\n1,\n2\n)");
        assert!(!ks[..ks.len() - 2].contains(&TokenKind::Newline));
    }

    #[test]
    fn test_newline_significant_outside_brackets() {
        let ks = kinds("a = 1\nb = 2");
        assert!(ks.contains(&TokenKind::Newline));
    }

    #[test]
    fn test_line_continuation() {
        let ks = kinds("a = 1 \\\n+ 2");
        // Only the trailing newline token remains.
        assert_eq!(ks.iter().filter(|&&k| k == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r"x = 'a\nb\'c'");
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.value, "a\nb'c");
    }

    #[test]
    fn test_invalid_escape_fails() {
        let err = Lexer::new(r"x = '\q'", SourceId(0)).tokenize().unwrap_err();
        assert!(err.message.contains("invalid escape"));
    }

    #[test]
    fn test_triple_quoted_literal() {
        let tokens = lex("x = '''a\\nb\n'quoted'\n'''");
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.value, "a\\nb\n'quoted'\n");
    }

    #[test]
    fn test_fstring() {
        let tokens = lex("x = f'value: @v@'");
        let s = tokens.iter().find(|t| t.kind == TokenKind::FStr).unwrap();
        assert_eq!(s.value, "value: @v@");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x = 'oops", SourceId(0)).tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unmatched_bracket() {
        let err = Lexer::new("x = )", SourceId(0)).tokenize().unwrap_err();
        assert!(err.message.contains("unmatched"));
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(kinds("a += 1")[1], TokenKind::PlusAssign);
        assert_eq!(kinds("a == b")[1], TokenKind::EqEq);
        assert_eq!(kinds("a != b")[1], TokenKind::NotEq);
        assert_eq!(kinds("a <= b")[1], TokenKind::Le);
    }

    #[test]
    fn test_identifier_starting_with_f() {
        let tokens = lex("files('a.c')");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value, "files");
    }
}
