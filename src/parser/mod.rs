//! Source Front-End
//!
//! Lexing and parsing. `parse_source` is the entry point used by the
//! evaluator; it converts lex and parse failures into the common
//! evaluation error currency.

pub mod lexer;
pub mod parser;
pub mod types;

pub use lexer::{LexError, Lexer, Token, TokenKind};
pub use parser::{ParseMode, Parser};
pub use types::ParseError;

use crate::ast::types::ParsedFile;
use crate::diagnostics::{ErrorKind, InterpError, SourceId};

/// Lex and parse a registered source buffer.
pub fn parse_source(
    text: &str,
    source: SourceId,
    mode: ParseMode,
) -> Result<ParsedFile, InterpError> {
    let tokens = Lexer::new(text, source)
        .tokenize()
        .map_err(|e| InterpError::new(ErrorKind::Lex, e.message.clone()).at(e.span))?;
    Parser::new(tokens, mode)
        .parse()
        .map_err(|e| InterpError::new(ErrorKind::Parse, e.message.clone()).at(e.span))
}
