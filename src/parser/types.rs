//! Parser Types and Limits

use thiserror::Error;

use crate::diagnostics::Span;

/// Maximum recursion depth for nested constructs, well below native stack
/// exhaustion.
pub const MAX_PARSER_DEPTH: usize = 200;

/// Error raised on the first syntax error; no recovery is attempted.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}
