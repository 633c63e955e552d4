//! Source-Anchored Diagnostics
//!
//! Every error and warning produced during evaluation is anchored to a
//! source location. Sources are registered with the sink as they are
//! loaded; rendering pulls the offending line back out for context.

use std::fmt;
use thiserror::Error;

/// Identifies a registered source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceId(pub u32);

/// A location inside a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(source: SourceId, line: u32, column: u32) -> Self {
        Self { source, line, column }
    }
}

/// A named source buffer (usually a file loaded by the CLI).
#[derive(Debug, Clone)]
pub struct Source {
    pub label: String,
    pub text: String,
}

impl Source {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into() }
    }
}

/// Classification of evaluation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Type,
    InvalidKwarg,
    DuplicateKwarg,
    MissingArg,
    ReturnTypeMismatch,
    UnknownVariable,
    UnknownFunction,
    UnknownMethod,
    UnknownModule,
    Arithmetic,
    Bounds,
    Coercion,
    OptionValidation,
    DepNotFound,
    VersionMismatch,
    MachineMismatch,
    CircularSubproject,
    Io,
    Usage,
    /// User-raised via assert()/error().
    Assert,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lex => "lex error",
            Self::Parse => "parse error",
            Self::Type => "type error",
            Self::InvalidKwarg => "invalid keyword argument",
            Self::DuplicateKwarg => "duplicate keyword argument",
            Self::MissingArg => "missing argument",
            Self::ReturnTypeMismatch => "return type mismatch",
            Self::UnknownVariable => "unknown variable",
            Self::UnknownFunction => "unknown function",
            Self::UnknownMethod => "unknown method",
            Self::UnknownModule => "unknown module",
            Self::Arithmetic => "arithmetic error",
            Self::Bounds => "index out of bounds",
            Self::Coercion => "coercion error",
            Self::OptionValidation => "invalid option value",
            Self::DepNotFound => "dependency not found",
            Self::VersionMismatch => "version mismatch",
            Self::MachineMismatch => "machine mismatch",
            Self::CircularSubproject => "circular subproject",
            Self::Io => "io error",
            Self::Usage => "usage error",
            Self::Assert => "assertion failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evaluation error, anchored at the call site that raised it.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct InterpError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl InterpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), span: None }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a span only if none is set yet. Errors keep the innermost
    /// anchor as they unwind.
    pub fn or_at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }
}

pub type InterpResult<T> = Result<T, InterpError>;

/// Shorthand constructors for the common kinds.
pub fn type_error(message: impl Into<String>) -> InterpError {
    InterpError::new(ErrorKind::Type, message)
}

pub fn arith_error(message: impl Into<String>) -> InterpError {
    InterpError::new(ErrorKind::Arithmetic, message)
}

pub fn bounds_error(message: impl Into<String>) -> InterpError {
    InterpError::new(ErrorKind::Bounds, message)
}

pub fn coercion_error(message: impl Into<String>) -> InterpError {
    InterpError::new(ErrorKind::Coercion, message)
}

pub fn usage_error(message: impl Into<String>) -> InterpError {
    InterpError::new(ErrorKind::Usage, message)
}

/// Collects sources, buffers user-facing output, and renders anchored
/// reports. Owned by the workspace; builtins reach it through there.
#[derive(Debug, Default)]
pub struct Diagnostics {
    sources: Vec<Source>,
    /// Lines produced by message()/summary() and friends.
    pub stdout: Vec<String>,
    /// Warning and error lines.
    pub stderr: Vec<String>,
    pub warning_count: u32,
    /// Mirror buffered lines to the real stdout/stderr as they arrive.
    pub echo: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(&mut self, source: Source) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(source);
        id
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0 as usize)
    }

    pub fn message(&mut self, text: &str) {
        if self.echo {
            println!("{}", text);
        }
        self.stdout.push(text.to_string());
    }

    pub fn warning(&mut self, span: Option<Span>, text: &str) {
        let line = match span {
            Some(s) => format!("WARNING: {} {}", self.where_str(s), text),
            None => format!("WARNING: {}", text),
        };
        if self.echo {
            eprintln!("{}", line);
        }
        self.stderr.push(line);
        self.warning_count += 1;
    }

    /// Render an error with its anchored source line, if any.
    pub fn render(&self, err: &InterpError) -> String {
        let mut out = String::new();
        if let Some(span) = err.span {
            out.push_str(&format!("{} {}: {}", self.where_str(span), err.kind, err.message));
            if let Some(src) = self.source(span.source) {
                if let Some(line) = src.text.lines().nth(span.line.saturating_sub(1) as usize) {
                    out.push('\n');
                    out.push_str(line);
                    out.push('\n');
                    for _ in 1..span.column {
                        out.push(' ');
                    }
                    out.push('^');
                }
            }
        } else {
            out.push_str(&format!("{}: {}", err.kind, err.message));
        }
        out
    }

    fn where_str(&self, span: Span) -> String {
        let label = self
            .source(span.source)
            .map(|s| s.label.as_str())
            .unwrap_or("<unknown>");
        format!("{}:{}:{}", label, span.line, span.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_anchors_source_line() {
        let mut diag = Diagnostics::new();
        let id = diag.register_source(Source::new("meson.build", "project('p', 'c')\nx = y\n"));
        let err = InterpError::new(ErrorKind::UnknownVariable, "y is not defined")
            .at(Span::new(id, 2, 5));
        let rendered = diag.render(&err);
        assert!(rendered.contains("meson.build:2:5"));
        assert!(rendered.contains("x = y"));
    }

    #[test]
    fn test_warning_count() {
        let mut diag = Diagnostics::new();
        diag.warning(None, "something");
        diag.warning(None, "something else");
        assert_eq!(diag.warning_count, 2);
    }

    #[test]
    fn test_or_at_keeps_innermost() {
        let id = SourceId(0);
        let err = InterpError::new(ErrorKind::Type, "x").at(Span::new(id, 1, 1));
        let err = err.or_at(Span::new(id, 9, 9));
        assert_eq!(err.span.unwrap().line, 1);
    }
}
