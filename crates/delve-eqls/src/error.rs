//! Positioned EQL-S diagnostics.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// A tokenizer or parser error.
///
/// Lines and columns are 1-based; columns count characters. `offset` is the
/// byte offset into the full query text, used for the diagnostic label.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("{message} (line {line}, column {column})")]
#[diagnostic(code(delve::eqls::syntax))]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// Token kinds the parser would have accepted here.
    pub expected: Vec<String>,
    #[label("here")]
    pub span: SourceSpan,
    #[help]
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(
        line: usize,
        column: usize,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            expected: Vec::new(),
            span: (offset, len).into(),
            help: None,
        }
    }

    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        if !expected.is_empty() {
            self.help = Some(format!("expected {}", expected.join(" or ")));
        }
        self.expected = expected;
        self
    }
}
