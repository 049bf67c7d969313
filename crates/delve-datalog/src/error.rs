//! Error types for rule registration, rule text and evaluation.

use thiserror::Error;

/// Errors that can occur in datalog operations.
///
/// Evaluation itself never fails on bad data: wrong arity, unbound
/// operands and type mismatches make a goal yield nothing. Only rule
/// registration, rule text parsing and broken internal invariants error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatalogError {
    /// Structurally invalid rule (built-in head, empty body, ...).
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// Head variable not bound by any positive body literal.
    #[error("unsafe rule `{rule}`: variable ?{variable} in the head is not bound by a positive body literal")]
    UnsafeRule { rule: String, variable: String },

    /// Negation inside a recursive cycle.
    #[error("rules are not stratifiable: negation in cycle {cycle}")]
    Unstratified { cycle: String },

    /// Malformed rule or goal text.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DatalogError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        DatalogError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatalogError>;
