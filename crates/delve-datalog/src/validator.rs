//! Rule validation at registration time.
//!
//! Rules are checked in isolation (head predicate, safety) and against the
//! rules already registered (head arity). Stratification is checked by the
//! evaluator over the combined program.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::DatalogError;
use crate::literal::{Goal, Rule};

/// Reasons a rule is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The head names `attr`, `link` or a filter built-in.
    BuiltinHead { predicate: String },
    /// A head variable is not bound by any positive body literal.
    UnsafeVariable { variable: String },
    /// The head arity differs from an earlier rule for the same predicate.
    ArityMismatch {
        predicate: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BuiltinHead { predicate } => {
                write!(f, "rule head cannot use built-in predicate `{}`", predicate)
            }
            ValidationError::UnsafeVariable { variable } => {
                write!(f, "head variable ?{} is not bound by the body", variable)
            }
            ValidationError::ArityMismatch {
                predicate,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "arity mismatch for `{}`: expected {} args, got {}",
                    predicate, expected, actual
                )
            }
        }
    }
}

impl ValidationError {
    /// Convert into the public error, naming the offending rule.
    pub fn into_error(self, rule: &Rule) -> DatalogError {
        match self {
            ValidationError::UnsafeVariable { variable } => DatalogError::UnsafeRule {
                rule: rule.to_string(),
                variable,
            },
            other => DatalogError::InvalidRule(format!("{} in `{}`", other, rule)),
        }
    }
}

/// Validate a rule against the rules already registered.
///
/// Returns `None` when the rule may be added.
pub fn validate_rule(rule: &Rule, existing: &[Rule]) -> Option<ValidationError> {
    if rule.head.predicate.is_builtin() {
        return Some(ValidationError::BuiltinHead {
            predicate: rule.head_name().to_string(),
        });
    }

    if let Some(previous) = existing
        .iter()
        .find(|r| r.head_name() == rule.head_name())
        && previous.head.terms.len() != rule.head.terms.len()
    {
        return Some(ValidationError::ArityMismatch {
            predicate: rule.head_name().to_string(),
            expected: previous.head.terms.len(),
            actual: rule.head.terms.len(),
        });
    }

    let bound: BTreeSet<String> = rule.body.iter().flat_map(Goal::bound_variables).collect();
    rule.head
        .variables()
        .into_iter()
        .find(|var| !bound.contains(*var))
        .map(|var| ValidationError::UnsafeVariable {
            variable: var.to_string(),
        })
}
