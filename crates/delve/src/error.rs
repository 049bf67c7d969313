//! Error types for the query engine.

use delve_datalog::DatalogError;
use delve_eqls::ParseError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors returned by [`crate::Engine`] and [`crate::QueryStep`].
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// The query text did not parse. Every diagnostic is attached.
    #[error("invalid query: {} syntax error(s)", .errors.len())]
    #[diagnostic(code(delve::query::parse))]
    Parse {
        #[source_code]
        source_code: String,
        #[related]
        errors: Vec<ParseError>,
    },

    /// Rule registration or evaluation failed.
    #[error(transparent)]
    #[diagnostic(code(delve::datalog))]
    Datalog(#[from] DatalogError),

    /// An input row was not a JSON object.
    #[error("row {index} is not a JSON object")]
    #[diagnostic(code(delve::flatten::row))]
    InvalidRow { index: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
