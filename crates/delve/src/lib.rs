//! delve: an in-memory fact store queried with EQL-S and datalog rules.
//!
//! This crate ties the pieces together:
//! - [`Engine`]: owns the store and rules, answers EQL-S queries with rows
//!   keyed by the field text the user wrote
//! - [`flatten`]: loads JSON rows as facts
//! - [`QueryStep`]: one query over one batch of rows, with a fresh engine
//!
//! ```
//! use delve::{Engine, EngineConfig, Fact};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.add_facts([
//!     Fact::type_of("post:1", "post"),
//!     Fact::new("post:1", "title", "Hello"),
//! ]);
//! let output = engine.query("FIND post AS ?p RETURN ?p.title").unwrap();
//! assert_eq!(output.rows.len(), 1);
//! ```

mod engine;
mod error;
pub mod flatten;
mod step;

pub use engine::{Engine, EngineConfig, QueryOutput};
pub use error::{EngineError, Result};
pub use step::QueryStep;

pub use delve_datalog::{self as datalog, EvaluatorConfig, PlanSummary, Rule};
pub use delve_eqls::{self as eqls, CompilerOptions, OrMode};
pub use delve_store::{self as store, Atom, CatalogConfig, CatalogEntry, Fact, Link, StoreStats};
