//! Bottom-up datalog evaluation over the delve fact store.
//!
//! This crate provides:
//! - Terms, literals, goals, rules and queries ([`Term`], [`Literal`], [`Goal`], [`Rule`], [`Query`])
//! - A textual rule syntax ([`parse_rule`], [`parse_goals`])
//! - Rule validation and stratification at registration time
//! - [`Evaluator`]: seeds a [`WorkingSet`] from a store, saturates derived
//!   relations stratum by stratum, and answers queries with deduplicated
//!   [`Binding`]s

pub mod binding;
pub mod builtins;
pub mod dependency;
mod error;
pub mod evaluator;
pub mod literal;
mod solver;
pub mod syntax;
pub mod validator;
pub mod working_set;

pub use binding::Binding;
pub use dependency::PredicateDependencyGraph;
pub use error::{DatalogError, Result};
pub use evaluator::{EvaluationResult, Evaluator, EvaluatorConfig, FixpointStats, PlanSummary};
pub use literal::{CompareOp, Goal, Literal, Predicate, Query, Rule, Term};
pub use syntax::{parse_goals, parse_rule, parse_rules};
pub use working_set::{Relation, WorkingSet};
