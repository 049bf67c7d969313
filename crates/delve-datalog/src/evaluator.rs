//! Bottom-up fixpoint evaluation.
//!
//! Evaluation seeds a working set from the store, saturates the derived
//! relations stratum by stratum, then answers the query goals left to
//! right. The store is only borrowed, so it cannot change while an
//! evaluation is running.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::time::Instant;

use delve_store::{Atom, FactStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::binding::Binding;
use crate::builtins::PatternCache;
use crate::dependency::PredicateDependencyGraph;
use crate::error::{DatalogError, Result};
use crate::literal::{Query, Rule};
use crate::solver::Solver;
use crate::validator::validate_rule;
use crate::working_set::WorkingSet;

/// Evaluator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Fixpoint passes allowed per stratum before giving up on convergence.
    pub max_iterations: usize,
    /// Only evaluate rules the query transitively depends on.
    pub prune_unused_rules: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            prune_unused_rules: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_prune_unused_rules(mut self, prune: bool) -> Self {
        self.prune_unused_rules = prune;
        self
    }
}

/// Outcome of saturating a working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixpointStats {
    pub rules: usize,
    pub strata: usize,
    pub iterations: usize,
    pub derived: usize,
    pub converged: bool,
}

/// Short description of how a query was evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub goal_count: usize,
    pub rule_count: usize,
    pub strata: usize,
    pub iterations: usize,
    pub derived_tuples: usize,
    pub converged: bool,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} goal{}, {} rule{} in {} strat{}, {} iteration{}, {} derived tuple{}, {}",
            self.goal_count,
            plural(self.goal_count),
            self.rule_count,
            plural(self.rule_count),
            self.strata,
            if self.strata == 1 { "um" } else { "a" },
            self.iterations,
            plural(self.iterations),
            self.derived_tuples,
            plural(self.derived_tuples),
            if self.converged {
                "converged"
            } else {
                "iteration limit reached"
            }
        )
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Deduplicated answer bindings plus timing and plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub bindings: Vec<Binding>,
    pub execution_time_ms: f64,
    pub plan: PlanSummary,
}

/// Holds the registered rules and evaluates queries against a store.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
    rules: Vec<Rule>,
    /// Derived predicate -> stratum, recomputed on registration.
    strata: BTreeMap<String, usize>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Stratum assigned to a derived predicate.
    pub fn stratum_of(&self, predicate: &str) -> Option<usize> {
        self.strata.get(predicate).copied()
    }

    /// Register a rule.
    ///
    /// Rejects built-in heads, unsafe rules, head arity conflicts, and rules
    /// that would place negation inside a recursive cycle. On error the
    /// evaluator is unchanged.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        if let Some(error) = validate_rule(&rule, &self.rules) {
            warn!(rule = %rule, error = %error, "rule rejected");
            return Err(error.into_error(&rule));
        }

        let strata = PredicateDependencyGraph::from_rules(self.rules.iter().chain([&rule]))
            .strata()
            .inspect_err(|e| warn!(rule = %rule, error = %e, "rule rejected"))?;

        debug!(rule = %rule, stratum = strata.get(rule.head_name()).copied().unwrap_or(0), "rule registered");
        self.rules.push(rule);
        self.strata = strata;
        Ok(())
    }

    /// Register several rules, stopping at the first rejected one.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> Result<()> {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// Evaluate a query in a fresh working set.
    pub fn evaluate(&self, store: &FactStore, query: &Query) -> Result<EvaluationResult> {
        let mut working_set = WorkingSet::new();
        self.evaluate_in(store, &mut working_set, query)
    }

    /// Evaluate a query in a caller-owned working set.
    ///
    /// The working set is reseeded from the store, so anything it held
    /// before is discarded. After the call it holds every relation the
    /// query needed, fully saturated.
    pub fn evaluate_in(
        &self,
        store: &FactStore,
        working_set: &mut WorkingSet,
        query: &Query,
    ) -> Result<EvaluationResult> {
        let start = Instant::now();
        working_set.seed(store);

        let rules = self.rules_for(query);
        let stats = self.run_fixpoint(working_set, &rules)?;

        let mut patterns = PatternCache::new();
        let solutions = Solver::new(working_set, &mut patterns).solve(&query.goals, Binding::new());
        let bindings = project(solutions, &query.answer);

        let plan = PlanSummary {
            goal_count: query.goals.len(),
            rule_count: stats.rules,
            strata: stats.strata,
            iterations: stats.iterations,
            derived_tuples: stats.derived,
            converged: stats.converged,
        };
        let execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            results = bindings.len(),
            time_ms = execution_time_ms,
            plan = %plan,
            "query evaluated"
        );

        Ok(EvaluationResult {
            bindings,
            execution_time_ms,
            plan,
        })
    }

    /// Run every registered rule over an existing working set until no pass
    /// adds a tuple. Nothing is reseeded; on an already saturated set this
    /// derives nothing.
    pub fn saturate(&self, working_set: &mut WorkingSet) -> Result<FixpointStats> {
        let rules: Vec<&Rule> = self.rules.iter().collect();
        self.run_fixpoint(working_set, &rules)
    }

    /// Rules needed by the query, or all rules when pruning is off.
    fn rules_for(&self, query: &Query) -> Vec<&Rule> {
        if !self.config.prune_unused_rules {
            return self.rules.iter().collect();
        }
        let roots = query.derived_predicates();
        if roots.is_empty() {
            return Vec::new();
        }
        let required: BTreeSet<String> =
            PredicateDependencyGraph::from_rules(&self.rules).required_predicates(&roots);
        self.rules
            .iter()
            .filter(|rule| required.contains(rule.head_name()))
            .collect()
    }

    fn run_fixpoint(&self, working_set: &mut WorkingSet, rules: &[&Rule]) -> Result<FixpointStats> {
        let mut by_stratum: BTreeMap<usize, Vec<&Rule>> = BTreeMap::new();
        for rule in rules {
            let stratum = self.stratum_of(rule.head_name()).unwrap_or(0);
            by_stratum.entry(stratum).or_default().push(*rule);
        }

        let mut stats = FixpointStats {
            rules: rules.len(),
            strata: by_stratum.len(),
            converged: true,
            ..FixpointStats::default()
        };
        let mut patterns = PatternCache::new();

        for (stratum, stratum_rules) in &by_stratum {
            let mut converged = false;
            let mut passes = 0;

            while passes < self.config.max_iterations {
                passes += 1;
                let mut added = 0;
                for rule in stratum_rules {
                    let tuples = derive(working_set, rule, &mut patterns)?;
                    let mut new_for_rule = 0;
                    for tuple in tuples {
                        if working_set.insert(rule.head_name(), tuple) {
                            new_for_rule += 1;
                        }
                    }
                    trace!(rule = %rule, new = new_for_rule, pass = passes, "rule applied");
                    added += new_for_rule;
                }
                stats.derived += added;
                if added == 0 {
                    converged = true;
                    break;
                }
            }

            stats.iterations += passes;
            if converged {
                debug!(stratum, rules = stratum_rules.len(), passes, "stratum converged");
            } else {
                warn!(
                    stratum,
                    max_iterations = self.config.max_iterations,
                    "iteration limit reached before fixpoint"
                );
                stats.converged = false;
            }
        }

        Ok(stats)
    }
}

/// Head tuples produced by one pass of a rule over the current working set.
fn derive(
    working_set: &WorkingSet,
    rule: &Rule,
    patterns: &mut PatternCache,
) -> Result<Vec<Vec<Atom>>> {
    let solutions = Solver::new(working_set, patterns).solve(&rule.body, Binding::new());
    solutions
        .iter()
        .map(|binding| {
            rule.head
                .terms
                .iter()
                .map(|term| {
                    binding.resolve(term).cloned().ok_or_else(|| {
                        DatalogError::Internal(format!(
                            "head term {} unbound after solving `{}`",
                            term, rule
                        ))
                    })
                })
                .collect::<Result<Vec<Atom>>>()
        })
        .collect()
}

/// Restrict to the answer variables and drop duplicates, keeping first-seen
/// order.
fn project(solutions: Vec<Binding>, answer: &[String]) -> Vec<Binding> {
    let mut seen = HashSet::new();
    solutions
        .into_iter()
        .map(|binding| {
            if answer.is_empty() {
                binding
            } else {
                binding.restrict(answer)
            }
        })
        .filter(|binding| seen.insert(binding.canonical()))
        .collect()
}
