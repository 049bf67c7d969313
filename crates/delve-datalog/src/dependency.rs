//! Predicate dependency analysis for derived relations.
//!
//! Builds the head -> body graph over derived predicates, marking which
//! edges pass through negation. Used to prune rules a query does not need,
//! to reject programs with negation inside a recursive cycle, and to order
//! rule evaluation by stratum.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{DatalogError, Result};
use crate::literal::Rule;

/// Polarity of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dependency {
    Positive,
    Negative,
}

/// Dependency graph over derived predicate names.
#[derive(Debug, Clone, Default)]
pub struct PredicateDependencyGraph {
    /// Predicate -> (body predicate, polarity).
    dependencies: BTreeMap<String, BTreeSet<(String, Dependency)>>,
    /// Every derived predicate named in a head or body.
    predicates: BTreeSet<String>,
}

impl PredicateDependencyGraph {
    /// Build the graph from a set of rules.
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Self {
        let mut graph = Self::default();
        for rule in rules {
            let head = rule.head_name().to_string();
            graph.predicates.insert(head.clone());
            let edges = graph.dependencies.entry(head).or_default();
            for goal in &rule.body {
                for (name, negated) in goal.derived_references() {
                    let polarity = if negated {
                        Dependency::Negative
                    } else {
                        Dependency::Positive
                    };
                    edges.insert((name.to_string(), polarity));
                    graph.predicates.insert(name.to_string());
                }
            }
        }
        graph
    }

    pub fn predicates(&self) -> &BTreeSet<String> {
        &self.predicates
    }

    fn edges(&self, predicate: &str) -> impl Iterator<Item = &(String, Dependency)> {
        self.dependencies.get(predicate).into_iter().flatten()
    }

    /// All predicates needed to evaluate `roots`: the transitive closure of
    /// their dependencies, roots included.
    pub fn required_predicates(&self, roots: &BTreeSet<String>) -> BTreeSet<String> {
        let mut required = BTreeSet::new();
        let mut to_process: Vec<&str> = roots.iter().map(String::as_str).collect();

        while let Some(pred) = to_process.pop() {
            if !required.insert(pred.to_string()) {
                continue;
            }
            for (dep, _) in self.edges(pred) {
                if !required.contains(dep) {
                    to_process.push(dep);
                }
            }
        }

        required
    }

    /// Find a cycle that passes through a negative edge.
    ///
    /// The returned path starts and ends at the same predicate, e.g.
    /// `["a", "b", "a"]`.
    pub fn negative_cycle(&self) -> Option<Vec<String>> {
        for (head, edges) in &self.dependencies {
            for (dep, polarity) in edges {
                if *polarity != Dependency::Negative {
                    continue;
                }
                if let Some(path) = self.path(dep, head) {
                    let mut cycle = vec![head.clone()];
                    cycle.extend(path);
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Shortest path `from ->* to`, inclusive of both ends.
    fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut parents: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.to_string()];
                let mut node = current;
                while let Some(&parent) = parents.get(node) {
                    path.push(parent.to_string());
                    node = parent;
                }
                path.reverse();
                return Some(path);
            }
            for (dep, _) in self.edges(current) {
                let dep = dep.as_str();
                if seen.insert(dep) {
                    parents.insert(dep, current);
                    queue.push_back(dep);
                }
            }
        }
        None
    }

    /// Assign each predicate a stratum.
    ///
    /// A predicate sits at or above every predicate it depends on, and
    /// strictly above every predicate it negates.
    pub fn strata(&self) -> Result<BTreeMap<String, usize>> {
        if let Some(cycle) = self.negative_cycle() {
            return Err(DatalogError::Unstratified {
                cycle: cycle.join(" -> "),
            });
        }

        let mut strata: BTreeMap<String, usize> =
            self.predicates.iter().map(|p| (p.clone(), 0)).collect();
        let limit = self.predicates.len() + 1;

        for _ in 0..=limit {
            let mut changed = false;
            for (head, edges) in &self.dependencies {
                let mut level = strata.get(head).copied().unwrap_or(0);
                for (dep, polarity) in edges {
                    let dep_level = strata.get(dep).copied().unwrap_or(0);
                    let needed = match polarity {
                        Dependency::Positive => dep_level,
                        Dependency::Negative => dep_level + 1,
                    };
                    level = level.max(needed);
                }
                if strata.get(head) != Some(&level) {
                    strata.insert(head.clone(), level);
                    changed = true;
                }
            }
            if !changed {
                return Ok(strata);
            }
        }

        Err(DatalogError::Internal(
            "stratum assignment did not converge".to_string(),
        ))
    }
}
