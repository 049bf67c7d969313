//! Left-to-right goal solving against a working set.

use std::collections::HashSet;

use delve_store::Atom;

use crate::binding::Binding;
use crate::builtins::{PatternCache, holds};
use crate::literal::{Goal, Literal, Predicate, Term};
use crate::working_set::{ATTR_RELATION, LINK_RELATION, WorkingSet};

/// Solves conjunctions of goals in source order, without join reordering.
pub(crate) struct Solver<'a> {
    working_set: &'a WorkingSet,
    patterns: &'a mut PatternCache,
}

impl<'a> Solver<'a> {
    pub(crate) fn new(working_set: &'a WorkingSet, patterns: &'a mut PatternCache) -> Self {
        Self {
            working_set,
            patterns,
        }
    }

    /// All extensions of `seed` satisfying every goal.
    pub(crate) fn solve(&mut self, goals: &[Goal], seed: Binding) -> Vec<Binding> {
        let mut current = vec![seed];
        for goal in goals {
            let mut next = Vec::new();
            for binding in &current {
                next.extend(self.solve_goal(goal, binding));
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }

    fn solve_goal(&mut self, goal: &Goal, binding: &Binding) -> Vec<Binding> {
        match goal {
            Goal::Literal(literal) if literal.predicate.is_relation() => {
                self.lookup(literal, binding)
            }
            Goal::Literal(literal) => {
                if holds(&literal.predicate, &literal.terms, binding, self.patterns) {
                    vec![binding.clone()]
                } else {
                    Vec::new()
                }
            }
            Goal::Not(inner) => {
                if self.solve_goal(inner, binding).is_empty() {
                    vec![binding.clone()]
                } else {
                    Vec::new()
                }
            }
            Goal::Or(branches) => {
                let mut seen = HashSet::new();
                let mut results = Vec::new();
                for branch in branches {
                    for solution in self.solve(branch, binding.clone()) {
                        if seen.insert(solution.canonical()) {
                            results.push(solution);
                        }
                    }
                }
                results
            }
        }
    }

    /// Match a relation literal against the working set, extending the
    /// binding with every unbound variable.
    fn lookup(&self, literal: &Literal, binding: &Binding) -> Vec<Binding> {
        let name = match &literal.predicate {
            Predicate::Attr => ATTR_RELATION,
            Predicate::Link => LINK_RELATION,
            Predicate::Derived(name) => name.as_str(),
            _ => return Vec::new(),
        };
        let Some(relation) = self.working_set.relation(name) else {
            return Vec::new();
        };

        let pattern: Vec<Option<&Atom>> = literal
            .terms
            .iter()
            .map(|term| binding.resolve(term))
            .collect();

        relation
            .matching(&pattern)
            .into_iter()
            .filter_map(|tuple| {
                let mut extended = binding.clone();
                for (term, value) in literal.terms.iter().zip(tuple) {
                    // Repeated variables must agree within one tuple.
                    if let Term::Var(var) = term
                        && !extended.unify(var, value)
                    {
                        return None;
                    }
                }
                Some(extended)
            })
            .collect()
    }
}
