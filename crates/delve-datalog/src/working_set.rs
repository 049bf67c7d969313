//! Relations materialized during evaluation.

use std::collections::{HashMap, HashSet};

use delve_store::{Atom, FactStore, tuple_key};
use tracing::debug;

/// Name of the base relation seeded from facts.
pub const ATTR_RELATION: &str = "attr";
/// Name of the base relation seeded from links.
pub const LINK_RELATION: &str = "link";

/// A set of tuples, deduplicated by canonical key, with one hash index per
/// column.
#[derive(Debug, Clone, Default)]
pub struct Relation {
    tuples: Vec<Vec<Atom>>,
    keys: HashSet<String>,
    /// Column position -> canonical value -> tuple positions.
    columns: Vec<HashMap<String, Vec<usize>>>,
}

impl Relation {
    /// Insert a tuple; returns false if it was already present.
    pub fn insert(&mut self, tuple: Vec<Atom>) -> bool {
        if !self.keys.insert(tuple_key(&tuple)) {
            return false;
        }
        let pos = self.tuples.len();
        if self.columns.len() < tuple.len() {
            self.columns.resize_with(tuple.len(), HashMap::new);
        }
        for (column, atom) in tuple.iter().enumerate() {
            self.columns[column]
                .entry(atom.canonical())
                .or_default()
                .push(pos);
        }
        self.tuples.push(tuple);
        true
    }

    pub fn contains(&self, tuple: &[Atom]) -> bool {
        self.keys.contains(&tuple_key(tuple))
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn tuples(&self) -> &[Vec<Atom>] {
        &self.tuples
    }

    /// Tuples matching a pattern, one entry per column (`None` = unbound).
    ///
    /// Only tuples of the pattern's arity are returned. The most selective
    /// bound column's index narrows the candidates; the remaining bound
    /// columns are checked per tuple.
    pub fn matching<'a>(&'a self, pattern: &[Option<&Atom>]) -> Vec<&'a [Atom]> {
        let bound: Vec<(usize, String)> = pattern
            .iter()
            .enumerate()
            .filter_map(|(column, atom)| atom.map(|a| (column, a.canonical())))
            .collect();

        let arity = pattern.len();
        let fits = |tuple: &[Atom]| {
            tuple.len() == arity
                && bound
                    .iter()
                    .all(|(column, key)| tuple[*column].canonical() == *key)
        };

        let narrowest = bound
            .iter()
            .map(|(column, key)| {
                self.columns
                    .get(*column)
                    .and_then(|index| index.get(key))
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            })
            .min_by_key(|positions| positions.len());

        match narrowest {
            Some(positions) => positions
                .iter()
                .map(|&pos| self.tuples[pos].as_slice())
                .filter(|tuple| fits(tuple))
                .collect(),
            None => self
                .tuples
                .iter()
                .map(Vec::as_slice)
                .filter(|tuple| tuple.len() == arity)
                .collect(),
        }
    }
}

/// Predicate name -> relation.
///
/// Holds the seeded base relations and everything derived by rules during
/// one evaluation. Owned by the caller of `Evaluator::evaluate_in`.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    relations: HashMap<String, Relation>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a working set seeded from the store.
    pub fn from_store(store: &FactStore) -> Self {
        let mut working_set = Self::new();
        working_set.seed(store);
        working_set
    }

    /// Clear every relation and load `attr` and `link` from the store.
    pub fn seed(&mut self, store: &FactStore) {
        self.relations.clear();

        let attr = self.relations.entry(ATTR_RELATION.to_string()).or_default();
        for fact in store.facts() {
            attr.insert(fact.to_tuple());
        }
        let attr_count = attr.len();

        let link = self.relations.entry(LINK_RELATION.to_string()).or_default();
        for l in store.links() {
            link.insert(l.to_tuple());
        }

        debug!(
            attr_tuples = attr_count,
            link_tuples = link.len(),
            "working set seeded"
        );
    }

    /// Insert a tuple into a relation, creating it if needed.
    pub fn insert(&mut self, relation: &str, tuple: Vec<Atom>) -> bool {
        self.relations
            .entry(relation.to_string())
            .or_default()
            .insert(tuple)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Tuples of a relation, empty when it does not exist.
    pub fn tuples(&self, name: &str) -> &[Vec<Atom>] {
        self.relations
            .get(name)
            .map(Relation::tuples)
            .unwrap_or(&[])
    }

    /// Total tuples across all relations, base relations included.
    pub fn tuple_count(&self) -> usize {
        self.relations.values().map(Relation::len).sum()
    }

    /// Tuples in relations other than `attr` and `link`.
    pub fn derived_count(&self) -> usize {
        self.relations
            .iter()
            .filter(|(name, _)| !matches!(name.as_str(), ATTR_RELATION | LINK_RELATION))
            .map(|(_, relation)| relation.len())
            .sum()
    }
}
