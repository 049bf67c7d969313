//! Derived per-attribute schema view.
//!
//! Catalog entries have no lifecycle of their own: each one is recomputed
//! from the attribute's current facts with a single scan.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::Atom;
use crate::atom::parse_timestamp;

/// Inferred type of an attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
}

/// Coarse cardinality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// A single distinct value.
    Constant,
    /// At most `low_cardinality_threshold` distinct values.
    Low,
    /// Many distinct values with repeats.
    High,
    /// Every non-null value is distinct.
    Unique,
}

/// Limits applied when building catalog entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Example values kept per attribute.
    pub max_examples: usize,
    /// Distinct values tracked before the count saturates.
    pub max_distinct: usize,
    /// Upper bound of the `Low` cardinality class.
    pub low_cardinality_threshold: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_examples: 5,
            max_distinct: 1000,
            low_cardinality_threshold: 10,
        }
    }
}

impl CatalogConfig {
    pub fn with_max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    pub fn with_max_distinct(mut self, max_distinct: usize) -> Self {
        self.max_distinct = max_distinct;
        self
    }
}

/// Schema and statistics for one attribute name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub attribute: String,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    /// Number of facts carrying this attribute, duplicates included.
    pub fact_count: usize,
    pub distinct_count: usize,
    /// True when `distinct_count` stopped at `max_distinct`.
    pub distinct_capped: bool,
    pub examples: Vec<Atom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Atom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Atom>,
}

/// Type a single value votes for, or `None` for nulls.
fn vote(value: &Atom) -> Option<ValueType> {
    match value {
        Atom::Null => None,
        Atom::Bool(_) => Some(ValueType::Boolean),
        Atom::Number(_) => Some(ValueType::Number),
        Atom::Timestamp(_) => Some(ValueType::Date),
        Atom::String(s) if parse_timestamp(s).is_some() => Some(ValueType::Date),
        Atom::String(_) => Some(ValueType::String),
    }
}

/// Build the catalog entry for `attribute` from its values.
pub(crate) fn build_entry<'a>(
    attribute: &str,
    values: impl IntoIterator<Item = &'a Atom>,
    config: &CatalogConfig,
) -> CatalogEntry {
    let mut votes: HashMap<ValueType, usize> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut distinct_capped = false;
    let mut examples = Vec::new();
    let mut fact_count = 0;
    let mut non_null = 0;
    let mut numeric: Vec<&Atom> = Vec::new();
    let mut dated: Vec<&Atom> = Vec::new();

    for value in values {
        fact_count += 1;
        let Some(kind) = vote(value) else {
            continue;
        };
        non_null += 1;
        *votes.entry(kind).or_default() += 1;

        match kind {
            ValueType::Number => numeric.push(value),
            ValueType::Date => dated.push(value),
            _ => {}
        }

        if seen.len() < config.max_distinct {
            let fresh = seen.insert(value.canonical());
            if fresh && examples.len() < config.max_examples {
                examples.push(value.clone());
            }
        } else if !seen.contains(&value.canonical()) {
            distinct_capped = true;
        }
    }

    let value_type = votes
        .iter()
        .max_by_key(|(kind, count)| (**count, std::cmp::Reverse(type_rank(**kind))))
        .filter(|(_, count)| **count * 2 > non_null)
        .map(|(kind, _)| *kind)
        .unwrap_or(ValueType::Mixed);

    let (min, max) = match value_type {
        ValueType::Number => extremes(&numeric, |a, b| {
            a.as_number()
                .unwrap_or_default()
                .total_cmp(&b.as_number().unwrap_or_default())
        }),
        ValueType::Date => extremes(&dated, |a, b| a.as_timestamp().cmp(&b.as_timestamp())),
        _ => (None, None),
    };

    let distinct_count = seen.len();
    let cardinality = if distinct_count <= 1 {
        Cardinality::Constant
    } else if !distinct_capped && distinct_count == non_null {
        Cardinality::Unique
    } else if distinct_count <= config.low_cardinality_threshold {
        Cardinality::Low
    } else {
        Cardinality::High
    };

    CatalogEntry {
        attribute: attribute.to_string(),
        value_type,
        cardinality,
        fact_count,
        distinct_count,
        distinct_capped,
        examples,
        min,
        max,
    }
}

/// Tie-break so vote ties resolve deterministically.
fn type_rank(kind: ValueType) -> u8 {
    match kind {
        ValueType::Number => 0,
        ValueType::Date => 1,
        ValueType::Boolean => 2,
        ValueType::String => 3,
        ValueType::Mixed => 4,
    }
}

fn extremes(
    values: &[&Atom],
    cmp: impl Fn(&Atom, &Atom) -> std::cmp::Ordering,
) -> (Option<Atom>, Option<Atom>) {
    let min = values.iter().min_by(|a, b| cmp(a, b)).map(|a| (*a).clone());
    let max = values.iter().max_by(|a, b| cmp(a, b)).map(|a| (*a).clone());
    (min, max)
}
