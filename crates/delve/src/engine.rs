//! The query engine: a fact store, registered rules, and EQL-S on top.

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use delve_datalog::{EvaluatorConfig, Evaluator, PlanSummary, Rule, parse_rules};
use delve_eqls::{CaseInsensitiveResolver, CompilerOptions, Direction, Processor};
use delve_store::{Atom, CatalogConfig, CatalogEntry, Fact, FactStore, Link, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{EngineError, Result};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub evaluator: EvaluatorConfig,
    pub catalog: CatalogConfig,
    pub compiler: CompilerOptions,
    /// Correct attribute names against the catalog before compiling.
    pub resolve_attributes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            catalog: CatalogConfig::default(),
            compiler: CompilerOptions::default(),
            resolve_attributes: true,
        }
    }
}

impl EngineConfig {
    pub fn with_evaluator(mut self, evaluator: EvaluatorConfig) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerOptions) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_resolve_attributes(mut self, resolve: bool) -> Self {
        self.resolve_attributes = resolve;
        self
    }
}

/// Rows produced by one EQL-S query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    /// Field texts in RETURN order.
    pub columns: Vec<String>,
    /// One map per distinct row, keyed by field text.
    pub rows: Vec<BTreeMap<String, Atom>>,
    pub execution_time_ms: f64,
    pub plan: PlanSummary,
    /// Attribute resolution notes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl QueryOutput {
    /// Values of one column, in row order.
    pub fn column(&self, field: &str) -> Vec<&Atom> {
        self.rows.iter().filter_map(|row| row.get(field)).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    serde_json::Value::Object(
                        row.iter()
                            .map(|(field, value)| (field.clone(), value.to_json()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// Owns a [`FactStore`] and an [`Evaluator`] and answers EQL-S queries.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    store: FactStore,
    evaluator: Evaluator,
    /// Catalog as of the last fact mutation; cleared by every `add_fact*`.
    catalog: OnceCell<Vec<CatalogEntry>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: FactStore::with_catalog_config(config.catalog.clone()),
            evaluator: Evaluator::new(config.evaluator.clone()),
            catalog: OnceCell::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn add_fact(&mut self, fact: Fact) {
        self.store.add_fact(fact);
        self.invalidate_catalog();
    }

    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        self.store.add_facts(facts);
        self.invalidate_catalog();
    }

    /// Links do not feed the catalog, so the cached catalog stays valid.
    pub fn add_link(&mut self, link: Link) {
        self.store.add_link(link);
    }

    pub fn add_links(&mut self, links: impl IntoIterator<Item = Link>) {
        self.store.add_links(links);
    }

    fn invalidate_catalog(&mut self) {
        if self.catalog.take().is_some() {
            trace!("catalog invalidated");
        }
    }

    fn cached_catalog(&self) -> &[CatalogEntry] {
        self.catalog.get_or_init(|| {
            debug!(facts = self.store.facts().len(), "rebuilding catalog");
            self.store.catalog()
        })
    }

    /// Register a rule. Rejected rules leave the rule set unchanged.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        self.evaluator.add_rule(rule)?;
        Ok(())
    }

    /// Parse and register every rule in `text`.
    ///
    /// Rules are added in order; on the first failure the rules before it
    /// stay registered.
    pub fn add_rule_text(&mut self, text: &str) -> Result<usize> {
        let rules = parse_rules(text)?;
        let count = rules.len();
        for rule in rules {
            self.evaluator.add_rule(rule)?;
        }
        info!(count, "rules registered");
        Ok(count)
    }

    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.cached_catalog().to_vec()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Run one EQL-S query.
    pub fn query(&self, text: &str) -> Result<QueryOutput> {
        let resolver = CaseInsensitiveResolver;
        let mut processor = Processor::new().with_options(self.config.compiler.clone());
        if self.config.resolve_attributes {
            processor = processor.with_resolver(&resolver, self.cached_catalog());
        }

        let processed = processor.process(text);
        let Some(compiled) = processed.query else {
            return Err(EngineError::Parse {
                source_code: text.to_string(),
                errors: processed.errors,
            });
        };

        let evaluated = self.evaluator.evaluate(&self.store, &compiled.query)?;

        let columns: Vec<String> = compiled.projection.fields().map(String::from).collect();
        let mut rows: Vec<(Atom, BTreeMap<String, Atom>)> = evaluated
            .bindings
            .iter()
            .map(|binding| {
                let row = compiled
                    .projection
                    .iter()
                    .map(|(field, var)| {
                        let value = binding.get(var).cloned().unwrap_or(Atom::Null);
                        (field.to_string(), value)
                    })
                    .collect();
                let key = compiled
                    .order_by
                    .as_ref()
                    .and_then(|order| binding.get(&order.variable).cloned())
                    .unwrap_or(Atom::Null);
                (key, row)
            })
            .collect();

        if let Some(order) = &compiled.order_by {
            rows.sort_by(|(a, _), (b, _)| order_rows(a, b, order.direction));
        }

        let mut seen = HashSet::new();
        let mut rows: Vec<BTreeMap<String, Atom>> = rows
            .into_iter()
            .map(|(_, row)| row)
            .filter(|row| {
                let key: Vec<String> = columns
                    .iter()
                    .map(|c| row.get(c).map(Atom::canonical).unwrap_or_default())
                    .collect();
                seen.insert(key)
            })
            .collect();
        if let Some(limit) = compiled.limit {
            rows.truncate(limit);
        }

        debug!(
            rows = rows.len(),
            elapsed_ms = evaluated.execution_time_ms,
            plan = %evaluated.plan,
            "query answered"
        );

        Ok(QueryOutput {
            columns,
            rows,
            execution_time_ms: evaluated.execution_time_ms,
            plan: evaluated.plan,
            warnings: processed.warnings,
        })
    }
}

/// Sort order for result rows: nulls last in both directions.
fn order_rows(a: &Atom, b: &Atom, direction: Direction) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            Direction::Asc => a.sort_cmp(b),
            Direction::Desc => b.sort_cmp(a),
        },
    }
}
