//! The fact store: append-only facts and links with single-dimension indexes.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::catalog::{CatalogConfig, CatalogEntry, build_entry};
use crate::fact::{TYPE_ATTRIBUTE, entity_type_prefix};
use crate::{Atom, Fact, Link};

/// Summary counts over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub fact_count: usize,
    pub entity_count: usize,
    pub attribute_count: usize,
    pub link_count: usize,
}

/// In-memory EAV fact store.
///
/// Facts and links are appended and never removed. Duplicate triples are
/// accepted as-is; consumers that need set semantics deduplicate themselves.
/// Lookups on unknown keys return empty results.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: Vec<Fact>,
    links: Vec<Link>,

    /// Entity id -> fact positions.
    by_entity: HashMap<String, Vec<usize>>,
    /// Attribute name -> fact positions.
    by_attribute: HashMap<String, Vec<usize>>,
    /// (attribute, canonical value) -> fact positions.
    by_value: HashMap<(String, String), Vec<usize>>,

    /// Source entity -> link positions.
    links_by_source: HashMap<String, Vec<usize>>,
    /// Label -> link positions.
    links_by_label: HashMap<String, Vec<usize>>,

    catalog_config: CatalogConfig,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose catalog uses the given limits.
    pub fn with_catalog_config(catalog_config: CatalogConfig) -> Self {
        Self {
            catalog_config,
            ..Self::default()
        }
    }

    pub fn catalog_config(&self) -> &CatalogConfig {
        &self.catalog_config
    }

    /// Append one fact and index it.
    pub fn add_fact(&mut self, fact: Fact) {
        let pos = self.facts.len();
        self.by_entity
            .entry(fact.entity.clone())
            .or_default()
            .push(pos);
        self.by_attribute
            .entry(fact.attribute.clone())
            .or_default()
            .push(pos);
        self.by_value
            .entry((fact.attribute.clone(), fact.value.canonical()))
            .or_default()
            .push(pos);
        trace!(entity = %fact.entity, attribute = %fact.attribute, "fact added");
        self.facts.push(fact);
    }

    /// Append a batch of facts.
    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        let before = self.facts.len();
        for fact in facts {
            self.add_fact(fact);
        }
        debug!(
            added = self.facts.len() - before,
            total = self.facts.len(),
            "facts ingested"
        );
    }

    /// Append one link and index it.
    pub fn add_link(&mut self, link: Link) {
        let pos = self.links.len();
        self.links_by_source
            .entry(link.source.clone())
            .or_default()
            .push(pos);
        self.links_by_label
            .entry(link.label.clone())
            .or_default()
            .push(pos);
        self.links.push(link);
    }

    /// Append a batch of links.
    pub fn add_links(&mut self, links: impl IntoIterator<Item = Link>) {
        let before = self.links.len();
        for link in links {
            self.add_link(link);
        }
        debug!(
            added = self.links.len() - before,
            total = self.links.len(),
            "links ingested"
        );
    }

    /// All facts in insertion order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// All links in insertion order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.links.is_empty()
    }

    pub fn facts_by_entity(&self, entity: &str) -> Vec<&Fact> {
        self.collect_facts(self.by_entity.get(entity))
    }

    pub fn facts_by_attribute(&self, attribute: &str) -> Vec<&Fact> {
        self.collect_facts(self.by_attribute.get(attribute))
    }

    /// Facts whose attribute is `attribute` and whose value equals `value`.
    pub fn facts_by_value(&self, attribute: &str, value: &Atom) -> Vec<&Fact> {
        let key = (attribute.to_string(), value.canonical());
        self.collect_facts(self.by_value.get(&key))
    }

    pub fn links_from(&self, source: &str) -> Vec<&Link> {
        self.collect_links(self.links_by_source.get(source))
    }

    pub fn links_by_label(&self, label: &str) -> Vec<&Link> {
        self.collect_links(self.links_by_label.get(label))
    }

    /// Logical type of an entity: its `type` fact, else its id prefix.
    pub fn entity_type(&self, entity: &str) -> Option<String> {
        self.facts_by_entity(entity)
            .into_iter()
            .find(|fact| fact.attribute == TYPE_ATTRIBUTE)
            .map(|fact| fact.value.to_string())
            .or_else(|| entity_type_prefix(entity).map(String::from))
    }

    /// Distinct attribute names, sorted.
    pub fn attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_attribute.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Catalog entries for every attribute, sorted by attribute name.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        let grouped: BTreeMap<&str, &Vec<usize>> = self
            .by_attribute
            .iter()
            .map(|(name, positions)| (name.as_str(), positions))
            .collect();

        let entries: Vec<CatalogEntry> = grouped
            .into_iter()
            .map(|(name, positions)| {
                build_entry(
                    name,
                    positions.iter().map(|&pos| &self.facts[pos].value),
                    &self.catalog_config,
                )
            })
            .collect();

        debug!(attributes = entries.len(), "catalog computed");
        entries
    }

    /// Catalog entry for a single attribute, if any fact carries it.
    pub fn catalog_entry(&self, attribute: &str) -> Option<CatalogEntry> {
        let positions = self.by_attribute.get(attribute)?;
        Some(build_entry(
            attribute,
            positions.iter().map(|&pos| &self.facts[pos].value),
            &self.catalog_config,
        ))
    }

    pub fn stats(&self) -> StoreStats {
        let mut entities: HashSet<&str> = self.by_entity.keys().map(String::as_str).collect();
        for link in &self.links {
            entities.insert(&link.source);
            entities.insert(&link.target);
        }
        StoreStats {
            fact_count: self.facts.len(),
            entity_count: entities.len(),
            attribute_count: self.by_attribute.len(),
            link_count: self.links.len(),
        }
    }

    fn collect_facts(&self, positions: Option<&Vec<usize>>) -> Vec<&Fact> {
        positions
            .map(|positions| positions.iter().map(|&pos| &self.facts[pos]).collect())
            .unwrap_or_default()
    }

    fn collect_links(&self, positions: Option<&Vec<usize>>) -> Vec<&Link> {
        positions
            .map(|positions| positions.iter().map(|&pos| &self.links[pos]).collect())
            .unwrap_or_default()
    }
}
