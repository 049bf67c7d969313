//! A self-contained query step: JSON rows in, query output out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::engine::{Engine, EngineConfig, QueryOutput};
use crate::error::Result;
use crate::flatten::flatten_rows;

/// Runs one EQL-S query over a batch of rows.
///
/// Every run builds a fresh [`Engine`], so steps share no state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStep {
    /// Entity type the rows are loaded as.
    pub entity_type: String,
    pub query: String,
    /// Rule text registered before the query runs.
    #[serde(default)]
    pub rules: Option<String>,
    #[serde(default)]
    pub config: EngineConfig,
}

impl QueryStep {
    pub fn new(entity_type: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            query: query.into(),
            rules: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self, rows: &[Value]) -> Result<QueryOutput> {
        let mut engine = Engine::new(self.config.clone());
        engine.add_facts(flatten_rows(rows, &self.entity_type)?);
        if let Some(rules) = &self.rules {
            engine.add_rule_text(rules)?;
        }
        debug!(entity_type = %self.entity_type, rows = rows.len(), "running query step");
        engine.query(&self.query)
    }
}
