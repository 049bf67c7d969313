//! Facts and links: the two immutable record shapes held by the store.

use serde::{Deserialize, Serialize};

use crate::Atom;

/// Reserved attribute naming an entity's logical type.
pub const TYPE_ATTRIBUTE: &str = "type";

/// An entity-attribute-value triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Free-form entity id, conventionally `"<type>:<localId>"`.
    pub entity: String,
    pub attribute: String,
    pub value: Atom,
}

impl Fact {
    pub fn new(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<Atom>,
    ) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// The `type` fact for an entity.
    pub fn type_of(entity: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self::new(entity, TYPE_ATTRIBUTE, Atom::String(entity_type.into()))
    }

    /// As a 3-tuple for the `attr` relation.
    pub fn to_tuple(&self) -> Vec<Atom> {
        vec![
            Atom::String(self.entity.clone()),
            Atom::String(self.attribute.clone()),
            self.value.clone(),
        ]
    }
}

/// A typed, directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub label: String,
    pub target: String,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        label: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            target: target.into(),
        }
    }

    /// As a 3-tuple for the `link` relation.
    pub fn to_tuple(&self) -> Vec<Atom> {
        vec![
            Atom::String(self.source.clone()),
            Atom::String(self.label.clone()),
            Atom::String(self.target.clone()),
        ]
    }
}

/// Type prefix of an entity id following the `"<type>:<localId>"` convention.
pub fn entity_type_prefix(entity: &str) -> Option<&str> {
    entity
        .split_once(':')
        .map(|(prefix, _)| prefix)
        .filter(|prefix| !prefix.is_empty())
}
