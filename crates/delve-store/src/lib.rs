//! In-memory EAV fact store for delve.
//!
//! This crate provides:
//! - [`Atom`]: the scalar value type shared by facts, tuples and bindings
//! - [`Fact`] and [`Link`]: entity-attribute-value triples and typed edges
//! - [`FactStore`]: append-only storage indexed by entity, attribute and value
//! - [`CatalogEntry`]: a per-attribute schema view inferred from current facts

mod atom;
pub mod catalog;
mod fact;
mod store;

pub use atom::{Atom, parse_timestamp, tuple_key};
pub use catalog::{Cardinality, CatalogConfig, CatalogEntry, ValueType};
pub use fact::{Fact, Link, TYPE_ATTRIBUTE, entity_type_prefix};
pub use store::{FactStore, StoreStats};
