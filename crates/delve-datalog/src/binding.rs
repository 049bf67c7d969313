//! Variable bindings produced while solving goals.

use std::collections::BTreeMap;

use delve_store::Atom;
use serde::Serialize;

use crate::literal::Term;

/// A mapping from variable name (without sigil) to a value.
///
/// Backed by an ordered map so the canonical form is stable.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Binding(BTreeMap<String, Atom>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Atom> {
        self.0.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.0.contains_key(var)
    }

    pub fn insert(&mut self, var: impl Into<String>, value: Atom) {
        self.0.insert(var.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Atom)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value of a term under this binding: constants resolve to themselves,
    /// unbound variables to `None`.
    pub fn resolve<'a>(&'a self, term: &'a Term) -> Option<&'a Atom> {
        match term {
            Term::Const(atom) => Some(atom),
            Term::Var(name) => self.0.get(name),
        }
    }

    /// Bind `var` to `value` unless it is already bound to a different value.
    ///
    /// Returns false on conflict; the binding is left unchanged in that case.
    pub fn unify(&mut self, var: &str, value: &Atom) -> bool {
        match self.0.get(var) {
            Some(existing) => existing.canonical() == value.canonical(),
            None => {
                self.0.insert(var.to_string(), value.clone());
                true
            }
        }
    }

    /// Merge two bindings that agree on every shared variable.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        let mut merged = self.clone();
        for (var, value) in &other.0 {
            if !merged.unify(var, value) {
                return None;
            }
        }
        Some(merged)
    }

    /// Keep only the given variables. Unbound names are skipped.
    pub fn restrict<S: AsRef<str>>(&self, vars: &[S]) -> Binding {
        Binding(
            vars.iter()
                .filter_map(|var| {
                    let var = var.as_ref();
                    self.0.get(var).map(|v| (var.to_string(), v.clone()))
                })
                .collect(),
        )
    }

    /// Canonical text used to deduplicate bindings.
    pub fn canonical(&self) -> String {
        let mut key = String::new();
        for (var, value) in &self.0 {
            key.push_str(var);
            key.push('=');
            key.push_str(&value.canonical());
            key.push('\u{1e}');
        }
        key
    }

    pub fn into_inner(self) -> BTreeMap<String, Atom> {
        self.0
    }
}

impl FromIterator<(String, Atom)> for Binding {
    fn from_iter<I: IntoIterator<Item = (String, Atom)>>(iter: I) -> Self {
        Binding(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, Atom)]) -> Binding {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_agreeing() {
        let a = binding(&[("x", Atom::from(1))]);
        let b = binding(&[("x", Atom::from(1)), ("y", Atom::from("a"))]);
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_conflicting() {
        let a = binding(&[("x", Atom::from(1))]);
        let b = binding(&[("x", Atom::from(2))]);
        assert!(a.merge(&b).is_none());
    }

    #[test]
    fn test_unify_is_type_strict() {
        let mut b = binding(&[("x", Atom::from(1))]);
        assert!(!b.unify("x", &Atom::from("1")));
        assert!(b.unify("x", &Atom::from(1.0)));
    }

    #[test]
    fn test_restrict_and_canonical() {
        let b = binding(&[("x", Atom::from(1)), ("y", Atom::from("a"))]);
        let r = b.restrict(&["y", "missing"]);
        assert_eq!(r.len(), 1);
        assert_eq!(r.canonical(), "y=s:a\u{1e}");
    }

    #[test]
    fn test_resolve() {
        let b = binding(&[("x", Atom::from(1))]);
        assert_eq!(b.resolve(&Term::var("x")), Some(&Atom::from(1)));
        assert_eq!(b.resolve(&Term::var("y")), None);
        assert_eq!(b.resolve(&Term::constant("k")), Some(&Atom::from("k")));
    }
}
