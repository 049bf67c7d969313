//! Filter built-ins: comparisons, ranges, membership, text and date tests.
//!
//! Built-ins never bind variables. Every operand must already be bound;
//! unbound operands, the wrong number of terms, or operands of the wrong
//! type make the goal fail rather than error.

use std::collections::HashMap;

use delve_store::Atom;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::binding::Binding;
use crate::literal::{CompareOp, Predicate, Term};

/// A compiled text pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    /// Lower-cased needle for case-insensitive substring search.
    Substring(String),
}

impl Matcher {
    /// Compile `pattern`, which may be written as `/body/flags`.
    ///
    /// Flags `i`, `m`, `s` and `x` map to the regex options of the same
    /// name; `g` and `u` are accepted and ignored. A body that fails to
    /// compile degrades to a case-insensitive substring check.
    pub fn compile(pattern: &str) -> Self {
        let (body, flags) = split_delimited(pattern).unwrap_or((pattern, ""));

        let mut builder = RegexBuilder::new(body);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                _ => {}
            }
        }

        match builder.build() {
            Ok(re) => Matcher::Regex(re),
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "invalid regex, falling back to substring");
                Matcher::Substring(body.to_lowercase())
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Split `/body/flags` into its parts. Returns `None` when the text is not
/// slash-delimited or the suffix contains anything other than flag letters.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    flags
        .chars()
        .all(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'g' | 'u'))
        .then_some((body, flags))
}

/// Compiled patterns keyed by their source text, reused across goals.
#[derive(Debug, Default)]
pub struct PatternCache {
    matchers: HashMap<String, Matcher>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pattern: &str) -> &Matcher {
        self.matchers
            .entry(pattern.to_string())
            .or_insert_with(|| Matcher::compile(pattern))
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Evaluate a filter built-in under `binding`.
///
/// Relation predicates (`attr`, `link`, derived) are not filters and
/// always return false here.
pub fn holds(
    predicate: &Predicate,
    terms: &[Term],
    binding: &Binding,
    patterns: &mut PatternCache,
) -> bool {
    let mut args = Vec::with_capacity(terms.len());
    for term in terms {
        match binding.resolve(term) {
            Some(atom) => args.push(atom),
            None => return false,
        }
    }

    match (predicate, args.as_slice()) {
        (Predicate::Compare(op), [left, right]) => compare(*op, left, right),
        (Predicate::Between, [value, min, max]) => between(value, min, max),
        (Predicate::In, [value, set]) => member(value, set),
        (Predicate::Regex, [text, pattern]) => regex_match(text, pattern, patterns),
        (Predicate::Contains, [text, needle]) => contains(text, needle, patterns),
        (Predicate::After, [later, earlier]) => after(later, earlier),
        (Predicate::BetweenDate, [date, start, end]) => between_date(date, start, end),
        _ => false,
    }
}

/// Compare two atoms.
///
/// Ordering operators require both sides to coerce to numbers. `=` and `!=`
/// compare numerically when both sides coerce and fall back to atom
/// equality otherwise.
pub fn compare(op: CompareOp, left: &Atom, right: &Atom) -> bool {
    let numbers = left.as_number().zip(right.as_number());
    match op {
        CompareOp::Eq => equals(left, right),
        CompareOp::Neq => !equals(left, right),
        CompareOp::Gt => numbers.is_some_and(|(l, r)| l > r),
        CompareOp::Lt => numbers.is_some_and(|(l, r)| l < r),
        CompareOp::Gte => numbers.is_some_and(|(l, r)| l >= r),
        CompareOp::Lte => numbers.is_some_and(|(l, r)| l <= r),
    }
}

fn equals(left: &Atom, right: &Atom) -> bool {
    match left.as_number().zip(right.as_number()) {
        Some((l, r)) => l == r,
        None => left.canonical() == right.canonical(),
    }
}

/// Inclusive numeric range test.
pub fn between(value: &Atom, min: &Atom, max: &Atom) -> bool {
    match (value.as_number(), min.as_number(), max.as_number()) {
        (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
        _ => false,
    }
}

/// Membership in a comma-separated list of alternatives.
///
/// A string set is split on commas and each trimmed alternative is
/// compared with `=` semantics. Any other atom is a one-element set.
pub fn member(value: &Atom, set: &Atom) -> bool {
    match set {
        Atom::String(alternatives) => alternatives
            .split(',')
            .map(str::trim)
            .any(|alt| equals(value, &Atom::from(alt))),
        other => equals(value, other),
    }
}

/// Text view used by the string built-ins. Null has none.
fn text_of(atom: &Atom) -> Option<String> {
    match atom {
        Atom::Null => None,
        Atom::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn regex_match(text: &Atom, pattern: &Atom, patterns: &mut PatternCache) -> bool {
    let (Some(text), Some(pattern)) = (text_of(text), pattern.as_str()) else {
        return false;
    };
    patterns.get(pattern).is_match(&text)
}

/// Case-insensitive substring test. A `/body/flags` needle is treated as a
/// pattern.
fn contains(text: &Atom, needle: &Atom, patterns: &mut PatternCache) -> bool {
    let (Some(text), Some(needle)) = (text_of(text), needle.as_str()) else {
        return false;
    };
    if split_delimited(needle).is_some() {
        return patterns.get(needle).is_match(&text);
    }
    text.to_lowercase().contains(&needle.to_lowercase())
}

/// `later` is strictly after `earlier`.
pub fn after(later: &Atom, earlier: &Atom) -> bool {
    match (later.as_timestamp(), earlier.as_timestamp()) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// Inclusive date range test.
pub fn between_date(date: &Atom, start: &Atom, end: &Atom) -> bool {
    match (date.as_timestamp(), start.as_timestamp(), end.as_timestamp()) {
        (Some(d), Some(s), Some(e)) => s <= d && d <= e,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(predicate: Predicate, args: &[Atom]) -> bool {
        let terms: Vec<Term> = args.iter().cloned().map(Term::Const).collect();
        holds(&predicate, &terms, &Binding::new(), &mut PatternCache::new())
    }

    #[test]
    fn test_numeric_comparison_coerces_strings() {
        assert!(compare(CompareOp::Gt, &Atom::from("1500"), &Atom::from(1000)));
        assert!(compare(CompareOp::Lte, &Atom::from(3), &Atom::from(" 3 ")));
        assert!(!compare(CompareOp::Gt, &Atom::from("abc"), &Atom::from(1)));
        assert!(!compare(CompareOp::Lt, &Atom::Null, &Atom::from(1)));
    }

    #[test]
    fn test_equality_falls_back_to_atoms() {
        assert!(compare(CompareOp::Eq, &Atom::from("10"), &Atom::from(10)));
        assert!(compare(CompareOp::Eq, &Atom::from("Ada"), &Atom::from("Ada")));
        assert!(!compare(CompareOp::Eq, &Atom::from("Ada"), &Atom::from("ada")));
        assert!(compare(CompareOp::Neq, &Atom::from("a"), &Atom::from("b")));
        assert!(compare(CompareOp::Eq, &Atom::Bool(true), &Atom::Bool(true)));
    }

    #[test]
    fn test_between_inclusive() {
        assert!(between(&Atom::from(100), &Atom::from(100), &Atom::from(500)));
        assert!(between(&Atom::from(500), &Atom::from(100), &Atom::from(500)));
        assert!(!between(&Atom::from(99), &Atom::from(100), &Atom::from(500)));
        assert!(!between(&Atom::from("x"), &Atom::from(100), &Atom::from(500)));
    }

    #[test]
    fn test_member() {
        assert!(member(&Atom::from("b"), &Atom::from("a, b,c")));
        assert!(member(&Atom::from(2), &Atom::from("1,2,3")));
        assert!(!member(&Atom::from("d"), &Atom::from("a,b,c")));
        assert!(member(&Atom::from(7), &Atom::from(7)));
    }

    #[test]
    fn test_regex_with_flags() {
        assert!(check(
            Predicate::Regex,
            &[Atom::from("Hello World"), Atom::from("/^hello/i")]
        ));
        assert!(!check(
            Predicate::Regex,
            &[Atom::from("Hello World"), Atom::from("/^hello/")]
        ));
        assert!(check(
            Predicate::Regex,
            &[Atom::from("abc123"), Atom::from("[0-9]+")]
        ));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_substring() {
        assert!(check(
            Predicate::Regex,
            &[Atom::from("price (USD"), Atom::from("/(usd/")]
        ));
        assert!(!check(
            Predicate::Regex,
            &[Atom::from("price"), Atom::from("(usd")]
        ));
    }

    #[test]
    fn test_contains_case_insensitive() {
        assert!(check(
            Predicate::Contains,
            &[Atom::from("Rust Datalog"), Atom::from("datalog")]
        ));
        assert!(check(
            Predicate::Contains,
            &[Atom::from("Rust Datalog"), Atom::from("/dat.log/i")]
        ));
        assert!(!check(
            Predicate::Contains,
            &[Atom::Null, Atom::from("x")]
        ));
    }

    #[test]
    fn test_dates() {
        assert!(after(&Atom::from("2024-03-02"), &Atom::from("2024-03-01")));
        assert!(!after(&Atom::from("2024-03-01"), &Atom::from("2024-03-01")));
        assert!(!after(&Atom::from(20240302), &Atom::from("2024-03-01")));
        assert!(between_date(
            &Atom::from("2024-03-01T10:00:00Z"),
            &Atom::from("2024-03-01"),
            &Atom::from("2024-03-31"),
        ));
    }

    #[test]
    fn test_wrong_arity_and_unbound_fail() {
        assert!(!check(Predicate::Between, &[Atom::from(1), Atom::from(2)]));
        let terms = vec![Term::var("x"), Term::constant(1)];
        assert!(!holds(
            &Predicate::Compare(CompareOp::Gt),
            &terms,
            &Binding::new(),
            &mut PatternCache::new()
        ));
    }

    #[test]
    fn test_pattern_cache_reuses_entries() {
        let mut cache = PatternCache::new();
        cache.get("/a/i");
        cache.get("/a/i");
        cache.get("b");
        assert_eq!(cache.len(), 2);
    }
}
