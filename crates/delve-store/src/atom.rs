//! Scalar values flowing through facts, tuples and bindings.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar value: string, number, boolean, timestamp or null.
///
/// Atoms compare by value. Numeric comparisons go through [`Atom::as_number`],
/// which also accepts numeric-looking strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Null,
    Bool(bool),
    Number(f64),
    /// Listed before `String` so RFC 3339 text deserializes as a timestamp.
    Timestamp(DateTime<Utc>),
    String(String),
}

impl Atom {
    /// Short name of the variant, used in diagnostics and the catalog.
    pub fn type_name(&self) -> &'static str {
        match self {
            Atom::Null => "null",
            Atom::Bool(_) => "boolean",
            Atom::Number(_) => "number",
            Atom::Timestamp(_) => "date",
            Atom::String(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Atom::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Atom::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the atom.
    ///
    /// Numbers pass through; strings are trimmed and parsed. Non-finite
    /// results (`"NaN"`, `"inf"`) are rejected so they never compare.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Atom::Number(n) if n.is_finite() => Some(*n),
            Atom::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Timestamp view of the atom: timestamps pass through, strings are parsed
    /// with [`parse_timestamp`]. Numbers are never treated as dates.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Atom::Timestamp(ts) => Some(*ts),
            Atom::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Canonical, type-tagged text form.
    ///
    /// Two atoms with the same canonical form are the same value; this is the
    /// key used to deduplicate tuples and bindings.
    pub fn canonical(&self) -> String {
        match self {
            Atom::Null => "null".to_string(),
            Atom::Bool(b) => format!("b:{}", b),
            Atom::Number(n) => format!("n:{}", format_number(*n)),
            Atom::Timestamp(ts) => format!("t:{}", ts.to_rfc3339()),
            Atom::String(s) => format!("s:{}", s),
        }
    }

    /// Ordering used for sorting result rows.
    ///
    /// A total order over sort classes: everything that coerces to a number
    /// (numeric strings included), then dates, then remaining strings, then
    /// booleans, then null. Classes never interleave; within a class values
    /// compare numerically, chronologically or lexically.
    pub fn sort_cmp(&self, other: &Atom) -> Ordering {
        match (self.sort_key(), other.sort_key()) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(&b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(&b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(&b),
            (a, b) => a.class().cmp(&b.class()),
        }
    }

    fn sort_key(&self) -> SortKey<'_> {
        if let Atom::Number(n) = self {
            return SortKey::Number(*n);
        }
        if let Some(n) = self.as_number() {
            return SortKey::Number(n);
        }
        if let Some(ts) = self.as_timestamp() {
            return SortKey::Date(ts);
        }
        match self {
            Atom::String(s) => SortKey::Text(s),
            Atom::Bool(b) => SortKey::Bool(*b),
            _ => SortKey::Null,
        }
    }

    /// Convert a scalar JSON value. Arrays and objects have no atom form.
    pub fn from_json(value: &serde_json::Value) -> Option<Atom> {
        match value {
            serde_json::Value::Null => Some(Atom::Null),
            serde_json::Value::Bool(b) => Some(Atom::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Atom::Number),
            serde_json::Value::String(s) => Some(Atom::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// JSON form used when rendering result rows.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Atom::Null => serde_json::Value::Null,
            Atom::Bool(b) => serde_json::Value::Bool(*b),
            Atom::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Atom::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Atom::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Sort class of an atom with its comparable payload.
enum SortKey<'a> {
    Number(f64),
    Date(DateTime<Utc>),
    Text(&'a str),
    Bool(bool),
    Null,
}

impl SortKey<'_> {
    fn class(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Date(_) => 1,
            SortKey::Text(_) => 2,
            SortKey::Bool(_) => 3,
            SortKey::Null => 4,
        }
    }
}

/// Render a number without a trailing `.0` when it is integral.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse a date or date-time string.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` (both read
/// as UTC) and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.len() < 8 {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Null => write!(f, "null"),
            Atom::Bool(b) => write!(f, "{}", b),
            Atom::Number(n) => write!(f, "{}", format_number(*n)),
            Atom::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Atom::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::String(s.to_string())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::String(s)
    }
}

impl From<f64> for Atom {
    fn from(n: f64) -> Self {
        Atom::Number(n)
    }
}

impl From<i64> for Atom {
    fn from(n: i64) -> Self {
        Atom::Number(n as f64)
    }
}

impl From<i32> for Atom {
    fn from(n: i32) -> Self {
        Atom::Number(f64::from(n))
    }
}

impl From<bool> for Atom {
    fn from(b: bool) -> Self {
        Atom::Bool(b)
    }
}

impl From<DateTime<Utc>> for Atom {
    fn from(ts: DateTime<Utc>) -> Self {
        Atom::Timestamp(ts)
    }
}

/// Canonical key of a tuple of atoms.
pub fn tuple_key(tuple: &[Atom]) -> String {
    let mut key = String::new();
    for (i, atom) in tuple.iter().enumerate() {
        if i > 0 {
            key.push('\u{1f}');
        }
        key.push_str(&atom.canonical());
    }
    key
}
