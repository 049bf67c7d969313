//! EQL-S syntax tree.

use std::fmt;

use delve_datalog::{CompareOp, Term};
use delve_store::Atom;
use serde::Serialize;

/// `?var` optionally followed by a dotted attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttrRef {
    pub var: String,
    pub path: Vec<String>,
}

impl AttrRef {
    pub fn var(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            path: Vec::new(),
        }
    }

    pub fn path(var: impl Into<String>, path: &[&str]) -> Self {
        Self {
            var: var.into(),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_plain_var(&self) -> bool {
        self.path.is_empty()
    }

    /// Attribute name as stored in facts: path segments joined with `.`.
    pub fn attribute(&self) -> Option<String> {
        (!self.path.is_empty()).then(|| self.path.join("."))
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.var)?;
        for segment in &self.path {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// A literal operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Var(String),
}

impl Value {
    pub fn to_term(&self) -> Term {
        match self {
            Value::String(s) => Term::constant(s.as_str()),
            Value::Number(n) => Term::constant(*n),
            Value::Bool(b) => Term::constant(*b),
            Value::Null => Term::Const(Atom::Null),
            Value::Var(v) => Term::var(v),
        }
    }
}

/// A WHERE leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Compare {
        attr: AttrRef,
        op: CompareOp,
        value: Value,
    },
    Between {
        attr: AttrRef,
        min: f64,
        max: f64,
    },
    Contains {
        attr: AttrRef,
        text: String,
    },
    Matches {
        attr: AttrRef,
        body: String,
        flags: String,
    },
    In {
        attr: AttrRef,
        value: Value,
    },
    /// `name(arg, ...)`: a derived-predicate or built-in call.
    Call {
        name: String,
        args: Vec<Value>,
    },
}

impl Condition {
    /// The attribute a predicate leaf tests. Rule calls have none.
    pub fn attr_ref(&self) -> Option<&AttrRef> {
        match self {
            Condition::Compare { attr, .. }
            | Condition::Between { attr, .. }
            | Condition::Contains { attr, .. }
            | Condition::Matches { attr, .. }
            | Condition::In { attr, .. } => Some(attr),
            Condition::Call { .. } => None,
        }
    }
}

/// WHERE expression tree. Binary nodes are left-associative with no
/// precedence between AND and OR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Condition(Condition),
}

impl Expr {
    /// Leaves in source order.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect(out);
                r.collect(out);
            }
            Expr::Condition(c) => out.push(c),
        }
    }

    /// Attribute references of every leaf, in source order.
    pub fn attr_refs(&self) -> impl Iterator<Item = &AttrRef> {
        self.conditions().into_iter().filter_map(Condition::attr_ref)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub attr: AttrRef,
    pub direction: Direction,
}

/// A parsed `FIND ... AS ...` query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAst {
    pub entity_type: String,
    pub var: String,
    pub where_clause: Option<Expr>,
    pub returns: Vec<AttrRef>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl QueryAst {
    /// Every attribute reference: WHERE leaves, then RETURN, then ORDER BY.
    pub fn attr_refs(&self) -> impl Iterator<Item = &AttrRef> {
        self.where_clause
            .iter()
            .flat_map(Expr::attr_refs)
            .chain(&self.returns)
            .chain(self.order_by.iter().map(|order| &order.attr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_ref_display() {
        assert_eq!(AttrRef::path("p", &["author", "name"]).to_string(), "?p.author.name");
        assert_eq!(AttrRef::var("p").to_string(), "?p");
        assert_eq!(
            AttrRef::path("p", &["author", "name"]).attribute(),
            Some("author.name".to_string())
        );
        assert_eq!(AttrRef::var("p").attribute(), None);
    }

    #[test]
    fn test_conditions_in_order() {
        let leaf = |n: &str| {
            Expr::Condition(Condition::Contains {
                attr: AttrRef::path("p", &[n]),
                text: "x".to_string(),
            })
        };
        let expr = Expr::Or(
            Box::new(Expr::And(Box::new(leaf("a")), Box::new(leaf("b")))),
            Box::new(leaf("c")),
        );
        assert_eq!(expr.conditions().len(), 3);
        let paths: Vec<String> = expr.attr_refs().map(|a| a.to_string()).collect();
        assert_eq!(paths, vec!["?p.a", "?p.b", "?p.c"]);
    }

    #[test]
    fn test_query_attr_refs_cover_every_clause() {
        let ast = QueryAst {
            entity_type: "post".to_string(),
            var: "p".to_string(),
            where_clause: Some(Expr::Condition(Condition::Call {
                name: "seen".to_string(),
                args: vec![Value::Var("p".to_string())],
            })),
            returns: vec![AttrRef::path("p", &["title"])],
            order_by: Some(OrderBy {
                attr: AttrRef::path("p", &["views"]),
                direction: Direction::Desc,
            }),
            limit: None,
        };
        let paths: Vec<String> = ast.attr_refs().map(|a| a.to_string()).collect();
        assert_eq!(paths, vec!["?p.title", "?p.views"]);
    }
}
