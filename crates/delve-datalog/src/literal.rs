//! Terms, literals, goals, rules and queries.

use std::collections::BTreeSet;
use std::fmt;

use delve_store::Atom;
use serde::Serialize;

/// A variable or a constant.
///
/// Variable names are stored without the `?` sigil; [`Term::var`] accepts
/// either form.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(String),
    Const(Atom),
}

impl Term {
    pub fn var(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Term::Var(name.strip_prefix('?').unwrap_or(name).to_string())
    }

    pub fn constant(value: impl Into<Atom>) -> Self {
        Term::Const(value.into())
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(name) => Some(name),
            Term::Const(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "?{}", name),
            Term::Const(Atom::String(s)) => write!(f, "{:?}", s),
            Term::Const(Atom::Timestamp(ts)) => write!(f, "{:?}", ts.to_rfc3339()),
            Term::Const(atom) => write!(f, "{}", atom),
        }
    }
}

/// Comparison operators shared by `gt`/`lt` and the symbolic forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
        }
    }
}

/// Predicate of a literal: a closed set of built-ins plus user-derived names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `attr(Entity, Attribute, Value)` over the fact store.
    Attr,
    /// `link(Source, Label, Target)` over the store's links.
    Link,
    Compare(CompareOp),
    /// `between(V, Min, Max)`, inclusive.
    Between,
    /// `in(V, Set)` where Set is a comma-separated list or a single value.
    In,
    Regex,
    Contains,
    /// `after(D1, D2)`: D1 strictly later than D2.
    After,
    /// `betweenDate(D, Start, End)`, inclusive.
    BetweenDate,
    /// Relation defined by registered rules.
    Derived(String),
}

impl Predicate {
    /// Resolve a predicate name; anything not built in is a derived relation.
    pub fn from_name(name: &str) -> Self {
        match name {
            "attr" => Predicate::Attr,
            "link" => Predicate::Link,
            "gt" | ">" => Predicate::Compare(CompareOp::Gt),
            "lt" | "<" => Predicate::Compare(CompareOp::Lt),
            "gte" | ">=" => Predicate::Compare(CompareOp::Gte),
            "lte" | "<=" => Predicate::Compare(CompareOp::Lte),
            "eq" | "=" | "==" => Predicate::Compare(CompareOp::Eq),
            "neq" | "!=" => Predicate::Compare(CompareOp::Neq),
            "between" => Predicate::Between,
            "in" => Predicate::In,
            "regex" => Predicate::Regex,
            "contains" => Predicate::Contains,
            "after" => Predicate::After,
            "betweenDate" => Predicate::BetweenDate,
            other => Predicate::Derived(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Predicate::Attr => "attr",
            Predicate::Link => "link",
            Predicate::Compare(op) => op.symbol(),
            Predicate::Between => "between",
            Predicate::In => "in",
            Predicate::Regex => "regex",
            Predicate::Contains => "contains",
            Predicate::After => "after",
            Predicate::BetweenDate => "betweenDate",
            Predicate::Derived(name) => name,
        }
    }

    /// Whether this predicate is looked up in a relation (and may bind variables).
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            Predicate::Attr | Predicate::Link | Predicate::Derived(_)
        )
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Predicate::Derived(_))
    }
}

/// A predicate applied to an ordered list of terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub predicate: Predicate,
    pub terms: Vec<Term>,
}

impl Literal {
    pub fn new(predicate: Predicate, terms: Vec<Term>) -> Self {
        Self { predicate, terms }
    }

    /// Build a literal from a predicate name, resolving built-ins.
    pub fn named(name: &str, terms: Vec<Term>) -> Self {
        Self::new(Predicate::from_name(name), terms)
    }

    pub fn attr(entity: Term, attribute: Term, value: Term) -> Self {
        Self::new(Predicate::Attr, vec![entity, attribute, value])
    }

    pub fn link(source: Term, label: Term, target: Term) -> Self {
        Self::new(Predicate::Link, vec![source, label, target])
    }

    pub fn compare(op: CompareOp, left: Term, right: Term) -> Self {
        Self::new(Predicate::Compare(op), vec![left, right])
    }

    pub fn derived(name: impl Into<String>, terms: Vec<Term>) -> Self {
        Self::new(Predicate::Derived(name.into()), terms)
    }

    /// Variable names appearing in this literal, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.terms
            .iter()
            .filter_map(Term::as_var)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate.name())?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", term)?;
        }
        write!(f, ")")
    }
}

/// One element of a query or rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    Literal(Literal),
    /// Succeeds, binding nothing, iff the inner goal has no solutions.
    Not(Box<Goal>),
    /// Union of independently evaluated conjunctive branches.
    Or(Vec<Vec<Goal>>),
}

impl Goal {
    pub fn not(goal: impl Into<Goal>) -> Self {
        Goal::Not(Box::new(goal.into()))
    }

    /// Variables this goal is guaranteed to bind when it succeeds.
    ///
    /// Relation lookups bind their variables; built-ins and negation bind
    /// nothing; a disjunction binds what every branch binds.
    pub fn bound_variables(&self) -> BTreeSet<String> {
        match self {
            Goal::Literal(lit) if lit.predicate.is_relation() => {
                lit.variables().into_iter().map(String::from).collect()
            }
            Goal::Literal(_) | Goal::Not(_) => BTreeSet::new(),
            Goal::Or(branches) => {
                let mut per_branch = branches.iter().map(|branch| {
                    branch
                        .iter()
                        .flat_map(Goal::bound_variables)
                        .collect::<BTreeSet<_>>()
                });
                let Some(first) = per_branch.next() else {
                    return BTreeSet::new();
                };
                per_branch.fold(first, |acc, vars| acc.intersection(&vars).cloned().collect())
            }
        }
    }

    /// Derived predicate names referenced by this goal, with whether each
    /// reference sits under a negation.
    pub fn derived_references(&self) -> Vec<(&str, bool)> {
        let mut refs = Vec::new();
        self.collect_references(false, &mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, negated: bool, refs: &mut Vec<(&'a str, bool)>) {
        match self {
            Goal::Literal(lit) => {
                if let Predicate::Derived(name) = &lit.predicate {
                    refs.push((name, negated));
                }
            }
            Goal::Not(inner) => inner.collect_references(true, refs),
            Goal::Or(branches) => {
                for goal in branches.iter().flatten() {
                    goal.collect_references(negated, refs);
                }
            }
        }
    }
}

impl From<Literal> for Goal {
    fn from(literal: Literal) -> Self {
        Goal::Literal(literal)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Literal(lit) => write!(f, "{}", lit),
            Goal::Not(inner) => write!(f, "not({})", inner),
            Goal::Or(branches) => {
                write!(f, "(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write_goals(f, branch)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_goals(f: &mut fmt::Formatter<'_>, goals: &[Goal]) -> fmt::Result {
    for (i, goal) in goals.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", goal)?;
    }
    Ok(())
}

/// A derived-predicate definition: `head :- body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub head: Literal,
    pub body: Vec<Goal>,
}

impl Rule {
    pub fn new(head: Literal, body: Vec<Goal>) -> Self {
        Self { head, body }
    }

    /// Name of the relation this rule derives into.
    pub fn head_name(&self) -> &str {
        self.head.predicate.name()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            write_goals(f, &self.body)?;
        }
        write!(f, ".")
    }
}

/// An ordered conjunction of goals plus the variables that form the answer.
///
/// Goal order is join order. An empty answer list means every variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub goals: Vec<Goal>,
    pub answer: Vec<String>,
}

impl Query {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self {
            goals,
            answer: Vec::new(),
        }
    }

    /// Restrict the answer to the given variables (sigils are stripped).
    pub fn with_answer<S: AsRef<str>>(mut self, vars: impl IntoIterator<Item = S>) -> Self {
        self.answer = vars
            .into_iter()
            .map(|v| {
                let v = v.as_ref();
                v.strip_prefix('?').unwrap_or(v).to_string()
            })
            .collect();
        self
    }

    /// Derived predicate names referenced anywhere in the goals.
    pub fn derived_predicates(&self) -> BTreeSet<String> {
        self.goals
            .iter()
            .flat_map(|goal| goal.derived_references())
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_goals(f, &self.goals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_strips_sigil() {
        assert_eq!(Term::var("?x"), Term::var("x"));
        assert_eq!(Term::var("?x").to_string(), "?x");
    }

    #[test]
    fn test_predicate_names_resolve() {
        assert_eq!(Predicate::from_name(">"), Predicate::Compare(CompareOp::Gt));
        assert_eq!(Predicate::from_name("gt"), Predicate::Compare(CompareOp::Gt));
        assert_eq!(Predicate::from_name("=="), Predicate::Compare(CompareOp::Eq));
        assert_eq!(Predicate::from_name("betweenDate"), Predicate::BetweenDate);
        assert_eq!(
            Predicate::from_name("follow_reach"),
            Predicate::Derived("follow_reach".to_string())
        );
    }

    #[test]
    fn test_literal_display() {
        let lit = Literal::attr(Term::var("p"), Term::constant("views"), Term::var("v"));
        assert_eq!(lit.to_string(), r#"attr(?p, "views", ?v)"#);
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::new(
            Literal::derived("unfeatured", vec![Term::var("p")]),
            vec![
                Literal::attr(Term::var("p"), Term::constant("type"), Term::constant("post"))
                    .into(),
                Goal::not(Literal::attr(
                    Term::var("p"),
                    Term::constant("label"),
                    Term::constant("featured"),
                )),
            ],
        );
        assert_eq!(
            rule.to_string(),
            r#"unfeatured(?p) :- attr(?p, "type", "post"), not(attr(?p, "label", "featured"))."#
        );
    }

    #[test]
    fn test_bound_variables() {
        let attr: Goal = Literal::attr(Term::var("p"), Term::constant("x"), Term::var("v")).into();
        let cmp: Goal = Literal::compare(CompareOp::Gt, Term::var("v"), Term::constant(1)).into();
        assert_eq!(
            attr.bound_variables().into_iter().collect::<Vec<_>>(),
            vec!["p", "v"]
        );
        assert!(cmp.bound_variables().is_empty());

        let or = Goal::Or(vec![
            vec![attr.clone()],
            vec![Literal::attr(Term::var("p"), Term::constant("y"), Term::var("w")).into()],
        ]);
        assert_eq!(
            or.bound_variables().into_iter().collect::<Vec<_>>(),
            vec!["p"]
        );
    }

    #[test]
    fn test_derived_references_track_negation() {
        let goal = Goal::not(Literal::derived("blocked", vec![Term::var("x")]));
        assert_eq!(goal.derived_references(), vec![("blocked", true)]);
    }

    #[test]
    fn test_query_answer_strips_sigils() {
        let query = Query::new(vec![]).with_answer(["?p", "v"]);
        assert_eq!(query.answer, vec!["p", "v"]);
    }
}
