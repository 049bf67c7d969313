//! Lowering EQL-S syntax trees to datalog queries.

use std::collections::HashMap;

use delve_datalog::{Goal, Literal, Predicate, Query, Term};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ast::{AttrRef, Condition, Direction, Expr, QueryAst};

/// How `OR` in a WHERE clause is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrMode {
    /// Both sides of `OR` are added to the same conjunction, exactly like
    /// `AND`.
    #[default]
    Conjunctive,
    /// `OR` becomes a union of independently solved branches.
    Disjunctive,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    pub or_mode: OrMode,
}

impl CompilerOptions {
    pub fn with_or_mode(mut self, or_mode: OrMode) -> Self {
        self.or_mode = or_mode;
        self
    }
}

/// Ordered mapping from user-facing field text (`?p.title`) to the
/// internal variable that carries its value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ProjectionMap {
    entries: Vec<(String, String)>,
}

impl ProjectionMap {
    fn insert(&mut self, field: String, variable: String) {
        if self.get(&field).is_none() {
            self.entries.push((field, variable));
        }
    }

    /// Internal variable for a user-facing field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Field texts in RETURN order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(f, _)| f.as_str())
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort key carried alongside a compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    /// Field text as written after `ORDER BY`.
    pub field: String,
    pub variable: String,
    pub direction: Direction,
}

/// A datalog query plus everything needed to shape its results.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: Query,
    pub projection: ProjectionMap,
    pub order_by: Option<OrderKey>,
    pub limit: Option<usize>,
    pub entity_type: String,
}

/// Compiles one [`QueryAst`] into a [`CompiledQuery`].
///
/// Internal variables are named with a `$` prefix, which the tokenizer
/// never produces, so they cannot collide with user variables.
#[derive(Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
    /// Attribute name as written -> attribute name to look up.
    aliases: HashMap<String, String>,
    temp_counter: usize,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Look attributes up under a different name than written.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn compile(&mut self, ast: &QueryAst) -> CompiledQuery {
        self.temp_counter = 0;
        let mut goals: Vec<Goal> = vec![
            Literal::attr(
                Term::var(&ast.var),
                Term::constant("type"),
                Term::constant(ast.entity_type.as_str()),
            )
            .into(),
        ];

        if let Some(expr) = &ast.where_clause {
            goals.extend(self.compile_expr(expr));
        }

        let mut returns: Vec<AttrRef> = if ast.returns.is_empty() {
            vec![AttrRef::var(&ast.var)]
        } else {
            ast.returns.clone()
        };
        if let Some(expr) = &ast.where_clause {
            for condition in expr.conditions() {
                if let Condition::Matches { attr, .. } = condition
                    && !returns.contains(attr)
                {
                    returns.push(attr.clone());
                }
            }
        }

        let mut projection = ProjectionMap::default();
        for attr in &returns {
            if projection.get(&attr.to_string()).is_some() {
                continue;
            }
            let variable = self.bind_output(attr, "o", &mut goals);
            projection.insert(attr.to_string(), variable);
        }

        let order_by = ast.order_by.as_ref().map(|order| {
            let field = order.attr.to_string();
            let variable = match projection.get(&field) {
                Some(variable) => variable.to_string(),
                None => self.bind_output(&order.attr, "s", &mut goals),
            };
            OrderKey {
                field,
                variable,
                direction: order.direction,
            }
        });

        let mut answer: Vec<String> = projection.variables().map(String::from).collect();
        if let Some(order) = &order_by
            && !answer.contains(&order.variable)
        {
            answer.push(order.variable.clone());
        }

        let query = Query::new(goals).with_answer(answer);
        trace!(query = %query, "compiled EQL-S query");

        CompiledQuery {
            query,
            projection,
            order_by,
            limit: ast.limit,
            entity_type: ast.entity_type.clone(),
        }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("${}{}", prefix, self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn attribute_name(&self, attr: &AttrRef) -> Option<String> {
        attr.attribute()
            .map(|name| self.aliases.get(&name).cloned().unwrap_or(name))
    }

    /// Variable holding the value of `attr`, adding an `attr` goal for
    /// dotted paths.
    fn bind_output(&mut self, attr: &AttrRef, prefix: &str, goals: &mut Vec<Goal>) -> String {
        match self.attribute_name(attr) {
            None => attr.var.clone(),
            Some(name) => {
                let variable = self.fresh(prefix);
                goals.push(
                    Literal::attr(
                        Term::var(&attr.var),
                        Term::constant(name),
                        Term::var(&variable),
                    )
                    .into(),
                );
                variable
            }
        }
    }

    fn compile_expr(&mut self, expr: &Expr) -> Vec<Goal> {
        match expr {
            Expr::And(left, right) => {
                let mut goals = self.compile_expr(left);
                goals.extend(self.compile_expr(right));
                goals
            }
            Expr::Or(left, right) => match self.options.or_mode {
                OrMode::Conjunctive => {
                    let mut goals = self.compile_expr(left);
                    goals.extend(self.compile_expr(right));
                    goals
                }
                OrMode::Disjunctive => {
                    let mut branches = Vec::new();
                    for side in [left, right] {
                        match side.as_ref() {
                            Expr::Or(..) => match self.compile_expr(side).pop() {
                                Some(Goal::Or(nested)) => branches.extend(nested),
                                Some(other) => branches.push(vec![other]),
                                None => {}
                            },
                            _ => branches.push(self.compile_expr(side)),
                        }
                    }
                    vec![Goal::Or(branches)]
                }
            },
            Expr::Condition(condition) => self.compile_condition(condition),
        }
    }

    /// Goals for one WHERE leaf: an optional `attr` lookup into a fresh
    /// temporary, then the built-in over it.
    fn compile_condition(&mut self, condition: &Condition) -> Vec<Goal> {
        if let Condition::Call { name, args } = condition {
            let terms = args.iter().map(|v| v.to_term()).collect();
            return vec![Literal::named(name, terms).into()];
        }

        let Some(attr) = condition.attr_ref() else {
            return Vec::new();
        };

        let mut goals = Vec::new();
        let subject = Term::var(self.bind_output(attr, "t", &mut goals));

        let filter = match condition {
            Condition::Compare { op, value, .. } => {
                Literal::compare(*op, subject, value.to_term())
            }
            Condition::Between { min, max, .. } => Literal::new(
                Predicate::Between,
                vec![subject, Term::constant(*min), Term::constant(*max)],
            ),
            Condition::Contains { text, .. } => Literal::new(
                Predicate::Contains,
                vec![subject, Term::constant(text.as_str())],
            ),
            Condition::Matches { body, flags, .. } => Literal::new(
                Predicate::Regex,
                vec![subject, Term::constant(format!("/{}/{}", body, flags))],
            ),
            Condition::In { value, .. } => {
                Literal::new(Predicate::In, vec![subject, value.to_term()])
            }
            Condition::Call { .. } => return goals,
        };
        goals.push(filter.into());
        goals
    }
}

/// Compile with default options and no attribute aliases.
pub fn compile(ast: &QueryAst) -> CompiledQuery {
    Compiler::new(CompilerOptions::default()).compile(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use delve_datalog::CompareOp;
    use pretty_assertions::assert_eq;

    fn compile_text(text: &str, options: CompilerOptions) -> CompiledQuery {
        let ast = parse(text).unwrap();
        Compiler::new(options).compile(&ast)
    }

    #[test]
    fn test_type_goal_first() {
        let compiled = compile_text("FIND post AS ?p", CompilerOptions::default());
        assert_eq!(compiled.query.to_string(), r#"attr(?p, "type", "post")"#);
        assert_eq!(compiled.projection.get("?p"), Some("p"));
        assert_eq!(compiled.query.answer, vec!["p"]);
    }

    #[test]
    fn test_where_leaf_uses_temp() {
        let compiled = compile_text(
            "FIND post AS ?p WHERE ?p.views > 1000 RETURN ?p",
            CompilerOptions::default(),
        );
        assert_eq!(
            compiled.query.goals[1..],
            [
                Goal::from(Literal::attr(
                    Term::var("p"),
                    Term::constant("views"),
                    Term::var("$t0")
                )),
                Goal::from(Literal::compare(
                    CompareOp::Gt,
                    Term::var("$t0"),
                    Term::constant(1000)
                )),
            ]
        );
    }

    #[test]
    fn test_return_paths_projected() {
        let compiled = compile_text(
            "FIND post AS ?p RETURN ?p.title, ?p.author.name, ?p",
            CompilerOptions::default(),
        );
        let fields: Vec<&str> = compiled.projection.fields().collect();
        assert_eq!(fields, vec!["?p.title", "?p.author.name", "?p"]);
        assert_eq!(compiled.projection.get("?p.author.name"), Some("$o1"));
        assert!(compiled.query.goals.contains(&Goal::from(Literal::attr(
            Term::var("p"),
            Term::constant("author.name"),
            Term::var("$o1")
        ))));
    }

    #[test]
    fn test_matches_path_added_to_return() {
        let compiled = compile_text(
            "FIND post AS ?p WHERE ?p.title MATCHES /rust/i RETURN ?p",
            CompilerOptions::default(),
        );
        let fields: Vec<&str> = compiled.projection.fields().collect();
        assert_eq!(fields, vec!["?p", "?p.title"]);
        assert!(compiled.query.goals.iter().any(|g| matches!(
            g,
            Goal::Literal(l) if l.predicate == Predicate::Regex
                && l.terms[1] == Term::constant("/rust/i")
        )));
    }

    #[test]
    fn test_or_conjunctive_by_default() {
        let compiled = compile_text(
            "FIND post AS ?p WHERE ?p.a = 1 OR ?p.b = 2",
            CompilerOptions::default(),
        );
        assert_eq!(compiled.query.goals.len(), 5);
        assert!(!compiled.query.goals.iter().any(|g| matches!(g, Goal::Or(_))));
    }

    #[test]
    fn test_or_disjunctive_flattens_branches() {
        let compiled = compile_text(
            "FIND post AS ?p WHERE ?p.a = 1 OR ?p.b = 2 OR ?p.c = 3",
            CompilerOptions::default().with_or_mode(OrMode::Disjunctive),
        );
        assert_eq!(compiled.query.goals.len(), 2);
        match &compiled.query.goals[1] {
            Goal::Or(branches) => {
                assert_eq!(branches.len(), 3);
                assert!(branches.iter().all(|b| b.len() == 2));
            }
            other => panic!("expected disjunction, got {}", other),
        }
    }

    #[test]
    fn test_order_by_hidden_goal() {
        let compiled = compile_text(
            "FIND post AS ?p RETURN ?p.title ORDER BY ?p.views DESC LIMIT 5",
            CompilerOptions::default(),
        );
        let order = compiled.order_by.unwrap();
        assert_eq!(order.field, "?p.views");
        assert_eq!(order.variable, "$s1");
        assert_eq!(order.direction, Direction::Desc);
        assert_eq!(compiled.limit, Some(5));
        assert_eq!(compiled.projection.len(), 1);
        assert_eq!(compiled.query.answer, vec!["$o0", "$s1"]);
    }

    #[test]
    fn test_order_by_returned_field_reuses_variable() {
        let compiled = compile_text(
            "FIND post AS ?p RETURN ?p.views ORDER BY ?p.views",
            CompilerOptions::default(),
        );
        assert_eq!(compiled.order_by.unwrap().variable, "$o0");
        assert_eq!(compiled.query.answer, vec!["$o0"]);
    }

    #[test]
    fn test_rule_call_compiles_to_derived_literal() {
        let compiled = compile_text(
            "FIND user AS ?u WHERE follow_reach(a, ?u)",
            CompilerOptions::default(),
        );
        assert_eq!(
            compiled.query.goals[1],
            Goal::from(Literal::derived(
                "follow_reach",
                vec![Term::constant("a"), Term::var("u")]
            ))
        );
    }

    #[test]
    fn test_aliases_change_lookup_not_projection() {
        let ast = parse("FIND post AS ?p RETURN ?p.Title").unwrap();
        let compiled = Compiler::new(CompilerOptions::default())
            .with_aliases(HashMap::from([("Title".to_string(), "title".to_string())]))
            .compile(&ast);
        assert_eq!(compiled.projection.get("?p.Title"), Some("$o0"));
        assert!(compiled.query.goals.contains(&Goal::from(Literal::attr(
            Term::var("p"),
            Term::constant("title"),
            Term::var("$o0")
        ))));
    }
}
