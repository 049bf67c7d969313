//! Textual rule and goal syntax.
//!
//! ```text
//! rule   := literal [":-" goals] "."
//! goals  := goal ("," goal)*
//! goal   := "not" "(" goal ")" | "(" goals (";" goals)+ ")"
//!         | term CompOp term | literal
//! literal:= name "(" [term ("," term)*] ")"
//! term   := ?var | "string" | number | true | false | null | bare-identifier
//! ```
//!
//! Bare identifiers in term position are string constants. `%` starts a
//! comment that runs to the end of the line.

use delve_store::Atom;

use crate::error::{DatalogError, Result};
use crate::literal::{CompareOp, Goal, Literal, Predicate, Rule, Term};

/// Parse a single rule such as
/// `reach(?x, ?y) :- link(?x, "FOLLOWS", ?z), reach(?z, ?y).`
pub fn parse_rule(text: &str) -> Result<Rule> {
    let mut parser = Parser::new(text);
    let rule = parser.rule()?;
    parser.expect_end()?;
    Ok(rule)
}

/// Parse every rule in a multi-rule program.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    let mut parser = Parser::new(text);
    let mut rules = Vec::new();
    loop {
        parser.skip_ws();
        if parser.at_end() {
            return Ok(rules);
        }
        rules.push(parser.rule()?);
    }
}

/// Parse a comma-separated goal list; a trailing `.` is optional.
pub fn parse_goals(text: &str) -> Result<Vec<Goal>> {
    let mut parser = Parser::new(text);
    let goals = parser.goals()?;
    parser.skip_ws();
    parser.eat('.');
    parser.expect_end()?;
    Ok(goals)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '%' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", expected)))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn error(&self, message: impl Into<String>) -> DatalogError {
        let found = match self.peek() {
            Some(c) => format!(", found `{}`", c),
            None => ", found end of input".to_string(),
        };
        DatalogError::syntax(self.pos, format!("{}{}", message.into(), found))
    }

    fn rule(&mut self) -> Result<Rule> {
        self.skip_ws();
        let head = self.literal()?;
        self.skip_ws();
        let body = if self.eat_str(":-") {
            self.goals()?
        } else {
            Vec::new()
        };
        self.expect('.')?;
        Ok(Rule::new(head, body))
    }

    fn goals(&mut self) -> Result<Vec<Goal>> {
        let mut goals = vec![self.goal()?];
        loop {
            self.skip_ws();
            if !self.eat(',') {
                return Ok(goals);
            }
            goals.push(self.goal()?);
        }
    }

    fn goal(&mut self) -> Result<Goal> {
        self.skip_ws();

        if self.peek() == Some('(') {
            self.bump();
            let mut branches = vec![self.goals()?];
            loop {
                self.skip_ws();
                if self.eat(';') {
                    branches.push(self.goals()?);
                } else {
                    break;
                }
            }
            self.expect(')')?;
            return Ok(if branches.len() == 1 {
                let mut only = branches.remove(0);
                if only.len() == 1 {
                    only.remove(0)
                } else {
                    Goal::Or(vec![only])
                }
            } else {
                Goal::Or(branches)
            });
        }

        let start = self.pos;
        if let Some(name) = self.identifier() {
            self.skip_ws();
            if self.peek() == Some('(') {
                if name == "not" {
                    self.bump();
                    let inner = self.goal()?;
                    self.expect(')')?;
                    return Ok(Goal::not(inner));
                }
                return self.literal_args(name).map(Goal::from);
            }
            // Not a call: rewind and read an infix comparison.
            self.pos = start;
        }

        let left = self.term()?;
        self.skip_ws();
        let op = self
            .compare_op()
            .ok_or_else(|| self.error("expected a comparison operator"))?;
        let right = self.term()?;
        Ok(Literal::compare(op, left, right).into())
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        for (text, op) in [
            (">=", CompareOp::Gte),
            ("<=", CompareOp::Lte),
            ("!=", CompareOp::Neq),
            ("==", CompareOp::Eq),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
            ("=", CompareOp::Eq),
        ] {
            if self.eat_str(text) {
                return Some(op);
            }
        }
        None
    }

    fn literal(&mut self) -> Result<Literal> {
        self.skip_ws();
        let name = self
            .identifier()
            .ok_or_else(|| self.error("expected a predicate name"))?;
        self.literal_args(name)
    }

    fn literal_args(&mut self, name: &str) -> Result<Literal> {
        self.expect('(')?;
        let mut terms = Vec::new();
        self.skip_ws();
        if !self.eat(')') {
            loop {
                terms.push(self.term()?);
                self.skip_ws();
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }
        Ok(Literal::new(Predicate::from_name(name), terms))
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_alphabetic() || c == '_' => {}
            _ => return None,
        }
        let end = chars
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        Some(&rest[..end])
    }

    fn term(&mut self) -> Result<Term> {
        self.skip_ws();
        match self.peek() {
            Some('?') => {
                self.bump();
                let name = self
                    .identifier()
                    .ok_or_else(|| self.error("expected a variable name after `?`"))?;
                Ok(Term::var(name))
            }
            Some('"') => self.string().map(Term::constant),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number().map(Term::constant),
            Some(_) => {
                let word = self
                    .identifier()
                    .ok_or_else(|| self.error("expected a term"))?;
                Ok(Term::Const(match word {
                    "true" => Atom::Bool(true),
                    "false" => Atom::Bool(false),
                    "null" => Atom::Null,
                    other => Atom::from(other),
                }))
            }
            None => Err(self.error("expected a term")),
        }
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(DatalogError::syntax(start, "unterminated string literal"))
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let rest = self.rest();
        if rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map_err(|_| DatalogError::syntax(start, format!("invalid number `{}`", text)))
    }
}
