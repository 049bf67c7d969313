//! Recursive-descent EQL-S parser.
//!
//! One token of lookahead. The first structural error aborts parsing;
//! tokenizer errors are collected separately by [`parse`] and reported all
//! at once before the parser runs.

use tracing::debug;

use crate::ast::{AttrRef, Condition, Direction, Expr, OrderBy, QueryAst, Value};
use crate::error::ParseError;
use crate::lexer::tokenize;
use crate::token::{Keyword, Token, TokenKind};

/// Tokenize and parse EQL-S text.
///
/// Returns every tokenizer error if there are any, otherwise the single
/// parser error that stopped parsing.
pub fn parse(source: &str) -> Result<QueryAst, Vec<ParseError>> {
    let (tokens, errors) = tokenize(source);
    if !errors.is_empty() {
        debug!(errors = errors.len(), "tokenizer errors");
        return Err(errors);
    }
    Parser::new(tokens).query().map_err(|e| vec![e])
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = Result<T, ParseError>;

impl Parser {
    /// `tokens` must end with an `Eof` token, as produced by [`tokenize`].
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).or_else(|| self.tokens.last())
    }

    fn current_kind(&self) -> &TokenKind {
        self.current().map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>, expected: &[&str]) -> ParseError {
        let found = self.current_kind().describe();
        let message = format!("{}, found {}", message.into(), found);
        let expected = expected.iter().map(|s| s.to_string()).collect();
        let error = match self.current() {
            Some(token) => ParseError::new(
                token.line,
                token.column,
                token.offset,
                token.text.len().max(1),
                message,
            ),
            None => ParseError::new(1, 1, 0, 1, message),
        };
        error.with_expected(expected)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword), &[keyword.as_str()]))
        }
    }

    fn expect_var(&mut self) -> ParseResult<String> {
        if let TokenKind::Var(name) = self.current_kind() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.error("expected a variable", &["variable"]))
        }
    }

    /// An identifier; keywords are accepted by their source text so that
    /// attributes like `order` or `in` stay addressable.
    fn expect_name(&mut self, what: &str) -> ParseResult<String> {
        match self.current() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            Some(Token {
                kind: TokenKind::Keyword(_),
                text,
                ..
            }) => {
                let name = text.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what), &["identifier"])),
        }
    }

    fn expect_number(&mut self) -> ParseResult<f64> {
        if let TokenKind::Number(n) = self.current_kind() {
            let n = *n;
            self.pos += 1;
            Ok(n)
        } else {
            Err(self.error("expected a number", &["number"]))
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<()> {
        if *self.current_kind() == kind {
            self.pos += 1;
            Ok(())
        } else {
            let wanted = kind.describe();
            Err(self.error(format!("expected {}", wanted), &[wanted.as_str()]))
        }
    }

    /// `FIND Ident AS Var [WHERE ...] [RETURN ...] [ORDER BY ...] [LIMIT n]`
    pub fn query(&mut self) -> ParseResult<QueryAst> {
        self.expect_keyword(Keyword::Find)?;
        let entity_type = self.expect_name("an entity type")?;
        self.expect_keyword(Keyword::As)?;
        let var = self.expect_var()?;

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.expr()?)
        } else {
            None
        };

        let mut returns = Vec::new();
        if self.eat_keyword(Keyword::Return) {
            returns.push(self.attr_ref()?);
            while *self.current_kind() == TokenKind::Comma {
                self.pos += 1;
                returns.push(self.attr_ref()?);
            }
        }

        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            let attr = self.attr_ref()?;
            let direction = if self.eat_keyword(Keyword::Desc) {
                Direction::Desc
            } else {
                self.eat_keyword(Keyword::Asc);
                Direction::Asc
            };
            Some(OrderBy { attr, direction })
        } else {
            None
        };

        let limit = if self.eat_keyword(Keyword::Limit) {
            let n = self.expect_number()?;
            if n < 0.0 || n.fract() != 0.0 {
                self.pos -= 1;
                return Err(self.error("LIMIT must be a non-negative integer", &["number"]));
            }
            Some(n as usize)
        } else {
            None
        };

        if *self.current_kind() != TokenKind::Eof {
            return Err(self.error(
                "unexpected token after query",
                &["WHERE", "RETURN", "ORDER", "LIMIT", "end of input"],
            ));
        }

        Ok(QueryAst {
            entity_type,
            var,
            where_clause,
            returns,
            order_by,
            limit,
        })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.term()?;
        loop {
            if self.eat_keyword(Keyword::And) {
                let right = self.term()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else if self.eat_keyword(Keyword::Or) {
                let right = self.term()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        match self.current_kind() {
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(_) => self.call().map(Expr::Condition),
            TokenKind::Var(_) => self.predicate().map(Expr::Condition),
            _ => Err(self.error(
                "expected a condition",
                &["`(`", "variable", "identifier"],
            )),
        }
    }

    fn call(&mut self) -> ParseResult<Condition> {
        let name = self.expect_name("a rule name")?;
        self.expect(TokenKind::LParen)?;
        let mut args = vec![self.value(true)?];
        while *self.current_kind() == TokenKind::Comma {
            self.pos += 1;
            args.push(self.value(true)?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(Condition::Call { name, args })
    }

    fn predicate(&mut self) -> ParseResult<Condition> {
        let attr = self.attr_ref()?;

        if let TokenKind::Op(op) = self.current_kind() {
            let op = *op;
            self.pos += 1;
            let value = self.value(false)?;
            return Ok(Condition::Compare { attr, op, value });
        }

        if self.eat_keyword(Keyword::Between) {
            let min = self.expect_number()?;
            self.expect_keyword(Keyword::And)?;
            let max = self.expect_number()?;
            return Ok(Condition::Between { attr, min, max });
        }

        if self.eat_keyword(Keyword::Contains) {
            return match self.advance() {
                Some(Token {
                    kind: TokenKind::String(text),
                    ..
                }) => Ok(Condition::Contains { attr, text }),
                _ => {
                    self.pos -= 1;
                    Err(self.error("expected a string after CONTAINS", &["string"]))
                }
            };
        }

        if self.eat_keyword(Keyword::Matches) {
            return match self.advance() {
                Some(Token {
                    kind: TokenKind::Regex { body, flags },
                    ..
                }) => Ok(Condition::Matches { attr, body, flags }),
                Some(Token {
                    kind: TokenKind::String(body),
                    ..
                }) => Ok(Condition::Matches {
                    attr,
                    body,
                    flags: String::new(),
                }),
                _ => {
                    self.pos -= 1;
                    Err(self.error("expected a regex after MATCHES", &["regex"]))
                }
            };
        }

        if self.eat_keyword(Keyword::In) {
            let value = self.value(false)?;
            return Ok(Condition::In { attr, value });
        }

        Err(self.error(
            "expected an operator",
            &["comparison", "BETWEEN", "CONTAINS", "MATCHES", "IN"],
        ))
    }

    fn attr_ref(&mut self) -> ParseResult<AttrRef> {
        let var = self.expect_var()?;
        let mut path = Vec::new();
        while *self.current_kind() == TokenKind::Dot {
            self.pos += 1;
            path.push(self.expect_name("an attribute name")?);
        }
        Ok(AttrRef { var, path })
    }

    /// A literal or variable. Rule-call arguments also accept bare
    /// identifiers as string constants.
    fn value(&mut self, allow_ident: bool) -> ParseResult<Value> {
        let value = match self.current_kind() {
            TokenKind::String(s) => Value::String(s.clone()),
            TokenKind::Number(n) => Value::Number(*n),
            TokenKind::Keyword(Keyword::True) => Value::Bool(true),
            TokenKind::Keyword(Keyword::False) => Value::Bool(false),
            TokenKind::Keyword(Keyword::Null) => Value::Null,
            TokenKind::Var(v) => Value::Var(v.clone()),
            TokenKind::Ident(s) if allow_ident => Value::String(s.clone()),
            _ => {
                return Err(self.error(
                    "expected a value",
                    &["string", "number", "TRUE", "FALSE", "NULL", "variable"],
                ));
            }
        };
        self.pos += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_datalog::CompareOp;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> QueryAst {
        match parse(source) {
            Ok(ast) => ast,
            Err(errors) => panic!("parse failed: {:?}", errors),
        }
    }

    #[test]
    fn test_minimal_query() {
        let ast = parse_ok("FIND post AS ?p");
        assert_eq!(ast.entity_type, "post");
        assert_eq!(ast.var, "p");
        assert!(ast.where_clause.is_none());
        assert!(ast.returns.is_empty());
    }

    #[test]
    fn test_full_query() {
        let ast = parse_ok(
            "find post as ?p\n\
             where ?p.views > 1000 and ?p.title contains \"rust\"\n\
             return ?p.title, ?p.author.name\n\
             order by ?p.views desc\n\
             limit 10",
        );
        assert_eq!(ast.returns.len(), 2);
        assert_eq!(ast.returns[1], AttrRef::path("p", &["author", "name"]));
        assert_eq!(
            ast.order_by,
            Some(OrderBy {
                attr: AttrRef::path("p", &["views"]),
                direction: Direction::Desc
            })
        );
        assert_eq!(ast.limit, Some(10));
        let conditions = ast.where_clause.as_ref().unwrap().conditions();
        assert_eq!(
            conditions[0],
            &Condition::Compare {
                attr: AttrRef::path("p", &["views"]),
                op: CompareOp::Gt,
                value: Value::Number(1000.0),
            }
        );
    }

    #[test]
    fn test_left_associative_and_or() {
        let ast = parse_ok("FIND t AS ?t WHERE ?t.a = 1 AND ?t.b = 2 OR ?t.c = 3");
        assert!(matches!(ast.where_clause, Some(Expr::Or(ref l, _)) if matches!(**l, Expr::And(_, _))));
    }

    #[test]
    fn test_parenthesized_and_call() {
        let ast = parse_ok("FIND user AS ?u WHERE (follow_reach(alice, ?u) OR ?u.name IN \"a,b\")");
        let conditions = ast.where_clause.as_ref().unwrap().conditions();
        assert_eq!(
            conditions[0],
            &Condition::Call {
                name: "follow_reach".to_string(),
                args: vec![Value::String("alice".to_string()), Value::Var("u".to_string())],
            }
        );
    }

    #[test]
    fn test_keyword_as_attribute_name() {
        let ast = parse_ok("FIND item AS ?i RETURN ?i.order, ?i.In");
        assert_eq!(ast.returns[0].path, vec!["order"]);
        assert_eq!(ast.returns[1].path, vec!["In"]);
    }

    #[test]
    fn test_matches_regex() {
        let ast = parse_ok("FIND post AS ?p WHERE ?p.title MATCHES /^rust/i");
        assert_eq!(
            ast.where_clause.unwrap().conditions()[0],
            &Condition::Matches {
                attr: AttrRef::path("p", &["title"]),
                body: "^rust".to_string(),
                flags: "i".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_right_operand() {
        let errors = parse("FIND post AS ?p WHERE ?p.views >").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, 33);
        assert!(errors[0].expected.contains(&"number".to_string()));
    }

    #[test]
    fn test_first_parser_error_aborts() {
        let errors = parse("FIND post ?p WHERE WHERE").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].expected, vec!["AS"]);
    }

    #[test]
    fn test_tokenizer_errors_all_reported() {
        let errors = parse("FIND post AS ?p # WHERE ?p.t CONTAINS \"x").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_between_requires_and() {
        let errors = parse("FIND p AS ?p WHERE ?p.x BETWEEN 1 OR 2").unwrap_err();
        assert_eq!(errors[0].expected, vec!["AND"]);
    }

    #[test]
    fn test_limit_must_be_integer() {
        assert!(parse("FIND p AS ?p LIMIT 2.5").is_err());
        assert!(parse("FIND p AS ?p LIMIT -1").is_err());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("FIND p AS ?p LIMIT 1 ?x").is_err());
    }
}
