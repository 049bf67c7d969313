//! Line-oriented EQL-S tokenizer.
//!
//! Every line is scanned independently: string and regex literals must
//! close on the line they open on, and `--` comments run to the end of the
//! line. Errors do not stop scanning; all of them are returned together.

use delve_datalog::CompareOp;

use crate::error::ParseError;
use crate::token::{Keyword, Token, TokenKind};

/// Tokenize `source`. The token list always ends with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut line_offset = 0;
    let mut last_line = 1;

    for (index, line) in source.split('\n').enumerate() {
        last_line = index + 1;
        LineLexer::new(line, last_line, line_offset).run(&mut tokens, &mut errors);
        line_offset += line.len() + 1;
    }

    let eof_column = source
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count() + 1)
        .unwrap_or(1);
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line: last_line,
        column: eof_column,
        offset: source.len(),
    });

    (tokens, errors)
}

struct LineLexer<'a> {
    line: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line_no: usize,
    line_offset: usize,
}

impl<'a> LineLexer<'a> {
    fn new(line: &'a str, line_no: usize, line_offset: usize) -> Self {
        Self {
            line,
            chars: line.char_indices().collect(),
            pos: 0,
            line_no,
            line_offset,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn byte_at(&self, pos: usize) -> usize {
        self.chars
            .get(pos)
            .map(|&(b, _)| b)
            .unwrap_or(self.line.len())
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.line[self.byte_at(start)..self.byte_at(self.pos)].to_string(),
            line: self.line_no,
            column: start + 1,
            offset: self.line_offset + self.byte_at(start),
        }
    }

    fn error(&self, start: usize, message: impl Into<String>) -> ParseError {
        let len = self.byte_at(self.pos).saturating_sub(self.byte_at(start)).max(1);
        ParseError::new(
            self.line_no,
            start + 1,
            self.line_offset + self.byte_at(start),
            len,
            message,
        )
    }

    fn run(mut self, tokens: &mut Vec<Token>, errors: &mut Vec<ParseError>) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                }
                '-' if self.peek_at(1) == Some('-') => break,
                '-' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    self.pos += 1;
                    match self.number(start) {
                        Ok(token) => tokens.push(token),
                        Err(e) => errors.push(e),
                    }
                }
                c if c.is_ascii_digit() => match self.number(start) {
                    Ok(token) => tokens.push(token),
                    Err(e) => errors.push(e),
                },
                '"' => match self.string(start) {
                    Ok(token) => tokens.push(token),
                    Err(e) => errors.push(e),
                },
                '/' => match self.regex(start) {
                    Ok(token) => tokens.push(token),
                    Err(e) => errors.push(e),
                },
                '?' => {
                    self.pos += 1;
                    let name_start = self.pos;
                    self.word();
                    if self.pos == name_start {
                        errors.push(self.error(start, "expected a variable name after `?`"));
                    } else {
                        let name = self.line[self.byte_at(name_start)..self.byte_at(self.pos)]
                            .to_string();
                        tokens.push(self.token(TokenKind::Var(name), start));
                    }
                }
                c if c.is_alphabetic() || c == '_' => {
                    self.word();
                    let word = &self.line[self.byte_at(start)..self.byte_at(self.pos)];
                    let kind = match Keyword::from_word(word) {
                        Some(kw) => TokenKind::Keyword(kw),
                        None => TokenKind::Ident(word.to_string()),
                    };
                    tokens.push(self.token(kind, start));
                }
                '(' | ')' | ',' | '.' => {
                    self.pos += 1;
                    let kind = match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ',' => TokenKind::Comma,
                        _ => TokenKind::Dot,
                    };
                    tokens.push(self.token(kind, start));
                }
                '=' | '!' | '<' | '>' => match self.operator(c) {
                    Some(op) => tokens.push(self.token(TokenKind::Op(op), start)),
                    None => {
                        self.pos += 1;
                        errors.push(self.error(start, format!("unexpected character `{}`", c)));
                    }
                },
                other => {
                    self.pos += 1;
                    errors.push(self.error(start, format!("unexpected character `{}`", other)));
                }
            }
        }
    }

    fn word(&mut self) {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, ParseError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        // A dot is only part of the number when a digit follows it.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.line[self.byte_at(start)..self.byte_at(self.pos)];
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(self.token(TokenKind::Number(value), start)),
            _ => Err(self.error(start, format!("invalid number `{}`", text))),
        }
    }

    fn operator(&mut self, first: char) -> Option<CompareOp> {
        let second = self.peek_at(1);
        let (op, width) = match (first, second) {
            ('=', Some('=')) => (CompareOp::Eq, 2),
            ('=', _) => (CompareOp::Eq, 1),
            ('!', Some('=')) => (CompareOp::Neq, 2),
            ('<', Some('=')) => (CompareOp::Lte, 2),
            ('<', _) => (CompareOp::Lt, 1),
            ('>', Some('=')) => (CompareOp::Gte, 2),
            ('>', _) => (CompareOp::Gt, 1),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    /// Read a delimited literal body. Returns the raw body, escapes intact,
    /// or `None` if the line ends first.
    fn delimited(&mut self, delimiter: char) -> Option<String> {
        self.pos += 1;
        let mut body = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == delimiter {
                return Some(body);
            }
            body.push(c);
            if c == '\\'
                && let Some(next) = self.peek()
            {
                body.push(next);
                self.pos += 1;
            }
        }
        None
    }

    fn string(&mut self, start: usize) -> Result<Token, ParseError> {
        let raw = self
            .delimited('"')
            .ok_or_else(|| self.error(start, "unterminated string literal"))?;
        Ok(self.token(TokenKind::String(unescape_string(&raw)), start))
    }

    fn regex(&mut self, start: usize) -> Result<Token, ParseError> {
        let raw = self
            .delimited('/')
            .ok_or_else(|| self.error(start, "unterminated regex literal"))?;
        let flags_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let flags = self.line[self.byte_at(flags_start)..self.byte_at(self.pos)].to_string();
        Ok(self.token(
            TokenKind::Regex {
                body: raw.replace("\\/", "/"),
                flags,
            },
            start,
        ))
    }
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
