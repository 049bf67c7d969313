//! EQL-S tokens.

use std::fmt;

use delve_datalog::CompareOp;

/// Reserved words. Matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Find,
    As,
    Where,
    Return,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    And,
    Or,
    Between,
    Contains,
    Matches,
    In,
    True,
    False,
    Null,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        let kw = match word.to_ascii_uppercase().as_str() {
            "FIND" => Keyword::Find,
            "AS" => Keyword::As,
            "WHERE" => Keyword::Where,
            "RETURN" => Keyword::Return,
            "ORDER" => Keyword::Order,
            "BY" => Keyword::By,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "LIMIT" => Keyword::Limit,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "BETWEEN" => Keyword::Between,
            "CONTAINS" => Keyword::Contains,
            "MATCHES" => Keyword::Matches,
            "IN" => Keyword::In,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            "NULL" => Keyword::Null,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Find => "FIND",
            Keyword::As => "AS",
            Keyword::Where => "WHERE",
            Keyword::Return => "RETURN",
            Keyword::Order => "ORDER",
            Keyword::By => "BY",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::Limit => "LIMIT",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Between => "BETWEEN",
            Keyword::Contains => "CONTAINS",
            Keyword::Matches => "MATCHES",
            Keyword::In => "IN",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Null => "NULL",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident(String),
    /// `?name`, stored without the sigil.
    Var(String),
    String(String),
    /// `/body/flags`
    Regex { body: String, flags: String },
    Number(f64),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Dot,
    Eof,
}

impl TokenKind {
    /// Short description used in "expected ..." diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            TokenKind::Ident(_) => "identifier".to_string(),
            TokenKind::Var(_) => "variable".to_string(),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Regex { .. } => "regex".to_string(),
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Op(op) => format!("`{}`", op.symbol()),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Dot => "`.`".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text as written (keywords keep their original case here).
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}
