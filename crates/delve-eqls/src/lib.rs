//! EQL-S: a small `FIND ... WHERE ... RETURN ...` language compiled to
//! delve datalog queries.
//!
//! This crate provides:
//! - [`tokenize`] and [`parse`]: text to [`QueryAst`] with positioned
//!   [`ParseError`] diagnostics
//! - [`Compiler`]: [`QueryAst`] to a [`CompiledQuery`] with its
//!   [`ProjectionMap`]
//! - [`AttributeResolver`]: optional attribute-name correction against the
//!   store catalog
//! - [`process`] / [`process_with`]: the single entry point used by the
//!   engine

pub mod ast;
pub mod compiler;
mod error;
pub mod lexer;
pub mod parser;
pub mod process;
pub mod resolver;
pub mod token;

pub use ast::{AttrRef, Condition, Direction, Expr, OrderBy, QueryAst, Value};
pub use compiler::{
    CompiledQuery, Compiler, CompilerOptions, OrMode, OrderKey, ProjectionMap, compile,
};
pub use error::ParseError;
pub use lexer::tokenize;
pub use parser::{Parser, parse};
pub use process::{ProcessResult, Processor, process, process_with};
pub use resolver::{AttributeResolver, CaseInsensitiveResolver, ExactResolver, Resolution};
pub use token::{Keyword, Token, TokenKind};
