//! A tree-walking interpreter for a small lexically-scoped Scheme dialect
//! with first-class procedures, mutable pairs, and rational arithmetic.
//!
//! The pipeline has three stages, each with its own tree:
//!
//! 1. The reader ([`reader`]) turns a character stream into [`reader::Syntax`]
//!    trees: atoms and bracketed lists, one top-level item at a time.
//! 2. The parser ([`parser`]) rewrites syntax into typed [`expr::Expr`]
//!    nodes, resolving every list head against the *current* environment so
//!    that a user binding shadows primitive and reserved-word status.
//! 3. The evaluator ([`evaluator`]) walks expressions against a linked
//!    environment of mutable bindings, producing [`value::Value`]s.
//!
//! The REPL driver ([`repl`]) batches consecutive top-level `define`s so
//! that mutually recursive definitions see each other, and applies the
//! printing contract for void results.
//!
//! ## Example
//!
//! ```
//! use miniscm::evaluator::Environment;
//! use miniscm::{parser, reader};
//!
//! let items = reader::read_all("(+ 1 2 1/2)").unwrap();
//! let mut env = Environment::new();
//! let expr = parser::parse(&items[0], &env).unwrap();
//! let value = expr.eval(&mut env).unwrap();
//! assert_eq!(value.to_string(), "7/2");
//! ```

use std::fmt;

pub mod builtins;
pub mod evaluator;
pub mod expr;
pub mod parser;
pub mod reader;
pub mod repl;
pub mod value;

/// A runtime diagnostic raised by the reader, the parser, or the evaluator.
///
/// The interpreter uses a single error kind end to end: every failure
/// carries a message and unwinds with `?` to the REPL boundary, where it is
/// reported as a uniform `RuntimeError` line and the session continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
        }
    }

    /// The diagnostic text, without any prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}
