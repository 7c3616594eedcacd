//! Runtime values and their printed forms.
//!
//! Compound values are shared by reference: cloning a [`Value`] aliases the
//! same pair cell, string, or procedure rather than copying it. That is
//! what gives pairs identity under `eq?` and makes `set-car!`/`set-cdr!`
//! observable through every alias.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::evaluator::Environment;
use crate::expr::Expr;

#[derive(Clone)]
pub enum Value {
    Void,
    /// Sentinel produced by `(exit)`; the REPL stops when it surfaces.
    Terminate,
    Integer(i64),
    /// Numerator over a strictly positive denominator. Not reduced to
    /// lowest terms; numeric equality is by cross-multiplication.
    Rational(i64, i64),
    Boolean(bool),
    Symbol(String),
    Str(Rc<String>),
    /// The empty list.
    Null,
    Pair(Rc<PairCell>),
    Procedure(Rc<Closure>),
}

/// A mutable cons cell.
#[derive(Debug)]
pub struct PairCell {
    pub car: RefCell<Value>,
    pub cdr: RefCell<Value>,
}

/// A procedure value: parameter names, body expression, and the captured
/// defining environment (shared, so later mutations stay visible).
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    pub env: Environment,
}

impl Value {
    /// Build a rational value, moving any sign onto the numerator so the
    /// denominator invariant holds.
    pub fn rational(numerator: i64, denominator: i64) -> Value {
        if denominator < 0 {
            Value::Rational(numerator.wrapping_neg(), denominator.wrapping_neg())
        } else {
            Value::Rational(numerator, denominator)
        }
    }

    /// Allocate a fresh mutable pair cell.
    pub fn pair(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(PairCell {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
        }))
    }

    /// Allocate a fresh string cell. Each literal evaluation gets its own
    /// cell, so two occurrences of the same literal are not `eq?`.
    pub fn string(text: impl Into<String>) -> Value {
        Value::Str(Rc::new(text.into()))
    }

    /// Exactly one value is falsy.
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Boolean(false))
    }

    /// True for both integer and rational tags.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Rational(..))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "#<void>"),
            Value::Terminate => write!(f, "#<terminate>"),
            Value::Integer(n) => write!(f, "{n}"),
            // The denominator prints as stored, except that a denominator
            // of 1 prints as a plain integer.
            Value::Rational(n, 1) => write!(f, "{n}"),
            Value::Rational(n, d) => write!(f, "{n}/{d}"),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Null => write!(f, "()"),
            Value::Procedure(_) => write!(f, "#<procedure>"),
            Value::Pair(cell) => {
                write!(f, "({}", cell.car.borrow())?;
                let mut tail = cell.cdr.borrow().clone();
                loop {
                    match tail {
                        Value::Pair(next) => {
                            write!(f, " {}", next.car.borrow())?;
                            let cdr = next.cdr.borrow().clone();
                            tail = cdr;
                        }
                        Value::Null => return write!(f, ")"),
                        other => return write!(f, " . {other})"),
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Terminate => write!(f, "Terminate"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Rational(n, d) => write!(f, "Rational({n}/{d})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Null => write!(f, "Null"),
            // Keep procedures opaque: their captured environment can reach
            // back to the procedure itself.
            Value::Procedure(p) => write!(f, "Procedure({:?})", p.params),
            Value::Pair(cell) => write!(
                f,
                "Pair({:?}, {:?})",
                cell.car.borrow(),
                cell.cdr.borrow()
            ),
        }
    }
}
