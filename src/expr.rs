//! The typed expression tree: parser output, evaluator input.

use std::rc::Rc;

use crate::builtins::Primitive;
use crate::reader::Syntax;

/// One node of the expression tree.
///
/// Built-in primitives share the single [`Expr::Builtin`] variant rather
/// than a variant apiece; the table entry carries the arity discipline and
/// the evaluator. `variadic` records which of the primitive's two shapes
/// the parser chose — exactly two operands select the binary shape of a
/// dual-shape primitive — because only the variadic shape participates in
/// the first-class application shortcut.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Fixnum(i64),
    Rational(i64, i64),
    Str(String),
    Boolean(bool),
    /// A variable reference, resolved at evaluation time.
    Var(String),
    /// A quoted syntax subtree, stored verbatim.
    Quote(Syntax),
    Apply {
        rator: Rc<Expr>,
        rands: Vec<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Rc<Expr>,
    },
    Define {
        name: String,
        rhs: Rc<Expr>,
    },
    Set {
        name: String,
        rhs: Rc<Expr>,
    },
    Let {
        bindings: Vec<(String, Expr)>,
        body: Rc<Expr>,
    },
    Letrec {
        bindings: Vec<(String, Expr)>,
        body: Rc<Expr>,
    },
    If {
        cond: Rc<Expr>,
        conseq: Rc<Expr>,
        alter: Rc<Expr>,
    },
    /// `cond` clauses: guard followed by body forms, one vector per clause.
    Cond {
        clauses: Vec<Vec<Expr>>,
    },
    Begin(Vec<Expr>),
    Builtin {
        op: &'static Primitive,
        args: Vec<Expr>,
        variadic: bool,
    },
}

impl Expr {
    /// True when this expression syntactically culminates in an explicit
    /// `(void)` construction: a direct call, an application of a variable
    /// named `void`, or a `begin`/`if`/`cond` whose relevant tail does.
    ///
    /// The REPL prints void results of such expressions; implicit voids
    /// (from `set!`, `set-car!`, and the like) print as a bare newline.
    pub fn culminates_in_void(&self) -> bool {
        match self {
            Expr::Builtin { op, .. } => op.name == "void",
            Expr::Apply { rator, .. } => {
                matches!(rator.as_ref(), Expr::Var(name) if name == "void")
            }
            Expr::Begin(es) => es.last().is_some_and(Expr::culminates_in_void),
            Expr::If { conseq, alter, .. } => {
                conseq.culminates_in_void() || alter.culminates_in_void()
            }
            Expr::Cond { clauses } => clauses
                .iter()
                .any(|clause| clause.last().is_some_and(Expr::culminates_in_void)),
            _ => false,
        }
    }
}
