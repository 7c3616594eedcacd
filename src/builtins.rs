//! The built-in primitive registry.
//!
//! Every primitive is one record in a single static table: its name, the
//! argument-count discipline the parser enforces, which of the two
//! expression shapes its uses take, and its evaluator. Strict primitives
//! share the erased signature `fn(&[Value]) -> Result<Value, RuntimeError>`
//! and receive evaluated operands; `and`/`or` control evaluation of their
//! own operand expressions and are marked lazy.
//!
//! Evaluating a bare primitive name as a variable wraps the table entry
//! into an ordinary procedure value (see [`Primitive::as_closure`]), which
//! is what lets `+`, `car`, and friends be passed around first-class.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use crate::RuntimeError;
use crate::evaluator::{Environment, eval_and, eval_or};
use crate::expr::Expr;
use crate::value::{Closure, Value};

/// Argument-count discipline, checked by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Any => true,
        }
    }
}

/// How a primitive receives its operands.
#[derive(Clone, Copy)]
pub enum PrimImpl {
    /// Operands are evaluated left to right before the call.
    Strict(fn(&[Value]) -> Result<Value, RuntimeError>),
    /// The primitive evaluates its own operand expressions (`and`/`or`
    /// short-circuit).
    Lazy(fn(&[Expr], &mut Environment) -> Result<Value, RuntimeError>),
}

/// Which expression shapes uses of a primitive can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Fixed arity. Carries the parameter names used when the primitive is
    /// wrapped into a first-class closure.
    Fixed(&'static [&'static str]),
    /// Always the variadic shape.
    Variadic,
    /// Exactly two operands parse as the binary shape, any other count as
    /// variadic.
    Dual,
}

pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub shape: Shape,
    pub imp: PrimImpl,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        // The name uniquely identifies a table entry
        self.name == other.name
    }
}

impl Primitive {
    /// True for primitives whose variadic shape routes first-class
    /// application straight to the strict evaluator.
    pub fn is_variadic_function(&self) -> bool {
        matches!(self.shape, Shape::Variadic | Shape::Dual)
            && matches!(self.imp, PrimImpl::Strict(_))
    }

    /// Wrap the primitive into a procedure value closing over `env`.
    ///
    /// Fixed-arity primitives become a closure over generated argument
    /// names whose body applies the primitive to those variables; variadic
    /// primitives take no parameters and rely on the application shortcut.
    pub fn as_closure(&'static self, env: &Environment) -> Value {
        let (params, args, variadic) = match self.shape {
            Shape::Fixed(names) => (
                names.iter().map(|n| (*n).to_owned()).collect(),
                names.iter().map(|n| Expr::Var((*n).to_owned())).collect(),
                false,
            ),
            Shape::Variadic | Shape::Dual => (Vec::new(), Vec::new(), true),
        };
        Value::Procedure(Rc::new(Closure {
            params,
            body: Rc::new(Expr::Builtin {
                op: self,
                args,
                variadic,
            }),
            env: env.clone(),
        }))
    }
}

/// The full primitive table. The parser consults it for head dispatch and
/// arity checking; the evaluator for primitive-as-variable closures.
static PRIMITIVES: &[Primitive] = &[
    // Arithmetic
    Primitive {
        name: "+",
        arity: Arity::Any,
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_add),
    },
    Primitive {
        name: "-",
        arity: Arity::AtLeast(1),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_sub),
    },
    Primitive {
        name: "*",
        arity: Arity::Any,
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_mul),
    },
    Primitive {
        name: "/",
        arity: Arity::AtLeast(1),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_div),
    },
    Primitive {
        name: "modulo",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["a", "b"]),
        imp: PrimImpl::Strict(prim_modulo),
    },
    Primitive {
        name: "expt",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["a", "b"]),
        imp: PrimImpl::Strict(prim_expt),
    },
    // Comparisons
    Primitive {
        name: "<",
        arity: Arity::AtLeast(2),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_lt),
    },
    Primitive {
        name: "<=",
        arity: Arity::AtLeast(2),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_le),
    },
    Primitive {
        name: "=",
        arity: Arity::AtLeast(2),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_num_eq),
    },
    Primitive {
        name: ">=",
        arity: Arity::AtLeast(2),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_ge),
    },
    Primitive {
        name: ">",
        arity: Arity::AtLeast(2),
        shape: Shape::Dual,
        imp: PrimImpl::Strict(prim_gt),
    },
    // Pairs and lists
    Primitive {
        name: "cons",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["a", "b"]),
        imp: PrimImpl::Strict(prim_cons),
    },
    Primitive {
        name: "car",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["p"]),
        imp: PrimImpl::Strict(prim_car),
    },
    Primitive {
        name: "cdr",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["p"]),
        imp: PrimImpl::Strict(prim_cdr),
    },
    Primitive {
        name: "list",
        arity: Arity::Any,
        shape: Shape::Variadic,
        imp: PrimImpl::Strict(prim_list),
    },
    Primitive {
        name: "set-car!",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["p", "v"]),
        imp: PrimImpl::Strict(prim_set_car),
    },
    Primitive {
        name: "set-cdr!",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["p", "v"]),
        imp: PrimImpl::Strict(prim_set_cdr),
    },
    // Logic
    Primitive {
        name: "not",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_not),
    },
    Primitive {
        name: "and",
        arity: Arity::Any,
        shape: Shape::Variadic,
        imp: PrimImpl::Lazy(eval_and),
    },
    Primitive {
        name: "or",
        arity: Arity::Any,
        shape: Shape::Variadic,
        imp: PrimImpl::Lazy(eval_or),
    },
    // Equality and type predicates
    Primitive {
        name: "eq?",
        arity: Arity::Exactly(2),
        shape: Shape::Fixed(&["a", "b"]),
        imp: PrimImpl::Strict(prim_is_eq),
    },
    Primitive {
        name: "boolean?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_boolean),
    },
    Primitive {
        name: "number?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_number),
    },
    Primitive {
        name: "null?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_null),
    },
    Primitive {
        name: "pair?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_pair),
    },
    Primitive {
        name: "procedure?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_procedure),
    },
    Primitive {
        name: "symbol?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_symbol),
    },
    Primitive {
        name: "string?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_string),
    },
    Primitive {
        name: "list?",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_is_list),
    },
    // I/O and control
    Primitive {
        name: "display",
        arity: Arity::Exactly(1),
        shape: Shape::Fixed(&["x"]),
        imp: PrimImpl::Strict(prim_display),
    },
    Primitive {
        name: "void",
        arity: Arity::Exactly(0),
        shape: Shape::Fixed(&[]),
        imp: PrimImpl::Strict(prim_void),
    },
    Primitive {
        name: "exit",
        arity: Arity::Exactly(0),
        shape: Shape::Fixed(&[]),
        imp: PrimImpl::Strict(prim_exit),
    },
];

static PRIMITIVE_INDEX: LazyLock<HashMap<&'static str, &'static Primitive>> =
    LazyLock::new(|| PRIMITIVES.iter().map(|p| (p.name, p)).collect());

/// Look up a primitive by name.
pub fn find_primitive(name: &str) -> Option<&'static Primitive> {
    PRIMITIVE_INDEX.get(name).copied()
}

//
// Numeric helpers
//

/// Numerator/denominator view of a numeric value.
type Rat = (i64, i64);

fn as_rational(v: &Value) -> Result<Rat, RuntimeError> {
    match v {
        Value::Integer(n) => Ok((*n, 1)),
        Value::Rational(n, d) => Ok((*n, *d)),
        _ => Err(RuntimeError::new("Numeric operand required")),
    }
}

/// Integer view used by `modulo` and `expt`: an integer proper, or a
/// rational that happens to have denominator 1.
fn as_integer(v: &Value, message: &str) -> Result<i64, RuntimeError> {
    match v {
        Value::Integer(n) => Ok(*n),
        Value::Rational(n, 1) => Ok(*n),
        _ => Err(RuntimeError::new(message)),
    }
}

// Intermediate arithmetic wraps like the native machine integers it
// models; only expt checks for overflow.

fn rat_add((an, ad): Rat, (bn, bd): Rat) -> Rat {
    (
        an.wrapping_mul(bd).wrapping_add(bn.wrapping_mul(ad)),
        ad.wrapping_mul(bd),
    )
}

fn rat_sub((an, ad): Rat, (bn, bd): Rat) -> Rat {
    (
        an.wrapping_mul(bd).wrapping_sub(bn.wrapping_mul(ad)),
        ad.wrapping_mul(bd),
    )
}

fn rat_mul((an, ad): Rat, (bn, bd): Rat) -> Rat {
    (an.wrapping_mul(bn), ad.wrapping_mul(bd))
}

/// Cross-multiplied ordering of two numeric values.
pub(crate) fn compare_numeric(a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        _ if a.is_number() && b.is_number() => {
            let (an, ad) = as_rational(a)?;
            let (bn, bd) = as_rational(b)?;
            Ok(an.wrapping_mul(bd).cmp(&bn.wrapping_mul(ad)))
        }
        _ => Err(RuntimeError::new("Wrong typename in numeric comparison")),
    }
}

/// `eq?`: numeric equality for numbers, value equality for booleans and
/// symbols, kind equality for null and void, cell identity for everything
/// else (pairs, strings, procedures).
pub(crate) fn eq_values(a: &Value, b: &Value) -> Result<bool, RuntimeError> {
    match (a, b) {
        _ if a.is_number() && b.is_number() => {
            Ok(compare_numeric(a, b)? == Ordering::Equal)
        }
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x == y),
        (Value::Symbol(x), Value::Symbol(y)) => Ok(x == y),
        (Value::Null, Value::Null) | (Value::Void, Value::Void) => Ok(true),
        (Value::Pair(x), Value::Pair(y)) => Ok(Rc::ptr_eq(x, y)),
        (Value::Str(x), Value::Str(y)) => Ok(Rc::ptr_eq(x, y)),
        (Value::Procedure(x), Value::Procedure(y)) => Ok(Rc::ptr_eq(x, y)),
        _ => Ok(false),
    }
}

//
// Arithmetic primitives
//

fn prim_add(args: &[Value]) -> Result<Value, RuntimeError> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Value::Integer(0));
    };
    let mut acc = as_rational(first)?;
    for arg in rest {
        acc = rat_add(acc, as_rational(arg)?);
    }
    Ok(Value::rational(acc.0, acc.1))
}

fn prim_sub(args: &[Value]) -> Result<Value, RuntimeError> {
    let Some((first, rest)) = args.split_first() else {
        // Reachable through first-class use of `-`
        return Err(RuntimeError::new("Wrong number of arguments for -"));
    };
    let (n, d) = as_rational(first)?;
    if rest.is_empty() {
        return Ok(Value::rational(n.wrapping_neg(), d));
    }
    let mut acc = (n, d);
    for arg in rest {
        acc = rat_sub(acc, as_rational(arg)?);
    }
    Ok(Value::rational(acc.0, acc.1))
}

fn prim_mul(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Ok(Value::Integer(1));
    }
    let mut acc = (1, 1);
    for arg in args {
        acc = rat_mul(acc, as_rational(arg)?);
    }
    Ok(Value::rational(acc.0, acc.1))
}

fn prim_div(args: &[Value]) -> Result<Value, RuntimeError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(RuntimeError::new("Wrong number of arguments for /"));
    };
    let (n, d) = as_rational(first)?;
    if rest.is_empty() {
        // Unary `/` is the reciprocal
        if n == 0 {
            return Err(RuntimeError::new("Division by zero"));
        }
        return Ok(Value::rational(d, n));
    }
    let mut acc = (n, d);
    for arg in rest {
        let (bn, bd) = as_rational(arg)?;
        if bn == 0 {
            return Err(RuntimeError::new("Division by zero"));
        }
        acc = (acc.0.wrapping_mul(bd), acc.1.wrapping_mul(bn));
    }
    Ok(Value::rational(acc.0, acc.1))
}

fn prim_modulo(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [a, b] => {
            let lhs = as_integer(a, "modulo is only defined for integers")?;
            let rhs = as_integer(b, "modulo is only defined for integers")?;
            if rhs == 0 {
                return Err(RuntimeError::new("Division by zero"));
            }
            // Native `%`: the sign follows the left operand
            Ok(Value::Integer(lhs.wrapping_rem(rhs)))
        }
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_expt(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [a, b] => {
            let base = as_integer(a, "Wrong typename in expt")?;
            let exponent = as_integer(b, "Wrong typename in expt")?;
            if exponent < 0 {
                return Err(RuntimeError::new(
                    "Negative exponent not supported for integers",
                ));
            }
            if base == 0 && exponent == 0 {
                return Err(RuntimeError::new("0^0 is undefined"));
            }
            let overflow = || RuntimeError::new("Integer overflow in expt");
            let mut result: i64 = 1;
            let mut square = base;
            let mut exp = exponent;
            while exp > 0 {
                if exp % 2 == 1 {
                    result = result.checked_mul(square).ok_or_else(overflow)?;
                }
                if exp > 1 {
                    square = square.checked_mul(square).ok_or_else(overflow)?;
                }
                exp /= 2;
            }
            Ok(Value::Integer(result))
        }
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

// Chained comparisons: true iff every adjacent pair satisfies the relation.
// Below two operands (reachable first-class) the chain is vacuously true.
macro_rules! numeric_comparison {
    ($name:ident, $accept:expr) => {
        fn $name(args: &[Value]) -> Result<Value, RuntimeError> {
            for pair in args.windows(2) {
                let ordering = compare_numeric(&pair[0], &pair[1])?;
                if !$accept(ordering) {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
    };
}

numeric_comparison!(prim_lt, |o| o == Ordering::Less);
numeric_comparison!(prim_le, |o| o != Ordering::Greater);
numeric_comparison!(prim_num_eq, |o| o == Ordering::Equal);
numeric_comparison!(prim_ge, |o| o != Ordering::Less);
numeric_comparison!(prim_gt, |o| o == Ordering::Greater);

//
// Pair and list primitives
//

fn prim_cons(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [car, cdr] => Ok(Value::pair(car.clone(), cdr.clone())),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_car(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Pair(cell)] => Ok(cell.car.borrow().clone()),
        [_] => Err(RuntimeError::new("car on non-pair")),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_cdr(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Pair(cell)] => Ok(cell.cdr.borrow().clone()),
        [_] => Err(RuntimeError::new("cdr on non-pair")),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_list(args: &[Value]) -> Result<Value, RuntimeError> {
    let mut list = Value::Null;
    for arg in args.iter().rev() {
        list = Value::pair(arg.clone(), list);
    }
    Ok(list)
}

fn prim_set_car(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Pair(cell), v] => {
            *cell.car.borrow_mut() = v.clone();
            Ok(Value::Void)
        }
        [_, _] => Err(RuntimeError::new("set-car! on non-pair")),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_set_cdr(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Pair(cell), v] => {
            *cell.cdr.borrow_mut() = v.clone();
            Ok(Value::Void)
        }
        [_, _] => Err(RuntimeError::new("set-cdr! on non-pair")),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

//
// Logic, equality, predicates
//

fn prim_not(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [v] => Ok(Value::Boolean(v.is_false())),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_is_eq(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [a, b] => Ok(Value::Boolean(eq_values(a, b)?)),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn is_proper_list(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Pair(cell) => is_proper_list(&cell.cdr.borrow()),
        _ => false,
    }
}

macro_rules! type_predicate {
    ($name:ident, $test:expr) => {
        fn $name(args: &[Value]) -> Result<Value, RuntimeError> {
            match args {
                [v] => Ok(Value::Boolean($test(v))),
                _ => Err(RuntimeError::new("Wrong number of arguments")),
            }
        }
    };
}

type_predicate!(prim_is_boolean, |v: &Value| matches!(v, Value::Boolean(_)));
type_predicate!(prim_is_number, Value::is_number);
type_predicate!(prim_is_null, |v: &Value| matches!(v, Value::Null));
type_predicate!(prim_is_pair, |v: &Value| matches!(v, Value::Pair(_)));
type_predicate!(prim_is_procedure, |v: &Value| matches!(v, Value::Procedure(_)));
type_predicate!(prim_is_symbol, |v: &Value| matches!(v, Value::Symbol(_)));
type_predicate!(prim_is_string, |v: &Value| matches!(v, Value::Str(_)));
type_predicate!(prim_is_list, is_proper_list);

//
// I/O and control
//

fn prim_display(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [v] => {
            print!("{v}");
            Ok(Value::Void)
        }
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_void(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [] => Ok(Value::Void),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}

fn prim_exit(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [] => Ok(Value::Terminate),
        _ => Err(RuntimeError::new("Wrong number of arguments")),
    }
}
