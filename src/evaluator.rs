use std::cell::RefCell;
use std::rc::Rc;

use crate::RuntimeError;
use crate::builtins::{self, PrimImpl};
use crate::expr::Expr;
use crate::reader::Syntax;
use crate::value::{Closure, Value};

/// A linked list of name-to-value frames.
///
/// Lookup walks head to tail and the first match wins. `extend` prepends
/// and leaves the tail shared, so every closure holding an older head still
/// sees in-place mutations of the frames it captured — which is exactly
/// what `set!`, `define`, and the placeholder-patching in `letrec` rely on.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    head: Option<Rc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    name: String,
    slot: RefCell<Value>,
    next: Option<Rc<Frame>>,
}

impl Environment {
    /// The empty environment.
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Prepend a binding. The existing frames stay shared.
    #[must_use]
    pub fn extend(&self, name: impl Into<String>, value: Value) -> Environment {
        Environment {
            head: Some(Rc::new(Frame {
                name: name.into(),
                slot: RefCell::new(value),
                next: self.head.clone(),
            })),
        }
    }

    /// The value of the first matching frame.
    pub fn find(&self, name: &str) -> Option<Value> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| frame.slot.borrow().clone())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.name == name)
    }

    /// Replace the value in the first matching frame, in place. Callers
    /// always bind a placeholder first, so a missing name is a no-op.
    pub fn modify(&self, name: &str, value: Value) {
        if let Some(frame) = self.frames().find(|frame| frame.name == name) {
            *frame.slot.borrow_mut() = value;
        }
    }

    /// Bind `name` to a void placeholder unless it is already bound.
    pub fn ensure_binding(&mut self, name: &str) {
        if !self.is_bound(name) {
            *self = self.extend(name, Value::Void);
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.next.as_deref())
    }
}

/// The placeholder-then-patch dance shared by `letrec` and batched
/// `define`s: bind every name to a void placeholder first, then evaluate
/// each right-hand side in the extended environment and patch its
/// placeholder in place. Forward references resolve because every
/// right-hand side already sees every name.
pub(crate) fn bind_recursive<'a>(
    bindings: impl IntoIterator<Item = (&'a String, &'a Expr)>,
    env: &mut Environment,
) -> Result<(), RuntimeError> {
    let bindings: Vec<_> = bindings.into_iter().collect();
    for (name, _) in &bindings {
        *env = env.extend((*name).clone(), Value::Void);
    }
    for (name, rhs) in &bindings {
        let value = rhs.eval(env)?;
        env.modify(name.as_str(), value);
    }
    Ok(())
}

impl Expr {
    /// Evaluate this expression. `define` (and the define batching inside
    /// `begin`) may rebind `env`'s head, which is why it is `&mut`.
    pub fn eval(&self, env: &mut Environment) -> Result<Value, RuntimeError> {
        match self {
            Expr::Fixnum(n) => Ok(Value::Integer(*n)),
            Expr::Rational(n, d) => Ok(Value::Rational(*n, *d)),
            Expr::Str(s) => Ok(Value::string(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Var(name) => eval_var(name, env),
            Expr::Quote(stx) => quote_to_value(stx),
            Expr::Builtin { op, args, .. } => match op.imp {
                PrimImpl::Strict(run) => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(arg.eval(env)?);
                    }
                    run(&values)
                }
                PrimImpl::Lazy(run) => run(args, env),
            },
            Expr::Apply { rator, rands } => eval_apply(rator, rands, env),
            Expr::Lambda { params, body } => Ok(Value::Procedure(Rc::new(Closure {
                params: params.clone(),
                body: Rc::clone(body),
                env: env.clone(),
            }))),
            Expr::Define { name, rhs } => {
                env.ensure_binding(name);
                let value = rhs.eval(env)?;
                env.modify(name, value);
                Ok(Value::Void)
            }
            Expr::Set { name, rhs } => {
                if !env.is_bound(name) {
                    return Err(RuntimeError::new(format!(
                        "Undefined variable : {name}"
                    )));
                }
                let value = rhs.eval(env)?;
                env.modify(name, value);
                Ok(Value::Void)
            }
            Expr::Let { bindings, body } => {
                // Right-hand sides see the outer environment only
                let mut values = Vec::with_capacity(bindings.len());
                for (_, rhs) in bindings {
                    values.push(rhs.eval(env)?);
                }
                let mut inner = env.clone();
                for ((name, _), value) in bindings.iter().zip(values) {
                    inner = inner.extend(name.clone(), value);
                }
                body.eval(&mut inner)
            }
            Expr::Letrec { bindings, body } => {
                let mut inner = env.clone();
                bind_recursive(bindings.iter().map(|(n, e)| (n, e)), &mut inner)?;
                body.eval(&mut inner)
            }
            Expr::If {
                cond,
                conseq,
                alter,
            } => {
                if cond.eval(env)?.is_false() {
                    alter.eval(env)
                } else {
                    conseq.eval(env)
                }
            }
            Expr::Cond { clauses } => eval_cond(clauses, env),
            Expr::Begin(es) => eval_begin(es, env),
        }
    }
}

/// Variable reference: environment first, then the primitive table (a bare
/// primitive name becomes a fresh first-class closure).
fn eval_var(name: &str, env: &mut Environment) -> Result<Value, RuntimeError> {
    if let Some(value) = env.find(name) {
        return Ok(value);
    }
    if let Some(op) = builtins::find_primitive(name) {
        return Ok(op.as_closure(env));
    }
    Err(RuntimeError::new(format!("Invalid variable: {name}")))
}

fn eval_apply(
    rator: &Expr,
    rands: &[Expr],
    env: &mut Environment,
) -> Result<Value, RuntimeError> {
    let callee = rator.eval(env)?;
    let Value::Procedure(closure) = callee else {
        return Err(RuntimeError::new("Attempt to apply a non-procedure"));
    };
    let mut args = Vec::with_capacity(rands.len());
    for rand in rands {
        args.push(rand.eval(env)?);
    }

    // A variadic strict primitive body takes the whole argument vector
    // directly, whatever its count. This is what makes a first-class `+`
    // behave like `+`.
    if let Expr::Builtin {
        op, variadic: true, ..
    } = closure.body.as_ref()
        && let PrimImpl::Strict(run) = op.imp
    {
        return run(&args);
    }

    if args.len() != closure.params.len() {
        return Err(RuntimeError::new("Wrong number of arguments"));
    }
    let mut call_env = closure.env.clone();
    for (param, arg) in closure.params.iter().zip(args) {
        call_env = call_env.extend(param.clone(), arg);
    }
    closure.body.eval(&mut call_env)
}

fn eval_clause_body(body: &[Expr], env: &mut Environment) -> Result<Value, RuntimeError> {
    let mut last = Value::Void;
    for expr in body {
        last = expr.eval(env)?;
    }
    Ok(last)
}

/// Scan clauses left to right. A literal `else` head counts as an
/// always-true guard only while `else` is unbound. A clause with no body
/// yields its guard value. No match yields void.
fn eval_cond(clauses: &[Vec<Expr>], env: &mut Environment) -> Result<Value, RuntimeError> {
    for clause in clauses {
        let Some((guard, body)) = clause.split_first() else {
            continue;
        };
        if let Expr::Var(name) = guard
            && name == "else"
            && !env.is_bound("else")
        {
            return eval_clause_body(body, env);
        }
        let test = guard.eval(env)?;
        if !test.is_false() {
            if body.is_empty() {
                return Ok(test);
            }
            return eval_clause_body(body, env);
        }
    }
    Ok(Value::Void)
}

/// Sequence evaluation with two extras: runs of adjacent `define`s are
/// pre-bound as one batch before their right-hand sides run (internal
/// definitions, mutual recursion), and a terminate value short-circuits
/// the rest of the sequence.
fn eval_begin(es: &[Expr], env: &mut Environment) -> Result<Value, RuntimeError> {
    let mut last = Value::Void;
    let mut pending: Vec<(&String, &Expr)> = Vec::new();
    for expr in es {
        if let Expr::Define { name, rhs } = expr {
            pending.push((name, rhs.as_ref()));
            continue;
        }
        if !pending.is_empty() {
            bind_recursive(pending.drain(..), env)?;
        }
        last = expr.eval(env)?;
        if matches!(last, Value::Terminate) {
            return Ok(last);
        }
    }
    if !pending.is_empty() {
        bind_recursive(pending.drain(..), env)?;
    }
    Ok(last)
}

/// `and`: evaluate left to right, false at the first false value,
/// otherwise the last value. `(and)` is true.
pub(crate) fn eval_and(args: &[Expr], env: &mut Environment) -> Result<Value, RuntimeError> {
    let mut last = Value::Boolean(true);
    for expr in args {
        last = expr.eval(env)?;
        if last.is_false() {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(last)
}

/// `or`: the first non-false value, otherwise false. `(or)` is false.
pub(crate) fn eval_or(args: &[Expr], env: &mut Environment) -> Result<Value, RuntimeError> {
    for expr in args {
        let value = expr.eval(env)?;
        if !value.is_false() {
            return Ok(value);
        }
    }
    Ok(Value::Boolean(false))
}

/// Fold a quoted syntax subtree into a value. Numbers, booleans, and
/// strings become their literal values, symbols become symbol values, and
/// lists become chains of pairs; a lone `.` in the penultimate position
/// makes the element after it the improper tail.
pub(crate) fn quote_to_value(stx: &Syntax) -> Result<Value, RuntimeError> {
    match stx {
        Syntax::Integer(n) => Ok(Value::Integer(*n)),
        Syntax::Rational(n, d) => Ok(Value::Rational(*n, *d)),
        Syntax::Boolean(b) => Ok(Value::Boolean(*b)),
        Syntax::Str(s) => Ok(Value::string(s.clone())),
        Syntax::Symbol(s) => Ok(Value::Symbol(s.clone())),
        Syntax::List(items) => quote_list(items),
    }
}

fn is_dot(stx: &Syntax) -> bool {
    matches!(stx, Syntax::Symbol(s) if s == ".")
}

fn quote_list(items: &[Syntax]) -> Result<Value, RuntimeError> {
    let (heads, tail) = match items.iter().position(is_dot) {
        None => (items, Value::Null),
        Some(dot) if dot + 2 == items.len() => {
            (&items[..dot], quote_to_value(&items[dot + 1])?)
        }
        Some(_) => return Err(RuntimeError::new("Malformed dotted list")),
    };
    let mut value = tail;
    for item in heads.iter().rev() {
        value = Value::pair(quote_to_value(item)?, value);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::reader::read_all;

    /// Evaluate a sequence of forms in one environment and return the
    /// printed form of the last result.
    fn eval_script(input: &str) -> Result<String, RuntimeError> {
        let items = read_all(input)?;
        let mut env = Environment::new();
        let mut last = Value::Void;
        for item in &items {
            let expr = parse(item, &env)?;
            last = expr.eval(&mut env)?;
        }
        Ok(last.to_string())
    }

    /// Expected printed result of the last form, or an error message.
    enum Expected {
        Shows(&'static str),
        Fails(&'static str),
    }
    use Expected::*;

    fn run_eval_tests(cases: Vec<(&str, Expected)>) {
        for (i, (input, expected)) in cases.iter().enumerate() {
            match (eval_script(input), expected) {
                (Ok(shown), Shows(text)) => {
                    assert_eq!(shown, *text, "eval test #{}: {input}", i + 1);
                }
                (Err(err), Fails(text)) => {
                    assert_eq!(err.message(), *text, "eval test #{}: {input}", i + 1);
                }
                (Ok(shown), Fails(text)) => panic!(
                    "eval test #{}: {input} expected error '{text}', got {shown}",
                    i + 1
                ),
                (Err(err), Shows(text)) => panic!(
                    "eval test #{}: {input} expected {text}, got error '{err}'",
                    i + 1
                ),
            }
        }
    }

    #[test]
    fn test_literals_and_variables() {
        let cases = vec![
            ("42", Shows("42")),
            ("2/4", Shows("2/4")),
            ("#t", Shows("#t")),
            ("\"hi\"", Shows("\"hi\"")),
            ("(define x 5) x", Shows("5")),
            ("nope", Fails("Invalid variable: nope")),
            // Bare primitive names evaluate to procedures
            ("+", Shows("#<procedure>")),
            ("car", Shows("#<procedure>")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_control_forms() {
        let cases = vec![
            ("(if #t 1 2)", Shows("1")),
            ("(if #f 1 2)", Shows("2")),
            // Everything but #f is truthy
            ("(if 0 'a 'b)", Shows("a")),
            ("(if '() 'a 'b)", Shows("a")),
            ("(if \"\" 'a 'b)", Shows("a")),
            ("(begin 1 2 3)", Shows("3")),
            ("(begin)", Shows("#<void>")),
            ("(cond (#f 1) (#t 2) (#t 3))", Shows("2")),
            ("(cond (#f 1))", Shows("#<void>")),
            ("(cond (#f 1) (else 4 5))", Shows("5")),
            ("(cond (7))", Shows("7")),
            ("(cond (else))", Shows("#<void>")),
            // A bound `else` loses its special status
            ("(define else #f) (cond (else 1) (2))", Shows("2")),
            ("(and)", Shows("#t")),
            ("(and 1 2)", Shows("2")),
            ("(and #f (car 5))", Shows("#f")),
            ("(or)", Shows("#f")),
            ("(or #f 7)", Shows("7")),
            ("(or 7 (car 5))", Shows("7")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_binding_forms() {
        let cases = vec![
            ("(let ((x 1) (y 2)) (+ x y))", Shows("3")),
            // let right-hand sides see the outer environment
            ("(define x 10) (let ((x 1) (y x)) y)", Shows("10")),
            (
                "(letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))",
                Shows("120"),
            ),
            (
                "(letrec ((ev? (lambda (n) (if (= n 0) #t (od? (- n 1)))))
                          (od? (lambda (n) (if (= n 0) #f (ev? (- n 1))))))
                   (ev? 10))",
                Shows("#t"),
            ),
            ("(define x 1) (set! x 2) x", Shows("2")),
            ("(set! nope 1)", Fails("Undefined variable : nope")),
            ("(define (add a b) (+ a b)) (add 1 2)", Shows("3")),
            // define sugar with several body forms wraps them in begin
            ("(define (f) 1 2) (f)", Shows("2")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_closures() {
        let cases = vec![
            ("((lambda (x) (* x x)) 7)", Shows("49")),
            ("((lambda () 42))", Shows("42")),
            ("((lambda (x) x) 1 2)", Fails("Wrong number of arguments")),
            ("(5 1)", Fails("Attempt to apply a non-procedure")),
            // Lexical capture
            (
                "(define (adder n) (lambda (x) (+ x n))) ((adder 3) 4)",
                Shows("7"),
            ),
            // Captured state survives and mutates across calls
            (
                "(define (mk) (let ((c 0)) (lambda () (set! c (+ c 1)) c)))
                 (define g (mk))
                 (g) (g)",
                Shows("2"),
            ),
            // First-class primitives
            ("((lambda (f) (f 1 2 3)) +)", Shows("6")),
            ("((lambda (f) (f '(1 2))) car)", Shows("1")),
            ("(define plus +) (plus 1 2 3 4)", Shows("10")),
            // A first-class `-` applied to nothing reuses the parse message
            ("(define minus -) (minus)", Fails("Wrong number of arguments for -")),
            // A first-class comparison below two operands is vacuously true
            ("(define lt <) (lt 1)", Shows("#t")),
            // and/or as values only accept zero arguments
            ("(define f and) (f)", Shows("#t")),
            ("(define f and) (f 1 2)", Fails("Wrong number of arguments")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_begin_define_batching() {
        let cases = vec![
            // Adjacent defines inside begin bind as one batch
            (
                "(begin
                   (define ev? (lambda (n) (if (= n 0) #t (od? (- n 1)))))
                   (define od? (lambda (n) (if (= n 0) #f (ev? (- n 1)))))
                   (ev? 4))",
                Shows("#t"),
            ),
            // Trailing defines flush after the last non-define form
            ("(begin (define x 1) 7 (define y 2)) y", Shows("2")),
            // exit short-circuits the rest of a begin
            ("(begin (exit) (car 5))", Shows("#<terminate>")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_quote() {
        let cases = vec![
            ("'x", Shows("x")),
            ("'()", Shows("()")),
            ("()", Shows("()")),
            ("'(1 2 3)", Shows("(1 2 3)")),
            ("'(1 2/3 #t \"s\" x)", Shows("(1 2/3 #t \"s\" x)")),
            ("'(a (b c))", Shows("(a (b c))")),
            ("'(1 . 2)", Shows("(1 . 2)")),
            ("'(1 . (2 . 3))", Shows("(1 2 . 3)")),
            ("'(1 2 . 3)", Shows("(1 2 . 3)")),
            ("'(. 2)", Shows("2")),
            ("'(.)", Fails("Malformed dotted list")),
            ("'(1 .)", Fails("Malformed dotted list")),
            ("'(. 1 2 3)", Fails("Malformed dotted list")),
            // quote/list equivalence under traversal
            ("(car '(1 2))", Shows("1")),
            ("(cdr '(1 2))", Shows("(2)")),
            ("(eq? 'a 'a)", Shows("#t")),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_closure_shares_environment_frames() {
        // The closure captures the frame of `x`; a later set! through the
        // outer name is visible inside the closure and vice versa.
        let cases = vec![
            (
                "(define x 1)
                 (define (get) x)
                 (set! x 99)
                 (get)",
                Shows("99"),
            ),
            (
                "(define p (cons 1 2))
                 (define q p)
                 (set-car! p 9)
                 q",
                Shows("(9 . 2)"),
            ),
        ];
        run_eval_tests(cases);
    }

    #[test]
    fn test_numeric_tower() {
        let cases = vec![
            ("(+ 1 2 3)", Shows("6")),
            ("(/ 1 2)", Shows("1/2")),
            ("(- 5)", Shows("-5")),
            ("(expt 2 10)", Shows("1024")),
            ("(+ 1/2 1/3)", Shows("5/6")),
            ("(= 2 2/1)", Shows("#t")),
            ("(eq? 2 2/1)", Shows("#t")),
            ("(< 1/3 1/2 2/3 1)", Shows("#t")),
            ("(/ 1 0)", Fails("Division by zero")),
            ("(+ 'a 1)", Fails("Numeric operand required")),
            ("(< 'a 1)", Fails("Wrong typename in numeric comparison")),
        ];
        run_eval_tests(cases);
    }
}
