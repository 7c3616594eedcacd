//! Translation of syntax trees into typed expressions.
//!
//! The interesting decision is head dispatch: for a non-empty list the
//! parser must decide whether the head symbol denotes a special form, a
//! built-in primitive, or a user-bound name — and a binding in the
//! *current* environment always wins, so `(define + -)` really does turn
//! `(+ 10 3)` into an application of the variable `+`. Binding forms push
//! their names (as void placeholders, only presence matters) before
//! parsing their bodies, which is what makes the same rule hold for
//! nested scopes.

use std::rc::Rc;

use crate::RuntimeError;
use crate::builtins::{self, Primitive, Shape};
use crate::evaluator::Environment;
use crate::expr::Expr;
use crate::reader::Syntax;
use crate::value::Value;

/// The special forms. Everything here is shadowable by a user binding.
const RESERVED_WORDS: &[&str] = &[
    "begin", "quote", "if", "cond", "lambda", "define", "let", "letrec", "set!",
];

fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

fn wrong_arity(form: &str) -> RuntimeError {
    RuntimeError::new(format!("Wrong number of arguments for {form}"))
}

/// Parse one syntax item against the names currently bound in `env`.
pub fn parse(stx: &Syntax, env: &Environment) -> Result<Expr, RuntimeError> {
    match stx {
        Syntax::Integer(n) => Ok(Expr::Fixnum(*n)),
        Syntax::Rational(n, d) => Ok(Expr::Rational(*n, *d)),
        Syntax::Boolean(b) => Ok(Expr::Boolean(*b)),
        Syntax::Str(s) => Ok(Expr::Str(s.clone())),
        Syntax::Symbol(s) => Ok(Expr::Var(s.clone())),
        Syntax::List(items) => parse_list(items, env),
    }
}

fn parse_all(items: &[Syntax], env: &Environment) -> Result<Vec<Expr>, RuntimeError> {
    items.iter().map(|stx| parse(stx, env)).collect()
}

fn apply_of(rator: Expr, rands: Vec<Expr>) -> Expr {
    Expr::Apply {
        rator: Rc::new(rator),
        rands,
    }
}

fn parse_list(items: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    let Some((head, rest)) = items.split_first() else {
        // () as an expression is (quote ())
        return Ok(Expr::Quote(Syntax::List(Vec::new())));
    };
    let Some(op) = head.as_symbol() else {
        return Ok(apply_of(parse(head, env)?, parse_all(rest, env)?));
    };
    // A binding in scope defeats primitive and reserved-word status
    if env.is_bound(op) {
        return Ok(apply_of(Expr::Var(op.to_owned()), parse_all(rest, env)?));
    }
    if let Some(prim) = builtins::find_primitive(op) {
        return parse_primitive(prim, rest, env);
    }
    if is_reserved_word(op) {
        return parse_special_form(op, rest, env);
    }
    // A free variable; the evaluator reports it if still unbound
    Ok(apply_of(Expr::Var(op.to_owned()), parse_all(rest, env)?))
}

fn parse_primitive(
    op: &'static Primitive,
    rands: &[Syntax],
    env: &Environment,
) -> Result<Expr, RuntimeError> {
    if !op.arity.accepts(rands.len()) {
        return Err(wrong_arity(op.name));
    }
    let args = parse_all(rands, env)?;
    let variadic = match op.shape {
        Shape::Fixed(_) => false,
        Shape::Variadic => true,
        // Exactly two operands select the binary shape
        Shape::Dual => args.len() != 2,
    };
    Ok(Expr::Builtin { op, args, variadic })
}

fn parse_special_form(
    op: &str,
    rest: &[Syntax],
    env: &Environment,
) -> Result<Expr, RuntimeError> {
    match op {
        "begin" => Ok(Expr::Begin(parse_all(rest, env)?)),
        "quote" => match rest {
            [quoted] => Ok(Expr::Quote(quoted.clone())),
            _ => Err(wrong_arity("quote")),
        },
        "if" => match rest {
            [cond, conseq, alter] => Ok(Expr::If {
                cond: Rc::new(parse(cond, env)?),
                conseq: Rc::new(parse(conseq, env)?),
                alter: Rc::new(parse(alter, env)?),
            }),
            _ => Err(wrong_arity("if")),
        },
        "cond" => parse_cond(rest, env),
        "lambda" => parse_lambda(rest, env),
        "define" => parse_define(rest, env),
        "let" => parse_let(rest, env, false),
        "letrec" => parse_let(rest, env, true),
        "set!" => parse_set(rest, env),
        _ => Err(RuntimeError::new(format!("Unknown reserved word: {op}"))),
    }
}

fn parse_cond(clauses: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    if clauses.is_empty() {
        return Err(RuntimeError::new("No clauses for cond"));
    }
    let mut parsed = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let Syntax::List(forms) = clause else {
            return Err(RuntimeError::new("Wrong clause in cond"));
        };
        parsed.push(parse_all(forms, env)?);
    }
    Ok(Expr::Cond { clauses: parsed })
}

/// Each name must be a symbol.
fn parse_params(items: &[Syntax]) -> Result<Vec<String>, RuntimeError> {
    items
        .iter()
        .map(|item| match item.as_symbol() {
            Some(name) => Ok(name.to_owned()),
            None => Err(RuntimeError::new("Invalid parameter")),
        })
        .collect()
}

/// Scratch extension of the compile-time environment: the placeholder
/// values are never read, only the presence of the names matters.
fn bind_names(env: &Environment, names: &[String]) -> Environment {
    let mut extended = env.clone();
    for name in names {
        extended = extended.extend(name.clone(), Value::Void);
    }
    extended
}

/// Multiple body forms wrap in `begin`.
fn parse_body(forms: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    let mut parsed = parse_all(forms, env)?;
    Ok(if parsed.len() == 1 {
        parsed.remove(0)
    } else {
        Expr::Begin(parsed)
    })
}

fn parse_lambda(rest: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    match rest {
        [params_stx, body_forms @ ..] if !body_forms.is_empty() => {
            let Syntax::List(param_items) = params_stx else {
                return Err(RuntimeError::new("Invalid parameter list in lambda"));
            };
            let params = parse_params(param_items)?;
            let body_env = bind_names(env, &params);
            let body = parse_body(body_forms, &body_env)?;
            Ok(Expr::Lambda {
                params,
                body: Rc::new(body),
            })
        }
        _ => Err(wrong_arity("lambda")),
    }
}

fn parse_define(rest: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    let [target, rhs_forms @ ..] = rest else {
        return Err(wrong_arity("define"));
    };
    if rhs_forms.is_empty() {
        return Err(wrong_arity("define"));
    }
    match target {
        // (define (f p ...) body ...) is sugar for (define f (lambda ...))
        Syntax::List(signature) => {
            let Some((name_stx, param_items)) = signature.split_first() else {
                return Err(RuntimeError::new("Invalid function signature in define"));
            };
            let Some(name) = name_stx.as_symbol() else {
                return Err(RuntimeError::new("Invalid function signature in define"));
            };
            let params = parse_params(param_items)?;
            // The body sees both the function name (recursion) and the
            // parameters as bound
            let mut names = vec![name.to_owned()];
            names.extend(params.iter().cloned());
            let body_env = bind_names(env, &names);
            let body = parse_body(rhs_forms, &body_env)?;
            Ok(Expr::Define {
                name: name.to_owned(),
                rhs: Rc::new(Expr::Lambda {
                    params,
                    body: Rc::new(body),
                }),
            })
        }
        Syntax::Symbol(name) => {
            let rhs_env = env.extend(name.clone(), Value::Void);
            let rhs = parse_body(rhs_forms, &rhs_env)?;
            Ok(Expr::Define {
                name: name.clone(),
                rhs: Rc::new(rhs),
            })
        }
        _ => Err(RuntimeError::new("Invalid variable name in define")),
    }
}

fn parse_let(
    rest: &[Syntax],
    env: &Environment,
    recursive: bool,
) -> Result<Expr, RuntimeError> {
    let form = if recursive { "letrec" } else { "let" };
    let [binds_stx, body_forms @ ..] = rest else {
        return Err(wrong_arity(form));
    };
    if body_forms.is_empty() {
        return Err(wrong_arity(form));
    }
    let Syntax::List(bind_items) = binds_stx else {
        return Err(RuntimeError::new(format!("Wrong binding in {form}")));
    };
    let mut names = Vec::with_capacity(bind_items.len());
    let mut rhs_stxs = Vec::with_capacity(bind_items.len());
    for item in bind_items {
        let Syntax::List(pair) = item else {
            return Err(RuntimeError::new(format!("Wrong binding in {form}")));
        };
        let [name_stx, rhs] = pair.as_slice() else {
            return Err(RuntimeError::new(format!("Wrong binding in {form}")));
        };
        let Some(name) = name_stx.as_symbol() else {
            return Err(RuntimeError::new(format!(
                "Invalid variable name in {form}"
            )));
        };
        names.push(name.to_owned());
        rhs_stxs.push(rhs);
    }
    let inner = bind_names(env, &names);
    // let: right-hand sides see the outer environment; letrec: the names
    // are already in scope for their own right-hand sides
    let rhs_env = if recursive { &inner } else { env };
    let bindings = names
        .into_iter()
        .zip(rhs_stxs)
        .map(|(name, stx)| Ok((name, parse(stx, rhs_env)?)))
        .collect::<Result<Vec<_>, RuntimeError>>()?;
    let body = Rc::new(parse_body(body_forms, &inner)?);
    Ok(if recursive {
        Expr::Letrec { bindings, body }
    } else {
        Expr::Let { bindings, body }
    })
}

fn parse_set(rest: &[Syntax], env: &Environment) -> Result<Expr, RuntimeError> {
    match rest {
        [name_stx, rhs] => {
            let Some(name) = name_stx.as_symbol() else {
                return Err(RuntimeError::new("Invalid variable name in set!"));
            };
            Ok(Expr::Set {
                name: name.to_owned(),
                rhs: Rc::new(parse(rhs, env)?),
            })
        }
        _ => Err(wrong_arity("set!")),
    }
}
