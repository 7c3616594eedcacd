//! The read-eval-print driver core.
//!
//! [`Session`] owns the growing global environment and the queue of
//! top-level `define`s. Consecutive defines are deferred and bound as one
//! batch when the next non-define form arrives, which is what lets two
//! adjacent defines refer to each other. The driver I/O loop lives in the
//! binary; everything here is pure enough to test directly.

use std::rc::Rc;

use crate::RuntimeError;
use crate::evaluator::Environment;
use crate::expr::Expr;
use crate::parser;
use crate::reader::Syntax;
use crate::value::Value;

/// What the driver should do after one top-level form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this line. Empty for an implicit void result.
    Print(String),
    /// A deferred `define`: nothing to print.
    Quiet,
    /// `exit` surfaced: stop the session.
    Stop,
}

/// One interactive session.
#[derive(Default)]
pub struct Session {
    global: Environment,
    pending: Vec<(String, Rc<Expr>)>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Process one top-level form. Every parse or evaluation failure maps
    /// to the uniform `RuntimeError` report line; the session itself stays
    /// usable, and queued defines stay queued.
    pub fn handle(&mut self, stx: &Syntax) -> Outcome {
        match self.try_handle(stx) {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Print("RuntimeError".to_owned()),
        }
    }

    fn try_handle(&mut self, stx: &Syntax) -> Result<Outcome, RuntimeError> {
        let expr = parser::parse(stx, &self.global)?;

        if let Expr::Define { name, rhs } = &expr {
            // Bind the placeholder now: the queued name must already look
            // bound to the parse of every following form (a redefined `+`
            // shadows the primitive immediately), while its value waits
            // for the batch flush below.
            if !self.global.is_bound(name) {
                self.global = self.global.extend(name.clone(), Value::Void);
            }
            self.pending.push((name.clone(), Rc::clone(rhs)));
            return Ok(Outcome::Quiet);
        }
        self.flush_pending()?;

        let value = expr.eval(&mut self.global)?;
        if matches!(value, Value::Terminate) {
            return Ok(Outcome::Stop);
        }
        if matches!(value, Value::Void) && !expr.culminates_in_void() {
            return Ok(Outcome::Print(String::new()));
        }
        Ok(Outcome::Print(value.to_string()))
    }

    /// Evaluate every queued right-hand side in order, patching each
    /// placeholder in place. The queue is cleared only on full success, so
    /// a failing batch is retried by the next non-define form.
    fn flush_pending(&mut self) -> Result<(), RuntimeError> {
        for (name, rhs) in &self.pending {
            let value = rhs.eval(&mut self.global)?;
            self.global.modify(name, value);
        }
        self.pending.clear();
        Ok(())
    }
}
