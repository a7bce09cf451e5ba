//! Per-state solver context: accumulated path constraints plus SAT and
//! model queries against Z3.
//!
//! Each execution state owns its constraint list; forking a state clones
//! the list. A fresh Z3 solver is materialized per query with a per-query
//! timeout, so a fork never shares mutable solver internals with its
//! sibling. `Unknown` results are treated as satisfiable by every caller
//! (keeps possibly-feasible paths).

use crate::error::SolverError;
use crate::value::{Value, WORD_WIDTH};
use tracing::trace;
use z3::ast::Bool;
use z3::{Model, Params, SatResult};

/// Default per-query solver timeout in milliseconds.
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Path constraint store and solver frontend for one execution state.
pub struct Solver {
    /// Accumulated path constraints, in assertion order.
    constraints: Vec<Bool>,
    /// Per-query timeout; `None` disables it.
    timeout_ms: Option<u64>,
    /// Model cached by the last successful satisfiability check.
    /// Invalidated whenever a constraint is added.
    model: Option<Model>,
}

impl Clone for Solver {
    fn clone(&self) -> Self {
        // The cached model is not carried over; the clone recomputes on demand.
        Self {
            constraints: self.constraints.clone(),
            timeout_ms: self.timeout_ms,
            model: None,
        }
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("constraints", &self.constraints.len())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Create an empty solver context.
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
            timeout_ms: Some(DEFAULT_QUERY_TIMEOUT_MS),
            model: None,
        }
    }

    /// Set the per-query timeout (`None` disables it).
    pub fn set_timeout_ms(&mut self, timeout_ms: Option<u64>) {
        self.timeout_ms = timeout_ms;
    }

    /// Append a path constraint. No satisfiability check happens here.
    pub fn add(&mut self, constraint: Bool) {
        self.constraints.push(constraint);
        self.model = None;
    }

    /// The accumulated path constraints.
    pub fn constraints(&self) -> &[Bool] {
        &self.constraints
    }

    /// Check satisfiability of the accumulated constraints.
    pub fn check(&self) -> SatResult {
        let (result, _) = self.run_query(&[]);
        result
    }

    /// Feasibility probe: check the accumulated constraints plus `extra`,
    /// without committing `extra`. `Unknown` counts as feasible.
    pub fn is_feasible_with(&self, extra: &[Bool]) -> bool {
        !matches!(self.run_query(extra).0, SatResult::Unsat)
    }

    /// Check satisfiability, caching a model on `Sat` for later evaluation.
    /// `Unknown` counts as satisfiable but caches nothing.
    pub fn is_satisfiable(&mut self) -> bool {
        if self.model.is_some() {
            return true;
        }
        let (result, model) = self.run_query(&[]);
        self.model = model;
        !matches!(result, SatResult::Unsat)
    }

    /// Evaluate a value to a concrete word under a model of the current
    /// constraints. Concrete values pass through without a solver call.
    pub fn eval(&mut self, value: &Value) -> Result<i64, SolverError> {
        match value {
            Value::Concrete(n) => Ok(*n),
            Value::Symbolic(bv) => {
                let model = self.ensure_model()?;
                let evaluated = model
                    .eval(bv, true)
                    .ok_or_else(|| SolverError::NotConcrete(bv.to_string()))?;
                let raw = evaluated
                    .as_u64()
                    .ok_or_else(|| SolverError::NotConcrete(evaluated.to_string()))?;
                Ok(sign_extend(raw))
            }
        }
    }

    /// Get the cached model, computing one if necessary.
    fn ensure_model(&mut self) -> Result<&Model, SolverError> {
        if self.model.is_none() {
            let (result, model) = self.run_query(&[]);
            match result {
                SatResult::Sat => self.model = model,
                SatResult::Unsat => return Err(SolverError::NoModel),
                SatResult::Unknown => return Err(SolverError::Timeout),
            }
        }
        Ok(self.model.as_ref().expect("model cached above"))
    }

    /// Materialize a Z3 solver over the constraints plus `extra` and check.
    fn run_query(&self, extra: &[Bool]) -> (SatResult, Option<Model>) {
        let solver = z3::Solver::new();
        if let Some(ms) = self.timeout_ms {
            let mut params = Params::new();
            params.set_u32("timeout", ms.min(u64::from(u32::MAX)) as u32);
            solver.set_params(&params);
        }
        for c in &self.constraints {
            solver.assert(c);
        }
        for c in extra {
            solver.assert(c);
        }
        let result = solver.check();
        trace!(
            constraints = self.constraints.len(),
            assumptions = extra.len(),
            ?result,
            "solver query"
        );
        let model = match result {
            SatResult::Sat => solver.get_model(),
            _ => None,
        };
        (result, model)
    }
}

/// Sign-extend a raw word-width numeral into an `i64`.
fn sign_extend(raw: u64) -> i64 {
    let shift = 64 - WORD_WIDTH;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::BV;

    fn word(name: &str) -> BV {
        BV::new_const(name, WORD_WIDTH)
    }

    #[test]
    fn empty_context_is_satisfiable() {
        let mut solver = Solver::new();
        assert!(solver.is_satisfiable());
    }

    #[test]
    fn contradiction_is_unsat() {
        let mut solver = Solver::new();
        let x = word("x");
        solver.add(x.eq(&BV::from_i64(1, WORD_WIDTH)));
        solver.add(x.eq(&BV::from_i64(2, WORD_WIDTH)));
        assert!(!solver.is_satisfiable());
        assert!(matches!(solver.check(), SatResult::Unsat));
    }

    #[test]
    fn probe_does_not_commit() {
        let mut solver = Solver::new();
        let x = word("x");
        let is_one = x.eq(&BV::from_i64(1, WORD_WIDTH));
        let is_two = x.eq(&BV::from_i64(2, WORD_WIDTH));
        assert!(solver.is_feasible_with(&[is_one.clone()]));
        assert!(solver.is_feasible_with(&[is_two]));
        solver.add(is_one);
        assert!(solver.is_satisfiable());
    }

    #[test]
    fn eval_respects_constraints() {
        let mut solver = Solver::new();
        let x = word("x");
        solver.add(x.eq(&BV::from_i64(-7, WORD_WIDTH)));
        let v = Value::Symbolic(x);
        assert_eq!(solver.eval(&v).unwrap(), -7);
    }

    #[test]
    fn eval_concrete_needs_no_model() {
        let mut solver = Solver::new();
        assert_eq!(solver.eval(&Value::concrete(42)).unwrap(), 42);
    }

    #[test]
    fn eval_on_unsat_context_fails() {
        let mut solver = Solver::new();
        let x = word("x");
        solver.add(x.eq(&BV::from_i64(1, WORD_WIDTH)));
        solver.add(x.eq(&BV::from_i64(2, WORD_WIDTH)));
        assert!(matches!(
            solver.eval(&Value::Symbolic(x)),
            Err(SolverError::NoModel)
        ));
    }

    #[test]
    fn sign_extension_from_word_width() {
        assert_eq!(sign_extend(0xFFFF_FFFF), -1);
        assert_eq!(sign_extend(0x7FFF_FFFF), i64::from(i32::MAX));
        assert_eq!(sign_extend(5), 5);
    }
}
