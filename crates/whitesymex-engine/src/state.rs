//! Execution state: one complete machine snapshot on one path.

use crate::error::{ErrorKind, SolverError};
use crate::heap::Heap;
use crate::solver::Solver;
use crate::value::{Value, WORD_WIDTH};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use whitesymex_syntax::{Instruction, Label};
use z3::ast::{Bool, BV};

/// Classification of a state within a path group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Still steppable.
    Active,
    /// Terminated gracefully: `Exit`, end of program, or loop limit.
    Deadended,
    /// Stdout matched the find pattern.
    Found,
    /// Stdout matched the avoid pattern.
    Avoided,
    /// Hit a runtime error.
    Errored(ErrorKind),
    /// Path constraints became unsatisfiable.
    Unsat,
}

/// How a consumed stdin symbol renders when concretized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// A single byte.
    Char,
    /// A whole number, rendered as ASCII decimal.
    Number,
}

/// A complete machine snapshot: program position, stack, heap, call stack,
/// I/O streams, and the path constraints that led here.
///
/// States are only mutated by the interpreter step function. Forking is a
/// deep copy; the instruction sequence and label table are shared between
/// clones since they never change after entry.
#[derive(Clone)]
pub struct State {
    /// Instruction index.
    pub pc: usize,
    /// Data stack, top at the end.
    pub stack: Vec<Value>,
    /// The heap.
    pub heap: Heap,
    /// Return targets for `Call`/`Return`.
    pub call_stack: Vec<usize>,
    /// The program, shared between clones.
    pub instructions: Arc<[Instruction]>,
    /// Label table pre-scanned from `Mark` instructions, shared.
    pub labels: Arc<HashMap<Label, usize>>,
    /// Stdin cells; consumed left to right via `stdin_cursor`. Grows when
    /// auto-symbolic mode synthesizes fresh symbols.
    pub stdin: Vec<Value>,
    pub stdin_cursor: usize,
    /// When true, reads past the end of `stdin` synthesize a fresh symbolic
    /// byte instead of erroring.
    auto_stdin: bool,
    /// Every cell actually consumed, with its rendering kind; this is what
    /// `concretize` evaluates.
    pub stdin_log: Vec<(Value, VarKind)>,
    /// Observable output; entries are byte-valued words.
    pub stdout: Vec<Value>,
    /// Set by steps that appended to stdout; cleared by the classifier.
    pub(crate) stdout_dirty: bool,
    /// Path constraint store.
    pub solver: Solver,
    /// Backward-jump counts per target, for loop bounding.
    pub(crate) loop_counts: HashMap<usize, u32>,
    pub status: Status,
}

impl State {
    /// Create the entry state for a program.
    ///
    /// `stdin: Some(cells)` is strict: reading past the last cell is an
    /// `EofStdin` error. `stdin: None` enables auto-symbolic mode, where
    /// each read past the end synthesizes a fresh symbol `input_<n>`
    /// constrained to `0..=0xFF`.
    pub fn create_entry_state(
        instructions: Vec<Instruction>,
        stdin: Option<Vec<Value>>,
    ) -> State {
        let labels = scan_labels(&instructions);
        let auto_stdin = stdin.is_none();
        State {
            pc: 0,
            stack: Vec::new(),
            heap: Heap::new(),
            call_stack: Vec::new(),
            instructions: instructions.into(),
            labels: Arc::new(labels),
            stdin: stdin.unwrap_or_default(),
            stdin_cursor: 0,
            auto_stdin,
            stdin_log: Vec::new(),
            stdout: Vec::new(),
            stdout_dirty: false,
            solver: Solver::new(),
            loop_counts: HashMap::new(),
            status: Status::Active,
        }
    }

    /// The instruction at the current program counter, if any.
    pub fn instruction(&self) -> Option<&Instruction> {
        self.instructions.get(self.pc)
    }

    /// Add a user constraint before exploration (or between steps).
    pub fn add_constraint(&mut self, constraint: Bool) {
        self.solver.add(constraint);
    }

    /// Consume the next stdin cell, synthesizing a fresh symbol in
    /// auto-symbolic mode. The consumed cell lands in the stdin log with
    /// its rendering kind.
    pub(crate) fn next_stdin_cell(&mut self, kind: VarKind) -> Result<Value, ErrorKind> {
        let value = if self.stdin_cursor < self.stdin.len() {
            self.stdin[self.stdin_cursor].clone()
        } else if self.auto_stdin {
            let symbol = BV::new_const(format!("input_{}", self.stdin.len()), WORD_WIDTH);
            let zero = BV::from_i64(0, WORD_WIDTH);
            let max = BV::from_i64(0xFF, WORD_WIDTH);
            self.solver
                .add(Bool::and(&[zero.bvsle(&symbol), symbol.bvsle(&max)]));
            self.stdin.push(Value::Symbolic(symbol.clone()));
            Value::Symbolic(symbol)
        } else {
            return Err(ErrorKind::EofStdin);
        };
        self.stdin_cursor += 1;
        self.stdin_log.push((value.clone(), kind));
        Ok(value)
    }

    /// Whether the stdin cell at the cursor exists and is concrete.
    pub(crate) fn peek_stdin_concrete(&self) -> Option<i64> {
        self.stdin
            .get(self.stdin_cursor)
            .and_then(|v| v.as_concrete())
    }

    /// Whether the cursor is past the provided stdin (strict mode only).
    pub(crate) fn stdin_exhausted(&self) -> bool {
        !self.auto_stdin && self.stdin_cursor >= self.stdin.len()
    }

    /// Concretize consumed stdin into bytes under a model of the current
    /// constraints. `Char` symbols render as single bytes, `Number` symbols
    /// as ASCII decimal.
    pub fn concretize(&mut self) -> Result<Vec<u8>, SolverError> {
        let log = self.stdin_log.clone();
        let mut out = Vec::new();
        for (value, kind) in &log {
            let n = self.solver.eval(value)?;
            match kind {
                VarKind::Char => out.push((n & 0xFF) as u8),
                VarKind::Number => out.extend_from_slice(n.to_string().as_bytes()),
            }
        }
        Ok(out)
    }

    /// Concretize caller-chosen values (for example, symbolic stdin cells
    /// the caller seeded) under one model of the current constraints.
    pub fn concretize_values(&mut self, values: &[Value]) -> Result<Vec<i64>, SolverError> {
        values.iter().map(|v| self.solver.eval(v)).collect()
    }

    /// Concretize the observable output into bytes.
    pub fn concretize_stdout(&mut self) -> Result<Vec<u8>, SolverError> {
        let stdout = self.stdout.clone();
        stdout
            .iter()
            .map(|v| self.solver.eval(v).map(|n| (n & 0xFF) as u8))
            .collect()
    }

    /// Check whether stdout can contain `pattern` as a byte substring under
    /// the current constraints.
    ///
    /// With `commit: false` this is a pure feasibility probe (the avoid
    /// policy: any model producing the literal counts). With `commit: true`
    /// the first feasible window's equality is asserted before reporting a
    /// match (the find policy), pinning the output to the literal.
    pub(crate) fn stdout_match(&mut self, pattern: &[u8], commit: bool) -> bool {
        if pattern.is_empty() {
            return true;
        }
        if pattern.len() > self.stdout.len() {
            return false;
        }
        for start in 0..=self.stdout.len() - pattern.len() {
            if let Some(window) = self.match_window(start, pattern) {
                if window.is_empty() {
                    // Fully concrete match.
                    return true;
                }
                if self.solver.is_feasible_with(&window) {
                    if commit {
                        for c in window {
                            self.solver.add(c);
                        }
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Equality constraints for `pattern` at `start`, or `None` when a
    /// concrete byte already rules the window out.
    fn match_window(&self, start: usize, pattern: &[u8]) -> Option<Vec<Bool>> {
        let mut constraints = Vec::new();
        for (value, &expected) in self.stdout[start..start + pattern.len()]
            .iter()
            .zip(pattern)
        {
            match value {
                Value::Concrete(n) => {
                    if *n != i64::from(expected) {
                        return None;
                    }
                }
                Value::Symbolic(bv) => {
                    constraints.push(bv.eq(&BV::from_i64(i64::from(expected), WORD_WIDTH)));
                }
            }
        }
        Some(constraints)
    }

    /// Redirect the program counter, bounding backward jumps. Returns
    /// `false` when the loop limit was exceeded and the state deadended
    /// (`loop_limit` 0 disables bounding).
    pub(crate) fn jump_to(&mut self, target: usize, loop_limit: u32) -> bool {
        if target <= self.pc && loop_limit > 0 {
            let count = self.loop_counts.entry(target).or_insert(0);
            *count += 1;
            if *count > loop_limit {
                self.status = Status::Deadended;
                return false;
            }
        }
        self.pc = target;
        true
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("pc", &self.pc)
            .field("status", &self.status)
            .field("stack", &self.stack.len())
            .field("stdin_consumed", &self.stdin_cursor)
            .field("stdout", &self.stdout.len())
            .finish()
    }
}

/// Index `Mark` instructions into a label table. Later marks shadow
/// earlier ones with the same label.
fn scan_labels(instructions: &[Instruction]) -> HashMap<Label, usize> {
    let mut labels = HashMap::new();
    for (index, instruction) in instructions.iter().enumerate() {
        if let Instruction::Mark(label) = instruction {
            labels.insert(label.clone(), index);
        }
    }
    labels
}
