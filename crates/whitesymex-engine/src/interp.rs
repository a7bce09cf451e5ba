//! One-step interpretation of Whitespace instructions over symbolic state.
//!
//! `State::step` advances an active state by exactly one instruction and
//! returns its successor states. Terminal outcomes (exit, runtime error,
//! unsatisfiable constraints, loop limit) are expressed by returning the
//! state with a terminal status, so the path group can bucket and inspect
//! it. Conditional jumps and feasibly-zero divisors fork.

use crate::error::ErrorKind;
use crate::state::{State, Status, VarKind};
use crate::value::{Cond, Value};
use tracing::trace;
use whitesymex_syntax::{Instruction, Label};

impl State {
    /// Execute one instruction, producing the successor states.
    ///
    /// `loop_limit` bounds backward jumps per target (0 = unlimited).
    pub fn step(mut self, loop_limit: u32) -> Vec<State> {
        debug_assert_eq!(self.status, Status::Active);

        let Some(instruction) = self.instruction().cloned() else {
            // Ran off the end of the program (or the program is empty).
            self.status = Status::Deadended;
            return vec![self];
        };
        trace!(pc = self.pc, ?instruction, "step");

        match instruction {
            Instruction::Push(n) => {
                self.stack.push(Value::concrete(n));
                self.advance()
            }
            Instruction::Duplicate => match self.stack.last().cloned() {
                Some(top) => {
                    self.stack.push(top);
                    self.advance()
                }
                None => self.errored(ErrorKind::StackUnderflow),
            },
            Instruction::Copy(n) => {
                let len = self.stack.len();
                let Some(index) = depth_index(len, n) else {
                    return self.errored(ErrorKind::StackUnderflow);
                };
                let value = self.stack[index].clone();
                self.stack.push(value);
                self.advance()
            }
            Instruction::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return self.errored(ErrorKind::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
                self.advance()
            }
            Instruction::Discard => match self.pop() {
                Ok(_) => self.advance(),
                Err(kind) => self.errored(kind),
            },
            Instruction::Slide(n) => {
                let top = match self.pop() {
                    Ok(v) => v,
                    Err(kind) => return self.errored(kind),
                };
                let Ok(count) = usize::try_from(n) else {
                    return self.errored(ErrorKind::StackUnderflow);
                };
                if count > self.stack.len() {
                    return self.errored(ErrorKind::StackUnderflow);
                }
                self.stack.truncate(self.stack.len() - count);
                self.stack.push(top);
                self.advance()
            }

            Instruction::Add => self.binary_op(|a, b| a.add(b)),
            Instruction::Sub => self.binary_op(|a, b| a.sub(b)),
            Instruction::Mul => self.binary_op(|a, b| a.mul(b)),
            Instruction::Div => self.division_op(|a, b| a.div(b)),
            Instruction::Mod => self.division_op(|a, b| a.rem(b)),

            Instruction::Store => {
                let (value, addr) = match self.pop2() {
                    Ok(pair) => pair,
                    Err(kind) => return self.errored(kind),
                };
                self.heap.store(addr, value);
                self.advance()
            }
            Instruction::Retrieve => {
                let addr = match self.pop() {
                    Ok(v) => v,
                    Err(kind) => return self.errored(kind),
                };
                let value = self.heap.load(&addr);
                self.stack.push(value);
                self.advance()
            }

            Instruction::Mark(_) => self.advance(),
            Instruction::Call(label) => {
                let Some(target) = self.resolve(&label) else {
                    return self.errored(ErrorKind::BadLabel);
                };
                self.call_stack.push(self.pc + 1);
                self.jump_to(target, loop_limit);
                vec![self]
            }
            Instruction::Jump(label) => {
                let Some(target) = self.resolve(&label) else {
                    return self.errored(ErrorKind::BadLabel);
                };
                self.jump_to(target, loop_limit);
                vec![self]
            }
            Instruction::JumpZero(label) => self.conditional_jump(&label, loop_limit, true),
            Instruction::JumpNegative(label) => self.conditional_jump(&label, loop_limit, false),
            Instruction::Return => {
                let Some(target) = self.call_stack.pop() else {
                    return self.errored(ErrorKind::BadReturn);
                };
                self.jump_to(target, loop_limit);
                vec![self]
            }
            Instruction::Exit => {
                self.status = Status::Deadended;
                vec![self]
            }

            Instruction::OutChar => {
                let value = match self.pop() {
                    Ok(v) => v,
                    Err(kind) => return self.errored(kind),
                };
                self.stdout.push(value.truncate_byte());
                self.stdout_dirty = true;
                self.advance()
            }
            Instruction::OutNum => self.out_num(),
            Instruction::ReadChar => {
                let addr = match self.pop() {
                    Ok(v) => v,
                    Err(kind) => return self.errored(kind),
                };
                let cell = match self.next_stdin_cell(VarKind::Char) {
                    Ok(cell) => cell,
                    Err(kind) => return self.errored(kind),
                };
                self.heap.store(addr, cell);
                self.advance()
            }
            Instruction::ReadNum => self.read_num(),
        }
    }

    /// Move to the next instruction; the common single-successor epilogue.
    fn advance(mut self) -> Vec<State> {
        self.pc += 1;
        vec![self]
    }

    /// Terminate this state with a runtime error.
    fn errored(mut self, kind: ErrorKind) -> Vec<State> {
        trace!(pc = self.pc, %kind, "state errored");
        self.status = Status::Errored(kind);
        vec![self]
    }

    fn pop(&mut self) -> Result<Value, ErrorKind> {
        self.stack.pop().ok_or(ErrorKind::StackUnderflow)
    }

    /// Pop the top two values: `(top, beneath)`.
    fn pop2(&mut self) -> Result<(Value, Value), ErrorKind> {
        let top = self.pop()?;
        let beneath = self.pop()?;
        Ok((top, beneath))
    }

    fn resolve(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Pop `b` then `a`, push `a ⊕ b`.
    fn binary_op(mut self, op: impl Fn(&Value, &Value) -> Value) -> Vec<State> {
        let (b, a) = match self.pop2() {
            Ok(pair) => pair,
            Err(kind) => return self.errored(kind),
        };
        self.stack.push(op(&a, &b));
        self.advance()
    }

    /// Division and modulo: fork an error state along the feasibly-zero
    /// divisor branch, continuing with `divisor != 0` asserted.
    fn division_op(mut self, op: impl Fn(&Value, &Value) -> Value) -> Vec<State> {
        let (b, a) = match self.pop2() {
            Ok(pair) => pair,
            Err(kind) => return self.errored(kind),
        };
        match b.eq_zero() {
            Cond::Concrete(true) => self.errored(ErrorKind::DivByZero),
            Cond::Concrete(false) => {
                self.stack.push(op(&a, &b));
                self.advance()
            }
            Cond::Symbolic(is_zero) => {
                let nonzero_feasible = self.solver.is_feasible_with(&[is_zero.not()]);
                let zero_feasible = self.solver.is_feasible_with(&[is_zero.clone()]);
                let mut successors = Vec::new();
                if nonzero_feasible {
                    let mut cont = self.clone();
                    cont.solver.add(is_zero.not());
                    cont.stack.push(op(&a, &b));
                    cont.pc += 1;
                    successors.push(cont);
                }
                if zero_feasible {
                    self.solver.add(is_zero);
                    self.status = Status::Errored(ErrorKind::DivByZero);
                    successors.push(self);
                } else if successors.is_empty() {
                    self.status = Status::Unsat;
                    successors.push(self);
                }
                successors
            }
        }
    }

    /// Conditional jump on `top == 0` (`on_zero`) or `top < 0`.
    ///
    /// A symbolic predicate forks: each feasible branch gets its constraint
    /// committed, taken branch first. Infeasible branches are discarded.
    fn conditional_jump(mut self, label: &Label, loop_limit: u32, on_zero: bool) -> Vec<State> {
        let Some(target) = self.resolve(label) else {
            return self.errored(ErrorKind::BadLabel);
        };
        let value = match self.pop() {
            Ok(v) => v,
            Err(kind) => return self.errored(kind),
        };
        let cond = if on_zero {
            value.eq_zero()
        } else {
            value.lt_zero()
        };
        match cond {
            Cond::Concrete(true) => {
                self.jump_to(target, loop_limit);
                vec![self]
            }
            Cond::Concrete(false) => self.advance(),
            Cond::Symbolic(predicate) => {
                let taken_feasible = self.solver.is_feasible_with(&[predicate.clone()]);
                let not_taken_feasible = self.solver.is_feasible_with(&[predicate.not()]);
                let mut successors = Vec::new();
                if taken_feasible {
                    let mut taken = self.clone();
                    taken.solver.add(predicate.clone());
                    taken.jump_to(target, loop_limit);
                    successors.push(taken);
                }
                if not_taken_feasible {
                    self.solver.add(predicate.not());
                    self.pc += 1;
                    successors.push(self);
                } else if successors.is_empty() {
                    self.status = Status::Unsat;
                    successors.push(self);
                }
                successors
            }
        }
    }

    /// Output a number as decimal ASCII. A symbolic value is concretized
    /// under the current model and pinned to the chosen value, so later
    /// path constraints cannot contradict what was printed.
    fn out_num(mut self) -> Vec<State> {
        let value = match self.pop() {
            Ok(v) => v,
            Err(kind) => return self.errored(kind),
        };
        let n = match self.solver.eval(&value) {
            Ok(n) => n,
            Err(_) => {
                self.status = Status::Unsat;
                return vec![self];
            }
        };
        if !value.is_concrete() {
            self.solver.add(value.to_bv().eq(&Value::concrete(n).to_bv()));
        }
        for byte in n.to_string().bytes() {
            self.stdout.push(Value::Concrete(i64::from(byte)));
        }
        self.stdout_dirty = true;
        self.advance()
    }

    /// Read a number from stdin into the heap.
    ///
    /// A symbolic cell at the cursor is consumed as the whole number. A
    /// concrete window is parsed as `[-+]?digits` up to a newline (consumed)
    /// or end of input; anything else is a malformed number.
    fn read_num(mut self) -> Vec<State> {
        let addr = match self.pop() {
            Ok(v) => v,
            Err(kind) => return self.errored(kind),
        };

        if self.stdin_exhausted() {
            return self.errored(ErrorKind::EofStdin);
        }
        if self.peek_stdin_concrete().is_none() {
            // Symbolic cell, or auto-symbolic synthesis past the end.
            let cell = match self.next_stdin_cell(VarKind::Number) {
                Ok(cell) => cell,
                Err(kind) => return self.errored(kind),
            };
            self.heap.store(addr, cell);
            return self.advance();
        }

        match self.parse_concrete_number() {
            Ok(n) => {
                self.heap.store(addr, Value::concrete(n));
                self.advance()
            }
            Err(kind) => self.errored(kind),
        }
    }

    /// Parse a decimal number from concrete stdin cells, consuming through
    /// the terminating newline.
    fn parse_concrete_number(&mut self) -> Result<i64, ErrorKind> {
        let mut negative = false;
        let mut digits_seen = false;
        let mut value: i64 = 0;

        let first = self.peek_stdin_concrete().expect("checked by caller");
        if first == i64::from(b'-') || first == i64::from(b'+') {
            negative = first == i64::from(b'-');
            self.next_stdin_cell(VarKind::Char)?;
        }

        loop {
            match self.stdin.get(self.stdin_cursor) {
                None => break,
                Some(cell) => {
                    let Some(byte) = cell.as_concrete() else {
                        // Symbolic cell interrupting the digit run.
                        return Err(ErrorKind::MalformedNumber);
                    };
                    if byte == i64::from(b'\n') {
                        self.next_stdin_cell(VarKind::Char)?;
                        break;
                    }
                    if !(i64::from(b'0')..=i64::from(b'9')).contains(&byte) {
                        return Err(ErrorKind::MalformedNumber);
                    }
                    digits_seen = true;
                    value = value
                        .wrapping_mul(10)
                        .wrapping_add(byte - i64::from(b'0'));
                    self.next_stdin_cell(VarKind::Char)?;
                }
            }
        }

        if !digits_seen {
            return Err(ErrorKind::MalformedNumber);
        }
        Ok(if negative { -value } else { value })
    }
}

/// Stack index for `Copy(n)`: depth `n` from the top.
fn depth_index(len: usize, n: i64) -> Option<usize> {
    let n = usize::try_from(n).ok()?;
    len.checked_sub(n + 1)
}
