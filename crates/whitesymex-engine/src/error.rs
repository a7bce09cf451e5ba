//! Error taxonomy for the symbolic execution engine.

use thiserror::Error;

/// A runtime error that terminates a single execution state.
///
/// These never abort exploration: the owning state moves to the path
/// group's `errored` stash with the kind attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("pop from empty stack")]
    StackUnderflow,

    #[error("jump or call to undefined label")]
    BadLabel,

    #[error("return with empty call stack")]
    BadReturn,

    #[error("division by zero")]
    DivByZero,

    #[error("read past end of stdin")]
    EofStdin,

    #[error("stdin window is not a decimal number")]
    MalformedNumber,

    /// Reserved for opcodes the parser should never produce.
    #[error("invalid instruction")]
    InvalidInstruction,
}

/// An engine-level solver failure, surfaced from model extraction.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("path constraints have no model")]
    NoModel,

    #[error("solver timed out during model extraction")]
    Timeout,

    #[error("expression did not evaluate to a numeral: {0}")]
    NotConcrete(String),
}
