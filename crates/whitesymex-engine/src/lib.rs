//! Symbolic execution engine for Whitespace programs.
//!
//! The engine interprets a parsed instruction sequence over symbolic
//! machine words, forking at control-flow decisions on symbolic predicates
//! and at feasibly-zero divisors. Path constraints accumulate per state and
//! are decided by Z3; a [`PathGroup`] schedules the frontier and classifies
//! terminal states, and a found state concretizes back into the stdin bytes
//! that drive the program down its path.
//!
//! ```no_run
//! use whitesymex_engine::{ExploreConfig, PathGroup, State};
//!
//! let program = whitesymex_syntax::parse("...").unwrap();
//! let state = State::create_entry_state(program, None);
//! let mut group = PathGroup::new(state);
//! group.explore(&ExploreConfig {
//!     find: Some(b"Correct!".to_vec()),
//!     avoid: Some(b"Nope.".to_vec()),
//!     ..Default::default()
//! });
//! if let Some(found) = group.found.first_mut() {
//!     let stdin = found.concretize().unwrap();
//!     println!("{}", String::from_utf8_lossy(&stdin));
//! }
//! ```

pub mod error;
pub mod heap;
pub mod interp;
pub mod path_group;
pub mod solver;
pub mod state;
pub mod strategy;
pub mod value;

pub use error::{ErrorKind, SolverError};
pub use heap::Heap;
pub use path_group::{ExploreConfig, ExploreOutcome, PathGroup};
pub use solver::Solver;
pub use state::{State, Status, VarKind};
pub use strategy::Strategy;
pub use value::{Cond, Value, WORD_WIDTH};
