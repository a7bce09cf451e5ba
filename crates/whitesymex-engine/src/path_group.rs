//! The path group: a frontier of live states plus terminal stashes, driven
//! by an exploration strategy.

use crate::state::{State, Status};
use crate::strategy::Strategy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for one `explore` call.
#[derive(Debug, Clone)]
pub struct ExploreConfig {
    /// Goal byte substring of stdout.
    pub find: Option<Vec<u8>>,
    /// Forbidden byte substring of stdout.
    pub avoid: Option<Vec<u8>>,
    /// State selection strategy.
    pub strategy: Strategy,
    /// Maximum backward jumps per target before a state deadends
    /// (0 = unlimited).
    pub loop_limit: u32,
    /// Stop after this many found states.
    pub num_find: usize,
    /// Maximum interpreter steps (0 = unlimited). Checked between steps;
    /// individual solver calls are bounded by the per-query timeout instead.
    pub max_steps: usize,
    /// Wall-clock budget, checked between steps.
    pub max_time: Option<Duration>,
    /// RNG seed for the `Random` strategy. Unseeded runs draw from entropy.
    pub seed: Option<u64>,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            find: None,
            avoid: None,
            strategy: Strategy::Bfs,
            loop_limit: 10,
            num_find: 1,
            max_steps: 0,
            max_time: None,
            seed: None,
        }
    }
}

/// Why `explore` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExploreOutcome {
    /// `num_find` states matched the find pattern.
    FoundTarget { found: usize, steps: usize },
    /// The active frontier emptied.
    Exhausted { steps: usize },
    /// The step budget tripped.
    StepLimitReached { steps: usize },
    /// The wall-clock budget tripped.
    TimeLimitReached { steps: usize },
}

/// Classified stashes of execution states.
///
/// `explore` repeatedly selects one active state, steps it once, and
/// re-files the successors. Every state is owned by exactly one stash.
pub struct PathGroup {
    /// Live, still steppable states.
    pub active: VecDeque<State>,
    /// States whose stdout matched the find pattern.
    pub found: Vec<State>,
    /// States whose stdout could match the avoid pattern.
    pub avoided: Vec<State>,
    /// States that exited gracefully or hit the loop limit.
    pub deadended: Vec<State>,
    /// States that hit a runtime error.
    pub errored: Vec<State>,
    /// States pruned by the solver.
    pub unsat: Vec<State>,
}

impl PathGroup {
    /// Create a path group seeded with one entry state.
    pub fn new(state: State) -> Self {
        Self {
            active: VecDeque::from([state]),
            found: Vec::new(),
            avoided: Vec::new(),
            deadended: Vec::new(),
            errored: Vec::new(),
            unsat: Vec::new(),
        }
    }

    /// Explore until `num_find` states are found, the frontier empties, or
    /// a budget trips.
    pub fn explore(&mut self, config: &ExploreConfig) -> ExploreOutcome {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let started = Instant::now();
        let mut steps = 0usize;

        info!(
            strategy = %config.strategy,
            loop_limit = config.loop_limit,
            find = config.find.is_some(),
            avoid = config.avoid.is_some(),
            "exploring"
        );

        let outcome = loop {
            if self.found.len() >= config.num_find && config.find.is_some() {
                break ExploreOutcome::FoundTarget {
                    found: self.found.len(),
                    steps,
                };
            }
            if self.active.is_empty() {
                break ExploreOutcome::Exhausted { steps };
            }
            if config.max_steps > 0 && steps >= config.max_steps {
                break ExploreOutcome::StepLimitReached { steps };
            }
            if let Some(budget) = config.max_time {
                if started.elapsed() >= budget {
                    break ExploreOutcome::TimeLimitReached { steps };
                }
            }

            let index = config.strategy.select(self.active.len(), &mut rng);
            let state = self.active.remove(index).expect("index in bounds");
            steps += 1;
            for successor in state.step(config.loop_limit) {
                self.classify(successor, config);
            }
        };

        info!(?outcome, group = %self, "exploration finished");
        outcome
    }

    /// File one successor into the stash its status (and stdout) call for.
    fn classify(&mut self, mut state: State, config: &ExploreConfig) {
        match state.status {
            Status::Active => {
                if state.stdout_dirty {
                    state.stdout_dirty = false;
                    // Avoid takes precedence over find.
                    if let Some(pattern) = &config.avoid {
                        if state.stdout_match(pattern, false) {
                            debug!(pc = state.pc, "state avoided");
                            state.status = Status::Avoided;
                            self.avoided.push(state);
                            return;
                        }
                    }
                    if let Some(pattern) = &config.find {
                        if state.stdout_match(pattern, true) {
                            debug!(pc = state.pc, "state found");
                            state.status = Status::Found;
                            self.found.push(state);
                            return;
                        }
                    }
                }
                self.active.push_back(state);
            }
            Status::Deadended => {
                debug!(pc = state.pc, "state deadended");
                self.deadended.push(state);
            }
            Status::Errored(kind) => {
                debug!(pc = state.pc, %kind, "state errored");
                self.errored.push(state);
            }
            Status::Unsat => {
                debug!(pc = state.pc, "state unsat");
                self.unsat.push(state);
            }
            Status::Found | Status::Avoided => {
                unreachable!("the interpreter never classifies against patterns")
            }
        }
    }

    /// Total number of states across all stashes.
    pub fn len(&self) -> usize {
        self.active.len()
            + self.found.len()
            + self.avoided.len()
            + self.deadended.len()
            + self.errored.len()
            + self.unsat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PathGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stashes = [
            ("active", self.active.len()),
            ("found", self.found.len()),
            ("avoided", self.avoided.len()),
            ("deadended", self.deadended.len()),
            ("errored", self.errored.len()),
            ("unsat", self.unsat.len()),
        ];
        write!(f, "<PathGroup with ")?;
        let mut first = true;
        for (name, count) in stashes {
            if count > 0 {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{count} {name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "no states")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use whitesymex_syntax::Instruction as I;

    #[test]
    fn empty_program_exhausts_into_deadended() {
        let mut group = PathGroup::new(State::create_entry_state(vec![], Some(vec![])));
        let outcome = group.explore(&ExploreConfig::default());
        assert_eq!(outcome, ExploreOutcome::Exhausted { steps: 1 });
        assert_eq!(group.deadended.len(), 1);
        assert!(group.deadended[0].stdout.is_empty());
    }

    #[test]
    fn step_budget_trips() {
        // Endless concrete loop; without a step budget this would only stop
        // at the loop limit.
        let label = whitesymex_syntax::Label::from_bits(&[false]);
        let program = vec![I::Mark(label.clone()), I::Jump(label)];
        let mut group = PathGroup::new(State::create_entry_state(program, Some(vec![])));
        let config = ExploreConfig {
            max_steps: 5,
            loop_limit: 0,
            ..Default::default()
        };
        assert_eq!(
            group.explore(&config),
            ExploreOutcome::StepLimitReached { steps: 5 }
        );
        assert_eq!(group.active.len(), 1);
    }

    #[test]
    fn display_lists_nonempty_stashes() {
        let mut group = PathGroup::new(State::create_entry_state(vec![], Some(vec![])));
        assert_eq!(group.to_string(), "<PathGroup with 1 active>");
        group.explore(&ExploreConfig::default());
        assert_eq!(group.to_string(), "<PathGroup with 1 deadended>");
    }
}
