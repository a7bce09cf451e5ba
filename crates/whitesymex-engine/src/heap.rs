//! The Whitespace heap under symbolic addressing.
//!
//! Concrete addresses live in a point-wise map. A store through a symbolic
//! address is appended to an ordered log instead; a retrieve folds the
//! relevant log entries into an if-then-else chain over the address
//! comparisons, so nothing is concretized eagerly. Every write carries a
//! monotonic sequence number so that a later concrete store shadows any
//! earlier symbolic store to an aliasing address. Unwritten cells read as
//! zero.

use crate::value::{Value, WORD_WIDTH};
use std::collections::BTreeMap;
use z3::ast::BV;

/// Heap: point-wise concrete cells plus an ordered symbolic store log,
/// sequenced by write order.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    /// Cells written through concrete addresses: addr -> (seq, value).
    cells: BTreeMap<i64, (u64, Value)>,
    /// Stores through symbolic addresses: (seq, addr, value), oldest first.
    symbolic_log: Vec<(u64, BV, Value)>,
    /// Sequence number of the most recent write.
    last_seq: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a store. Concrete addresses update point-wise; symbolic
    /// addresses append to the log.
    pub fn store(&mut self, addr: Value, value: Value) {
        self.last_seq += 1;
        match addr {
            Value::Concrete(a) => {
                self.cells.insert(a, (self.last_seq, value));
            }
            Value::Symbolic(bv) => {
                self.symbolic_log.push((self.last_seq, bv, value));
            }
        }
    }

    /// Model the value at an address.
    ///
    /// A concrete address reads its point-wise cell, shadowed only by
    /// symbolic stores that postdate that cell's write (newest outermost).
    /// A symbolic address folds every write, concrete and symbolic, in
    /// chronological order. Either way the default is zero.
    pub fn load(&self, addr: &Value) -> Value {
        match addr {
            Value::Concrete(a) => {
                let (base_seq, base) = match self.cells.get(a) {
                    Some((seq, value)) => (*seq, value.clone()),
                    None => (0, Value::Concrete(0)),
                };
                let mut acc = base;
                for (seq, sym_addr, value) in &self.symbolic_log {
                    if *seq > base_seq {
                        let hit = sym_addr.eq(&BV::from_i64(*a, WORD_WIDTH));
                        acc = Value::ite(&hit, value, &acc);
                    }
                }
                acc
            }
            Value::Symbolic(bv) => {
                let mut writes: Vec<(u64, BV, &Value)> = self
                    .cells
                    .iter()
                    .map(|(a, (seq, value))| (*seq, BV::from_i64(*a, WORD_WIDTH), value))
                    .collect();
                for (seq, sym_addr, value) in &self.symbolic_log {
                    writes.push((*seq, sym_addr.clone(), value));
                }
                writes.sort_by_key(|(seq, _, _)| *seq);

                // Oldest to newest, so the newest write ends up outermost.
                let mut acc = Value::Concrete(0);
                for (_, write_addr, value) in writes {
                    let hit = bv.eq(&write_addr);
                    acc = Value::ite(&hit, value, &acc);
                }
                acc
            }
        }
    }

    /// Number of distinct concrete cells written.
    pub fn concrete_len(&self) -> usize {
        self.cells.len()
    }

    /// Number of symbolic stores logged.
    pub fn symbolic_len(&self) -> usize {
        self.symbolic_log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Solver;

    #[test]
    fn unwritten_cells_read_zero() {
        let heap = Heap::new();
        assert_eq!(heap.load(&Value::concrete(99)), Value::Concrete(0));
    }

    #[test]
    fn concrete_store_and_load() {
        let mut heap = Heap::new();
        heap.store(Value::concrete(3), Value::concrete(7));
        heap.store(Value::concrete(3), Value::concrete(8));
        assert_eq!(heap.load(&Value::concrete(3)), Value::Concrete(8));
        assert_eq!(heap.concrete_len(), 1);
    }

    #[test]
    fn symbolic_store_produces_ite_on_load() {
        let mut heap = Heap::new();
        let x = BV::new_const("addr", WORD_WIDTH);
        heap.store(Value::Symbolic(x), Value::concrete(7));
        assert_eq!(heap.symbolic_len(), 1);

        let y = Value::Symbolic(BV::new_const("other", WORD_WIDTH));
        assert!(!heap.load(&y).is_concrete());
        // A concrete load must also see the symbolic store as a possibility.
        assert!(!heap.load(&Value::concrete(5)).is_concrete());
    }

    #[test]
    fn concrete_load_stays_concrete_without_symbolic_stores() {
        let mut heap = Heap::new();
        heap.store(Value::concrete(0), Value::concrete(42));
        assert!(heap.load(&Value::concrete(0)).is_concrete());
        assert!(heap.load(&Value::concrete(1)).is_concrete());
    }

    #[test]
    fn later_concrete_store_shadows_earlier_symbolic_store() {
        let mut heap = Heap::new();
        let x = BV::new_const("shadowed", WORD_WIDTH);
        heap.store(Value::Symbolic(x), Value::concrete(7));
        heap.store(Value::concrete(5), Value::concrete(42));
        // The concrete write to 5 postdates the symbolic store, so it wins
        // unconditionally, whatever the symbolic address aliases.
        assert_eq!(heap.load(&Value::concrete(5)), Value::Concrete(42));
        // Other cells are still exposed to the symbolic store.
        assert!(!heap.load(&Value::concrete(6)).is_concrete());
    }

    #[test]
    fn later_symbolic_store_shadows_earlier_concrete_store() {
        let mut heap = Heap::new();
        let x = BV::new_const("alias", WORD_WIDTH);
        heap.store(Value::concrete(5), Value::concrete(42));
        heap.store(Value::Symbolic(x.clone()), Value::concrete(7));
        let loaded = heap.load(&Value::concrete(5));
        assert!(!loaded.is_concrete());

        // Under x == 5 the symbolic store wins; under x != 5 the concrete
        // cell shows through.
        let mut solver = Solver::new();
        solver.add(x.eq(&BV::from_i64(5, WORD_WIDTH)));
        assert_eq!(solver.eval(&loaded).unwrap(), 7);

        let mut solver = Solver::new();
        solver.add(x.eq(&BV::from_i64(5, WORD_WIDTH)).not());
        assert_eq!(solver.eval(&loaded).unwrap(), 42);
    }

    #[test]
    fn symbolic_load_respects_write_order() {
        let mut heap = Heap::new();
        let x = BV::new_const("w", WORD_WIDTH);
        let y = Value::Symbolic(BV::new_const("r", WORD_WIDTH));
        heap.store(Value::Symbolic(x.clone()), Value::concrete(1));
        heap.store(Value::concrete(5), Value::concrete(2));
        let loaded = heap.load(&y);

        // With r == x == 5, the concrete store is the newest write to 5.
        let mut solver = Solver::new();
        let five = BV::from_i64(5, WORD_WIDTH);
        solver.add(x.eq(&five));
        solver.add(y.to_bv().eq(&five));
        assert_eq!(solver.eval(&loaded).unwrap(), 2);
    }
}
