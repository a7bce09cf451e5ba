//! Machine words: concrete integers and symbolic bitvectors.
//!
//! Every value the interpreter touches is a [`Value`]. Arithmetic stays in
//! the concrete domain until a symbolic operand forces a lift into Z3
//! bitvectors of [`WORD_WIDTH`] bits; all arithmetic is mod 2^32.

use z3::ast::{Bool, BV};

/// Bitvector width of a machine word. All arithmetic is mod 2^32.
pub const WORD_WIDTH: u32 = 32;

/// Normalize an `i64` into the sign-extended 32-bit range.
#[inline]
pub fn truncate_word(n: i64) -> i64 {
    n as i32 as i64
}

/// Floor division: rounds toward negative infinity (Whitespace convention).
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Floor remainder: takes the divisor's sign.
pub fn floor_rem(a: i64, b: i64) -> i64 {
    a - floor_div(a, b) * b
}

/// A machine word: either a concrete integer or a symbolic bitvector.
#[derive(Debug, Clone)]
pub enum Value {
    /// A concrete word, normalized to the sign-extended 32-bit range.
    Concrete(i64),
    /// A symbolic word: a width-32 Z3 bitvector expression.
    Symbolic(BV),
}

/// Structural equality, used by tests and assertions. Only concrete values
/// compare equal; semantic equality over symbolic values goes through
/// [`Value::equals`] and the solver.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Concrete(a), Value::Concrete(b)) => a == b,
            _ => false,
        }
    }
}

/// A branch predicate over values.
#[derive(Debug, Clone)]
pub enum Cond {
    Concrete(bool),
    Symbolic(Bool),
}

impl Value {
    /// Create a concrete value, wrapping into the 32-bit range.
    pub fn concrete(n: i64) -> Self {
        Value::Concrete(truncate_word(n))
    }

    /// Whether this value is concrete.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Value::Concrete(_))
    }

    /// The concrete integer, if this value is concrete.
    pub fn as_concrete(&self) -> Option<i64> {
        match self {
            Value::Concrete(n) => Some(*n),
            Value::Symbolic(_) => None,
        }
    }

    /// Lift into the bitvector domain.
    pub fn to_bv(&self) -> BV {
        match self {
            Value::Concrete(n) => BV::from_i64(*n, WORD_WIDTH),
            Value::Symbolic(bv) => bv.clone(),
        }
    }

    pub fn add(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Value::concrete(a.wrapping_add(*b)),
            _ => Value::Symbolic(self.to_bv().bvadd(&rhs.to_bv())),
        }
    }

    pub fn sub(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Value::concrete(a.wrapping_sub(*b)),
            _ => Value::Symbolic(self.to_bv().bvsub(&rhs.to_bv())),
        }
    }

    pub fn mul(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Value::concrete(a.wrapping_mul(*b)),
            _ => Value::Symbolic(self.to_bv().bvmul(&rhs.to_bv())),
        }
    }

    /// Floor division. The caller has already ruled out (or forked away) a
    /// zero divisor.
    pub fn div(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Value::concrete(floor_div(*a, *b)),
            _ => {
                // bvsdiv truncates toward zero; correct to floor when the
                // operand signs disagree and the remainder is nonzero.
                let a = self.to_bv();
                let b = rhs.to_bv();
                let zero = BV::from_i64(0, WORD_WIDTH);
                let one = BV::from_i64(1, WORD_WIDTH);
                let q = a.bvsdiv(&b);
                let r = a.bvsrem(&b);
                let signs_differ = a.bvslt(&zero).eq(&b.bvslt(&zero)).not();
                let needs_fix = Bool::and(&[signs_differ, r.eq(&zero).not()]);
                Value::Symbolic(needs_fix.ite(&q.bvsub(&one), &q))
            }
        }
    }

    /// Floor remainder (sign of the divisor). Zero divisors are the
    /// caller's problem, as with [`Value::div`].
    pub fn rem(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Value::concrete(floor_rem(*a, *b)),
            // bvsmod already takes the divisor's sign.
            _ => Value::Symbolic(self.to_bv().bvsmod(&rhs.to_bv())),
        }
    }

    /// The predicate `self == 0`.
    pub fn eq_zero(&self) -> Cond {
        match self {
            Value::Concrete(n) => Cond::Concrete(*n == 0),
            Value::Symbolic(bv) => Cond::Symbolic(bv.eq(&BV::from_i64(0, WORD_WIDTH))),
        }
    }

    /// The predicate `self < 0` (signed).
    pub fn lt_zero(&self) -> Cond {
        match self {
            Value::Concrete(n) => Cond::Concrete(*n < 0),
            Value::Symbolic(bv) => Cond::Symbolic(bv.bvslt(&BV::from_i64(0, WORD_WIDTH))),
        }
    }

    /// The predicate `self == rhs`.
    pub fn equals(&self, rhs: &Value) -> Cond {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Cond::Concrete(a == b),
            _ => Cond::Symbolic(self.to_bv().eq(&rhs.to_bv())),
        }
    }

    /// The predicate `self != rhs`.
    pub fn not_equals(&self, rhs: &Value) -> Cond {
        self.equals(rhs).not()
    }

    /// The predicate `self < rhs` (signed).
    pub fn lt(&self, rhs: &Value) -> Cond {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Cond::Concrete(a < b),
            _ => Cond::Symbolic(self.to_bv().bvslt(&rhs.to_bv())),
        }
    }

    /// The predicate `self <= rhs` (signed).
    pub fn le(&self, rhs: &Value) -> Cond {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Cond::Concrete(a <= b),
            _ => Cond::Symbolic(self.to_bv().bvsle(&rhs.to_bv())),
        }
    }

    /// The predicate `self > rhs` (signed).
    pub fn gt(&self, rhs: &Value) -> Cond {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Cond::Concrete(a > b),
            _ => Cond::Symbolic(self.to_bv().bvsgt(&rhs.to_bv())),
        }
    }

    /// The predicate `self >= rhs` (signed).
    pub fn ge(&self, rhs: &Value) -> Cond {
        match (self, rhs) {
            (Value::Concrete(a), Value::Concrete(b)) => Cond::Concrete(a >= b),
            _ => Cond::Symbolic(self.to_bv().bvsge(&rhs.to_bv())),
        }
    }

    /// Keep the low 8 bits, zero-extended back to word width. Used when a
    /// word is emitted to stdout as a character.
    pub fn truncate_byte(&self) -> Value {
        match self {
            Value::Concrete(n) => Value::Concrete(n & 0xFF),
            Value::Symbolic(bv) => {
                Value::Symbolic(bv.extract(7, 0).zero_ext(WORD_WIDTH - 8))
            }
        }
    }

    /// `if cond { a } else { b }` over values.
    pub fn ite(cond: &Bool, a: &Value, b: &Value) -> Value {
        if let (Value::Concrete(x), Value::Concrete(y)) = (a, b) {
            if x == y {
                return a.clone();
            }
        }
        Value::Symbolic(cond.ite(&a.to_bv(), &b.to_bv()))
    }
}

impl Cond {
    /// Negate the predicate.
    pub fn not(&self) -> Cond {
        match self {
            Cond::Concrete(b) => Cond::Concrete(!b),
            Cond::Symbolic(c) => Cond::Symbolic(c.not()),
        }
    }

    /// Lift into a Z3 boolean.
    pub fn to_bool(&self) -> Bool {
        match self {
            Cond::Concrete(b) => Bool::from_bool(*b),
            Cond::Symbolic(c) => c.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_arithmetic_wraps_to_word() {
        let a = Value::concrete(i64::from(i32::MAX));
        let one = Value::concrete(1);
        assert_eq!(a.add(&one), Value::Concrete(i64::from(i32::MIN)));
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
    }

    #[test]
    fn floor_remainder_takes_divisor_sign() {
        assert_eq!(floor_rem(7, 2), 1);
        assert_eq!(floor_rem(-7, 2), 1);
        assert_eq!(floor_rem(7, -2), -1);
        assert_eq!(floor_rem(-7, -2), -1);
    }

    #[test]
    fn division_overflow_wraps() {
        let a = Value::concrete(i64::from(i32::MIN));
        let b = Value::concrete(-1);
        assert_eq!(a.div(&b), Value::Concrete(i64::from(i32::MIN)));
    }

    #[test]
    fn truncate_byte_masks_low_bits() {
        assert_eq!(Value::concrete(0x1F041).truncate_byte(), Value::Concrete(0x41));
        assert_eq!(Value::concrete(-1).truncate_byte(), Value::Concrete(0xFF));
    }

    #[test]
    fn symbolic_lift_only_when_needed() {
        let a = Value::concrete(2);
        let b = Value::concrete(3);
        assert!(a.mul(&b).is_concrete());

        let x = Value::Symbolic(BV::new_const("x", WORD_WIDTH));
        assert!(!a.mul(&x).is_concrete());
    }

    #[test]
    fn concrete_predicates() {
        assert!(matches!(Value::concrete(0).eq_zero(), Cond::Concrete(true)));
        assert!(matches!(Value::concrete(-3).lt_zero(), Cond::Concrete(true)));
        assert!(matches!(Value::concrete(5).eq_zero(), Cond::Concrete(false)));
    }
}
