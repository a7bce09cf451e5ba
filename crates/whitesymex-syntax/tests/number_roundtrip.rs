//! Property tests for number and label payload encoding.

use proptest::prelude::*;
use whitesymex_syntax::{parse, Instruction};

/// Encode a push instruction the way a Whitespace assembler would:
/// stack IMP, push opcode, sign token, magnitude bits, linefeed.
fn encode_push(n: i64) -> String {
    let mut out = String::from("  ");
    out.push(if n < 0 { '\t' } else { ' ' });
    let magnitude = n.unsigned_abs();
    if magnitude > 0 {
        let width = 64 - magnitude.leading_zeros();
        for i in (0..width).rev() {
            out.push(if (magnitude >> i) & 1 == 1 { '\t' } else { ' ' });
        }
    }
    out.push('\n');
    out
}

proptest! {
    #[test]
    fn push_payload_roundtrips(n in -(1i64 << 62)..(1i64 << 62)) {
        let source = encode_push(n);
        let program = parse(&source).unwrap();
        prop_assert_eq!(program, vec![Instruction::Push(n)]);
    }

    #[test]
    fn leading_zero_bits_are_redundant_in_numbers(n in 0i64..1_000_000) {
        // "0...0bits" and "bits" decode to the same number.
        let padded = {
            let mut out = String::from("   ");
            out.push_str("  ");
            let width = if n == 0 { 0 } else { 64 - n.leading_zeros() };
            for i in (0..width).rev() {
                out.push(if (n >> i) & 1 == 1 { '\t' } else { ' ' });
            }
            out.push('\n');
            out
        };
        let plain = encode_push(n);
        prop_assert_eq!(parse(&padded).unwrap(), parse(&plain).unwrap());
    }
}
