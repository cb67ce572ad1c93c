//! Unary tape layouts for the arithmetic programs. The number `n` is written as `n + 1`
//! consecutive `1`s on a binary tape with blank `0`.

use crate::tape::Tape;
use crate::types::{Word, BINARY_ONE, BINARY_ZERO};

/// Tape for `a + 1`: `a + 1` ones.
pub fn succession(a: usize) -> Tape {
    let mut tape = Tape::binary();
    for _ in 0..=a {
        tape.push(Word::from(BINARY_ONE));
    }
    tape
}

/// Tape for `a + b`: the operands separated by a single `0`.
pub fn addition(a: usize, b: usize) -> Tape {
    let mut tape = succession(a);
    tape.push(Word::from(BINARY_ZERO));
    tape.extend(&succession(b));
    tape
}

/// Tape for `a * b`. Uses the same layout as [`addition`].
pub fn multiplication(a: usize, b: usize) -> Tape {
    addition(a, b)
}
