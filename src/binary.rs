//! This module provides the bit-level codec behind the binary controller: bits, free-form
//! binary sequences, the fixed-layout state sequence and the control sequence (one encoded
//! edge).
//!
//! Layout of a state sequence with a label width of `W` bits:
//!
//! ```text
//! [root:1][label:W][terminal:1][status:1][opcode:1][param:1]
//! \_______________ identity ______________/\__ operation __/
//! ```
//!
//! A control sequence is `source || condition || target`, with the condition a single bit
//! and both states sharing the same width.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::action::Action;
use crate::types::{ControlError, Label, State, Status, Word, BINARY_ONE, BINARY_ZERO};

/// Minimum width of a state sequence: root, one label bit, terminal, status, two operation bits.
pub const MIN_STATE_SEQUENCE_LEN: usize = 6;
/// Width of the operation block of a state sequence.
pub const OPERATION_SEQUENCE_LEN: usize = 2;
/// Number of flag bits (root, terminal, status) surrounding the label in an identity block.
pub const IDENTITY_FLAG_LEN: usize = 3;
/// Widest label supported by the codec.
pub const MAX_LABEL_BITS: usize = 32;

/// A single binary digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    pub fn value(&self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    pub fn is_set(&self) -> bool {
        *self == Bit::One
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl TryFrom<char> for Bit {
    type Error = ControlError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            BINARY_ZERO => Ok(Bit::Zero),
            BINARY_ONE => Ok(Bit::One),
            _ => Err(ControlError::InvalidBit(c)),
        }
    }
}

impl TryFrom<Word> for Bit {
    type Error = ControlError;

    fn try_from(word: Word) -> Result<Self, Self::Error> {
        Bit::try_from(word.symbol()).map_err(|_| ControlError::NonBinarySymbol(word))
    }
}

impl From<Bit> for Word {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => Word::from(BINARY_ZERO),
            Bit::One => Word::from(BINARY_ONE),
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// The operations shared by every bit-string type.
pub trait BitString {
    /// Returns the full bit string.
    fn to_sequence(&self) -> BinarySequence;

    /// Returns the unsigned integer value of the bit string.
    fn to_int(&self) -> u128;

    /// Inserts `padding` copies of `value` on the left or the right.
    fn pad(&mut self, padding: usize, value: Bit, left: bool) -> Result<(), ControlError>;

    fn len(&self) -> usize {
        self.to_sequence().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered, possibly empty sequence of bits.
///
/// Equality, hashing and ordering follow the literal bit string, so `"01" < "1"`.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinarySequence {
    bits: Vec<Bit>,
}

impl BinarySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `value` MSB-first in exactly `width` bits.
    pub fn from_int(value: u128, width: usize) -> Result<Self, ControlError> {
        if width < u128::BITS as usize && value >> width != 0 {
            return Err(ControlError::Overflow { value, width });
        }

        let bits = (0..width)
            .rev()
            .map(|i| {
                if i >= u128::BITS as usize {
                    Bit::Zero
                } else {
                    Bit::from((value >> i) & 1 == 1)
                }
            })
            .collect();
        Ok(Self { bits })
    }

    pub fn bits(&self) -> &[Bit] {
        &self.bits
    }

    pub fn push(&mut self, bit: Bit) {
        self.bits.push(bit);
    }

    /// Appends every bit of `other`.
    pub fn extend(&mut self, other: &BinarySequence) {
        self.bits.extend_from_slice(&other.bits);
    }

    /// Returns the bits in `range` as a new sequence.
    pub fn slice(&self, range: std::ops::Range<usize>) -> BinarySequence {
        Self::from(self.bits[range].to_vec())
    }
}

impl BitString for BinarySequence {
    fn to_sequence(&self) -> BinarySequence {
        self.clone()
    }

    /// MSB-first. Sequences longer than 128 bits keep only their low 128 bits.
    fn to_int(&self) -> u128 {
        self.bits
            .iter()
            .fold(0u128, |acc, bit| (acc << 1) | bit.value() as u128)
    }

    fn pad(&mut self, padding: usize, value: Bit, left: bool) -> Result<(), ControlError> {
        let fill = std::iter::repeat(value).take(padding);
        if left {
            self.bits.splice(0..0, fill);
        } else {
            self.bits.extend(fill);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.bits.len()
    }
}

impl From<Vec<Bit>> for BinarySequence {
    fn from(bits: Vec<Bit>) -> Self {
        Self { bits }
    }
}

impl FromStr for BinarySequence {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(Bit::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from)
    }
}

impl TryFrom<String> for BinarySequence {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinarySequence> for String {
    fn from(sequence: BinarySequence) -> Self {
        sequence.to_string()
    }
}

impl fmt::Display for BinarySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.bits {
            write!(f, "{bit}")?;
        }
        Ok(())
    }
}

/// Returns the label width needed to give `state_count` states distinct labels:
/// `ceil(log2(state_count))`, at least 1.
pub fn label_width(state_count: usize) -> usize {
    if state_count <= 2 {
        return 1;
    }
    (usize::BITS - (state_count - 1).leading_zeros()) as usize
}

/// Returns the number of bits needed to write `value`, at least 1.
pub fn bits_for(value: u128) -> usize {
    ((u128::BITS - value.leading_zeros()) as usize).max(1)
}

impl State {
    /// Encodes the identity block `[root] + label(label_size) + [terminal, status]`.
    pub fn to_binary(&self, label_size: usize) -> Result<BinarySequence, ControlError> {
        let mut identity = BinarySequence::from(vec![Bit::from(self.root)]);
        identity.extend(&BinarySequence::from_int(self.label as u128, label_size)?);
        identity.push(Bit::from(self.terminal));
        identity.push(Bit::from(self.status == Status::Failure));
        Ok(identity)
    }
}

/// The binary record of one state together with the action performed on entering it.
///
/// Every derived field is read from its bit position; nothing is stored twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateSequence {
    identity: BinarySequence,
    operation: BinarySequence,
}

impl StateSequence {
    pub fn new(identity: BinarySequence, operation: BinarySequence) -> Result<Self, ControlError> {
        if operation.len() != OPERATION_SEQUENCE_LEN {
            return Err(ControlError::InvalidSequence(format!(
                "operation block must be {OPERATION_SEQUENCE_LEN} bits, got {operation:?}"
            )));
        }

        let min_identity = MIN_STATE_SEQUENCE_LEN - OPERATION_SEQUENCE_LEN;
        if identity.len() < min_identity {
            return Err(ControlError::InvalidSequence(format!(
                "identity block must be at least {min_identity} bits, got '{identity}'"
            )));
        }

        if identity.len() - IDENTITY_FLAG_LEN > MAX_LABEL_BITS {
            return Err(ControlError::InvalidSequence(format!(
                "label wider than {MAX_LABEL_BITS} bits in '{identity}'"
            )));
        }

        Ok(Self {
            identity,
            operation,
        })
    }

    /// Encodes `state` with a `label_size`-bit label and `action` as its operation.
    pub fn encode(state: &State, label_size: usize, action: &Action) -> Result<Self, ControlError> {
        Self::new(state.to_binary(label_size)?, action.to_binary()?)
    }

    pub fn identity(&self) -> &BinarySequence {
        &self.identity
    }

    pub fn operation(&self) -> &BinarySequence {
        &self.operation
    }

    /// Width of the label sub-field.
    pub fn label_size(&self) -> usize {
        self.identity.len() - IDENTITY_FLAG_LEN
    }

    pub fn root(&self) -> bool {
        self.identity.bits()[0].is_set()
    }

    /// The fourth bit from the end of the full sequence.
    pub fn terminal(&self) -> bool {
        self.identity.bits()[self.identity.len() - 2].is_set()
    }

    /// The third bit from the end of the full sequence.
    pub fn status(&self) -> Status {
        if self.identity.bits()[self.identity.len() - 1].is_set() {
            Status::Failure
        } else {
            Status::Success
        }
    }

    /// The integer value of the bits between the root bit and the terminal/status pair.
    pub fn label(&self) -> Label {
        self.identity.slice(1..self.identity.len() - 2).to_int() as Label
    }

    pub fn to_state(&self) -> State {
        State {
            label: self.label(),
            root: self.root(),
            terminal: self.terminal(),
            status: self.status(),
        }
    }

    /// Decodes the operation block.
    pub fn action(&self) -> Action {
        let bits = self.operation.bits();
        Action::from_bits(bits[0], bits[1])
    }

    /// Returns a copy with the label sub-field rewritten to `label` in `label_size` bits.
    /// Flag bits and the operation block are preserved.
    pub fn relabel(&self, label: Label, label_size: usize) -> Result<Self, ControlError> {
        let bits = self.identity.bits();
        let mut identity = BinarySequence::from(vec![bits[0]]);
        identity.extend(&BinarySequence::from_int(label as u128, label_size)?);
        identity.extend(&self.identity.slice(bits.len() - 2..bits.len()));
        Self::new(identity, self.operation.clone())
    }
}

impl BitString for StateSequence {
    fn to_sequence(&self) -> BinarySequence {
        let mut sequence = self.identity.clone();
        sequence.extend(&self.operation);
        sequence
    }

    /// The operation block occupies the high bits: `identity + operation * 2^|identity|`.
    fn to_int(&self) -> u128 {
        self.identity.to_int() + (self.operation.to_int() << self.identity.len())
    }

    fn pad(&mut self, _padding: usize, _value: Bit, _left: bool) -> Result<(), ControlError> {
        Err(ControlError::InvalidPad("StateSequence"))
    }

    fn len(&self) -> usize {
        self.identity.len() + self.operation.len()
    }
}

impl FromStr for StateSequence {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: BinarySequence = s.parse()?;
        if bits.len() < MIN_STATE_SEQUENCE_LEN {
            return Err(ControlError::InvalidSequence(format!(
                "state sequence must be at least {MIN_STATE_SEQUENCE_LEN} bits, got '{s}'"
            )));
        }

        let split = bits.len() - OPERATION_SEQUENCE_LEN;
        Self::new(bits.slice(0..split), bits.slice(split..bits.len()))
    }
}

impl fmt::Display for StateSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.identity, self.operation)
    }
}

/// One binary-encoded edge: `source || condition || target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControlSequence {
    source: StateSequence,
    condition: Bit,
    target: StateSequence,
}

impl ControlSequence {
    /// Builds a control sequence. The condition must be exactly one bit and both states must
    /// share the same width.
    pub fn new(
        source: StateSequence,
        condition: BinarySequence,
        target: StateSequence,
    ) -> Result<Self, ControlError> {
        match condition.bits() {
            [bit] => Self::with_bit(source, *bit, target),
            _ => Err(ControlError::InvalidSequence(format!(
                "condition must be exactly 1 bit, got '{condition}'"
            ))),
        }
    }

    pub fn with_bit(
        source: StateSequence,
        condition: Bit,
        target: StateSequence,
    ) -> Result<Self, ControlError> {
        if source.len() != target.len() {
            return Err(ControlError::SequenceLengthMismatch {
                expected: source.len(),
                actual: target.len(),
            });
        }

        Ok(Self {
            source,
            condition,
            target,
        })
    }

    pub fn source(&self) -> &StateSequence {
        &self.source
    }

    pub fn condition(&self) -> Bit {
        self.condition
    }

    pub fn target(&self) -> &StateSequence {
        &self.target
    }

    /// Width of the label sub-field of both states.
    pub fn label_size(&self) -> usize {
        self.source.label_size()
    }

    pub(crate) fn map_states<F>(&self, mut f: F) -> Result<Self, ControlError>
    where
        F: FnMut(&StateSequence) -> Result<StateSequence, ControlError>,
    {
        Self::with_bit(f(&self.source)?, self.condition, f(&self.target)?)
    }
}

impl BitString for ControlSequence {
    fn to_sequence(&self) -> BinarySequence {
        let mut sequence = self.source.to_sequence();
        sequence.push(self.condition);
        sequence.extend(&self.target.to_sequence());
        sequence
    }

    /// Packs the target in the low bits:
    /// `target + condition * 2^|target| + source * 2^(|target| + 1)`.
    fn to_int(&self) -> u128 {
        let target_len = self.target.len();
        self.target.to_int()
            + ((self.condition.value() as u128) << target_len)
            + (self.source.to_int() << (target_len + 1))
    }

    fn pad(&mut self, _padding: usize, _value: Bit, _left: bool) -> Result<(), ControlError> {
        Err(ControlError::InvalidPad("ControlSequence"))
    }

    fn len(&self) -> usize {
        self.source.len() + 1 + self.target.len()
    }
}

impl PartialOrd for ControlSequence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ControlSequence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_int()
            .cmp(&other.to_int())
            .then_with(|| self.to_sequence().cmp(&other.to_sequence()))
    }
}

impl FromStr for ControlSequence {
    type Err = ControlError;

    /// Splits a bit string of odd length `2n + 1` into an `n`-bit source, one condition bit and
    /// an `n`-bit target.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: BinarySequence = s.parse()?;
        let len = bits.len();
        if len % 2 == 0 || len < 2 * MIN_STATE_SEQUENCE_LEN + 1 {
            return Err(ControlError::InvalidSequence(format!(
                "control sequence must be 2n + 1 bits with n >= {MIN_STATE_SEQUENCE_LEN}, got '{s}'"
            )));
        }

        let half = len / 2;
        let source = bits.slice(0..half).to_string().parse()?;
        let target = bits.slice(half + 1..len).to_string().parse()?;
        Self::with_bit(source, bits.bits()[half], target)
    }
}

impl TryFrom<String> for ControlSequence {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ControlSequence> for String {
    fn from(sequence: ControlSequence) -> Self {
        sequence.to_string()
    }
}

impl fmt::Display for ControlSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source, self.condition, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Direction;

    fn seq(s: &str) -> BinarySequence {
        s.parse().unwrap()
    }

    #[test]
    fn test_to_int_is_msb_first() {
        assert_eq!(seq("").to_int(), 0);
        assert_eq!(seq("1").to_int(), 1);
        assert_eq!(seq("10").to_int(), 2);
        assert_eq!(seq("0110").to_int(), 6);
    }

    #[test]
    fn test_from_int_checks_width() {
        assert_eq!(BinarySequence::from_int(5, 4).unwrap().to_string(), "0101");
        assert_eq!(
            BinarySequence::from_int(4, 2),
            Err(ControlError::Overflow { value: 4, width: 2 })
        );
    }

    #[test]
    fn test_invalid_bit_character() {
        assert_eq!(
            "012".parse::<BinarySequence>(),
            Err(ControlError::InvalidBit('2'))
        );
    }

    #[test]
    fn test_pad_left_and_right() {
        let mut bits = seq("1");
        bits.pad(2, Bit::Zero, true).unwrap();
        assert_eq!(bits.to_string(), "001");

        bits.pad(1, Bit::One, false).unwrap();
        assert_eq!(bits.to_string(), "0011");
        assert_eq!(bits.to_int(), 3);
    }

    #[test]
    fn test_ordering_follows_bit_string() {
        assert!(seq("01") < seq("1"));
        assert!(seq("0") < seq("00"));
        assert_eq!(seq("101"), seq("101"));
    }

    #[test]
    fn test_label_width() {
        assert_eq!(label_width(0), 1);
        assert_eq!(label_width(1), 1);
        assert_eq!(label_width(2), 1);
        assert_eq!(label_width(3), 2);
        assert_eq!(label_width(4), 2);
        assert_eq!(label_width(5), 3);
        assert_eq!(label_width(9), 4);
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(4), 3);
        assert_eq!(bits_for(7), 3);
    }

    #[test]
    fn test_state_identity_layout() {
        let state = State {
            label: 2,
            root: true,
            terminal: true,
            status: Status::Failure,
        };
        assert_eq!(state.to_binary(3).unwrap().to_string(), "101011");
        assert_eq!(
            State::new(4).to_binary(2),
            Err(ControlError::Overflow { value: 4, width: 2 })
        );
    }

    #[test]
    fn test_state_sequence_fields() {
        // root=1, label=10, terminal=1, status=0, operation=Write 1
        let sequence: StateSequence = "1101011".parse().unwrap();

        assert!(sequence.root());
        assert_eq!(sequence.label(), 2);
        assert_eq!(sequence.label_size(), 2);
        assert!(sequence.terminal());
        assert_eq!(sequence.status(), Status::Success);
        assert_eq!(sequence.action(), Action::Write(Word::from('1')));
        assert_eq!(sequence.to_state(), State {
            label: 2,
            root: true,
            terminal: true,
            status: Status::Success,
        });
    }

    #[test]
    fn test_state_sequence_round_trip() {
        let states = [
            State::root(0),
            State::new(5),
            State::terminal(7, Status::Failure),
            State::terminal(1, Status::Success),
        ];

        for state in states {
            let sequence =
                StateSequence::encode(&state, 3, &Action::Move(Direction::Left)).unwrap();
            assert_eq!(sequence.len(), 8);
            assert_eq!(sequence.to_state(), state);
            assert_eq!(sequence.action(), Action::Move(Direction::Left));
        }
    }

    #[test]
    fn test_state_sequence_to_int_puts_operation_high() {
        // identity 0010 (label 1), operation 01
        let sequence: StateSequence = "001001".parse().unwrap();
        assert_eq!(sequence.to_int(), 0b0010 + (0b01 << 4));
    }

    #[test]
    fn test_state_sequence_rejects_short_input() {
        assert!("10101".parse::<StateSequence>().is_err());
        assert!(StateSequence::new(seq("1010"), seq("1")).is_err());
    }

    #[test]
    fn test_structured_sequences_cannot_be_padded() {
        let mut state: StateSequence = "001001".parse().unwrap();
        assert_eq!(
            state.pad(1, Bit::Zero, true),
            Err(ControlError::InvalidPad("StateSequence"))
        );

        let mut control: ControlSequence = "0010011001011".parse().unwrap();
        assert_eq!(
            control.pad(1, Bit::One, false),
            Err(ControlError::InvalidPad("ControlSequence"))
        );
    }

    #[test]
    fn test_relabel_preserves_flags_and_operation() {
        let sequence: StateSequence = "1101011".parse().unwrap();
        let relabeled = sequence.relabel(1, 3).unwrap();

        assert_eq!(relabeled.to_string(), "10011011");
        assert_eq!(relabeled.label(), 1);
        assert!(relabeled.root());
        assert!(relabeled.terminal());
        assert_eq!(relabeled.action(), sequence.action());
    }

    #[test]
    fn test_control_sequence_packing() {
        let source: StateSequence = "101001".parse().unwrap();
        let target: StateSequence = "011011".parse().unwrap();
        let control = ControlSequence::new(source.clone(), seq("1"), target.clone()).unwrap();

        assert_eq!(control.to_string(), "1010011011011");
        assert_eq!(control.len(), 13);
        assert_eq!(
            control.to_int(),
            target.to_int() + (1 << 6) + (source.to_int() << 7)
        );
    }

    #[test]
    fn test_control_sequence_parse_round_trip() {
        let control: ControlSequence = "1010011011011".parse().unwrap();

        assert_eq!(control.source().to_string(), "101001");
        assert_eq!(control.condition(), Bit::One);
        assert_eq!(control.target().to_string(), "011011");
        assert_eq!(control.to_string().parse::<ControlSequence>().unwrap(), control);
    }

    #[test]
    fn test_control_sequence_validation() {
        let state: StateSequence = "101001".parse().unwrap();
        let wide: StateSequence = "1010001".parse().unwrap();

        assert!(ControlSequence::new(state.clone(), seq("10"), state.clone()).is_err());
        assert_eq!(
            ControlSequence::new(state, seq("0"), wide),
            Err(ControlError::SequenceLengthMismatch {
                expected: 6,
                actual: 7
            })
        );
        assert!("101001010100".parse::<ControlSequence>().is_err());
    }

    #[test]
    fn test_control_sequence_ordering_uses_target_low_bits() {
        let low: ControlSequence = "1111110000000".parse().unwrap();
        let high: ControlSequence = "0000000000001".parse().unwrap();
        // Source bits dominate the integer value even though the target of `high` is larger.
        assert!(high < low);
    }

    #[test]
    fn test_control_sequence_serialization() {
        let control: ControlSequence = "1010011011011".parse().unwrap();
        let json = serde_json::to_string(&control).unwrap();
        assert_eq!(json, "\"1010011011011\"");

        let decoded: ControlSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, control);
    }
}
