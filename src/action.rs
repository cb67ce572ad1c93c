//! This module defines the two primitive actions a controller can ask of the head, their
//! effect on the tape and their 2-bit binary encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::binary::{BinarySequence, Bit};
use crate::tape::TapeHead;
use crate::types::{ControlError, Word};

/// Opcode bit of [`Action::Move`].
pub const MOVE_OP_CODE: Bit = Bit::Zero;
/// Opcode bit of [`Action::Write`].
pub const WRITE_OP_CODE: Bit = Bit::One;

/// Represents the possible directions the head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    #[serde(alias = "L")]
    Left,
    /// Move the head one position to the right.
    #[serde(alias = "R")]
    Right,
}

impl Direction {
    /// Returns the parameter bit of a move: `0` for left, `1` for right.
    pub fn bit(&self) -> Bit {
        match self {
            Direction::Left => Bit::Zero,
            Direction::Right => Bit::One,
        }
    }
}

impl From<Bit> for Direction {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => Direction::Left,
            Bit::One => Direction::Right,
        }
    }
}

/// An operation performed on the head during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move the head one cell.
    Move(Direction),
    /// Overwrite the cell under the head.
    Write(Word),
}

impl Action {
    /// Applies the action to a head.
    pub fn exec<H: TapeHead + ?Sized>(&self, head: &mut H) {
        match self {
            Action::Move(Direction::Left) => head.left(),
            Action::Move(Direction::Right) => head.right(),
            Action::Write(word) => head.write(*word),
        }
    }

    /// Encodes the action as `[opcode, parameter]`.
    ///
    /// Only writes of `0` or `1` are encodable; any other word fails with
    /// [`ControlError::NonBinarySymbol`].
    pub fn to_binary(&self) -> Result<BinarySequence, ControlError> {
        let (op_code, param) = match self {
            Action::Move(direction) => (MOVE_OP_CODE, direction.bit()),
            Action::Write(word) => (WRITE_OP_CODE, Bit::try_from(*word)?),
        };
        Ok(BinarySequence::from(vec![op_code, param]))
    }

    /// Decodes a 2-bit operation block.
    pub fn from_bits(op_code: Bit, param: Bit) -> Self {
        match op_code {
            Bit::Zero => Action::Move(Direction::from(param)),
            Bit::One => Action::Write(param.into()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move(Direction::Left) => write!(f, "L"),
            Action::Move(Direction::Right) => write!(f, "R"),
            Action::Write(word) => write!(f, "write {word}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{Head, Tape};

    #[test]
    fn test_direction_serialization() {
        let left = Direction::Left;
        let right = Direction::Right;

        let left_json = serde_json::to_string(&left).unwrap();
        let right_json = serde_json::to_string(&right).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(right_json, "\"Right\"");

        let left_deserialized: Direction = serde_json::from_str(&left_json).unwrap();
        let short: Direction = serde_json::from_str("\"R\"").unwrap();

        assert_eq!(left, left_deserialized);
        assert_eq!(short, Direction::Right);
    }

    #[test]
    fn test_action_serialization() {
        let action: Action = serde_json::from_str(r#"{"move": "L"}"#).unwrap();
        assert_eq!(action, Action::Move(Direction::Left));

        let action: Action = serde_json::from_str(r#"{"write": "1"}"#).unwrap();
        assert_eq!(action, Action::Write(Word::from('1')));
    }

    #[test]
    fn test_action_encoding() {
        let encode = |a: Action| a.to_binary().unwrap().to_string();

        assert_eq!(encode(Action::Move(Direction::Left)), "00");
        assert_eq!(encode(Action::Move(Direction::Right)), "01");
        assert_eq!(encode(Action::Write(Word::from('0'))), "10");
        assert_eq!(encode(Action::Write(Word::from('1'))), "11");
    }

    #[test]
    fn test_non_binary_write_cannot_be_encoded() {
        let result = Action::Write(Word::from('x')).to_binary();
        assert_eq!(result, Err(ControlError::NonBinarySymbol(Word::from('x'))));
    }

    #[test]
    fn test_decode_operation_block() {
        for action in [
            Action::Move(Direction::Left),
            Action::Move(Direction::Right),
            Action::Write(Word::from('0')),
            Action::Write(Word::from('1')),
        ] {
            let bits = action.to_binary().unwrap();
            assert_eq!(Action::from_bits(bits.bits()[0], bits.bits()[1]), action);
        }
    }

    #[test]
    fn test_exec_applies_effect() {
        let mut head = Head::new(Tape::parse("0", Word::from('0')));

        Action::Write(Word::from('1')).exec(&mut head);
        Action::Move(Direction::Right).exec(&mut head);

        assert_eq!(head.tape().to_string(), "10");
        assert_eq!(head.position(), 1);
        assert_eq!(head.operations_count(), 2);
    }
}
