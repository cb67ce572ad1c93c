//! This module defines the core data structures shared by both controller representations:
//! alphabet words, states, the trace records exchanged with the stepper, and the crate-wide
//! error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::action::Action;
use crate::Rule;

/// The binary word `0`. Also the default blank symbol of generated tapes.
pub const BINARY_ZERO: char = '0';
/// The binary word `1`.
pub const BINARY_ONE: char = '1';
/// The default blank symbol used on the tape.
pub const DEFAULT_BLANK_SYMBOL: char = BINARY_ZERO;
/// The maximum number of steps `run_for` callers should allow before giving up.
pub const MAX_EXECUTION_STEPS: usize = 10000;
/// The maximum allowed size for a program description in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB

/// A state label. Labels are the identity of a state.
pub type Label = u32;

/// Returns the label `offset` places after `highest`, failing when it does not fit in a
/// [`Label`].
pub fn fresh_label(highest: Label, offset: usize) -> Result<Label, ControlError> {
    Label::try_from(offset)
        .ok()
        .and_then(|offset| highest.checked_add(offset))
        .ok_or(ControlError::Overflow {
            value: highest as u128 + offset as u128,
            width: Label::BITS as usize,
        })
}

/// A single symbol of the tape alphabet.
///
/// A word always holds exactly one character. Equality, ordering and hashing are by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Word(char);

impl Word {
    /// Creates a word from a string, which must contain exactly one character.
    pub fn new(name: &str) -> Result<Self, ControlError> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self(c)),
            _ => Err(ControlError::InvalidWord(name.to_string())),
        }
    }

    /// Returns the character of this word.
    pub fn symbol(&self) -> char {
        self.0
    }

    /// Returns `true` if the word belongs to the binary alphabet `{0, 1}`.
    pub fn is_binary(&self) -> bool {
        matches!(self.0, BINARY_ZERO | BINARY_ONE)
    }
}

impl From<char> for Word {
    fn from(c: char) -> Self {
        Self(c)
    }
}

impl TryFrom<String> for Word {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Word> for String {
    fn from(word: Word) -> Self {
        word.0.to_string()
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The outcome recorded on a terminal state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The machine finished in a defined state.
    #[default]
    Success,
    /// The machine finished in an undefined state.
    Failure,
}

impl Status {
    /// Returns the status bit: `0` for success, `1` for failure.
    pub fn code(&self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Failure => 1,
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = ControlError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Success),
            1 => Ok(Status::Failure),
            _ => Err(ControlError::InvalidStatus(code)),
        }
    }
}

/// A node of the control graph.
///
/// The `label` is the identity of the state: tables key every membership check by label and
/// treat the remaining fields as payload. `status` is only meaningful when `terminal` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// The integer label of the node.
    pub label: Label,
    /// Marks the initial state of the machine.
    #[serde(default)]
    pub root: bool,
    /// Marks a state at which execution stops.
    #[serde(default)]
    pub terminal: bool,
    /// The outcome reported when execution stops here.
    #[serde(default)]
    pub status: Status,
}

impl State {
    /// Creates a plain (non-root, non-terminal) state.
    pub fn new(label: Label) -> Self {
        Self {
            label,
            root: false,
            terminal: false,
            status: Status::Success,
        }
    }

    /// Creates a plain state from a signed label, rejecting negative values.
    pub fn with_label(label: i64) -> Result<Self, ControlError> {
        Label::try_from(label)
            .map(Self::new)
            .map_err(|_| ControlError::InvalidLabel(label))
    }

    /// Creates the root state.
    pub fn root(label: Label) -> Self {
        Self {
            root: true,
            ..Self::new(label)
        }
    }

    /// Creates a terminal state reporting `status`.
    pub fn terminal(label: Label, status: Status) -> Self {
        Self {
            terminal: true,
            status,
            ..Self::new(label)
        }
    }

    /// Returns `true` if reaching this state ends execution successfully.
    pub fn is_success(&self) -> bool {
        self.terminal && self.status == Status::Success
    }

    /// Returns `true` if reaching this state ends execution unsuccessfully.
    pub fn is_failure(&self) -> bool {
        self.terminal && self.status == Status::Failure
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.label)?;
        if self.root {
            write!(f, "*")?;
        }
        if self.terminal {
            match self.status {
                Status::Success => write!(f, "+")?,
                Status::Failure => write!(f, "-")?,
            }
        }
        Ok(())
    }
}

/// The symbol read from the tape at a given timestep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub word: Word,
    pub timestep: usize,
}

impl Input {
    pub fn new(word: Word, timestep: usize) -> Self {
        Self { word, timestep }
    }
}

/// The response of a controller to an [`Input`].
///
/// A missing `state` means the transition is undefined for the input (the machine is stuck).
/// A missing `action` with a present `state` is the answer to the pre-start query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub action: Option<Action>,
    pub state: Option<State>,
    pub timestep: usize,
}

impl Output {
    /// The undefined-transition response.
    pub fn stuck(timestep: usize) -> Self {
        Self {
            action: None,
            state: None,
            timestep,
        }
    }

    /// Returns `true` when the controller had no transition for the input.
    pub fn is_stuck(&self) -> bool {
        self.state.is_none()
    }
}

/// Represents the errors raised while building, converting, or encoding controllers.
///
/// All of these describe malformed automaton descriptions or misuse of the API. An undefined
/// transition during execution is not an error; see [`crate::machine::Halt`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// A state label was negative.
    #[error("Invalid label: {0}")]
    InvalidLabel(i64),
    /// A status code other than 0 (success) or 1 (failure).
    #[error("Invalid status: {0}")]
    InvalidStatus(i64),
    /// A second root state with a different label was added.
    #[error("Ambiguous root: state {existing} is already the root, cannot add root {added}")]
    AmbiguousRoot { existing: Label, added: Label },
    /// Encoded entries of different widths were added to the same table.
    #[error("Sequence length mismatch: expected {expected} bits, got {actual}")]
    SequenceLengthMismatch { expected: usize, actual: usize },
    /// A value does not fit in the requested number of bits.
    #[error("Value {value} does not fit in {width} bits")]
    Overflow { value: u128, width: usize },
    /// A non-binary word was used where a bit is required.
    #[error("Unable to cast '{0}' to a binary sequence")]
    NonBinarySymbol(Word),
    /// Padding was requested on a structured sequence.
    #[error("Padding is not supported on {0}")]
    InvalidPad(&'static str),
    /// A word was not exactly one character long.
    #[error("Invalid word: {0:?}")]
    InvalidWord(String),
    /// A character other than `0` or `1` in a bit string.
    #[error("Invalid bit value: {0:?}")]
    InvalidBit(char),
    /// A bit string does not have the layout of the requested sequence type.
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),
    /// The description names a controller kind this crate cannot build.
    #[error("Unsupported controller kind: {0}")]
    UnsupportedController(String),
    /// An input and output with different timesteps were logged together.
    #[error("Timestep mismatch in I/O: input {input}, output {output}")]
    TimestepMismatch { input: usize, output: usize },
    /// A different record was already logged for this timestep.
    #[error("Conflicting I/O for timestep {0}")]
    ConflictingRecord(usize),
    /// Indicates an error during the parsing of a text program.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates that a description is structurally invalid.
    #[error("Program validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to file system operations.
    #[error("File error: {0}")]
    FileError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_label_is_checked() {
        assert_eq!(fresh_label(9, 2), Ok(11));
        assert_eq!(
            fresh_label(Label::MAX, 1),
            Err(ControlError::Overflow {
                value: 1 << 32,
                width: 32
            })
        );
    }

    #[test]
    fn test_word_requires_single_character() {
        assert_eq!(Word::new("1").unwrap().symbol(), '1');
        assert_eq!(
            Word::new("10"),
            Err(ControlError::InvalidWord("10".to_string()))
        );
        assert!(Word::new("").is_err());
    }

    #[test]
    fn test_word_serialization() {
        let word = Word::from('1');
        let json = serde_json::to_string(&word).unwrap();
        assert_eq!(json, "\"1\"");

        let decoded: Word = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, word);

        assert!(serde_json::from_str::<Word>("\"ab\"").is_err());
    }

    #[test]
    fn test_state_with_negative_label() {
        assert_eq!(State::with_label(3).unwrap(), State::new(3));
        assert_eq!(State::with_label(-1), Err(ControlError::InvalidLabel(-1)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::try_from(0), Ok(Status::Success));
        assert_eq!(Status::try_from(1), Ok(Status::Failure));
        assert_eq!(Status::try_from(2), Err(ControlError::InvalidStatus(2)));
        assert_eq!(Status::Failure.code(), 1);
    }

    #[test]
    fn test_state_defaults_from_json() {
        let state: State = serde_json::from_str(r#"{"label": 4, "terminal": true}"#).unwrap();
        assert_eq!(state, State::terminal(4, Status::Success));
        assert!(state.is_success());
        assert!(!state.is_failure());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::root(0).to_string(), "q0*");
        assert_eq!(State::terminal(3, Status::Failure).to_string(), "q3-");
    }

    #[test]
    fn test_error_display() {
        let error = ControlError::AmbiguousRoot {
            existing: 0,
            added: 2,
        };
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Ambiguous root"));
        assert!(error_msg.contains('2'));
    }
}
