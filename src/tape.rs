//! This module provides the tape and read/write head driven by a controller. The tape grows
//! on demand: moving past either end inserts a blank cell instead of failing.

use std::fmt;

use crate::types::{Word, DEFAULT_BLANK_SYMBOL};

/// The operations an [`Action`](crate::action::Action) may perform on a head.
pub trait TapeHead {
    /// Returns the word under the head.
    fn read(&self) -> Word;
    /// Overwrites the word under the head.
    fn write(&mut self, word: Word);
    /// Moves the head one cell to the left.
    fn left(&mut self);
    /// Moves the head one cell to the right.
    fn right(&mut self);
    /// Returns how many write/move operations the head has performed.
    fn operations_count(&self) -> usize;
}

/// An auto-expanding sequence of words with a designated blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<Word>,
    blank: Word,
}

impl Tape {
    pub fn new(cells: Vec<Word>, blank: Word) -> Self {
        Self { cells, blank }
    }

    /// Creates an empty tape over the binary alphabet, blank `0`.
    pub fn binary() -> Self {
        Self::new(Vec::new(), Word::from(DEFAULT_BLANK_SYMBOL))
    }

    /// Builds a tape with one cell per character of `content`.
    pub fn parse(content: &str, blank: Word) -> Self {
        Self::new(content.chars().map(Word::from).collect(), blank)
    }

    pub fn blank(&self) -> Word {
        self.blank
    }

    pub fn cells(&self) -> &[Word] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn push(&mut self, word: Word) {
        self.cells.push(word);
    }

    /// Appends every cell of `other`.
    pub fn extend(&mut self, other: &Tape) {
        self.cells.extend_from_slice(&other.cells);
    }

    /// Counts the cells holding `word`.
    pub fn count(&self, word: Word) -> usize {
        self.cells.iter().filter(|&&w| w == word).count()
    }
}

impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in &self.cells {
            write!(f, "{word}")?;
        }
        Ok(())
    }
}

/// A cursor over a [`Tape`] that counts the operations applied through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    tape: Tape,
    position: usize,
    operations: usize,
}

impl Head {
    /// Places a head on the first cell of `tape`. An empty tape receives one blank cell.
    pub fn new(mut tape: Tape) -> Self {
        if tape.is_empty() {
            let blank = tape.blank;
            tape.push(blank);
        }

        Self {
            tape,
            position: 0,
            operations: 0,
        }
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Consumes the head and returns its tape.
    pub fn into_tape(self) -> Tape {
        self.tape
    }
}

impl TapeHead for Head {
    fn read(&self) -> Word {
        self.tape.cells[self.position]
    }

    fn write(&mut self, word: Word) {
        self.tape.cells[self.position] = word;
        self.operations += 1;
    }

    fn left(&mut self) {
        if self.position == 0 {
            // Extend the tape to the left
            self.tape.cells.insert(0, self.tape.blank);
        } else {
            self.position -= 1;
        }
        self.operations += 1;
    }

    fn right(&mut self) {
        self.position += 1;
        if self.position >= self.tape.len() {
            let blank = self.tape.blank;
            self.tape.push(blank);
        }
        self.operations += 1;
    }

    fn operations_count(&self) -> usize {
        self.operations
    }
}

impl fmt::Display for Head {
    /// Renders the tape with the cell under the head in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.tape.cells.iter().enumerate() {
            if i == self.position {
                write!(f, "[{word}]")?;
            } else {
                write!(f, "{word}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(content: &str) -> Head {
        Head::new(Tape::parse(content, Word::from('0')))
    }

    #[test]
    fn test_empty_tape_gets_blank_cell() {
        let head = Head::new(Tape::binary());
        assert_eq!(head.read(), Word::from('0'));
        assert_eq!(head.tape().len(), 1);
        assert_eq!(head.operations_count(), 0);
    }

    #[test]
    fn test_move_left_extends_tape() {
        let mut head = head("1");
        head.left();

        assert_eq!(head.position(), 0);
        assert_eq!(head.tape().to_string(), "01");
        assert_eq!(head.read(), Word::from('0'));
        assert_eq!(head.operations_count(), 1);
    }

    #[test]
    fn test_move_right_extends_tape() {
        let mut head = head("1");
        head.right();

        assert_eq!(head.position(), 1);
        assert_eq!(head.tape().to_string(), "10");
        assert_eq!(head.read(), Word::from('0'));
    }

    #[test]
    fn test_write_and_count_operations() {
        let mut head = head("101");
        head.right();
        head.write(Word::from('1'));
        head.left();

        assert_eq!(head.tape().to_string(), "111");
        assert_eq!(head.operations_count(), 3);
        assert_eq!(head.to_string(), "[1]11");
    }
}
