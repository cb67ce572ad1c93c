//! This module defines the contract between the stepper and a control representation, and
//! the closed set of controller kinds a description can name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::binary_table::BinaryTable;
use crate::table::Table;
use crate::types::{ControlError, Input, Output, State};

/// Produces one transition per step.
pub trait Controller {
    /// Returns the action and next state for `input` read while in `state`.
    ///
    /// With `state == None` (before the first step) the initial state is returned with no
    /// action. An undefined transition returns [`Output::stuck`].
    fn next(&self, state: Option<&State>, input: &Input) -> Output;
}

/// The domain operations a driver runs before execution or binary conversion.
pub trait Closable: Controller {
    /// Adds a failing terminal transition for every undefined (state, symbol) pair.
    fn close_domain(&mut self) -> Result<(), ControlError>;

    /// Relabels states to the contiguous range `0..n`, preserving their order.
    fn rebase(&mut self) -> Result<(), ControlError>;

    /// Runs [`close_domain`](Closable::close_domain) followed by [`rebase`](Closable::rebase).
    fn prepare(&mut self) -> Result<(), ControlError> {
        self.close_domain()?;
        self.rebase()
    }
}

impl<C: Controller + ?Sized> Controller for &C {
    fn next(&self, state: Option<&State>, input: &Input) -> Output {
        (**self).next(state, input)
    }
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn next(&self, state: Option<&State>, input: &Input) -> Output {
        (**self).next(state, input)
    }
}

/// The controller kinds a description may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// A symbolic transition table.
    Table,
    /// A binary-encoded transition table.
    BinaryTable,
    /// A learned controller trained on binary tables. Not buildable by this crate.
    Network,
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::Table => write!(f, "table"),
            ControllerKind::BinaryTable => write!(f, "binary_table"),
            ControllerKind::Network => write!(f, "network"),
        }
    }
}

/// A controller of any buildable kind.
#[derive(Debug, Clone)]
pub enum AnyController {
    Table(Table),
    BinaryTable(BinaryTable),
}

impl AnyController {
    pub fn kind(&self) -> ControllerKind {
        match self {
            AnyController::Table(_) => ControllerKind::Table,
            AnyController::BinaryTable(_) => ControllerKind::BinaryTable,
        }
    }

    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        match self {
            AnyController::Table(table) => table.len(),
            AnyController::BinaryTable(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts to the binary representation. Binary tables are returned unchanged.
    pub fn into_binary(self) -> Result<BinaryTable, ControlError> {
        match self {
            AnyController::Table(table) => table.to_binary(),
            AnyController::BinaryTable(table) => Ok(table),
        }
    }

    /// Converts to the symbolic representation. Symbolic tables are returned unchanged.
    pub fn into_table(self) -> Result<Table, ControlError> {
        match self {
            AnyController::Table(table) => Ok(table),
            AnyController::BinaryTable(table) => table.to_table(),
        }
    }
}

impl From<Table> for AnyController {
    fn from(table: Table) -> Self {
        AnyController::Table(table)
    }
}

impl From<BinaryTable> for AnyController {
    fn from(table: BinaryTable) -> Self {
        AnyController::BinaryTable(table)
    }
}

impl Controller for AnyController {
    fn next(&self, state: Option<&State>, input: &Input) -> Output {
        match self {
            AnyController::Table(table) => table.next(state, input),
            AnyController::BinaryTable(table) => table.next(state, input),
        }
    }
}

impl Closable for AnyController {
    fn close_domain(&mut self) -> Result<(), ControlError> {
        match self {
            AnyController::Table(table) => table.close_domain(),
            AnyController::BinaryTable(table) => table.close_domain(),
        }
    }

    fn rebase(&mut self) -> Result<(), ControlError> {
        match self {
            AnyController::Table(table) => table.rebase(),
            AnyController::BinaryTable(table) => table.rebase(),
        }
    }
}

impl fmt::Display for AnyController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyController::Table(table) => write!(f, "{table}"),
            AnyController::BinaryTable(table) => write!(f, "{table}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Direction};
    use crate::table::Edge;
    use crate::types::Word;

    fn table() -> Table {
        Table::from_edges([Edge::new(
            State::root(0),
            Word::from('1'),
            Action::Move(Direction::Right),
            State::new(0),
        )])
        .unwrap()
    }

    #[test]
    fn test_kind_serialization() {
        let kind: ControllerKind = serde_json::from_str("\"binary_table\"").unwrap();
        assert_eq!(kind, ControllerKind::BinaryTable);
        assert_eq!(ControllerKind::Network.to_string(), "network");
    }

    #[test]
    fn test_any_controller_dispatch() {
        let controller = AnyController::from(table());
        let input = Input::new(Word::from('1'), 0);

        assert_eq!(controller.kind(), ControllerKind::Table);
        assert_eq!(controller.next(None, &input).state, Some(State::root(0)));

        let binary = AnyController::from(controller.into_binary().unwrap());
        assert_eq!(binary.kind(), ControllerKind::BinaryTable);
        assert_eq!(binary.len(), 1);

        let output = binary.next(Some(&State::root(0)), &input);
        assert_eq!(output.action, Some(Action::Move(Direction::Right)));
    }

    #[test]
    fn test_prepare_closes_and_rebases() {
        let mut controller = AnyController::from(table());
        controller.prepare().unwrap();

        // The vocabulary is {1} and (0, '1') is defined, so closure adds nothing.
        assert_eq!(controller.len(), 1);
    }
}
