//! This crate provides the control model of a deterministic single-tape automaton.
//! Control logic has two interchangeable forms: a symbolic transition table and a fixed-width
//! binary encoding of the same relation. The crate includes the codec between them, a stepper
//! that drives a head over a tape, loaders for JSON and text descriptions, and a registry of
//! built-in programs.

pub mod action;
pub mod analyzer;
pub mod binary;
pub mod binary_table;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod loader;
pub mod log;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod table;
pub mod tape;
pub mod tapes;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
pub use action::{Action, Direction};
pub use analyzer::{analyze, AnalysisError};
pub use binary::{Bit, BinarySequence, BitString, ControlSequence, StateSequence};
pub use binary_table::BinaryTable;
pub use config::{ControllerConfig, Program};
pub use controller::{AnyController, Closable, Controller, ControllerKind};
pub use encoder::{decode, encode};
pub use loader::ControllerLoader;
pub use log::{IOPair, MachineLog};
pub use machine::{Failure, Halt, Step, TuringMachine};
pub use parser::parse;
pub use programs::{ProgramInfo, ProgramManager, PROGRAMS};
pub use table::{Edge, Table};
pub use tape::{Head, Tape, TapeHead};
pub use types::{
    ControlError, Input, Label, Output, State, Status, Word, MAX_EXECUTION_STEPS,
    MAX_PROGRAM_SIZE,
};
