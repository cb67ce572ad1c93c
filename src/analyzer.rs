//! This module provides checks over a symbolic table that catch descriptions which would build
//! but misbehave: empty tables, states the initial state can never reach, and states entered by
//! more than one kind of action (which the binary form cannot represent).

use crate::action::Action;
use crate::table::Table;
use crate::types::{ControlError, Label};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Represents the problems the analyzer can find in a table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The table has no edges.
    EmptyTable,
    /// States that cannot be reached from the initial state.
    UnreachableStates(Vec<Label>),
    /// States entered by edges with different actions. The binary encoding stores one
    /// operation per state, so only the first incoming action would survive conversion.
    InconsistentActions(Vec<Label>),
}

impl From<AnalysisError> for ControlError {
    /// Converts an `AnalysisError` into a `ControlError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::EmptyTable => {
                ControlError::ValidationError("Table has no transitions".to_string())
            }
            AnalysisError::UnreachableStates(states) => ControlError::ValidationError(format!(
                "Unreachable states detected: {:?}",
                states
            )),
            AnalysisError::InconsistentActions(states) => ControlError::ValidationError(format!(
                "States entered by different actions: {:?}",
                states
            )),
        }
    }
}

/// Analyzes a table and returns the first problem found.
pub fn analyze(table: &Table) -> Result<(), ControlError> {
    match findings(table).into_iter().next() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Runs every check and collects all problems.
pub fn findings(table: &Table) -> Vec<AnalysisError> {
    [
        check_structure,
        check_unreachable_states,
        check_consistent_actions,
    ]
    .iter()
    .filter_map(|f| f(table).err())
    .collect()
}

fn check_structure(table: &Table) -> Result<(), AnalysisError> {
    if table.is_empty() {
        return Err(AnalysisError::EmptyTable);
    }
    Ok(())
}

/// Walks the edges breadth-first from the initial state.
fn check_unreachable_states(table: &Table) -> Result<(), AnalysisError> {
    let Some(initial) = table.initial_state() else {
        return Ok(());
    };

    let mut adjacency: BTreeMap<Label, Vec<Label>> = BTreeMap::new();
    for edge in table.edges() {
        adjacency
            .entry(edge.source.label)
            .or_default()
            .push(edge.target.label);
    }

    let mut reachable = HashSet::from([initial.label]);
    let mut queue = VecDeque::from([initial.label]);
    while let Some(label) = queue.pop_front() {
        for &next in adjacency.get(&label).into_iter().flatten() {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let unreachable: Vec<Label> = table
        .states()
        .iter()
        .map(|state| state.label)
        .filter(|label| !reachable.contains(label))
        .collect();

    if !unreachable.is_empty() {
        return Err(AnalysisError::UnreachableStates(unreachable));
    }

    Ok(())
}

fn check_consistent_actions(table: &Table) -> Result<(), AnalysisError> {
    let mut incoming: BTreeMap<Label, Action> = BTreeMap::new();
    let mut inconsistent = Vec::new();

    for edge in table.edges() {
        let label = edge.target.label;
        match incoming.get(&label) {
            Some(action) if *action != edge.action => {
                if !inconsistent.contains(&label) {
                    inconsistent.push(label);
                }
            }
            Some(_) => {}
            None => {
                incoming.insert(label, edge.action);
            }
        }
    }

    if !inconsistent.is_empty() {
        inconsistent.sort_unstable();
        return Err(AnalysisError::InconsistentActions(inconsistent));
    }

    Ok(())
}
