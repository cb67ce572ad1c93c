//! This module provides the symbolic transition table: a deterministic partial function from
//! (state, word) to (action, state), together with totality closure, canonical relabeling
//! and conversion to the binary representation.
//!
//! States are stored once in an arena and edges refer to them by index. The state label is
//! the identity used for every lookup, so two [`State`] values with the same label always
//! resolve to the same node.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::action::Action;
use crate::binary::{label_width, Bit, ControlSequence, StateSequence};
use crate::binary_table::BinaryTable;
use crate::controller::{Closable, Controller};
use crate::types::{
    fresh_label, ControlError, Input, Label, Output, State, Status, Word, BINARY_ONE, BINARY_ZERO,
};

/// One transition of a [`Table`], with the states it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: State,
    pub condition: Word,
    pub action: Action,
    pub target: State,
}

impl Edge {
    pub fn new(source: State, condition: Word, action: Action, target: State) -> Self {
        Self {
            source,
            condition,
            action,
            target,
        }
    }

    /// Returns `true` if both edges define the transition for the same (state, word) pair.
    pub fn same_transition(&self, other: &Edge) -> bool {
        self.source.label == other.source.label && self.condition == other.condition
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.source, self.condition, self.action, self.target
        )
    }
}

/// Index of a state in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateId(usize);

#[derive(Debug, Clone)]
struct Entry {
    source: StateId,
    condition: Word,
    action: Action,
    target: StateId,
}

/// A symbolic control table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    states: Vec<State>,
    labels: HashMap<Label, StateId>,
    entries: Vec<Entry>,
    transitions: HashMap<(StateId, Word), usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table by adding every edge in order.
    pub fn from_edges<I>(edges: I) -> Result<Self, ControlError>
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut table = Self::new();
        for edge in edges {
            table.add(edge)?;
        }
        Ok(table)
    }

    /// Adds an edge.
    ///
    /// Returns `Ok(false)` without modifying the table when a transition for the edge's
    /// (source, condition) pair already exists. Fails with [`ControlError::AmbiguousRoot`]
    /// if the edge introduces a root state whose label differs from the existing root.
    ///
    /// A state whose label is already known is merged into the stored node: root and
    /// terminal flags are added, and a terminal state's status replaces the stored one.
    pub fn add(&mut self, edge: Edge) -> Result<bool, ControlError> {
        for state in [&edge.source, &edge.target] {
            self.check_root(state)?;
        }
        if edge.source.root && edge.target.root && edge.source.label != edge.target.label {
            return Err(ControlError::AmbiguousRoot {
                existing: edge.source.label,
                added: edge.target.label,
            });
        }

        if let Some(&source) = self.labels.get(&edge.source.label) {
            if self.transitions.contains_key(&(source, edge.condition)) {
                tracing::debug!(
                    "ignoring duplicate transition for ({}, {})",
                    edge.source,
                    edge.condition
                );
                return Ok(false);
            }
        }

        let source = self.intern(edge.source);
        let target = self.intern(edge.target);
        self.insert(source, edge.condition, edge.action, target);
        Ok(true)
    }

    /// Returns the number of edges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.entries.iter().map(|entry| self.edge(entry))
    }

    /// Returns the distinct states touched by any edge, ordered by label.
    pub fn states(&self) -> Vec<&State> {
        let mut states: Vec<&State> = self.states.iter().collect();
        states.sort_by_key(|state| state.label);
        states
    }

    /// Looks up a state by label.
    pub fn state(&self, label: Label) -> Option<&State> {
        self.labels.get(&label).map(|&id| self.resolve(id))
    }

    /// Returns every condition word plus every word written by an action.
    pub fn vocab(&self) -> BTreeSet<Word> {
        let mut vocab = BTreeSet::new();
        for entry in &self.entries {
            vocab.insert(entry.condition);
            if let Action::Write(word) = entry.action {
                vocab.insert(word);
            }
        }
        vocab
    }

    /// Returns the root edge source, or the edge source with the lowest label when no root is
    /// flagged. Returns `None` for an empty table.
    pub fn initial_state(&self) -> Option<&State> {
        let root = self
            .entries
            .iter()
            .map(|entry| self.resolve(entry.source))
            .find(|state| state.root);

        root.or_else(|| {
            self.entries
                .iter()
                .map(|entry| self.resolve(entry.source))
                .min_by_key(|state| state.label)
        })
    }

    /// Enumerates every (non-terminal state, vocabulary word) pair without a transition.
    pub fn indefinite_states(&self) -> Vec<(State, Word)> {
        let vocab = self.vocab();
        let mut holes = Vec::new();

        for state in self.states() {
            if state.terminal {
                continue;
            }
            let id = self.labels[&state.label];
            for &word in &vocab {
                if !self.transitions.contains_key(&(id, word)) {
                    holes.push((state.clone(), word));
                }
            }
        }

        holes
    }

    /// Returns `true` if the vocabulary is exactly `{0, 1}`.
    pub fn is_binary(&self) -> bool {
        let binary: BTreeSet<Word> = [Word::from(BINARY_ZERO), Word::from(BINARY_ONE)].into();
        self.vocab() == binary
    }

    /// Converts the table into its binary form.
    ///
    /// Labels are written in `ceil(log2(|states|))` bits, so the table should be rebased
    /// first. The target of each control sequence carries the edge's action. The source
    /// carries the action of the first edge (in insertion order) entering that state, which
    /// assumes every edge entering a state performs the same action. A source that no edge
    /// enters is given `Write(condition)`.
    pub fn to_binary(&self) -> Result<BinaryTable, ControlError> {
        let label_size = label_width(self.states.len());
        let initial = self.initial_state().map(|state| state.label);
        let mut binary = BinaryTable::new();

        for entry in &self.entries {
            let source = self.resolve(entry.source);
            let target = self.resolve(entry.target);

            let operation = match self.entries.iter().find(|e| e.target == entry.source) {
                Some(incoming) => incoming.action,
                None => {
                    if initial != Some(source.label) {
                        tracing::warn!(
                            "state {} is never entered, encoding write {} as its operation",
                            source,
                            entry.condition
                        );
                    }
                    Action::Write(entry.condition)
                }
            };

            let control = ControlSequence::with_bit(
                StateSequence::encode(source, label_size, &operation)?,
                Bit::try_from(entry.condition)?,
                StateSequence::encode(target, label_size, &entry.action)?,
            )?;
            binary.add(control)?;
        }

        Ok(binary)
    }

    fn edge(&self, entry: &Entry) -> Edge {
        Edge {
            source: self.resolve(entry.source).clone(),
            condition: entry.condition,
            action: entry.action,
            target: self.resolve(entry.target).clone(),
        }
    }

    fn resolve(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    fn check_root(&self, state: &State) -> Result<(), ControlError> {
        if !state.root {
            return Ok(());
        }

        match self.states.iter().find(|s| s.root) {
            Some(existing) if existing.label != state.label => Err(ControlError::AmbiguousRoot {
                existing: existing.label,
                added: state.label,
            }),
            _ => Ok(()),
        }
    }

    fn intern(&mut self, state: State) -> StateId {
        match self.labels.get(&state.label) {
            Some(&id) => {
                let stored = &mut self.states[id.0];
                stored.root |= state.root;
                if state.terminal {
                    stored.terminal = true;
                    stored.status = state.status;
                }
                id
            }
            None => {
                let id = StateId(self.states.len());
                self.labels.insert(state.label, id);
                self.states.push(state);
                id
            }
        }
    }

    fn insert(&mut self, source: StateId, condition: Word, action: Action, target: StateId) {
        self.transitions
            .insert((source, condition), self.entries.len());
        self.entries.push(Entry {
            source,
            condition,
            action,
            target,
        });
    }
}

impl Controller for Table {
    fn next(&self, state: Option<&State>, input: &Input) -> Output {
        let Some(state) = state else {
            return Output {
                action: None,
                state: self.initial_state().cloned(),
                timestep: input.timestep,
            };
        };

        self.labels
            .get(&state.label)
            .and_then(|&id| self.transitions.get(&(id, input.word)))
            .map(|&index| {
                let entry = &self.entries[index];
                Output {
                    action: Some(entry.action),
                    state: Some(self.resolve(entry.target).clone()),
                    timestep: input.timestep,
                }
            })
            .unwrap_or_else(|| Output::stuck(input.timestep))
    }
}

impl Closable for Table {
    /// Sends every undefined (state, word) pair to a fresh failing terminal state. The new
    /// edge rewrites the word already on the tape so execution takes one more step.
    fn close_domain(&mut self) -> Result<(), ControlError> {
        let holes = self.indefinite_states();
        if holes.is_empty() {
            return Ok(());
        }

        // Every fresh label must fit before the table is touched.
        let highest = self.states.iter().map(|s| s.label).max().unwrap_or(0);
        fresh_label(highest, holes.len())?;

        for (offset, (state, word)) in holes.iter().enumerate() {
            let label = fresh_label(highest, offset + 1)?;
            let source = self.labels[&state.label];
            let target = self.intern(State::terminal(label, Status::Failure));
            self.insert(source, *word, Action::Write(*word), target);
        }

        tracing::debug!("closed {} undefined transitions", holes.len());
        Ok(())
    }

    fn rebase(&mut self) -> Result<(), ControlError> {
        let mut order: Vec<usize> = (0..self.states.len()).collect();
        order.sort_by_key(|&i| self.states[i].label);

        self.labels.clear();
        for (rank, i) in order.into_iter().enumerate() {
            let state = &mut self.states[i];
            if state.label != rank as Label {
                tracing::debug!("relabeling state {} to {}", state.label, rank);
            }
            state.label = rank as Label;
            self.labels.insert(state.label, StateId(i));
        }

        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Control Table")?;
        for edge in self.edges() {
            writeln!(f, "{edge}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Direction;

    fn w(c: char) -> Word {
        Word::from(c)
    }

    fn edge(source: State, condition: char, action: Action, target: State) -> Edge {
        Edge::new(source, w(condition), action, target)
    }

    fn right() -> Action {
        Action::Move(Direction::Right)
    }

    fn write(c: char) -> Action {
        Action::Write(w(c))
    }

    /// Unary successor: skip the run of 1s, write a 1 on the first blank, halt.
    fn successor() -> Table {
        Table::from_edges([
            edge(State::root(0), '1', right(), State::new(0)),
            edge(State::new(0), '0', write('1'), State::new(1)),
            edge(
                State::new(1),
                '1',
                write('1'),
                State::terminal(2, Status::Success),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_next_before_start_returns_initial_state() {
        let table = successor();
        let output = table.next(None, &Input::new(w('1'), 0));

        assert_eq!(output.action, None);
        assert_eq!(output.state, Some(State::root(0)));
    }

    #[test]
    fn test_next_follows_edge() {
        let table = successor();
        let output = table.next(Some(&State::new(0)), &Input::new(w('0'), 3));

        assert_eq!(output.action, Some(write('1')));
        assert_eq!(output.state, Some(State::new(1)));
        assert_eq!(output.timestep, 3);
    }

    #[test]
    fn test_next_undefined_transition_is_stuck() {
        let table = successor();
        let output = table.next(Some(&State::new(1)), &Input::new(w('0'), 5));

        assert!(output.is_stuck());
        assert_eq!(output, Output::stuck(5));
    }

    #[test]
    fn test_next_is_deterministic() {
        let table = successor();
        let input = Input::new(w('1'), 1);
        assert_eq!(
            table.next(Some(&State::root(0)), &input),
            table.next(Some(&State::root(0)), &input)
        );
    }

    #[test]
    fn test_initial_state_without_root_is_lowest_source() {
        let table = Table::from_edges([
            edge(State::new(7), '0', right(), State::new(1)),
            edge(State::new(3), '0', right(), State::new(7)),
            edge(State::new(1), '1', right(), State::new(3)),
        ])
        .unwrap();

        assert_eq!(table.initial_state().map(|s| s.label), Some(1));
        assert_eq!(Table::new().initial_state(), None);
    }

    #[test]
    fn test_second_root_with_different_label_is_ambiguous() {
        let mut table = successor();
        let result = table.add(edge(State::root(1), '0', right(), State::new(0)));

        assert_eq!(
            result,
            Err(ControlError::AmbiguousRoot {
                existing: 0,
                added: 1
            })
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_second_root_with_same_label_is_accepted() {
        let mut table = Table::from_edges([edge(State::root(0), '1', right(), State::new(0))])
            .unwrap();

        assert_eq!(
            table.add(edge(State::root(0), '0', write('1'), State::new(1))),
            Ok(true)
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_transition_is_ignored() {
        let mut table = successor();
        let added = table
            .add(edge(State::new(0), '1', write('0'), State::new(4)))
            .unwrap();

        assert!(!added);
        assert_eq!(table.len(), 3);
        assert!(table.state(4).is_none());
        let output = table.next(Some(&State::new(0)), &Input::new(w('1'), 0));
        assert_eq!(output.action, Some(right()));
    }

    #[test]
    fn test_states_are_merged_by_label() {
        let table = successor();

        assert_eq!(table.states().len(), 3);
        assert!(table.state(0).unwrap().root);
        assert!(table.state(2).unwrap().is_success());
    }

    #[test]
    fn test_vocab_includes_written_words() {
        let table = Table::from_edges([edge(State::root(0), 'a', write('b'), State::new(1))])
            .unwrap();

        assert_eq!(table.vocab(), BTreeSet::from([w('a'), w('b')]));
        assert!(!table.is_binary());
        assert!(successor().is_binary());
    }

    #[test]
    fn test_indefinite_states_skip_terminal_states() {
        let table = successor();
        assert_eq!(table.indefinite_states(), vec![(State::new(1), w('0'))]);
    }

    #[test]
    fn test_close_domain_is_total_and_idempotent() {
        let mut table = successor();
        table.close_domain().unwrap();

        assert!(table.indefinite_states().is_empty());
        assert_eq!(table.len(), 4);

        let failure = table.state(3).unwrap();
        assert!(failure.is_failure());

        let output = table.next(Some(&State::new(1)), &Input::new(w('0'), 0));
        assert_eq!(output.action, Some(write('0')));
        assert_eq!(output.state, Some(State::terminal(3, Status::Failure)));

        table.close_domain().unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_close_domain_uses_fresh_labels() {
        let mut table = Table::from_edges([
            edge(State::root(5), '0', right(), State::new(9)),
            edge(State::new(9), '1', right(), State::new(5)),
        ])
        .unwrap();
        table.close_domain().unwrap();

        let mut labels: Vec<Label> = table.states().iter().map(|s| s.label).collect();
        labels.sort();
        assert_eq!(labels, vec![5, 9, 10, 11]);
    }

    #[test]
    fn test_close_domain_rejects_label_overflow() {
        let mut table =
            Table::from_edges([edge(State::root(Label::MAX), '1', right(), State::new(0))])
                .unwrap();

        assert_eq!(
            table.close_domain(),
            Err(ControlError::Overflow {
                value: Label::MAX as u128 + 1,
                width: 32
            })
        );

        // Nothing was merged into state 0.
        assert_eq!(table.len(), 1);
        assert_eq!(table.state(0), Some(&State::new(0)));
    }

    #[test]
    fn test_rebase_is_canonical() {
        let mut table = Table::from_edges([
            edge(State::root(10), '1', right(), State::new(4)),
            edge(State::new(4), '0', right(), State::new(30)),
            edge(State::new(30), '1', right(), State::new(10)),
        ])
        .unwrap();
        table.rebase().unwrap();

        let labels: Vec<Label> = table.states().iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![0, 1, 2]);

        // 4 -> 0, 10 -> 1, 30 -> 2
        let edges: Vec<(Label, Label)> = table
            .edges()
            .map(|e| (e.source.label, e.target.label))
            .collect();
        assert_eq!(edges, vec![(1, 0), (0, 2), (2, 1)]);
        assert!(table.state(1).unwrap().root);

        let before: Vec<Edge> = table.edges().collect();
        table.rebase().unwrap();
        assert_eq!(table.edges().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_to_binary_borrows_incoming_action() {
        let mut table = successor();
        table.close_domain().unwrap();
        table.rebase().unwrap();
        let binary = table.to_binary().unwrap();

        assert_eq!(binary.len(), 4);
        for (edge, control) in table.edges().zip(binary.entries()) {
            assert_eq!(control.source().to_state(), edge.source);
            assert_eq!(control.target().to_state(), edge.target);
            assert_eq!(Word::from(control.condition()), edge.condition);
            assert_eq!(control.target().action(), edge.action);
        }

        // State 1 is entered by `write 1`; its operation is borrowed from that edge.
        let from_one = binary
            .entries()
            .iter()
            .find(|c| c.source().label() == 1)
            .unwrap();
        assert_eq!(from_one.source().action(), write('1'));

        // The root is entered by its own loop, which moves right.
        let from_root = binary
            .entries()
            .iter()
            .find(|c| c.source().label() == 0)
            .unwrap();
        assert_eq!(from_root.source().action(), right());
    }

    #[test]
    fn test_to_binary_root_fallback_writes_condition() {
        let table = Table::from_edges([edge(
            State::root(0),
            '1',
            right(),
            State::terminal(1, Status::Success),
        )])
        .unwrap();
        let binary = table.to_binary().unwrap();

        let control = &binary.entries()[0];
        assert_eq!(control.source().action(), write('1'));
        assert_eq!(control.to_string(), "1000111011001");
    }

    #[test]
    fn test_to_binary_rejects_non_binary_words() {
        let table = Table::from_edges([edge(State::root(0), 'a', right(), State::new(1))])
            .unwrap();
        assert_eq!(
            table.to_binary().unwrap_err(),
            ControlError::NonBinarySymbol(w('a'))
        );
    }

    #[test]
    fn test_to_binary_requires_rebased_labels() {
        let table = Table::from_edges([edge(State::root(0), '1', right(), State::new(6))])
            .unwrap();
        assert_eq!(
            table.to_binary().unwrap_err(),
            ControlError::Overflow { value: 6, width: 1 }
        );
    }
}
