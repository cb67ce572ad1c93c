//! This module provides the binary transition table. Each entry is a [`ControlSequence`] and
//! every entry of a table shares one label width, so all entries have the same length.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::action::Action;
use crate::binary::{bits_for, label_width, BitString, Bit, ControlSequence, StateSequence};
use crate::controller::{Closable, Controller};
use crate::table::{Edge, Table};
use crate::types::{fresh_label, ControlError, Input, Label, Output, State, Status, Word};

/// A controller over binary-encoded transitions.
#[derive(Debug, Clone, Default)]
pub struct BinaryTable {
    entries: Vec<ControlSequence>,
    index: HashMap<(Label, Bit), usize>,
}

impl BinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table by adding every entry in order.
    pub fn from_entries<I>(entries: I) -> Result<Self, ControlError>
    where
        I: IntoIterator<Item = ControlSequence>,
    {
        let mut table = Self::new();
        for entry in entries {
            table.add(entry)?;
        }
        Ok(table)
    }

    /// Adds an entry.
    ///
    /// Fails with [`ControlError::SequenceLengthMismatch`] if the entry is not as wide as the
    /// existing entries, and with [`ControlError::AmbiguousRoot`] if it carries a root state
    /// whose identity differs from the existing root. Returns `Ok(false)` if a transition for
    /// the entry's (source label, condition) pair already exists.
    pub fn add(&mut self, entry: ControlSequence) -> Result<bool, ControlError> {
        if let Some(first) = self.entries.first() {
            if first.len() != entry.len() {
                return Err(ControlError::SequenceLengthMismatch {
                    expected: first.len(),
                    actual: entry.len(),
                });
            }
        }

        for state in [entry.source(), entry.target()] {
            self.check_root(state)?;
        }
        let (source, target) = (entry.source(), entry.target());
        if source.root() && target.root() && source.identity() != target.identity() {
            return Err(ControlError::AmbiguousRoot {
                existing: source.label(),
                added: target.label(),
            });
        }

        let key = (entry.source().label(), entry.condition());
        if self.index.contains_key(&key) {
            tracing::debug!("ignoring duplicate entry {}", entry);
            return Ok(false);
        }

        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries in insertion order.
    pub fn entries(&self) -> &[ControlSequence] {
        &self.entries
    }

    /// Returns the entries ordered by their integer value.
    pub fn sorted_entries(&self) -> Vec<&ControlSequence> {
        let mut entries: Vec<&ControlSequence> = self.entries.iter().collect();
        entries.sort();
        entries
    }

    /// Width of the label sub-field shared by every entry, or `None` for an empty table.
    pub fn label_size(&self) -> Option<usize> {
        self.entries.first().map(ControlSequence::label_size)
    }

    /// Returns the first root source, or the source with the lowest label when no root is
    /// flagged.
    pub fn initial_sequence(&self) -> Option<&StateSequence> {
        let root = self
            .entries
            .iter()
            .map(ControlSequence::source)
            .find(|source| source.root());

        root.or_else(|| {
            self.entries
                .iter()
                .map(ControlSequence::source)
                .min_by_key(|source| source.label())
        })
    }

    /// Enumerates every (non-terminal state, bit) pair without an entry.
    ///
    /// Each state is represented by its first occurrence as a source, or by its first
    /// occurrence as a target when it has no outgoing entries. The result is ordered by
    /// label, then by bit.
    pub fn indefinite_states(&self) -> Vec<(StateSequence, Bit)> {
        let mut holes = Vec::new();

        for (label, state) in self.representatives() {
            if state.terminal() {
                continue;
            }
            for bit in [Bit::Zero, Bit::One] {
                if !self.index.contains_key(&(label, bit)) {
                    holes.push((state.clone(), bit));
                }
            }
        }

        holes
    }

    /// Builds one entry per hole, leading to a fresh failing terminal state.
    ///
    /// The new entry rewrites the bit that was read. Fresh labels start after the highest
    /// existing label; when they need more bits than the table's current width, every
    /// returned sequence is encoded at the wider width.
    pub fn indefinite_sequences(&self) -> Result<Vec<ControlSequence>, ControlError> {
        let holes = self.indefinite_states();
        let Some(current) = self.label_size() else {
            return Ok(Vec::new());
        };

        let highest = self.representatives().keys().copied().max().unwrap_or(0);
        fresh_label(highest, holes.len())?;
        let width = current.max(bits_for(highest as u128 + holes.len() as u128));

        let mut sequences = Vec::with_capacity(holes.len());
        for (offset, (state, bit)) in holes.into_iter().enumerate() {
            let label = fresh_label(highest, offset + 1)?;
            let failure = State::terminal(label, Status::Failure);
            let target = StateSequence::encode(&failure, width, &Action::Write(bit.into()))?;
            let source = state.relabel(state.label(), width)?;
            sequences.push(ControlSequence::with_bit(source, bit, target)?);
        }

        Ok(sequences)
    }

    /// Decodes every entry into a symbolic edge.
    pub fn to_table(&self) -> Result<Table, ControlError> {
        Table::from_edges(self.entries.iter().map(|entry| {
            Edge::new(
                entry.source().to_state(),
                Word::from(entry.condition()),
                entry.target().action(),
                entry.target().to_state(),
            )
        }))
    }

    /// Distinct states touched by any entry, keyed by label.
    fn representatives(&self) -> BTreeMap<Label, &StateSequence> {
        let mut states = BTreeMap::new();
        for entry in &self.entries {
            states.entry(entry.source().label()).or_insert(entry.source());
        }
        for entry in &self.entries {
            states.entry(entry.target().label()).or_insert(entry.target());
        }
        states
    }

    fn check_root(&self, state: &StateSequence) -> Result<(), ControlError> {
        if !state.root() {
            return Ok(());
        }

        let existing = self
            .entries
            .iter()
            .flat_map(|entry| [entry.source(), entry.target()])
            .find(|s| s.root());

        match existing {
            Some(existing) if existing.identity() != state.identity() => {
                Err(ControlError::AmbiguousRoot {
                    existing: existing.label(),
                    added: state.label(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Rewrites every entry through `f` and rebuilds the lookup index.
    fn remap<F>(&mut self, mut f: F) -> Result<(), ControlError>
    where
        F: FnMut(&StateSequence) -> Result<StateSequence, ControlError>,
    {
        let entries = self
            .entries
            .iter()
            .map(|entry| entry.map_states(&mut f))
            .collect::<Result<Vec<_>, _>>()?;

        self.index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ((entry.source().label(), entry.condition()), i))
            .collect();
        self.entries = entries;
        Ok(())
    }
}

impl Controller for BinaryTable {
    fn next(&self, state: Option<&State>, input: &Input) -> Output {
        let Some(state) = state else {
            return Output {
                action: None,
                state: self.initial_sequence().map(StateSequence::to_state),
                timestep: input.timestep,
            };
        };

        Bit::try_from(input.word)
            .ok()
            .and_then(|bit| self.index.get(&(state.label, bit)))
            .map(|&i| {
                let target = self.entries[i].target();
                Output {
                    action: Some(target.action()),
                    state: Some(target.to_state()),
                    timestep: input.timestep,
                }
            })
            .unwrap_or_else(|| Output::stuck(input.timestep))
    }
}

impl Closable for BinaryTable {
    /// Sends every undefined (state, bit) pair to a fresh failing terminal state.
    ///
    /// Fresh states are encoded at the table's label width when their labels fit. When they
    /// need more bits, every existing entry is re-encoded at the wider width first, so the
    /// entry length of the table can grow. Fails with [`ControlError::Overflow`] when a fresh
    /// label would exceed the largest [`Label`].
    fn close_domain(&mut self) -> Result<(), ControlError> {
        let sequences = self.indefinite_sequences()?;
        let Some(width) = sequences.first().map(ControlSequence::label_size) else {
            return Ok(());
        };

        if self.label_size() != Some(width) {
            tracing::debug!("widening labels to {} bits", width);
            self.remap(|state| state.relabel(state.label(), width))?;
        }

        let count = sequences.len();
        for sequence in sequences {
            self.add(sequence)?;
        }

        tracing::debug!("closed {} undefined transitions", count);
        Ok(())
    }

    fn rebase(&mut self) -> Result<(), ControlError> {
        let ranks: HashMap<Label, Label> = self
            .representatives()
            .keys()
            .enumerate()
            .map(|(rank, &label)| (label, rank as Label))
            .collect();
        let width = label_width(ranks.len());

        self.remap(|state| {
            let label = ranks.get(&state.label()).copied().unwrap_or(state.label());
            state.relabel(label, width)
        })
    }
}

impl fmt::Display for BinaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Binary Control Table")?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
