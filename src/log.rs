//! This module records the execution trace of a machine: one input/output pair per executed
//! step, exportable as a two-column CSV of bit strings.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::binary::{bits_for, BinarySequence, Bit};
use crate::types::{ControlError, Input, Output};

/// The input read and the output produced at one timestep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IOPair {
    pub input: Input,
    pub output: Output,
}

impl IOPair {
    pub fn new(input: Input, output: Output) -> Self {
        Self { input, output }
    }

    pub fn timestep(&self) -> usize {
        self.input.timestep
    }

    /// Encodes the pair as `(input bit, state identity + operation)`.
    ///
    /// Only complete outputs over the binary alphabet are encodable.
    pub fn to_binary(
        &self,
        label_size: usize,
    ) -> Result<(BinarySequence, BinarySequence), ControlError> {
        let input = BinarySequence::from(vec![Bit::try_from(self.input.word)?]);

        let (Some(state), Some(action)) = (&self.output.state, &self.output.action) else {
            return Err(ControlError::InvalidSequence(format!(
                "record at timestep {} has no transition",
                self.timestep()
            )));
        };

        let mut output = state.to_binary(label_size)?;
        output.extend(&action.to_binary()?);
        Ok((input, output))
    }
}

/// An ordered collection of [`IOPair`]s, at most one per timestep.
#[derive(Debug, Clone, Default)]
pub struct MachineLog {
    records: Vec<IOPair>,
    by_timestep: HashMap<usize, usize>,
}

impl MachineLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    ///
    /// Logging a record equal to one already present is a no-op. A record whose input and
    /// output timesteps differ, or that conflicts with another record at the same timestep,
    /// is rejected.
    pub fn log(&mut self, record: IOPair) -> Result<(), ControlError> {
        if record.input.timestep != record.output.timestep {
            return Err(ControlError::TimestepMismatch {
                input: record.input.timestep,
                output: record.output.timestep,
            });
        }

        match self.by_timestep.get(&record.timestep()) {
            Some(&i) if self.records[i] == record => Ok(()),
            Some(_) => Err(ControlError::ConflictingRecord(record.timestep())),
            None => {
                self.by_timestep.insert(record.timestep(), self.records.len());
                self.records.push(record);
                Ok(())
            }
        }
    }

    pub fn records(&self) -> &[IOPair] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_timestep.clear();
    }

    /// Bits needed for the largest state label in the log.
    pub fn label_size(&self) -> usize {
        let highest = self
            .records
            .iter()
            .filter_map(|r| r.output.state.as_ref())
            .map(|state| state.label)
            .max()
            .unwrap_or(0);
        bits_for(highest as u128)
    }

    /// Renders the log as CSV with an `input,output` header. Labels are written in
    /// `label_size() + label_padding` bits.
    pub fn to_csv(&self, label_padding: usize) -> Result<String, ControlError> {
        let label_size = self.label_size() + label_padding;
        let mut csv = String::from("input,output\n");

        for record in &self.records {
            let (input, output) = record.to_binary(label_size)?;
            csv.push_str(&format!("{input},{output}\n"));
        }

        Ok(csv)
    }

    /// Writes [`to_csv`](MachineLog::to_csv) to `path`.
    pub fn export_csv<P: AsRef<Path>>(
        &self,
        path: P,
        label_padding: usize,
    ) -> Result<(), ControlError> {
        let path = path.as_ref();
        let csv = self.to_csv(label_padding)?;

        let file = File::create(path).map_err(|e| {
            ControlError::FileError(format!("Failed to create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(csv.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| {
                ControlError::FileError(format!("Failed to write {}: {}", path.display(), e))
            })?;

        tracing::info!("exported {} records to {}", self.len(), path.display());
        Ok(())
    }
}

impl fmt::Display for MachineLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_size = self.label_size();
        for record in &self.records {
            match record.to_binary(label_size) {
                Ok((input, output)) => writeln!(f, "{input},{output}")?,
                Err(_) => writeln!(f, "{},-", record.input.word)?,
            }
        }
        Ok(())
    }
}
