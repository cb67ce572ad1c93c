//! Declarative controller descriptions and the factory that turns them into controllers.
//!
//! A description is tagged by `kind`:
//!
//! ```json
//! {
//!   "kind": "table",
//!   "name": "Unary successor",
//!   "states": [{"label": 0, "root": true}, {"label": 2, "terminal": true, "status": 0}],
//!   "edges": [{"source": 0, "condition": "1", "action": {"move": "R"}, "target": 0}]
//! }
//! ```
//!
//! Binary tables list their entries as bit strings: `{"kind": "binary_table", "entries": [...]}`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::action::Action;
use crate::binary::ControlSequence;
use crate::binary_table::BinaryTable;
use crate::controller::{AnyController, ControllerKind};
use crate::table::{Edge, Table};
use crate::types::{ControlError, Label, State, Status, Word};

/// A named, buildable controller.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub controller: AnyController,
}

/// A controller description of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerConfig {
    Table(TableConfig),
    BinaryTable(BinaryTableConfig),
    Network(NetworkConfig),
}

impl ControllerConfig {
    pub fn kind(&self) -> ControllerKind {
        match self {
            ControllerConfig::Table(_) => ControllerKind::Table,
            ControllerConfig::BinaryTable(_) => ControllerKind::BinaryTable,
            ControllerConfig::Network(_) => ControllerKind::Network,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ControllerConfig::Table(config) => &config.name,
            ControllerConfig::BinaryTable(config) => &config.name,
            ControllerConfig::Network(config) => &config.name,
        }
    }

    /// Builds the described controller.
    pub fn build(&self) -> Result<Program, ControlError> {
        let controller: AnyController = match self {
            ControllerConfig::Table(config) => config.build()?.into(),
            ControllerConfig::BinaryTable(config) => config.build()?.into(),
            ControllerConfig::Network(_) => {
                return Err(ControlError::UnsupportedController(self.kind().to_string()))
            }
        };

        tracing::debug!("built {} controller '{}'", self.kind(), self.name());
        Ok(Program {
            name: self.name().to_string(),
            controller,
        })
    }
}

/// Flags of one state. States referenced by edges but not declared are plain states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub label: i64,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub terminal: bool,
    /// `0` for success, `1` for failure.
    #[serde(default)]
    pub status: i64,
}

impl StateConfig {
    fn build(&self) -> Result<State, ControlError> {
        let mut state = State::with_label(self.label)?;
        state.root = self.root;
        state.terminal = self.terminal;
        state.status = Status::try_from(self.status)?;
        Ok(state)
    }
}

impl From<&State> for StateConfig {
    fn from(state: &State) -> Self {
        Self {
            label: state.label as i64,
            root: state.root,
            terminal: state.terminal,
            status: state.status.code() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub source: i64,
    pub condition: String,
    pub action: Action,
    pub target: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub states: Vec<StateConfig>,
    pub edges: Vec<EdgeConfig>,
}

impl TableConfig {
    pub fn build(&self) -> Result<Table, ControlError> {
        let mut declared: HashMap<Label, State> = HashMap::new();
        for config in &self.states {
            let state = config.build()?;
            if declared.insert(state.label, state).is_some() {
                return Err(ControlError::ValidationError(format!(
                    "State {} is declared more than once",
                    config.label
                )));
            }
        }

        let resolve = |label: i64| -> Result<State, ControlError> {
            let plain = State::with_label(label)?;
            Ok(declared.get(&plain.label).cloned().unwrap_or(plain))
        };

        let mut table = Table::new();
        for edge in &self.edges {
            table.add(Edge::new(
                resolve(edge.source)?,
                Word::new(&edge.condition)?,
                edge.action,
                resolve(edge.target)?,
            ))?;
        }

        for label in declared.keys() {
            if table.state(*label).is_none() {
                tracing::warn!("state {} is declared but no edge uses it", label);
            }
        }

        Ok(table)
    }
}

impl From<&Table> for TableConfig {
    fn from(table: &Table) -> Self {
        Self {
            name: String::new(),
            states: table
                .states()
                .into_iter()
                .filter(|state| state.root || state.terminal)
                .map(StateConfig::from)
                .collect(),
            edges: table
                .edges()
                .map(|edge| EdgeConfig {
                    source: edge.source.label as i64,
                    condition: edge.condition.to_string(),
                    action: edge.action,
                    target: edge.target.label as i64,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryTableConfig {
    #[serde(default)]
    pub name: String,
    pub entries: Vec<ControlSequence>,
}

impl BinaryTableConfig {
    pub fn build(&self) -> Result<BinaryTable, ControlError> {
        BinaryTable::from_entries(self.entries.iter().cloned())
    }
}

impl From<&BinaryTable> for BinaryTableConfig {
    fn from(table: &BinaryTable) -> Self {
        Self {
            name: String::new(),
            entries: table.entries().to_vec(),
        }
    }
}

/// Description of a learned controller. Recognised so it can be rejected explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub name: String,
}
