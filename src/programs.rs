use crate::config::Program;
use crate::controller::{AnyController, ControllerKind};
use crate::types::ControlError;

use std::sync::RwLock;

// Default embedded programs
const PROGRAM_TEXTS: [&str; 3] = [
    include_str!("../programs/successor.tm"),
    include_str!("../programs/addition.tm"),
    include_str!("../programs/parity.tm"),
];

lazy_static::lazy_static! {
    pub static ref PROGRAMS: RwLock<Vec<Program>> = RwLock::new(Vec::new());
}

pub struct ProgramManager;

impl ProgramManager {
    /// Parses the embedded programs into the registry, replacing its contents.
    pub fn load() -> Result<(), ControlError> {
        let mut programs = Vec::new();

        for program_text in PROGRAM_TEXTS {
            match crate::parser::parse(program_text) {
                Ok(program) => programs.push(program),
                Err(e) => tracing::error!("failed to parse embedded program: {}", e),
            }
        }

        let mut write_guard = PROGRAMS
            .write()
            .map_err(|_| ControlError::FileError("Failed to acquire write lock".to_string()))?;
        *write_guard = programs;

        Ok(())
    }

    /// Get the number of available programs
    pub fn get_program_count() -> usize {
        Self::ensure_loaded();

        PROGRAMS.read().map(|programs| programs.len()).unwrap_or(0)
    }

    /// Get a program by its index
    pub fn get_program_by_index(index: usize) -> Result<Program, ControlError> {
        Self::ensure_loaded();

        PROGRAMS
            .read()
            .map_err(|_| ControlError::FileError("Failed to acquire read lock".to_string()))?
            .get(index)
            .cloned()
            .ok_or_else(|| {
                ControlError::ValidationError(format!("Program index {} out of range", index))
            })
    }

    /// Get a program by its name. Matching ignores case.
    pub fn get_program_by_name(name: &str) -> Result<Program, ControlError> {
        Self::ensure_loaded();

        PROGRAMS
            .read()
            .map_err(|_| ControlError::FileError("Failed to acquire read lock".to_string()))?
            .iter()
            .find(|program| program.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| ControlError::ValidationError(format!("Program '{}' not found", name)))
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        Self::ensure_loaded();

        PROGRAMS
            .read()
            .map(|programs| {
                programs
                    .iter()
                    .map(|program| program.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get information about a program by its index
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, ControlError> {
        let program = Self::get_program_by_index(index)?;

        let state_count = match &program.controller {
            AnyController::Table(table) => table.states().len(),
            AnyController::BinaryTable(table) => table.to_table()?.states().len(),
        };

        Ok(ProgramInfo {
            index,
            name: program.name.clone(),
            kind: program.controller.kind(),
            state_count,
            transition_count: program.controller.len(),
        })
    }

    /// Search for programs by name
    pub fn search_programs(query: &str) -> Vec<usize> {
        Self::ensure_loaded();

        let query = query.to_lowercase();
        PROGRAMS
            .read()
            .map(|programs| {
                programs
                    .iter()
                    .enumerate()
                    .filter(|(_, program)| program.name.to_lowercase().contains(&query))
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the original text of a program by its index
    pub fn get_program_text_by_index(index: usize) -> Result<&'static str, ControlError> {
        PROGRAM_TEXTS.get(index).copied().ok_or_else(|| {
            ControlError::ValidationError(format!("Program text index {} out of range", index))
        })
    }

    fn ensure_loaded() {
        let empty = PROGRAMS.read().map(|p| p.is_empty()).unwrap_or(true);
        if empty {
            if let Err(e) = Self::load() {
                tracing::error!("failed to load embedded programs: {}", e);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub kind: ControllerKind,
    pub state_count: usize,
    pub transition_count: usize,
}
