//! This module provides the `ControllerLoader` struct, responsible for loading controller
//! descriptions from files and strings. Two formats are accepted: JSON descriptions (`.json`)
//! of any controller kind, and text programs (`.tm`) describing a symbolic table.

use crate::config::{ControllerConfig, Program};
use crate::parser::parse;
use crate::types::{ControlError, MAX_PROGRAM_SIZE};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of JSON controller descriptions.
pub const JSON_EXTENSION: &str = "json";
/// Extension of text programs.
pub const TEXT_EXTENSION: &str = "tm";

/// `ControllerLoader` is a utility struct for loading controllers.
pub struct ControllerLoader;

impl ControllerLoader {
    /// Loads a single program, choosing the format by file extension.
    ///
    /// # Returns
    ///
    /// * `Err(ControlError::FileError)` if the file cannot be read.
    /// * `Err(ControlError::ValidationError)` if the file is too large or has an unknown
    ///   extension.
    /// * Any error raised while parsing or building the description.
    pub fn load_program(path: &Path) -> Result<Program, ControlError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ControlError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        check_size(&content)?;

        let program = match path.extension().and_then(|ext| ext.to_str()) {
            Some(JSON_EXTENSION) => Self::load_json(&content),
            Some(TEXT_EXTENSION) => parse(&content),
            _ => Err(ControlError::ValidationError(format!(
                "Unsupported program format: {}",
                path.display()
            ))),
        }?;

        tracing::info!(
            "loaded {} controller '{}' from {}",
            program.controller.kind(),
            program.name,
            path.display()
        );
        Ok(program)
    }

    /// Loads a program from a string. Content starting with `{` is read as JSON, anything
    /// else as a text program.
    pub fn load_program_from_string(content: &str) -> Result<Program, ControlError> {
        check_size(content)?;

        if content.trim_start().starts_with('{') {
            Self::load_json(content)
        } else {
            parse(content)
        }
    }

    /// Loads a JSON controller description.
    pub fn load_json(content: &str) -> Result<Program, ControlError> {
        let config: ControllerConfig = serde_json::from_str(content).map_err(|e| {
            ControlError::ValidationError(format!("Invalid controller description: {e}"))
        })?;
        config.build()
    }

    /// Loads every `.json` and `.tm` file in a directory.
    ///
    /// Subdirectories and other files are skipped. Each loaded file yields one result, so a
    /// broken file does not hide the others.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), ControlError>> {
        if !directory.exists() {
            return vec![Err(ControlError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(ControlError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(ControlError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }
        paths.sort();

        for path in paths {
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == JSON_EXTENSION || ext == TEXT_EXTENSION);
            if path.is_dir() || !supported {
                continue;
            }

            results.push(
                Self::load_program(&path)
                    .map(|program| (path.clone(), program))
                    .map_err(|e| {
                        ControlError::FileError(format!(
                            "Failed to load program from {}: {}",
                            path.display(),
                            e
                        ))
                    }),
            );
        }

        results
    }
}

fn check_size(content: &str) -> Result<(), ControlError> {
    if content.len() > MAX_PROGRAM_SIZE {
        return Err(ControlError::ValidationError(format!(
            "Program is too large: {} bytes (limit {})",
            content.len(),
            MAX_PROGRAM_SIZE
        )));
    }
    Ok(())
}
