//! Installs a module image into an engine and runs its entry procedure

use crate::compiler::CompileOptions;
use crate::vm::{Engine, LoadError, RuntimeError};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Keeps failures to load apart from failures while running
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl ExecutionError {
    /// byte offset of the failing opcode, if the failure happened while running
    pub fn offset(&self) -> Option<usize> {
        match self {
            ExecutionError::Runtime(e) => Some(e.offset),
            ExecutionError::Load(_) => None,
        }
    }
}

/// Installs `image` and calls the entry procedure named in `options`.
///
/// The unit stays installed after a runtime failure, so the same image can't be loaded into
/// `engine` twice.
pub fn load_and_invoke<W: Write>(
    engine: &mut Engine<W>,
    image: &[u8],
    options: &CompileOptions,
) -> Result<(), ExecutionError> {
    engine.install(image)?;
    let entry = engine.resolve_entry(&options.unit_name, &options.entry_name)?;
    debug!(unit = %entry.unit(), procedure = %entry.procedure(), "invoking");
    engine.call(&entry)?;
    Ok(())
}
