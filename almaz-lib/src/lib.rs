//! What happens to a script on its way to execution:
//! 1. the source is parsed into an ast with [`parser::parse`], which also returns the span of
//!    every ast node, indexed by the node's id.
//! 1. the ast is compiled into a [`core::Module`] with [`compiler::compile_program`]. Every
//!    statement is compiled by its implementation of [`compiler::Compilable`], which emits
//!    opcodes into a [`core::ByteCodeBuilder`] and looks up variables in a
//!    [`core::SymbolTable`]. The [`core::DebugInformation`] returned alongside maps byte
//!    offsets back to ast ids.
//! 1. the module is serialized into an image with [`core::Module::to_image`].
//! 1. [`loader::load_and_invoke`] installs the image into a [`vm::Engine`], which verifies it,
//!    then resolves the entry procedure and calls it.
//!
//! [`run_source`] does all of that in one go:
//!
//! ```
//! use almaz_lib::{compiler::CompileOptions, run_source, vm::Engine};
//!
//! let mut engine = Engine::with_output(Vec::new());
//! run_source(&mut engine, "print (1 + 2) * 3", &CompileOptions::default()).unwrap();
//! assert_eq!(engine.output(), b"9\n");
//! ```

pub mod compiler;
pub mod core;
pub mod disasm;
pub mod error;
pub mod loader;
pub mod parser;
pub mod utils;
pub mod vm;

pub use error::Error;

use crate::compiler::CompileOptions;
use crate::core::{DebugInformation, Module};
use std::io::Write;

/// parses and compiles `src`
pub fn compile_source(
    src: &str,
    options: &CompileOptions,
) -> Result<(Module, DebugInformation), Error> {
    let (program, _) = parser::parse(src)?;
    Ok(compiler::compile_program(&program, options)?)
}

/// compiles `src` and runs it in `engine`
pub fn run_source<W: Write>(
    engine: &mut vm::Engine<W>,
    src: &str,
    options: &CompileOptions,
) -> Result<(), Error> {
    let (module, _) = compile_source(src, options)?;
    let image = module.to_image()?;
    Ok(loader::load_and_invoke(engine, &image, options)?)
}
