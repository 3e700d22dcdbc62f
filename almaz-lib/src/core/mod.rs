//! contains all important data structures

pub mod ast;
pub use ast::*;

pub mod symbols;
pub use symbols::*;

pub mod opcode;
pub use opcode::*;

pub mod module;
pub use module::*;

pub mod bytecode_builder;
pub use bytecode_builder::*;
