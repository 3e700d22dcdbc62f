use serde::{Deserialize, Serialize};

use std::collections::HashMap;

/// A compiled unit, one named type holding one entry procedure.
///
/// The module image that the engine loads is the postcard encoding of this struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub header: ModuleHeader,
    pub entry: Procedure,
    /// Data section, indexed by `PushConst`
    pub data: Vec<Constant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleHeader {
    /// version of the crate that compiled this module
    pub version: [u16; 3],
    /// the name the unit is installed under
    pub name: String,
}

/// a procedure without arguments and without a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// upper bound for the operand stack depth
    pub max_stack: u16,
    /// number of local variable slots
    pub max_locals: u16,
    /// the encoded opcodes
    pub text: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constant {
    Str(String),
}

/// Produced alongside a module, not part of the image
#[derive(Debug, Clone, Default)]
pub struct DebugInformation {
    /// Has one entry for each opcode in text. The nth entry contains the ast id of the node
    /// that produced the corresponding opcode
    pub ast_ids: Vec<usize>,
    /// contains the mapping from offset in the byte-Vec to
    /// index of opcode in OpCode-Vec
    pub index: HashMap<usize, usize>,
}

impl Module {
    /// serializes the module into the image format the engine installs
    pub fn to_image(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_image(image: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(image)
    }
}

impl DebugInformation {
    /// get's the id of the ast-node that was compiled into the opcode at the byte offset
    pub fn offset_to_ast_id(&self, offset: usize) -> Option<usize> {
        self.index
            .get(&offset)
            .and_then(|idx| self.ast_ids.get(*idx))
            .copied()
    }
}
