use crate::core::*;
use crate::utils;
use im::Vector;
use thiserror::Error;

/// represents byte code while it's being built
///
/// Besides the instruction stream it tracks the operand stack depth the emitted code will
/// have at runtime, so the finished procedure can declare its exact maximum
#[derive(Debug, Clone, Default)]
pub struct ByteCodeBuilder {
    /// Basically the program
    pub text: Vector<OpCode>,
    /// Data section
    pub data: Vector<Constant>,
    /// AST node from which the corresponding OpCode was generated
    pub ast_ids: Vector<usize>,
    /// stack depth after the emitted code ran
    depth: usize,
    /// largest depth seen so far
    max_depth: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuilderError {
    #[error("{opcode} needs {needed} stack entries, but only {available} are available")]
    StackUnderflow {
        opcode: OpCode,
        needed: usize,
        available: usize,
    },

    #[error("the procedure leaves {0} entries on the stack")]
    UnbalancedStack(usize),

    #[error("the stack depth of {0} does not fit the procedure header")]
    StackTooDeep(usize),

    #[error("the procedure needs {0} locals, more than the header can declare")]
    TooManyLocals(usize),

    #[error("the data section is full")]
    DataSectionFull,
}

pub type BuildResult<T> = Result<T, BuilderError>;

impl ByteCodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// appends an opcode and updates the stack state
    pub fn emit(&mut self, opcode: OpCode, ast_id: usize) -> BuildResult<()> {
        let (pops, pushes) = opcode.stack_effect();
        let remaining = self
            .depth
            .checked_sub(pops)
            .ok_or(BuilderError::StackUnderflow {
                opcode,
                needed: pops,
                available: self.depth,
            })?;
        self.depth = remaining + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self.text.push_back(opcode);
        self.ast_ids.push_back(ast_id);
        Ok(())
    }

    /// writes an opcode to push an int to the stack
    pub fn push_int_to_stack(&mut self, val: i64, ast_id: usize) -> BuildResult<()> {
        self.emit(OpCode::PushInt(val), ast_id)
    }

    /// adds a value to the datasection, and pushes an Instruction to push that value onto the stack
    pub fn add_to_datasection_and_push(&mut self, val: Constant, ast_id: usize) -> BuildResult<()> {
        let dsec_idx = u32::try_from(self.data.len()).map_err(|_| BuilderError::DataSectionFull)?;
        self.data.push_back(val);
        self.emit(OpCode::PushConst(dsec_idx), ast_id)
    }

    /// the stack depth the emitted code leaves behind
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Closes the instruction stream with a `Return` and packs it into a module, whose entry
    /// procedure is called `entry_name`
    pub fn build(
        mut self,
        unit_name: &str,
        entry_name: &str,
        locals: usize,
        ast_id: usize,
    ) -> BuildResult<(Module, DebugInformation)> {
        if self.depth != 0 {
            return Err(BuilderError::UnbalancedStack(self.depth));
        }
        self.emit(OpCode::Return, ast_id)?;
        let max_stack =
            u16::try_from(self.max_depth).map_err(|_| BuilderError::StackTooDeep(self.max_depth))?;
        let max_locals = u16::try_from(locals).map_err(|_| BuilderError::TooManyLocals(locals))?;

        let offsets = self.text.iter().scan(0, |offset, oc| {
            let start = *offset;
            *offset += oc.serialized_size();
            Some(start)
        });
        let final_index = offsets.enumerate().map(|(a, b)| (b, a)).collect();
        let final_text = self.text.iter().flat_map(|c| c.to_bytes()).collect();

        Ok((
            Module {
                header: ModuleHeader {
                    version: utils::get_version(),
                    name: unit_name.into(),
                },
                entry: Procedure {
                    name: entry_name.into(),
                    max_stack,
                    max_locals,
                    text: final_text,
                },
                data: self.data.into_iter().collect(),
            },
            DebugInformation {
                ast_ids: self.ast_ids.into_iter().collect(),
                index: final_index,
            },
        ))
    }
}
