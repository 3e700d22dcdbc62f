//! Load time checks of a procedure.
//!
//! The code of a procedure is straight-line, so a single pass that simulates the stack depth
//! and the set of assigned locals is exact.

use crate::core::{decode_text, OpCode, Procedure};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("bytes do not form an opcode")]
    UndecodableOpcode,

    #[error("{opcode} needs {needed} stack entries, but only {available} are available")]
    StackUnderflow {
        opcode: OpCode,
        needed: usize,
        available: usize,
    },

    #[error("stack depth {depth} exceeds the declared maximum of {max_stack}")]
    StackOverflow { depth: usize, max_stack: u16 },

    #[error("local slot {slot} is outside the declared {max_locals} locals")]
    LocalOutOfRange { slot: u16, max_locals: u16 },

    #[error("local slot {0} is read before it is written")]
    UninitializedLocal(u16),

    #[error("constant {index} is outside the data section of length {len}")]
    ConstantOutOfRange { index: u32, len: usize },

    #[error("return with {0} entries left on the stack")]
    ResidueAtReturn(usize),

    #[error("code after return")]
    CodeAfterReturn,

    #[error("the procedure does not end with a return")]
    MissingReturn,
}

/// A failed check, with the byte offset of the offending opcode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at offset {offset}: {reason}")]
pub struct VerifyFailure {
    pub offset: usize,
    pub reason: VerifyError,
}

macro_rules! reject {
    ($offset:expr, $($reason:tt)+) => {
        return Err(VerifyFailure { offset: $offset, reason: VerifyError::$($reason)* })
    };
}

/// Decodes and checks the text of `procedure`, returning the opcodes with their byte offsets
pub fn verify(
    procedure: &Procedure,
    data_len: usize,
) -> Result<Vec<(usize, OpCode)>, VerifyFailure> {
    let code = decode_text(&procedure.text).map_err(|offset| VerifyFailure {
        offset,
        reason: VerifyError::UndecodableOpcode,
    })?;
    let max_locals = procedure.max_locals;
    let mut assigned = vec![false; max_locals as usize];
    let mut depth = 0usize;
    let mut returned = false;

    for &(offset, opcode) in &code {
        if returned {
            reject!(offset, CodeAfterReturn);
        }
        let (pops, pushes) = opcode.stack_effect();
        let Some(remaining) = depth.checked_sub(pops) else {
            reject!(offset, StackUnderflow { opcode, needed: pops, available: depth });
        };
        depth = remaining + pushes;
        if depth > procedure.max_stack as usize {
            reject!(offset, StackOverflow { depth, max_stack: procedure.max_stack });
        }

        match opcode {
            OpCode::LoadLocal(slot) | OpCode::StoreLocal(slot) if slot >= max_locals => {
                reject!(offset, LocalOutOfRange { slot, max_locals });
            }
            OpCode::LoadLocal(slot) if !assigned[slot as usize] => {
                reject!(offset, UninitializedLocal(slot));
            }
            OpCode::StoreLocal(slot) => assigned[slot as usize] = true,
            OpCode::PushConst(index) if index as usize >= data_len => {
                reject!(offset, ConstantOutOfRange { index, len: data_len });
            }
            OpCode::Return if depth != 0 => {
                reject!(offset, ResidueAtReturn(depth));
            }
            OpCode::Return => returned = true,
            _ => {}
        }
    }

    if !returned {
        reject!(procedure.text.len(), MissingReturn);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OpCode::*;

    fn procedure(ops: &[OpCode], max_stack: u16, max_locals: u16) -> Procedure {
        Procedure {
            name: "main".into(),
            max_stack,
            max_locals,
            text: ops.iter().flat_map(|op| op.to_bytes()).collect(),
        }
    }

    fn reason(ops: &[OpCode], max_stack: u16, max_locals: u16, data_len: usize) -> VerifyError {
        verify(&procedure(ops, max_stack, max_locals), data_len)
            .unwrap_err()
            .reason
    }

    #[test]
    fn test_accepts_well_formed_code() {
        let ops = [PushInt(1), StoreLocal(0), GetStdout, LoadLocal(0), PushConst(0), Add, Println, Return];
        let code = verify(&procedure(&ops, 3, 1), 1).unwrap();
        assert_eq!(code.len(), ops.len());
    }

    #[test]
    fn test_under_declared_stack() {
        let ops = [GetStdout, PushInt(1), PushInt(2), Add, Println, Return];
        assert_eq!(
            reason(&ops, 2, 0, 0),
            VerifyError::StackOverflow { depth: 3, max_stack: 2 }
        );
        assert!(verify(&procedure(&ops, 3, 0), 0).is_ok());
    }

    #[test]
    fn test_underflow() {
        let failure = verify(&procedure(&[PushInt(1), Add, Return], 2, 0), 0).unwrap_err();
        assert_eq!(failure.offset, 10);
        assert_eq!(
            failure.reason,
            VerifyError::StackUnderflow { opcode: Add, needed: 2, available: 1 }
        );
    }

    #[test]
    fn test_locals() {
        assert_eq!(
            reason(&[PushInt(1), StoreLocal(1), Return], 1, 1, 0),
            VerifyError::LocalOutOfRange { slot: 1, max_locals: 1 }
        );
        assert_eq!(
            reason(&[LoadLocal(0), StoreLocal(0), Return], 1, 1, 0),
            VerifyError::UninitializedLocal(0)
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            reason(&[PushConst(2), StoreLocal(0), Return], 1, 1, 2),
            VerifyError::ConstantOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_return_discipline() {
        assert_eq!(reason(&[PushInt(1), Return], 1, 0, 0), VerifyError::ResidueAtReturn(1));
        assert_eq!(reason(&[Return, Return], 0, 0, 0), VerifyError::CodeAfterReturn);
        assert_eq!(reason(&[GetStdout, PushInt(1), Println], 2, 0, 0), VerifyError::MissingReturn);
        assert_eq!(reason(&[], 0, 0, 0), VerifyError::MissingReturn);
    }

    #[test]
    fn test_garbage_text() {
        let proc = Procedure {
            name: "main".into(),
            max_stack: 0,
            max_locals: 0,
            text: vec![0xff, 0xff],
        };
        assert_eq!(verify(&proc, 0).unwrap_err().reason, VerifyError::UndecodableOpcode);
    }
}
