//! This file defines the opcodes of the stack machine and the operand encoding.
//! The byte level encoding is generated by the OpCode derive-macro, which relies on the
//! [`Operand`] trait defined here.

use proc_macros::OpCode;

use std::fmt;

/// Representing Opcodes, all variants must have zero or one member.
/// An encoded opcode is its u16 discriminant followed by the bytes of its member
#[derive(Debug, Clone, Copy, OpCode, PartialEq, Eq)]
pub enum OpCode {
    /// Push an int to the stack
    PushInt(i64),
    /// Push the constant with this index in the data section
    PushConst(u32),
    /// Push a copy of the local in this slot
    LoadLocal(u16),
    /// Pop the stack top into this slot
    StoreLocal(u16),
    Add,
    Sub,
    Mul,
    Div,
    /// Push a reference to the engines output stream
    GetStdout,
    /// Pops a value and an output stream reference, writes the value and a newline
    Println,
    /// Leave the current procedure
    Return,
}

/// A fixed size operand of an opcode
pub trait Operand: Sized {
    /// number of bytes in the encoded form
    const SIZE: usize;
    fn write_to(&self, buf: &mut Vec<u8>);
    /// reads from the start of bytes, None if there are too few of them
    fn read_from(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_operand {
    ($($t:ty),+) => {
        $(
            impl Operand for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_to(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                fn read_from(bytes: &[u8]) -> Option<Self> {
                    let raw = bytes.get(..Self::SIZE)?;
                    Some(<$t>::from_le_bytes(raw.try_into().ok()?))
                }
            }
        )+
    };
}

impl_operand!(i64, u32, u16);

impl OpCode {
    /// Returns (pops, pushes) of the opcode
    pub fn stack_effect(&self) -> (usize, usize) {
        use OpCode::*;
        match self {
            PushInt(_) | PushConst(_) | LoadLocal(_) | GetStdout => (0, 1),
            StoreLocal(_) => (1, 0),
            Add | Sub | Mul | Div => (2, 1),
            Println => (2, 0),
            Return => (0, 0),
        }
    }

    /// the lower case name used in disassembly
    pub fn mnemonic(&self) -> &'static str {
        use OpCode::*;
        match self {
            PushInt(_) => "push_int",
            PushConst(_) => "push_const",
            LoadLocal(_) => "load_local",
            StoreLocal(_) => "store_local",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            GetStdout => "get_stdout",
            Println => "println",
            Return => "return",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OpCode::*;
        match self {
            PushInt(v) => write!(f, "{} {}", self.mnemonic(), v),
            PushConst(idx) => write!(f, "{} #{}", self.mnemonic(), idx),
            LoadLocal(slot) | StoreLocal(slot) => write!(f, "{} {}", self.mnemonic(), slot),
            _ => f.write_str(self.mnemonic()),
        }
    }
}

/// Decodes a whole text section. Returns the opcodes with their byte offsets, or the offset
/// at which decoding failed
pub fn decode_text(text: &[u8]) -> Result<Vec<(usize, OpCode)>, usize> {
    let mut res = vec![];
    let mut offset = 0;
    while offset < text.len() {
        let opcode = OpCode::from_bytes(&text[offset..]).ok_or(offset)?;
        res.push((offset, opcode));
        offset += opcode.serialized_size();
    }
    Ok(res)
}
