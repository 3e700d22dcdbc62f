//! Human readable listing of a compiled module, used by `--show-bytecode`

use crate::core::*;
use std::fmt::Write;

/// Renders the entry procedure of `module`, one opcode per line
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let proc = &module.entry;
    // writing into a String can't fail
    let _ = writeln!(out, "unit {}", module.header.name);
    let _ = writeln!(
        out,
        "proc {} (max_stack {}, max_locals {})",
        proc.name, proc.max_stack, proc.max_locals
    );

    match decode_text(&proc.text) {
        Ok(code) => {
            for (offset, opcode) in code {
                let _ = write!(out, "{:04}  {}", offset, opcode);
                if let OpCode::PushConst(idx) = opcode {
                    if let Some(Constant::Str(s)) = module.data.get(idx as usize) {
                        let _ = write!(out, "  ; {:?}", s);
                    }
                }
                out.push('\n');
            }
        }
        Err(offset) => {
            let _ = writeln!(out, "{:04}  <undecodable>", offset);
        }
    }
    out
}
