//! The host execution engine.
//!
//! Units are installed from module images and then invoked through a typed [`EntryPoint`].
//! Installing verifies the code, so running it only fails for reasons that depend on the
//! values the program computes.

use crate::core::*;
use crate::utils;
use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use std::result::Result as StdResult;
use thiserror::Error;
use tracing::{debug, trace};

macro_rules! rt_err{
    ($msg:literal $(, $args:expr)*) => { Error::Runtime(format!($msg $(, $args)*)) };
}

macro_rules! bail{
    ($($err:tt)*) => {
        return Err(Error::$($err)*)
    };
}

pub mod memory;
pub use memory::*;

pub mod value;
pub use value::*;

pub mod verify;
pub use verify::*;

/// Failures while executing an opcode
#[derive(Error, Debug)]
pub enum Error {
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("TypeError, {opcode} can't be applied to {lhs} and {rhs}")]
    TypeError {
        opcode: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("The stack was empty unexpectedly: {0}")]
    StackEmpty(String),

    #[error("the operand stack exceeded its declared size of {0}")]
    StackOverflow(usize),

    #[error("local slot {0} was read before it was written")]
    UninitializedLocal(u16),

    #[error("there is no local slot {0}")]
    NoSuchLocal(u16),

    #[error("writing output failed: {0}")]
    Output(#[from] io::Error),
}

/// A failure during a call, with the byte offset of the opcode that failed
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RuntimeError {
    pub offset: usize,
    #[source]
    pub error: Error,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed module image: {0}")]
    Decode(#[from] postcard::Error),

    #[error("module was compiled by version {found:?}, the engine is version {expected:?}")]
    VersionMismatch { found: [u16; 3], expected: [u16; 3] },

    #[error("a unit named {0} is already installed")]
    DuplicateUnit(String),

    #[error("no unit named {0} is installed")]
    UnknownUnit(String),

    #[error("unit {unit} has no procedure named {procedure}")]
    UnknownProcedure { unit: String, procedure: String },

    #[error("verification of {unit}.{procedure} failed {failure}")]
    Verification {
        unit: String,
        procedure: String,
        failure: VerifyFailure,
    },
}

pub type Result<T> = StdResult<T, Error>;

/// returned by exec
pub enum ExecOutcome {
    /// continue with the next opcode
    Next,
    /// the procedure returned
    Return,
}

/// a verified procedure of an installed unit
#[derive(Debug)]
struct LoadedProcedure {
    name: String,
    max_stack: u16,
    max_locals: u16,
    code: Vec<(usize, OpCode)>,
}

#[derive(Debug)]
struct Unit {
    entry: LoadedProcedure,
    data: Vec<Constant>,
}

/// Handle to a zero-argument procedure of an installed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    unit: String,
    procedure: String,
}

impl EntryPoint {
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }
}

pub struct Engine<W: Write = Stdout> {
    out: W,
    units: HashMap<String, Unit>,
}

impl Engine<Stdout> {
    /// an engine that prints to the process' stdout
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Engine<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Engine<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            out,
            units: HashMap::new(),
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn is_installed(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    /// Decodes, checks and installs a module image. Returns the name of the installed unit
    pub fn install(&mut self, image: &[u8]) -> StdResult<String, LoadError> {
        let Module {
            header,
            entry,
            data,
        } = Module::from_image(image)?;

        let expected = utils::get_version();
        if header.version != expected {
            return Err(LoadError::VersionMismatch {
                found: header.version,
                expected,
            });
        }
        if self.units.contains_key(&header.name) {
            return Err(LoadError::DuplicateUnit(header.name));
        }

        let code = verify(&entry, data.len()).map_err(|failure| LoadError::Verification {
            unit: header.name.clone(),
            procedure: entry.name.clone(),
            failure,
        })?;
        debug!(
            unit = %header.name,
            entry = %entry.name,
            opcodes = code.len(),
            constants = data.len(),
            "installed unit"
        );

        let unit = Unit {
            entry: LoadedProcedure {
                name: entry.name,
                max_stack: entry.max_stack,
                max_locals: entry.max_locals,
                code,
            },
            data,
        };
        self.units.insert(header.name.clone(), unit);
        Ok(header.name)
    }

    /// finds the zero-argument procedure `procedure` of an installed unit
    pub fn resolve_entry(&self, unit: &str, procedure: &str) -> StdResult<EntryPoint, LoadError> {
        let loaded = self
            .units
            .get(unit)
            .ok_or_else(|| LoadError::UnknownUnit(unit.into()))?;
        if loaded.entry.name != procedure {
            return Err(LoadError::UnknownProcedure {
                unit: unit.into(),
                procedure: procedure.into(),
            });
        }
        Ok(EntryPoint {
            unit: unit.into(),
            procedure: procedure.into(),
        })
    }

    /// runs the procedure behind `entry` to completion
    pub fn call(&mut self, entry: &EntryPoint) -> StdResult<(), RuntimeError> {
        let Some(unit) = self.units.get(&entry.unit) else {
            return Err(RuntimeError {
                offset: 0,
                error: rt_err!("unit {} is not installed in this engine", entry.unit),
            });
        };
        let procedure = &unit.entry;
        debug!(unit = %entry.unit, procedure = %procedure.name, "calling");

        let mut mem = Memory::new(procedure.max_stack as usize, procedure.max_locals as usize);
        for &(offset, opcode) in &procedure.code {
            trace!(offset, %opcode, depth = mem.stack.len(), "exec");
            match exec(opcode, &mut mem, &unit.data, &mut self.out) {
                Ok(ExecOutcome::Next) => {}
                Ok(ExecOutcome::Return) => {
                    return self
                        .out
                        .flush()
                        .map_err(|e| RuntimeError { offset, error: e.into() });
                }
                Err(error) => return Err(RuntimeError { offset, error }),
            }
        }
        Err(RuntimeError {
            offset: procedure.code.last().map(|(offset, _)| *offset).unwrap_or(0),
            error: rt_err!("procedure {} ran past its end", procedure.name),
        })
    }
}

/// executes a single opcode
pub fn exec<W: Write>(
    opcode: OpCode,
    mem: &mut Memory,
    data: &[Constant],
    out: &mut W,
) -> Result<ExecOutcome> {
    use OpCode::*;
    match opcode {
        PushInt(val) => mem.push_stack(val)?,
        PushConst(idx) => {
            let Some(Constant::Str(s)) = data.get(idx as usize) else {
                return Err(rt_err!("no constant with index {}", idx));
            };
            mem.push_stack(s.clone())?
        }
        LoadLocal(slot) => mem.load_local(slot)?,
        StoreLocal(slot) => mem.store_local(slot)?,
        Add | Sub | Mul | Div => {
            let rhs = mem.pop_stack()?;
            let lhs = mem.pop_stack()?;
            mem.push_stack(arithmetic(opcode, lhs, rhs)?)?
        }
        GetStdout => mem.push_stack(Value::Output)?,
        Println => {
            let val = mem.pop_stack()?;
            let target = mem.pop_stack()?;
            if target != Value::Output {
                return Err(rt_err!("println expects an output stream, found {}", target.type_name()));
            }
            writeln!(out, "{}", val)?
        }
        Return => return Ok(ExecOutcome::Return),
    }
    Ok(ExecOutcome::Next)
}

fn arithmetic(opcode: OpCode, lhs: Value, rhs: Value) -> Result<Value> {
    let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) else {
        bail!(TypeError {
            opcode: opcode.mnemonic(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };
    let res = match opcode {
        OpCode::Add => a.checked_add(*b),
        OpCode::Sub => a.checked_sub(*b),
        OpCode::Mul => a.checked_mul(*b),
        OpCode::Div => {
            if *b == 0 {
                bail!(DivisionByZero);
            }
            a.checked_div(*b)
        }
        _ => return Err(rt_err!("{} is not an arithmetic opcode", opcode)),
    };
    res.map(Value::Int)
        .ok_or(Error::Overflow(opcode.mnemonic()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile_program, CompileOptions};
    use crate::parser;

    fn image(src: &str, unit_name: &str) -> Vec<u8> {
        let (program, _) = parser::parse(src).unwrap();
        let options = CompileOptions {
            unit_name: unit_name.into(),
            ..CompileOptions::default()
        };
        let (module, _) = compile_program(&program, &options).unwrap();
        module.to_image().unwrap()
    }

    fn run(src: &str) -> StdResult<String, RuntimeError> {
        crate::test_utils::init_test_logging();
        let mut engine = Engine::with_output(Vec::new());
        let unit = engine.install(&image(src, "Program")).unwrap();
        let entry = engine.resolve_entry(&unit, "main").unwrap();
        engine.call(&entry)?;
        Ok(String::from_utf8(engine.into_output()).unwrap())
    }

    #[test]
    fn test_prints_values() {
        assert_eq!(run("print 2 + 3 * 4 print \"hello\"").unwrap(), "14\nhello\n");
    }

    #[test]
    fn test_install_once() {
        let mut engine = Engine::with_output(Vec::new());
        engine.install(&image("print 1", "Program")).unwrap();
        assert!(matches!(
            engine.install(&image("print 2", "Program")),
            Err(LoadError::DuplicateUnit(name)) if name == "Program"
        ));
        engine.install(&image("print 3", "Other")).unwrap();
        assert!(engine.is_installed("Other"));
    }

    #[test]
    fn test_resolve_entry() {
        let mut engine = Engine::with_output(Vec::new());
        engine.install(&image("print 1", "Program")).unwrap();
        assert!(matches!(
            engine.resolve_entry("Program", "start"),
            Err(LoadError::UnknownProcedure { .. })
        ));
        assert!(matches!(
            engine.resolve_entry("Missing", "main"),
            Err(LoadError::UnknownUnit(_))
        ));
        let entry = engine.resolve_entry("Program", "main").unwrap();
        assert_eq!(entry.unit(), "Program");
        assert_eq!(entry.procedure(), "main");
    }

    #[test]
    fn test_under_declared_bounds_fail_at_load() {
        let (program, _) = parser::parse("print 1 + 2").unwrap();
        let (mut module, _) = compile_program(&program, &CompileOptions::default()).unwrap();
        module.entry.max_stack = 2;
        let mut engine = Engine::with_output(Vec::new());
        assert!(matches!(
            engine.install(&module.to_image().unwrap()),
            Err(LoadError::Verification { failure: VerifyFailure { reason: VerifyError::StackOverflow { .. }, .. }, .. })
        ));
        assert!(!engine.is_installed("Program"));
    }

    #[test]
    fn test_version_is_checked() {
        let (program, _) = parser::parse("print 1").unwrap();
        let (mut module, _) = compile_program(&program, &CompileOptions::default()).unwrap();
        module.header.version = [u16::MAX, 0, 0];
        let mut engine = Engine::with_output(Vec::new());
        assert!(matches!(
            engine.install(&module.to_image().unwrap()),
            Err(LoadError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_division_by_zero_is_a_runtime_error() {
        let err = run("print 1 print 7 / (2 - 2)").unwrap_err();
        assert!(matches!(err.error, Error::DivisionByZero));
        // stdout, 1, println, stdout, 7, 2, 2, sub
        assert_eq!(err.offset, 2 + 10 + 2 + 2 + 10 + 10 + 10 + 2);
    }

    #[test]
    fn test_overflow_and_type_errors() {
        let err = run("print 9223372036854775807 + 1").unwrap_err();
        assert!(matches!(err.error, Error::Overflow("add")));
        let err = run("print \"a\" * 2").unwrap_err();
        assert!(matches!(
            err.error,
            Error::TypeError { opcode: "mul", lhs: "string", rhs: "int" }
        ));
    }

    #[test]
    fn test_output_before_failure_is_kept() {
        let mut engine = Engine::with_output(Vec::new());
        let unit = engine.install(&image("print 1 print 1 / 0", "Program")).unwrap();
        let entry = engine.resolve_entry(&unit, "main").unwrap();
        assert!(engine.call(&entry).is_err());
        assert_eq!(engine.output(), b"1\n");
    }
}
