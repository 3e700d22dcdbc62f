use thiserror::Error;
use tracing::debug;

use crate::core::*;

/// Everything one compilation mutates. A fresh context is created for every program and
/// handed down the compile calls, so compilations never share state
#[derive(Debug, Default)]
pub struct EmitContext {
    pub builder: ByteCodeBuilder,
    pub symbols: SymbolTable,
}

pub trait Compilable {
    fn compile(&self, ctx: &mut EmitContext) -> Result<()>;
}

pub type Result<T> = std::result::Result<T, CompilationError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompilationError {
    #[error("undeclared identifier: {name}")]
    UndeclaredIdentifier { ast_id: usize, name: String },

    #[error("too many local variables, no slot left for {name}")]
    TooManyLocals { ast_id: usize, name: String },

    #[error("A compiler bug was detected: {msg}")]
    CompilerBug { ast_id: usize, msg: String },
}

/// Names of the unit and entry procedure of the produced module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub unit_name: String,
    pub entry_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            unit_name: "Program".into(),
            entry_name: "main".into(),
        }
    }
}

impl CompilationError {
    /// id of the ast node the error refers to
    pub fn ast_id(&self) -> usize {
        match self {
            Self::UndeclaredIdentifier { ast_id, .. }
            | Self::TooManyLocals { ast_id, .. }
            | Self::CompilerBug { ast_id, .. } => *ast_id,
        }
    }
}

macro_rules! compilation_error {
    ($($err:tt)+) => {
        return Err(CompilationError::$($err)*)
    };
}

macro_rules! compiler_bug {
    ($ast_id: expr, $msg:literal $(, $args: expr)*) => {
        return Err(CompilationError::CompilerBug{
            ast_id: $ast_id,
            msg: format!($msg $(, $args)*)})
    };
}

macro_rules! impl_compilable {
    ($t:ty: $self:ident, $ctx:ident => $code:tt) => {
        impl Compilable for $t {
            fn compile(&$self, $ctx: &mut EmitContext) -> Result<()> {
                $code
            }
        }
    };
}

impl EmitContext {
    fn emit(&mut self, opcode: OpCode, ast_id: usize) -> Result<()> {
        self.builder
            .emit(opcode, ast_id)
            .map_err(|e| CompilationError::CompilerBug {
                ast_id,
                msg: e.to_string(),
            })
    }
}

/// strips the delimiting quotes of a string literal, exactly one on each side.
/// Everything in between is kept verbatim
pub fn unquote(literal: &str) -> Option<&str> {
    literal.strip_prefix('"')?.strip_suffix('"')
}

fn check_shape(ast_id: usize, operands: usize, operators: usize, level: &str) -> Result<()> {
    if operands == 0 || operands != operators + 1 {
        compiler_bug!(
            ast_id,
            "malformed {}: {} operands joined by {} operators",
            level,
            operands,
            operators
        );
    }
    Ok(())
}

impl_compilable! { Program: self, ctx => {
    let Program(_, statements) = self;
    for statement in statements {
        statement.compile(ctx)?;
    }
    Ok(())
}}

impl_compilable! { Statement: self, ctx => {
    use Statement::*;
    match self {
        Print(id, expr) => {
            ctx.emit(OpCode::GetStdout, *id)?;
            expr.compile(ctx)?;
            ctx.emit(OpCode::Println, *id)
        }
        Let { id, symbol_name, value_expr } => {
            value_expr.compile(ctx)?;
            let Ok(slot) = ctx.symbols.declare(symbol_name) else {
                compilation_error!(TooManyLocals { ast_id: *id, name: symbol_name.clone() });
            };
            ctx.emit(OpCode::StoreLocal(slot), *id)
        }
    }
}}

impl_compilable! { Expression: self, ctx => {
    let Expression { id, terms, operators } = self;
    check_shape(*id, terms.len(), operators.len(), "expression")?;
    let Some((first, rest)) = terms.split_first() else {
        compiler_bug!(*id, "expression without terms");
    };
    first.compile(ctx)?;
    for (op, term) in operators.iter().zip(rest) {
        term.compile(ctx)?;
        let opcode = match op {
            AddOp::Add => OpCode::Add,
            AddOp::Sub => OpCode::Sub,
        };
        ctx.emit(opcode, *id)?;
    }
    Ok(())
}}

impl_compilable! { Term: self, ctx => {
    let Term { id, factors, operators } = self;
    check_shape(*id, factors.len(), operators.len(), "term")?;
    let Some((first, rest)) = factors.split_first() else {
        compiler_bug!(*id, "term without factors");
    };
    first.compile(ctx)?;
    for (op, factor) in operators.iter().zip(rest) {
        factor.compile(ctx)?;
        let opcode = match op {
            MulOp::Mul => OpCode::Mul,
            MulOp::Div => OpCode::Div,
        };
        ctx.emit(opcode, *id)?;
    }
    Ok(())
}}

impl_compilable! { Factor: self, ctx => {
    use Factor::*;
    match self {
        SubExpr(_, expr) => expr.compile(ctx),
        IntLit(id, val) => ctx
            .builder
            .push_int_to_stack(*val, *id)
            .map_err(|e| CompilationError::CompilerBug { ast_id: *id, msg: e.to_string() }),
        StrLit(id, literal) => {
            let Some(text) = unquote(literal) else {
                compiler_bug!(*id, "string literal without delimiters: {}", literal);
            };
            ctx.builder
                .add_to_datasection_and_push(Constant::Str(text.to_owned()), *id)
                .map_err(|e| CompilationError::CompilerBug { ast_id: *id, msg: e.to_string() })
        }
        Symbol(id, name) => {
            let Some(slot) = ctx.symbols.resolve(name.as_str()) else {
                compilation_error!(UndeclaredIdentifier { ast_id: *id, name: name.clone() });
            };
            ctx.emit(OpCode::LoadLocal(slot), *id)
        }
    }
}}

/// compiles a whole program into a module with a single entry procedure
pub fn compile_program(
    program: &Program,
    options: &CompileOptions,
) -> Result<(Module, DebugInformation)> {
    let mut ctx = EmitContext::default();
    program.compile(&mut ctx)?;

    let EmitContext { builder, symbols } = ctx;
    let Program(id, statements) = program;
    let (module, info) = builder
        .build(&options.unit_name, &options.entry_name, symbols.len(), *id)
        .map_err(|e| CompilationError::CompilerBug {
            ast_id: *id,
            msg: e.to_string(),
        })?;
    debug!(
        unit = %module.header.name,
        statements = statements.len(),
        max_stack = module.entry.max_stack,
        max_locals = module.entry.max_locals,
        text_bytes = module.entry.text.len(),
        "compiled program"
    );
    Ok((module, info))
}
