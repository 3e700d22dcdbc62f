//! Contains the AST types. All anonymous structs and variants start with a usize, which is their
//! ID. The Id refers to the index in the Span-vec that is returned together with the ast

/// a whole source file, the statements are executed one after another
#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub usize, pub Vec<Statement>);

/// represents a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// writes the value of the expression to stdout, followed by a newline
    Print(usize, Expression),
    /// binds the value of the expression to a local variable
    Let {
        id: usize,
        symbol_name: String,
        value_expr: Expression,
    },
}

/// additive level: `terms[0] operators[0] terms[1] ...`
///
/// A well formed expression has exactly one operator less than it has terms
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub id: usize,
    pub terms: Vec<Term>,
    pub operators: Vec<AddOp>,
}

/// multiplicative level, same shape as [`Expression`]
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub id: usize,
    pub factors: Vec<Factor>,
    pub operators: Vec<MulOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    /// a parenthesized sub expression
    SubExpr(usize, Box<Expression>),
    IntLit(usize, i64),
    /// the literal text as it appears in the source, including the quotes
    StrLit(usize, String),
    /// represents a symbol, respectivly it's value
    Symbol(usize, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOp {
    Mul,
    Div,
}

impl Factor {
    pub fn id(&self) -> usize {
        match self {
            Factor::SubExpr(id, _)
            | Factor::IntLit(id, _)
            | Factor::StrLit(id, _)
            | Factor::Symbol(id, _) => *id,
        }
    }
}

impl Statement {
    pub fn id(&self) -> usize {
        match self {
            Statement::Print(id, _) | Statement::Let { id, .. } => *id,
        }
    }
}
