use crate::compiler::CompilationError;
use crate::loader::ExecutionError;
use crate::parser::ParseError;
use thiserror::Error;

/// Any failure on the way from source text to a finished run
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] Box<ParseError>),

    #[error("compilation failed: {0}")]
    Compilation(#[from] CompilationError),

    #[error("encoding the module image failed: {0}")]
    Encode(#[from] postcard::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(Box::new(e))
    }
}

