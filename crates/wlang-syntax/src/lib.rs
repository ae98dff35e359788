//! WLang front-end
//!
//! Lexer, parser and AST for a small imperative language with assignments,
//! conditionals, loops, assertions, assumptions and nondeterministic `havoc`
//! inputs.

pub mod ast;
pub mod lexer;
pub mod parser;

use std::path::Path;

pub use ast::{AExp, ArithOp, BExp, RelOp, Stmt};
pub use parser::{parse_aexp, parse_bexp, parse_program, ParseError};

/// Read and parse a program from disk
pub fn parse_file(path: impl AsRef<Path>) -> Result<Stmt, SourceError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_program(&source)?)
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}
