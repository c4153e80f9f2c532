//! loadfold
//!
//! Load resolution and hash folding for a Yul-style tree IR of a metered
//! stack machine.

pub mod ast;
pub mod config;
pub mod dataflow;
pub mod dialect;
pub mod error;
pub mod fixture;
pub mod gas;
pub mod lexer;
pub mod optimize;
pub mod parser;
pub mod semantics;
pub mod source;

pub use ast::Span;
pub use error::{CompileError, Result};

/// Stack growth parameters for walks over deeply nested programs
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Tokenize and parse `source` into a program block
pub fn parse_program(filename: &str, source: &str) -> Result<ast::Block> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(filename, source, tokens)
}
