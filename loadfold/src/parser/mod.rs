//! Parser implementation using lalrpop
//!
//! The grammar runs over the logos token stream; the program is a single
//! block.

use lalrpop_util::ParseError;

use crate::ast::{Block, Span};
use crate::error::{CompileError, Result};
use crate::lexer::Token;

#[cfg(test)]
mod tests;

lalrpop_util::lalrpop_mod!(
    #[allow(clippy::all)]
    grammar,
    "/parser/grammar.rs"
);

/// Parse tokens into a program tree
pub fn parse(_filename: &str, _source: &str, tokens: Vec<(Token, Span)>) -> Result<Block> {
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (span.start, tok, span.end));

    grammar::ProgramParser::new()
        .parse(token_iter)
        .map_err(|e| match e {
            // Literal and switch checks already carry their own span
            ParseError::User { error } => error,
            e => {
                let span = match &e {
                    ParseError::InvalidToken { location } => Span::new(*location, *location + 1),
                    ParseError::UnrecognizedEof { location, .. } => Span::new(*location, *location + 1),
                    ParseError::UnrecognizedToken { token, .. } => Span::new(token.0, token.2),
                    ParseError::ExtraToken { token } => Span::new(token.0, token.2),
                    ParseError::User { .. } => Span::default(),
                };
                CompileError::parser(format!("{e}"), span)
            }
        })
}
