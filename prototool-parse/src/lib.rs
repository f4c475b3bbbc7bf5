//! Loss-preserving lexing and parsing of Protobuf sources.
//!
//! The token stream keeps every byte of the input: whitespace, newlines, and
//! comments are tokens like any other, and concatenating the `text` of all
//! tokens reproduces the source exactly. The parser builds an arena AST on
//! top of the stream; nodes keep token spans instead of copied text so the
//! formatter can re-emit comments and the linter can point at precise
//! locations.

mod ast;
mod lexer;
mod parser;

pub use ast::{Ast, FieldLabel, Node, NodeIndex, NodeKind};
pub use lexer::{lex, Location, Token, TokenKind};
pub use parser::parse;

use prototool_config::Failure;

/// Lexes and parses one file. The path is used only for diagnostics.
pub fn parse_source(path: &str, source: &str) -> Result<Ast, Failure> {
    let tokens = lex(path, source)?;
    parse(path, tokens)
}
