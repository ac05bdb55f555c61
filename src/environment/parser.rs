//! Parser collaborator boundary
//!
//! The text grammar lives outside this crate. Embedders plug a parser in
//! through `ScriptParser`; the default reads a JSON-serialized `Program`.

use crate::interpreter::types::Program;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{module}:{line}:{column}: {message}")]
pub struct ParseError {
    pub module: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Turns module source into an AST
pub trait ScriptParser {
    fn parse(&self, module: &str, source: &str) -> Result<Program, ParseError>;
}

/// Parser for programs already in their JSON AST form
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAstParser;

impl ScriptParser for JsonAstParser {
    fn parse(&self, module: &str, source: &str) -> Result<Program, ParseError> {
        serde_json::from_str(source).map_err(|e| ParseError {
            module: module.to_string(),
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })
    }
}
