//! Type definitions for the interpreter
//!
//! - AST nodes (Program, Stmt, Expr)
//! - Runtime values (Val)
//! - Execution results (ExecResult, State)

pub mod ast;
pub mod result;
pub mod values;

// Re-export all types for convenient access
pub use ast::{BinaryOp, Expr, Flag, LogicalOp, NamedArg, Param, Program, Span, Stmt, UnaryOp};
pub use result::{ExecResult, State};
pub use values::Val;
