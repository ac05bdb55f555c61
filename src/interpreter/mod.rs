//! # Interpreter - Resumable Step-Driven Evaluation
//!
//! Every AST node compiles into a `Stepper`. Steppers are driven by repeated
//! `advance` calls instead of native recursion, so evaluation can be paused
//! between any two steps and the step budget can cut it off.
//!
//! ## Core Principles
//!
//! 1. **Resumable**: all in-flight state lives in steppers on the `Vm` frame stack
//! 2. **Flat native stack**: nesting and calls grow the frame `Vec`, never the Rust stack
//! 3. **Results carry control**: `ExecResult` pairs a value with a `State`
//! 4. **Scopes in an arena**: contexts are addressed by `ContextId`
//! 5. **Environment by `&mut`**: no global state

pub mod callable;
pub mod compile;
pub mod context;
pub mod errors;
pub mod exec_loop;
pub mod ops;
pub mod stdlib;
pub mod stepper;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use callable::{Callable, NativeFunction, UserFunction};
pub use context::{ContextArena, ContextError, ContextId};
pub use errors::ErrorInfo;
pub use exec_loop::{run_until_done, step};
pub use stepper::Stepper;
pub use types::{ExecResult, State, Val};
pub use vm::Vm;
