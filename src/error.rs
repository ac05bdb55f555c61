//! Errors surfaced to embedders

use crate::environment::LoadingState;
use crate::interpreter::ExecResult;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// A loading method was called in the wrong state
    #[error("{operation} requires the {expected:?} state, but the environment is {found:?}")]
    OutOfOrder {
        operation: &'static str,
        expected: LoadingState,
        found: LoadingState,
    },

    #[error("environment is already in the Normal state")]
    AlreadyNormal,

    /// A native, builtin or pre-library module failed during bring-up
    ///
    /// `result` is the Throwing result an import of the module would have
    /// produced: the initializer's thrown value, or an error value whose code
    /// names the import failure.
    #[error("bootstrap failed in module '{module}': {reason}")]
    Bootstrap {
        module: String,
        reason: String,
        result: ExecResult,
    },

    #[error("failed to index search location {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}
