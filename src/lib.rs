pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;

// Re-export main types
pub use config::Config;
pub use environment::{Environment, LoadingState, Script, Tier};
pub use error::EnvironmentError;
pub use interpreter::{run_until_done, step, Callable, ContextId, ExecResult, State, Stepper, Val};
