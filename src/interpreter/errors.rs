//! Language-level error objects
//!
//! Errors raised inside scripts travel as `Val::Error(ErrorInfo)` in a
//! Throwing result. The `code` is the machine-readable category.

use std::fmt;

/* ===================== Error Codes ===================== */

pub const TYPE_ERROR: &str = "type_error";
pub const WRONG_ARG_COUNT: &str = "wrong_arg_count";
pub const WRONG_ARG_TYPE: &str = "wrong_arg_type";
pub const NOT_CALLABLE: &str = "not_callable";
pub const INDEX_OUT_OF_BOUNDS: &str = "index_out_of_bounds";
pub const DIVISION_BY_ZERO: &str = "division_by_zero";
pub const SCOPE_ERROR: &str = "scope_error";
pub const STEP_LIMIT: &str = "step_limit";
pub const STACK_OVERFLOW: &str = "stack_overflow";
pub const USER_ERROR: &str = "error";

// Import failures
pub const ABSENT: &str = "absent";
pub const CIRCULAR: &str = "circular";
pub const INVALID_SYNTAX: &str = "invalid_syntax";
pub const LOADING_FAILED: &str = "loading_failed";

/* ===================== ErrorInfo ===================== */

/// Error value with code and message
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
