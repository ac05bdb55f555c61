//! Runtime value types

use super::super::callable::Callable;
use super::super::context::ContextId;
use super::super::errors::ErrorInfo;
use std::fmt;

/// Runtime value handle
///
/// Objects are contexts: `Obj` points at an arena slot whose bindings are
/// the object's members. Scalars are plain values and can be shared freely.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    /// Sentinel for "unbound"
    Void,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(ContextId),
    Func(Callable),
    /// Error value with code and message
    Error(ErrorInfo),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Null | Val::Void => false,
            _ => true,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Val::Void)
    }

    /// Name of the value's dynamic type, as reported by `type()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Void => "void",
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Func(_) => "function",
            Val::Error(_) => "error",
        }
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Bool(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Num(v)
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::Str(v.to_string())
    }
}

impl From<String> for Val {
    fn from(v: String) -> Self {
        Val::Str(v)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Void => write!(f, "void"),
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Val::Str(s) => write!(f, "{}", s),
            Val::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Val::Str(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Val::Obj(id) => write!(f, "<object {}>", id),
            Val::Func(func) => write!(f, "<function {}>", func.name()),
            Val::Error(info) => write!(f, "{}", info),
        }
    }
}
