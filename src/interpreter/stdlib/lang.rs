//! Core language natives

use super::{expect_arity, fail};
use crate::environment::Environment;
use crate::interpreter::callable::Named;
use crate::interpreter::context::ContextId;
use crate::interpreter::errors::{ErrorInfo, SCOPE_ERROR, USER_ERROR, WRONG_ARG_COUNT, WRONG_ARG_TYPE};
use crate::interpreter::types::{ExecResult, Val};

/// print(a, b, ...) - writes the values separated by spaces
pub fn print(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    env.print(line);
    ExecResult::void()
}

/// len(x) for strings, lists and objects
pub fn len(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    if let Err(err) = expect_arity(env, "len", args, 1) {
        return err;
    }
    let n = match &args[0] {
        Val::Str(s) => s.chars().count(),
        Val::List(items) => items.len(),
        Val::Obj(object) => visible_keys(env, *object).len(),
        other => {
            let message = format!("len() not supported for {}", other.type_name());
            return fail(env, "len", WRONG_ARG_TYPE, message);
        }
    };
    ExecResult::normal(Val::Num(n as f64))
}

/// type(x)
pub fn type_of(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    if let Err(err) = expect_arity(env, "type", args, 1) {
        return err;
    }
    ExecResult::normal(Val::from(args[0].type_name()))
}

/// str(x)
pub fn to_str(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    if let Err(err) = expect_arity(env, "str", args, 1) {
        return err;
    }
    ExecResult::normal(Val::Str(args[0].to_string()))
}

/// keys(obj) - member names in insertion order, private members excluded
pub fn keys(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    if let Err(err) = expect_arity(env, "keys", args, 1) {
        return err;
    }
    match &args[0] {
        Val::Obj(object) => {
            let names = visible_keys(env, *object);
            ExecResult::normal(Val::List(names.into_iter().map(Val::Str).collect()))
        }
        other => {
            let message = format!("keys() expects an object, got {}", other.type_name());
            fail(env, "keys", WRONG_ARG_TYPE, message)
        }
    }
}

/// copy(x) - shallow copy of an object or list
pub fn copy(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    if let Err(err) = expect_arity(env, "copy", args, 1) {
        return err;
    }
    match &args[0] {
        Val::Obj(object) => match env.contexts_mut().copy(*object) {
            Ok(copy) => ExecResult::normal(Val::Obj(copy)),
            Err(err) => fail(env, "copy", SCOPE_ERROR, err.to_string()),
        },
        other => ExecResult::normal(other.clone()),
    }
}

/// error(message) or error(code, message)
pub fn error(args: &[Val], named: &Named, env: &mut Environment) -> ExecResult {
    let info = match args {
        [message] => ErrorInfo::new(USER_ERROR, message.to_string()),
        [code, message] => ErrorInfo::new(code.to_string(), message.to_string()),
        [] if named.contains_key("message") => {
            let code = named
                .get("code")
                .map(ToString::to_string)
                .unwrap_or_else(|| USER_ERROR.to_string());
            let message = named.get("message").map(ToString::to_string).unwrap_or_default();
            ErrorInfo::new(code, message)
        }
        _ => {
            let message = format!("Expected 1 or 2 arguments, got {}", args.len());
            return fail(env, "error", WRONG_ARG_COUNT, message);
        }
    };
    ExecResult::normal(Val::Error(info))
}

fn visible_keys(env: &Environment, object: ContextId) -> Vec<String> {
    env.contexts().public_names(object)
}
