//! Transformations applied by `Transform` steppers
//!
//! Each op receives the value of its inner stepper (a list for ops with
//! several operands, `Void` for suppliers) and produces the node's result.

use super::callable::{Callable, UserFunction};
use super::context::ContextId;
use super::errors::{ErrorInfo, DIVISION_BY_ZERO, INDEX_OUT_OF_BOUNDS, SCOPE_ERROR, TYPE_ERROR};
use super::types::{BinaryOp, ExecResult, Flag, State, Stmt, UnaryOp, Val};
use crate::environment::traceback::Location;
use crate::environment::Environment;
use std::rc::Rc;

/// Function definition captured at compile time
#[derive(Debug)]
pub struct FunctionTemplate {
    /// `None` for lambdas
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Parameters with a default expression, in the order their values arrive
    pub defaulted: Vec<String>,
    pub body: Rc<Stmt>,
    pub flags: Vec<Flag>,
}

#[derive(Debug)]
pub enum Op {
    Supply(Val),
    Lookup(String),
    Declare { name: String, flags: Vec<Flag> },
    Assign(String),
    /// Operands: `[object, value]`
    SetMember(String),
    GetMember(String),
    /// Operands: `[object, index]`
    Index,
    Delete(String),
    /// Operands: `[left, right]`
    Binary(BinaryOp),
    Unary(UnaryOp),
    MakeList,
    MakeObject(Vec<String>),
    /// Operands: default values of the defaulted parameters
    Function(Rc<FunctionTemplate>),
    Return,
    Break,
    Continue,
    Throw,
    Import { module: String, bind: Option<String> },
}

/// Apply an op to its evaluated operand
pub fn apply(op: &Op, operand: Val, ctx: ContextId, env: &mut Environment, at: &Location) -> ExecResult {
    match op {
        Op::Supply(value) => ExecResult::normal(value.clone()),

        Op::Lookup(name) => ExecResult::normal(env.contexts().get(ctx, name)),

        Op::Declare { name, flags } => {
            match env.contexts_mut().declare(ctx, name, operand.clone(), flags) {
                Ok(()) => ExecResult::normal(operand),
                Err(err) => error(env, SCOPE_ERROR, err.to_string(), at),
            }
        }

        Op::Assign(name) => match env.contexts_mut().set(ctx, name, operand.clone()) {
            Ok(()) => ExecResult::normal(operand),
            Err(err) => error(env, SCOPE_ERROR, err.to_string(), at),
        },

        Op::SetMember(property) => {
            let (object, value) = split_pair(operand);
            let Val::Obj(object) = object else {
                let message = format!("cannot set '{}' on a {}", property, object.type_name());
                return error(env, TYPE_ERROR, message, at);
            };
            match env.contexts_mut().set(object, property, value.clone()) {
                Ok(()) => ExecResult::normal(value),
                Err(err) => error(env, SCOPE_ERROR, err.to_string(), at),
            }
        }

        Op::GetMember(property) => match operand {
            Val::Obj(object) => ExecResult::normal(env.contexts().member(object, property)),
            other => {
                let message = format!("cannot read '{}' of a {}", property, other.type_name());
                error(env, TYPE_ERROR, message, at)
            }
        },

        Op::Index => {
            let (object, index) = split_pair(operand);
            index_into(object, index, env, at)
        }

        Op::Delete(name) => ExecResult::normal(Val::Bool(env.contexts_mut().del(ctx, name))),

        Op::Binary(op) => {
            let (left, right) = split_pair(operand);
            binary(*op, left, right, env, at)
        }

        Op::Unary(UnaryOp::Not) => ExecResult::normal(Val::Bool(!operand.is_truthy())),
        Op::Unary(UnaryOp::Neg) => match operand {
            Val::Num(n) => ExecResult::normal(Val::Num(-n)),
            other => {
                let message = format!("cannot negate a {}", other.type_name());
                error(env, TYPE_ERROR, message, at)
            }
        },

        Op::MakeList => match operand {
            Val::List(items) => ExecResult::normal(Val::List(items)),
            other => ExecResult::normal(Val::List(vec![other])),
        },

        Op::MakeObject(keys) => {
            let values = into_items(operand);
            let object = env.contexts_mut().create(None);
            for (key, value) in keys.iter().zip(values) {
                if let Err(err) = env.contexts_mut().declare(object, key, value, &[]) {
                    return error(env, SCOPE_ERROR, err.to_string(), at);
                }
            }
            ExecResult::normal(Val::Obj(object))
        }

        Op::Function(template) => define_function(template, operand, ctx, env, at),

        Op::Return => env.raise(State::Returning, operand, at, "return"),
        Op::Break => env.raise(State::Breaking, Val::Void, at, "break"),
        Op::Continue => env.raise(State::Continuing, Val::Void, at, "continue"),
        Op::Throw => {
            let description = match &operand {
                Val::Error(info) => info.to_string(),
                other => format!("throw {}", other),
            };
            env.raise(State::Throwing, operand, at, description)
        }

        Op::Import { module, bind } => {
            let result = env.import(module, at);
            if result.is_abnormal() {
                return result;
            }
            if let Some(name) = bind {
                if let Err(err) = env.contexts_mut().declare(ctx, name, result.value().clone(), &[]) {
                    return error(env, SCOPE_ERROR, err.to_string(), at);
                }
            }
            result
        }
    }
}

/* ===================== Helpers ===================== */

fn error(env: &mut Environment, code: &str, message: String, at: &Location) -> ExecResult {
    env.throw_error(ErrorInfo::new(code, message), at)
}

fn into_items(operand: Val) -> Vec<Val> {
    match operand {
        Val::List(items) => items,
        Val::Void => Vec::new(),
        other => vec![other],
    }
}

fn split_pair(operand: Val) -> (Val, Val) {
    let mut items = into_items(operand).into_iter();
    let first = items.next().unwrap_or(Val::Void);
    let second = items.next().unwrap_or(Val::Void);
    (first, second)
}

fn define_function(
    template: &FunctionTemplate,
    operand: Val,
    ctx: ContextId,
    env: &mut Environment,
    at: &Location,
) -> ExecResult {
    env.contexts_mut().mark_captured(ctx);

    let defaults = template
        .defaulted
        .iter()
        .cloned()
        .zip(into_items(operand))
        .collect();
    let name: Rc<str> = template.name.as_deref().unwrap_or("<lambda>").into();
    let func = Val::Func(Callable::User(Rc::new(UserFunction {
        name,
        params: template.params.clone(),
        defaults,
        body: template.body.clone(),
        closure: ctx,
        module: at.module.clone(),
    })));

    if let Some(name) = &template.name {
        if let Err(err) = env.contexts_mut().declare(ctx, name, func.clone(), &template.flags) {
            return error(env, SCOPE_ERROR, err.to_string(), at);
        }
    }
    ExecResult::normal(func)
}

fn index_into(object: Val, index: Val, env: &mut Environment, at: &Location) -> ExecResult {
    match (object, index) {
        (Val::List(items), Val::Num(n)) => match position(n, items.len()) {
            Some(i) => ExecResult::normal(items[i].clone()),
            None => {
                let message = format!("index {} out of bounds for list of length {}", n, items.len());
                error(env, INDEX_OUT_OF_BOUNDS, message, at)
            }
        },
        (Val::Str(s), Val::Num(n)) => {
            let chars: Vec<char> = s.chars().collect();
            match position(n, chars.len()) {
                Some(i) => ExecResult::normal(Val::Str(chars[i].to_string())),
                None => {
                    let message =
                        format!("index {} out of bounds for string of length {}", n, chars.len());
                    error(env, INDEX_OUT_OF_BOUNDS, message, at)
                }
            }
        }
        (Val::Obj(object), Val::Str(key)) => ExecResult::normal(env.contexts().member(object, &key)),
        (object, index) => {
            let message = format!("cannot index a {} with a {}", object.type_name(), index.type_name());
            error(env, TYPE_ERROR, message, at)
        }
    }
}

/// Integral, non-negative index within bounds
fn position(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
        return None;
    }
    Some(n as usize)
}

fn binary(op: BinaryOp, left: Val, right: Val, env: &mut Environment, at: &Location) -> ExecResult {
    use BinaryOp::*;

    let result = match (op, &left, &right) {
        (Eq, l, r) => Val::Bool(l == r),
        (Ne, l, r) => Val::Bool(l != r),

        (Add, Val::Num(a), Val::Num(b)) => Val::Num(a + b),
        (Add, Val::Str(_), _) | (Add, _, Val::Str(_)) => Val::Str(format!("{}{}", left, right)),
        (Add, Val::List(a), Val::List(b)) => Val::List(a.iter().chain(b).cloned().collect()),

        (Sub, Val::Num(a), Val::Num(b)) => Val::Num(a - b),
        (Mul, Val::Num(a), Val::Num(b)) => Val::Num(a * b),
        (Div | Mod, Val::Num(_), Val::Num(b)) if *b == 0.0 => {
            return error(env, DIVISION_BY_ZERO, "division by zero".to_string(), at);
        }
        (Div, Val::Num(a), Val::Num(b)) => Val::Num(a / b),
        (Mod, Val::Num(a), Val::Num(b)) => Val::Num(a % b),

        (Lt, Val::Num(a), Val::Num(b)) => Val::Bool(a < b),
        (Le, Val::Num(a), Val::Num(b)) => Val::Bool(a <= b),
        (Gt, Val::Num(a), Val::Num(b)) => Val::Bool(a > b),
        (Ge, Val::Num(a), Val::Num(b)) => Val::Bool(a >= b),
        (Lt, Val::Str(a), Val::Str(b)) => Val::Bool(a < b),
        (Le, Val::Str(a), Val::Str(b)) => Val::Bool(a <= b),
        (Gt, Val::Str(a), Val::Str(b)) => Val::Bool(a > b),
        (Ge, Val::Str(a), Val::Str(b)) => Val::Bool(a >= b),

        (op, l, r) => {
            let message = format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                l.type_name(),
                r.type_name()
            );
            return error(env, TYPE_ERROR, message, at);
        }
    };
    ExecResult::normal(result)
}
