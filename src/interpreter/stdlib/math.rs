//! Math natives

use super::{fail, single_number};
use crate::environment::Environment;
use crate::interpreter::callable::Named;
use crate::interpreter::errors::{WRONG_ARG_COUNT, WRONG_ARG_TYPE};
use crate::interpreter::types::{ExecResult, Val};

/// floor(x)
pub fn floor(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    unary(env, "floor", args, f64::floor)
}

/// ceil(x)
pub fn ceil(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    unary(env, "ceil", args, f64::ceil)
}

/// abs(x)
pub fn abs(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    unary(env, "abs", args, f64::abs)
}

/// round(x), halves away from zero
pub fn round(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    unary(env, "round", args, f64::round)
}

/// sqrt(x); negative input is a type error rather than NaN
pub fn sqrt(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    match single_number(env, "sqrt", args) {
        Ok(n) if n < 0.0 => fail(
            env,
            "sqrt",
            WRONG_ARG_TYPE,
            format!("Cannot take the square root of {}", n),
        ),
        Ok(n) => ExecResult::normal(Val::Num(n.sqrt())),
        Err(err) => err,
    }
}

/// min(a, b, ...)
pub fn min(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    fold(env, "min", args, f64::min)
}

/// max(a, b, ...)
pub fn max(args: &[Val], _named: &Named, env: &mut Environment) -> ExecResult {
    fold(env, "max", args, f64::max)
}

fn unary(env: &mut Environment, name: &str, args: &[Val], f: fn(f64) -> f64) -> ExecResult {
    match single_number(env, name, args) {
        Ok(n) => ExecResult::normal(Val::Num(f(n))),
        Err(err) => err,
    }
}

fn fold(env: &mut Environment, name: &str, args: &[Val], f: fn(f64, f64) -> f64) -> ExecResult {
    if args.is_empty() {
        return fail(env, name, WRONG_ARG_COUNT, "Expected at least 1 argument, got 0");
    }
    let mut acc: Option<f64> = None;
    for arg in args {
        let Val::Num(n) = arg else {
            let message = format!("Arguments must be numbers, got {}", arg.type_name());
            return fail(env, name, WRONG_ARG_TYPE, message);
        };
        acc = Some(acc.map_or(*n, |a| f(a, *n)));
    }
    ExecResult::normal(Val::Num(acc.unwrap_or_default()))
}
