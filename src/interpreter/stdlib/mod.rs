//! Standard native modules
//!
//! Natives are grouped by the module scripts import them from:
//! - `lang`: printing, inspection and error construction
//! - `math`: numeric helpers

pub mod lang;
pub mod math;

use super::callable::NativeFunction;
use super::errors::{ErrorInfo, WRONG_ARG_COUNT, WRONG_ARG_TYPE};
use super::types::{ExecResult, Val};
use crate::environment::natives::NativeRegistry;
use crate::environment::traceback::Location;
use crate::environment::Environment;

/* ===================== Registration ===================== */

/// Register every standard native module
pub fn install(registry: &mut NativeRegistry) {
    registry.register("lang", NativeFunction::new("print", lang::print));
    registry.register("lang", NativeFunction::new("len", lang::len));
    registry.register("lang", NativeFunction::new("type", lang::type_of));
    registry.register("lang", NativeFunction::new("str", lang::to_str));
    registry.register("lang", NativeFunction::new("keys", lang::keys));
    registry.register("lang", NativeFunction::new("copy", lang::copy));
    registry.register("lang", NativeFunction::new("error", lang::error));

    registry.register("math", NativeFunction::new("floor", math::floor));
    registry.register("math", NativeFunction::new("ceil", math::ceil));
    registry.register("math", NativeFunction::new("abs", math::abs));
    registry.register("math", NativeFunction::new("round", math::round));
    registry.register("math", NativeFunction::new("sqrt", math::sqrt));
    registry.register("math", NativeFunction::new("min", math::min));
    registry.register("math", NativeFunction::new("max", math::max));
}

/* ===================== Argument Helpers ===================== */

/// Throw an error attributed to a native
pub(crate) fn fail(
    env: &mut Environment,
    function: &str,
    code: &str,
    message: impl Into<String>,
) -> ExecResult {
    env.throw_error(ErrorInfo::new(code, message), &Location::native(function))
}

pub(crate) fn expect_arity(
    env: &mut Environment,
    function: &str,
    args: &[Val],
    expected: usize,
) -> Result<(), ExecResult> {
    if args.len() != expected {
        return Err(fail(
            env,
            function,
            WRONG_ARG_COUNT,
            format!("Expected {} argument(s), got {}", expected, args.len()),
        ));
    }
    Ok(())
}

/// Single numeric argument
pub(crate) fn single_number(
    env: &mut Environment,
    function: &str,
    args: &[Val],
) -> Result<f64, ExecResult> {
    expect_arity(env, function, args, 1)?;
    match &args[0] {
        Val::Num(n) => Ok(*n),
        other => Err(fail(
            env,
            function,
            WRONG_ARG_TYPE,
            format!("Argument must be a number, got {}", other.type_name()),
        )),
    }
}
