//! Core execution loop
//!
//! ## Function Organization
//! 1. run_until_done() - Top-level driver (calls step repeatedly)
//! 2. step() - One VM transition, counted against the budget
//! 3. drive_call() - Same loop for a call started outside any stepper
//!
//! The outermost driver also reclaims unreachable scopes: between steps once
//! the arena has grown past its threshold, and once more when it finishes.

use super::callable::ActiveCall;
use super::context::ContextId;
use super::errors::{ErrorInfo, STEP_LIMIT};
use super::stepper::Stepper;
use super::types::{ExecResult, Span};
use super::vm::Vm;
use crate::environment::traceback::Location;
use crate::environment::Environment;
use tracing::debug;

/* ===================== Public API ===================== */

/// Drive a stepper until it yields a result
pub fn run_until_done(stepper: &mut Stepper, ctx: ContextId, env: &mut Environment) -> ExecResult {
    drive(stepper.machine(ctx), env)
}

/// Execute one step
///
/// Returns `None` while the stepper still has work. Once the step budget is
/// exhausted the stepper is abandoned and yields a Throwing `step_limit` error.
pub fn step(stepper: &mut Stepper, ctx: ContextId, env: &mut Environment) -> Option<ExecResult> {
    let vm = stepper.machine(ctx);
    if vm.is_finished() {
        return vm.advance(env);
    }
    if !env.tick() {
        let failure = step_limit(env);
        return Some(vm.abort(failure, env));
    }
    vm.advance(env)
}

pub(crate) fn drive_call(call: ActiveCall, env: &mut Environment) -> ExecResult {
    let mut vm = Vm::call(call, env);
    drive(&mut vm, env)
}

/* ===================== Driver ===================== */

fn drive(vm: &mut Vm, env: &mut Environment) -> ExecResult {
    if let Some(done) = vm.result() {
        return done.clone();
    }

    let outermost = env.enter_driver();
    let result = loop {
        if !env.tick() {
            let failure = step_limit(env);
            break vm.abort(failure, env);
        }
        if let Some(result) = vm.advance(env) {
            break result;
        }
        if outermost && env.contexts().wants_collection() {
            collect(vm, env);
        }
    };
    if outermost {
        collect(vm, env);
    }
    env.leave_driver();
    result
}

/// Sweep scopes created during this run that nothing reaches
fn collect(vm: &Vm, env: &mut Environment) {
    let mut contexts = env.module_contexts();
    let mut values = Vec::new();
    vm.roots(&mut contexts, &mut values);
    let freed = env.contexts_mut().collect(&contexts, &values);
    debug!(freed, live = env.contexts().live_count(), frames = vm.depth(), "collected scopes");
}

/* ===================== Budget ===================== */

fn step_limit(env: &mut Environment) -> ExecResult {
    let message = format!("step limit of {} exceeded", env.step_limit().unwrap_or_default());
    env.throw_error(
        ErrorInfo::new(STEP_LIMIT, message),
        &Location::new("<runtime>", Span::default()),
    )
}
