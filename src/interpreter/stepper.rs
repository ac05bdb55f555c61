//! Resumable evaluation units
//!
//! `resume` does one stepper's own work and never advances a child: children
//! go to the VM as `Step::Push`, and their result comes back as `input` on the
//! next resume. Children start out `Deferred` and are compiled from their AST
//! only when the VM first reaches them.
//!
//! `advance` is the driving surface: it returns `None` while work remains and
//! `Some(result)` once the stepper has finished. A finished stepper keeps its
//! result, so driving it again returns the same thing without re-running
//! anything.

use super::callable::Invocation;
use super::compile;
use super::context::ContextId;
use super::errors::{ErrorInfo, NOT_CALLABLE, SCOPE_ERROR, TYPE_ERROR};
use super::ops::{self, Op};
use super::types::{ExecResult, Expr, State, Stmt, Val};
use super::vm::{Step, Vm};
use crate::environment::traceback::Location;
use crate::environment::Environment;
use std::collections::{BTreeMap, VecDeque};
use std::mem;
use std::rc::Rc;

/* ===================== Stepper ===================== */

/// Closed set of evaluation units every AST node compiles into
#[derive(Debug)]
pub enum Stepper {
    Sequence(Sequence),
    Transform(Transform),
    Branch(Branch),
    Loop(Loop),
    Iterate(Iterate),
    Guard(Guard),
    Call(Call),
    /// AST node not compiled yet
    Deferred(Deferred),
    /// Stepper being driven on its own frame stack
    Driven(Box<Vm>),
}

impl Stepper {
    /// Statement sequence yielding the last value
    pub fn sequence(parts: Vec<Stepper>) -> Self {
        Stepper::Sequence(Sequence::new(parts, SeqMode::Last))
    }

    /// Operand sequence yielding every value as a list
    pub fn collect(parts: Vec<Stepper>) -> Self {
        Stepper::Sequence(Sequence::new(parts, SeqMode::Collect))
    }

    pub fn transform(inner: Option<Stepper>, op: Op, at: Location) -> Self {
        Stepper::Transform(Transform {
            inner: inner.map(Box::new),
            op,
            at,
        })
    }

    /// Transformation with no inner stepper
    pub fn supply(value: Val, at: Location) -> Self {
        Self::transform(None, Op::Supply(value), at)
    }

    pub fn deferred_stmt(stmt: Rc<Stmt>, module: Rc<str>) -> Self {
        Stepper::Deferred(Deferred::Stmt(stmt, module))
    }

    pub fn deferred_expr(expr: Rc<Expr>, at: Location) -> Self {
        Stepper::Deferred(Deferred::Expr(expr, at))
    }

    /// Advance one step; `Some` once the stepper has a result
    ///
    /// The first call moves the stepper onto a frame stack of its own bound
    /// to `ctx`; the context passed to later calls is not consulted.
    pub fn advance(&mut self, ctx: ContextId, env: &mut Environment) -> Option<ExecResult> {
        self.machine(ctx).advance(env)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Stepper::Driven(vm) if vm.is_finished())
    }

    /// The VM driving this stepper, installed on first use
    pub(crate) fn machine(&mut self, ctx: ContextId) -> &mut Vm {
        if !matches!(self, Stepper::Driven(_)) {
            let root = mem::replace(self, Stepper::sequence(Vec::new()));
            *self = Stepper::Driven(Box::new(Vm::new(root, ctx)));
        }
        match self {
            Stepper::Driven(vm) => &mut **vm,
            _ => unreachable!("stepper was just moved onto a frame stack"),
        }
    }

    /// Do this stepper's own work once
    ///
    /// `input` is the result of the child pushed by the previous resume.
    pub(crate) fn resume(
        &mut self,
        ctx: ContextId,
        env: &mut Environment,
        input: Option<ExecResult>,
    ) -> Step {
        if let Stepper::Deferred(node) = self {
            let compiled = node.compile();
            *self = compiled;
        }

        match self {
            Stepper::Sequence(s) => s.resume(input),
            Stepper::Transform(s) => s.resume(ctx, env, input),
            Stepper::Branch(s) => s.resume(input),
            Stepper::Loop(s) => s.resume(env, input),
            Stepper::Iterate(s) => s.resume(ctx, env, input),
            Stepper::Guard(s) => s.resume(ctx, env, input),
            Stepper::Call(s) => s.resume(env, input),
            Stepper::Driven(vm) => match vm.advance(env) {
                Some(result) => Step::Done(result),
                None => Step::Continue,
            },
            Stepper::Deferred(_) => Step::Done(ExecResult::void()),
        }
    }

    /// Contexts and values this stepper holds on to
    pub(crate) fn roots<'a>(&'a self, contexts: &mut Vec<ContextId>, values: &mut Vec<&'a Val>) {
        match self {
            Stepper::Sequence(s) => {
                values.extend(&s.values);
                s.parts.iter().for_each(|part| part.roots(contexts, values));
            }
            Stepper::Transform(s) => {
                if let Op::Supply(value) = &s.op {
                    values.push(value);
                }
                if let Some(inner) = &s.inner {
                    inner.roots(contexts, values);
                }
            }
            Stepper::Branch(s) => {
                if let Some(test) = &s.test {
                    test.roots(contexts, values);
                }
            }
            Stepper::Iterate(s) => {
                values.extend(&s.items);
                if let Some(source) = &s.source {
                    source.roots(contexts, values);
                }
            }
            Stepper::Guard(s) => {
                values.extend(s.pending.as_ref().map(ExecResult::value));
                if let Some(body) = &s.body {
                    body.roots(contexts, values);
                }
            }
            Stepper::Call(s) => {
                if let Some(operands) = &s.operands {
                    operands.roots(contexts, values);
                }
            }
            Stepper::Driven(vm) => vm.roots(contexts, values),
            Stepper::Loop(_) | Stepper::Deferred(_) => {}
        }
    }
}

fn scope_failure(env: &mut Environment, err: impl ToString, at: &Location) -> ExecResult {
    env.throw_error(ErrorInfo::new(SCOPE_ERROR, err.to_string()), at)
}

/* ===================== Deferred ===================== */

/// AST node waiting to be compiled
#[derive(Debug)]
pub enum Deferred {
    Stmt(Rc<Stmt>, Rc<str>),
    Expr(Rc<Expr>, Location),
}

impl Deferred {
    fn compile(&self) -> Stepper {
        match self {
            Deferred::Stmt(stmt, module) => compile::statement(stmt, module),
            Deferred::Expr(expr, at) => compile::expression(expr, at),
        }
    }
}

/* ===================== Sequence ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqMode {
    /// Yield the last sub-result's value
    Last,
    /// Yield a list of every sub-result's value
    Collect,
}

#[derive(Debug)]
pub struct Sequence {
    /// Parts not yet started; the front one runs next
    parts: VecDeque<Stepper>,
    mode: SeqMode,
    values: Vec<Val>,
}

impl Sequence {
    fn new(parts: Vec<Stepper>, mode: SeqMode) -> Self {
        Self {
            parts: parts.into(),
            mode,
            values: Vec::new(),
        }
    }

    fn resume(&mut self, input: Option<ExecResult>) -> Step {
        if let Some(result) = input {
            if result.is_abnormal() {
                return Step::Done(result);
            }
            match self.mode {
                SeqMode::Last => self.values = vec![result.into_value()],
                SeqMode::Collect => self.values.push(result.into_value()),
            }
        }

        match self.parts.pop_front() {
            Some(part) => Step::Push(part),
            None => Step::Done(self.complete()),
        }
    }

    fn complete(&mut self) -> ExecResult {
        let values = mem::take(&mut self.values);
        match self.mode {
            SeqMode::Last => ExecResult::normal(values.into_iter().last().unwrap_or(Val::Void)),
            SeqMode::Collect => ExecResult::normal(Val::List(values)),
        }
    }
}

/* ===================== Transform ===================== */

/// Transformation applied to the value of an optional inner stepper
#[derive(Debug)]
pub struct Transform {
    inner: Option<Box<Stepper>>,
    op: Op,
    at: Location,
}

impl Transform {
    fn resume(&mut self, ctx: ContextId, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let operand = match input {
            Some(result) if result.is_abnormal() => return Step::Done(result),
            Some(result) => result.into_value(),
            None => match self.inner.take() {
                Some(inner) => return Step::Push(*inner),
                None => Val::Void,
            },
        };
        Step::Done(ops::apply(&self.op, operand, ctx, env, &self.at))
    }
}

/* ===================== Branch ===================== */

/// What a branch does once its test has been evaluated
#[derive(Debug)]
pub enum Arm {
    Run(Box<Stepper>),
    /// Yield the test value itself (short-circuit and/or)
    Yield,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchPhase {
    Test,
    Taken,
}

/// If, ternary and short-circuit logic
#[derive(Debug)]
pub struct Branch {
    test: Option<Box<Stepper>>,
    when_true: Arm,
    when_false: Arm,
    phase: BranchPhase,
}

impl Branch {
    pub fn new(test: Stepper, when_true: Arm, when_false: Arm) -> Self {
        Self {
            test: Some(Box::new(test)),
            when_true,
            when_false,
            phase: BranchPhase::Test,
        }
    }

    fn resume(&mut self, input: Option<ExecResult>) -> Step {
        let Some(result) = input else {
            return match self.test.take() {
                Some(test) => Step::Push(*test),
                None => Step::Done(ExecResult::void()),
            };
        };
        if self.phase == BranchPhase::Taken || result.is_abnormal() {
            return Step::Done(result);
        }

        let value = result.into_value();
        let arm = if value.is_truthy() {
            mem::replace(&mut self.when_true, Arm::Void)
        } else {
            mem::replace(&mut self.when_false, Arm::Void)
        };
        match arm {
            Arm::Run(stepper) => {
                self.phase = BranchPhase::Taken;
                Step::Push(*stepper)
            }
            Arm::Yield => Step::Done(ExecResult::normal(value)),
            Arm::Void => Step::Done(ExecResult::void()),
        }
    }
}

/* ===================== Loop ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopPhase {
    Test,
    Body,
}

/// While loop; absorbs Breaking and Continuing
///
/// Test and body are recompiled on every pass so each iteration starts with
/// fresh stepper state.
#[derive(Debug)]
pub struct Loop {
    test: Rc<Expr>,
    body: Rc<Stmt>,
    at: Location,
    phase: LoopPhase,
    mark: Option<usize>,
}

impl Loop {
    pub fn new(test: Rc<Expr>, body: Rc<Stmt>, at: Location) -> Self {
        Self {
            test,
            body,
            at,
            phase: LoopPhase::Test,
            mark: None,
        }
    }

    fn resume(&mut self, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let mark = *self.mark.get_or_insert_with(|| env.traceback().mark());
        let Some(result) = input else {
            return self.next_test();
        };

        match self.phase {
            LoopPhase::Test => {
                if result.is_abnormal() {
                    return Step::Done(result);
                }
                if !result.value().is_truthy() {
                    return Step::Done(ExecResult::void());
                }
                self.phase = LoopPhase::Body;
                Step::Push(Stepper::deferred_stmt(self.body.clone(), self.at.module.clone()))
            }
            LoopPhase::Body => match result.state() {
                State::Normal => self.next_test(),
                State::Continuing => {
                    env.traceback_mut().truncate(mark);
                    self.next_test()
                }
                State::Breaking => {
                    env.traceback_mut().truncate(mark);
                    Step::Done(ExecResult::void())
                }
                State::Returning | State::Throwing => Step::Done(result),
            },
        }
    }

    fn next_test(&mut self) -> Step {
        self.phase = LoopPhase::Test;
        Step::Push(Stepper::deferred_expr(self.test.clone(), self.at.clone()))
    }
}

/* ===================== Iterate ===================== */

/// For-each over list items, string characters or object keys
#[derive(Debug)]
pub struct Iterate {
    binding: String,
    source: Option<Box<Stepper>>,
    body: Rc<Stmt>,
    at: Location,
    /// Set once the source has been evaluated
    started: bool,
    items: Vec<Val>,
    index: usize,
    mark: usize,
}

impl Iterate {
    pub fn new(binding: String, iterable: Stepper, body: Rc<Stmt>, at: Location) -> Self {
        Self {
            binding,
            source: Some(Box::new(iterable)),
            body,
            at,
            started: false,
            items: Vec::new(),
            index: 0,
            mark: 0,
        }
    }

    fn resume(&mut self, ctx: ContextId, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let Some(result) = input else {
            return match self.source.take() {
                Some(source) => Step::Push(*source),
                None => Step::Done(ExecResult::void()),
            };
        };

        if !self.started {
            if result.is_abnormal() {
                return Step::Done(result);
            }
            self.items = match result.into_value() {
                Val::List(items) => items,
                Val::Str(s) => s.chars().map(|c| Val::Str(c.to_string())).collect(),
                Val::Obj(object) => public_keys(env, object),
                other => {
                    let err = ErrorInfo::new(
                        TYPE_ERROR,
                        format!("cannot iterate over a {}", other.type_name()),
                    );
                    return Step::Done(env.throw_error(err, &self.at));
                }
            };
            self.started = true;
            self.mark = env.traceback().mark();
            return self.next_item(ctx, env);
        }

        match result.state() {
            State::Normal => {}
            State::Continuing => env.traceback_mut().truncate(self.mark),
            State::Breaking => {
                env.traceback_mut().truncate(self.mark);
                return Step::Done(ExecResult::void());
            }
            State::Returning | State::Throwing => return Step::Done(result),
        }
        self.next_item(ctx, env)
    }

    fn next_item(&mut self, ctx: ContextId, env: &mut Environment) -> Step {
        let Some(item) = self.items.get(self.index).cloned() else {
            return Step::Done(ExecResult::void());
        };
        self.index += 1;
        if let Err(err) = env.contexts_mut().set(ctx, &self.binding, item) {
            return Step::Done(scope_failure(env, err, &self.at));
        }
        Step::Push(Stepper::deferred_stmt(self.body.clone(), self.at.module.clone()))
    }
}

fn public_keys(env: &Environment, object: ContextId) -> Vec<Val> {
    env.contexts()
        .public_names(object)
        .into_iter()
        .map(Val::Str)
        .collect()
}

/* ===================== Guard ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardPhase {
    Body,
    Handler,
    Finally,
}

/// Try / catch / finally
#[derive(Debug)]
pub struct Guard {
    body: Option<Box<Stepper>>,
    catch_var: Option<String>,
    handler: Option<Rc<Stmt>>,
    finally: Option<Rc<Stmt>>,
    at: Location,
    phase: GuardPhase,
    mark: Option<usize>,
    /// Result the finally block hands on when it completes normally
    pending: Option<ExecResult>,
}

impl Guard {
    pub fn new(
        body: Stepper,
        catch_var: Option<String>,
        handler: Option<Rc<Stmt>>,
        finally: Option<Rc<Stmt>>,
        at: Location,
    ) -> Self {
        Self {
            body: Some(Box::new(body)),
            catch_var,
            handler,
            finally,
            at,
            phase: GuardPhase::Body,
            mark: None,
            pending: None,
        }
    }

    fn resume(&mut self, ctx: ContextId, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let mark = *self.mark.get_or_insert_with(|| env.traceback().mark());
        let Some(result) = input else {
            return match self.body.take() {
                Some(body) => Step::Push(*body),
                None => Step::Done(ExecResult::void()),
            };
        };

        match self.phase {
            GuardPhase::Body => {
                let Some(handler) = self.handler.clone() else {
                    return self.enter_finally(result);
                };
                if result.state() != State::Throwing {
                    return self.enter_finally(result);
                }

                env.traceback_mut().truncate(mark);
                if let Some(name) = &self.catch_var {
                    if let Err(err) = env.contexts_mut().set(ctx, name, result.into_value()) {
                        let failure = scope_failure(env, err, &self.at);
                        return self.enter_finally(failure);
                    }
                }
                self.phase = GuardPhase::Handler;
                Step::Push(Stepper::deferred_stmt(handler, self.at.module.clone()))
            }
            GuardPhase::Handler => self.enter_finally(result),
            GuardPhase::Finally => {
                let pending = self.pending.take().unwrap_or_else(ExecResult::void);
                if result.is_abnormal() {
                    Step::Done(result)
                } else {
                    Step::Done(pending)
                }
            }
        }
    }

    fn enter_finally(&mut self, result: ExecResult) -> Step {
        match &self.finally {
            Some(cleanup) => {
                let cleanup = Stepper::deferred_stmt(cleanup.clone(), self.at.module.clone());
                self.pending = Some(result);
                self.phase = GuardPhase::Finally;
                Step::Push(cleanup)
            }
            None => Step::Done(result),
        }
    }
}

/* ===================== Call ===================== */

/// Function call: operands first, then the callee's body
///
/// Operands are collected as `[callee, positional.., named..]`. A user
/// function's body goes to the VM as its own call frame.
#[derive(Debug)]
pub struct Call {
    operands: Option<Box<Stepper>>,
    positional: usize,
    named: Vec<String>,
    at: Location,
    /// Set once the callee's frame has been handed to the VM
    entered: bool,
}

impl Call {
    pub fn new(operands: Stepper, positional: usize, named: Vec<String>, at: Location) -> Self {
        Self {
            operands: Some(Box::new(operands)),
            positional,
            named,
            at,
            entered: false,
        }
    }

    fn resume(&mut self, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let Some(result) = input else {
            return match self.operands.take() {
                Some(operands) => Step::Push(*operands),
                None => Step::Done(ExecResult::void()),
            };
        };
        if self.entered || result.is_abnormal() {
            return Step::Done(result);
        }

        let mut values = match result.into_value() {
            Val::List(values) => values,
            other => vec![other],
        };
        let named_values = values.split_off((1 + self.positional).min(values.len()));
        let args = values.split_off(1usize.min(values.len()));
        let callee = values.pop().unwrap_or(Val::Void);
        let named: BTreeMap<String, Val> = self.named.iter().cloned().zip(named_values).collect();

        let func = match callee {
            Val::Func(func) => func,
            other => {
                let err = ErrorInfo::new(
                    NOT_CALLABLE,
                    format!("{} is not callable", other.type_name()),
                );
                return Step::Done(env.throw_error(err, &self.at));
            }
        };

        match func.start(args, named, env, &self.at) {
            Invocation::Finished(result) => Step::Done(result),
            Invocation::Running(call) => {
                self.entered = true;
                Step::Call(call)
            }
        }
    }
}
