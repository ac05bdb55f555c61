//! Virtual Machine state
//!
//! The VM owns the stack of steppers in flight. A stepper never advances its
//! children itself: it hands them to the VM as a `Step::Push`, and the VM
//! resumes it with the child's result once that frame is popped. Call bodies
//! are pushed the same way, so deep nesting and deep recursion grow the frame
//! `Vec` instead of the native stack.

use super::callable::ActiveCall;
use super::context::ContextId;
use super::stepper::Stepper;
use super::types::{ExecResult, Val};
use crate::environment::Environment;

/* ===================== Step ===================== */

/// What a frame asks the VM to do after being resumed
#[derive(Debug)]
pub enum Step {
    /// Resume this frame again
    Continue,
    /// Run a child in the same context; its result is handed back
    Push(Stepper),
    /// Run a user function body in its call scope
    Call(ActiveCall),
    /// Pop this frame with its result
    Done(ExecResult),
}

/* ===================== Frames ===================== */

#[derive(Debug)]
enum FrameKind {
    Eval(Stepper),
    Call(ActiveCall),
}

/// One stepper in flight and the context it runs in
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    ctx: ContextId,
}

/* ===================== VM ===================== */

#[derive(Debug)]
pub struct Vm {
    frames: Vec<Frame>,
    /// Result of the frame popped last, owed to the frame now on top
    input: Option<ExecResult>,
    root: ContextId,
    done: Option<ExecResult>,
}

impl Vm {
    pub fn new(stepper: Stepper, ctx: ContextId) -> Self {
        Self {
            frames: vec![Frame {
                kind: FrameKind::Eval(stepper),
                ctx,
            }],
            input: None,
            root: ctx,
            done: None,
        }
    }

    /// VM whose bottom frame is a call that has already started
    pub(crate) fn call(call: ActiveCall, env: &mut Environment) -> Self {
        let scope = call.scope();
        let mut vm = Self {
            frames: Vec::new(),
            input: None,
            root: scope,
            done: None,
        };
        vm.push_call(call, env);
        vm
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_some()
    }

    pub fn result(&self) -> Option<&ExecResult> {
        self.done.as_ref()
    }

    /// Frames currently in flight
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Resume the top frame once
    ///
    /// Returns the final result when the bottom frame pops. Once finished,
    /// every further call returns the same result.
    pub fn advance(&mut self, env: &mut Environment) -> Option<ExecResult> {
        if let Some(done) = &self.done {
            return Some(done.clone());
        }

        let input = self.input.take();
        let Some(frame) = self.frames.last_mut() else {
            return Some(self.finish(input.unwrap_or_else(ExecResult::void)));
        };
        let ctx = frame.ctx;
        let step = match &mut frame.kind {
            FrameKind::Eval(stepper) => stepper.resume(ctx, env, input),
            FrameKind::Call(call) => call.resume(env, input),
        };

        match step {
            Step::Continue => None,
            Step::Push(child) => {
                self.frames.push(Frame {
                    kind: FrameKind::Eval(child),
                    ctx,
                });
                None
            }
            Step::Call(call) => {
                self.push_call(call, env);
                None
            }
            Step::Done(result) => {
                if let Some(Frame {
                    kind: FrameKind::Call(_),
                    ..
                }) = self.frames.pop()
                {
                    env.leave_call();
                }
                if self.frames.is_empty() {
                    return Some(self.finish(result));
                }
                self.input = Some(result);
                None
            }
        }
    }

    /// Drop every frame still in flight and finish with `result`
    pub(crate) fn abort(&mut self, result: ExecResult, env: &mut Environment) -> ExecResult {
        while let Some(frame) = self.frames.pop() {
            if let FrameKind::Call(call) = frame.kind {
                call.abandon(env);
                env.leave_call();
            }
        }
        self.input = None;
        self.finish(result)
    }

    /// Contexts and values the frames still hold
    pub(crate) fn roots<'a>(&'a self, contexts: &mut Vec<ContextId>, values: &mut Vec<&'a Val>) {
        contexts.push(self.root);
        values.extend(self.input.iter().chain(&self.done).map(ExecResult::value));
        for frame in &self.frames {
            contexts.push(frame.ctx);
            if let FrameKind::Eval(stepper) = &frame.kind {
                stepper.roots(contexts, values);
            }
        }
    }

    fn push_call(&mut self, call: ActiveCall, env: &mut Environment) {
        env.enter_call();
        self.frames.push(Frame {
            ctx: call.scope(),
            kind: FrameKind::Call(call),
        });
    }

    fn finish(&mut self, result: ExecResult) -> ExecResult {
        self.done = Some(result.clone());
        result
    }
}
