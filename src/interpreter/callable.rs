//! User functions and host natives behind one calling contract

use super::context::ContextId;
use super::errors::{ErrorInfo, SCOPE_ERROR, STACK_OVERFLOW};
use super::exec_loop;
use super::stepper::Stepper;
use super::types::{ExecResult, Span, State, Stmt, Val};
use super::vm::Step;
use crate::environment::traceback::Location;
use crate::environment::Environment;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Named arguments at a call site
pub type Named = BTreeMap<String, Val>;

/// Host function signature
pub type NativeFn = dyn Fn(&[Val], &Named, &mut Environment) -> ExecResult;

/* ===================== Callable ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    User(Rc<UserFunction>),
    Native(NativeFunction),
}

/// Function defined in a script
#[derive(Debug)]
pub struct UserFunction {
    pub name: Rc<str>,
    pub params: Vec<String>,
    /// Default values, evaluated when the function was defined
    pub defaults: BTreeMap<String, Val>,
    pub body: Rc<Stmt>,
    /// Scope the function was defined in
    pub closure: ContextId,
    /// Module the body's locations are reported against
    pub module: Rc<str>,
}

impl PartialEq for UserFunction {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Function provided by the host
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&[Val], &Named, &mut Environment) -> ExecResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// Outcome of starting a call
#[derive(Debug)]
pub enum Invocation {
    Finished(ExecResult),
    Running(ActiveCall),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::User(func) => &func.name,
            Callable::Native(func) => func.name(),
        }
    }

    /// Bind arguments and begin the call
    ///
    /// Natives run to completion here. User functions return an `ActiveCall`
    /// for the VM to push as a call frame, or a Throwing `stack_overflow`
    /// once the call depth limit is reached.
    ///
    /// Each parameter takes its named argument if present, else the
    /// positional one, else its default, else `Void`. Surplus arguments are
    /// ignored.
    pub fn start(
        &self,
        args: Vec<Val>,
        mut named: Named,
        env: &mut Environment,
        at: &Location,
    ) -> Invocation {
        match self {
            Callable::Native(native) => {
                let result = (native.func)(&args, &named, env);
                let result = match result.state() {
                    State::Throwing => env.raise(
                        State::Throwing,
                        result.into_value(),
                        at,
                        format!("in call to {}", native.name),
                    ),
                    State::Returning => result.absorb(),
                    _ => result,
                };
                Invocation::Finished(result)
            }
            Callable::User(func) => {
                if env.call_depth_exceeded() {
                    let message = format!(
                        "maximum call depth of {} exceeded calling {}",
                        env.max_call_depth(),
                        func.name
                    );
                    return Invocation::Finished(
                        env.throw_error(ErrorInfo::new(STACK_OVERFLOW, message), at),
                    );
                }

                let scope = env.contexts_mut().create(Some(func.closure));
                let mut positional = args.into_iter();
                for param in &func.params {
                    let arg = positional.next();
                    let value = named
                        .remove(param)
                        .or(arg)
                        .or_else(|| func.defaults.get(param).cloned())
                        .unwrap_or(Val::Void);
                    if let Err(err) = env.contexts_mut().declare(scope, param, value, &[]) {
                        env.contexts_mut().release_uncaptured(scope);
                        let info = ErrorInfo::new(SCOPE_ERROR, err.to_string());
                        return Invocation::Finished(env.throw_error(info, at));
                    }
                }

                Invocation::Running(ActiveCall {
                    body: Some(Stepper::deferred_stmt(func.body.clone(), func.module.clone())),
                    scope,
                    mark: env.traceback().mark(),
                    name: func.name.clone(),
                    at: at.clone(),
                })
            }
        }
    }

    /// Run the call to completion
    pub fn invoke(&self, args: Vec<Val>, named: Named, env: &mut Environment) -> ExecResult {
        let at = Location::new("<host>", Span::default());
        match self.start(args, named, env, &at) {
            Invocation::Finished(result) => result,
            Invocation::Running(call) => exec_loop::drive_call(call, env),
        }
    }
}

/* ===================== ActiveCall ===================== */

/// A user function body in flight
///
/// Sits on the VM's frame stack below its body. It turns the body's result
/// into the call's result once the body frame pops.
#[derive(Debug)]
pub struct ActiveCall {
    body: Option<Stepper>,
    scope: ContextId,
    mark: usize,
    name: Rc<str>,
    at: Location,
}

impl ActiveCall {
    pub fn scope(&self) -> ContextId {
        self.scope
    }

    /// Push the body, then settle its result; Returning becomes Normal here
    pub(crate) fn resume(&mut self, env: &mut Environment, input: Option<ExecResult>) -> Step {
        let Some(result) = input else {
            return match self.body.take() {
                Some(body) => Step::Push(body),
                None => Step::Done(ExecResult::void()),
            };
        };

        let result = match result.state() {
            State::Normal => ExecResult::void(),
            State::Returning => {
                env.traceback_mut().truncate(self.mark);
                result.absorb()
            }
            State::Throwing => env.raise(
                State::Throwing,
                result.into_value(),
                &self.at,
                format!("in call to {}", self.name),
            ),
            State::Breaking | State::Continuing => result,
        };

        env.contexts_mut().release_uncaptured(self.scope);
        Step::Done(result)
    }

    /// Give up on a call whose body will never finish
    pub(crate) fn abandon(self, env: &mut Environment) {
        env.contexts_mut().release_uncaptured(self.scope);
    }
}
