//! Execution results: value plus control state

use super::values::Val;
use crate::environment::traceback::{TraceFrame, Traceback};

/* ===================== Control State ===================== */

/// Control flow state carried by every result
///
/// Anything other than `Normal` is abnormal and short-circuits composition
/// until a construct designed to catch it absorbs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Normal,
    Breaking,
    Continuing,
    Returning,
    Throwing,
}

impl State {
    pub fn is_abnormal(self) -> bool {
        self != State::Normal
    }
}

/* ===================== ExecResult ===================== */

/// Immutable value + control state pair
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    value: Val,
    state: State,
}

impl ExecResult {
    pub fn normal(value: Val) -> Self {
        Self {
            value,
            state: State::Normal,
        }
    }

    /// Normal result carrying `Void`
    pub fn void() -> Self {
        Self::normal(Val::Void)
    }

    /// Build an abnormal result, recording the trace frame
    ///
    /// Callers outside the crate go through `Environment::raise`.
    pub(crate) fn abnormal(
        state: State,
        value: Val,
        frame: TraceFrame,
        traceback: &mut Traceback,
    ) -> Self {
        debug_assert!(state.is_abnormal(), "abnormal result built with Normal state");
        traceback.push(frame);
        Self { value, state }
    }

    pub fn value(&self) -> &Val {
        &self.value
    }

    pub fn into_value(self) -> Val {
        self.value
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_normal(&self) -> bool {
        self.state == State::Normal
    }

    pub fn is_abnormal(&self) -> bool {
        self.state.is_abnormal()
    }

    /// Rewrite an intercepted result to Normal, keeping its value
    pub fn absorb(self) -> Self {
        Self::normal(self.value)
    }
}
