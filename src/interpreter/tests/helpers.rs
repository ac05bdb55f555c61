//! Test helpers for interpreter tests
//!
//! Programs are written as JSON ASTs, the same form the default parser reads.
//! The small builders below keep the common node shapes short.

use crate::environment::{Environment, Script};
use crate::interpreter::types::Program;
use crate::interpreter::ExecResult;
use serde_json::{json, Value};

/* ===================== Environments ===================== */

/// Environment in the Normal state with the standard natives loaded and
/// `print` output captured
pub fn env() -> Environment {
    init_tracing();
    let mut env = Environment::new();
    env.capture_output();
    env.load_natives().expect("load_natives failed");
    env.load_builtins().expect("load_builtins failed");
    env.load_normal().expect("load_normal failed");
    env
}

pub fn program(body: Vec<Value>) -> Program {
    serde_json::from_value(json!({ "body": body })).expect("Program deserialization failed")
}

/// Compile and run statements as module `main`
pub fn run_in(env: &mut Environment, body: Vec<Value>) -> (ExecResult, Script) {
    let script = env.compile_program("main", program(body));
    let result = env.run_script(&script);
    (result, script)
}

/// Fresh environment, then `run_in`
pub fn run(body: Vec<Value>) -> (Environment, ExecResult, Script) {
    let mut env = env();
    let (result, script) = run_in(&mut env, body);
    (env, result, script)
}

/// Log to the test writer; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/* ===================== Expressions ===================== */

pub fn num(v: f64) -> Value {
    json!({ "t": "LitNum", "v": v })
}

pub fn string(v: &str) -> Value {
    json!({ "t": "LitStr", "v": v })
}

pub fn boolean(v: bool) -> Value {
    json!({ "t": "LitBool", "v": v })
}

pub fn list(elements: Vec<Value>) -> Value {
    json!({ "t": "LitList", "elements": elements })
}

pub fn ident(name: &str) -> Value {
    json!({ "t": "Ident", "name": name })
}

pub fn member(object: Value, property: &str) -> Value {
    json!({ "t": "Member", "object": object, "property": property })
}

pub fn binary(op: &str, left: Value, right: Value) -> Value {
    json!({ "t": "Binary", "op": op, "left": left, "right": right })
}

pub fn call(callee: &str, args: Vec<Value>) -> Value {
    json!({ "t": "Call", "callee": ident(callee), "args": args })
}

pub fn lambda(params: &[&str], body: Vec<Value>) -> Value {
    json!({ "t": "Lambda", "params": params_json(params), "body": block(body) })
}

/* ===================== Statements ===================== */

pub fn let_(name: &str, init: Value) -> Value {
    json!({ "t": "Let", "name": name, "init": init })
}

pub fn assign(target: &str, value: Value) -> Value {
    json!({ "t": "Assign", "target": target, "value": value })
}

pub fn expr(e: Value) -> Value {
    json!({ "t": "Expr", "expr": e })
}

pub fn ret(value: Value) -> Value {
    json!({ "t": "Return", "value": value })
}

pub fn block(body: Vec<Value>) -> Value {
    json!({ "t": "Block", "body": body })
}

pub fn while_(test: Value, body: Vec<Value>) -> Value {
    json!({ "t": "While", "test": test, "body": block(body) })
}

pub fn if_(test: Value, then_s: Vec<Value>, else_s: Option<Vec<Value>>) -> Value {
    json!({
        "t": "If",
        "test": test,
        "then_s": block(then_s),
        "else_s": else_s.map(block),
    })
}

pub fn function(name: &str, params: &[&str], body: Vec<Value>) -> Value {
    json!({ "t": "Function", "name": name, "params": params_json(params), "body": block(body) })
}

pub fn throw(value: Value) -> Value {
    json!({ "t": "Throw", "value": value })
}

pub fn brk() -> Value {
    json!({ "t": "Break" })
}

pub fn cont() -> Value {
    json!({ "t": "Continue" })
}

fn params_json(params: &[&str]) -> Vec<Value> {
    params.iter().map(|p| json!({ "name": p })).collect()
}
