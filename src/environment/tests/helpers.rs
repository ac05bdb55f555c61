//! Test helpers for environment tests
//!
//! Module files hold JSON ASTs, the format the default parser reads.

use crate::environment::{Environment, Tier};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Fresh empty directory under the system temp dir
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lilt-{}-{}", label, uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

/// Write `{ "body": body }` to `<root>/<relative>`
pub fn write_module(root: &Path, relative: &str, body: Vec<Value>) -> PathBuf {
    write_raw(root, relative, &json!({ "body": body }).to_string())
}

pub fn write_raw(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create module dir");
    }
    fs::write(&path, contents).expect("failed to write module");
    path
}

/// Environment with one search location per tier given, not yet loaded
pub fn env_with(locations: &[(Tier, &Path)]) -> Environment {
    init_tracing();
    let mut env = Environment::new();
    env.capture_output();
    for (tier, path) in locations {
        env.add_search_location(*tier, *path).expect("add_search_location failed");
    }
    env
}

/// Run every loading stage
pub fn bring_up(env: &mut Environment) {
    env.load_natives().expect("load_natives failed");
    env.load_builtins().expect("load_builtins failed");
    env.load_normal().expect("load_normal failed");
}

/// Log to the test writer; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/* ===================== AST builders ===================== */

pub fn num(v: f64) -> Value {
    json!({ "t": "LitNum", "v": v })
}

pub fn string(v: &str) -> Value {
    json!({ "t": "LitStr", "v": v })
}

pub fn ident(name: &str) -> Value {
    json!({ "t": "Ident", "name": name })
}

pub fn member(object: Value, property: &str) -> Value {
    json!({ "t": "Member", "object": object, "property": property })
}

pub fn call(callee: &str, args: Vec<Value>) -> Value {
    json!({ "t": "Call", "callee": ident(callee), "args": args })
}

pub fn let_(name: &str, init: Value) -> Value {
    json!({ "t": "Let", "name": name, "init": init })
}

pub fn let_flagged(name: &str, flags: &[&str], init: Value) -> Value {
    json!({ "t": "Let", "name": name, "flags": flags, "init": init })
}

pub fn import(module: &str) -> Value {
    json!({ "t": "Import", "module": module })
}

pub fn expr(e: Value) -> Value {
    json!({ "t": "Expr", "expr": e })
}

pub fn ret(value: Value) -> Value {
    json!({ "t": "Return", "value": value })
}

pub fn throw(value: Value) -> Value {
    json!({ "t": "Throw", "value": value })
}
